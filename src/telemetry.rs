//! ADC code scaling.
//!
//! Every channel is linear: `physical = code * per_lsb + offset`, computed in integer
//! millivolts / milliamps / milliwatts so results are exact and repeatable.

use crate::data_types::{AdcChannel, RawSample, ScaledSample, Unit};
use crate::registers::{ADC_BLOCK_LEN, ADC_BLOCK_START};

/// Scaling constants of one ADC channel.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChannelScale {
    pub per_lsb: u32,
    pub offset: u32,
    pub unit: Unit,
    /// Bits a valid code may use.
    pub code_mask: u8,
}

impl ChannelScale {
    /// Offset channels read all-zero until the first conversion completes.
    pub const fn zero_is_valid(&self) -> bool {
        self.offset == 0
    }
}

const fn scale(per_lsb: u32, offset: u32, unit: Unit, code_mask: u8) -> ChannelScale {
    ChannelScale {
        per_lsb,
        offset,
        unit,
        code_mask,
    }
}

pub const VBUS_SCALE: ChannelScale = scale(64, 3_200, Unit::Millivolts, 0xFF);
pub const VSYS_SCALE: ChannelScale = scale(64, 2_880, Unit::Millivolts, 0xFF);
pub const VBAT_SCALE: ChannelScale = scale(64, 2_880, Unit::Millivolts, 0xFF);
pub const PSYS_SCALE: ChannelScale = scale(12, 0, Unit::Milliwatts, 0xFF);
pub const ICHG_SCALE: ChannelScale = scale(64, 0, Unit::Milliamps, 0x7F);
pub const IDCHG_SCALE: ChannelScale = scale(256, 0, Unit::Milliamps, 0x7F);
pub const IIN_SCALE: ChannelScale = scale(50, 0, Unit::Milliamps, 0xFF);

impl AdcChannel {
    pub const fn scale(self) -> ChannelScale {
        match self {
            AdcChannel::Vbus => VBUS_SCALE,
            AdcChannel::Vsys => VSYS_SCALE,
            AdcChannel::Vbat => VBAT_SCALE,
            AdcChannel::Psys => PSYS_SCALE,
            AdcChannel::Ichg => ICHG_SCALE,
            AdcChannel::Idchg => IDCHG_SCALE,
            AdcChannel::Iin => IIN_SCALE,
        }
    }
}

/// Convert a raw code. Returns `None` when the reading is unavailable or out of range.
pub fn scale_sample(sample: RawSample) -> Option<ScaledSample> {
    let scale = sample.channel.scale();
    if sample.code & !scale.code_mask != 0 {
        return None;
    }
    if sample.code == 0 && !scale.zero_is_valid() {
        return None;
    }
    Some(ScaledSample {
        channel: sample.channel,
        value: sample.code as u32 * scale.per_lsb + scale.offset,
        unit: scale.unit,
    })
}

/// One poll's worth of scaled readings.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct Telemetry {
    pub vbus_mv: Option<u32>,
    pub vsys_mv: Option<u32>,
    pub vbat_mv: Option<u32>,
    pub psys_mw: Option<u32>,
    pub ichg_ma: Option<u32>,
    pub idchg_ma: Option<u32>,
    pub iin_ma: Option<u32>,
}

impl Telemetry {
    /// Scale a burst read of the ADC result block starting at [`ADC_BLOCK_START`].
    pub fn from_adc_block(block: &[u8; ADC_BLOCK_LEN]) -> Self {
        let mut telemetry = Telemetry::default();
        for channel in AdcChannel::ALL {
            let index = (channel.register() - ADC_BLOCK_START) as usize;
            telemetry.record(RawSample {
                channel,
                code: block[index],
            });
        }
        telemetry
    }

    /// Store one sample in its slot, replacing any previous value.
    pub fn record(&mut self, sample: RawSample) {
        let value = scale_sample(sample).map(|scaled| scaled.value);
        let slot = match sample.channel {
            AdcChannel::Vbus => &mut self.vbus_mv,
            AdcChannel::Vsys => &mut self.vsys_mv,
            AdcChannel::Vbat => &mut self.vbat_mv,
            AdcChannel::Psys => &mut self.psys_mw,
            AdcChannel::Ichg => &mut self.ichg_ma,
            AdcChannel::Idchg => &mut self.idchg_ma,
            AdcChannel::Iin => &mut self.iin_ma,
        };
        *slot = value;
    }
}
