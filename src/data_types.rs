//! Data types shared by the driver, the regulation loop and the published state.

use crate::registers::{ChargeStatusBits, addr};

/// Connection state derived from telemetry.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connected,
    /// Charging disabled because of overvoltage or lost communication.
    Fault,
}

/// Charging state derived from the charge status register and thermal policy.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub enum ChargingState {
    #[default]
    NotCharging,
    Charging,
    /// Charging with the reduced thermal current limit.
    Throttled,
}

/// ADC channels exposed by the charger.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum AdcChannel {
    Psys,
    Vbus,
    Idchg,
    Ichg,
    Iin,
    Vbat,
    Vsys,
}

impl AdcChannel {
    pub const ALL: [AdcChannel; 7] = [
        AdcChannel::Psys,
        AdcChannel::Vbus,
        AdcChannel::Idchg,
        AdcChannel::Ichg,
        AdcChannel::Iin,
        AdcChannel::Vbat,
        AdcChannel::Vsys,
    ];

    /// Result register of this channel.
    pub const fn register(self) -> u8 {
        match self {
            AdcChannel::Psys => addr::ADC_PSYS,
            AdcChannel::Vbus => addr::ADC_VBUS,
            AdcChannel::Idchg => addr::ADC_IDCHG,
            AdcChannel::Ichg => addr::ADC_ICHG,
            AdcChannel::Iin => addr::ADC_IIN,
            AdcChannel::Vbat => addr::ADC_VBAT,
            AdcChannel::Vsys => addr::ADC_VSYS,
        }
    }

    /// Channel whose result lives at `reg`, if any.
    pub fn from_register(reg: u8) -> Option<Self> {
        Self::ALL.into_iter().find(|channel| channel.register() == reg)
    }
}

/// Physical unit of a scaled reading.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum Unit {
    Millivolts,
    Milliamps,
    Milliwatts,
}

/// Raw ADC code as read from a result register.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RawSample {
    pub channel: AdcChannel,
    pub code: u8,
}

/// ADC reading converted to physical units.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ScaledSample {
    pub channel: AdcChannel,
    pub value: u32,
    pub unit: Unit,
}

/// Fault flags decoded from the lower byte of ChargerStatus.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct FaultStatus {
    pub input_over_voltage: bool,
    pub battery_over_current: bool,
    pub input_over_current: bool,
    pub system_over_voltage: bool,
    pub latch_off: bool,
}

impl FaultStatus {
    pub fn any(&self) -> bool {
        self.input_over_voltage
            || self.battery_over_current
            || self.input_over_current
            || self.system_over_voltage
            || self.latch_off
    }
}

/// Decoded ChargerStatus register.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChargerStatus {
    pub ac_present: bool,
    pub fast_charge: bool,
    pub pre_charge: bool,
    pub in_input_current_dpm: bool,
    pub in_input_voltage_dpm: bool,
    pub faults: FaultStatus,
}

impl ChargerStatus {
    /// A charge cycle (fast or pre-charge) is in progress.
    pub fn is_charging(&self) -> bool {
        self.fast_charge || self.pre_charge
    }
}

impl From<ChargeStatusBits> for ChargerStatus {
    fn from(bits: ChargeStatusBits) -> Self {
        Self {
            ac_present: bits.contains(ChargeStatusBits::AC_STAT),
            fast_charge: bits.contains(ChargeStatusBits::IN_FCHRG),
            pre_charge: bits.contains(ChargeStatusBits::IN_PCHRG),
            in_input_current_dpm: bits.contains(ChargeStatusBits::IN_IINDPM),
            in_input_voltage_dpm: bits.contains(ChargeStatusBits::IN_VINDPM),
            faults: FaultStatus {
                input_over_voltage: bits.contains(ChargeStatusBits::FAULT_ACOV),
                battery_over_current: bits.contains(ChargeStatusBits::FAULT_BATOC),
                input_over_current: bits.contains(ChargeStatusBits::FAULT_ACOC),
                system_over_voltage: bits.contains(ChargeStatusBits::SYSOVP_STAT),
                latch_off: bits.contains(ChargeStatusBits::FAULT_LATCHOFF),
            },
        }
    }
}

/// Limits commanded to the charger every cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Default, Eq, PartialEq)]
pub struct ChargerLimits {
    pub max_charge_current_ma: u16,
    pub max_charge_voltage_mv: u16,
    pub min_system_voltage_mv: u16,
    pub input_current_limit_ma: u16,
}

/// Latest published view of the charger. `None` readings mean the ADC had no valid conversion.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChargerSnapshot {
    pub connection: ConnectionState,
    pub charging: ChargingState,
    pub vbat_mv: Option<u32>,
    pub vbus_mv: Option<u32>,
    pub vsys_mv: Option<u32>,
    pub psys_mw: Option<u32>,
    pub iin_ma: Option<u32>,
    pub ichg_ma: Option<u32>,
    pub idchg_ma: Option<u32>,
    /// Input current limit the IC is actually regulating to (IIN_DPM readback).
    pub input_current_dpm_ma: Option<u16>,
    pub limits: ChargerLimits,
    pub throttled: bool,
    pub fan_on: bool,
    pub temperature_c: Option<i16>,
}

impl ChargerSnapshot {
    /// Start-up value: nothing measured, charging off, thermal policy in its safe position.
    pub const fn new() -> Self {
        Self {
            connection: ConnectionState::Disconnected,
            charging: ChargingState::NotCharging,
            vbat_mv: None,
            vbus_mv: None,
            vsys_mv: None,
            psys_mw: None,
            iin_ma: None,
            ichg_ma: None,
            idchg_ma: None,
            input_current_dpm_ma: None,
            limits: ChargerLimits {
                max_charge_current_ma: 0,
                max_charge_voltage_mv: 0,
                min_system_voltage_mv: 0,
                input_current_limit_ma: 0,
            },
            throttled: true,
            fan_on: true,
            temperature_c: None,
        }
    }

    /// Same readings, forced into the fault position.
    pub fn faulted(self) -> Self {
        Self {
            connection: ConnectionState::Fault,
            charging: ChargingState::NotCharging,
            ..self
        }
    }
}

impl Default for ChargerSnapshot {
    fn default() -> Self {
        Self::new()
    }
}
