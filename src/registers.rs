//! Register map, bit masks and value codecs for the BQ25703A.
//! 16-bit registers are little-endian: the low byte sits at the lower address.

/// 7-bit I2C address (0xD6 in 8-bit write form).
pub const DEFAULT_I2C_ADDRESS: u8 = 0x6B;

/// Expected contents of the identification registers.
pub const MANUFACTURER_ID: u8 = 0x40;
pub const DEVICE_ID: u8 = 0x78;

/// Per-transaction timeout the bus implementation must honour.
pub const I2C_TIMEOUT_MS: u32 = 500;

/// Register addresses (7-bit).
pub mod addr {
    /// ChargeOption0, 16-bit (0x00/0x01).
    pub const CHARGE_OPTION_0: u8 = 0x00;
    /// ChargeCurrent, 16-bit (0x02/0x03), 64 mA LSB in bits 12:6.
    pub const CHARGE_CURRENT: u8 = 0x02;
    /// MaxChargeVoltage, 16-bit (0x04/0x05), 16 mV LSB in bits 14:4.
    pub const MAX_CHARGE_VOLTAGE: u8 = 0x04;
    /// MinSystemVoltage upper byte, 256 mV LSB in bits 5:0.
    pub const MIN_SYSTEM_VOLTAGE: u8 = 0x0D;
    /// IIN_HOST upper byte, 50 mA LSB in bits 6:0.
    pub const IIN_HOST: u8 = 0x0F;
    /// ChargerStatus, 16-bit (0x20/0x21).
    pub const CHARGE_STATUS: u8 = 0x20;
    /// IIN_DPM upper byte (read-only), 50 mA LSB in bits 6:0.
    pub const IIN_DPM: u8 = 0x25;
    pub const ADC_PSYS: u8 = 0x26;
    pub const ADC_VBUS: u8 = 0x27;
    pub const ADC_IDCHG: u8 = 0x28;
    pub const ADC_ICHG: u8 = 0x29;
    pub const ADC_CMPIN: u8 = 0x2A;
    pub const ADC_IIN: u8 = 0x2B;
    pub const ADC_VBAT: u8 = 0x2C;
    pub const ADC_VSYS: u8 = 0x2D;
    pub const MANUFACTURER_ID: u8 = 0x2E;
    pub const DEVICE_ID: u8 = 0x2F;
    /// ADCOption, 16-bit (0x3A/0x3B).
    pub const ADC_OPTION: u8 = 0x3A;
}

/// First register of the 8-byte ADC result block read in one burst.
pub const ADC_BLOCK_START: u8 = addr::ADC_PSYS;
pub const ADC_BLOCK_LEN: usize = (addr::ADC_VSYS - addr::ADC_PSYS + 1) as usize;

/// Absolute safety ceilings, independent of configuration.
pub const MAX_CHARGE_CURRENT_MA: u16 = 8_128;
pub const MAX_INPUT_CURRENT_MA: u16 = 5_000;

/// Input current limit registers (IIN_HOST, IIN_DPM).
pub const IIN_LSB_MA: u16 = 50;
pub const IIN_CODE_MAX: u8 = 0x7F;

bitflags::bitflags! {
    /// ChargeOption0 register bits (0x00/0x01).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ChargeOption0Bits: u16 {
        /// Bit 15: Low power mode (battery only).
        const EN_LWPWR          = 1 << 15;
        const WDTMR_ADJ1        = 1 << 14;
        const WDTMR_ADJ0        = 1 << 13;
        const IDPM_AUTO_DISABLE = 1 << 12;
        const OTG_ON_CHRGOK     = 1 << 11;
        /// Bit 10: Out-of-audio switching frequency.
        const EN_OOA            = 1 << 10;
        const PWM_FREQ          = 1 << 9;
        // Bits 8-6 reserved.
        const EN_LEARN          = 1 << 5;
        const IADPT_GAIN        = 1 << 4;
        const IBAT_GAIN         = 1 << 3;
        const EN_LDO            = 1 << 2;
        const EN_IDPM           = 1 << 1;
        /// Bit 0: Charge inhibit (1 = charging disabled).
        const CHRG_INHIBIT      = 1 << 0;
    }

    /// ChargerStatus register bits (0x20/0x21). Upper byte is status, lower byte is faults.
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct ChargeStatusBits: u16 {
        const AC_STAT        = 1 << 15;
        const ICO_DONE       = 1 << 14;
        const IN_VAP         = 1 << 13;
        const IN_VINDPM      = 1 << 12;
        const IN_IINDPM      = 1 << 11;
        /// Bit 10: Fast charge in progress.
        const IN_FCHRG       = 1 << 10;
        /// Bit 9: Pre-charge in progress.
        const IN_PCHRG       = 1 << 9;
        const IN_OTG         = 1 << 8;
        const FAULT_ACOV     = 1 << 7;
        const FAULT_BATOC    = 1 << 6;
        const FAULT_ACOC     = 1 << 5;
        const SYSOVP_STAT    = 1 << 4;
        // Bit 3 reserved.
        const FAULT_LATCHOFF = 1 << 2;
        const FAULT_OTG_OVP  = 1 << 1;
        const FAULT_OTG_UCP  = 1 << 0;
    }

    /// ADCOption register bits (0x3A/0x3B).
    #[derive(Clone, Copy, Debug, Eq, PartialEq)]
    pub struct AdcOptionBits: u16 {
        /// Bit 15: Continuous conversion (0 = one-shot).
        const ADC_CONV      = 1 << 15;
        /// Bit 14: Start conversion.
        const ADC_START     = 1 << 14;
        /// Bit 13: 3.06 V full scale.
        const ADC_FULLSCALE = 1 << 13;
        const EN_ADC_CMPIN  = 1 << 7;
        const EN_ADC_VBUS   = 1 << 6;
        const EN_ADC_PSYS   = 1 << 5;
        const EN_ADC_IIN    = 1 << 4;
        const EN_ADC_IDCHG  = 1 << 3;
        const EN_ADC_ICHG   = 1 << 2;
        const EN_ADC_VSYS   = 1 << 1;
        const EN_ADC_VBAT   = 1 << 0;
    }
}

impl ChargeStatusBits {
    /// Fault half of the register.
    pub const FAULTS: Self = Self::from_bits_truncate(0x00F7);
}

/// One binary weight of a register field: physical value and the bit carrying it.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct Weight {
    pub value: u16,
    pub mask: u16,
}

const fn w(value: u16, bit: u8) -> Weight {
    Weight {
        value,
        mask: 1 << bit,
    }
}

/// MaxChargeVoltage weights, 16384 mV (bit 14) down to 16 mV (bit 4).
pub const MAX_CHARGE_VOLTAGE_WEIGHTS: [Weight; 11] = [
    w(16_384, 14),
    w(8_192, 13),
    w(4_096, 12),
    w(2_048, 11),
    w(1_024, 10),
    w(512, 9),
    w(256, 8),
    w(128, 7),
    w(64, 6),
    w(32, 5),
    w(16, 4),
];

/// MinSystemVoltage weights within the upper byte, 8192 mV (bit 5) down to 256 mV (bit 0).
pub const MIN_SYSTEM_VOLTAGE_WEIGHTS: [Weight; 6] = [
    w(8_192, 5),
    w(4_096, 4),
    w(2_048, 3),
    w(1_024, 2),
    w(512, 1),
    w(256, 0),
];

/// ChargeCurrent weights, 4096 mA (bit 12) down to 64 mA (bit 6).
pub const CHARGE_CURRENT_WEIGHTS: [Weight; 7] = [
    w(4_096, 12),
    w(2_048, 11),
    w(1_024, 10),
    w(512, 9),
    w(256, 8),
    w(128, 7),
    w(64, 6),
];

/// Largest value a weight table can represent.
pub fn weighted_max(table: &[Weight]) -> u16 {
    table.iter().map(|weight| weight.value).sum()
}

/// Greedy encode: walk the table from the largest weight and set each bit that still fits.
/// The residue below the smallest weight is dropped; targets above the table sum saturate.
pub fn encode_weighted(table: &[Weight], target: u16) -> u16 {
    let mut remaining = target;
    let mut bits = 0u16;
    for weight in table {
        if remaining >= weight.value {
            bits |= weight.mask;
            remaining -= weight.value;
        }
    }
    bits
}

/// Sum the weights whose bits are set. Bits outside the table are ignored.
pub fn decode_weighted(table: &[Weight], bits: u16) -> u16 {
    table
        .iter()
        .filter(|weight| bits & weight.mask != 0)
        .map(|weight| weight.value)
        .sum()
}

/// Convert a charge voltage limit (mV) to MaxChargeVoltage register bits.
pub fn max_charge_voltage_to_bits(mv: u16) -> u16 {
    encode_weighted(&MAX_CHARGE_VOLTAGE_WEIGHTS, mv)
}

/// Convert MaxChargeVoltage register bits to millivolts.
pub fn bits_to_max_charge_voltage(bits: u16) -> u16 {
    decode_weighted(&MAX_CHARGE_VOLTAGE_WEIGHTS, bits)
}

/// Convert a minimum system voltage (mV) to the MinSystemVoltage upper-byte code.
pub fn min_system_voltage_to_code(mv: u16) -> u8 {
    encode_weighted(&MIN_SYSTEM_VOLTAGE_WEIGHTS, mv) as u8
}

/// Convert a MinSystemVoltage code to millivolts.
pub fn code_to_min_system_voltage(code: u8) -> u16 {
    decode_weighted(&MIN_SYSTEM_VOLTAGE_WEIGHTS, code as u16)
}

/// Convert a charge current (mA) to ChargeCurrent register bits.
pub fn charge_current_to_bits(ma: u16) -> u16 {
    encode_weighted(&CHARGE_CURRENT_WEIGHTS, ma)
}

/// Convert ChargeCurrent register bits to milliamps.
pub fn bits_to_charge_current(bits: u16) -> u16 {
    decode_weighted(&CHARGE_CURRENT_WEIGHTS, bits)
}

/// Convert an input current limit (mA) to a 7-bit code, rounding to the nearest 50 mA step.
pub fn iin_ma_to_code(ma: u16) -> u8 {
    let code = (ma as u32 + (IIN_LSB_MA / 2) as u32) / IIN_LSB_MA as u32;
    code.min(IIN_CODE_MAX as u32) as u8
}

/// Convert an IIN_HOST / IIN_DPM code to milliamps.
pub fn code_to_iin_ma(code: u8) -> u16 {
    (code & IIN_CODE_MAX) as u16 * IIN_LSB_MA
}
