//! Regulation loop configuration. Defaults match a single-cell Li-ion pack behind a USB-C input.

use crate::error::Error;
use crate::registers::{
    DEFAULT_I2C_ADDRESS, MAX_CHARGE_CURRENT_MA, MAX_CHARGE_VOLTAGE_WEIGHTS, MAX_INPUT_CURRENT_MA,
    MIN_SYSTEM_VOLTAGE_WEIGHTS, weighted_max,
};
use crate::thermal::ThermalThresholds;

/// Lowest charge voltage the IC accepts (datasheet range 1024 mV - 19200 mV).
pub const CHARGE_VOLTAGE_MIN_MV: u16 = 1_024;
pub const CHARGE_VOLTAGE_MAX_MV: u16 = 19_200;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct RegulatorConfig {
    /// 7-bit I2C address.
    pub address: u8,
    /// Delay between the end of one cycle and the start of the next.
    pub poll_period_ms: u32,
    pub max_charge_voltage_mv: u16,
    pub min_system_voltage_mv: u16,
    /// Charge current when the board is cool.
    pub max_charge_current_ma: u16,
    /// Charge current while thermally throttled.
    pub throttled_charge_current_ma: u16,
    pub max_input_current_ma: u16,
    /// Ceiling applied to a negotiated input power budget.
    pub max_charging_power_mw: u32,
    /// Input power assumed when nothing has been negotiated.
    pub fallback_power_mw: u32,
    /// Converter efficiency in percent used to derive the input current limit.
    pub efficiency_pct: u8,
    /// Battery voltage above which charging is disconnected.
    pub overvoltage_mv: u32,
    /// Bus voltage at or above which an input source is considered present.
    pub vbus_present_mv: u32,
    /// Consecutive failed cycles before the loop declares a communication fault.
    pub comm_fault_threshold: u8,
    pub thermal: ThermalThresholds,
    /// Cycles without a valid temperature before the thermal policy goes to its safe position.
    pub sensor_timeout_cycles: u8,
}

impl Default for RegulatorConfig {
    fn default() -> Self {
        Self {
            address: DEFAULT_I2C_ADDRESS,
            poll_period_ms: 1_000,
            max_charge_voltage_mv: 4_192,
            min_system_voltage_mv: 3_584,
            max_charge_current_ma: MAX_CHARGE_CURRENT_MA,
            throttled_charge_current_ma: 2_048,
            max_input_current_ma: MAX_INPUT_CURRENT_MA,
            max_charging_power_mw: 100_000,
            fallback_power_mw: 2_500,
            efficiency_pct: 95,
            overvoltage_mv: 4_215,
            vbus_present_mv: 4_500,
            comm_fault_threshold: 3,
            thermal: ThermalThresholds::default(),
            sensor_timeout_cycles: 3,
        }
    }
}

impl RegulatorConfig {
    /// Check values against register ranges and safety ceilings.
    pub fn validate<E>(&self) -> Result<(), Error<E>> {
        if self.max_charge_voltage_mv < CHARGE_VOLTAGE_MIN_MV
            || self.max_charge_voltage_mv > CHARGE_VOLTAGE_MAX_MV
            || self.min_system_voltage_mv > weighted_max(&MIN_SYSTEM_VOLTAGE_WEIGHTS)
            || self.max_charge_voltage_mv > weighted_max(&MAX_CHARGE_VOLTAGE_WEIGHTS)
            || self.max_charge_current_ma > MAX_CHARGE_CURRENT_MA
            || self.max_input_current_ma > MAX_INPUT_CURRENT_MA
            || self.efficiency_pct == 0
            || self.efficiency_pct > 100
        {
            return Err(Error::OutOfRange);
        }
        if self.throttled_charge_current_ma > self.max_charge_current_ma
            || self.min_system_voltage_mv >= self.max_charge_voltage_mv
            || self.overvoltage_mv <= self.max_charge_voltage_mv as u32
            || self.thermal.fan_hysteresis_c < 0
            || self.thermal.fan_on_c > self.thermal.throttle_c
            || self.comm_fault_threshold == 0
            || self.poll_period_ms == 0
        {
            return Err(Error::InvalidConfig);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    type E = Error<()>;

    #[test]
    fn defaults_are_valid() {
        assert!(RegulatorConfig::default().validate::<()>().is_ok());
    }

    #[test]
    fn rejects_currents_above_ceilings() {
        let cfg = RegulatorConfig {
            max_input_current_ma: 6_000,
            ..Default::default()
        };
        assert!(matches!(cfg.validate::<()>(), Err(E::OutOfRange)));

        let cfg = RegulatorConfig {
            max_charge_current_ma: 9_000,
            ..Default::default()
        };
        assert!(matches!(cfg.validate::<()>(), Err(E::OutOfRange)));
    }

    #[test]
    fn rejects_inconsistent_thresholds() {
        let cfg = RegulatorConfig {
            overvoltage_mv: 4_100,
            ..Default::default()
        };
        assert!(matches!(cfg.validate::<()>(), Err(E::InvalidConfig)));

        let cfg = RegulatorConfig {
            comm_fault_threshold: 0,
            ..Default::default()
        };
        assert!(matches!(cfg.validate::<()>(), Err(E::InvalidConfig)));
    }
}
