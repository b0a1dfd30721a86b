//! Connection/charging state machine and charge limit policy.

use crate::config::RegulatorConfig;
use crate::data_types::{ChargerLimits, ChargerStatus, ChargingState, ConnectionState};
use crate::registers::{MAX_CHARGE_CURRENT_MA, MAX_INPUT_CURRENT_MA};
use crate::telemetry::Telemetry;
use crate::thermal::ThermalDecision;

/// Bus voltage assumed for the input current limit when VBUS is not measured.
pub const DEFAULT_VBUS_MV: u32 = 5_000;

/// Everything the controller looks at in one cycle.
#[derive(Clone, Copy, Debug)]
pub struct ControllerInputs {
    pub telemetry: Telemetry,
    pub status: ChargerStatus,
    pub thermal: ThermalDecision,
    /// Negotiated input power, if a power delivery contract is known.
    pub power_budget_mw: Option<u32>,
}

/// What the regulator has to command this cycle.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ChargePlan {
    pub connection: ConnectionState,
    pub charging: ChargingState,
    pub limits: ChargerLimits,
    /// Desired state of the charge-enable bit (inverse of CHRG_INHIBIT).
    pub charge_enable: bool,
}

/// `min(ceiling, floor(power * efficiency / vbus))` in mA.
pub fn input_current_limit_ma(power_mw: u32, vbus_mv: u32, efficiency_pct: u8, ceiling_ma: u16) -> u16 {
    let ceiling = ceiling_ma.min(MAX_INPUT_CURRENT_MA);
    let vbus_mv = if vbus_mv == 0 { DEFAULT_VBUS_MV } else { vbus_mv };
    let ma = power_mw as u64 * 1_000 * efficiency_pct as u64 / 100 / vbus_mv as u64;
    ma.min(ceiling as u64) as u16
}

#[derive(Debug)]
pub struct ChargeController {
    config: RegulatorConfig,
    connection: ConnectionState,
    charging: ChargingState,
}

impl ChargeController {
    pub fn new(config: RegulatorConfig) -> Self {
        Self {
            config,
            connection: ConnectionState::Disconnected,
            charging: ChargingState::NotCharging,
        }
    }

    pub fn connection(&self) -> ConnectionState {
        self.connection
    }

    pub fn charging(&self) -> ChargingState {
        self.charging
    }

    fn bus_present(&self, telemetry: &Telemetry) -> bool {
        telemetry
            .vbus_mv
            .is_some_and(|mv| mv >= self.config.vbus_present_mv)
    }

    fn over_voltage(&self, telemetry: &Telemetry) -> bool {
        telemetry
            .vbat_mv
            .is_some_and(|mv| mv > self.config.overvoltage_mv)
    }

    /// Limits for this cycle. Both safety ceilings are applied regardless of configuration.
    pub fn limits(&self, inputs: &ControllerInputs) -> ChargerLimits {
        let cfg = &self.config;
        let charge_current = if inputs.thermal.throttle {
            cfg.throttled_charge_current_ma
        } else {
            cfg.max_charge_current_ma
        };
        let power_mw = inputs
            .power_budget_mw
            .map(|mw| mw.min(cfg.max_charging_power_mw))
            .unwrap_or(cfg.fallback_power_mw);
        let vbus_mv = inputs
            .telemetry
            .vbus_mv
            .filter(|_| self.bus_present(&inputs.telemetry))
            .unwrap_or(DEFAULT_VBUS_MV);

        ChargerLimits {
            max_charge_current_ma: charge_current.min(MAX_CHARGE_CURRENT_MA),
            max_charge_voltage_mv: cfg.max_charge_voltage_mv,
            min_system_voltage_mv: cfg.min_system_voltage_mv,
            input_current_limit_ma: input_current_limit_ma(
                power_mw,
                vbus_mv,
                cfg.efficiency_pct,
                cfg.max_input_current_ma,
            ),
        }
    }

    /// Advance the state machine with one cycle of inputs.
    pub fn update(&mut self, inputs: &ControllerInputs) -> ChargePlan {
        let connection = if self.over_voltage(&inputs.telemetry) {
            ConnectionState::Fault
        } else if self.bus_present(&inputs.telemetry) {
            ConnectionState::Connected
        } else {
            ConnectionState::Disconnected
        };
        let charge_enable = connection == ConnectionState::Connected;
        let charging = match (charge_enable && inputs.status.is_charging(), inputs.thermal.throttle) {
            (false, _) => ChargingState::NotCharging,
            (true, false) => ChargingState::Charging,
            (true, true) => ChargingState::Throttled,
        };

        if connection != self.connection {
            info!("connection {:?} -> {:?}", self.connection, connection);
        }
        if charging != self.charging {
            info!("charging {:?} -> {:?}", self.charging, charging);
        }
        self.connection = connection;
        self.charging = charging;

        ChargePlan {
            connection,
            charging,
            limits: self.limits(inputs),
            charge_enable,
        }
    }

    /// Enter Fault without fresh telemetry (lost communication).
    pub fn force_fault(&mut self) {
        if self.connection != ConnectionState::Fault {
            info!("connection {:?} -> Fault (forced)", self.connection);
        }
        self.connection = ConnectionState::Fault;
        self.charging = ChargingState::NotCharging;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn inputs(vbus_mv: Option<u32>, vbat_mv: Option<u32>) -> ControllerInputs {
        ControllerInputs {
            telemetry: Telemetry {
                vbus_mv,
                vbat_mv,
                ..Default::default()
            },
            status: ChargerStatus {
                ac_present: true,
                fast_charge: true,
                ..Default::default()
            },
            thermal: ThermalDecision {
                throttle: false,
                fan_on: false,
            },
            power_budget_mw: None,
        }
    }

    fn controller() -> ChargeController {
        ChargeController::new(RegulatorConfig::default())
    }

    #[test]
    fn no_bus_is_always_disconnected() {
        let mut c = controller();
        c.update(&inputs(Some(9_024), Some(3_904)));
        for _ in 0..4 {
            let plan = c.update(&inputs(None, Some(3_904)));
            assert_eq!(plan.connection, ConnectionState::Disconnected);
            assert_eq!(plan.charging, ChargingState::NotCharging);
            assert!(!plan.charge_enable);
        }
    }

    #[test]
    fn overvoltage_faults_from_any_state() {
        for prior in [None, Some(9_024)] {
            let mut c = controller();
            c.update(&inputs(prior, Some(3_904)));
            let plan = c.update(&inputs(Some(9_024), Some(4_288)));
            assert_eq!(plan.connection, ConnectionState::Fault);
            assert!(!plan.charge_enable);
            assert_eq!(plan.charging, ChargingState::NotCharging);
        }
    }

    #[test]
    fn fault_clears_back_to_connected() {
        let mut c = controller();
        c.update(&inputs(Some(9_024), Some(4_288)));
        let plan = c.update(&inputs(Some(9_024), Some(4_160)));
        assert_eq!(plan.connection, ConnectionState::Connected);
        assert!(plan.charge_enable);
    }

    #[test]
    fn threshold_is_exclusive() {
        let cfg = RegulatorConfig::default();
        let mut c = ChargeController::new(cfg);
        let plan = c.update(&inputs(Some(9_024), Some(cfg.overvoltage_mv)));
        assert_eq!(plan.connection, ConnectionState::Connected);
    }

    #[test]
    fn throttle_selects_reduced_current() {
        let mut c = controller();
        let mut hot = inputs(Some(9_024), Some(3_904));
        hot.thermal.throttle = true;
        let plan = c.update(&hot);
        assert_eq!(plan.charging, ChargingState::Throttled);
        assert_eq!(plan.limits.max_charge_current_ma, 2_048);

        let plan = c.update(&inputs(Some(9_024), Some(3_904)));
        assert_eq!(plan.charging, ChargingState::Charging);
        assert_eq!(plan.limits.max_charge_current_ma, 8_128);
    }

    #[test]
    fn input_limit_uses_budget_or_fallback() {
        let c = controller();
        let mut i = inputs(Some(9_024), Some(3_904));
        // 2500 mW * 0.95 / 9.024 V
        assert_eq!(c.limits(&i).input_current_limit_ma, 263);
        i.power_budget_mw = Some(100_000);
        assert_eq!(c.limits(&i).input_current_limit_ma, 5_000);
        i.power_budget_mw = Some(27_000);
        assert_eq!(c.limits(&i).input_current_limit_ma, 2_842);
    }

    #[test]
    fn limits_never_exceed_ceilings() {
        let cfg = RegulatorConfig {
            max_charge_current_ma: u16::MAX,
            max_input_current_ma: u16::MAX,
            max_charging_power_mw: u32::MAX,
            ..Default::default()
        };
        let c = ChargeController::new(cfg);
        let mut i = inputs(Some(4_544), Some(3_904));
        i.power_budget_mw = Some(u32::MAX);
        let limits = c.limits(&i);
        assert!(limits.max_charge_current_ma <= MAX_CHARGE_CURRENT_MA);
        assert!(limits.input_current_limit_ma <= MAX_INPUT_CURRENT_MA);
    }

    #[test]
    fn input_limit_formula() {
        assert_eq!(input_current_limit_ma(100_000, 9_000, 95, 5_000), 5_000);
        assert_eq!(input_current_limit_ma(15_000, 5_000, 95, 5_000), 2_850);
        assert_eq!(input_current_limit_ma(15_000, 0, 95, 5_000), 2_850);
    }
}
