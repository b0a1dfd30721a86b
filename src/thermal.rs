//! Thermal policy: charge throttling and fan control with hysteresis.

/// Source of the board temperature used for thermal throttling.
pub trait TemperatureSensor {
    /// Temperature in whole degrees Celsius, or `None` when the sensor has no valid reading.
    fn read_celsius(&mut self) -> Option<i16>;
}

impl<F> TemperatureSensor for F
where
    F: FnMut() -> Option<i16>,
{
    fn read_celsius(&mut self) -> Option<i16> {
        self()
    }
}

/// Readings outside this window are treated as a disconnected or shorted sensor.
pub const PLAUSIBLE_MIN_C: i16 = -40;
pub const PLAUSIBLE_MAX_C: i16 = 150;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThermalThresholds {
    /// Throttle at or above this temperature.
    pub throttle_c: i16,
    /// Fan switches on at or above this temperature.
    pub fan_on_c: i16,
    /// Fan switches off below `fan_on_c - fan_hysteresis_c`.
    pub fan_hysteresis_c: i16,
}

impl Default for ThermalThresholds {
    fn default() -> Self {
        Self {
            throttle_c: 60,
            fan_on_c: 40,
            fan_hysteresis_c: 5,
        }
    }
}

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub struct ThermalDecision {
    pub throttle: bool,
    pub fan_on: bool,
}

impl ThermalDecision {
    /// Decision used when no trustworthy temperature is available.
    pub const SAFE: ThermalDecision = ThermalDecision {
        throttle: true,
        fan_on: true,
    };
}

impl ThermalThresholds {
    pub fn fan_off_c(&self) -> i16 {
        self.fan_on_c - self.fan_hysteresis_c
    }

    /// Pure decision for a valid reading given the previous fan state.
    pub fn decide(&self, temperature_c: i16, fan_on: bool) -> ThermalDecision {
        let fan_on = if temperature_c >= self.fan_on_c {
            true
        } else if temperature_c < self.fan_off_c() {
            false
        } else {
            fan_on
        };
        ThermalDecision {
            throttle: temperature_c >= self.throttle_c,
            fan_on,
        }
    }
}

/// Stateful wrapper around [`ThermalThresholds::decide`] that also tolerates a flaky sensor
/// for a bounded number of cycles.
#[derive(Debug)]
pub struct ThermalManager {
    thresholds: ThermalThresholds,
    decision: ThermalDecision,
    missed: u8,
    max_missed: u8,
}

impl ThermalManager {
    pub fn new(thresholds: ThermalThresholds, max_missed: u8) -> Self {
        Self {
            thresholds,
            decision: ThermalDecision::SAFE,
            missed: 0,
            max_missed,
        }
    }

    pub fn decision(&self) -> ThermalDecision {
        self.decision
    }

    /// Feed one reading. `None` or implausible readings hold the last decision for up to
    /// `max_missed` cycles, then fall back to [`ThermalDecision::SAFE`].
    pub fn update(&mut self, reading: Option<i16>) -> ThermalDecision {
        match reading.filter(|t| (PLAUSIBLE_MIN_C..=PLAUSIBLE_MAX_C).contains(t)) {
            Some(temperature_c) => {
                self.missed = 0;
                self.decision = self.thresholds.decide(temperature_c, self.decision.fan_on);
            }
            None => {
                self.missed = self.missed.saturating_add(1);
                if self.missed > self.max_missed {
                    self.decision = ThermalDecision::SAFE;
                }
            }
        }
        self.decision
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn manager() -> ThermalManager {
        ThermalManager::new(ThermalThresholds::default(), 3)
    }

    #[test]
    fn throttle_is_level_triggered() {
        let t = ThermalThresholds::default();
        assert!(!t.decide(59, false).throttle);
        assert!(t.decide(60, false).throttle);
        assert!(!t.decide(59, true).throttle);
    }

    #[test]
    fn fan_holds_state_inside_band() {
        let t = ThermalThresholds::default();
        for temp in 35..40 {
            assert!(t.decide(temp, true).fan_on, "{temp} should keep fan on");
            assert!(!t.decide(temp, false).fan_on, "{temp} should keep fan off");
        }
        assert!(t.decide(40, false).fan_on);
        assert!(!t.decide(34, true).fan_on);
    }

    #[test]
    fn fan_sequence_through_hysteresis_band() {
        let mut m = manager();
        m.update(Some(25));
        let fans: [bool; 3] = [42, 36, 34].map(|t| m.update(Some(t)).fan_on);
        assert_eq!(fans, [true, true, false]);
    }

    #[test]
    fn starts_safe_until_first_reading() {
        let mut m = manager();
        assert_eq!(m.decision(), ThermalDecision::SAFE);
        let d = m.update(Some(25));
        assert!(!d.throttle);
        assert!(!d.fan_on);
    }

    #[test]
    fn missing_readings_fall_back_to_safe() {
        let mut m = manager();
        m.update(Some(25));
        for _ in 0..3 {
            assert!(!m.update(None).throttle);
        }
        assert_eq!(m.update(None), ThermalDecision::SAFE);
        // recovers on the next valid reading
        assert!(!m.update(Some(30)).throttle);
    }

    #[test]
    fn implausible_reading_counts_as_missing() {
        let mut m = ThermalManager::new(ThermalThresholds::default(), 0);
        m.update(Some(25));
        assert_eq!(m.update(Some(-100)), ThermalDecision::SAFE);
    }
}
