//! Periodic charge regulation task.
//!
//! One cycle runs the thermal policy and drives the fan, reads telemetry and status, runs the
//! charge controller, writes the resulting limits and publishes a snapshot. The thermal policy
//! does not touch the bus and runs on every cycle. A failed bus transaction skips the rest of
//! the cycle; enough consecutive failures force the published state into `Fault` and inhibit
//! charging until the bus answers again.

use embassy_sync::blocking_mutex::raw::RawMutex;
use embedded_hal::digital::OutputPin;
use embedded_hal::i2c::ErrorType;

use crate::config::RegulatorConfig;
use crate::controller::{ChargeController, ChargePlan, ControllerInputs};
use crate::data_types::{ChargerSnapshot, ChargerStatus, ConnectionState};
use crate::driver::Bq25703a;
use crate::error::Error;
use crate::state::ChargerState;
use crate::telemetry::Telemetry;
use crate::thermal::{TemperatureSensor, ThermalDecision, ThermalManager};

/// What a call to `poll` did.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum CycleOutcome {
    /// New snapshot published.
    Published,
    /// Bus failure; previous readings kept, thermal fields refreshed.
    Skipped { consecutive_failures: u8 },
    /// Failure threshold reached; Fault snapshot published.
    CommFault,
    /// Device identity has not been verified; nothing was done.
    NotReady,
}

/// Temperature read this cycle and the thermal decision taken from it.
#[derive(Clone, Copy, Debug)]
struct ThermalStep {
    temperature_c: Option<i16>,
    decision: ThermalDecision,
}

pub struct Regulator<I2C, S, F> {
    charger: Bq25703a<I2C>,
    sensor: S,
    fan: F,
    config: RegulatorConfig,
    thermal: ThermalManager,
    controller: ChargeController,
    snapshot: ChargerSnapshot,
    /// Charge-enable state last confirmed on the IC; `None` while unknown.
    charge_enabled: Option<bool>,
    failures: u8,
    verified: bool,
}

impl<I2C, S, F> Regulator<I2C, S, F>
where
    I2C: ErrorType,
{
    pub fn new(i2c: I2C, sensor: S, fan: F, config: RegulatorConfig) -> Result<Self, Error<I2C::Error>> {
        config.validate::<I2C::Error>()?;
        Ok(Self {
            charger: Bq25703a::with_address(i2c, config.address),
            sensor,
            fan,
            config,
            thermal: ThermalManager::new(config.thermal, config.sensor_timeout_cycles),
            controller: ChargeController::new(config),
            snapshot: ChargerSnapshot::new(),
            charge_enabled: None,
            failures: 0,
            verified: false,
        })
    }
}

impl<I2C, S, F> Regulator<I2C, S, F> {
    pub fn config(&self) -> &RegulatorConfig {
        &self.config
    }

    /// Last snapshot this regulator published.
    pub fn snapshot(&self) -> ChargerSnapshot {
        self.snapshot
    }

    pub fn consecutive_failures(&self) -> u8 {
        self.failures
    }

    /// Hand back the bus, sensor and fan pin.
    pub fn release(self) -> (I2C, S, F) {
        (self.charger.free(), self.sensor, self.fan)
    }

    fn succeed<M: RawMutex>(&mut self, snapshot: ChargerSnapshot, state: &ChargerState<M>) -> CycleOutcome {
        if self.failures >= self.config.comm_fault_threshold {
            info!("communication recovered after {} failed cycles", self.failures);
        }
        self.failures = 0;
        self.snapshot = snapshot;
        state.publish(snapshot);
        CycleOutcome::Published
    }
}

impl<I2C, S, F> Regulator<I2C, S, F>
where
    I2C: ErrorType,
    S: TemperatureSensor,
    F: OutputPin,
{
    fn drive_fan(&mut self, on: bool) {
        let result = if on { self.fan.set_high() } else { self.fan.set_low() };
        if result.is_err() {
            warn!("fan output failed");
        }
    }

    /// Read the sensor, update the thermal policy and drive the fan. Needs no bus.
    fn thermal_step(&mut self) -> ThermalStep {
        let temperature_c = self.sensor.read_celsius();
        let decision = self.thermal.update(temperature_c);
        self.drive_fan(decision.fan_on);
        ThermalStep {
            temperature_c,
            decision,
        }
    }

    /// Keep the last readings but take the thermal fields from this cycle, so the published
    /// fan state always matches the pin.
    fn retain_with_thermal(&mut self, step: ThermalStep) {
        self.snapshot.throttled = step.decision.throttle;
        self.snapshot.fan_on = step.decision.fan_on;
        self.snapshot.temperature_c = step.temperature_c;
    }

    /// Controller step and the snapshot to publish if the cycle's writes succeed.
    fn evaluate(
        &mut self,
        telemetry: Telemetry,
        status: ChargerStatus,
        input_current_dpm_ma: u16,
        power_budget_mw: Option<u32>,
        step: ThermalStep,
    ) -> (ChargePlan, ChargerSnapshot) {
        let ThermalStep {
            temperature_c,
            decision: thermal,
        } = step;

        if status.faults.any() {
            warn!("charger fault flags: {:?}", status.faults);
        }
        debug!(
            "vbus={:?} vbat={:?} vsys={:?} ichg={:?} idchg={:?} iin={:?} psys={:?} t={:?}",
            telemetry.vbus_mv,
            telemetry.vbat_mv,
            telemetry.vsys_mv,
            telemetry.ichg_ma,
            telemetry.idchg_ma,
            telemetry.iin_ma,
            telemetry.psys_mw,
            temperature_c
        );

        let plan = self.controller.update(&ControllerInputs {
            telemetry,
            status,
            thermal,
            power_budget_mw,
        });
        if plan.connection == ConnectionState::Fault && self.snapshot.connection != ConnectionState::Fault {
            error!(
                "battery overvoltage: {:?} mV > {} mV, charging disabled",
                telemetry.vbat_mv,
                self.config.overvoltage_mv
            );
        }

        let snapshot = ChargerSnapshot {
            connection: plan.connection,
            charging: plan.charging,
            vbat_mv: telemetry.vbat_mv,
            vbus_mv: telemetry.vbus_mv,
            vsys_mv: telemetry.vsys_mv,
            psys_mw: telemetry.psys_mw,
            iin_ma: telemetry.iin_ma,
            ichg_ma: telemetry.ichg_ma,
            idchg_ma: telemetry.idchg_ma,
            input_current_dpm_ma: Some(input_current_dpm_ma),
            limits: plan.limits,
            throttled: thermal.throttle,
            fan_on: thermal.fan_on,
            temperature_c,
        };
        (plan, snapshot)
    }

    /// Count a failed cycle. Returns `true` once the failure threshold is reached.
    fn record_failure(&mut self, error: &Error<I2C::Error>) -> bool {
        self.failures = self.failures.saturating_add(1);
        warn!(
            "cycle skipped: {:?}, {} consecutive failures",
            error.bus_fault(),
            self.failures
        );
        let escalate = self.failures >= self.config.comm_fault_threshold;
        if escalate {
            if self.failures == self.config.comm_fault_threshold {
                error!("charger not responding, forcing fault");
            }
            self.controller.force_fault();
            self.snapshot = self.snapshot.faulted();
        }
        escalate
    }
}

impl<I2C, S, F> Regulator<I2C, S, F>
where
    I2C: embedded_hal::i2c::I2c,
    S: TemperatureSensor,
    F: OutputPin,
{
    /// Verify the device and apply the start-up configuration. Charging stays inhibited.
    pub fn init(&mut self) -> Result<(), Error<I2C::Error>> {
        self.charger.init()?;
        self.charge_enabled = Some(false);
        self.verified = true;
        info!("BQ25703A at 0x{:x} initialized", self.charger.address());
        Ok(())
    }

    /// One bring-up attempt. A wrong device publishes a Fault snapshot and is never retried by `run`.
    pub fn start<M: RawMutex>(&mut self, state: &ChargerState<M>) -> Result<(), Error<I2C::Error>> {
        match self.init() {
            Ok(()) => {
                self.failures = 0;
                Ok(())
            }
            Err(e) => {
                if let Error::WrongDevice {
                    manufacturer_id,
                    device_id,
                } = e
                {
                    error!(
                        "unexpected charger id: manufacturer 0x{:x}, device 0x{:x}",
                        manufacturer_id, device_id
                    );
                    self.snapshot = self.snapshot.faulted();
                    state.publish(self.snapshot);
                } else if self.record_failure(&e) {
                    state.publish(self.snapshot);
                }
                Err(e)
            }
        }
    }

    /// Run one regulation cycle and publish the result.
    pub fn poll<M: RawMutex>(&mut self, state: &ChargerState<M>) -> CycleOutcome {
        if !self.verified {
            return CycleOutcome::NotReady;
        }
        let step = self.thermal_step();
        match self.cycle(state.power_budget_mw(), step) {
            Ok(snapshot) => self.succeed(snapshot, state),
            Err(e) => {
                self.retain_with_thermal(step);
                let outcome = if self.record_failure(&e) {
                    if let Err(e) = self.write_charge_enable(false) {
                        warn!("charge inhibit not confirmed: {:?}", e.bus_fault());
                    }
                    CycleOutcome::CommFault
                } else {
                    CycleOutcome::Skipped {
                        consecutive_failures: self.failures,
                    }
                };
                state.publish(self.snapshot);
                outcome
            }
        }
    }

    fn cycle(&mut self, power_budget_mw: Option<u32>, step: ThermalStep) -> Result<ChargerSnapshot, Error<I2C::Error>> {
        let telemetry = self.charger.read_telemetry()?;
        let status = self.charger.read_charge_status()?;
        let dpm_ma = self.charger.read_input_current_dpm_ma()?;
        let (plan, snapshot) = self.evaluate(telemetry, status, dpm_ma, power_budget_mw, step);

        // Disable before touching limits, enable only once they are in place.
        if !plan.charge_enable {
            self.write_charge_enable(false)?;
        }
        self.charger.write_limits(&plan.limits)?;
        if plan.charge_enable {
            self.write_charge_enable(true)?;
        }
        Ok(snapshot)
    }

    /// Write the charge-enable bit if it differs from what the IC is known to hold.
    fn write_charge_enable(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        if self.charge_enabled == Some(enable) {
            return Ok(());
        }
        self.charge_enabled = None;
        self.charger.set_charge_enable(enable)?;
        self.charge_enabled = Some(enable);
        debug!("charge enable -> {}", enable);
        Ok(())
    }

    /// Task body: bring the charger up, then regulate forever.
    pub fn run<M, D>(mut self, state: &ChargerState<M>, mut delay: D) -> !
    where
        M: RawMutex,
        D: embedded_hal::delay::DelayNs,
    {
        loop {
            match self.start(state) {
                Ok(()) => break,
                Err(Error::WrongDevice { .. }) => loop {
                    delay.delay_ms(self.config.poll_period_ms);
                },
                Err(_) => delay.delay_ms(self.config.poll_period_ms),
            }
        }
        loop {
            self.poll(state);
            delay.delay_ms(self.config.poll_period_ms);
        }
    }
}

#[cfg(feature = "async")]
impl<I2C, S, F> Regulator<I2C, S, F>
where
    I2C: embedded_hal_async::i2c::I2c,
    S: TemperatureSensor,
    F: OutputPin,
{
    /// Async version of [`Regulator::init`].
    pub async fn init_async(&mut self) -> Result<(), Error<I2C::Error>> {
        self.charger.init_async().await?;
        self.charge_enabled = Some(false);
        self.verified = true;
        info!("BQ25703A at 0x{:x} initialized", self.charger.address());
        Ok(())
    }

    pub async fn start_async<M: RawMutex>(&mut self, state: &ChargerState<M>) -> Result<(), Error<I2C::Error>> {
        match self.init_async().await {
            Ok(()) => {
                self.failures = 0;
                Ok(())
            }
            Err(e) => {
                if let Error::WrongDevice {
                    manufacturer_id,
                    device_id,
                } = e
                {
                    error!(
                        "unexpected charger id: manufacturer 0x{:x}, device 0x{:x}",
                        manufacturer_id, device_id
                    );
                    self.snapshot = self.snapshot.faulted();
                    state.publish(self.snapshot);
                } else if self.record_failure(&e) {
                    state.publish(self.snapshot);
                }
                Err(e)
            }
        }
    }

    pub async fn poll_async<M: RawMutex>(&mut self, state: &ChargerState<M>) -> CycleOutcome {
        if !self.verified {
            return CycleOutcome::NotReady;
        }
        let step = self.thermal_step();
        match self.cycle_async(state.power_budget_mw(), step).await {
            Ok(snapshot) => self.succeed(snapshot, state),
            Err(e) => {
                self.retain_with_thermal(step);
                let outcome = if self.record_failure(&e) {
                    if let Err(e) = self.write_charge_enable_async(false).await {
                        warn!("charge inhibit not confirmed: {:?}", e.bus_fault());
                    }
                    CycleOutcome::CommFault
                } else {
                    CycleOutcome::Skipped {
                        consecutive_failures: self.failures,
                    }
                };
                state.publish(self.snapshot);
                outcome
            }
        }
    }

    async fn cycle_async(
        &mut self,
        power_budget_mw: Option<u32>,
        step: ThermalStep,
    ) -> Result<ChargerSnapshot, Error<I2C::Error>> {
        let telemetry = self.charger.read_telemetry_async().await?;
        let status = self.charger.read_charge_status_async().await?;
        let dpm_ma = self.charger.read_input_current_dpm_ma_async().await?;
        let (plan, snapshot) = self.evaluate(telemetry, status, dpm_ma, power_budget_mw, step);

        if !plan.charge_enable {
            self.write_charge_enable_async(false).await?;
        }
        self.charger.write_limits_async(&plan.limits).await?;
        if plan.charge_enable {
            self.write_charge_enable_async(true).await?;
        }
        Ok(snapshot)
    }

    async fn write_charge_enable_async(&mut self, enable: bool) -> Result<(), Error<I2C::Error>> {
        if self.charge_enabled == Some(enable) {
            return Ok(());
        }
        self.charge_enabled = None;
        self.charger.set_charge_enable_async(enable).await?;
        self.charge_enabled = Some(enable);
        debug!("charge enable -> {}", enable);
        Ok(())
    }

    /// Async task body, for executors such as embassy. Never returns.
    pub async fn run_async<M, D>(mut self, state: &ChargerState<M>, mut delay: D)
    where
        M: RawMutex,
        D: embedded_hal_async::delay::DelayNs,
    {
        loop {
            match self.start_async(state).await {
                Ok(()) => break,
                Err(Error::WrongDevice { .. }) => loop {
                    delay.delay_ms(self.config.poll_period_ms).await;
                },
                Err(_) => delay.delay_ms(self.config.poll_period_ms).await,
            }
        }
        loop {
            self.poll_async(state).await;
            delay.delay_ms(self.config.poll_period_ms).await;
        }
    }
}
