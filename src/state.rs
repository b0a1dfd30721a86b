//! Published charger state shared between the regulation task and its readers.
//!
//! The regulator is the only writer of the snapshot. Readers take the lock just long enough to
//! copy a value out; nothing inside a critical section touches the bus.

use core::cell::Cell;

use embassy_sync::blocking_mutex::Mutex;
use embassy_sync::blocking_mutex::raw::RawMutex;

use crate::data_types::{ChargerSnapshot, ChargingState, ConnectionState};

/// Snapshot plus the negotiated input power budget, each behind its own mutex.
///
/// `ChargerState::new()` is `const`, so the state can be a `static`:
///
/// ```ignore
/// static CHARGER: ChargerState<CriticalSectionRawMutex> = ChargerState::new();
/// ```
pub struct ChargerState<M: RawMutex> {
    snapshot: Mutex<M, Cell<ChargerSnapshot>>,
    power_budget_mw: Mutex<M, Cell<Option<u32>>>,
}

impl<M: RawMutex> ChargerState<M> {
    pub const fn new() -> Self {
        Self {
            snapshot: Mutex::new(Cell::new(ChargerSnapshot::new())),
            power_budget_mw: Mutex::new(Cell::new(None)),
        }
    }

    /// Replace the published snapshot. Only the regulator calls this.
    pub(crate) fn publish(&self, snapshot: ChargerSnapshot) {
        self.snapshot.lock(|cell| cell.set(snapshot));
    }

    /// Copy of the latest snapshot.
    pub fn snapshot(&self) -> ChargerSnapshot {
        self.snapshot.lock(|cell| cell.get())
    }

    fn read<T>(&self, f: impl FnOnce(&ChargerSnapshot) -> T) -> T {
        self.snapshot.lock(|cell| f(&cell.get()))
    }

    pub fn connection_state(&self) -> ConnectionState {
        self.read(|s| s.connection)
    }

    pub fn charging_state(&self) -> ChargingState {
        self.read(|s| s.charging)
    }

    pub fn vbat_mv(&self) -> Option<u32> {
        self.read(|s| s.vbat_mv)
    }

    pub fn vbus_mv(&self) -> Option<u32> {
        self.read(|s| s.vbus_mv)
    }

    pub fn vsys_mv(&self) -> Option<u32> {
        self.read(|s| s.vsys_mv)
    }

    pub fn psys_mw(&self) -> Option<u32> {
        self.read(|s| s.psys_mw)
    }

    pub fn input_current_ma(&self) -> Option<u32> {
        self.read(|s| s.iin_ma)
    }

    pub fn charge_current_ma(&self) -> Option<u32> {
        self.read(|s| s.ichg_ma)
    }

    pub fn discharge_current_ma(&self) -> Option<u32> {
        self.read(|s| s.idchg_ma)
    }

    pub fn input_current_dpm_ma(&self) -> Option<u16> {
        self.read(|s| s.input_current_dpm_ma)
    }

    /// Charge current limit commanded on the last successful cycle.
    pub fn max_charge_current_ma(&self) -> u16 {
        self.read(|s| s.limits.max_charge_current_ma)
    }

    /// Input current limit commanded on the last successful cycle.
    pub fn input_current_limit_ma(&self) -> u16 {
        self.read(|s| s.limits.input_current_limit_ma)
    }

    pub fn is_throttled(&self) -> bool {
        self.read(|s| s.throttled)
    }

    pub fn is_fan_on(&self) -> bool {
        self.read(|s| s.fan_on)
    }

    pub fn temperature_c(&self) -> Option<i16> {
        self.read(|s| s.temperature_c)
    }

    /// Set the negotiated input power (e.g. from a USB-PD contract). `None` selects the fallback.
    pub fn set_power_budget_mw(&self, budget: Option<u32>) {
        self.power_budget_mw.lock(|cell| cell.set(budget));
    }

    pub fn power_budget_mw(&self) -> Option<u32> {
        self.power_budget_mw.lock(|cell| cell.get())
    }
}

impl<M: RawMutex> Default for ChargerState<M> {
    fn default() -> Self {
        Self::new()
    }
}
