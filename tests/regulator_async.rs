#![cfg(feature = "async")]

use bq25703a_rs::data_types::{ChargingState, ConnectionState};
use bq25703a_rs::driver::Bq25703a;
use bq25703a_rs::{ChargerState, CycleOutcome, Regulator, RegulatorConfig};
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
use embedded_hal::digital::{ErrorType, OutputPin};
use embedded_hal::i2c::ErrorKind;
use embedded_hal_mock::eh1::i2c::{Mock as I2cMock, Transaction as I2cTrans};

const ADDR: u8 = 0x6B;

struct NoFan;

impl ErrorType for NoFan {
    type Error = core::convert::Infallible;
}

impl OutputPin for NoFan {
    fn set_low(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }

    fn set_high(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

#[tokio::test]
async fn async_init_and_cycle() {
    let expectations = [
        I2cTrans::write_read(ADDR, vec![0x2E], vec![0x40, 0x78]),
        I2cTrans::write_read(ADDR, vec![0x00], vec![0x0E, 0xE2]),
        I2cTrans::write(ADDR, vec![0x00, 0x0F, 0x66]),
        I2cTrans::write(ADDR, vec![0x3A, 0x7F, 0xE0]),
        I2cTrans::write_read(ADDR, vec![0x26], vec![10, 91, 0, 20, 0, 40, 16, 17]),
        I2cTrans::write_read(ADDR, vec![0x20], vec![0x00, 0x84]),
        I2cTrans::write_read(ADDR, vec![0x25], vec![0x64]),
        I2cTrans::write(ADDR, vec![0x02, 0xC0, 0x1F]),
        I2cTrans::write(ADDR, vec![0x04, 0x60, 0x10]),
        I2cTrans::write(ADDR, vec![0x0D, 0x0E]),
        I2cTrans::write(ADDR, vec![0x0F, 0x64]),
        I2cTrans::write(ADDR, vec![0x00, 0x0E, 0x66]),
        // VBAT 4288 mV: inhibit first
        I2cTrans::write_read(ADDR, vec![0x26], vec![10, 91, 0, 20, 0, 40, 22, 17]),
        I2cTrans::write_read(ADDR, vec![0x20], vec![0x00, 0x84]),
        I2cTrans::write_read(ADDR, vec![0x25], vec![0x64]),
        I2cTrans::write(ADDR, vec![0x00, 0x0F, 0x66]),
        I2cTrans::write(ADDR, vec![0x02, 0xC0, 0x1F]),
        I2cTrans::write(ADDR, vec![0x04, 0x60, 0x10]),
        I2cTrans::write(ADDR, vec![0x0D, 0x0E]),
        I2cTrans::write(ADDR, vec![0x0F, 0x64]),
    ];

    let state = ChargerState::<NoopRawMutex>::new();
    state.set_power_budget_mw(Some(100_000));
    let mut reg = Regulator::new(I2cMock::new(&expectations), || Some(25), NoFan, RegulatorConfig::default()).unwrap();
    reg.start_async(&state).await.unwrap();

    assert_eq!(reg.poll_async(&state).await, CycleOutcome::Published);
    assert_eq!(state.connection_state(), ConnectionState::Connected);
    assert_eq!(state.charging_state(), ChargingState::Charging);

    assert_eq!(reg.poll_async(&state).await, CycleOutcome::Published);
    assert_eq!(state.connection_state(), ConnectionState::Fault);
    reg.release().0.done();
}

#[tokio::test]
async fn async_comm_fault_after_threshold() {
    let failed = || I2cTrans::write_read(ADDR, vec![0x26], vec![0; 8]).with_error(ErrorKind::Other);
    let expectations = [
        I2cTrans::write_read(ADDR, vec![0x2E], vec![0x40, 0x78]),
        I2cTrans::write_read(ADDR, vec![0x00], vec![0x0E, 0xE2]),
        I2cTrans::write(ADDR, vec![0x00, 0x0F, 0x66]),
        I2cTrans::write(ADDR, vec![0x3A, 0x7F, 0xE0]),
        failed(),
        failed(),
        failed(),
    ];

    let state = ChargerState::<NoopRawMutex>::new();
    let mut reg = Regulator::new(I2cMock::new(&expectations), || Some(25), NoFan, RegulatorConfig::default()).unwrap();
    reg.start_async(&state).await.unwrap();
    reg.poll_async(&state).await;
    reg.poll_async(&state).await;
    // charging was never enabled, so no inhibit write is needed
    assert_eq!(reg.poll_async(&state).await, CycleOutcome::CommFault);
    assert_eq!(state.connection_state(), ConnectionState::Fault);
    reg.release().0.done();
}

#[tokio::test]
async fn async_driver_limits_readback() {
    let expectations = [
        I2cTrans::write_read(ADDR, vec![0x02], vec![0xC0, 0x1F]),
        I2cTrans::write(ADDR, vec![0x0F, 0x0A]),
    ];
    let mut driver = Bq25703a::new(I2cMock::new(&expectations));
    assert_eq!(driver.get_charge_current_ma_async().await.unwrap(), 8_128);
    driver.set_input_current_limit_ma_async(500).await.unwrap();
    driver.free().done();
}
