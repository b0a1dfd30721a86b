//! BQ25703A charge regulation loop.
//!
//! A no-std driver and periodic control task for the TI BQ25703A buck-boost battery charger:
//! register codecs, ADC telemetry scaling, thermal throttling with a hysteretic fan,
//! a connection/charging state machine with overvoltage disconnect, and a mutex-protected
//! snapshot other tasks can read. Optional async and defmt support.

#![no_std]

pub(crate) mod fmt;

pub mod config;
pub mod controller;
pub mod data_types;
pub mod driver;
pub mod error;
pub mod registers;
pub mod regulator;
pub mod state;
pub mod telemetry;
pub mod thermal;

pub use config::RegulatorConfig;
pub use driver::Bq25703a;
pub use error::{BusFault, Error};
pub use registers::DEFAULT_I2C_ADDRESS;
pub use regulator::{CycleOutcome, Regulator};
pub use state::ChargerState;
pub use thermal::TemperatureSensor;
