//! Error definitions for the BQ25703A driver and regulation loop.

use embedded_hal::i2c::ErrorKind;

#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Debug)]
pub enum Error<I2cError> {
    /// Underlying I2C transaction failed.
    I2c(I2cError),
    /// Manufacturer or device ID did not match the BQ25703A.
    WrongDevice { manufacturer_id: u8, device_id: u8 },
    /// Provided parameter was outside datasheet or safety limits.
    OutOfRange,
    /// Inconsistent configuration.
    InvalidConfig,
}

/// Transport failure classes the regulation loop distinguishes.
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum BusFault {
    /// The transaction did not complete within the transport timeout.
    Timeout,
    /// Address or data byte was not acknowledged.
    Nack,
    /// Bus error, arbitration loss or overrun.
    Bus,
}

impl<I2cError: embedded_hal::i2c::Error> Error<I2cError> {
    /// Classify a transport failure. Returns `None` for errors that did not come from the bus.
    ///
    /// HALs report their transaction timeout as [`ErrorKind::Other`].
    pub fn bus_fault(&self) -> Option<BusFault> {
        match self {
            Error::I2c(e) => Some(match e.kind() {
                ErrorKind::NoAcknowledge(_) => BusFault::Nack,
                ErrorKind::Other => BusFault::Timeout,
                _ => BusFault::Bus,
            }),
            _ => None,
        }
    }
}

impl<I2cError: core::fmt::Debug> core::fmt::Display for Error<I2cError> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Error::I2c(e) => write!(f, "I2C error: {:?}", e),
            Error::WrongDevice {
                manufacturer_id,
                device_id,
            } => write!(
                f,
                "unexpected device: manufacturer 0x{:02x}, device 0x{:02x}",
                manufacturer_id, device_id
            ),
            Error::OutOfRange => write!(f, "parameter out of range"),
            Error::InvalidConfig => write!(f, "invalid configuration"),
        }
    }
}
