//! Driver error type shared by every peripheral in this crate.

use crate::poll::Timeout;

/// Peripheral that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Peripheral {
    /// SoC SPI master (IO expander).
    Spi,
    /// Bit-banged I2C bus (DAC).
    I2c,
    /// Analog sense block.
    Adc,
    /// Configuration flash.
    Flash,
}

impl Peripheral {
    /// Short label used in console output.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Spi => "SPI",
            Self::I2c => "I2C",
            Self::Adc => "ADC",
            Self::Flash => "FLASH",
        }
    }
}

/// Driver errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Error {
    /// A completion flag never asserted within the wait policy.
    Timeout(Peripheral),
    /// An I2C target did not acknowledge.
    Nack,
    /// Any other bus-level failure.
    Bus(Peripheral),
}

impl Error {
    /// Tag a poll timeout with the peripheral that was being polled.
    #[must_use]
    pub fn timeout(peripheral: Peripheral) -> impl Fn(Timeout) -> Self {
        move |_| Self::Timeout(peripheral)
    }

    /// Classify an `embedded-hal` I2C error.
    pub fn from_i2c<E: embedded_hal::i2c::Error>(err: &E) -> Self {
        match err.kind() {
            embedded_hal::i2c::ErrorKind::NoAcknowledge(_) => Self::Nack,
            _ => Self::Bus(Peripheral::I2c),
        }
    }
}

#[cfg(feature = "std")]
impl std::error::Error for Error {}

impl core::fmt::Display for Error {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            Self::Timeout(p) => write!(f, "{} timeout", p.label()),
            Self::Nack => write!(f, "I2C no acknowledge"),
            Self::Bus(p) => write!(f, "{} bus error", p.label()),
        }
    }
}
