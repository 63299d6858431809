//! Channel newtypes for compile-time safety.
//!
//! - `AdcChannel`: analog sense multiplexer input, 0–15
//! - `DacChannel`: DAC53608 output, 0–7

// ── Error type ───────────────────────────────────────────────────────────────

/// Error returned when a value is out of the valid range.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct OutOfRangeError {
    /// The value that was out of range.
    pub value: u32,
    /// The inclusive minimum allowed value.
    pub min: u32,
    /// The inclusive maximum allowed value.
    pub max: u32,
}

impl core::fmt::Display for OutOfRangeError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "{} not in {}..={}", self.value, self.min, self.max)
    }
}

// ── AdcChannel ───────────────────────────────────────────────────────────────

/// Analog sense multiplexer input.
///
/// The channel field in the sense block's control register is four bits
/// wide, so valid channels are 0–15. Construct with [`AdcChannel::new`]
/// (clamping) or [`AdcChannel::try_new`] (fallible, strict).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct AdcChannel(u8);

impl AdcChannel {
    /// Highest multiplexer input.
    pub const MAX: u8 = 15;

    /// Create an `AdcChannel`, clamping values above 15 to 15.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(value)
        }
    }

    /// Create an `AdcChannel`, returning an error if `value > 15`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value > 15`.
    pub fn try_new(value: u8) -> Result<Self, OutOfRangeError> {
        if value > Self::MAX {
            Err(OutOfRangeError {
                value: u32::from(value),
                min: 0,
                max: u32::from(Self::MAX),
            })
        } else {
            Ok(Self(value))
        }
    }

    /// Return the channel index (0–15).
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }
}

// ── DacChannel ───────────────────────────────────────────────────────────────

/// DAC53608 output channel (A–H mapped to 0–7).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
#[repr(transparent)]
pub struct DacChannel(u8);

impl DacChannel {
    /// Highest output channel.
    pub const MAX: u8 = 7;

    /// Create a `DacChannel`, clamping values above 7 to 7.
    #[must_use]
    pub const fn new(value: u8) -> Self {
        if value > Self::MAX {
            Self(Self::MAX)
        } else {
            Self(value)
        }
    }

    /// Create a `DacChannel`, returning an error if `value > 7`.
    ///
    /// # Errors
    ///
    /// Returns [`OutOfRangeError`] if `value > 7`.
    pub fn try_new(value: u8) -> Result<Self, OutOfRangeError> {
        if value > Self::MAX {
            Err(OutOfRangeError {
                value: u32::from(value),
                min: 0,
                max: u32::from(Self::MAX),
            })
        } else {
            Ok(Self(value))
        }
    }

    /// Return the channel index (0–7).
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    /// All eight outputs in order.
    pub fn all() -> impl Iterator<Item = Self> {
        (0..=Self::MAX).map(Self)
    }
}
