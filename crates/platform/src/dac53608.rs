//! DAC53608 octal 10-bit buffered voltage DAC driver.
//!
//! Reference: Texas Instruments DAC53608 datasheet
//!
//! Registers are 16 bits wide and transferred MSB first. A register write is
//! `addr, hi, lo`; a read is a write of the pointer byte followed by a
//! repeated START and two data bytes.

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;

use crate::error::Error;
use crate::i2c::BusReset;
use crate::types::DacChannel;

/// 7-bit I2C address with A0 tied to AGND.
pub const DAC53608_I2C_ADDR: u8 = 0b100_1000;
/// DEVICE_CONFIG: per-channel power-down bits (1 = powered down).
pub const REG_DEVICE_CONFIG: u8 = 0x01;
/// STATUS/TRIGGER: device ID on read, soft reset/LDAC trigger on write.
pub const REG_STATUS_TRIGGER: u8 = 0x02;
/// BRDCAST: write all channels at once.
pub const REG_BRDCAST: u8 = 0x03;
/// DACA_DATA; channels B–H follow consecutively.
pub const REG_DACA_DATA: u8 = 0x08;

/// STATUS/TRIGGER value that triggers a software reset.
pub const SOFT_RESET: u16 = 0x000A;
/// DEVICE_CONFIG value with every channel powered up.
pub const ALL_CHANNELS_POWERED: u16 = 0x0000;
/// DEVICE_ID field value for the DAC53608.
pub const DEVICE_ID: u8 = 0b00_1100;

/// Hold after recovering the bus, before the first transaction.
pub const BUS_RESET_SETTLE_MS: u32 = 1;
/// Hold after a software reset, before reconfiguring.
pub const SOFT_RESET_SETTLE_MS: u32 = 10;

/// Data register for `channel` (DACA_DATA + index).
#[must_use]
#[allow(clippy::arithmetic_side_effects)]
pub const fn dac_register(channel: DacChannel) -> u8 {
    REG_DACA_DATA + channel.get()
}

/// Register value as transferred on the bus.
#[must_use]
pub const fn encode(value: u16) -> [u8; 2] {
    value.to_be_bytes()
}

/// Register value from the bus bytes.
#[must_use]
pub const fn decode(bytes: [u8; 2]) -> u16 {
    u16::from_be_bytes(bytes)
}

/// DEVICE_ID field of the STATUS register, bits \[11:6\].
#[must_use]
#[allow(clippy::cast_possible_truncation)]
pub const fn device_id(status: u16) -> u8 {
    ((status >> 6) & 0x3f) as u8
}

/// Result of reading the identity register.
///
/// The read never fails outright: a missing device shows up as
/// `acked == false` and the caller decides what that means.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct IdReadback {
    /// Raw STATUS register (zero when not acknowledged).
    pub raw: u16,
    /// Whether the device answered.
    pub acked: bool,
}

impl IdReadback {
    /// DEVICE_ID field of the readback.
    #[must_use]
    pub const fn device_id(self) -> u8 {
        device_id(self.raw)
    }

    /// True when the device answered with the DAC53608 identity.
    #[must_use]
    pub const fn is_dac53608(self) -> bool {
        self.acked && self.device_id() == DEVICE_ID
    }
}

/// DAC53608 on an I2C bus.
pub struct Dac53608<I> {
    i2c: I,
    addr: u8,
}

impl<I: I2c + BusReset> Dac53608<I> {
    /// Device at the default address.
    pub fn new(i2c: I) -> Self {
        Self::with_address(i2c, DAC53608_I2C_ADDR)
    }

    /// Device at `addr`.
    pub fn with_address(i2c: I, addr: u8) -> Self {
        Self { i2c, addr }
    }

    /// Recover the bus, soft-reset the device and power up every channel.
    ///
    /// # Errors
    ///
    /// [`Error::Nack`] if the device does not answer.
    pub fn reset(&mut self, delay: &mut impl DelayNs) -> Result<(), Error> {
        self.i2c.reset_bus();
        delay.delay_ms(BUS_RESET_SETTLE_MS);
        self.write_register(REG_STATUS_TRIGGER, SOFT_RESET)?;
        delay.delay_ms(SOFT_RESET_SETTLE_MS);
        self.write_register(REG_DEVICE_CONFIG, ALL_CHANNELS_POWERED)?;
        debug!("dac53608 reset complete");
        Ok(())
    }

    /// Read the STATUS register and report whether the device answered.
    pub fn read_id(&mut self) -> IdReadback {
        match self.read_register(REG_STATUS_TRIGGER) {
            Ok(raw) => IdReadback { raw, acked: true },
            Err(_) => IdReadback { raw: 0, acked: false },
        }
    }

    /// Set one output. Values wider than the converter are passed through;
    /// the device ignores the unused low bits.
    ///
    /// # Errors
    ///
    /// [`Error::Nack`] or [`Error::Bus`] from the I2C transaction.
    pub fn write_channel(&mut self, channel: DacChannel, value: u16) -> Result<(), Error> {
        self.write_register(dac_register(channel), value)
    }

    /// Write a 16-bit register.
    pub fn write_register(&mut self, reg: u8, value: u16) -> Result<(), Error> {
        let [hi, lo] = encode(value);
        self.i2c
            .write(self.addr, &[reg, hi, lo])
            .map_err(|e| Error::from_i2c(&e))
    }

    /// Read a 16-bit register.
    pub fn read_register(&mut self, reg: u8) -> Result<u16, Error> {
        let mut buf = [0u8; 2];
        self.i2c
            .write_read(self.addr, &[reg], &mut buf)
            .map_err(|e| Error::from_i2c(&e))?;
        Ok(decode(buf))
    }

    /// Give back the bus.
    pub fn release(self) -> I {
        self.i2c
    }
}
