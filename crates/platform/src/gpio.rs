//! Tristate GPIO banks.
//!
//! Each bank is three CSRs: output enable, input sense and output value.
//! A pin drives its `OUT` bit only while its `OE` bit is set; otherwise it
//! floats and `IN` reflects whatever the board pulls it to.

use core::convert::Infallible;

use crate::csr::Csr;

/// Register offsets.
pub mod reg {
    use crate::csr::Register;

    /// Output enable.
    pub const OE: Register = Register::at(0x00);
    /// Pin sense.
    pub const IN: Register = Register::at(0x04);
    /// Output value.
    pub const OUT: Register = Register::at(0x08);
}

/// Pin group operations
pub trait PinGroup {
    /// Error type
    type Error;

    /// Read all pins at once
    fn read(&self) -> Result<u32, Self::Error>;

    /// Write all pins at once
    fn write(&mut self, value: u32) -> Result<(), Self::Error>;

    /// Set specific pins high
    fn set_high(&mut self, mask: u32) -> Result<(), Self::Error>;

    /// Set specific pins low
    fn set_low(&mut self, mask: u32) -> Result<(), Self::Error>;
}

/// One tristate bank.
pub struct TristateBank<C> {
    csr: C,
}

impl<C: Csr> TristateBank<C> {
    /// Wrap the bank's CSR block.
    pub fn new(csr: C) -> Self {
        Self { csr }
    }

    /// Set which pins are driven.
    pub fn set_output_enable(&mut self, mask: u32) {
        self.csr.write(reg::OE, mask);
    }

    /// Currently driven pins.
    pub fn output_enable(&self) -> u32 {
        self.csr.read(reg::OE)
    }
}

impl<C: Csr> PinGroup for TristateBank<C> {
    type Error = Infallible;

    fn read(&self) -> Result<u32, Self::Error> {
        Ok(self.csr.read(reg::IN))
    }

    fn write(&mut self, value: u32) -> Result<(), Self::Error> {
        self.csr.write(reg::OUT, value);
        Ok(())
    }

    fn set_high(&mut self, mask: u32) -> Result<(), Self::Error> {
        self.csr.modify(reg::OUT, |v| v | mask);
        Ok(())
    }

    fn set_low(&mut self, mask: u32) -> Result<(), Self::Error> {
        self.csr.modify(reg::OUT, |v| v & !mask);
        Ok(())
    }
}
