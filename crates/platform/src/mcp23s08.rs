//! MCP23S08 8-bit SPI I/O expander driver.
//!
//! Reference: Microchip MCP23008/MCP23S08 datasheet
//!
//! Every access is one 24-bit frame: opcode, register address, data. The
//! opcode is `0100 0 A1 A0 R/W`; the data byte of a read frame is a don't
//! care and the register contents come back in the last byte of MISO.

use crate::csr::Csr;
use crate::error::Error;
use crate::spi::{ChipSelect, Frame, SpiMaster};

/// Fixed opcode bits (`0100_0000`).
pub const OPCODE_BASE: u8 = 0b0100_0000;
/// Opcode R/W bit: 1 = read.
pub const OPCODE_READ: u8 = 0b0000_0001;

/// Register addresses (IOCON.BANK = 0).
pub mod reg {
    /// I/O direction: 1 = input, 0 = output. Resets to 0xFF.
    pub const IODIR: u8 = 0x00;
    /// Input polarity.
    pub const IPOL: u8 = 0x01;
    /// Interrupt-on-change enable.
    pub const GPINTEN: u8 = 0x02;
    /// Default compare value.
    pub const DEFVAL: u8 = 0x03;
    /// Interrupt control.
    pub const INTCON: u8 = 0x04;
    /// Configuration.
    pub const IOCON: u8 = 0x05;
    /// Pull-up enable.
    pub const GPPU: u8 = 0x06;
    /// Interrupt flags.
    pub const INTF: u8 = 0x07;
    /// Interrupt capture.
    pub const INTCAP: u8 = 0x08;
    /// Port value. Writes land in OLAT.
    pub const GPIO: u8 = 0x09;
    /// Output latch.
    pub const OLAT: u8 = 0x0A;
}

/// Opcode for hardware address `hw_addr` (A1:A0, 0–3).
#[must_use]
pub const fn opcode(hw_addr: u8, read: bool) -> u8 {
    let rw = if read { OPCODE_READ } else { 0 };
    OPCODE_BASE | ((hw_addr & 0b11) << 1) | rw
}

/// Frame that writes `data` to `reg`.
#[must_use]
pub const fn write_frame(hw_addr: u8, reg: u8, data: u8) -> Frame {
    Frame::new24(opcode(hw_addr, false), reg, data)
}

/// Frame that reads `reg`.
#[must_use]
pub const fn read_frame(hw_addr: u8, reg: u8) -> Frame {
    Frame::new24(opcode(hw_addr, true), reg, 0)
}

/// MCP23S08 on a SoC SPI master.
pub struct Mcp23s08<C> {
    spi: SpiMaster<C>,
    cs: ChipSelect,
    hw_addr: u8,
}

impl<C: Csr> Mcp23s08<C> {
    /// Expander on chip-select `cs` strapped to hardware address `hw_addr`.
    pub fn new(spi: SpiMaster<C>, cs: ChipSelect, hw_addr: u8) -> Self {
        Self { spi, cs, hw_addr }
    }

    /// Write one register.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the SPI master never reports done.
    pub fn write(&mut self, reg: u8, data: u8) -> Result<(), Error> {
        trace!("mcp23s08 write {:#x} <- {:#x}", reg, data);
        self.spi
            .transfer(self.cs, write_frame(self.hw_addr, reg, data))
            .map(|_| ())
    }

    /// Read one register.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the SPI master never reports done.
    pub fn read(&mut self, reg: u8) -> Result<u8, Error> {
        let miso = self.spi.transfer(self.cs, read_frame(self.hw_addr, reg))?;
        Ok(miso.to_le_bytes()[0])
    }

    /// Set pin directions: 1 = input, 0 = output.
    pub fn set_direction(&mut self, inputs: u8) -> Result<(), Error> {
        self.write(reg::IODIR, inputs)
    }

    /// Drive the output pins.
    pub fn write_outputs(&mut self, value: u8) -> Result<(), Error> {
        self.write(reg::GPIO, value)
    }

    /// Give back the SPI master.
    pub fn release(self) -> SpiMaster<C> {
        self.spi
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::{Mcp23s08Model, SimRegisterFile};
    use crate::poll::WaitPolicy;
    use crate::spi;

    const BASE: u32 = 0x2000;

    fn expander() -> (crate::mocks::SharedRegisterFile, Mcp23s08<crate::mocks::SimBlock>) {
        let sim = SimRegisterFile::shared();
        sim.borrow_mut().attach(Mcp23s08Model::new(BASE, 1, 0));
        let spi = SpiMaster::new(SimRegisterFile::block(&sim, BASE), WaitPolicy::Forever);
        (sim, Mcp23s08::new(spi, ChipSelect::line(0), 0))
    }

    #[test]
    fn opcode_encodes_address_and_rw() {
        assert_eq!(opcode(0, false), 0x40);
        assert_eq!(opcode(0, true), 0x41);
        assert_eq!(opcode(3, true), 0x47);
        assert_eq!(opcode(7, false), 0x46);
    }

    #[test]
    fn write_frame_layout() {
        assert_eq!(write_frame(0, reg::GPIO, 0x3e).bits(), 0x0040_093e);
        assert_eq!(read_frame(0, reg::OLAT).bits(), 0x0041_0a00);
    }

    #[test]
    fn write_then_read_back_through_model() {
        let (_sim, mut exp) = expander();
        exp.set_direction(0x00).unwrap();
        exp.write_outputs(0x2a).unwrap();
        assert_eq!(exp.read(reg::OLAT).unwrap(), 0x2a);
        assert_eq!(exp.read(reg::IODIR).unwrap(), 0x00);
    }

    #[test]
    fn write_issues_one_24_bit_frame_on_cs0() {
        let (sim, mut exp) = expander();
        exp.write(reg::IODIR, 0x00).unwrap();
        let file = sim.borrow();
        assert_eq!(file.writes_to(BASE + spi::reg::MOSI.offset()), [0x0040_0000]);
        assert_eq!(file.writes_to(BASE + spi::reg::CS.offset()), [1, 0]);
    }

    #[test]
    fn wedged_master_reports_timeout() {
        let sim = SimRegisterFile::shared();
        sim.borrow_mut().attach(Mcp23s08Model::new(BASE, 1, 0).stuck_busy());
        let spi = SpiMaster::new(
            SimRegisterFile::block(&sim, BASE),
            WaitPolicy::Bounded { max_polls: 3 },
        );
        let mut exp = Mcp23s08::new(spi, ChipSelect::line(0), 0);
        assert_eq!(
            exp.write(reg::GPIO, 1),
            Err(Error::Timeout(crate::error::Peripheral::Spi))
        );
    }
}
