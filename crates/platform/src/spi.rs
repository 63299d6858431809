//! SoC SPI master engine.
//!
//! A single-shot shifter: load MOSI, pulse START with the frame length, wait
//! for DONE, read MISO. Chip select is a bitmask register the CPU drives
//! around each frame.
//!
//! Register map (32-bit CSRs, 4-byte stride):
//!
//! | Offset | Name    | Fields                               |
//! |--------|---------|--------------------------------------|
//! | 0x00   | CONTROL | START\[0\] (self-clearing), LENGTH\[15:8\] |
//! | 0x04   | STATUS  | DONE\[0\] (0 while shifting)          |
//! | 0x08   | MOSI    | outgoing frame, right-aligned        |
//! | 0x0C   | MISO    | incoming frame, right-aligned        |
//! | 0x10   | CS      | one bit per chip-select line         |

use crate::csr::{Csr, Field};
use crate::error::{Error, Peripheral};
use crate::poll::{wait_until, WaitPolicy};

/// Register offsets.
pub mod reg {
    use crate::csr::Register;

    /// Control: start pulse and frame length.
    pub const CONTROL: Register = Register::at(0x00);
    /// Status: transfer complete flag.
    pub const STATUS: Register = Register::at(0x04);
    /// Outgoing data.
    pub const MOSI: Register = Register::at(0x08);
    /// Incoming data.
    pub const MISO: Register = Register::at(0x0C);
    /// Chip-select mask.
    pub const CS: Register = Register::at(0x10);
}

/// CONTROL.START: begin shifting.
pub const CONTROL_START: Field = Field::bit(0);
/// CONTROL.LENGTH: frame length in bits.
pub const CONTROL_LENGTH: Field = Field::new(8, 8);
/// STATUS.DONE: 1 when idle.
pub const STATUS_DONE: Field = Field::bit(0);

/// Frame width the master is synthesized for.
pub const FRAME_BITS: u8 = 24;

/// One bus frame: up to 32 bits, shifted MSB first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Frame {
    bits: u32,
    len: u8,
}

impl Frame {
    /// 24-bit frame `control:address:data`.
    #[must_use]
    pub const fn new24(control: u8, address: u8, data: u8) -> Self {
        Self {
            bits: u32::from_be_bytes([0, control, address, data]),
            len: FRAME_BITS,
        }
    }

    /// Raw right-aligned frame bits.
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.bits
    }

    /// Frame length in bits.
    #[must_use]
    pub const fn bit_len(self) -> u8 {
        self.len
    }

    /// CONTROL word that starts this frame.
    #[must_use]
    pub const fn control_word(self) -> u32 {
        CONTROL_LENGTH.encode(self.len as u32) | CONTROL_START.encode(1)
    }
}

/// One chip-select line, as a CS register mask.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct ChipSelect(u32);

impl ChipSelect {
    /// Chip-select line `n` (0–31). Larger values select nothing.
    #[must_use]
    pub const fn line(n: u8) -> Self {
        match 1u32.checked_shl(n as u32) {
            Some(mask) => Self(mask),
            None => Self(0),
        }
    }

    /// CS register mask.
    #[must_use]
    pub const fn mask(self) -> u32 {
        self.0
    }
}

/// SoC SPI master bound to a CSR block.
pub struct SpiMaster<C> {
    csr: C,
    policy: WaitPolicy,
}

impl<C: Csr> SpiMaster<C> {
    /// Wrap the master's CSR block.
    pub fn new(csr: C, policy: WaitPolicy) -> Self {
        Self { csr, policy }
    }

    /// Spin until the shifter reports DONE.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] when the policy gives up.
    pub fn wait_idle(&self) -> Result<(), Error> {
        let csr = &self.csr;
        wait_until(self.policy, || STATUS_DONE.is_set(csr.read(reg::STATUS)))
            .map_err(Error::timeout(Peripheral::Spi))
    }

    /// Shift one frame with `cs` asserted and return what came back.
    ///
    /// CS is released before returning, on success or timeout.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the master is busy before or after the frame.
    pub fn transfer(&mut self, cs: ChipSelect, frame: Frame) -> Result<u32, Error> {
        self.wait_idle()?;
        self.csr.write(reg::CS, cs.mask());
        self.csr.write(reg::MOSI, frame.bits());
        self.csr.write(reg::CONTROL, frame.control_word());
        let done = self.wait_idle();
        let miso = self.csr.read(reg::MISO);
        self.csr.write(reg::CS, 0);
        done.map(|()| miso)
    }

    /// Give back the CSR block.
    pub fn release(self) -> C {
        self.csr
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::SimRegisterFile;

    const BASE: u32 = 0x1000;

    #[test]
    fn new24_packs_control_address_data() {
        let f = Frame::new24(0x40, 0x09, 0xA5);
        assert_eq!(f.bits(), 0x0040_09A5);
        assert_eq!(f.bit_len(), 24);
    }

    #[test]
    fn control_word_carries_length_and_start() {
        assert_eq!(Frame::new24(0, 0, 0).control_word(), (24u32 << 8) | 1);
    }

    #[test]
    fn chip_select_line_is_one_hot() {
        assert_eq!(ChipSelect::line(0).mask(), 1);
        assert_eq!(ChipSelect::line(3).mask(), 8);
        assert_eq!(ChipSelect::line(40).mask(), 0);
    }

    #[test]
    fn transfer_writes_cs_mosi_control_then_releases_cs() {
        let sim = SimRegisterFile::shared();
        sim.borrow_mut().set(BASE + reg::STATUS.offset(), 1);
        sim.borrow_mut().set(BASE + reg::MISO.offset(), 0x0000_005A);
        let mut spi = SpiMaster::new(SimRegisterFile::block(&sim, BASE), WaitPolicy::Forever);

        let miso = spi.transfer(ChipSelect::line(0), Frame::new24(0x41, 0x09, 0)).unwrap();

        assert_eq!(miso, 0x5A);
        let expected: [(u32, u32); 4] = [
            (BASE + reg::CS.offset(), 1),
            (BASE + reg::MOSI.offset(), 0x0041_0900),
            (BASE + reg::CONTROL.offset(), (24 << 8) | 1),
            (BASE + reg::CS.offset(), 0),
        ];
        assert_eq!(sim.borrow().writes(), expected);
    }

    #[test]
    fn busy_master_times_out_under_bounded_policy() {
        let sim = SimRegisterFile::shared();
        let mut spi = SpiMaster::new(
            SimRegisterFile::block(&sim, BASE),
            WaitPolicy::Bounded { max_polls: 10 },
        );
        let r = spi.transfer(ChipSelect::line(0), Frame::new24(0x40, 0, 0));
        assert_eq!(r, Err(Error::Timeout(Peripheral::Spi)));
        // Never started, so CS was never touched.
        assert!(sim.borrow().writes().is_empty());
    }
}
