//! Configuration flash identification (W25Q128JV-class SPI NOR).
//!
//! Two reads identify the part: Read Manufacturer/Device ID (0x90, three
//! address bytes, two bytes back) and Read JEDEC ID (0x9F, three bytes
//! back). They are concatenated into a five-byte identity. The factory
//! unique ID (0x4B, four dummy bytes, eight bytes back) is informational.
//!
//! [`BitBangFlashSpi`] is the [`SpiDevice`] for the SoC's flash bit-bang
//! port; [`SpiFlash`] works over any `SpiDevice`.

use embedded_hal::delay::DelayNs;
use embedded_hal::spi::{ErrorType, Operation, SpiDevice};

use crate::csr::{Csr, Field};
use crate::error::{Error, Peripheral};

/// Flash opcodes.
pub mod cmd {
    /// Read Manufacturer / Device ID.
    pub const READ_MANUFACTURER_ID: u8 = 0x90;
    /// Read JEDEC ID.
    pub const READ_JEDEC_ID: u8 = 0x9F;
    /// Read Unique ID.
    pub const READ_UNIQUE_ID: u8 = 0x4B;
}

/// Bytes in the concatenated identity.
pub const ID_LEN: usize = 5;
/// Bytes in the factory unique ID.
pub const UUID_LEN: usize = 8;

/// Identity reads on a flash device.
pub trait FlashIdentity {
    /// Manufacturer/device ID followed by the JEDEC ID.
    fn read_id(&mut self) -> Result<[u8; ID_LEN], Error>;

    /// Factory-programmed unique ID.
    fn read_uuid(&mut self) -> Result<[u8; UUID_LEN], Error>;
}

/// SPI NOR flash on any `SpiDevice`.
pub struct SpiFlash<D> {
    spi: D,
}

impl<D: SpiDevice> SpiFlash<D> {
    /// Wrap the device.
    pub fn new(spi: D) -> Self {
        Self { spi }
    }

    /// Give back the device.
    pub fn release(self) -> D {
        self.spi
    }

    fn command(&mut self, header: &[u8], response: &mut [u8]) -> Result<(), Error> {
        self.spi
            .transaction(&mut [Operation::Write(header), Operation::Read(response)])
            .map_err(|_| Error::Bus(Peripheral::Flash))
    }
}

impl<D: SpiDevice> FlashIdentity for SpiFlash<D> {
    fn read_id(&mut self) -> Result<[u8; ID_LEN], Error> {
        let mut id = [0u8; ID_LEN];
        let (manufacturer, jedec) = id.split_at_mut(2);
        self.command(&[cmd::READ_MANUFACTURER_ID, 0, 0, 0], manufacturer)?;
        self.command(&[cmd::READ_JEDEC_ID], jedec)?;
        Ok(id)
    }

    fn read_uuid(&mut self) -> Result<[u8; UUID_LEN], Error> {
        let mut uuid = [0u8; UUID_LEN];
        self.command(&[cmd::READ_UNIQUE_ID, 0, 0, 0, 0], &mut uuid)?;
        Ok(uuid)
    }
}

// ── Bit-bang port ────────────────────────────────────────────────────────────

/// Register offsets of the flash bit-bang port.
pub mod reg {
    use crate::csr::Register;

    /// Pin drive.
    pub const BITBANG: Register = Register::at(0x00);
    /// MISO sense.
    pub const MISO: Register = Register::at(0x04);
    /// Hand the pins from the memory-mapped reader to `BITBANG`.
    pub const BITBANG_EN: Register = Register::at(0x08);
}

/// BITBANG.MOSI
pub const BITBANG_MOSI: Field = Field::bit(0);
/// BITBANG.CLK
pub const BITBANG_CLK: Field = Field::bit(1);
/// BITBANG.CS_N
pub const BITBANG_CS_N: Field = Field::bit(2);
/// BITBANG.DIR: 1 tristates DQ0 for input.
pub const BITBANG_DIR: Field = Field::bit(3);

/// Mode-0 SPI device on the flash bit-bang port.
pub struct BitBangFlashSpi<C, D> {
    csr: C,
    delay: D,
}

impl<C: Csr, D: DelayNs> BitBangFlashSpi<C, D> {
    /// Wrap the port.
    pub fn new(csr: C, delay: D) -> Self {
        Self { csr, delay }
    }

    /// Clock one byte out MSB first and return the byte sampled on MISO.
    #[allow(clippy::arithmetic_side_effects)]
    fn clock_byte(&mut self, out: u8, input_only: bool) -> u8 {
        let dir = BITBANG_DIR.encode(u32::from(input_only));
        let mut byte = 0u8;
        for i in (0..8).rev() {
            let mosi = if input_only {
                0
            } else {
                BITBANG_MOSI.encode(u32::from((out >> i) & 1))
            };
            self.csr.write(reg::BITBANG, dir | mosi);
            self.csr
                .write(reg::BITBANG, dir | mosi | BITBANG_CLK.encode(1));
            let bit = u8::from(Field::bit(0).is_set(self.csr.read(reg::MISO)));
            byte = (byte << 1) | bit;
        }
        self.csr.write(reg::BITBANG, dir);
        byte
    }
}

impl<C: Csr, D: DelayNs> ErrorType for BitBangFlashSpi<C, D> {
    type Error = core::convert::Infallible;
}

impl<C: Csr, D: DelayNs> SpiDevice for BitBangFlashSpi<C, D> {
    fn transaction(&mut self, operations: &mut [Operation<'_, u8>]) -> Result<(), Self::Error> {
        self.csr.write(reg::BITBANG_EN, 1);
        self.csr.write(reg::BITBANG, 0);
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => {
                    for &b in bytes.iter() {
                        self.clock_byte(b, false);
                    }
                }
                Operation::Read(buf) => {
                    for slot in buf.iter_mut() {
                        *slot = self.clock_byte(0, true);
                    }
                }
                Operation::Transfer(read, write) => {
                    let n = read.len().max(write.len());
                    for i in 0..n {
                        let out = write.get(i).copied().unwrap_or(0);
                        let got = self.clock_byte(out, false);
                        if let Some(slot) = read.get_mut(i) {
                            *slot = got;
                        }
                    }
                }
                Operation::TransferInPlace(buf) => {
                    for b in buf.iter_mut() {
                        *b = self.clock_byte(*b, false);
                    }
                }
                Operation::DelayNs(ns) => self.delay.delay_ns(*ns),
            }
        }
        self.csr.write(reg::BITBANG, BITBANG_CS_N.encode(1));
        self.csr.write(reg::BITBANG_EN, 0);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mocks::SimRegisterFile;
    use embedded_hal_mock::eh1::delay::NoopDelay;
    use embedded_hal_mock::eh1::spi::{Mock as SpiMock, Transaction as SpiTransaction};

    const BASE: u32 = 0x6000;

    #[test]
    fn read_id_concatenates_manufacturer_and_jedec() {
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x90, 0, 0, 0]),
            SpiTransaction::read_vec(vec![0xef, 0x17]),
            SpiTransaction::transaction_end(),
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x9f]),
            SpiTransaction::read_vec(vec![0xef, 0x40, 0x18]),
            SpiTransaction::transaction_end(),
        ];
        let mut flash = SpiFlash::new(SpiMock::new(&expectations));
        assert_eq!(flash.read_id().unwrap(), [0xef, 0x17, 0xef, 0x40, 0x18]);
        flash.release().done();
    }

    #[test]
    fn read_uuid_sends_four_dummy_bytes() {
        let uuid = vec![1, 2, 3, 4, 5, 6, 7, 8];
        let expectations = [
            SpiTransaction::transaction_start(),
            SpiTransaction::write_vec(vec![0x4b, 0, 0, 0, 0]),
            SpiTransaction::read_vec(uuid.clone()),
            SpiTransaction::transaction_end(),
        ];
        let mut flash = SpiFlash::new(SpiMock::new(&expectations));
        assert_eq!(flash.read_uuid().unwrap().to_vec(), uuid);
        flash.release().done();
    }

    /// MOSI bits sampled on each CLK rising edge.
    fn mosi_bits(writes: &[u32]) -> Vec<bool> {
        let mut clk = false;
        let mut bits = Vec::new();
        for &w in writes {
            let n_clk = BITBANG_CLK.is_set(w);
            if !clk && n_clk {
                bits.push(BITBANG_MOSI.is_set(w));
            }
            clk = n_clk;
        }
        bits
    }

    #[test]
    fn bitbang_write_shifts_msb_first_with_cs_framing() {
        let sim = SimRegisterFile::shared();
        let mut port = BitBangFlashSpi::new(SimRegisterFile::block(&sim, BASE), NoopDelay::new());
        port.write(&[0x9f]).unwrap();
        let writes = sim.borrow().writes_to(BASE + reg::BITBANG.offset());
        assert_eq!(writes.first(), Some(&0));
        assert_eq!(writes.last(), Some(&BITBANG_CS_N.encode(1)));
        let bits = mosi_bits(&writes);
        assert_eq!(bits, [true, false, false, true, true, true, true, true]);
        assert_eq!(sim.borrow().writes_to(BASE + reg::BITBANG_EN.offset()), [1, 0]);
    }

    #[test]
    fn bitbang_read_samples_miso_and_tristates_dq0() {
        let sim = SimRegisterFile::shared();
        sim.borrow_mut().set(BASE + reg::MISO.offset(), 1);
        let mut port = BitBangFlashSpi::new(SimRegisterFile::block(&sim, BASE), NoopDelay::new());
        let mut buf = [0u8; 2];
        port.read(&mut buf).unwrap();
        assert_eq!(buf, [0xff, 0xff]);
        let writes = sim.borrow().writes_to(BASE + reg::BITBANG.offset());
        assert!(writes
            .iter()
            .filter(|w| BITBANG_CLK.is_set(**w))
            .all(|w| BITBANG_DIR.is_set(*w)));
    }

    #[test]
    fn identity_over_bitbang_reads_miso_bytes() {
        let sim = SimRegisterFile::shared();
        sim.borrow_mut().set(BASE + reg::MISO.offset(), 0);
        let port = BitBangFlashSpi::new(SimRegisterFile::block(&sim, BASE), NoopDelay::new());
        let mut flash = SpiFlash::new(port);
        assert_eq!(flash.read_id().unwrap(), [0; ID_LEN]);
        // Two transactions: CS released twice.
        let cs_releases = sim
            .borrow()
            .writes_to(BASE + reg::BITBANG.offset())
            .into_iter()
            .filter(|w| BITBANG_CS_N.is_set(*w))
            .count();
        assert_eq!(cs_releases, 2);
    }
}
