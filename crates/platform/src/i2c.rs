//! Bit-banged I2C master over a two-register CSR block.
//!
//! The SoC exposes SCL/SDA as a write register (drive) and a read register
//! (sense). SDA is open-drain: OE=0 releases the line to its pull-up. The
//! timing follows the usual quarter-period scheme; every edge is separated
//! by one quarter of the bit period.
//!
//! | Offset | Name | Fields                       |
//! |--------|------|------------------------------|
//! | 0x00   | W    | SCL\[0\], OE\[1\], SDA\[2\]  |
//! | 0x04   | R    | SDA\[0\]                     |

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::csr::{Csr, Field};

/// Register offsets.
pub mod reg {
    use crate::csr::Register;

    /// Line drive.
    pub const W: Register = Register::at(0x00);
    /// Line sense.
    pub const R: Register = Register::at(0x04);
}

/// W.SCL
pub const W_SCL: Field = Field::bit(0);
/// W.OE: 1 drives SDA, 0 releases it.
pub const W_OE: Field = Field::bit(1);
/// W.SDA
pub const W_SDA: Field = Field::bit(2);
/// R.SDA
pub const R_SDA: Field = Field::bit(0);

/// Quarter of a 100 kHz bit period.
pub const DEFAULT_QUARTER_PERIOD_NS: u32 = 2_500;

/// Recover a wedged bus: clock out whatever a target is still driving and
/// leave the lines idle.
pub trait BusReset {
    /// Run the recovery sequence.
    fn reset_bus(&mut self);
}

/// Bit-bang bus errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum I2cError {
    /// The target did not pull SDA low in the acknowledge slot.
    NoAcknowledge(NoAcknowledgeSource),
}

impl embedded_hal::i2c::Error for I2cError {
    fn kind(&self) -> ErrorKind {
        match *self {
            Self::NoAcknowledge(src) => ErrorKind::NoAcknowledge(src),
        }
    }
}

/// I2C master driven through the W/R CSR pair.
pub struct BitBangI2c<C, D> {
    csr: C,
    delay: D,
    quarter_ns: u32,
}

impl<C: Csr, D: DelayNs> BitBangI2c<C, D> {
    /// Bus at 100 kHz.
    pub fn new(csr: C, delay: D) -> Self {
        Self {
            csr,
            delay,
            quarter_ns: DEFAULT_QUARTER_PERIOD_NS,
        }
    }

    /// Give back the CSR block and delay.
    pub fn release(self) -> (C, D) {
        (self.csr, self.delay)
    }

    fn drive(&mut self, oe: bool, scl: bool, sda: bool) {
        let w = W_OE.encode(u32::from(oe)) | W_SCL.encode(u32::from(scl)) | W_SDA.encode(u32::from(sda));
        self.csr.write(reg::W, w);
    }

    fn pause(&mut self, quarters: u32) {
        self.delay.delay_ns(self.quarter_ns.saturating_mul(quarters));
    }

    fn sense_sda(&self) -> bool {
        R_SDA.is_set(self.csr.read(reg::R))
    }

    fn start(&mut self) {
        self.drive(true, true, true);
        self.pause(1);
        self.drive(true, true, false);
        self.pause(1);
        self.drive(true, false, false);
        self.pause(1);
    }

    fn stop(&mut self) {
        self.drive(true, false, false);
        self.pause(1);
        self.drive(true, true, false);
        self.pause(1);
        self.drive(true, true, true);
        self.pause(1);
        self.drive(false, true, true);
        self.pause(1);
    }

    fn write_bit(&mut self, bit: bool) {
        self.drive(true, false, bit);
        self.pause(1);
        self.drive(true, true, bit);
        self.pause(2);
        self.drive(true, false, bit);
        self.pause(1);
    }

    fn read_bit(&mut self) -> bool {
        self.drive(false, false, false);
        self.pause(1);
        self.drive(false, true, false);
        self.pause(1);
        let bit = self.sense_sda();
        self.pause(1);
        self.drive(false, false, false);
        self.pause(1);
        bit
    }

    /// Shift a byte out MSB first. Returns true if the target acknowledged.
    #[allow(clippy::arithmetic_side_effects)]
    fn write_byte(&mut self, byte: u8) -> bool {
        for i in (0..8).rev() {
            self.write_bit((byte >> i) & 1 == 1);
        }
        !self.read_bit()
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn read_byte(&mut self, ack: bool) -> u8 {
        let mut byte = 0u8;
        for _ in 0..8 {
            byte = (byte << 1) | u8::from(self.read_bit());
        }
        self.write_bit(!ack);
        byte
    }

    #[allow(clippy::arithmetic_side_effects)]
    fn address(&mut self, address: u8, read: bool) -> Result<(), I2cError> {
        self.start();
        if self.write_byte((address << 1) | u8::from(read)) {
            Ok(())
        } else {
            Err(I2cError::NoAcknowledge(NoAcknowledgeSource::Address))
        }
    }

    fn run(&mut self, address: u8, operations: &mut [Operation<'_>]) -> Result<(), I2cError> {
        // Some(true) after a read, Some(false) after a write.
        let mut last_was_read: Option<bool> = None;
        let mut ops = operations.iter_mut().peekable();
        while let Some(op) = ops.next() {
            let next_is_read = matches!(ops.peek(), Some(Operation::Read(_)));
            match op {
                Operation::Write(bytes) => {
                    if last_was_read != Some(false) {
                        self.address(address, false)?;
                    }
                    for &byte in bytes.iter() {
                        if !self.write_byte(byte) {
                            return Err(I2cError::NoAcknowledge(NoAcknowledgeSource::Data));
                        }
                    }
                    last_was_read = Some(false);
                }
                Operation::Read(buf) => {
                    if last_was_read != Some(true) {
                        self.address(address, true)?;
                    }
                    let len = buf.len();
                    for (i, slot) in buf.iter_mut().enumerate() {
                        // NACK the final byte before a STOP or a repeated START.
                        let last = i.saturating_add(1) == len && !next_is_read;
                        *slot = self.read_byte(!last);
                    }
                    last_was_read = Some(true);
                }
            }
        }
        Ok(())
    }
}

impl<C: Csr, D: DelayNs> ErrorType for BitBangI2c<C, D> {
    type Error = I2cError;
}

impl<C: Csr, D: DelayNs> I2c for BitBangI2c<C, D> {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let result = self.run(address, operations);
        self.stop();
        if let Err(I2cError::NoAcknowledge(_)) = result {
            debug!("i2c nack from {:#x}", address);
        }
        result
    }
}

impl<C: Csr, D: DelayNs> BusReset for BitBangI2c<C, D> {
    fn reset_bus(&mut self) {
        self.drive(true, true, true);
        self.pause(2);
        for _ in 0..9 {
            self.drive(true, false, true);
            self.pause(1);
            self.drive(true, true, true);
            self.pause(1);
        }
        self.drive(false, false, true);
        self.pause(1);
        self.stop();
        self.drive(false, true, true);
        self.pause(8);
    }
}

#[cfg(test)]
#[allow(clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::mocks::SimRegisterFile;
    use embedded_hal_mock::eh1::delay::NoopDelay;

    const BASE: u32 = 0x3000;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Event {
        Start,
        Stop,
        Bit(bool),
    }

    /// Decode the master's view of the bus from the W register history.
    fn decode(w_writes: &[u32]) -> Vec<Event> {
        let mut events = Vec::new();
        let (mut scl, mut sda) = (true, true);
        for &w in w_writes {
            let n_scl = W_SCL.is_set(w);
            let n_sda = !W_OE.is_set(w) || W_SDA.is_set(w);
            if scl && n_scl && sda && !n_sda {
                events.push(Event::Start);
            } else if scl && n_scl && !sda && n_sda {
                events.push(Event::Stop);
            } else if !scl && n_scl {
                events.push(Event::Bit(n_sda));
            }
            scl = n_scl;
            sda = n_sda;
        }
        events
    }

    /// Bytes of each START..STOP/START segment, ACK slot dropped.
    fn segments(events: &[Event]) -> Vec<Vec<u8>> {
        let mut out = Vec::new();
        let mut bits: Option<Vec<bool>> = None;
        for e in events {
            match e {
                Event::Start => {
                    if let Some(b) = bits.take() {
                        out.push(b);
                    }
                    bits = Some(Vec::new());
                }
                Event::Stop => {
                    if let Some(b) = bits.take() {
                        out.push(b);
                    }
                }
                Event::Bit(v) => {
                    if let Some(b) = bits.as_mut() {
                        b.push(*v);
                    }
                }
            }
        }
        out.iter()
            .map(|b| {
                b.chunks_exact(9)
                    .map(|c| c[..8].iter().fold(0u8, |acc, &bit| (acc << 1) | u8::from(bit)))
                    .collect()
            })
            .collect()
    }

    fn bus(sda_sense: u32) -> (crate::mocks::SharedRegisterFile, BitBangI2c<crate::mocks::SimBlock, NoopDelay>) {
        let sim = SimRegisterFile::shared();
        sim.borrow_mut().set(BASE + reg::R.offset(), sda_sense);
        let i2c = BitBangI2c::new(SimRegisterFile::block(&sim, BASE), NoopDelay::new());
        (sim, i2c)
    }

    #[test]
    fn write_shifts_address_then_payload() {
        let (sim, mut i2c) = bus(0);
        i2c.write(0x48, &[0x02, 0x00, 0x0A]).unwrap();
        let events = decode(&sim.borrow().writes_to(BASE));
        assert_eq!(events.first(), Some(&Event::Start));
        assert_eq!(events.last(), Some(&Event::Stop));
        assert_eq!(segments(&events), vec![vec![0x90, 0x02, 0x00, 0x0A]]);
    }

    #[test]
    fn absent_target_nacks_address_and_bus_is_stopped() {
        let (sim, mut i2c) = bus(1);
        let err = i2c.write(0x48, &[0x01, 0x00, 0x00]).unwrap_err();
        assert_eq!(err, I2cError::NoAcknowledge(NoAcknowledgeSource::Address));
        let events = decode(&sim.borrow().writes_to(BASE));
        assert_eq!(events.last(), Some(&Event::Stop));
        assert_eq!(segments(&events), vec![vec![0x90]]);
    }

    #[test]
    fn write_read_uses_repeated_start_with_read_address() {
        let (sim, mut i2c) = bus(0);
        let mut buf = [0xAAu8; 2];
        i2c.write_read(0x48, &[0x02], &mut buf).unwrap();
        assert_eq!(buf, [0x00, 0x00]);
        let events = decode(&sim.borrow().writes_to(BASE));
        let starts = events.iter().filter(|e| **e == Event::Start).count();
        let stops = events.iter().filter(|e| **e == Event::Stop).count();
        assert_eq!((starts, stops), (2, 1));
        let segs = segments(&events);
        assert_eq!(segs[0], vec![0x90, 0x02]);
        assert_eq!(segs[1][0], 0x91);
    }

    #[test]
    fn bus_reset_clocks_nine_pulses_then_stops() {
        let (sim, mut i2c) = bus(1);
        i2c.reset_bus();
        let events = decode(&sim.borrow().writes_to(BASE));
        let pulses = events.iter().take_while(|e| matches!(e, Event::Bit(true))).count();
        assert_eq!(pulses, 9);
        assert!(events.contains(&Event::Stop));
        let last = *sim.borrow().writes_to(BASE).last().unwrap();
        assert!(W_SCL.is_set(last) && !W_OE.is_set(last));
    }
}
