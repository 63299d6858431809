//! Analog sense block: a multiplexed single-shot converter.
//!
//! | Offset | Name    | Fields                         |
//! |--------|---------|--------------------------------|
//! | 0x00   | CONTROL | START\[0\], CHANNEL\[11:8\]    |
//! | 0x04   | STATUS  | DONE\[0\]                      |
//! | 0x08   | RESULT  | last conversion, raw counts    |

use crate::csr::{Csr, Field};
use crate::error::{Error, Peripheral};
use crate::poll::{wait_until, WaitPolicy};
use crate::types::AdcChannel;

/// Register offsets.
pub mod reg {
    use crate::csr::Register;

    /// Start and channel select.
    pub const CONTROL: Register = Register::at(0x00);
    /// Conversion complete flag.
    pub const STATUS: Register = Register::at(0x04);
    /// Conversion result.
    pub const RESULT: Register = Register::at(0x08);
}

/// CONTROL.START
pub const CONTROL_START: Field = Field::bit(0);
/// CONTROL.CHANNEL
pub const CONTROL_CHANNEL: Field = Field::new(8, 4);
/// STATUS.DONE
pub const STATUS_DONE: Field = Field::bit(0);

/// CONTROL word that starts a conversion on `channel`.
#[must_use]
pub const fn control_word(channel: AdcChannel) -> u32 {
    CONTROL_CHANNEL.encode(channel.get() as u32) | CONTROL_START.encode(1)
}

/// Analog sense block bound to a CSR block.
pub struct Asense<C> {
    csr: C,
    policy: WaitPolicy,
}

impl<C: Csr> Asense<C> {
    /// Wrap the block.
    pub fn new(csr: C, policy: WaitPolicy) -> Self {
        Self { csr, policy }
    }

    fn wait_done(&self) -> Result<(), Error> {
        let csr = &self.csr;
        wait_until(self.policy, || STATUS_DONE.is_set(csr.read(reg::STATUS)))
            .map_err(Error::timeout(Peripheral::Adc))
    }

    /// Convert one sample on `channel`.
    ///
    /// Waits for any previous conversion to finish before starting, so a
    /// back-to-back caller never restarts a busy converter.
    ///
    /// # Errors
    ///
    /// [`Error::Timeout`] if the converter never reports done.
    pub fn read_channel(&mut self, channel: AdcChannel) -> Result<u32, Error> {
        self.wait_done()?;
        self.csr.write(reg::CONTROL, control_word(channel));
        self.wait_done()?;
        Ok(self.csr.read(reg::RESULT))
    }
}
