//! Bring-up HAL for the OrangeCrab test fixture
//!
//! Drivers for the peripherals the diagnostic firmware exercises, written
//! against a small control/status register abstraction so every driver can
//! be tested on the host against a simulated register file.
//!
//! # Architecture Layers
//!
//! ```text
//! Diagnostic sequencer (firmware crate)
//!         ↓
//! Chip drivers (mcp23s08, dac53608, flash)
//!         ↓
//! Bus engines (spi, i2c, asense, gpio)
//!         ↓
//! CSR substrate (csr: MmioBlock on hardware, SimBlock in tests)
//! ```
//!
//! # Features
//!
//! - `std`: Enable standard library support and the [`mocks`] module
//! - `defmt`: Enable defmt logging and `defmt::Format` derives
//! - `tracing`: Route driver log output through `tracing`
//!
//! # Example
//!
//! ```no_run
//! use platform::{csr::MmioBlock, spi::SpiMaster, mcp23s08::Mcp23s08, WaitPolicy};
//!
//! // SAFETY: 0xe000_9000 is the SPI master CSR block on this SoC.
//! let block = unsafe { MmioBlock::new(0xe000_9000) };
//! let spi = SpiMaster::new(block, WaitPolicy::Forever);
//! let mut expander = Mcp23s08::new(spi, platform::spi::ChipSelect::line(0), 0);
//! let _ = expander.write(platform::mcp23s08::reg::IODIR, 0x00);
//! ```

// ── Lint policy ─────────────────────────────────────────────────────────────
#![deny(clippy::unwrap_used)] // no .unwrap() in production code
#![deny(clippy::expect_used)] // no .expect() in production code
#![deny(clippy::panic)] // no panic!() in production code
#![deny(clippy::unreachable)] // no unreachable!() that isn't documented
#![deny(unused_must_use)]
// all Results must be handled
// ────────────────────────────────────────────────────────────────────────────
#![cfg_attr(not(test), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)] // unsafe fn body is not implicitly unsafe block
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
// Pedantic lints suppressed for this hardware HAL crate:
#![allow(clippy::doc_markdown)] // hex addresses and register names in doc comments
#![allow(clippy::must_use_candidate)] // hardware accessors: callers decide
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]

#[cfg(all(feature = "std", not(test)))]
extern crate std;

// Must come first so the log macros are visible to every module below.
#[macro_use]
mod fmt;

pub mod asense;
pub mod csr;
pub mod dac53608;
pub mod error;
pub mod flash;
pub mod gpio;
pub mod i2c;
pub mod mcp23s08;
pub mod poll;
pub mod spi;
pub mod types;

pub mod mocks;

pub use asense::Asense;
pub use csr::{Csr, Field, MmioBlock, Register};
pub use dac53608::{Dac53608, IdReadback};
pub use error::{Error, Peripheral};
pub use flash::{BitBangFlashSpi, FlashIdentity, SpiFlash};
pub use gpio::{PinGroup, TristateBank};
pub use i2c::{BitBangI2c, BusReset};
pub use mcp23s08::Mcp23s08;
pub use poll::{Timeout, WaitPolicy};
pub use spi::{ChipSelect, Frame, SpiMaster};
pub use types::{AdcChannel, DacChannel, OutOfRangeError};
