//! OrangeCrab bring-up firmware
//!
//! Diagnostic firmware run once per board on the production test fixture.
//! It walks a fixed plan of checks and prints one console line per event
//! for the bench harness to judge.
//!
//! # Architecture
//!
//! ```text
//! Entry point (main.rs, hardware only)
//!         ↓
//! Sequencer (plan order, failure policy, report lines)
//!         ↓
//! Steps on Board (flash, DDR, I2C, GPIO, DAC, ADC, BATT, LED)
//!         ↓
//! Platform drivers (platform crate)
//! ```
//!
//! Everything above the entry point builds on the host and runs against the
//! platform crate's simulated register file.
//!
//! # Features
//!
//! - `hardware` - Build the RISC-V firmware image (riscv-rt, panic-halt)
//! - `hang-forever` - Status polls never time out
//! - `std` - Enable standard library (host testing)
//! - `defmt-logging` - Log over RTT with defmt
//! - `tracing` - Log through `tracing` on the host
//!
//! ## Hardware Target
//!
//! ```bash
//! LITEX_BSP_DIR=build/software cargo build --release \
//!     --target riscv32i-unknown-none-elf --features hardware
//! ```

#![cfg_attr(all(not(test), not(feature = "std")), no_std)]
#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![deny(unsafe_op_in_unsafe_fn)]
// unsafe fn body is not implicitly unsafe block
// Logging discipline
#![warn(clippy::print_stdout)] // prefer tracing/defmt over println! in lib code
#![warn(clippy::dbg_macro)] // dbg! should not be left in committed code
// Intentional allows for this codebase:
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)] // step errors are reported, not documented
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::doc_markdown)]

#[macro_use]
mod fmt;

pub mod board;
pub mod config;
pub mod plan;
pub mod report;
pub mod sequencer;
pub mod steps;

pub use board::{Board, MemoryTrainer};
pub use plan::{FailurePolicy, StepDescriptor, StepId, PRODUCTION_PLAN};
pub use report::Report;
pub use sequencer::{Diagnostics, FailReason, RunOutcome, Sequencer, TestResult};
