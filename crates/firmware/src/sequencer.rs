//! Runs a plan and turns step results into report lines.
//!
//! The sequencer owns the failure policy; steps only say what happened.
//! A fatal step prints `|Pass` or `|Fail, <reason>` and a failure stops the
//! run. An observational step always prints `, Finish`, with any driver
//! error noted as an `Info:<name>-ERROR` line first, and the run continues
//! so the harness still sees the data collected so far.

use core::fmt::{self, Write};

use crate::plan::{FailurePolicy, StepDescriptor, StepId};
use crate::report::Report;

// ── Step results ─────────────────────────────────────────────────────────────

/// Why a step failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailReason {
    /// A flash ID byte differs from the fitted part.
    FlashIdMismatch {
        /// First mismatching byte.
        index: usize,
        /// Expected value.
        expected: u8,
        /// Value read back.
        found: u8,
    },
    /// DRAM training reported failure.
    MemoryTraining,
    /// An I2C target did not acknowledge.
    NoAcknowledge,
    /// The header bank did not see the pattern the expander drove.
    LoopbackMismatch {
        /// Pattern written to the expander.
        driven: u8,
        /// Pattern read back from the header bank.
        observed: u8,
    },
    /// Any other driver error.
    Driver(platform::Error),
}

impl From<platform::Error> for FailReason {
    fn from(err: platform::Error) -> Self {
        match err {
            platform::Error::Nack => Self::NoAcknowledge,
            other => Self::Driver(other),
        }
    }
}

impl fmt::Display for FailReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FlashIdMismatch {
                index,
                expected,
                found,
            } => write!(
                f,
                "ID mismatch at byte {index}: expected {expected:#04x}, read {found:#04x}"
            ),
            Self::MemoryTraining => f.write_str("DDR3 init failure"),
            Self::NoAcknowledge => f.write_str("I2C no acknowledge"),
            Self::LoopbackMismatch { driven, observed } => write!(
                f,
                "GPIO mismatch: drove {driven:#04x}, read {observed:#04x}"
            ),
            Self::Driver(err) => write!(f, "{err}"),
        }
    }
}

/// Outcome of one step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TestResult {
    /// Step passed or finished collecting.
    Pass,
    /// Step failed.
    Fail(FailReason),
}

impl From<Result<(), FailReason>> for TestResult {
    fn from(result: Result<(), FailReason>) -> Self {
        match result {
            Ok(()) => Self::Pass,
            Err(reason) => Self::Fail(reason),
        }
    }
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum RunOutcome {
    /// Every step ran.
    Completed,
    /// A fatal step failed and later steps were skipped.
    Halted {
        /// Step that failed.
        step: StepId,
        /// Why.
        reason: FailReason,
    },
}

// ── Sequencer ────────────────────────────────────────────────────────────────

/// Something that can execute diagnostic steps.
pub trait Diagnostics<W: Write> {
    /// Run `step`, writing any measurement lines to `report`.
    ///
    /// Implementations write data lines only; the sequencer writes the
    /// `Start`, `Pass`, `Fail` and `Finish` lines around them.
    fn run_step(&mut self, step: StepId, report: &mut Report<W>) -> TestResult;
}

/// Drives a plan against a board.
pub struct Sequencer<B, W> {
    board: B,
    report: Report<W>,
}

impl<B, W> Sequencer<B, W>
where
    B: Diagnostics<W>,
    W: Write,
{
    /// Sequencer reporting on `report`.
    pub fn new(board: B, report: Report<W>) -> Self {
        Self { board, report }
    }

    /// Print the firmware identity line.
    pub fn banner(&mut self) {
        self.report.info(
            "FIRMWARE",
            format_args!("{} {}", crate::config::APP_NAME, crate::config::APP_VERSION),
        );
    }

    /// Run `plan` in order.
    ///
    /// `Test:DONE, Finish` is printed only when every step ran.
    pub fn run(&mut self, plan: &[StepDescriptor]) -> RunOutcome {
        for step in plan {
            let name = step.id.name();
            self.report.start(name);
            info!("step {} started", name);

            let result = self.board.run_step(step.id, &mut self.report);

            match (step.policy, result) {
                (FailurePolicy::Fatal, TestResult::Pass) => self.report.pass(name),
                (FailurePolicy::Fatal, TestResult::Fail(reason)) => {
                    self.report.fail(name, reason);
                    warn!("step {} failed, halting", name);
                    return RunOutcome::Halted {
                        step: step.id,
                        reason,
                    };
                }
                (FailurePolicy::Observational, TestResult::Pass) => self.report.finish(name),
                (FailurePolicy::Observational, TestResult::Fail(reason)) => {
                    self.report.info(format_args!("{name}-ERROR"), reason);
                    self.report.finish(name);
                    warn!("step {} aborted early", name);
                }
            }
        }

        self.report.done();
        info!("all steps complete");
        RunOutcome::Completed
    }

    /// Take the board and report back.
    pub fn into_parts(self) -> (B, Report<W>) {
        (self.board, self.report)
    }
}
