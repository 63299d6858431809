//! Console report protocol.
//!
//! One line per event, parsed by the bench harness and by `xtask judge`:
//!
//! ```text
//! Test:<name>, Start
//! Test:<name>|Pass
//! Test:<name>|Fail, <reason>
//! Test:<name>, Finish
//! Info:<key>=<value>
//! CH=<i>, DAC=<v>, ADC=<r>
//! Test:DONE, Finish
//! ```
//!
//! Prefixes and field order are fixed; harnesses match on them literally.

use core::fmt::{self, Display, Write};

use platform::DacChannel;

/// Prefix of step lines.
pub const TEST_PREFIX: &str = "Test:";
/// Prefix of measurement lines.
pub const INFO_PREFIX: &str = "Info:";
/// Step name of the completion marker.
pub const DONE: &str = "DONE";

/// Writes report lines to a console.
///
/// Console write errors are dropped; there is nowhere else to report them.
pub struct Report<W> {
    out: W,
}

impl<W: Write> Report<W> {
    /// Report on `out`.
    pub fn new(out: W) -> Self {
        Self { out }
    }

    /// Give back the console.
    pub fn into_inner(self) -> W {
        self.out
    }

    fn line(&mut self, args: fmt::Arguments<'_>) {
        let _ = self.out.write_fmt(args);
        let _ = self.out.write_char('\n');
    }

    /// `Test:<name>, Start`
    pub fn start(&mut self, name: &str) {
        self.line(format_args!("{TEST_PREFIX}{name}, Start"));
    }

    /// `Test:<name>|Pass`
    pub fn pass(&mut self, name: &str) {
        self.line(format_args!("{TEST_PREFIX}{name}|Pass"));
    }

    /// `Test:<name>|Fail, <reason>`
    pub fn fail(&mut self, name: &str, reason: impl Display) {
        self.line(format_args!("{TEST_PREFIX}{name}|Fail, {reason}"));
    }

    /// `Test:<name>, Finish`
    pub fn finish(&mut self, name: &str) {
        self.line(format_args!("{TEST_PREFIX}{name}, Finish"));
    }

    /// `Test:DONE, Finish`
    pub fn done(&mut self) {
        self.finish(DONE);
    }

    /// `Info:<key>=<value>`
    pub fn info(&mut self, key: impl Display, value: impl Display) {
        self.line(format_args!("{INFO_PREFIX}{key}={value}"));
    }

    /// `Info:ADC-<rail>=<raw>`
    pub fn rail(&mut self, rail: &str, raw: u32) {
        self.info(format_args!("ADC-{rail}"), raw);
    }

    /// `CH=<i>, DAC=<v>, ADC=<r>`
    pub fn sweep(&mut self, channel: DacChannel, dac: u16, adc: u32) {
        self.line(format_args!("CH={}, DAC={dac}, ADC={adc}", channel.get()));
    }
}

/// Byte string as comma-separated `0x..` values.
pub struct Hex<'a>(pub &'a [u8]);

impl Display for Hex<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, b) in self.0.iter().enumerate() {
            if i > 0 {
                f.write_char(',')?;
            }
            write!(f, "{b:#04x}")?;
        }
        Ok(())
    }
}
