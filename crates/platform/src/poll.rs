//! Busy-wait with a configurable give-up point.
//!
//! Every peripheral that signals completion through a status flag is polled
//! through [`wait_until`]. [`WaitPolicy::Forever`] reproduces a plain spin on
//! the flag; [`WaitPolicy::Bounded`] gives up after a fixed number of polls
//! so a wedged peripheral surfaces as a failure instead of a hung board.

/// How long a status poll may spin.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum WaitPolicy {
    /// Spin until the condition holds.
    Forever,
    /// Give up after `max_polls` unsuccessful checks.
    Bounded {
        /// Number of times the condition is evaluated before timing out.
        max_polls: u32,
    },
}

impl WaitPolicy {
    /// Default bounded policy: roughly tens of milliseconds at 48 MHz.
    pub const DEFAULT_BOUNDED: Self = Self::Bounded { max_polls: 100_000 };
}

impl Default for WaitPolicy {
    fn default() -> Self {
        Self::DEFAULT_BOUNDED
    }
}

/// A bounded poll ran out of attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Timeout;

/// Spin until `ready` returns true or the policy gives up.
///
/// # Errors
///
/// Returns [`Timeout`] when a bounded policy exhausts its polls.
pub fn wait_until(policy: WaitPolicy, mut ready: impl FnMut() -> bool) -> Result<(), Timeout> {
    match policy {
        WaitPolicy::Forever => loop {
            if ready() {
                return Ok(());
            }
            core::hint::spin_loop();
        },
        WaitPolicy::Bounded { max_polls } => {
            for _ in 0..max_polls {
                if ready() {
                    return Ok(());
                }
                core::hint::spin_loop();
            }
            Err(Timeout)
        }
    }
}
