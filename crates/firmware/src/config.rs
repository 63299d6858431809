//! Application configuration and constants
//!
//! Everything here is fixed at build time. The only knob is the
//! `hang-forever` feature, which selects how status polls behave.

use platform::WaitPolicy;

/// The application name
pub const APP_NAME: &str = "OrangeCrab Test";

/// Application version (synchronized with Cargo.toml)
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

/// CPU clock of the test SoC.
pub const SYS_CLK_HZ: u32 = 48_000_000;

/// Status polls before a peripheral is declared wedged.
pub const POLL_BUDGET: u32 = 100_000;

/// Wait policy applied to every status poll.
#[cfg(not(feature = "hang-forever"))]
pub const WAIT_POLICY: WaitPolicy = WaitPolicy::Bounded {
    max_polls: POLL_BUDGET,
};

/// Wait policy applied to every status poll.
#[cfg(feature = "hang-forever")]
pub const WAIT_POLICY: WaitPolicy = WaitPolicy::Forever;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_matches_manifest() {
        assert_eq!(APP_VERSION, env!("CARGO_PKG_VERSION"));
        assert!(!APP_NAME.is_empty());
    }

    #[cfg(not(feature = "hang-forever"))]
    #[test]
    fn default_policy_is_bounded_by_budget() {
        assert_eq!(WAIT_POLICY, WaitPolicy::Bounded { max_polls: POLL_BUDGET });
    }
}
