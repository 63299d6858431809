//! Diagnostic plan: which steps run, in which order, and what a failure does.

/// A diagnostic step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum StepId {
    /// Configuration flash identity.
    Flash,
    /// DRAM training.
    Memory,
    /// DAC presence on the I2C bus.
    I2c,
    /// Expander to header loopback.
    GpioLoopback,
    /// DAC to ADC transfer sweep.
    DacSweep,
    /// Reference rail sampling.
    ReferenceRails,
    /// Battery path phases.
    Battery,
    /// RGB LED readback.
    Leds,
}

impl StepId {
    /// Name printed on the console. Harnesses match on these.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Flash => "FLASH",
            Self::Memory => "DDR",
            Self::I2c => "I2C",
            Self::GpioLoopback => "GPIO",
            Self::DacSweep => "DAC",
            Self::ReferenceRails => "ADC",
            Self::Battery => "BATT",
            Self::Leds => "LED",
        }
    }
}

/// What a failing step does to the rest of the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum FailurePolicy {
    /// Report `|Pass` or `|Fail`; a failure halts the run.
    Fatal,
    /// Report raw data and `, Finish`; the harness judges the data.
    Observational,
}

/// One entry in a plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct StepDescriptor {
    /// Step to run.
    pub id: StepId,
    /// Failure handling.
    pub policy: FailurePolicy,
}

impl StepDescriptor {
    /// Pass/fail step that halts the run on failure.
    #[must_use]
    pub const fn fatal(id: StepId) -> Self {
        Self {
            id,
            policy: FailurePolicy::Fatal,
        }
    }

    /// Data-collection step.
    #[must_use]
    pub const fn observational(id: StepId) -> Self {
        Self {
            id,
            policy: FailurePolicy::Observational,
        }
    }
}

/// Production bring-up order.
///
/// Flash and DRAM come first: a board failing either is not worth probing
/// further. The I2C step also configures the DAC control lines the sweep
/// relies on.
pub const PRODUCTION_PLAN: [StepDescriptor; 8] = [
    StepDescriptor::fatal(StepId::Flash),
    StepDescriptor::fatal(StepId::Memory),
    StepDescriptor::fatal(StepId::I2c),
    StepDescriptor::fatal(StepId::GpioLoopback),
    StepDescriptor::observational(StepId::DacSweep),
    StepDescriptor::observational(StepId::ReferenceRails),
    StepDescriptor::observational(StepId::Battery),
    StepDescriptor::observational(StepId::Leds),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn production_plan_order_and_names() {
        let names: std::vec::Vec<&str> = PRODUCTION_PLAN.iter().map(|s| s.id.name()).collect();
        assert_eq!(
            names,
            ["FLASH", "DDR", "I2C", "GPIO", "DAC", "ADC", "BATT", "LED"]
        );
    }

    #[test]
    fn fatal_steps_precede_observational_ones() {
        let first_observational = PRODUCTION_PLAN
            .iter()
            .position(|s| s.policy == FailurePolicy::Observational)
            .unwrap();
        assert!(PRODUCTION_PLAN[first_observational..]
            .iter()
            .all(|s| s.policy == FailurePolicy::Observational));
    }

    #[test]
    fn i2c_runs_before_dac_sweep() {
        let pos = |id| PRODUCTION_PLAN.iter().position(|s| s.id == id).unwrap();
        assert!(pos(StepId::I2c) < pos(StepId::DacSweep));
    }
}
