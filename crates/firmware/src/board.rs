//! OrangeCrab r0.2 test fixture: memory map, wiring and calibration.
//!
//! The fixture routes the feather header through an MCP23S08 expander, a
//! DAC53608 and the SoC's analog sense block so every pin can be exercised
//! from firmware. Everything board-specific lives here; the steps only use
//! these names.

use platform::{AdcChannel, Asense, ChipSelect, Dac53608, DacChannel, Mcp23s08, TristateBank};

// ── CSR map ──────────────────────────────────────────────────────────────────

/// Base of the CSR bus.
pub const CSR_BASE: usize = 0xe000_0000;
/// Address space reserved for each CSR block.
pub const CSR_REGION_SIZE: usize = 0x800;

/// Base address of CSR block `index`.
#[must_use]
#[allow(clippy::arithmetic_side_effects)]
pub const fn csr_block(index: usize) -> usize {
    CSR_BASE + index * CSR_REGION_SIZE
}

/// RGB LED tristate bank.
pub const GPIO_LED_CSR: usize = csr_block(10);
/// Feather header tristate bank (DAC control lines and loopback inputs).
pub const GPIO_CSR: usize = csr_block(11);
/// Configuration flash bit-bang port.
pub const FLASH_CSR: usize = csr_block(15);
/// SPI master (IO expander).
pub const SPI_CSR: usize = csr_block(18);
/// Bit-bang I2C (DAC).
pub const I2C_CSR: usize = csr_block(19);
/// Analog sense block.
pub const ASENSE_CSR: usize = csr_block(20);

// ── Header GPIO bank ─────────────────────────────────────────────────────────

/// DAC ~LDAC line. Held low for asynchronous output updates.
pub const DAC_LDAC: u32 = 1 << 1;
/// DAC ~CLR line. Held high so the DAC is never forced to zero.
pub const DAC_CLR: u32 = 1 << 5;

// ── IO expander ──────────────────────────────────────────────────────────────

/// Expander chip select on the SPI master.
pub const EXPANDER_CS: ChipSelect = ChipSelect::line(0);
/// Expander A1:A0 straps.
pub const EXPANDER_HW_ADDR: u8 = 0;
/// Expander pins looped back to the header bank.
pub const LOOPBACK_PINS: u8 = 0x3f;
/// Expander pin switching the battery current sink.
pub const CURRENT_SINK: u8 = 1 << 6;
/// Expander pin connecting the dummy battery.
pub const DUMMY_BATTERY: u8 = 1 << 7;

/// Expander pattern as seen on the header bank's IN register.
///
/// Expander pin 0 lands on header bit 6; pins 1–5 land on bits 9–13.
#[must_use]
pub const fn remap(raw: u32) -> u8 {
    let bits = ((raw >> 6) & 0x1) | ((raw >> 8) & 0x3e);
    bits.to_le_bytes()[0]
}

/// Header bank IN value produced by a correctly wired fixture driving
/// `pattern`. Inverse of [`remap`] on the loopback pins.
#[must_use]
pub const fn loopback_wiring(pattern: u8) -> u32 {
    let p = pattern as u32;
    ((p & 0x1) << 6) | ((p & 0x3e) << 8)
}

/// Seed of the walking-one passes.
pub const WALKING_ONE_SEED: u8 = 0x01;
/// Seed of the walking-zero passes.
pub const WALKING_ZERO_SEED: u8 = 0x3e;
/// Alternating walking-one / walking-zero passes.
pub const LOOPBACK_PASSES: u8 = 4;
/// Patterns per pass, one per loopback pin.
pub const LOOPBACK_STEPS: usize = 6;

/// Shift the pattern one pin up; walking-zero passes refill bit 0.
#[must_use]
#[allow(clippy::arithmetic_side_effects)]
pub const fn next_pattern(pattern: u8, walking_zero: bool) -> u8 {
    let shifted = (pattern << 1) & LOOPBACK_PINS;
    if walking_zero {
        shifted | 1
    } else {
        shifted
    }
}

/// Every pattern the loopback test drives, in order.
pub fn loopback_sequence() -> impl Iterator<Item = u8> {
    (0..LOOPBACK_PASSES).flat_map(|pass| {
        let walking_zero = pass % 2 == 1;
        let seed = if walking_zero {
            WALKING_ZERO_SEED
        } else {
            WALKING_ONE_SEED
        };
        core::iter::successors(Some(seed), move |&p| Some(next_pattern(p, walking_zero)))
            .take(LOOPBACK_STEPS)
    })
}

// ── Analog channels ──────────────────────────────────────────────────────────

/// Ground reference.
pub const ADC_GROUND: AdcChannel = AdcChannel::new(0);
/// Battery sense (through a 1:2 divider on top of the input divider).
pub const ADC_VBAT: AdcChannel = AdcChannel::new(12);

/// ADC input wired to DAC output `channel`. ADC 0 is ground, so the DAC
/// outputs start at 1.
#[must_use]
#[allow(clippy::arithmetic_side_effects)]
pub const fn loopback_adc(channel: DacChannel) -> AdcChannel {
    AdcChannel::new(channel.get() + 1)
}

/// Rails sampled by the reference step, as (label, channel).
pub const REFERENCE_RAILS: [(&str, AdcChannel); 6] = [
    ("GND", ADC_GROUND),
    ("1V1", AdcChannel::new(7)),
    ("1V35", AdcChannel::new(8)),
    ("2V5", AdcChannel::new(9)),
    ("3V3", AdcChannel::new(10)),
    ("VREF", AdcChannel::new(11)),
];

// ── DAC sweep ────────────────────────────────────────────────────────────────

/// DAC outputs looped back to the ADC.
pub const SWEEP_CHANNELS: usize = 6;
/// Sweep stops below this code.
pub const SWEEP_END: u16 = 0x0fff;
/// Code increment between samples.
pub const SWEEP_STEP: usize = 0x100;
/// Output settle time before sampling.
pub const DAC_SETTLE_MS: u32 = 2;

// ── Battery path ─────────────────────────────────────────────────────────────

/// Samples per phase.
pub const BATTERY_SAMPLES: usize = 20;
/// Spacing between samples.
pub const BATTERY_SAMPLE_INTERVAL_MS: u32 = 1;
/// Hold after each phase for the charger to notice the change.
pub const CHARGER_DETECT_MS: u32 = 250;

/// Battery fixture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum BatteryPhase {
    /// Dummy battery connected with the current sink on.
    Insert,
    /// Dummy battery removed, sink still on.
    Remove,
    /// Both off.
    Idle,
}

impl BatteryPhase {
    /// Phases in the order they are exercised.
    pub const SEQUENCE: [Self; 3] = [Self::Insert, Self::Remove, Self::Idle];

    /// Expander outputs for this phase.
    #[must_use]
    pub const fn pins(self) -> u8 {
        match self {
            Self::Insert => CURRENT_SINK | DUMMY_BATTERY,
            Self::Remove => CURRENT_SINK,
            Self::Idle => 0,
        }
    }

    /// Console label.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Remove => "REMOVE",
            Self::Idle => "IDLE",
        }
    }
}

// ── LEDs ─────────────────────────────────────────────────────────────────────

/// Output-enable patterns driven onto the RGB LED bank.
pub const LED_PATTERNS: [u8; 5] = [0x0, 0x1, 0x2, 0x4, 0x7];
/// LED pins.
pub const LED_PINS: u32 = 0x7;
/// Settle time before reading the LED bank back.
pub const LED_SETTLE_MS: u32 = 1;

// ── Flash ────────────────────────────────────────────────────────────────────

/// Identity of the fitted W25Q128JV.
pub const EXPECTED_FLASH_ID: [u8; platform::flash::ID_LEN] = [0xef, 0x17, 0xef, 0x40, 0x18];

// ── Board ────────────────────────────────────────────────────────────────────

/// DRAM controller training, provided by the memory controller runtime.
pub trait MemoryTrainer {
    /// Train and calibrate. True on success.
    fn train(&mut self) -> bool;
}

/// Every peripheral the diagnostic steps touch.
pub struct Board<F, M, C, I, D> {
    /// Configuration flash.
    pub flash: F,
    /// DRAM trainer.
    pub memory: M,
    /// DAC on the I2C bus.
    pub dac: Dac53608<I>,
    /// IO expander on the SPI master.
    pub expander: Mcp23s08<C>,
    /// Analog sense block.
    pub adc: Asense<C>,
    /// Header GPIO bank.
    pub gpio: TristateBank<C>,
    /// RGB LED bank.
    pub leds: TristateBank<C>,
    /// Millisecond delays between steps.
    pub delay: D,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn csr_blocks_match_soc_map() {
        assert_eq!(SPI_CSR, 0xe000_9000);
        assert_eq!(I2C_CSR, 0xe000_9800);
        assert_eq!(ASENSE_CSR, 0xe000_a000);
        assert_eq!(GPIO_CSR, 0xe000_5800);
        assert_eq!(GPIO_LED_CSR, 0xe000_5000);
        assert_eq!(FLASH_CSR, 0xe000_7800);
    }

    #[test]
    fn remap_literal_vectors() {
        assert_eq!(remap(1 << 6), 0x01);
        assert_eq!(remap(0x3e << 8), 0x3e);
        assert_eq!(remap((1 << 6) | (0x3e << 8)), 0x3f);
        // Bits outside the loopback lines are ignored.
        assert_eq!(remap(0xffff_c1bf & !((1 << 6) | (0x3e << 8))), 0x00);
    }

    #[test]
    fn loopback_sequence_walks_ones_then_zeros() {
        let seq: std::vec::Vec<u8> = loopback_sequence().collect();
        assert_eq!(seq.len(), 24);
        assert_eq!(&seq[..6], &[0x01, 0x02, 0x04, 0x08, 0x10, 0x20]);
        assert_eq!(&seq[6..12], &[0x3e, 0x3d, 0x3b, 0x37, 0x2f, 0x1f]);
        assert_eq!(&seq[12..], &seq[..12]);
    }

    #[test]
    fn dac_outputs_loop_back_to_adc_one_up() {
        assert_eq!(loopback_adc(DacChannel::new(0)), AdcChannel::new(1));
        assert_eq!(loopback_adc(DacChannel::new(5)), AdcChannel::new(6));
    }

    #[test]
    fn battery_phases_insert_remove_idle() {
        let pins: std::vec::Vec<u8> = BatteryPhase::SEQUENCE.iter().map(|p| p.pins()).collect();
        assert_eq!(pins, [0xc0, 0x40, 0x00]);
        assert!(BatteryPhase::SEQUENCE
            .iter()
            .all(|p| p.pins() & LOOPBACK_PINS == 0));
    }

    #[test]
    fn reference_rails_do_not_overlap_sweep_or_battery() {
        for (_, ch) in REFERENCE_RAILS.iter().skip(1) {
            assert!(ch.get() > SWEEP_CHANNELS as u8);
            assert_ne!(*ch, ADC_VBAT);
        }
    }
}
