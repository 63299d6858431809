//! The diagnostic steps, run against a [`Board`].

use core::fmt::Write;

use embedded_hal::delay::DelayNs;
use embedded_hal::i2c::I2c;
use platform::{BusReset, Csr, DacChannel, FlashIdentity, PinGroup};

use crate::board::{self, BatteryPhase, Board, MemoryTrainer};
use crate::plan::StepId;
use crate::report::{Hex, Report};
use crate::sequencer::{Diagnostics, FailReason, TestResult};

/// First byte where `found` differs from `expected`, as a failure.
pub fn compare_id(expected: &[u8], found: &[u8]) -> Result<(), FailReason> {
    match expected
        .iter()
        .zip(found)
        .enumerate()
        .find(|(_, (e, f))| e != f)
    {
        Some((index, (&expected, &found))) => Err(FailReason::FlashIdMismatch {
            index,
            expected,
            found,
        }),
        None => Ok(()),
    }
}

fn infallible<T>(result: Result<T, core::convert::Infallible>) -> T {
    result.unwrap_or_else(|never| match never {})
}

impl<F, M, C, I, D> Board<F, M, C, I, D>
where
    F: FlashIdentity,
    M: MemoryTrainer,
    C: Csr,
    I: I2c + BusReset,
    D: DelayNs,
{
    /// Read and report the flash identity and UUID, then check the identity.
    pub fn check_flash<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        let id = self.flash.read_id()?;
        report.info("FLASH-ID", Hex(&id));
        let uuid = self.flash.read_uuid()?;
        report.info("FLASH-UUID", Hex(&uuid));
        compare_id(&board::EXPECTED_FLASH_ID, &id)
    }

    /// Train DRAM.
    pub fn check_memory(&mut self) -> Result<(), FailReason> {
        if self.memory.train() {
            Ok(())
        } else {
            Err(FailReason::MemoryTraining)
        }
    }

    /// Reset the DAC, read its identity and set up its control lines.
    ///
    /// Only the identity read decides the step; a missing device also NACKs
    /// the reset writes, so those are logged and otherwise ignored.
    pub fn check_i2c<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        if let Err(err) = self.dac.reset(&mut self.delay) {
            debug!("dac reset: {}", err);
        }

        let id = self.dac.read_id();
        if !id.acked {
            return Err(FailReason::NoAcknowledge);
        }
        report.info("DAC-ID", format_args!("{:#06x}", id.raw));
        if !id.is_dac53608() {
            warn!("unexpected DAC device id {:#x}", id.device_id());
        }

        // ~CLR high, ~LDAC low: outputs follow their data registers. The
        // rest of the bank is loopback inputs and keeps its OUT bits.
        infallible(self.gpio.set_high(board::DAC_CLR));
        infallible(self.gpio.set_low(board::DAC_LDAC));
        self.gpio
            .set_output_enable(board::DAC_CLR | board::DAC_LDAC);
        Ok(())
    }

    /// Drive every loopback pattern and compare what the header bank sees.
    pub fn check_gpio_loopback<W: Write>(
        &mut self,
        report: &mut Report<W>,
    ) -> Result<(), FailReason> {
        self.expander.set_direction(0x00)?;
        for driven in board::loopback_sequence() {
            self.expander.write_outputs(driven)?;
            let observed = board::remap(infallible(self.gpio.read()));
            report.info("GPIO", format_args!("{driven:02X}:{observed:02X}"));
            if observed != driven {
                return Err(FailReason::LoopbackMismatch { driven, observed });
            }
        }
        Ok(())
    }

    /// Sweep each looped-back DAC output and sample it.
    ///
    /// A rejected DAC write still produces its row; the harness judges the
    /// samples. Only an ADC fault ends the sweep. The channel under test is
    /// zeroed either way.
    pub fn sweep_dac<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        for channel in DacChannel::all().take(board::SWEEP_CHANNELS) {
            let ramp = self.ramp_channel(channel, report);
            self.set_dac(channel, 0);
            ramp?;
            trace!("sweep channel {} done", channel.get());
        }
        Ok(())
    }

    fn ramp_channel<W: Write>(
        &mut self,
        channel: DacChannel,
        report: &mut Report<W>,
    ) -> Result<(), FailReason> {
        let adc = board::loopback_adc(channel);
        for value in (0..board::SWEEP_END).step_by(board::SWEEP_STEP) {
            self.set_dac(channel, value);
            self.delay.delay_ms(board::DAC_SETTLE_MS);
            let sample = self.adc.read_channel(adc)?;
            report.sweep(channel, value, sample);
        }
        Ok(())
    }

    fn set_dac(&mut self, channel: DacChannel, value: u16) {
        if let Err(err) = self.dac.write_channel(channel, value) {
            warn!("dac channel {} write failed: {}", channel.get(), err);
        }
    }

    /// Sample every reference rail once.
    pub fn sample_rails<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        for (rail, channel) in board::REFERENCE_RAILS {
            let raw = self.adc.read_channel(channel)?;
            report.rail(rail, raw);
        }
        Ok(())
    }

    /// Step the battery fixture through its phases, sampling VBAT in each.
    ///
    /// The fixture is returned to idle on every exit; the first error wins.
    pub fn sample_battery<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        let phases = self.battery_phases(report);
        let idle = self.expander.write_outputs(BatteryPhase::Idle.pins());
        phases?;
        idle.map_err(FailReason::from)
    }

    fn battery_phases<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        for phase in BatteryPhase::SEQUENCE {
            report.info("BATT-PHASE", phase.label());
            self.expander.write_outputs(phase.pins())?;
            for _ in 0..board::BATTERY_SAMPLES {
                let raw = self.adc.read_channel(board::ADC_VBAT)?;
                report.rail("VBAT", raw);
                self.delay.delay_ms(board::BATTERY_SAMPLE_INTERVAL_MS);
            }
            self.delay.delay_ms(board::CHARGER_DETECT_MS);
        }
        Ok(())
    }

    /// Drive each LED pattern and read the bank back.
    pub fn check_leds<W: Write>(&mut self, report: &mut Report<W>) -> Result<(), FailReason> {
        infallible(self.leds.write(0));
        for pattern in board::LED_PATTERNS {
            self.leds.set_output_enable(u32::from(pattern));
            self.delay.delay_ms(board::LED_SETTLE_MS);
            let read = infallible(self.leds.read()) & board::LED_PINS;
            report.info("LED", format_args!("{pattern:X}:{read:X}"));
        }
        self.leds.set_output_enable(0);
        Ok(())
    }
}

impl<W, F, M, C, I, D> Diagnostics<W> for Board<F, M, C, I, D>
where
    W: Write,
    F: FlashIdentity,
    M: MemoryTrainer,
    C: Csr,
    I: I2c + BusReset,
    D: DelayNs,
{
    fn run_step(&mut self, step: StepId, report: &mut Report<W>) -> TestResult {
        let result = match step {
            StepId::Flash => self.check_flash(report),
            StepId::Memory => self.check_memory(),
            StepId::I2c => self.check_i2c(report),
            StepId::GpioLoopback => self.check_gpio_loopback(report),
            StepId::DacSweep => self.sweep_dac(report),
            StepId::ReferenceRails => self.sample_rails(report),
            StepId::Battery => self.sample_battery(report),
            StepId::Leds => self.check_leds(report),
        };
        result.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn matching_id_passes() {
        assert_eq!(
            compare_id(&board::EXPECTED_FLASH_ID, &board::EXPECTED_FLASH_ID),
            Ok(())
        );
    }

    #[test]
    fn first_mismatch_is_reported() {
        let mut id = board::EXPECTED_FLASH_ID;
        id[3] = 0x00;
        id[4] = 0x00;
        assert_eq!(
            compare_id(&board::EXPECTED_FLASH_ID, &id),
            Err(FailReason::FlashIdMismatch {
                index: 3,
                expected: 0x40,
                found: 0x00
            })
        );
    }

    #[test]
    fn infallible_unwraps_ok() {
        assert_eq!(infallible(Ok::<u32, core::convert::Infallible>(7)), 7);
    }
}
