//! Simulated test fixture shared by the firmware integration tests.

#![allow(dead_code)]
#![allow(clippy::cast_possible_truncation)]

use std::cell::Cell;
use std::rc::Rc;
use std::string::String;
use std::vec::Vec;

use embedded_hal_mock::eh1::delay::NoopDelay;
use firmware::board::{self, Board, MemoryTrainer};
use firmware::{Report, RunOutcome, Sequencer, PRODUCTION_PLAN};
use platform::flash::ID_LEN;
use platform::mocks::{
    AsenseModel, Dac53608Model, Mcp23s08Model, MockFlash, PullUpModel, SharedRegisterFile,
    SimBlock, SimRegisterFile,
};
use platform::{
    gpio, Asense, Dac53608, DacChannel, Mcp23s08, SpiMaster, TristateBank, WaitPolicy,
};

/// Raw VBAT reading with the dummy battery connected.
pub const VBAT_CHARGING: u32 = 30_000;
/// Raw VBAT reading without it.
pub const VBAT_IDLE: u32 = 10_000;
/// Raw reading on every reference rail.
pub const RAIL_RAW: u32 = 20_000;

/// DRAM double.
pub struct FakeDram {
    pub trains: bool,
}

impl MemoryTrainer for FakeDram {
    fn train(&mut self) -> bool {
        self.trains
    }
}

pub type SimBoard = Board<MockFlash, FakeDram, SimBlock, Dac53608Model, NoopDelay>;

/// ADC reading produced by a DAC code on a loopback channel.
pub fn loopback_sample(code: u16) -> u32 {
    u32::from(code) * 8 + 1
}

fn addr(base: usize) -> u32 {
    base as u32
}

/// Knobs for the simulated fixture. `Fixture::healthy()` is a good board.
pub struct Fixture {
    pub flash_id: [u8; ID_LEN],
    pub dram_trains: bool,
    pub dac_present: bool,
    /// Expander pins whose loopback wire is open.
    pub open_pins: u8,
    pub spi_stuck: bool,
    pub adc_hung: bool,
    /// Conversions the ADC completes before it hangs.
    pub adc_fails_after: Option<u32>,
}

/// A built fixture: the board plus handles for inspecting the simulation.
pub struct Bench {
    pub board: SimBoard,
    pub sim: SharedRegisterFile,
    pub dac: Dac53608Model,
}

impl Fixture {
    pub fn healthy() -> Self {
        Self {
            flash_id: board::EXPECTED_FLASH_ID,
            dram_trains: true,
            dac_present: true,
            open_pins: 0,
            spi_stuck: false,
            adc_hung: false,
            adc_fails_after: None,
        }
    }

    pub fn build(self) -> Bench {
        let policy = WaitPolicy::Bounded { max_polls: 64 };
        let sim = SimRegisterFile::shared();
        let dac = if self.dac_present {
            Dac53608Model::new()
        } else {
            Dac53608Model::new().absent()
        };

        let driven = Rc::new(Cell::new(0u8));
        let gpio_in = addr(board::GPIO_CSR).wrapping_add(gpio::reg::IN.offset());
        let open = self.open_pins;
        let seen = Rc::clone(&driven);
        let mut expander = Mcp23s08Model::new(
            addr(board::SPI_CSR),
            board::EXPANDER_CS.mask(),
            board::EXPANDER_HW_ADDR,
        )
        .with_wiring(move |outputs, mem| {
            seen.set(outputs);
            mem.insert(gpio_in, board::loopback_wiring(outputs & !open));
        });
        if self.spi_stuck {
            expander = expander.stuck_busy();
        }

        let dac_view = dac.clone();
        let pins = Rc::clone(&driven);
        let mut adc = AsenseModel::new(addr(board::ASENSE_CSR), move |ch| match ch {
            1..=6 => loopback_sample(dac_view.channel(DacChannel::new(ch - 1))),
            12 if pins.get() & board::DUMMY_BATTERY != 0 => VBAT_CHARGING,
            12 => VBAT_IDLE,
            0 => 0,
            _ => RAIL_RAW,
        })
        .with_conversion_polls(2);
        if self.adc_hung {
            adc = adc.hung();
        }
        if let Some(conversions) = self.adc_fails_after {
            adc = adc.fail_after(conversions);
        }

        {
            let mut file = sim.borrow_mut();
            file.attach(expander);
            file.attach(adc);
            file.attach(PullUpModel::new(addr(board::GPIO_LED_CSR), board::LED_PINS));
        }

        let mut flash = MockFlash::new(self.flash_id);
        flash.uuid = [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88];

        let board = Board {
            flash,
            memory: FakeDram {
                trains: self.dram_trains,
            },
            dac: Dac53608::new(dac.clone()),
            expander: Mcp23s08::new(
                SpiMaster::new(SimRegisterFile::block(&sim, addr(board::SPI_CSR)), policy),
                board::EXPANDER_CS,
                board::EXPANDER_HW_ADDR,
            ),
            adc: Asense::new(SimRegisterFile::block(&sim, addr(board::ASENSE_CSR)), policy),
            gpio: TristateBank::new(SimRegisterFile::block(&sim, addr(board::GPIO_CSR))),
            leds: TristateBank::new(SimRegisterFile::block(&sim, addr(board::GPIO_LED_CSR))),
            delay: NoopDelay::new(),
        };

        Bench { board, sim, dac }
    }
}

/// Result of running the production plan on a bench.
pub struct Run {
    pub outcome: RunOutcome,
    pub lines: Vec<String>,
    pub sim: SharedRegisterFile,
    pub dac: Dac53608Model,
}

impl Run {
    pub fn count(&self, prefix: &str) -> usize {
        self.lines.iter().filter(|l| l.starts_with(prefix)).count()
    }

    pub fn position(&self, line: &str) -> Option<usize> {
        self.lines.iter().position(|l| l == line)
    }

    pub fn values(&self, prefix: &str) -> Vec<String> {
        self.lines
            .iter()
            .filter_map(|l| l.strip_prefix(prefix))
            .map(String::from)
            .collect()
    }
}

/// Last frame shifted out to the expander.
pub fn last_expander_frame(sim: &SharedRegisterFile) -> u32 {
    let mosi = addr(board::SPI_CSR).wrapping_add(platform::spi::reg::MOSI.offset());
    sim.borrow()
        .writes_to(mosi)
        .last()
        .copied()
        .unwrap_or_default()
}

pub fn run(fixture: Fixture) -> Run {
    let Bench { board, sim, dac } = fixture.build();
    let mut sequencer = Sequencer::new(board, Report::new(String::new()));
    let outcome = sequencer.run(&PRODUCTION_PLAN);
    let (_, report) = sequencer.into_parts();
    let lines = report.into_inner().lines().map(String::from).collect();
    Run {
        outcome,
        lines,
        sim,
        dac,
    }
}
