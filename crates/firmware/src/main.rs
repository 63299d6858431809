//! OrangeCrab bring-up firmware - Main Entry Point
//!
//! Hardware-only entry point for the VexRiscv test SoC. Console output and
//! DRAM training come from the LiteX BSP libraries linked by `build.rs`.
//! The BSP is built with `UART_POLLING` so no interrupt setup is needed.

#![no_std]
#![no_main]

use core::ffi::{c_char, c_int};
use core::fmt;

use riscv::delay::McycleDelay;
use riscv_rt::entry;

use firmware::board::{self, Board, MemoryTrainer};
use firmware::config::{SYS_CLK_HZ, WAIT_POLICY};
use firmware::{Report, RunOutcome, Sequencer, PRODUCTION_PLAN};
use platform::{
    Asense, BitBangFlashSpi, BitBangI2c, Dac53608, Mcp23s08, MmioBlock, SpiFlash, SpiMaster,
    TristateBank,
};

// Panic handler
use panic_halt as _;

#[cfg(feature = "defmt-logging")]
use defmt_rtt as _;

mod bsp {
    use core::ffi::{c_char, c_int};

    extern "C" {
        pub fn uart_init();
        pub fn uart_write(c: c_char);
        pub fn sdrinit() -> c_int;
    }
}

/// BSP UART as a `fmt::Write` sink. Converts `\n` to `\r\n`.
struct Console;

impl Console {
    fn putc(byte: u8) {
        // SAFETY: uart_init ran before the console was created; the polled
        // UART has no other users.
        unsafe { bsp::uart_write(byte as c_char) }
    }
}

impl fmt::Write for Console {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        for byte in s.bytes() {
            if byte == b'\n' {
                Self::putc(b'\r');
            }
            Self::putc(byte);
        }
        Ok(())
    }
}

/// LiteDRAM training routine.
struct LiteDram;

impl MemoryTrainer for LiteDram {
    fn train(&mut self) -> bool {
        // SAFETY: called once, before anything touches main RAM.
        let status: c_int = unsafe { bsp::sdrinit() };
        status != 0
    }
}

#[entry]
fn main() -> ! {
    // SAFETY: first call into the BSP, before any console output.
    unsafe { bsp::uart_init() };

    // SAFETY: each address is a distinct CSR block from the SoC's csr map and
    // is wrapped exactly once.
    let (spi, adc, gpio, leds, i2c, flash) = unsafe {
        (
            MmioBlock::new(board::SPI_CSR),
            MmioBlock::new(board::ASENSE_CSR),
            MmioBlock::new(board::GPIO_CSR),
            MmioBlock::new(board::GPIO_LED_CSR),
            MmioBlock::new(board::I2C_CSR),
            MmioBlock::new(board::FLASH_CSR),
        )
    };

    let board = Board {
        flash: SpiFlash::new(BitBangFlashSpi::new(flash, McycleDelay::new(SYS_CLK_HZ))),
        memory: LiteDram,
        dac: Dac53608::new(BitBangI2c::new(i2c, McycleDelay::new(SYS_CLK_HZ))),
        expander: Mcp23s08::new(
            SpiMaster::new(spi, WAIT_POLICY),
            board::EXPANDER_CS,
            board::EXPANDER_HW_ADDR,
        ),
        adc: Asense::new(adc, WAIT_POLICY),
        gpio: TristateBank::new(gpio),
        leds: TristateBank::new(leds),
        delay: McycleDelay::new(SYS_CLK_HZ),
    };

    let mut sequencer = Sequencer::new(board, Report::new(Console));
    sequencer.banner();
    match sequencer.run(&PRODUCTION_PLAN) {
        RunOutcome::Completed => {
            #[cfg(feature = "defmt-logging")]
            defmt::info!("bring-up complete");
        }
        RunOutcome::Halted { step, reason } => {
            #[cfg(feature = "defmt-logging")]
            defmt::warn!("halted at {}: {}", step, reason);
            let _ = (step, reason);
        }
    }

    loop {
        riscv::asm::wfi();
    }
}
