//! Simulated hardware for host tests
//!
//! [`SimRegisterFile`] is a flat address space of 32-bit registers with a
//! write log. Device models attach to it and react to register traffic the
//! way the SoC blocks and the chips behind them would. [`SimBlock`] is the
//! [`Csr`] view of one block inside the file, so drivers run unmodified.
//!
//! I2C and flash devices are modelled directly at the `embedded-hal` trait
//! level ([`Dac53608Model`], [`MockFlash`]).

#![cfg(any(test, feature = "std"))]

use std::boxed::Box;
use std::cell::RefCell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::vec::Vec;

use embedded_hal::i2c::{ErrorKind, ErrorType, I2c, NoAcknowledgeSource, Operation};

use crate::csr::{Csr, Register};
use crate::dac53608::{
    self, DAC53608_I2C_ADDR, DEVICE_ID, REG_DEVICE_CONFIG, REG_STATUS_TRIGGER, SOFT_RESET,
};
use crate::error::Error;
use crate::flash::{FlashIdentity, ID_LEN, UUID_LEN};
use crate::i2c::BusReset;
use crate::types::DacChannel;
use crate::{asense, gpio, mcp23s08, spi};

/// Absolute address → register value.
pub type RegisterMap = BTreeMap<u32, u32>;

/// Shared handle to a register file.
pub type SharedRegisterFile = Rc<RefCell<SimRegisterFile>>;

fn peek(mem: &RegisterMap, addr: u32) -> u32 {
    mem.get(&addr).copied().unwrap_or(0)
}

/// A device model attached to the register file.
pub trait SimDevice {
    /// Called after every CPU write has landed in `mem`.
    fn on_write(&mut self, addr: u32, value: u32, mem: &mut RegisterMap);

    /// Called on every CPU read. Returning `Some` overrides the stored value.
    fn on_read(&mut self, _addr: u32, _mem: &RegisterMap) -> Option<u32> {
        None
    }
}

/// Flat simulated CSR space.
#[derive(Default)]
pub struct SimRegisterFile {
    mem: RegisterMap,
    writes: Vec<(u32, u32)>,
    devices: Vec<Box<dyn SimDevice>>,
}

impl SimRegisterFile {
    /// Empty register file.
    pub fn new() -> Self {
        Self::default()
    }

    /// Empty register file behind a shared handle.
    pub fn shared() -> SharedRegisterFile {
        Rc::new(RefCell::new(Self::new()))
    }

    /// [`Csr`] view of the block at `base`.
    pub fn block(file: &SharedRegisterFile, base: u32) -> SimBlock {
        SimBlock {
            base,
            file: Rc::clone(file),
        }
    }

    /// Attach a device model.
    pub fn attach(&mut self, device: impl SimDevice + 'static) {
        self.devices.push(Box::new(device));
    }

    /// Preload a register without logging or notifying devices.
    pub fn set(&mut self, addr: u32, value: u32) {
        self.mem.insert(addr, value);
    }

    /// Stored register value.
    pub fn get(&self, addr: u32) -> u32 {
        peek(&self.mem, addr)
    }

    /// Every CPU write in order, as (address, value).
    pub fn writes(&self) -> &[(u32, u32)] {
        &self.writes
    }

    /// Values written to one address, in order.
    pub fn writes_to(&self, addr: u32) -> Vec<u32> {
        self.writes
            .iter()
            .filter(|(a, _)| *a == addr)
            .map(|(_, v)| *v)
            .collect()
    }

    /// Forget the write log.
    pub fn clear_log(&mut self) {
        self.writes.clear();
    }

    fn bus_read(&mut self, addr: u32) -> u32 {
        for device in &mut self.devices {
            if let Some(value) = device.on_read(addr, &self.mem) {
                return value;
            }
        }
        peek(&self.mem, addr)
    }

    fn bus_write(&mut self, addr: u32, value: u32) {
        self.mem.insert(addr, value);
        self.writes.push((addr, value));
        for device in &mut self.devices {
            device.on_write(addr, value, &mut self.mem);
        }
    }
}

/// One CSR block inside a [`SimRegisterFile`].
#[derive(Clone)]
pub struct SimBlock {
    base: u32,
    file: SharedRegisterFile,
}

impl SimBlock {
    fn addr(&self, reg: Register) -> u32 {
        self.base.wrapping_add(reg.offset())
    }
}

impl Csr for SimBlock {
    fn read(&self, reg: Register) -> u32 {
        self.file.borrow_mut().bus_read(self.addr(reg))
    }

    fn write(&mut self, reg: Register, value: u32) {
        self.file.borrow_mut().bus_write(self.addr(reg), value);
    }
}

// ── SPI master + MCP23S08 ────────────────────────────────────────────────────

/// Callback receiving the expander's driven pins.
pub type Wiring = Box<dyn FnMut(u8, &mut RegisterMap)>;

/// SoC SPI master with an MCP23S08 on one chip select.
///
/// Frames are decoded when CONTROL.START is written. An optional wiring
/// callback sees the driven output pins after every latch or direction
/// change, so tests can route them back into a GPIO bank.
pub struct Mcp23s08Model {
    spi_base: u32,
    cs_mask: u32,
    hw_addr: u8,
    regs: [u8; 11],
    stuck: bool,
    wiring: Option<Wiring>,
}

impl Mcp23s08Model {
    /// Expander behind the master at `spi_base`, selected by `cs_mask`.
    pub fn new(spi_base: u32, cs_mask: u32, hw_addr: u8) -> Self {
        let mut regs = [0u8; 11];
        if let Some(iodir) = regs.get_mut(usize::from(mcp23s08::reg::IODIR)) {
            *iodir = 0xFF;
        }
        Self {
            spi_base,
            cs_mask,
            hw_addr,
            regs,
            stuck: false,
            wiring: None,
        }
    }

    /// Master never reports done.
    #[must_use]
    pub fn stuck_busy(mut self) -> Self {
        self.stuck = true;
        self
    }

    /// Route driven pins through `wiring`.
    #[must_use]
    pub fn with_wiring(mut self, wiring: impl FnMut(u8, &mut RegisterMap) + 'static) -> Self {
        self.wiring = Some(Box::new(wiring));
        self
    }

    fn reg(&self, reg: u8) -> u8 {
        self.regs.get(usize::from(reg)).copied().unwrap_or(0)
    }

    fn outputs(&self) -> u8 {
        self.reg(mcp23s08::reg::OLAT) & !self.reg(mcp23s08::reg::IODIR)
    }

    fn frame(&mut self, bits: u32, mem: &mut RegisterMap) {
        let [_, control, reg, data] = bits.to_be_bytes();
        if control & !mcp23s08::OPCODE_READ != mcp23s08::opcode(self.hw_addr, false) {
            return;
        }
        let miso_addr = self.spi_base.wrapping_add(spi::reg::MISO.offset());
        if control & mcp23s08::OPCODE_READ != 0 {
            let value = if reg == mcp23s08::reg::GPIO {
                self.outputs()
            } else {
                self.reg(reg)
            };
            mem.insert(miso_addr, u32::from(value));
            return;
        }
        mem.insert(miso_addr, 0);
        let target = if reg == mcp23s08::reg::GPIO {
            mcp23s08::reg::OLAT
        } else {
            reg
        };
        if let Some(slot) = self.regs.get_mut(usize::from(target)) {
            *slot = data;
        }
        if matches!(target, mcp23s08::reg::OLAT | mcp23s08::reg::IODIR) {
            let outputs = self.outputs();
            if let Some(wiring) = self.wiring.as_mut() {
                wiring(outputs, mem);
            }
        }
    }
}

impl SimDevice for Mcp23s08Model {
    fn on_write(&mut self, addr: u32, value: u32, mem: &mut RegisterMap) {
        let control = self.spi_base.wrapping_add(spi::reg::CONTROL.offset());
        if addr != control || !spi::CONTROL_START.is_set(value) || self.stuck {
            return;
        }
        let cs = peek(mem, self.spi_base.wrapping_add(spi::reg::CS.offset()));
        if cs & self.cs_mask == 0 {
            return;
        }
        let bits = peek(mem, self.spi_base.wrapping_add(spi::reg::MOSI.offset()));
        self.frame(bits, mem);
    }

    fn on_read(&mut self, addr: u32, _mem: &RegisterMap) -> Option<u32> {
        (addr == self.spi_base.wrapping_add(spi::reg::STATUS.offset()))
            .then_some(u32::from(!self.stuck))
    }
}

// ── Analog sense ─────────────────────────────────────────────────────────────

/// Analog sense block sampling from a closure of the channel index.
pub struct AsenseModel {
    base: u32,
    source: Box<dyn FnMut(u8) -> u32>,
    conversion_polls: u32,
    pending: u32,
    hung: bool,
    conversions: u32,
    fail_after: Option<u32>,
}

impl AsenseModel {
    /// Block at `base` returning `source(channel)` for each conversion.
    pub fn new(base: u32, source: impl FnMut(u8) -> u32 + 'static) -> Self {
        Self {
            base,
            source: Box::new(source),
            conversion_polls: 0,
            pending: 0,
            hung: false,
            conversions: 0,
            fail_after: None,
        }
    }

    /// Report busy for `polls` status reads after each start.
    #[must_use]
    pub fn with_conversion_polls(mut self, polls: u32) -> Self {
        self.conversion_polls = polls;
        self
    }

    /// Never report done.
    #[must_use]
    pub fn hung(mut self) -> Self {
        self.hung = true;
        self
    }

    /// Complete `conversions` conversions, then hang on the next start.
    #[must_use]
    pub fn fail_after(mut self, conversions: u32) -> Self {
        self.fail_after = Some(conversions);
        self
    }
}

impl SimDevice for AsenseModel {
    fn on_write(&mut self, addr: u32, value: u32, mem: &mut RegisterMap) {
        if addr != self.base.wrapping_add(asense::reg::CONTROL.offset())
            || !asense::CONTROL_START.is_set(value)
        {
            return;
        }
        let channel = asense::CONTROL_CHANNEL.decode(value).to_le_bytes()[0];
        let sample = (self.source)(channel);
        mem.insert(self.base.wrapping_add(asense::reg::RESULT.offset()), sample);
        self.pending = self.conversion_polls;
        self.conversions = self.conversions.saturating_add(1);
        if self.fail_after.is_some_and(|limit| self.conversions > limit) {
            self.hung = true;
        }
    }

    fn on_read(&mut self, addr: u32, _mem: &RegisterMap) -> Option<u32> {
        if addr != self.base.wrapping_add(asense::reg::STATUS.offset()) {
            return None;
        }
        if self.hung {
            return Some(0);
        }
        if self.pending > 0 {
            self.pending = self.pending.saturating_sub(1);
            return Some(0);
        }
        Some(1)
    }
}

// ── Tristate bank with pull-ups ──────────────────────────────────────────────

/// Tristate bank whose `pins` float high when not driven.
pub struct PullUpModel {
    base: u32,
    pins: u32,
}

impl PullUpModel {
    /// Bank at `base`, pull-ups on `pins`.
    pub fn new(base: u32, pins: u32) -> Self {
        Self { base, pins }
    }
}

impl SimDevice for PullUpModel {
    fn on_write(&mut self, _addr: u32, _value: u32, _mem: &mut RegisterMap) {}

    fn on_read(&mut self, addr: u32, mem: &RegisterMap) -> Option<u32> {
        if addr != self.base.wrapping_add(gpio::reg::IN.offset()) {
            return None;
        }
        let oe = peek(mem, self.base.wrapping_add(gpio::reg::OE.offset()));
        let out = peek(mem, self.base.wrapping_add(gpio::reg::OUT.offset()));
        Some(((out & oe) | (!oe & self.pins)) & self.pins)
    }
}

// ── DAC53608 ─────────────────────────────────────────────────────────────────

/// I2C errors raised by the simulated devices.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimI2cError {
    /// Nobody answered the address.
    NoAcknowledge,
}

impl embedded_hal::i2c::Error for SimI2cError {
    fn kind(&self) -> ErrorKind {
        ErrorKind::NoAcknowledge(NoAcknowledgeSource::Address)
    }
}

#[derive(Debug)]
struct DacState {
    regs: [u16; 16],
    pointer: u8,
    present: bool,
    bus_resets: usize,
}

impl DacState {
    fn power_on() -> Self {
        let mut state = Self {
            regs: [0; 16],
            pointer: 0,
            present: true,
            bus_resets: 0,
        };
        state.soft_reset();
        state
    }

    fn soft_reset(&mut self) {
        self.regs = [0; 16];
        self.set(REG_DEVICE_CONFIG, 0x00FF);
        self.set(REG_STATUS_TRIGGER, u16::from(DEVICE_ID) << 6);
    }

    fn get(&self, reg: u8) -> u16 {
        self.regs.get(usize::from(reg)).copied().unwrap_or(0)
    }

    fn set(&mut self, reg: u8, value: u16) {
        if let Some(slot) = self.regs.get_mut(usize::from(reg)) {
            *slot = value;
        }
    }

    fn write(&mut self, bytes: &[u8]) {
        let Some((&reg, data)) = bytes.split_first() else {
            return;
        };
        self.pointer = reg;
        if let [hi, lo, ..] = data {
            let value = dac53608::decode([*hi, *lo]);
            if reg == REG_STATUS_TRIGGER {
                if value == SOFT_RESET {
                    self.soft_reset();
                }
            } else {
                self.set(reg, value);
            }
        }
    }
}

/// DAC53608 at the I2C trait level. Clones share state.
#[derive(Clone)]
pub struct Dac53608Model {
    addr: u8,
    state: Rc<RefCell<DacState>>,
}

impl Default for Dac53608Model {
    fn default() -> Self {
        Self::new()
    }
}

impl Dac53608Model {
    /// Powered-on device at the default address.
    pub fn new() -> Self {
        Self {
            addr: DAC53608_I2C_ADDR,
            state: Rc::new(RefCell::new(DacState::power_on())),
        }
    }

    /// Device missing from the bus: every transaction is NACKed.
    #[must_use]
    pub fn absent(self) -> Self {
        self.state.borrow_mut().present = false;
        self
    }

    /// Current output code of `channel`.
    pub fn channel(&self, channel: DacChannel) -> u16 {
        self.state.borrow().get(dac53608::dac_register(channel))
    }

    /// Current DEVICE_CONFIG.
    pub fn device_config(&self) -> u16 {
        self.state.borrow().get(REG_DEVICE_CONFIG)
    }

    /// Number of bus recovery sequences seen.
    pub fn bus_resets(&self) -> usize {
        self.state.borrow().bus_resets
    }
}

impl ErrorType for Dac53608Model {
    type Error = SimI2cError;
}

impl I2c for Dac53608Model {
    fn transaction(
        &mut self,
        address: u8,
        operations: &mut [Operation<'_>],
    ) -> Result<(), Self::Error> {
        let mut state = self.state.borrow_mut();
        if address != self.addr || !state.present {
            return Err(SimI2cError::NoAcknowledge);
        }
        for op in operations.iter_mut() {
            match op {
                Operation::Write(bytes) => state.write(bytes),
                Operation::Read(buf) => {
                    let value = dac53608::encode(state.get(state.pointer));
                    for (slot, byte) in buf.iter_mut().zip(value.iter().cycle()) {
                        *slot = *byte;
                    }
                }
            }
        }
        Ok(())
    }
}

impl BusReset for Dac53608Model {
    fn reset_bus(&mut self) {
        let mut state = self.state.borrow_mut();
        state.bus_resets = state.bus_resets.saturating_add(1);
    }
}

// ── Flash ────────────────────────────────────────────────────────────────────

/// Flash with a fixed identity.
#[derive(Debug, Clone, Copy)]
pub struct MockFlash {
    /// Identity returned by `read_id`.
    pub id: [u8; ID_LEN],
    /// Unique ID returned by `read_uuid`.
    pub uuid: [u8; UUID_LEN],
    /// When set, every read fails with this error.
    pub error: Option<Error>,
}

impl MockFlash {
    /// Flash reporting `id`.
    pub fn new(id: [u8; ID_LEN]) -> Self {
        Self {
            id,
            uuid: [0x5a; UUID_LEN],
            error: None,
        }
    }
}

impl FlashIdentity for MockFlash {
    fn read_id(&mut self) -> Result<[u8; ID_LEN], Error> {
        self.error.map_or(Ok(self.id), Err)
    }

    fn read_uuid(&mut self) -> Result<[u8; UUID_LEN], Error> {
        self.error.map_or(Ok(self.uuid), Err)
    }
}
