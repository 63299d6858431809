//! Control/status register access.
//!
//! Every SoC peripheral is a block of 32-bit CSRs laid out at a 4-byte
//! stride from the block base. Drivers never touch raw addresses; they are
//! generic over [`Csr`] and address registers by their offset within the
//! block. [`MmioBlock`] is the volatile implementation used on hardware;
//! [`crate::mocks::SimBlock`] backs the host tests.

/// Byte offset of one register within a CSR block.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct Register(u32);

impl Register {
    /// Register at `offset` bytes from the block base.
    #[must_use]
    pub const fn at(offset: u32) -> Self {
        Self(offset)
    }

    /// Byte offset from the block base.
    #[must_use]
    pub const fn offset(self) -> u32 {
        self.0
    }
}

/// A contiguous bit field inside a register.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Field {
    shift: u8,
    width: u8,
}

impl Field {
    /// Field of `width` bits starting at bit `shift`.
    ///
    /// `shift + width` must not exceed 32.
    #[must_use]
    pub const fn new(shift: u8, width: u8) -> Self {
        Self { shift, width }
    }

    /// Single-bit flag at `bit`.
    #[must_use]
    pub const fn bit(bit: u8) -> Self {
        Self::new(bit, 1)
    }

    /// In-place mask of the field.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn mask(self) -> u32 {
        let low = if self.width >= 32 {
            u32::MAX
        } else {
            (1u32 << self.width) - 1
        };
        low << self.shift
    }

    /// Place `value` into the field. Bits that do not fit are dropped.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn encode(self, value: u32) -> u32 {
        (value << self.shift) & self.mask()
    }

    /// Extract the field from a raw register value.
    #[must_use]
    #[allow(clippy::arithmetic_side_effects)]
    pub const fn decode(self, raw: u32) -> u32 {
        (raw & self.mask()) >> self.shift
    }

    /// True when every bit of the field is set in `raw`.
    #[must_use]
    pub const fn is_set(self, raw: u32) -> bool {
        raw & self.mask() == self.mask()
    }
}

/// Register-level access to one CSR block.
pub trait Csr {
    /// Read the register.
    fn read(&self, reg: Register) -> u32;

    /// Write the register.
    fn write(&mut self, reg: Register, value: u32);

    /// Read-modify-write.
    fn modify(&mut self, reg: Register, f: impl FnOnce(u32) -> u32) {
        let value = f(self.read(reg));
        self.write(reg, value);
    }
}

impl<T: Csr + ?Sized> Csr for &mut T {
    fn read(&self, reg: Register) -> u32 {
        (**self).read(reg)
    }

    fn write(&mut self, reg: Register, value: u32) {
        (**self).write(reg, value);
    }
}

/// Memory-mapped CSR block.
#[derive(Debug)]
pub struct MmioBlock {
    base: usize,
}

impl MmioBlock {
    /// Wrap the CSR block at `base`.
    ///
    /// # Safety
    ///
    /// `base` must be the address of a CSR block that is valid for 32-bit
    /// volatile reads and writes at every offset a driver will use, and no
    /// other `MmioBlock` may alias it while this one is live.
    #[must_use]
    pub const unsafe fn new(base: usize) -> Self {
        Self { base }
    }

    /// Block base address.
    #[must_use]
    pub const fn base(&self) -> usize {
        self.base
    }

    fn ptr(&self, reg: Register) -> *mut u32 {
        self.base.wrapping_add(reg.offset() as usize) as *mut u32
    }
}

impl Csr for MmioBlock {
    fn read(&self, reg: Register) -> u32 {
        // SAFETY: `new` requires the block to be valid for volatile access
        // at every register offset the drivers use.
        unsafe { core::ptr::read_volatile(self.ptr(reg)) }
    }

    fn write(&mut self, reg: Register, value: u32) {
        // SAFETY: see `read`; `&mut self` guarantees exclusive access.
        unsafe { core::ptr::write_volatile(self.ptr(reg), value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_mask_covers_width() {
        assert_eq!(Field::new(8, 8).mask(), 0x0000_ff00);
        assert_eq!(Field::new(8, 4).mask(), 0x0000_0f00);
        assert_eq!(Field::bit(0).mask(), 1);
        assert_eq!(Field::new(0, 32).mask(), u32::MAX);
    }

    #[test]
    fn field_encode_drops_overflowing_bits() {
        let chan = Field::new(8, 4);
        assert_eq!(chan.encode(3), 0x300);
        assert_eq!(chan.encode(0x13), 0x300);
    }

    #[test]
    fn field_decode_extracts_value() {
        let len = Field::new(8, 8);
        assert_eq!(len.decode(0x0000_1801), 0x18);
        assert!(Field::bit(0).is_set(0x0000_1801));
        assert!(!Field::bit(1).is_set(0x0000_1801));
    }

    #[test]
    fn modify_applies_closure_to_current_value() {
        struct One(u32);
        impl Csr for One {
            fn read(&self, _reg: Register) -> u32 {
                self.0
            }
            fn write(&mut self, _reg: Register, value: u32) {
                self.0 = value;
            }
        }
        let mut csr = One(0b0100);
        csr.modify(Register::at(0), |v| v | 1);
        assert_eq!(csr.0, 0b0101);
    }

    proptest::proptest! {
        #[test]
        fn encode_then_decode_is_identity_within_width(shift in 0u8..24, value in 0u32..256) {
            let f = Field::new(shift, 8);
            proptest::prop_assert_eq!(f.decode(f.encode(value)), value);
        }
    }
}
