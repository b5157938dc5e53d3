//! Word-wide register access.
//!
//! The sampling path and the interrupt handler touch the block concurrently,
//! so every accessor takes `&self`. Implementations serialize internally if the
//! underlying transport needs it.

use core::fmt;

/// A register access that the bus rejected.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub struct BusError {
    pub offset: u32,
}

impl fmt::Display for BusError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "register access failed at {:#05x}", self.offset)
    }
}

/// Read/write access to the 32-bit registers of one block.
pub trait RegisterBus {
    /// Reads the word at `offset` bytes from the block base.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the transport cannot complete the access.
    fn read(&self, offset: u32) -> Result<u32, BusError>;

    /// Writes `value` at `offset` bytes from the block base.
    ///
    /// # Errors
    ///
    /// Returns [`BusError`] when the transport cannot complete the access.
    fn write(&self, offset: u32, value: u32) -> Result<(), BusError>;

    /// Read-modify-write of the bits selected by `mask`.
    ///
    /// # Errors
    ///
    /// Propagates the first failed access.
    fn update_bits(&self, offset: u32, mask: u32, value: u32) -> Result<(), BusError> {
        let current = self.read(offset)?;
        self.write(offset, (current & !mask) | (value & mask))
    }
}

impl<T: RegisterBus + ?Sized> RegisterBus for &T {
    fn read(&self, offset: u32) -> Result<u32, BusError> {
        (**self).read(offset)
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), BusError> {
        (**self).write(offset, value)
    }
}

/// Memory-mapped register window.
#[derive(Debug)]
pub struct MmioBus {
    base: usize,
    len: u32,
}

impl MmioBus {
    /// Creates a bus over `len` bytes of device memory starting at `base`.
    ///
    /// # Safety
    ///
    /// `base..base + len` must be a mapped device register window that stays
    /// valid for the lifetime of the returned value, and nothing else may
    /// assume exclusive ownership of it.
    #[must_use]
    pub const unsafe fn new(base: usize, len: u32) -> Self {
        Self { base, len }
    }

    fn address(&self, offset: u32) -> Result<*mut u32, BusError> {
        let in_window = offset
            .checked_add(4)
            .is_some_and(|end| end <= self.len);
        if !in_window || offset & 0b11 != 0 {
            return Err(BusError { offset });
        }
        Ok((self.base + offset as usize) as *mut u32)
    }
}

impl RegisterBus for MmioBus {
    fn read(&self, offset: u32) -> Result<u32, BusError> {
        let address = self.address(offset)?;
        // SAFETY: `address` is aligned and inside the window promised in `new`.
        Ok(unsafe { core::ptr::read_volatile(address) })
    }

    fn write(&self, offset: u32, value: u32) -> Result<(), BusError> {
        let address = self.address(offset)?;
        // SAFETY: `address` is aligned and inside the window promised in `new`.
        unsafe { core::ptr::write_volatile(address, value) };
        Ok(())
    }
}
