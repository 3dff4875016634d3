//! Firmware address type.
//!
//! This module defines a strong type for addresses in the target's memory space. It provides:
//! 1. **Type Safety:** Keeps addresses apart from the raw values read and written at them.
//! 2. **Field Arithmetic:** Offsetting a struct base to reach a sub-field.
//! 3. **Monitor Labels:** The zero-padded rendering the probe monitor echoes in front of reads.

use std::fmt;

use serde::{Deserialize, Serialize};

/// An address in the firmware's memory space.
///
/// Addresses come from the symbol feed (optionally with a sub-field offset applied)
/// and are passed to monitor read/write/breakpoint operations.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Addr(pub u64);

impl Addr {
    /// Creates a new address from a raw value.
    ///
    /// # Arguments
    ///
    /// * `addr` - The raw address value.
    ///
    /// # Returns
    ///
    /// A new `Addr` wrapping the provided value.
    #[inline(always)]
    pub const fn new(addr: u64) -> Self {
        Self(addr)
    }

    /// Returns the raw address value.
    #[inline(always)]
    pub const fn val(&self) -> u64 {
        self.0
    }

    /// Returns the address `bytes` past this one.
    ///
    /// Used to reach a struct sub-field from its base symbol.
    #[inline(always)]
    pub const fn offset(&self, bytes: u64) -> Self {
        Self(self.0.wrapping_add(bytes))
    }

    /// Renders the address the way the probe monitor prints it in memory dumps.
    ///
    /// 32-bit addresses are zero-padded to eight hex digits (`0x0001e2a4`); wider
    /// addresses are padded to sixteen.
    pub fn label(&self) -> String {
        if self.0 <= u64::from(u32::MAX) {
            format!("{:#010x}", self.0)
        } else {
            format!("{:#018x}", self.0)
        }
    }
}

impl fmt::Display for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:#x}", self.0)
    }
}

impl fmt::LowerHex for Addr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl From<u64> for Addr {
    fn from(value: u64) -> Self {
        Self(value)
    }
}
