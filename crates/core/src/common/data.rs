//! Memory Access Widths.
//!
//! This module defines the scalar widths used for monitor reads and writes.
//! These widths are used for the following:
//! 1. **Command Selection:** Each dialect maps a width to its own read/write verb.
//! 2. **Range Validation:** Rejecting values that do not fit before they reach the wire.
//! 3. **Tick Arithmetic:** Computing tick deltas modulo the counter's width.

use serde::{Deserialize, Serialize};

/// Width of a scalar memory access.
///
/// Names follow the ARM convention: a word is 32 bits.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Width {
    /// 8-bit access.
    Byte,
    /// 16-bit access.
    #[serde(alias = "half")]
    HalfWord,
    /// 32-bit access.
    Word,
    /// 64-bit access.
    #[serde(alias = "double")]
    DoubleWord,
}

impl Width {
    /// Returns the access size in bytes.
    pub const fn bytes(self) -> u64 {
        match self {
            Self::Byte => 1,
            Self::HalfWord => 2,
            Self::Word => 4,
            Self::DoubleWord => 8,
        }
    }

    /// Returns the largest unsigned value representable at this width.
    ///
    /// Also serves as the mask for arithmetic modulo `2^bits`.
    pub const fn max_unsigned(self) -> u64 {
        match self {
            Self::Byte => 0xFF,
            Self::HalfWord => 0xFFFF,
            Self::Word => 0xFFFF_FFFF,
            Self::DoubleWord => u64::MAX,
        }
    }

    /// Returns `true` if `value` fits in an unsigned field of this width.
    pub const fn fits(self, value: u64) -> bool {
        value <= self.max_unsigned()
    }

    /// Difference `now - prev` modulo `2^bits`.
    ///
    /// A counter that wrapped between the two samples still yields the number
    /// of increments that actually happened.
    pub const fn wrapping_delta(self, prev: u64, now: u64) -> u64 {
        now.wrapping_sub(prev) & self.max_unsigned()
    }
}
