//! Common utilities and types used throughout the co-simulation library.
//!
//! This module provides the building blocks shared by the resolver, the monitor
//! sessions and the synchronization loop. It includes:
//! 1. **Address Type:** A strong type for firmware memory addresses.
//! 2. **Access Widths:** The scalar widths a monitor can read and write.
//! 3. **Constants:** Physical constants and sensor full-scale ranges.
//! 4. **Error Handling:** Typed errors for resolution, encoding, monitor and run failures.

/// Firmware address type.
pub mod addr;

/// Physical constants and firmware sensor ranges.
pub mod constants;

/// Memory access widths.
pub mod data;

/// Error types for every layer.
pub mod error;

pub use addr::Addr;
pub use data::Width;
pub use error::{CodecError, MonitorError, ResolutionError, RunError, SinkError};
