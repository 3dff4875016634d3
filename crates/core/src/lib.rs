//! Firmware-in-the-loop co-simulation library.
//!
//! This crate keeps a host-side physics model and a live flight-controller firmware in
//! tick lock-step over a text-based debug monitor. It provides the following:
//! 1. **Symbols:** Address book construction from a symbol feed, with composite struct fan-out.
//! 2. **Codec:** Conversions between physical units and the firmware's raw integer encodings.
//! 3. **Monitor:** One capability trait over two monitor dialects (debug probe and emulator).
//! 4. **Simulation:** The breakpoint-gated synchronization loop, sensor marshaling and logging.
//! 5. **Statistics:** Halt, step and timing counters for a run.

/// Common types (addresses, access widths, constants, errors).
pub mod common;
/// Run configuration (defaults, enums, hierarchical config structures).
pub mod config;
/// Physical-unit to firmware wire-representation conversions.
pub mod codec;
/// Monitor capability trait and the probe/emulator sessions.
pub mod monitor;
/// Synchronization loop, plant interface, marshaling and flight logging.
pub mod sim;
/// Symbol feed parsing and address book construction.
pub mod symbols;
/// Run statistics collection and reporting.
pub mod stats;

/// Root configuration type; use `Config::default()` or deserialize from JSON.
pub use crate::config::Config;
/// Capability interface shared by both monitor dialects.
pub use crate::monitor::Monitor;
/// Breakpoint-gated loop driving a plant against a live firmware.
pub use crate::sim::SyncLoop;
/// Name-to-address map built once at startup.
pub use crate::symbols::AddressBook;
