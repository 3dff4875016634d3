//! # Unit Components
//!
//! This module serves as the central hub for the unit tests of each layer, from
//! the raw encodings up to the synchronization loop.




/// Unit tests for the monitor dialects.
///
/// This module organizes tests for the line channel, breakpoint bookkeeping and
/// the probe and emulator command grammars.
pub mod monitor;


/// Unit tests for run statistics and their report.
pub mod stats;

/// Unit tests for symbol feed parsing and address book construction.
pub mod symbols;
