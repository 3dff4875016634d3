//! Shared test infrastructure.

/// Fixture symbol feed and loop construction.
pub mod harness;
