//! Error definitions.
//!
//! This module defines the error taxonomy of the co-simulation library. It provides:
//! 1. **Resolution Errors:** Unparseable or missing symbols; fatal before any monitor traffic.
//! 2. **Codec Errors:** Values that cannot be represented on an unsigned firmware field.
//! 3. **Monitor Errors:** Connection failures, reply desynchronization and breakpoint misuse.
//! 4. **Run Errors:** The union the synchronization loop reports to its caller.

use std::io;
use std::time::Duration;

use thiserror::Error;

use super::addr::Addr;
use super::data::Width;

/// Failure to build or query the address book.
///
/// Every variant is a configuration problem: the run aborts before the first step.
#[derive(Debug, Error)]
pub enum ResolutionError {
    /// A raw address string in the symbol feed is not hexadecimal.
    #[error("symbol `{name}`: address `{raw}` is not hexadecimal")]
    BadAddress {
        /// Symbol the address belongs to.
        name: String,
        /// Address text as found in the feed (after any offset-digit stripping).
        raw: String,
    },

    /// A feed line has too few columns to contain an address.
    #[error("symbol feed line {line}: no address in column {column}: `{text}`")]
    MalformedLine {
        /// 1-based line number.
        line: usize,
        /// Column the address was expected in.
        column: usize,
        /// The offending line.
        text: String,
    },

    /// A name the loop needs is not in the address book.
    #[error("symbol `{0}` is not in the address book")]
    Unresolved(String),

    /// The breakpoint address falls outside the function it is meant to stop in.
    #[error(
        "entry point {entry} lies outside `{function}` ({base}, {size:#x} bytes); set symbols.entry_override"
    )]
    EntryOutsideFunction {
        /// Name of the function symbol.
        function: String,
        /// Base address of the function.
        base: Addr,
        /// Declared size of the function in bytes.
        size: u64,
        /// Computed or overridden entry address.
        entry: Addr,
    },

    /// The symbol feed could not be read.
    #[error("reading symbol feed: {0}")]
    Io(#[from] io::Error),
}

/// A physical value that cannot be written to its firmware field.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CodecError {
    /// A negative value was submitted to an unsigned field.
    #[error("negative value {value} submitted to an unsigned {width:?} field")]
    NegativeUnsigned {
        /// The rejected value.
        value: i64,
        /// Width of the destination field.
        width: Width,
    },

    /// A value exceeds the destination field's range.
    #[error("value {value} does not fit in a {width:?} field")]
    OutOfRange {
        /// The rejected value.
        value: i64,
        /// Width of the destination field.
        width: Width,
    },

    /// The physical value is NaN or infinite.
    #[error("non-finite value for `{0}`")]
    NonFinite(&'static str),
}

/// Failure of a monitor session operation.
#[derive(Debug, Error)]
pub enum MonitorError {
    /// The monitor endpoint refused or timed out the connection.
    #[error("cannot connect to monitor at {endpoint}: {source}")]
    Connect {
        /// `host:port` that was dialed.
        endpoint: String,
        /// Underlying socket error.
        #[source]
        source: io::Error,
    },

    /// A reply did not match the framing the dialect expects.
    #[error("protocol desync: expected {expected}, received {received:?}")]
    Desync {
        /// What the parser was looking for.
        expected: String,
        /// What arrived instead.
        received: String,
    },

    /// The expected reply delimiter did not arrive within the bounded wait.
    #[error("protocol desync: no {expected:?} within {waited:?}")]
    Timeout {
        /// Delimiter the parser was waiting for.
        expected: String,
        /// How long it waited.
        waited: Duration,
    },

    /// The session desynchronized earlier and must be closed.
    #[error("session is desynchronized; close it and start a new one")]
    Poisoned,

    /// The session was already closed.
    #[error("session is closed")]
    Closed,

    /// A breakpoint is already armed.
    #[error("breakpoint already armed at {active}; cannot arm {requested}")]
    BreakpointConflict {
        /// Address of the armed breakpoint.
        active: Addr,
        /// Address that was requested.
        requested: Addr,
    },

    /// `clear_breakpoint` was called with nothing armed.
    #[error("no breakpoint is armed")]
    NoActiveBreakpoint,

    /// The handle does not refer to the armed breakpoint.
    #[error("breakpoint handle #{0} is not the armed breakpoint")]
    StaleBreakpoint(u32),

    /// A value does not fit in the requested write width.
    #[error("value {value:#x} does not fit a {width:?} write")]
    ValueOutOfRange {
        /// The rejected value.
        value: u64,
        /// The requested width.
        width: Width,
    },

    /// The dialect does not implement this capability.
    #[error("operation `{0}` is not supported by this monitor")]
    Unsupported(&'static str),

    /// The operation is not valid in the session's current execution state.
    #[error("invalid session state: {0}")]
    InvalidState(&'static str),

    /// The connection failed while sending or receiving.
    #[error("monitor I/O: {0}")]
    Io(#[from] io::Error),
}

impl MonitorError {
    /// Returns `true` for errors after which the session cannot be trusted.
    pub const fn is_desync(&self) -> bool {
        matches!(
            self,
            Self::Desync { .. } | Self::Timeout { .. } | Self::Poisoned | Self::Io(_)
        )
    }
}

/// Failure writing flight records to a sink.
#[derive(Debug, Error)]
pub enum SinkError {
    /// The underlying writer failed.
    #[error("flight log I/O: {0}")]
    Io(#[from] io::Error),
    /// A record could not be serialized.
    #[error("flight log encoding: {0}")]
    Json(#[from] serde_json::Error),
}

/// Failure of a complete synchronization run.
#[derive(Debug, Error)]
pub enum RunError {
    /// Symbol resolution failed.
    #[error(transparent)]
    Resolution(#[from] ResolutionError),
    /// The monitor session failed.
    #[error(transparent)]
    Monitor(#[from] MonitorError),
    /// A sensor value could not be encoded.
    #[error(transparent)]
    Codec(#[from] CodecError),
    /// The flight log sink failed.
    #[error(transparent)]
    Sink(#[from] SinkError),
    /// The emulated firmware never reported a passed self-test.
    #[error("firmware self-test not passed after {attempts} attempts (status {status})")]
    StartupTimeout {
        /// Number of retry periods run.
        attempts: u32,
        /// Last observed status value.
        status: u64,
    },
    /// The loop was driven out of order.
    #[error("synchronization loop: {0}")]
    State(&'static str),
}
