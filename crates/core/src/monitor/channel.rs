//! Line-oriented request/reply channel.
//!
//! Both monitor consoles are telnet-style text streams. The channel buffers whatever
//! arrives and hands out text up to a delimiter, giving up once a deadline passes.
//! Any timeout, end of stream or framing error poisons the channel: later calls fail
//! with `Poisoned` until it is closed.

use std::io::{self, ErrorKind, Read, Write};
use std::net::{Shutdown, TcpStream, ToSocketAddrs};
use std::time::{Duration, Instant};

use tracing::{debug, error, info, trace};

use crate::common::MonitorError;

const READ_CHUNK: usize = 512;

/// A byte stream a monitor session can run over.
pub trait Transport: Read + Write {
    /// Bounds the next blocking read; `None` blocks indefinitely.
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()>;

    /// Closes both directions of the stream.
    fn shutdown(&mut self) -> io::Result<()>;
}

impl Transport for TcpStream {
    fn set_read_timeout(&mut self, timeout: Option<Duration>) -> io::Result<()> {
        Self::set_read_timeout(self, timeout)
    }

    fn shutdown(&mut self) -> io::Result<()> {
        Self::shutdown(self, Shutdown::Both)
    }
}

/// Opens a TCP connection to a monitor console.
///
/// # Arguments
///
/// * `endpoint` - `host:port` of the console.
/// * `timeout` - Limit for each connection attempt.
///
/// # Returns
///
/// The connected stream, or `Connect` if every resolved address refused or timed out.
pub fn connect_tcp(endpoint: &str, timeout: Duration) -> Result<TcpStream, MonitorError> {
    let connect_err = |source: io::Error| MonitorError::Connect {
        endpoint: endpoint.to_string(),
        source,
    };
    let mut last = io::Error::new(ErrorKind::NotFound, "endpoint resolved to no address");
    for addr in endpoint.to_socket_addrs().map_err(connect_err)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true).map_err(connect_err)?;
                info!(endpoint, "connected to monitor");
                return Ok(stream);
            }
            Err(e) => last = e,
        }
    }
    Err(connect_err(last))
}

/// Buffered, deadline-bounded line I/O over a [`Transport`].
#[derive(Debug)]
pub struct LineChannel<S> {
    stream: S,
    pending: Vec<u8>,
    terminator: &'static str,
    poisoned: bool,
    closed: bool,
}

impl<S: Transport> LineChannel<S> {
    /// Wraps `stream`; every command sent is followed by `terminator`.
    pub const fn new(stream: S, terminator: &'static str) -> Self {
        Self {
            stream,
            pending: Vec::new(),
            terminator,
            poisoned: false,
            closed: false,
        }
    }

    /// Fails if the channel was closed or desynchronized.
    pub const fn check(&self) -> Result<(), MonitorError> {
        if self.closed {
            Err(MonitorError::Closed)
        } else if self.poisoned {
            Err(MonitorError::Poisoned)
        } else {
            Ok(())
        }
    }

    /// Returns `true` once a desync has been observed.
    pub const fn is_poisoned(&self) -> bool {
        self.poisoned
    }

    /// Returns `true` once the channel has been closed.
    pub const fn is_closed(&self) -> bool {
        self.closed
    }

    /// Sends one command line.
    pub fn send(&mut self, command: &str) -> Result<(), MonitorError> {
        self.check()?;
        debug!(command, "monitor <-");
        let result = self
            .stream
            .write_all(command.as_bytes())
            .and_then(|()| self.stream.write_all(self.terminator.as_bytes()))
            .and_then(|()| self.stream.flush());
        result.map_err(|e| self.fail(MonitorError::Io(e)))
    }

    /// Marks the channel desynchronized and returns `err` for propagation.
    pub fn fail(&mut self, err: MonitorError) -> MonitorError {
        if !self.poisoned {
            error!(%err, "monitor session desynchronized");
        }
        self.poisoned = true;
        err
    }

    /// Builds a `Desync` error, poisoning the channel.
    pub fn desync(&mut self, expected: impl Into<String>, received: impl Into<String>) -> MonitorError {
        self.fail(MonitorError::Desync {
            expected: expected.into(),
            received: received.into(),
        })
    }

    /// Reads up to and including `delimiter`.
    ///
    /// # Returns
    ///
    /// Everything received before the delimiter (the delimiter itself is consumed but
    /// not returned), or `Timeout` if it does not arrive within `timeout`.
    pub fn read_until(&mut self, delimiter: &str, timeout: Duration) -> Result<String, MonitorError> {
        self.read_until_any(&[delimiter], timeout).map(|(text, _)| text)
    }

    /// Reads up to the earliest of several delimiters.
    ///
    /// # Returns
    ///
    /// The text before the delimiter and the index of the delimiter that matched.
    pub fn read_until_any(
        &mut self,
        delimiters: &[&str],
        timeout: Duration,
    ) -> Result<(String, usize), MonitorError> {
        self.check()?;
        let deadline = Instant::now() + timeout;
        loop {
            if let Some((start, which)) = earliest(&self.pending, delimiters) {
                let end = start + delimiters[which].len();
                let consumed: Vec<u8> = self.pending.drain(..end).collect();
                let text = String::from_utf8_lossy(&consumed[..start]).into_owned();
                trace!(reply = %text.escape_debug(), "monitor ->");
                return Ok((text, which));
            }

            let now = Instant::now();
            if now >= deadline {
                return Err(self.fail(MonitorError::Timeout {
                    expected: delimiters.join(" | "),
                    waited: timeout,
                }));
            }
            if let Err(e) = self.stream.set_read_timeout(Some(deadline - now)) {
                return Err(self.fail(MonitorError::Io(e)));
            }

            let mut chunk = [0u8; READ_CHUNK];
            match self.stream.read(&mut chunk) {
                Ok(0) => {
                    let received = String::from_utf8_lossy(&self.pending).into_owned();
                    return Err(self.desync(delimiters.join(" | "), format!("{received}<eof>")));
                }
                Ok(n) => self.pending.extend_from_slice(&chunk[..n]),
                Err(e)
                    if matches!(
                        e.kind(),
                        ErrorKind::WouldBlock | ErrorKind::TimedOut | ErrorKind::Interrupted
                    ) => {}
                Err(e) => return Err(self.fail(MonitorError::Io(e))),
            }
        }
    }

    /// Reads one line, without its `\r\n` / `\n` ending.
    pub fn read_line(&mut self, timeout: Duration) -> Result<String, MonitorError> {
        self.read_until("\n", timeout)
            .map(|line| line.trim_end_matches('\r').to_string())
    }

    /// Shuts the stream down. Idempotent.
    pub fn close(&mut self) -> Result<(), MonitorError> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.pending.clear();
        match self.stream.shutdown() {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotConnected => Ok(()),
            Err(e) => Err(MonitorError::Io(e)),
        }
    }

    /// The underlying stream.
    pub const fn stream(&self) -> &S {
        &self.stream
    }
}

fn earliest(haystack: &[u8], needles: &[&str]) -> Option<(usize, usize)> {
    needles
        .iter()
        .enumerate()
        .filter_map(|(idx, needle)| find(haystack, needle.as_bytes()).map(|pos| (pos, idx)))
        .min()
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if needle.is_empty() {
        return Some(0);
    }
    haystack.windows(needle.len()).position(|window| window == needle)
}
