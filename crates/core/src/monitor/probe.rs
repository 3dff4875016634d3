//! Debug-probe console dialect.
//!
//! This module speaks the OpenOCD telnet command set to a target on real hardware.
//! It provides:
//! 1. **Execution Control:** `halt`/`resume`, confirmed by the `pc: ` status line.
//! 2. **Breakpoints:** `bp <addr> <len> hw` and `rbp <addr>`.
//! 3. **Memory Access:** `md{b,h,w,d}` reads and `mw{b,h,w,d}` writes.
//!
//! Replies to memory reads are found by the echoed, zero-padded address label
//! (`0x20001000: 03e8`); everything before the label (command echo, prompts, telnet
//! negotiation) is discarded.

use std::net::TcpStream;
use std::thread;
use std::time::{Duration, Instant};

use tracing::{debug, info};

use super::channel::{LineChannel, Transport, connect_tcp};
use super::{
    Breakpoint, BreakpointHandle, BreakpointKind, BreakpointSlot, Monitor, Timing, check_fits,
    parse_hex,
};
use crate::common::{Addr, MonitorError, Width};
use crate::config::MonitorConfig;

/// Status lines read while waiting for a halt confirmation.
const MAX_STATUS_LINES: usize = 8;

/// Bytes per line of an `mdb` dump.
const DUMP_BYTES_PER_LINE: usize = 32;

const fn read_verb(width: Width) -> &'static str {
    match width {
        Width::Byte => "mdb",
        Width::HalfWord => "mdh",
        Width::Word => "mdw",
        Width::DoubleWord => "mdd",
    }
}

const fn write_verb(width: Width) -> &'static str {
    match width {
        Width::Byte => "mwb",
        Width::HalfWord => "mwh",
        Width::Word => "mww",
        Width::DoubleWord => "mwd",
    }
}

/// A session with a debug-probe console.
#[derive(Debug)]
pub struct ProbeSession<S: Transport = TcpStream> {
    channel: LineChannel<S>,
    timing: Timing,
    breakpoints: BreakpointSlot,
}

impl ProbeSession<TcpStream> {
    /// Connects to the console described by `config`.
    pub fn connect(config: &MonitorConfig) -> Result<Self, MonitorError> {
        let stream = connect_tcp(&config.endpoint(), config.connect_timeout())?;
        Self::from_stream(stream, Timing::from(config))
    }
}

impl<S: Transport> ProbeSession<S> {
    /// Opens a session over an established stream.
    ///
    /// Sends an empty line and consumes the console's first reply line (banner or
    /// prompt) so later replies start on a clean boundary.
    pub fn from_stream(stream: S, timing: Timing) -> Result<Self, MonitorError> {
        let mut session = Self {
            channel: LineChannel::new(stream, "\n"),
            timing,
            breakpoints: BreakpointSlot::new(),
        };
        session.channel.send("")?;
        let banner = session.channel.read_line(timing.reply)?;
        info!(banner = %banner.trim(), "probe console ready");
        Ok(session)
    }

    /// The armed breakpoint, if any.
    pub const fn active_breakpoint(&self) -> Option<&Breakpoint> {
        self.breakpoints.active()
    }

    /// The underlying channel.
    pub const fn channel(&self) -> &LineChannel<S> {
        &self.channel
    }

    fn expect_status(&mut self, what: &str, timeout: Duration) -> Result<String, MonitorError> {
        let deadline = Instant::now() + timeout;
        let mut seen = Vec::new();
        for _ in 0..MAX_STATUS_LINES {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let line = self.channel.read_line(remaining)?;
            if line.contains(what) {
                return Ok(line);
            }
            seen.push(line);
        }
        Err(self.channel.desync(format!("line containing `{what}`"), seen.join("\n")))
    }

    fn skip_echo(&mut self) -> Result<(), MonitorError> {
        let _ = self.channel.read_line(self.timing.reply)?;
        Ok(())
    }
}

impl<S: Transport> Monitor for ProbeSession<S> {
    fn halt(&mut self) -> Result<(), MonitorError> {
        self.channel.send("halt")?;
        let status = self.expect_status("pc: ", self.timing.reply)?;
        debug!(%status, "target halted");
        Ok(())
    }

    fn resume(&mut self) -> Result<(), MonitorError> {
        self.channel.send("resume")?;
        self.skip_echo()
    }

    fn wait_for_halt(&mut self) -> Result<(), MonitorError> {
        let status = self.expect_status("pc: ", self.timing.halt)?;
        debug!(%status, "breakpoint hit");
        Ok(())
    }

    fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<BreakpointHandle, MonitorError> {
        self.channel.check()?;
        self.breakpoints.check_free(&breakpoint)?;
        let kind = match breakpoint.kind {
            BreakpointKind::Hardware => " hw",
            BreakpointKind::Software => "",
        };
        self.channel.send(&format!(
            "bp {} {}{kind}",
            breakpoint.addr.label(),
            breakpoint.length
        ))?;
        let _ = self.expect_status("breakpoint set", self.timing.reply)?;
        let handle = self.breakpoints.commit(breakpoint);
        info!(addr = %breakpoint.addr, "breakpoint armed");
        Ok(handle)
    }

    fn clear_breakpoint(&mut self, handle: BreakpointHandle) -> Result<(), MonitorError> {
        self.channel.check()?;
        let breakpoint = self.breakpoints.check_active(handle)?;
        thread::sleep(self.timing.breakpoint_clear_delay);
        self.channel.send(&format!("rbp {}", breakpoint.addr.label()))?;
        self.skip_echo()?;
        self.breakpoints.release();
        info!(addr = %breakpoint.addr, "breakpoint removed");
        Ok(())
    }

    fn read_scalar(&mut self, addr: Addr, width: Width) -> Result<u64, MonitorError> {
        let label = addr.label();
        self.channel.send(&format!("{} {label}", read_verb(width)))?;
        let marker = format!("{label}: ");
        let _ = self.channel.read_until(&marker, self.timing.reply)?;
        let line = self.channel.read_line(self.timing.reply)?;
        match line.split_whitespace().next().and_then(parse_hex) {
            Some(value) if width.fits(value) => Ok(value),
            _ => Err(self
                .channel
                .desync(format!("{width:?} value after `{marker}`"), line)),
        }
    }

    fn write_scalar(&mut self, addr: Addr, value: u64, width: Width) -> Result<(), MonitorError> {
        check_fits(value, width)?;
        self.channel.send(&format!(
            "{} {} {value:#x}",
            write_verb(width),
            addr.label()
        ))?;
        self.skip_echo()
    }

    fn read_bytes(&mut self, addr: Addr, len: usize) -> Result<Vec<u8>, MonitorError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        self.channel.send(&format!("mdb {} {len}", addr.label()))?;
        let mut bytes = Vec::with_capacity(len);
        let max_lines = len.div_ceil(DUMP_BYTES_PER_LINE) + MAX_STATUS_LINES;
        for _ in 0..max_lines {
            let line = self.channel.read_line(self.timing.reply)?;
            let Some(row) = parse_dump_row(&line) else {
                continue;
            };
            let Some(row) = row else {
                return Err(self.channel.desync("hex byte dump row", line));
            };
            bytes.extend(row);
            if bytes.len() >= len {
                bytes.truncate(len);
                return Ok(bytes);
            }
        }
        Err(self
            .channel
            .desync(format!("{len} dumped bytes"), format!("{} bytes", bytes.len())))
    }

    fn close(&mut self) -> Result<(), MonitorError> {
        if self.channel.is_closed() {
            return Ok(());
        }
        thread::sleep(self.timing.close_settle);
        self.channel.close()?;
        info!("probe session closed");
        Ok(())
    }
}

impl<S: Transport> Drop for ProbeSession<S> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Splits an `mdb` dump row (`0x20001000: 01 02 ...`).
///
/// Returns `None` for lines that are not dump rows (echo, prompt), and `Some(None)`
/// for a row whose byte tokens do not parse.
fn parse_dump_row(line: &str) -> Option<Option<Vec<u8>>> {
    let (label, data) = line.split_once(": ")?;
    let label = label.split_whitespace().last()?;
    if !label.starts_with("0x") || parse_hex(label).is_none() {
        return None;
    }
    Some(
        data.split_whitespace()
            .map(|token| u8::from_str_radix(token, 16).ok())
            .collect(),
    )
}
