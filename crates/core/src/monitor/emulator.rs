//! Emulator console dialect.
//!
//! This module speaks the Renode monitor command set. It provides:
//! 1. **Bootstrap:** Loading the machine script and running the first slice of virtual time.
//! 2. **Virtual Time:** `emulation RunFor "h:m:s.mmm"` stands in for free running; the
//!    firmware only advances while a `RunFor` is in progress.
//! 3. **Memory Access:** `Read*`/`Write*`/`ReadBytes` against the RAM peripheral.
//! 4. **Sensor Feed:** `FeedAccSample`/`FeedGyroSample`/`TriggerDataInterrupt` chained in
//!    a single command.
//!
//! Every reply is framed by the console prompt. The first line of a reply is the
//! command echo and is dropped; colour escapes around the prompt are stripped.
//!
//! Execution control is modelled on virtual time: `resume` only marks the firmware as
//! runnable, and `wait_for_halt` runs one quantum. Breakpoints are bookkept locally so
//! the loop can drive both dialects identically.
//!
//! A batch goes out as one chained command. A `Resume` inside it becomes the `RunFor`
//! of the next quantum, and the following `wait_for_halt` returns without another run.

use std::net::TcpStream;
use std::thread;
use std::time::Duration;

use tracing::{debug, info};

use super::channel::{LineChannel, Transport, connect_tcp};
use super::{
    BatchOp, BatchValue, Breakpoint, BreakpointHandle, BreakpointSlot, ImuSample, Monitor, Timing,
    check_batch, check_fits, parse_hex,
};
use crate::common::{Addr, MonitorError, Width};
use crate::config::{EmulatorConfig, MonitorConfig};

/// Reply fragments the console prints when a command fails.
const ERROR_MARKERS: [&str; 3] = ["There was an error", "No such command", "Could not find"];

const fn read_verb(width: Width) -> &'static str {
    match width {
        Width::Byte => "ReadByte",
        Width::HalfWord => "ReadWord",
        Width::Word => "ReadDoubleWord",
        Width::DoubleWord => "ReadQuadWord",
    }
}

const fn write_verb(width: Width) -> &'static str {
    match width {
        Width::Byte => "WriteByte",
        Width::HalfWord => "WriteWord",
        Width::Word => "WriteDoubleWord",
        Width::DoubleWord => "WriteQuadWord",
    }
}

/// Formats a virtual duration the way `RunFor` expects it (`0:0:0.001`).
///
/// Sub-millisecond durations keep microsecond precision (`0:0:0.000500`).
pub fn format_virtual_time(duration: Duration) -> String {
    let total_us = duration.as_micros();
    let hours = total_us / 3_600_000_000;
    let minutes = (total_us / 60_000_000) % 60;
    let seconds = (total_us / 1_000_000) % 60;
    let micros = total_us % 1_000_000;
    if micros % 1_000 == 0 {
        format!("{hours}:{minutes}:{seconds}.{:03}", micros / 1_000)
    } else {
        format!("{hours}:{minutes}:{seconds}.{micros:06}")
    }
}

fn run_for_command(duration: Duration) -> String {
    format!("emulation RunFor \"{}\"", format_virtual_time(duration))
}

/// A session with an emulator console.
#[derive(Debug)]
pub struct EmulatorSession<S: Transport = TcpStream> {
    channel: LineChannel<S>,
    timing: Timing,
    config: EmulatorConfig,
    breakpoints: BreakpointSlot,
    running: bool,
    advanced: bool,
}

impl EmulatorSession<TcpStream> {
    /// Connects to the console described by `monitor`.
    pub fn connect(monitor: &MonitorConfig, config: EmulatorConfig) -> Result<Self, MonitorError> {
        let stream = connect_tcp(&monitor.endpoint(), monitor.connect_timeout())?;
        Self::from_stream(stream, Timing::from(monitor), config)
    }
}

impl<S: Transport> EmulatorSession<S> {
    /// Opens a session over an established stream.
    ///
    /// Waits for the first prompt, then sends an empty line and waits for the prompt
    /// again so that any startup chatter is consumed. A zero quantum is rejected
    /// before anything is read, since it would never advance the firmware.
    pub fn from_stream(stream: S, timing: Timing, config: EmulatorConfig) -> Result<Self, MonitorError> {
        if config.quantum().is_zero() {
            return Err(MonitorError::InvalidState("emulator quantum must be at least 1 ms"));
        }
        let mut session = Self {
            channel: LineChannel::new(stream, "\r"),
            timing,
            config,
            breakpoints: BreakpointSlot::new(),
            running: false,
            advanced: false,
        };
        let _ = session.read_prompt(timing.reply)?;
        session.channel.send("")?;
        let _ = session.read_prompt(timing.reply)?;
        info!("emulator console ready");
        Ok(session)
    }

    fn read_prompt(&mut self, timeout: Duration) -> Result<String, MonitorError> {
        let prompts = [
            self.config.monitor_prompt.as_str(),
            self.config.machine_prompt.as_str(),
        ];
        self.channel
            .read_until_any(&prompts, timeout)
            .map(|(text, _)| text)
    }

    /// Runs one console command and returns its reply body.
    pub fn execute(&mut self, command: &str) -> Result<String, MonitorError> {
        self.execute_with(command, self.timing.reply)
    }

    /// Runs `commands` chained with `;` as a single console command.
    pub fn execute_chain(&mut self, commands: &[String]) -> Result<String, MonitorError> {
        self.execute(&commands.join("; "))
    }

    fn execute_with(&mut self, command: &str, timeout: Duration) -> Result<String, MonitorError> {
        self.channel.send(command)?;
        let raw = self.read_prompt(timeout)?;
        let body = reply_body(&raw);
        if ERROR_MARKERS.iter().any(|marker| body.contains(marker)) {
            return Err(self.channel.desync(format!("reply to `{command}`"), body));
        }
        Ok(body)
    }

    /// Loads the machine and runs the boot slice of virtual time.
    ///
    /// With no `script` configured the machine is assumed to be loaded already.
    pub fn bootstrap(&mut self) -> Result<(), MonitorError> {
        if let Some(script) = self.config.script.clone() {
            let _ = self.execute_with(&format!("i {script}"), self.config.run_timeout())?;
            info!(%script, "machine loaded");
        }
        for command in self.config.init_commands.clone() {
            let _ = self.execute(&command)?;
        }
        self.run_for(self.config.boot_run())
    }

    fn read_command(&self, addr: Addr, width: Width) -> String {
        format!("{} {} {addr}", self.config.memory_peripheral, read_verb(width))
    }

    fn write_command(&self, addr: Addr, value: u64, width: Width) -> String {
        format!(
            "{} {} {addr} {value:#x}",
            self.config.memory_peripheral,
            write_verb(width)
        )
    }

    fn read_bytes_command(&self, addr: Addr, len: usize) -> String {
        format!("{} ReadBytes {addr} {len}", self.config.memory_peripheral)
    }

    fn imu_commands(&self, sample: &ImuSample) -> [String; 3] {
        let [ax, ay, az] = sample.accel_mg;
        let [gx, gy, gz] = sample.gyro_dps;
        let accel = &self.config.accel_peripheral;
        let gyro = &self.config.gyro_peripheral;
        [
            format!("{accel} FeedAccSample {ax:.6} {ay:.6} {az:.6}"),
            format!("{gyro} FeedGyroSample {gx:.6} {gy:.6} {gz:.6}"),
            format!("{gyro} TriggerDataInterrupt"),
        ]
    }

    /// Emulator settings of this session.
    pub const fn config(&self) -> &EmulatorConfig {
        &self.config
    }

    /// The armed breakpoint, if any.
    pub const fn active_breakpoint(&self) -> Option<&Breakpoint> {
        self.breakpoints.active()
    }

    /// The underlying channel.
    pub const fn channel(&self) -> &LineChannel<S> {
        &self.channel
    }
}

impl<S: Transport> Monitor for EmulatorSession<S> {
    fn halt(&mut self) -> Result<(), MonitorError> {
        let _ = self.execute("pause")?;
        self.running = false;
        self.advanced = false;
        Ok(())
    }

    fn resume(&mut self) -> Result<(), MonitorError> {
        self.channel.check()?;
        self.running = true;
        Ok(())
    }

    fn wait_for_halt(&mut self) -> Result<(), MonitorError> {
        self.channel.check()?;
        if !self.running {
            return Err(MonitorError::InvalidState("wait_for_halt while halted"));
        }
        if self.advanced {
            self.advanced = false;
            self.running = false;
            debug!("quantum already run by the last batch");
            return Ok(());
        }
        self.run_for(self.config.quantum())?;
        self.running = false;
        Ok(())
    }

    fn set_breakpoint(&mut self, breakpoint: Breakpoint) -> Result<BreakpointHandle, MonitorError> {
        self.channel.check()?;
        self.breakpoints.check_free(&breakpoint)?;
        let handle = self.breakpoints.commit(breakpoint);
        debug!(addr = %breakpoint.addr, "breakpoint recorded; halts are quantum-driven");
        Ok(handle)
    }

    fn clear_breakpoint(&mut self, handle: BreakpointHandle) -> Result<(), MonitorError> {
        self.channel.check()?;
        let _ = self.breakpoints.check_active(handle)?;
        self.breakpoints.release();
        Ok(())
    }

    fn read_scalar(&mut self, addr: Addr, width: Width) -> Result<u64, MonitorError> {
        let command = self.read_command(addr, width);
        let body = self.execute(&command)?;
        let value = body
            .split_whitespace()
            .find(|token| token.starts_with("0x") || token.starts_with("0X"))
            .and_then(parse_hex);
        match value {
            Some(value) if width.fits(value) => Ok(value),
            _ => Err(self
                .channel
                .desync(format!("{width:?} value from `{command}`"), body)),
        }
    }

    fn write_scalar(&mut self, addr: Addr, value: u64, width: Width) -> Result<(), MonitorError> {
        check_fits(value, width)?;
        let command = self.write_command(addr, value, width);
        let _ = self.execute(&command)?;
        Ok(())
    }

    fn read_bytes(&mut self, addr: Addr, len: usize) -> Result<Vec<u8>, MonitorError> {
        if len == 0 {
            return Ok(Vec::new());
        }
        let command = self.read_bytes_command(addr, len);
        let body = self.execute(&command)?;
        match parse_byte_list(&body) {
            Some(bytes) if bytes.len() == len => Ok(bytes),
            _ => Err(self.channel.desync(format!("[{len} bytes]"), body)),
        }
    }

    fn run_for(&mut self, duration: Duration) -> Result<(), MonitorError> {
        let _ = self.execute_with(&run_for_command(duration), self.config.run_timeout())?;
        Ok(())
    }

    fn idle(&mut self) -> Result<(), MonitorError> {
        let _ = self.execute(&format!("{} TriggerDataInterrupt", self.config.gyro_peripheral))?;
        self.run_for(Duration::ZERO)
    }

    fn feed_imu(&mut self, sample: &ImuSample) -> Result<(), MonitorError> {
        let commands = self.imu_commands(sample);
        let _ = self.execute_chain(&commands)?;
        Ok(())
    }

    fn execute_batch(&mut self, ops: &[BatchOp]) -> Result<Vec<BatchValue>, MonitorError> {
        check_batch(ops)?;
        let mut commands = Vec::new();
        let mut advances = false;
        for &op in ops {
            match op {
                BatchOp::FeedImu(sample) => commands.extend(self.imu_commands(&sample)),
                BatchOp::Write { addr, value, width } => {
                    commands.push(self.write_command(addr, value, width));
                }
                BatchOp::Read { addr, width } => commands.push(self.read_command(addr, width)),
                BatchOp::ReadBytes { len: 0, .. } => {}
                BatchOp::ReadBytes { addr, len } => {
                    commands.push(self.read_bytes_command(addr, len));
                }
                BatchOp::Resume => {
                    commands.push(run_for_command(self.config.quantum()));
                    advances = true;
                }
            }
        }
        if commands.is_empty() {
            self.channel.check()?;
            return Ok(Vec::new());
        }

        let timeout = if advances {
            self.config.run_timeout()
        } else {
            self.timing.reply
        };
        let command = commands.join("; ");
        let body = self.execute_with(&command, timeout)?;
        let Some(values) = parse_batch_reply(&body, ops) else {
            let expected = format!("replies to {} chained commands", commands.len());
            return Err(self.channel.desync(expected, body));
        };
        if advances {
            self.running = true;
            self.advanced = true;
        }
        debug!(commands = commands.len(), "batch executed");
        Ok(values)
    }

    fn close(&mut self) -> Result<(), MonitorError> {
        if self.channel.is_closed() {
            return Ok(());
        }
        thread::sleep(self.timing.close_settle);
        self.channel.close()?;
        info!("emulator session closed");
        Ok(())
    }
}

impl<S: Transport> Drop for EmulatorSession<S> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

/// Drops the echoed command line and colour escapes from a prompt-framed reply.
fn reply_body(raw: &str) -> String {
    let after_echo = raw.split_once('\n').map_or("", |(_, rest)| rest);
    strip_ansi(after_echo).trim().to_string()
}

fn strip_ansi(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars();
    while let Some(c) = chars.next() {
        if c != '\x1b' {
            out.push(c);
            continue;
        }
        if chars.next() == Some('[') {
            for terminator in chars.by_ref() {
                if terminator.is_ascii_alphabetic() {
                    break;
                }
            }
        }
    }
    out
}

/// Parses a `ReadBytes` reply (`[ 0x01, 0x02, ... ]`).
fn parse_byte_list(body: &str) -> Option<Vec<u8>> {
    let start = body.find('[')?;
    let end = body[start..].find(']')? + start;
    body[start + 1..end]
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| parse_hex(token).and_then(|v| u8::try_from(v).ok()))
        .collect()
}

/// Splits a chained reply into one value per read op, in order.
///
/// Writes, feeds and `RunFor` print nothing; each scalar read prints one hex token and
/// each block read one bracketed list.
fn parse_batch_reply(body: &str, ops: &[BatchOp]) -> Option<Vec<BatchValue>> {
    let mut rest = body;
    let mut values = Vec::new();
    for op in ops {
        match *op {
            BatchOp::Read { width, .. } => {
                let (value, tail) = next_hex_token(rest)?;
                if !width.fits(value) {
                    return None;
                }
                values.push(BatchValue::Scalar(value));
                rest = tail;
            }
            BatchOp::ReadBytes { len: 0, .. } => values.push(BatchValue::Bytes(Vec::new())),
            BatchOp::ReadBytes { len, .. } => {
                let start = rest.find('[')?;
                let end = rest[start..].find(']')? + start;
                let bytes = parse_byte_list(&rest[start..=end])?;
                if bytes.len() != len {
                    return None;
                }
                values.push(BatchValue::Bytes(bytes));
                rest = &rest[end + 1..];
            }
            BatchOp::FeedImu(_) | BatchOp::Write { .. } | BatchOp::Resume => {}
        }
    }
    Some(values)
}

fn next_hex_token(text: &str) -> Option<(u64, &str)> {
    let start = text.find("0x").or_else(|| text.find("0X"))?;
    if text[..start].contains('[') {
        return None;
    }
    let digits = &text[start + 2..];
    let len = digits
        .find(|c: char| !c.is_ascii_hexdigit())
        .unwrap_or(digits.len());
    let value = u64::from_str_radix(&digits[..len], 16).ok()?;
    Some((value, &digits[len..]))
}
