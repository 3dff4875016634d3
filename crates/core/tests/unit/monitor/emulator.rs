//! # Emulator Dialect Tests
//!
//! Prompt framing, memory verbs, virtual-time slices and the sensor feed chain.

use std::time::Duration;

use cosim_core::common::{Addr, MonitorError, Width};
use cosim_core::config::EmulatorConfig;
use cosim_core::monitor::emulator::format_virtual_time;
use cosim_core::monitor::{
    BatchOp, BatchValue, Breakpoint, EmulatorSession, ImuSample, Monitor, Timing,
};
use cosim_core::sim::{FirmwareBridge, LoopState, MemorySink, StaticPlant, SyncLoop};
use pretty_assertions::assert_eq;

use crate::common::harness::{self, TestContext, init_tracing};
use crate::common::mocks::stream::ScriptedStream;

const PROMPT: &str = "(CF2.1) ";

/// A prompt-framed reply: command echo, optional body, prompt.
fn reply(echo: &str, body: &str) -> String {
    if body.is_empty() {
        format!("{echo}\r\n{PROMPT}")
    } else {
        format!("{echo}\r\n{body}\r\n{PROMPT}")
    }
}

fn session_with(
    config: EmulatorConfig,
    replies: &str,
) -> (EmulatorSession<ScriptedStream>, ScriptedStream) {
    init_tracing();
    let greeting = "Renode, version 1.14\r\n(monitor) \r\n(monitor) ";
    let stream = ScriptedStream::new(&format!("{greeting}{replies}"));
    let session = EmulatorSession::from_stream(
        stream.clone(),
        Timing::immediate(Duration::from_millis(200)),
        config,
    )
    .unwrap();
    stream.clear_written();
    (session, stream)
}

fn session(replies: &str) -> (EmulatorSession<ScriptedStream>, ScriptedStream) {
    session_with(EmulatorConfig::default(), replies)
}

#[test]
fn test_virtual_time_format() {
    assert_eq!(format_virtual_time(Duration::from_millis(1)), "0:0:0.001");
    assert_eq!(format_virtual_time(Duration::from_millis(1_900)), "0:0:1.900");
    assert_eq!(format_virtual_time(Duration::from_millis(3_723_456)), "1:2:3.456");
    assert_eq!(format_virtual_time(Duration::ZERO), "0:0:0.000");
}

#[test]
fn test_virtual_time_keeps_microseconds() {
    assert_eq!(format_virtual_time(Duration::from_micros(500)), "0:0:0.000500");
    assert_eq!(format_virtual_time(Duration::from_micros(1_250)), "0:0:0.001250");
    assert_eq!(format_virtual_time(Duration::from_nanos(999)), "0:0:0.000");
}

#[test]
fn test_zero_quantum_rejected_before_io() {
    let stream = ScriptedStream::new("");
    let config = EmulatorConfig {
        quantum_ms: 0,
        ..EmulatorConfig::default()
    };
    let result = EmulatorSession::from_stream(
        stream.clone(),
        Timing::immediate(Duration::from_millis(200)),
        config,
    );
    assert!(matches!(result, Err(MonitorError::InvalidState(_))));
    assert_eq!(stream.written(), "");
}

#[test]
fn test_read_double_word() {
    let (mut emu, stream) = session(&reply("sysbus.sram ReadDoubleWord 0x20000010", "0x000003E8"));
    assert_eq!(emu.read_scalar(Addr::new(0x2000_0010), Width::Word).unwrap(), 1000);
    assert_eq!(stream.written(), "sysbus.sram ReadDoubleWord 0x20000010\r");
}

#[test]
fn test_read_byte_strips_colour() {
    let (mut emu, _) = session(&reply("sysbus.sram ReadByte 0x20001080", "\x1b[32m0x01\x1b[0m"));
    assert_eq!(emu.read_scalar(Addr::new(0x2000_1080), Width::Byte).unwrap(), 1);
}

#[test]
fn test_write_word_command() {
    let (mut emu, stream) = session(&reply("sysbus.sram WriteWord 0x20001004 0x555", ""));
    emu.write_scalar(Addr::new(0x2000_1004), 1365, Width::HalfWord)
        .unwrap();
    assert_eq!(stream.written(), "sysbus.sram WriteWord 0x20001004 0x555\r");
}

#[test]
fn test_start_flag_write_byte() {
    let (mut emu, stream) = session(&reply("sysbus.sram WriteByte 0x20000020 0x1", ""));
    emu.write_scalar(Addr::new(0x2000_0020), 1, Width::Byte).unwrap();
    assert_eq!(stream.written(), "sysbus.sram WriteByte 0x20000020 0x1\r");
}

#[test]
fn test_read_bytes_list() {
    let (mut emu, stream) = session(&reply(
        "sysbus.sram ReadBytes 0x20001040 6",
        "[\r\n  0xE8, 0x03, 0x18, 0xFC, 0x00, 0x00\r\n]",
    ));
    let bytes = emu.read_bytes(Addr::new(0x2000_1040), 6).unwrap();
    assert_eq!(bytes, vec![0xe8, 0x03, 0x18, 0xfc, 0x00, 0x00]);
    assert_eq!(stream.written(), "sysbus.sram ReadBytes 0x20001040 6\r");
}

#[test]
fn test_read_bytes_short_list_is_desync() {
    let (mut emu, _) = session(&reply("sysbus.sram ReadBytes 0x20001040 6", "[ 0xE8, 0x03 ]"));
    assert!(matches!(
        emu.read_bytes(Addr::new(0x2000_1040), 6),
        Err(MonitorError::Desync { .. })
    ));
}

#[test]
fn test_error_reply_poisons() {
    let (mut emu, _) = session(&reply(
        "sysbus.sram ReadDoubleWord 0x20000010",
        "Could not find peripheral sysbus.sram",
    ));
    assert!(matches!(
        emu.read_scalar(Addr::new(0x2000_0010), Width::Word),
        Err(MonitorError::Desync { .. })
    ));
    assert!(emu.channel().is_poisoned());
    assert!(matches!(emu.halt(), Err(MonitorError::Poisoned)));
}

#[test]
fn test_run_for_command() {
    let (mut emu, stream) = session(&reply("emulation RunFor \"0:0:3.000\"", ""));
    emu.run_for(Duration::from_secs(3)).unwrap();
    assert_eq!(stream.written(), "emulation RunFor \"0:0:3.000\"\r");
}

#[test]
fn test_halts_are_quantum_driven() {
    let (mut emu, stream) = session(&format!(
        "{}{}",
        reply("pause", ""),
        reply("emulation RunFor \"0:0:0.001\"", "")
    ));
    emu.halt().unwrap();
    assert!(matches!(
        emu.wait_for_halt(),
        Err(MonitorError::InvalidState(_))
    ));
    emu.resume().unwrap();
    emu.wait_for_halt().unwrap();
    assert_eq!(stream.written(), "pause\remulation RunFor \"0:0:0.001\"\r");
}

#[test]
fn test_breakpoints_are_local() {
    let (mut emu, stream) = session("");
    let entry = Addr::new(0x0800_4024);
    let handle = emu.set_breakpoint(Breakpoint::hardware(entry)).unwrap();
    assert!(matches!(
        emu.set_breakpoint(Breakpoint::hardware(entry)),
        Err(MonitorError::BreakpointConflict { .. })
    ));
    emu.clear_breakpoint(handle).unwrap();
    assert!(matches!(
        emu.clear_breakpoint(handle),
        Err(MonitorError::NoActiveBreakpoint)
    ));
    assert_eq!(stream.written(), "");
}

#[test]
fn test_feed_imu_chain() {
    let (mut emu, stream) = session(&reply("feed", ""));
    emu.feed_imu(&ImuSample {
        accel_mg: [0.0, -12.5, 1000.0],
        gyro_dps: [0.0, 0.0, 1.25],
    })
    .unwrap();
    assert_eq!(
        stream.written(),
        "sysbus.i2c3.bmi_accel FeedAccSample 0.000000 -12.500000 1000.000000; \
         sysbus.i2c3.bmi_gyro FeedGyroSample 0.000000 0.000000 1.250000; \
         sysbus.i2c3.bmi_gyro TriggerDataInterrupt\r"
    );
}

#[test]
fn test_idle_raises_interrupt_then_runs_zero() {
    let (mut emu, stream) = session(&format!(
        "{}{}",
        reply("irq", ""),
        reply("run", "")
    ));
    emu.idle().unwrap();
    assert_eq!(
        stream.written(),
        "sysbus.i2c3.bmi_gyro TriggerDataInterrupt\remulation RunFor \"0:0:0.000\"\r"
    );
}

#[test]
fn test_bootstrap_sequence() {
    let config = EmulatorConfig {
        script: Some("@scripts/cf.resc".to_string()),
        init_commands: vec!["logLevel 3".to_string()],
        ..EmulatorConfig::default()
    };
    let replies = format!(
        "{}{}{}",
        reply("i @scripts/cf.resc", ""),
        reply("logLevel 3", ""),
        reply("emulation RunFor \"0:0:0.100\"", "")
    );
    let (mut emu, stream) = session_with(config, &replies);
    emu.bootstrap().unwrap();
    assert_eq!(
        stream.written(),
        "i @scripts/cf.resc\rlogLevel 3\remulation RunFor \"0:0:0.100\"\r"
    );
}

#[test]
fn test_closed_session_rejects_commands() {
    let (mut emu, _) = session("");
    emu.close().unwrap();
    assert!(matches!(emu.run_for(Duration::ZERO), Err(MonitorError::Closed)));
}

#[test]
fn test_batch_is_one_command_line() {
    let (mut emu, stream) = session(&reply(
        "batch",
        "0xFFFF\r\n[ 0xE8, 0x03, 0x18, 0xFC, 0x00, 0x00 ]",
    ));
    let values = emu
        .execute_batch(&[
            BatchOp::Write {
                addr: Addr::new(0x2000_1030),
                value: 1500,
                width: Width::HalfWord,
            },
            BatchOp::Read {
                addr: Addr::new(0x2000_1070),
                width: Width::HalfWord,
            },
            BatchOp::ReadBytes {
                addr: Addr::new(0x2000_1040),
                len: 6,
            },
            BatchOp::Resume,
        ])
        .unwrap();

    assert_eq!(
        values,
        vec![
            BatchValue::Scalar(0xFFFF),
            BatchValue::Bytes(vec![0xe8, 0x03, 0x18, 0xfc, 0x00, 0x00]),
        ]
    );
    assert_eq!(
        stream.written(),
        "sysbus.sram WriteWord 0x20001030 0x5dc; \
         sysbus.sram ReadWord 0x20001070; \
         sysbus.sram ReadBytes 0x20001040 6; \
         emulation RunFor \"0:0:0.001\"\r"
    );

    // The batch already ran the quantum.
    emu.wait_for_halt().unwrap();
    assert_eq!(stream.written().matches('\r').count(), 1);
}

#[test]
fn test_batch_reply_missing_value_is_desync() {
    let (mut emu, _) = session(&reply("batch", "0x0001"));
    let reads = [
        BatchOp::Read {
            addr: Addr::new(0x2000_1070),
            width: Width::HalfWord,
        },
        BatchOp::Read {
            addr: Addr::new(0x2000_1072),
            width: Width::HalfWord,
        },
    ];
    assert!(matches!(
        emu.execute_batch(&reads),
        Err(MonitorError::Desync { .. })
    ));
    assert!(emu.channel().is_poisoned());
}

/// Telemetry for a vehicle 1 m up with a 1 m setpoint and zero innovations.
const TELEMETRY_BODY: &str = "[ 0x00, 0x00, 0x00, 0x00, 0xE8, 0x03 ]\r\n\
     [ 0x00, 0x00, 0x00, 0x00, 0x00, 0x00 ]\r\n\
     [ 0x00, 0x00, 0x00, 0x00, 0xE8, 0x03 ]\r\n\
     0x0000\r\n0x0000\r\n0x0000";

#[test]
fn test_loop_sends_one_batch_line_per_step() {
    let word = |value: &str| reply("read", value);
    let mut replies = vec![
        reply("pause", ""),
        reply("run", ""),
        word("0x000003E8"),
        reply("start", ""),
        reply("run", ""),
        word("0x000003F2"),
    ];
    replies.extend((0..4).map(|_| word("0x00000000")));
    replies.push(reply("batch", TELEMETRY_BODY));
    replies.push(word("0x000003FC"));
    replies.extend((0..4).map(|_| word("0x00000000")));
    replies.push(reply("batch", TELEMETRY_BODY));

    let (emu, stream) = session(&replies.concat());
    let settings = TestContext::new().with_budget(2).settings();
    let bridge = FirmwareBridge::new(harness::fixture_map(), Default::default());
    let mut sync = SyncLoop::new(
        emu,
        StaticPlant::new(1.0, 0),
        MemorySink::new(),
        bridge,
        settings,
    );

    let stats = sync.run().unwrap().clone();
    assert_eq!(stats.steps, 2);
    assert_eq!(sync.state(), LoopState::Closed);

    let written = stream.written();
    let lines: Vec<&str> = written.split('\r').filter(|line| !line.is_empty()).collect();
    assert_eq!(lines.len(), 17);
    let batches: Vec<&str> = lines
        .iter()
        .copied()
        .filter(|line| line.contains("ReadBytes"))
        .collect();
    assert_eq!(batches.len(), 2);
    for batch in &batches {
        assert_eq!(batch.matches("ReadBytes").count(), 3);
        assert!(batch.starts_with("sysbus.sram WriteWord 0x20001000 0x0; "));
    }
    assert!(batches[0].ends_with("; emulation RunFor \"0:0:0.001\""));
    assert!(!batches[1].contains("RunFor"));
    assert_eq!(
        lines
            .iter()
            .filter(|line| **line == "emulation RunFor \"0:0:0.001\"")
            .count(),
        2
    );

    let records = sync.sink().records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[1].tick, 1020);
    assert_eq!(records[1].telemetry.position, [0.0, 0.0, 1.0]);
    assert_eq!(records[1].telemetry.setpoint, [0.0, 0.0, 1.0]);
    assert!(stream.was_shut_down());
}
