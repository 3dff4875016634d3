//! # Symbol Resolution Tests
//!
//! Feed parsing, composite fan-out, offset-digit stripping and entry checks.

use std::io::Write;

use cosim_core::common::{Addr, ResolutionError};
use cosim_core::config::SymbolConfig;
use cosim_core::sim::FirmwareMap;
use cosim_core::symbols::{
    self, AddressBook, ExpansionTable, RawSymbol, ScaleHint, names, parse_address,
};
use pretty_assertions::assert_eq;

use crate::common::harness::{self, FIXTURE_FEED};

fn resolve(raw: &[RawSymbol], strip: bool) -> Result<AddressBook, ResolutionError> {
    AddressBook::resolve(raw, strip, &ExpansionTable::firmware())
}

#[test]
fn test_state_fans_out_into_nine_fields() {
    let book = resolve(&[RawSymbol::new("stateCompressed", "0x20001040")], false).unwrap();
    let fields: Vec<(&str, Addr)> = book.iter().collect();
    assert_eq!(
        fields,
        vec![
            ("stateCompressed_ax", Addr::new(0x2000_104c)),
            ("stateCompressed_ay", Addr::new(0x2000_104e)),
            ("stateCompressed_az", Addr::new(0x2000_1050)),
            ("stateCompressed_vx", Addr::new(0x2000_1046)),
            ("stateCompressed_vy", Addr::new(0x2000_1048)),
            ("stateCompressed_vz", Addr::new(0x2000_104a)),
            ("stateCompressed_x", Addr::new(0x2000_1040)),
            ("stateCompressed_y", Addr::new(0x2000_1042)),
            ("stateCompressed_z", Addr::new(0x2000_1044)),
        ]
    );
    assert!(!book.contains("stateCompressed"));
    assert_eq!(book.base("stateCompressed"), Some(Addr::new(0x2000_1040)));
}

#[test]
fn test_fixture_fan_out() {
    let book = harness::fixture_book();
    assert_eq!(book.get("accelRaw_z").unwrap(), Addr::new(0x2000_1004));
    assert_eq!(book.get("gyroRaw_y").unwrap(), Addr::new(0x2000_1012));
    assert_eq!(book.get("motor_ratios_m4").unwrap(), Addr::new(0x2000_010c));
    assert_eq!(book.get("currentMotion_deltaX").unwrap(), Addr::new(0x2000_1022));
    assert_eq!(book.get("currentMotion_deltaY").unwrap(), Addr::new(0x2000_1024));
    assert_eq!(book.get("setpointCompressed_z").unwrap(), Addr::new(0x2000_1064));
    assert_eq!(book.get(names::SENSOR_TASK).unwrap(), harness::ENTRY);
    assert_eq!(book.base(names::SENSOR_TASK), Some(harness::SENSOR_TASK));
    assert_eq!(book.get(names::TICK).unwrap(), harness::TICK);
}

#[test]
fn test_plain_symbols_pass_through() {
    let raw = [
        RawSymbol::new("range_last", "0x20001030"),
        RawSymbol::new("accelRaw", "0x20001000"),
    ];
    let book = AddressBook::resolve(&raw, false, &ExpansionTable::empty()).unwrap();
    assert_eq!(book.len(), 2);
    assert_eq!(book.get("accelRaw").unwrap(), Addr::new(0x2000_1000));
    assert!(book.lookup("accelRaw_x").is_none());
}

#[test]
fn test_strip_leading_offset_digit() {
    assert_eq!(parse_address("0x8012345", true), Some(0x012345));
    assert_eq!(parse_address("0x8012345", false), Some(0x801_2345));
    assert_eq!(parse_address("20001000", false), Some(0x2000_1000));
    assert_eq!(parse_address("0x8", true), None);
    assert_eq!(parse_address("0xZZ", false), None);

    let book = resolve(&[RawSymbol::new("xTickCount", "0x820000010")], true).unwrap();
    assert_eq!(book.get("xTickCount").unwrap(), Addr::new(0x2000_0010));
}

#[test]
fn test_bad_address_names_symbol() {
    let err = resolve(&[RawSymbol::new("start", "0xnothex")], false).unwrap_err();
    match err {
        ResolutionError::BadAddress { name, raw } => {
            assert_eq!(name, "start");
            assert_eq!(raw, "0xnothex");
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_duplicate_keeps_last() {
    let raw = [
        RawSymbol::new("start", "0x20000020"),
        RawSymbol::new("start", "0x20000024"),
    ];
    let book = resolve(&raw, false).unwrap();
    assert_eq!(book.len(), 1);
    assert_eq!(book.get("start").unwrap(), Addr::new(0x2000_0024));
}

#[test]
fn test_missing_name_is_unresolved() {
    let book = harness::fixture_book();
    assert!(matches!(
        book.get("not_a_symbol"),
        Err(ResolutionError::Unresolved(name)) if name == "not_a_symbol"
    ));
}

#[test]
fn test_firmware_map_reports_first_missing_symbol() {
    let feed: String = FIXTURE_FEED
        .lines()
        .filter(|line| !line.starts_with("range_last"))
        .map(|line| format!("{line}\n"))
        .collect();
    let raw = symbols::parse_feed(&feed, 1).unwrap();
    let book = resolve(&raw, false).unwrap();
    assert!(matches!(
        FirmwareMap::resolve(&book),
        Err(ResolutionError::Unresolved(name)) if name == "range_last"
    ));
}

#[test]
fn test_parse_feed_skips_comments_and_blanks() {
    let raw = symbols::parse_feed("# header\n\nstart 0x20000020 1\n  ready   0x20001080\n", 1).unwrap();
    assert_eq!(
        raw,
        vec![
            RawSymbol::new("start", "0x20000020"),
            RawSymbol::new("ready", "0x20001080"),
        ]
    );
}

#[test]
fn test_parse_feed_malformed_line() {
    let err = symbols::parse_feed("# header\n\nstart\n", 1).unwrap_err();
    assert!(matches!(
        err,
        ResolutionError::MalformedLine { line: 3, column: 1, .. }
    ));
    assert!(matches!(
        symbols::parse_feed("start 0x20000020\n", 0),
        Err(ResolutionError::MalformedLine { line: 1, .. })
    ));
}

#[test]
fn test_parse_feed_alternate_column() {
    let raw = symbols::parse_feed("start data 0x20000020\n", 2).unwrap();
    assert_eq!(raw, vec![RawSymbol::new("start", "0x20000020")]);
}

#[test]
fn test_read_feed_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE_FEED.as_bytes()).unwrap();
    let raw = symbols::read_feed(file.path(), 1).unwrap();
    assert_eq!(raw.len(), 15);

    let missing = file.path().with_extension("missing");
    assert!(matches!(
        symbols::read_feed(&missing, 1),
        Err(ResolutionError::Io(_))
    ));
}

#[test]
fn test_load_requires_feed() {
    assert!(matches!(
        symbols::load(&SymbolConfig::default()),
        Err(ResolutionError::Unresolved(name)) if name == "symbols.feed"
    ));
}

#[test]
fn test_load_from_config() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    file.write_all(FIXTURE_FEED.as_bytes()).unwrap();
    let config = SymbolConfig {
        feed: Some(file.path().to_path_buf()),
        ..SymbolConfig::default()
    };
    let book = symbols::load(&config).unwrap();
    assert_eq!(book.get("accelRaw_x").unwrap(), harness::ACCEL);
}

#[test]
fn test_entry_override_and_validation() {
    let raw = symbols::parse_feed(FIXTURE_FEED, 1).unwrap();

    let config = SymbolConfig {
        entry_override: Some(0x0800_4030),
        entry_function_size: Some(0x1a0),
        ..SymbolConfig::default()
    };
    let book = symbols::build(&raw, &config).unwrap();
    assert_eq!(book.get(names::SENSOR_TASK).unwrap(), Addr::new(0x0800_4030));

    let too_small = SymbolConfig {
        entry_function_size: Some(0x20),
        ..SymbolConfig::default()
    };
    match symbols::build(&raw, &too_small).unwrap_err() {
        ResolutionError::EntryOutsideFunction {
            function,
            base,
            size,
            entry,
        } => {
            assert_eq!(function, names::SENSOR_TASK);
            assert_eq!(base, harness::SENSOR_TASK);
            assert_eq!(size, 0x20);
            assert_eq!(entry, harness::ENTRY);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn test_expansion_table_lookup() {
    let table = ExpansionTable::firmware();
    assert_eq!(table.lookup("stateCompressed").unwrap().fields.len(), 9);
    let delta_y = table.field("currentMotion_deltaY").unwrap();
    assert_eq!(delta_y.offset, 4);
    assert_eq!(delta_y.scale.map(ScaleHint::unit), Some("px"));
    assert_eq!(
        table.field(names::SENSOR_TASK).and_then(|f| f.scale),
        Some(ScaleHint::CodeDisplacement)
    );
    assert!(table.field("range_last").is_none());
    assert!(table.lookup("range_last").is_none());
    assert!(ExpansionTable::empty().rules().is_empty());
}

#[test]
fn test_address_book_serializes_numeric_addresses() {
    let book = harness::fixture_book();
    let value = serde_json::to_value(&book).unwrap();
    assert_eq!(value["entries"]["accelRaw_z"], 0x2000_1004);
    assert_eq!(value["bases"]["accelRaw"], 0x2000_1000);
    assert_eq!(value["entries"].as_object().unwrap().len(), book.len());
}
