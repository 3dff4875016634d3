//! Symbol resolution.
//!
//! This module turns the firmware's symbol feed into an address book. It provides:
//! 1. **Feed Parsing:** Splitting the map-file dump into `(name, address)` pairs.
//! 2. **Layout Table:** Declarative struct layouts that fan one symbol out into fields.
//! 3. **Address Book:** Resolution, lookup, entry override and entry validation.

/// Address book construction and lookup.
pub mod book;

/// Symbol feed parsing.
pub mod feed;

/// Firmware struct layout table.
pub mod layout;

pub use book::{AddressBook, parse_address};
pub use feed::{RawSymbol, parse_feed, read_feed};
pub use layout::{CompositeRule, ExpansionTable, FieldRule, ScaleHint, names};

use tracing::info;

use crate::common::{Addr, ResolutionError};
use crate::config::SymbolConfig;

/// Builds the address book described by `config` from already-parsed pairs.
///
/// Applies the firmware layout table, then `entry_override`, then the entry range
/// check when `entry_function_size` is set.
pub fn build(raw: &[RawSymbol], config: &SymbolConfig) -> Result<AddressBook, ResolutionError> {
    let mut book = AddressBook::resolve(
        raw,
        config.strip_leading_offset_digit,
        &ExpansionTable::firmware(),
    )?;
    if let Some(entry) = config.entry_override {
        book = book.with_override(names::SENSOR_TASK, Addr::new(entry));
    }
    if let Some(size) = config.entry_function_size {
        let entry = book.validate_entry(names::SENSOR_TASK, size)?;
        info!(%entry, "sensor-task breakpoint lies inside its function");
    }
    Ok(book)
}

/// Reads the feed named in `config` and builds the address book.
pub fn load(config: &SymbolConfig) -> Result<AddressBook, ResolutionError> {
    let path = config
        .feed
        .as_deref()
        .ok_or_else(|| ResolutionError::Unresolved("symbols.feed".to_string()))?;
    let raw = read_feed(path, config.address_column)?;
    build(&raw, config)
}
