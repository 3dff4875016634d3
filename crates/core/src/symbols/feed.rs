//! Symbol feed parsing.
//!
//! The feed is the text dump produced by the firmware build's map-file tool, one
//! symbol per line. Only the name (first column) and the address column are used;
//! any further columns are ignored.

use std::fs;
use std::path::Path;

use crate::common::ResolutionError;

/// An unresolved `(name, address text)` pair as it appears in the feed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RawSymbol {
    /// Symbol name.
    pub name: String,
    /// Address text, not yet parsed.
    pub address: String,
}

impl RawSymbol {
    /// Creates a raw pair.
    pub fn new(name: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            address: address.into(),
        }
    }
}

/// Splits feed text into raw symbol pairs.
///
/// Blank lines and lines starting with `#` are skipped.
///
/// # Arguments
///
/// * `text` - Whole feed contents.
/// * `address_column` - 0-based whitespace-separated column holding the address.
///
/// # Returns
///
/// The pairs in feed order, or `MalformedLine` for a line with too few columns.
pub fn parse_feed(text: &str, address_column: usize) -> Result<Vec<RawSymbol>, ResolutionError> {
    let mut symbols = Vec::new();
    for (idx, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let columns: Vec<&str> = trimmed.split_whitespace().collect();
        match (columns.first(), columns.get(address_column)) {
            (Some(name), Some(address)) if address_column > 0 => {
                symbols.push(RawSymbol::new(*name, *address));
            }
            _ => {
                return Err(ResolutionError::MalformedLine {
                    line: idx + 1,
                    column: address_column,
                    text: trimmed.to_string(),
                });
            }
        }
    }
    Ok(symbols)
}

/// Reads and parses a feed file.
pub fn read_feed(path: &Path, address_column: usize) -> Result<Vec<RawSymbol>, ResolutionError> {
    let text = fs::read_to_string(path)?;
    parse_feed(&text, address_column)
}
