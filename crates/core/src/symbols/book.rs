//! Address book construction and lookup.
//!
//! The address book is built once from the symbol feed and is read-only afterwards.
//! Every lookup the loop performs goes through [`AddressBook::get`], which turns a
//! missing name into a fatal [`ResolutionError::Unresolved`].

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::{debug, warn};

use super::feed::RawSymbol;
use super::layout::ExpansionTable;
use crate::common::{Addr, ResolutionError};

/// Parses one address string from the feed.
///
/// Accepts an optional `0x`/`0X` prefix. With `strip_leading_offset_digit`, exactly one
/// hex digit after the prefix is dropped: the emulator image's addresses carry an extra
/// memory-region digit, so `0x8012345` becomes `0x012345`.
///
/// # Returns
///
/// The address, or `None` if the remaining text is not hexadecimal.
pub fn parse_address(raw: &str, strip_leading_offset_digit: bool) -> Option<u64> {
    let digits = raw
        .strip_prefix("0x")
        .or_else(|| raw.strip_prefix("0X"))
        .unwrap_or(raw);
    let digits = if strip_leading_offset_digit {
        let mut chars = digits.chars();
        let _ = chars.next()?;
        chars.as_str()
    } else {
        digits
    };
    if digits.is_empty() {
        return None;
    }
    u64::from_str_radix(digits, 16).ok()
}

/// Resolved symbol names and their addresses.
///
/// Serializes as `{"entries": {name: address}, "bases": {name: address}}` with numeric
/// addresses.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct AddressBook {
    entries: BTreeMap<String, Addr>,
    bases: BTreeMap<String, Addr>,
}

impl AddressBook {
    /// Builds the address book from raw feed pairs.
    ///
    /// Each pair whose name is a composite base in `table` fans out into one entry per
    /// field at `base + offset`; any other name becomes a single entry at its own
    /// address. A name seen twice keeps its last address.
    ///
    /// # Arguments
    ///
    /// * `raw` - Feed pairs in feed order.
    /// * `strip_leading_offset_digit` - Drop the memory-region digit before parsing.
    /// * `table` - Composite expansion rules.
    ///
    /// # Returns
    ///
    /// The address book, or `BadAddress` on the first unparseable address.
    pub fn resolve<'a, I>(
        raw: I,
        strip_leading_offset_digit: bool,
        table: &ExpansionTable,
    ) -> Result<Self, ResolutionError>
    where
        I: IntoIterator<Item = &'a RawSymbol>,
    {
        let mut book = Self::default();
        for symbol in raw {
            let base = parse_address(&symbol.address, strip_leading_offset_digit)
                .map(Addr::new)
                .ok_or_else(|| ResolutionError::BadAddress {
                    name: symbol.name.clone(),
                    raw: symbol.address.clone(),
                })?;
            book.insert_base(&symbol.name, base);

            match table.lookup(&symbol.name) {
                Some(rule) => {
                    for field in rule.fields {
                        book.insert(field.name, base.offset(field.offset));
                    }
                }
                None => book.insert(&symbol.name, base),
            }
        }
        debug!(
            symbols = book.bases.len(),
            entries = book.entries.len(),
            "address book resolved"
        );
        Ok(book)
    }

    fn insert(&mut self, name: &str, addr: Addr) {
        if let Some(previous) = self.entries.insert(name.to_string(), addr)
            && previous != addr
        {
            warn!(name, %previous, %addr, "symbol redefined; keeping the later address");
        }
    }

    fn insert_base(&mut self, name: &str, addr: Addr) {
        let _ = self.bases.insert(name.to_string(), addr);
    }

    /// Returns the address of `name`, or `Unresolved`.
    pub fn get(&self, name: &str) -> Result<Addr, ResolutionError> {
        self.lookup(name)
            .ok_or_else(|| ResolutionError::Unresolved(name.to_string()))
    }

    /// Returns the address of `name`, if present.
    pub fn lookup(&self, name: &str) -> Option<Addr> {
        self.entries.get(name).copied()
    }

    /// Returns the feed address of symbol `name` before any field expansion.
    pub fn base(&self, name: &str) -> Option<Addr> {
        self.bases.get(name).copied()
    }

    /// Returns `true` if `name` resolves.
    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing resolved.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in name order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, Addr)> {
        self.entries.iter().map(|(name, addr)| (name.as_str(), *addr))
    }

    /// Replaces the address of entry `name`.
    ///
    /// Used for the sensor-task breakpoint when the empirical displacement does not
    /// match the firmware build in use.
    #[must_use]
    pub fn with_override(mut self, name: &str, addr: Addr) -> Self {
        if let Some(previous) = self.entries.insert(name.to_string(), addr) {
            debug!(name, %previous, %addr, "address overridden");
        }
        self
    }

    /// Checks that entry `function` lies inside the function it was derived from.
    ///
    /// # Arguments
    ///
    /// * `function` - Name of both the function symbol and the entry derived from it.
    /// * `size` - Size of the function in bytes, from the firmware's map file.
    ///
    /// # Returns
    ///
    /// `EntryOutsideFunction` if `base <= entry < base + size` does not hold, or
    /// `Unresolved` if either address is missing.
    pub fn validate_entry(&self, function: &str, size: u64) -> Result<Addr, ResolutionError> {
        let base = self
            .base(function)
            .ok_or_else(|| ResolutionError::Unresolved(function.to_string()))?;
        let entry = self.get(function)?;
        let end = base.val().saturating_add(size);
        if entry.val() < base.val() || entry.val() >= end {
            return Err(ResolutionError::EntryOutsideFunction {
                function: function.to_string(),
                base,
                size,
                entry,
            });
        }
        Ok(entry)
    }
}
