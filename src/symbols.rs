//! Symbol conventions shared by the learner, the merge table, and the encoder.

use std::fmt;
use std::str::FromStr;

use rustc_hash::FxHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{BpeError, Result};

/// Marker appended to the final symbol of every word.
pub const END_OF_WORD: &str = "</w>";

/// Prefix of the optional first line of a merge table.
pub const VERSION_HEADER: &str = "#version: ";

/// Interned symbol identifier used while learning.
pub type SymbolId = u32;

/// Merge pair encoded as `(left, right)` symbol identifiers.
pub type Pair = (SymbolId, SymbolId);

/// End-of-word convention of a merge table.
///
/// The version must match between learning and encoding: a table learned
/// with one convention contains pairs that never occur under the other.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Version {
    /// The end-of-word marker is its own trailing symbol: `l o w </w>`.
    #[serde(rename = "0.1")]
    V0_1,
    /// The end-of-word marker is fused onto the last character: `l o w</w>`.
    #[default]
    #[serde(rename = "0.2")]
    V0_2,
}

impl Version {
    /// Splits `word` into its initial symbol sequence under this convention.
    ///
    /// An empty word has no symbols.
    #[must_use]
    pub fn initial_symbols(self, word: &str) -> Vec<String> {
        let mut symbols: Vec<String> = word.chars().map(String::from).collect();
        match self {
            Self::V0_1 => {
                if !symbols.is_empty() {
                    symbols.push(END_OF_WORD.to_string());
                }
            }
            Self::V0_2 => {
                if let Some(last) = symbols.last_mut() {
                    last.push_str(END_OF_WORD);
                }
            }
        }
        symbols
    }

    /// Returns the `(major, minor)` tuple written in merge table headers.
    #[must_use]
    pub fn as_tuple(self) -> (u32, u32) {
        match self {
            Self::V0_1 => (0, 1),
            Self::V0_2 => (0, 2),
        }
    }

    /// Formats the header line (without trailing newline) for this version.
    #[must_use]
    pub fn header(self) -> String {
        format!("{VERSION_HEADER}{self}")
    }

    /// Parses a header line, returning `None` when the line is not a version header.
    pub fn from_header(line: &str) -> Option<Result<Self>> {
        line.strip_prefix(VERSION_HEADER).map(str::parse)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let (major, minor) = self.as_tuple();
        write!(f, "{major}.{minor}")
    }
}

impl FromStr for Version {
    type Err = BpeError;

    fn from_str(s: &str) -> Result<Self> {
        let text = s.trim();
        let parts = text
            .split('.')
            .map(|part| part.parse::<u32>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|_| BpeError::UnsupportedVersion(text.to_string()))?;
        match parts.as_slice() {
            [0, 1] => Ok(Self::V0_1),
            [0, 2] => Ok(Self::V0_2),
            _ => Err(BpeError::UnsupportedVersion(text.to_string())),
        }
    }
}

/// Removes a trailing end-of-word marker, if present.
#[must_use]
pub fn strip_end_of_word(symbol: &str) -> &str {
    symbol.strip_suffix(END_OF_WORD).unwrap_or(symbol)
}

/// Returns the surface form a symbol takes in segmented output: word-final
/// symbols lose their marker, all others gain the separator.
#[must_use]
pub fn written_form(symbol: &str, separator: &str) -> String {
    match symbol.strip_suffix(END_OF_WORD) {
        Some(stem) => stem.to_string(),
        None => format!("{symbol}{separator}"),
    }
}

/// Bidirectional map between symbol strings and dense identifiers.
#[derive(Debug, Clone, Default)]
pub(crate) struct SymbolTable {
    names: Vec<String>,
    ids: FxHashMap<String, SymbolId>,
}

impl SymbolTable {
    pub(crate) fn intern(&mut self, symbol: &str) -> Result<SymbolId> {
        if let Some(&id) = self.ids.get(symbol) {
            return Ok(id);
        }
        let id = next_symbol_id(self.names.len())?;
        self.names.push(symbol.to_string());
        self.ids.insert(symbol.to_string(), id);
        Ok(id)
    }

    #[cfg(test)]
    pub(crate) fn get(&self, symbol: &str) -> Option<SymbolId> {
        self.ids.get(symbol).copied()
    }

    pub(crate) fn name(&self, id: SymbolId) -> &str {
        &self.names[id as usize]
    }

    /// Interns the concatenation of the two halves of `pair`.
    pub(crate) fn fuse(&mut self, pair: Pair) -> Result<SymbolId> {
        let fused = format!("{}{}", self.name(pair.0), self.name(pair.1));
        self.intern(&fused)
    }

    pub(crate) fn pair_names(&self, pair: Pair) -> (&str, &str) {
        (self.name(pair.0), self.name(pair.1))
    }
}

/// Identifier for the symbol interned after `interned` others.
fn next_symbol_id(interned: usize) -> Result<SymbolId> {
    SymbolId::try_from(interned).map_err(|_| {
        BpeError::InvalidConfig(format!(
            "symbol table is full: more than {} distinct symbols",
            SymbolId::MAX
        ))
    })
}
