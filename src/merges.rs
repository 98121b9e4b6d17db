//! The ranked merge table: persistence, rank lookup, reverse lookup, and subset extraction.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use log::{info, warn};
use rustc_hash::{FxHashMap, FxHashSet};

use crate::error::{BpeError, Result};
use crate::symbols::{written_form, Version};
use crate::vocab::Vocabulary;

/// A merge as a pair of symbol strings.
pub type MergePair = (String, String);

/// Ordered list of learned merges. A merge's rank is its position; lower ranks
/// are applied first during encoding.
#[must_use]
#[derive(Debug, Clone, Default)]
pub struct MergeTable {
    version: Version,
    merges: Vec<MergePair>,
    ranks: FxHashMap<String, FxHashMap<String, usize>>,
    reverse: FxHashMap<String, usize>,
}

impl MergeTable {
    /// Creates an empty table for the given end-of-word convention.
    pub fn new(version: Version) -> Self {
        Self {
            version,
            ..Self::default()
        }
    }

    /// Builds a table from merges in rank order; repeated pairs keep their first rank.
    pub fn from_pairs<I, A, B>(version: Version, pairs: I) -> Self
    where
        I: IntoIterator<Item = (A, B)>,
        A: Into<String>,
        B: Into<String>,
    {
        let mut table = Self::new(version);
        for (left, right) in pairs {
            table.push(left, right);
        }
        table
    }

    /// Appends a merge at the next rank. Returns `false` (and leaves the table
    /// unchanged) when the pair is already present.
    pub fn push(&mut self, left: impl Into<String>, right: impl Into<String>) -> bool {
        let left = left.into();
        let right = right.into();
        if self.rank(&left, &right).is_some() {
            return false;
        }
        let rank = self.merges.len();
        self.ranks
            .entry(left.clone())
            .or_default()
            .insert(right.clone(), rank);
        // Two pairs can fuse to the same string; the lower rank owns the reverse entry.
        self.reverse.entry(format!("{left}{right}")).or_insert(rank);
        self.merges.push((left, right));
        true
    }

    /// End-of-word convention the table was learned with.
    #[must_use]
    pub fn version(&self) -> Version {
        self.version
    }

    /// Merges in rank order.
    #[must_use]
    pub fn merges(&self) -> &[MergePair] {
        &self.merges
    }

    /// Number of distinct merges.
    #[must_use]
    pub fn len(&self) -> usize {
        self.merges.len()
    }

    /// Returns `true` when the table holds no merges.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.merges.is_empty()
    }

    /// Rank of the merge `(left, right)`, if learned.
    #[must_use]
    pub fn rank(&self, left: &str, right: &str) -> Option<usize> {
        self.ranks.get(left)?.get(right).copied()
    }

    /// Source pair of a fused symbol, if the symbol was produced by a merge.
    #[must_use]
    pub fn split(&self, fused: &str) -> Option<(&str, &str)> {
        let (left, right) = &self.merges[*self.reverse.get(fused)?];
        Some((left.as_str(), right.as_str()))
    }

    /// Parses a merge table. A missing `#version:` header implies version 0.1,
    /// in which case the first line is data.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut lines = reader.lines().enumerate().peekable();
        let version = match lines.peek() {
            Some((_, Ok(first))) => match Version::from_header(first) {
                Some(parsed) => {
                    let version = parsed?;
                    lines.next();
                    version
                }
                None => {
                    warn!("merge table has no version header; assuming {}", Version::V0_1);
                    Version::V0_1
                }
            },
            Some((_, Err(_))) | None => Version::V0_1,
        };

        let mut table = Self::new(version);
        for (idx, line) in lines {
            let line = line.map_err(|err| BpeError::io(err, None))?;
            if line.trim().is_empty() {
                continue;
            }
            let mut fields = line.split_whitespace();
            let (Some(left), Some(right), None) = (fields.next(), fields.next(), fields.next())
            else {
                return Err(BpeError::MalformedMergeLine {
                    line: idx + 1,
                    content: line,
                });
            };
            table.push(left, right);
        }
        Ok(table)
    }

    /// Loads a merge table from `path`; see [`MergeTable::read`].
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
        let table = Self::read(BufReader::new(file))?;
        info!(
            "loaded {} merges (version {}) from {}",
            table.len(),
            table.version,
            path.display()
        );
        Ok(table)
    }

    /// Writes the version header followed by one `LEFT RIGHT` line per merge.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        writeln!(writer, "{}", self.version.header()).map_err(|err| BpeError::io(err, None))?;
        for (left, right) in &self.merges {
            writeln!(writer, "{left} {right}").map_err(|err| BpeError::io(err, None))?;
        }
        Ok(())
    }

    /// Writes the table to `path`; see [`MergeTable::write`].
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let path = path.as_ref();
        let file =
            File::create(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
        let mut writer = BufWriter::new(file);
        self.write(&mut writer)?;
        writer
            .flush()
            .map_err(|err| BpeError::io(err, Some(path.to_path_buf())))
    }

    /// Fused symbols needed to build any entry of `bpe_vocab`, directly or
    /// through their constituent merges.
    ///
    /// `bpe_vocab` holds segmented output forms (separator on non-final units).
    #[must_use]
    pub fn prerequisites(&self, bpe_vocab: &Vocabulary, separator: &str) -> FxHashSet<String> {
        let mut seen: FxHashSet<String> = FxHashSet::default();
        let mut pending: Vec<&str> = Vec::new();
        for (fused, &rank) in &self.reverse {
            if bpe_vocab.contains(&written_form(fused, separator)) {
                let (left, right) = &self.merges[rank];
                seen.insert(fused.clone());
                pending.push(left.as_str());
                pending.push(right.as_str());
            }
        }
        // Constituents were learned at a lower rank than the symbol they build.
        while let Some(symbol) = pending.pop() {
            if symbol.chars().count() <= 1 || !seen.insert(symbol.to_string()) {
                continue;
            }
            if let Some((left, right)) = self.split(symbol) {
                pending.push(left);
                pending.push(right);
            }
        }
        seen
    }

    /// Minimal rank-ordered subset of merges that still produces every entry of
    /// `bpe_vocab` reachable from this table.
    pub fn subset(&self, bpe_vocab: &Vocabulary, separator: &str) -> Self {
        let required = self.prerequisites(bpe_vocab, separator);
        let mut subset = Self::new(self.version);
        for (left, right) in &self.merges {
            let fused = format!("{left}{right}");
            if required.contains(&fused) || bpe_vocab.contains(&written_form(&fused, separator)) {
                subset.push(left.as_str(), right.as_str());
            }
        }
        subset
    }
}
