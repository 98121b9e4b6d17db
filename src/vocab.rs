//! Word-frequency tables: counting running text, reading and writing `WORD COUNT` files.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::VocabConfig;
use crate::error::{BpeError, Result};

/// Mapping from surface word to frequency. Zero-frequency entries are never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Vocabulary {
    counts: FxHashMap<String, u64>,
}

impl Vocabulary {
    /// Creates an empty vocabulary.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a vocabulary from `(word, count)` pairs, summing repeated words.
    pub fn from_counts<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = (S, u64)>,
        S: Into<String>,
    {
        let mut vocab = Self::new();
        for (word, count) in entries {
            vocab.add(word, count);
        }
        vocab
    }

    /// Counts whitespace-separated words in running text.
    pub fn count_text<R: BufRead>(reader: R) -> Result<Self> {
        let mut vocab = Self::new();
        for line in reader.lines() {
            let line = line.map_err(|err| BpeError::io(err, None))?;
            for word in line.split_whitespace() {
                vocab.add(word, 1);
            }
        }
        Ok(vocab)
    }

    /// Parses a `WORD COUNT` dictionary. Later lines for the same word replace earlier ones.
    pub fn parse_dict<R: BufRead>(reader: R) -> Result<Self> {
        let mut vocab = Self::new();
        for (idx, line) in reader.lines().enumerate() {
            let line = line.map_err(|err| BpeError::io(err, None))?;
            if line.trim().is_empty() {
                continue;
            }
            let (word, count) = parse_entry(&line, idx + 1)?;
            if count == 0 {
                vocab.counts.remove(word);
            } else {
                vocab.counts.insert(word.to_string(), count);
            }
        }
        Ok(vocab)
    }

    /// Reads a vocabulary from text or a dictionary according to `cfg`, dropping
    /// words below `cfg.min_count`.
    pub fn from_reader<R: BufRead>(reader: R, cfg: &VocabConfig) -> Result<Self> {
        let vocab = if cfg.dict_input {
            Self::parse_dict(reader)?
        } else {
            Self::count_text(reader)?
        };
        Ok(vocab.threshold(cfg.min_count))
    }

    /// Reads a vocabulary from `path`; see [`Vocabulary::from_reader`].
    pub fn read<P: AsRef<Path>>(path: P, cfg: &VocabConfig) -> Result<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
        Self::from_reader(BufReader::new(file), cfg)
    }

    /// Adds `count` occurrences of `word`.
    pub fn add(&mut self, word: impl Into<String>, count: u64) {
        if count == 0 {
            return;
        }
        *self.counts.entry(word.into()).or_insert(0) += count;
    }

    /// Adds every entry of `other` into this vocabulary.
    pub fn absorb(&mut self, other: &Vocabulary) {
        for (word, &count) in &other.counts {
            self.add(word.as_str(), count);
        }
    }

    /// Returns a copy keeping only words whose frequency is at least `min_count`.
    #[must_use]
    pub fn threshold(mut self, min_count: u64) -> Self {
        if min_count > 1 {
            self.counts.retain(|_, count| *count >= min_count);
        }
        self
    }

    /// Returns the frequency of `word`, if present.
    #[must_use]
    pub fn get(&self, word: &str) -> Option<u64> {
        self.counts.get(word).copied()
    }

    /// Returns `true` when `word` is present.
    #[must_use]
    pub fn contains(&self, word: &str) -> bool {
        self.counts.contains_key(word)
    }

    /// Number of distinct words.
    #[must_use]
    pub fn len(&self) -> usize {
        self.counts.len()
    }

    /// Returns `true` when the vocabulary holds no words.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.counts.is_empty()
    }

    /// Iterates over `(word, count)` entries in arbitrary order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, u64)> {
        self.counts.iter().map(|(word, &count)| (word.as_str(), count))
    }

    /// Entries sorted by descending frequency, ties broken by word.
    #[must_use]
    pub fn sorted_entries(&self) -> Vec<(&str, u64)> {
        let mut entries: Vec<(&str, u64)> = self.iter().collect();
        entries.sort_unstable_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
        entries
    }

    /// Returns the set of words, as used for vocabulary-restricted encoding.
    #[must_use]
    pub fn word_set(&self) -> FxHashSet<String> {
        self.counts.keys().cloned().collect()
    }

    /// Writes `WORD COUNT` lines sorted by descending frequency.
    pub fn write<W: Write>(&self, writer: &mut W) -> Result<()> {
        for (word, count) in self.sorted_entries() {
            writeln!(writer, "{word} {count}").map_err(|err| BpeError::io(err, None))?;
        }
        Ok(())
    }

    /// Writes the vocabulary to `path`; see [`Vocabulary::write`].
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
}

impl<S: Into<String>> FromIterator<(S, u64)> for Vocabulary {
    fn from_iter<I: IntoIterator<Item = (S, u64)>>(iter: I) -> Self {
        Self::from_counts(iter)
    }
}

/// Reads the words of a vocabulary file whose frequency is at least `threshold`.
pub fn read_vocabulary_set<R: BufRead>(reader: R, threshold: u64) -> Result<FxHashSet<String>> {
    let mut words = FxHashSet::default();
    for (idx, line) in reader.lines().enumerate() {
        let line = line.map_err(|err| BpeError::io(err, None))?;
        if line.trim().is_empty() {
            continue;
        }
        let (word, count) = parse_entry(&line, idx + 1)?;
        if count >= threshold {
            words.insert(word.to_string());
        }
    }
    Ok(words)
}

/// Path-based variant of [`read_vocabulary_set`].
pub fn load_vocabulary_set<P: AsRef<Path>>(path: P, threshold: u64) -> Result<FxHashSet<String>> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|err| BpeError::io(err, Some(path.to_path_buf())))?;
    read_vocabulary_set(BufReader::new(file), threshold)
}

fn parse_entry(line: &str, line_no: usize) -> Result<(&str, u64)> {
    let malformed = || BpeError::MalformedVocabLine {
        line: line_no,
        content: line.to_string(),
    };
    let mut fields = line.split_whitespace();
    let (Some(word), Some(count), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err(malformed());
    };
    let count = count.parse::<u64>().map_err(|_| malformed())?;
    Ok((word, count))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::io::Cursor;
    use tempfile::tempdir;

    #[test]
    fn count_text_counts_whitespace_words() {
        let text = "the cat  sat\non the\tmat\n";
        let vocab = Vocabulary::count_text(Cursor::new(text)).expect("count");
        assert_eq!(vocab.get("the"), Some(2));
        assert_eq!(vocab.get("mat"), Some(1));
        assert_eq!(vocab.len(), 5);
    }

    #[test]
    fn dict_input_respects_min_count() {
        let text = "low 5\nlower 2\n\nnewest 6\n";
        let cfg = VocabConfig {
            dict_input: true,
            min_count: 3,
        };
        let vocab = Vocabulary::from_reader(Cursor::new(text), &cfg).expect("parse");
        assert_eq!(vocab.len(), 2);
        assert!(!vocab.contains("lower"));
    }

    #[test]
    fn malformed_dict_line_reports_line_number() {
        let err = Vocabulary::parse_dict(Cursor::new("low 5\nlower\n")).expect_err("malformed");
        assert!(matches!(err, BpeError::MalformedVocabLine { line: 2, .. }));
        let err = Vocabulary::parse_dict(Cursor::new("low five\n")).expect_err("bad count");
        assert!(matches!(err, BpeError::MalformedVocabLine { line: 1, .. }));
    }

    #[test]
    fn zero_counts_are_not_stored() {
        let vocab = Vocabulary::from_counts([("a", 0), ("b", 3)]);
        assert_eq!(vocab.len(), 1);
        assert!(!vocab.contains("a"));
    }

    #[test]
    fn write_sorts_by_descending_frequency() {
        let vocab = Vocabulary::from_counts([("b", 2), ("a", 2), ("c", 7)]);
        let mut out = Vec::new();
        vocab.write(&mut out).expect("write");
        assert_eq!(String::from_utf8(out).expect("utf8"), "c 7\na 2\nb 2\n");
    }

    #[test]
    fn save_and_read_round_trip() {
        let dir = tempdir().expect("tempdir");
        let path = dir.path().join("vocab.txt");
        let vocab = Vocabulary::from_counts([("low", 5), ("lower", 2)]);
        vocab.save(&path).expect("save");
        assert_eq!(fs::read_to_string(&path).expect("read"), "low 5\nlower 2\n");
        let cfg = VocabConfig {
            dict_input: true,
            ..VocabConfig::default()
        };
        assert_eq!(Vocabulary::read(&path, &cfg).expect("reload"), vocab);
    }

    #[test]
    fn absorb_sums_counts() {
        let mut joint = Vocabulary::from_counts([("a", 1), ("b", 2)]);
        joint.absorb(&Vocabulary::from_counts([("b", 3), ("c", 1)]));
        assert_eq!(joint.get("b"), Some(5));
        assert_eq!(joint.len(), 3);
    }

    #[test]
    fn vocabulary_set_applies_threshold() {
        let set = read_vocabulary_set(Cursor::new("lo@@ 10\nw 1\n"), 2).expect("set");
        assert!(set.contains("lo@@"));
        assert!(!set.contains("w"));
    }
}
