//! Applies a learned merge table to words and sentences.

use log::debug;
use rustc_hash::{FxHashMap, FxHashSet};

use crate::config::EncoderConfig;
use crate::error::Result;
use crate::glossary::{Glossary, Span};
use crate::merges::MergeTable;
use crate::symbols::{strip_end_of_word, END_OF_WORD};
use crate::vocab::Vocabulary;

/// Segments words into subword units by replaying merges in rank order.
///
/// Results are memoised per raw word, so the encoder is cheap to reuse across
/// a corpus but must be borrowed mutably.
#[derive(Debug)]
pub struct Encoder {
    table: MergeTable,
    cfg: EncoderConfig,
    glossary: Glossary,
    vocabulary: Option<FxHashSet<String>>,
    cache: FxHashMap<String, Vec<String>>,
}

/// Work item of the out-of-vocabulary splitter.
enum Pending {
    Emit(String),
    Split { segment: String, is_final: bool },
}

impl Encoder {
    /// Creates an encoder, compiling the configured glossaries.
    pub fn new(table: MergeTable, cfg: EncoderConfig) -> Result<Self> {
        cfg.validate()?;
        let glossary = Glossary::new(&cfg.glossaries, &cfg.regex_glossaries)?;
        if cfg.verbose && !glossary.is_empty() {
            debug!(
                "glossary: {} literal(s), {} pattern(s)",
                cfg.glossaries.len(),
                cfg.regex_glossaries.len()
            );
        }
        Ok(Self {
            table,
            cfg,
            glossary,
            vocabulary: None,
            cache: FxHashMap::default(),
        })
    }

    /// Restricts output to `vocabulary`: units not in it are split back into
    /// their constituents until they are, or cannot be split further.
    ///
    /// Entries are written forms: non-final units carry the separator. An
    /// empty vocabulary leaves output unrestricted.
    #[must_use]
    pub fn with_vocabulary(mut self, vocabulary: FxHashSet<String>) -> Self {
        self.vocabulary = Some(vocabulary);
        self.cache.clear();
        self
    }

    /// Merge table in use.
    pub fn table(&self) -> &MergeTable {
        &self.table
    }

    /// Encoder settings.
    #[must_use]
    pub fn config(&self) -> &EncoderConfig {
        &self.cfg
    }

    /// Encodes one word (no whitespace) into bare subword units, without separators.
    pub fn encode(&mut self, word: &str) -> Vec<String> {
        if let Some(units) = self.cache.get(word) {
            return units.clone();
        }

        let mut symbols = self.table.version().initial_symbols(word);
        if symbols.len() < 2 {
            return vec![word.to_string()];
        }

        while symbols.len() > 1 {
            let best = symbols
                .windows(2)
                .filter_map(|w| self.table.rank(&w[0], &w[1]))
                .min();
            let Some(rank) = best else {
                break;
            };
            let (left, right) = &self.table.merges()[rank];
            symbols = fuse_all(symbols, left, right);
        }

        if let Some(last) = symbols.pop() {
            let stem = strip_end_of_word(&last);
            if !stem.is_empty() {
                symbols.push(stem.to_string());
            }
        }

        let units = match &self.cfg.unknown_tag {
            Some(tag) if self.is_unknown_marker(&symbols) => vec![tag.clone()],
            _ if self.restricts() => self.check_vocab_and_split(&symbols),
            _ => symbols,
        };

        self.cache.insert(word.to_string(), units.clone());
        units
    }

    /// Encodes a word with glossary isolation and appends the separator to
    /// every unit except the last.
    pub fn pieces(&mut self, word: &str) -> Result<Vec<String>> {
        let mut units = Vec::new();
        for span in self.glossary.isolate(word)? {
            match span {
                Span::Protected(text) => {
                    if self.cfg.verbose {
                        debug!("glossarized segment (leaving alone): {text:?}");
                    }
                    units.push(text.to_string());
                }
                Span::Open(text) => units.extend(self.encode(text)),
            }
        }
        let last = units.len().saturating_sub(1);
        for unit in &mut units[..last] {
            unit.push_str(&self.cfg.separator);
        }
        Ok(units)
    }

    /// Segments a whitespace-tokenised sentence, joining units with single spaces.
    pub fn segment(&mut self, sentence: &str) -> Result<String> {
        let mut output = Vec::new();
        for word in sentence.split_whitespace() {
            output.extend(self.pieces(word)?);
        }
        Ok(output.join(" "))
    }

    /// Segments every word of `vocab` and sums word frequencies per output unit
    /// (separator included).
    pub fn restricted_vocabulary(&mut self, vocab: &Vocabulary) -> Result<Vocabulary> {
        let mut out = Vocabulary::new();
        for (word, count) in vocab.sorted_entries() {
            for unit in self.pieces(word)? {
                out.add(unit, count);
            }
        }
        Ok(out)
    }

    fn is_unknown_marker(&self, symbols: &[String]) -> bool {
        match symbols {
            [only] => only.chars().eq(std::iter::once(self.cfg.unknown_char)),
            _ => false,
        }
    }

    fn restricts(&self) -> bool {
        self.vocabulary
            .as_ref()
            .is_some_and(|vocab| !vocab.is_empty())
    }

    fn in_vocabulary(&self, unit: &str) -> bool {
        self.vocabulary
            .as_ref()
            .is_some_and(|vocab| vocab.contains(unit))
    }

    fn with_separator(&self, unit: &str) -> String {
        format!("{unit}{}", self.cfg.separator)
    }

    /// Keeps in-vocabulary units and reverses merges for the rest.
    fn check_vocab_and_split(&self, symbols: &[String]) -> Vec<String> {
        let mut out = Vec::with_capacity(symbols.len());
        let Some((last, init)) = symbols.split_last() else {
            return out;
        };
        for segment in init {
            if self.in_vocabulary(&self.with_separator(segment)) {
                out.push(segment.clone());
            } else {
                self.split_out_of_vocabulary(segment, false, &mut out);
            }
        }
        if self.in_vocabulary(last) {
            out.push(last.clone());
        } else {
            self.split_out_of_vocabulary(last, true, &mut out);
        }
        out
    }

    fn split_out_of_vocabulary(&self, segment: &str, is_final: bool, out: &mut Vec<String>) {
        let mut stack = vec![Pending::Split {
            segment: segment.to_string(),
            is_final,
        }];
        while let Some(item) = stack.pop() {
            let (segment, is_final) = match item {
                Pending::Emit(unit) => {
                    out.push(unit);
                    continue;
                }
                Pending::Split { segment, is_final } => (segment, is_final),
            };
            let key = if is_final {
                format!("{segment}{END_OF_WORD}")
            } else {
                segment.clone()
            };
            let Some((left, right)) = self.table.split(&key) else {
                if self.cfg.verbose {
                    debug!("cannot split {segment:?} further");
                }
                if !segment.is_empty() {
                    out.push(segment);
                }
                continue;
            };
            let right = if is_final {
                strip_end_of_word(right)
            } else {
                right
            };

            let right_known = if is_final {
                self.in_vocabulary(right)
            } else {
                self.in_vocabulary(&self.with_separator(right))
            };
            stack.push(if right_known {
                Pending::Emit(right.to_string())
            } else {
                Pending::Split {
                    segment: right.to_string(),
                    is_final,
                }
            });
            stack.push(if self.in_vocabulary(&self.with_separator(left)) {
                Pending::Emit(left.to_string())
            } else {
                Pending::Split {
                    segment: left.to_string(),
                    is_final: false,
                }
            });
        }
    }
}

/// Replaces every non-overlapping `left right` occurrence, scanning left to right.
fn fuse_all(symbols: Vec<String>, left: &str, right: &str) -> Vec<String> {
    let mut out = Vec::with_capacity(symbols.len());
    let mut iter = symbols.into_iter().peekable();
    while let Some(symbol) = iter.next() {
        if symbol == left && iter.peek().is_some_and(|next| next == right) {
            iter.next();
            out.push(format!("{left}{right}"));
        } else {
            out.push(symbol);
        }
    }
    out
}
