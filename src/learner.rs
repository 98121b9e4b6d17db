//! Greedy merge learning over a word-frequency table.

mod stats;
mod word;

use std::fmt;
use std::time::Instant;

use fancy_regex::Regex;
use log::{info, warn};

use crate::config::{LearnerBuilder, LearnerConfig};
use crate::error::{BpeError, Result};
use crate::merges::{MergePair, MergeTable};
use crate::metrics::{LearningMetrics, MergeRecord, StopReason};
use crate::symbols::{Pair, SymbolTable, END_OF_WORD};
use crate::vocab::Vocabulary;

use self::stats::{
    compute_pair_statistics, update_pair_statistics, PairCounts, PairIndex, WordChange,
};
use self::word::Word;

/// Refills of the live table recompute the prune threshold as
/// `max * i / (i + THRESHOLD_DAMPING)`.
const THRESHOLD_DAMPING: f64 = 10_000.0;

/// The live table is pruned every this many iterations.
const PRUNE_INTERVAL: usize = 100;

/// High-level façade configuring and executing merge learning runs.
#[derive(Debug, Clone)]
pub struct Learner {
    cfg: LearnerConfig,
}

/// Artifacts returned after a learning run completes.
#[must_use]
#[derive(Debug, Clone)]
pub struct LearnerArtifacts {
    /// Learned merges in rank order, forced merges first.
    pub table: MergeTable,
    /// Per-merge records and the stop reason.
    pub metrics: LearningMetrics,
}

/// Merges applied ahead of the greedy loop, typically read from another merge table.
#[derive(Debug, Clone, Default)]
pub struct ForcedMerges {
    pairs: Vec<MergePair>,
    filter: Option<Regex>,
}

impl ForcedMerges {
    /// Forces every merge of `table`, in rank order.
    #[must_use]
    pub fn new(table: &MergeTable) -> Self {
        Self {
            pairs: table.merges().to_vec(),
            filter: None,
        }
    }

    /// Keeps only pairs whose halves both fully match `pattern`; a trailing
    /// end-of-word marker is always allowed.
    pub fn with_filter(mut self, pattern: &str) -> Result<Self> {
        let body = pattern.strip_prefix('^').unwrap_or(pattern);
        let body = body.strip_suffix('$').unwrap_or(body);
        let anchored = format!("^(?:{body})(?:{})?$", fancy_regex::escape(END_OF_WORD));
        info!("using only forced merges matching r'{anchored}'");
        self.filter = Some(Regex::new(&anchored)?);
        Ok(self)
    }

    /// Number of candidate pairs before filtering.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    /// Returns `true` when there is nothing to force.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    fn selected(&self) -> Result<Vec<&MergePair>> {
        let Some(filter) = &self.filter else {
            return Ok(self.pairs.iter().collect());
        };
        let mut kept = Vec::new();
        for pair in &self.pairs {
            if filter.is_match(&pair.0)? && filter.is_match(&pair.1)? {
                kept.push(pair);
            }
        }
        Ok(kept)
    }
}

impl Learner {
    /// Creates a new learner for the supplied configuration.
    #[must_use]
    pub fn new(cfg: LearnerConfig) -> Self {
        Self { cfg }
    }

    /// Returns a [`LearnerBuilder`] with default settings.
    #[must_use]
    pub fn builder() -> LearnerBuilder {
        LearnerConfig::builder()
    }

    /// Returns an immutable reference to the underlying configuration.
    #[must_use]
    pub fn config(&self) -> &LearnerConfig {
        &self.cfg
    }

    /// Learns up to `symbols` merges from `vocab`.
    pub fn learn(&self, vocab: &Vocabulary) -> Result<LearnerArtifacts> {
        self.learn_with_forced(vocab, &ForcedMerges::default())
    }

    /// Applies `forced` merges first, then learns up to `symbols` further merges.
    pub fn learn_with_forced(
        &self,
        vocab: &Vocabulary,
        forced: &ForcedMerges,
    ) -> Result<LearnerArtifacts> {
        self.cfg.validate()?;
        if vocab.is_empty() {
            return Err(BpeError::InvalidConfig(
                "learning requires a non-empty vocabulary".into(),
            ));
        }
        let min_frequency = i64::try_from(self.cfg.min_frequency).unwrap_or(i64::MAX);
        let start = Instant::now();

        let mut state = LearningState::new(vocab, &self.cfg)?;
        let mut metrics = LearningMetrics::new(self.cfg.symbols.min(16_384));

        let (counts, index) = compute_pair_statistics(&state.words);
        state.index = index;
        let mut big_stats = counts;
        let mut stats = big_stats.clone();
        // Zipfian guess; only affects speed.
        let mut threshold = big_stats.values().copied().max().unwrap_or(0) as f64 / 10.0;

        if !forced.is_empty() {
            let mut forced_count = 0usize;
            for (left, right) in forced.selected()? {
                let pair = (state.symbols.intern(left)?, state.symbols.intern(right)?);
                let frequency = big_stats.get(&pair).copied().unwrap_or(0);
                if self.cfg.verbose {
                    info!("forced merge: {left} {right}");
                }
                state.apply(pair, &mut big_stats)?;
                big_stats.insert(pair, 0);
                if state.table.push(left.as_str(), right.as_str()) {
                    metrics.merges.push(MergeRecord::new(
                        state.table.len() - 1,
                        left,
                        right,
                        frequency,
                        true,
                    ));
                    forced_count += 1;
                }
            }
            metrics.forced = forced_count;
            info!(
                "applied {forced_count} forced merges (in addition to {} symbols)",
                self.cfg.symbols
            );
            stats.clear();
        }

        metrics.stop_reason = StopReason::BudgetReached;
        for i in 0..self.cfg.symbols {
            let mut best = select_best(&stats, &state.symbols);
            let pruned_too_far =
                best.is_some_and(|(_, freq)| i > 0 && (freq as f64) < threshold);
            if best.is_none() || pruned_too_far {
                // The best pair may have been pruned; go back to full statistics.
                prune_stats(&mut stats, &mut big_stats, threshold);
                stats = big_stats.clone();
                best = select_best(&stats, &state.symbols);
                if let Some((_, freq)) = best {
                    threshold = freq as f64 * i as f64 / (i as f64 + THRESHOLD_DAMPING);
                    prune_stats(&mut stats, &mut big_stats, threshold);
                }
            }

            let Some((pair, frequency)) = best else {
                metrics.stop_reason = StopReason::NoPairs;
                break;
            };
            if frequency < min_frequency {
                warn!(
                    "no pair has frequency >= {}; stopping after {} merges",
                    self.cfg.min_frequency,
                    state.table.len()
                );
                metrics.stop_reason = StopReason::BelowMinFrequency;
                break;
            }

            let (left, right) = state.symbols.pair_names(pair);
            let (left, right) = (left.to_string(), right.to_string());
            if self.cfg.verbose {
                info!("pair {i}: {left} {right} -> {left}{right} (frequency {frequency})");
            }
            state.apply(pair, &mut stats)?;
            stats.insert(pair, 0);
            state.table.push(left.as_str(), right.as_str());
            metrics.merges.push(MergeRecord::new(
                state.table.len() - 1,
                &left,
                &right,
                frequency,
                false,
            ));

            if i % PRUNE_INTERVAL == 0 {
                prune_stats(&mut stats, &mut big_stats, threshold);
            }
        }

        metrics.total_duration = start.elapsed();
        info!(
            "merge table has {} pairs ({:?}) after {:.2?}",
            state.table.len(),
            metrics.stop_reason,
            metrics.total_duration
        );
        Ok(LearnerArtifacts {
            table: state.table,
            metrics,
        })
    }
}

/// Words, symbols, and the pair index owned by one learning run.
struct LearningState {
    symbols: SymbolTable,
    words: Vec<(Word, i64)>,
    index: PairIndex,
    table: MergeTable,
}

impl LearningState {
    fn new(vocab: &Vocabulary, cfg: &LearnerConfig) -> Result<Self> {
        let mut entries = vocab.sorted_entries();
        entries.retain(|(word, _)| !word.is_empty());
        let mut symbols = SymbolTable::default();
        let mut words = Vec::with_capacity(entries.len());
        for (word, count) in entries {
            let freq = i64::try_from(count).map_err(|_| {
                BpeError::InvalidConfig(format!("frequency of {word:?} exceeds i64::MAX"))
            })?;
            let ids = cfg
                .version
                .initial_symbols(word)
                .iter()
                .map(|symbol| symbols.intern(symbol))
                .collect::<Result<Vec<_>>>()?;
            words.push((Word::from_symbols(ids), freq));
        }
        Ok(Self {
            symbols,
            words,
            index: PairIndex::default(),
            table: MergeTable::new(cfg.version),
        })
    }

    /// Fuses `pair` in every word that contains it and patches `counts` and the index.
    fn apply(&mut self, pair: Pair, counts: &mut PairCounts) -> Result<()> {
        let fused = self.symbols.fuse(pair)?;
        let mut changes = Vec::new();
        for idx in self.index.words_with(pair) {
            let (word, freq) = &self.words[idx];
            let Some(new_word) = word.merged(pair, fused) else {
                continue;
            };
            changes.push(WordChange {
                index: idx,
                word: new_word.clone(),
                old: word.clone(),
                freq: *freq,
            });
            self.words[idx].0 = new_word;
        }
        update_pair_statistics(pair, fused, &changes, counts, &mut self.index);
        Ok(())
    }
}

/// Highest frequency wins; ties go to the larger `(left, right)` string pair.
fn select_best(stats: &PairCounts, symbols: &SymbolTable) -> Option<(Pair, i64)> {
    stats
        .iter()
        .max_by(|a, b| {
            a.1.cmp(b.1)
                .then_with(|| symbols.pair_names(*a.0).cmp(&symbols.pair_names(*b.0)))
        })
        .map(|(&pair, &freq)| (pair, freq))
}

/// Moves entries below `threshold` from the live table into `big_stats`.
///
/// Negative live values are pending decrements for pairs already pruned, so
/// they are added; other values overwrite.
fn prune_stats(stats: &mut PairCounts, big_stats: &mut PairCounts, threshold: f64) {
    stats.retain(|&pair, &mut freq| {
        if (freq as f64) >= threshold {
            return true;
        }
        if freq < 0 {
            *big_stats.entry(pair).or_insert(0) += freq;
        } else {
            big_stats.insert(pair, freq);
        }
        false
    });
}

impl fmt::Display for LearnerArtifacts {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(
            f,
            "Merge table with {} merges (version {})",
            self.table.len(),
            self.table.version()
        )?;
        writeln!(f, "Forced merges: {}", self.metrics.forced)?;
        writeln!(f, "Stop reason: {:?}", self.metrics.stop_reason)?;
        writeln!(f, "Total duration: {:?}", self.metrics.total_duration)?;
        Ok(())
    }
}
