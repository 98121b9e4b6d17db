//! Pair frequencies and the pair → word index, with incremental maintenance after a merge.

use rustc_hash::FxHashMap;

use crate::learner::word::Word;
use crate::symbols::{Pair, SymbolId};

/// Pair frequencies weighted by word frequency. Entries of the live table may
/// go negative between prunes.
pub(crate) type PairCounts = FxHashMap<Pair, i64>;

/// Index from pair to the words containing it, with per-word adjacency counts.
#[derive(Debug, Default)]
pub(crate) struct PairIndex {
    words: FxHashMap<Pair, FxHashMap<usize, i64>>,
}

impl PairIndex {
    fn adjust(&mut self, pair: Pair, word: usize, delta: i64) {
        *self
            .words
            .entry(pair)
            .or_default()
            .entry(word)
            .or_insert(0) += delta;
    }

    fn reset(&mut self, pair: Pair) {
        self.words.remove(&pair);
    }

    /// Words that currently contain `pair` at least once, in ascending order.
    pub(crate) fn words_with(&self, pair: Pair) -> Vec<usize> {
        let mut words: Vec<usize> = self
            .words
            .get(&pair)
            .map(|entries| {
                entries
                    .iter()
                    .filter(|(_, &count)| count >= 1)
                    .map(|(&word, _)| word)
                    .collect()
            })
            .unwrap_or_default();
        words.sort_unstable();
        words
    }

    /// Adjacency count of `pair` within `word`.
    #[cfg(test)]
    pub(crate) fn count(&self, pair: Pair, word: usize) -> i64 {
        self.words
            .get(&pair)
            .and_then(|entries| entries.get(&word))
            .copied()
            .unwrap_or(0)
    }
}

/// A word rewritten by a merge.
#[derive(Debug, Clone)]
pub(crate) struct WordChange {
    pub(crate) index: usize,
    pub(crate) word: Word,
    pub(crate) old: Word,
    pub(crate) freq: i64,
}

/// Counts every adjacent pair of every word, weighted by word frequency.
pub(crate) fn compute_pair_statistics(words: &[(Word, i64)]) -> (PairCounts, PairIndex) {
    let mut counts = PairCounts::default();
    let mut index = PairIndex::default();
    for (idx, (word, freq)) in words.iter().enumerate() {
        word.for_each_pair(|pair| {
            *counts.entry(pair).or_insert(0) += freq;
            index.adjust(pair, idx, 1);
        });
    }
    (counts, index)
}

/// Patches `counts` and `index` after `pair` was fused into `fused` in the
/// words listed in `changes`. Only adjacencies touching a merge site change.
pub(crate) fn update_pair_statistics(
    pair: Pair,
    fused: SymbolId,
    changes: &[WordChange],
    counts: &mut PairCounts,
    index: &mut PairIndex,
) {
    counts.insert(pair, 0);
    index.reset(pair);
    let (first, second) = pair;

    let mut adjust = |counts: &mut PairCounts, adjacency: Pair, word: usize, freq: i64| {
        *counts.entry(adjacency).or_insert(0) += freq;
        index.adjust(adjacency, word, freq.signum());
    };

    for change in changes {
        let old = &change.old;
        let n = old.len();
        let mut i = 0usize;
        while let Some(pos) = old.find(first, i) {
            i = pos;
            if i + 1 < n && old[i + 1] == second {
                if i > 0 {
                    adjust(counts, (old[i - 1], old[i]), change.index, -change.freq);
                }
                if i + 2 < n {
                    // In `A B A B` the second occurrence removes `(B, A)` as its left neighbour.
                    let repeats = old[i + 2] == first && i + 3 < n && old[i + 3] == second;
                    if !repeats {
                        adjust(counts, (old[i + 1], old[i + 2]), change.index, -change.freq);
                    }
                }
                i += 2;
            } else {
                i += 1;
            }
        }

        let word = &change.word;
        let n = word.len();
        let mut i = 0usize;
        while let Some(pos) = word.find(fused, i) {
            i = pos;
            if i > 0 {
                adjust(counts, (word[i - 1], word[i]), change.index, change.freq);
            }
            // `AB AB` is counted once, by the right-hand occurrence.
            if i + 1 < n && word[i + 1] != fused {
                adjust(counts, (word[i], word[i + 1]), change.index, change.freq);
            }
            i += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn rebuild(words: &[(Word, i64)]) -> PairCounts {
        let (mut counts, _) = compute_pair_statistics(words);
        counts.retain(|_, count| *count != 0);
        counts
    }

    fn apply(
        words: &mut [(Word, i64)],
        pair: Pair,
        fused: SymbolId,
        counts: &mut PairCounts,
        index: &mut PairIndex,
    ) {
        let mut changes = Vec::new();
        for idx in index.words_with(pair) {
            let (word, freq) = &words[idx];
            if let Some(new_word) = word.merged(pair, fused) {
                changes.push(WordChange {
                    index: idx,
                    word: new_word.clone(),
                    old: word.clone(),
                    freq: *freq,
                });
                words[idx].0 = new_word;
            }
        }
        update_pair_statistics(pair, fused, &changes, counts, index);
        counts.retain(|_, count| *count != 0);
    }

    #[test]
    fn initial_statistics_weight_by_frequency() {
        let words = vec![
            (Word::from_symbols(vec![1, 2, 3]), 4),
            (Word::from_symbols(vec![1, 2]), 1),
        ];
        let (counts, index) = compute_pair_statistics(&words);
        assert_eq!(counts[&(1, 2)], 5);
        assert_eq!(counts[&(2, 3)], 4);
        assert_eq!(index.words_with((1, 2)), vec![0, 1]);
        assert_eq!(index.count((2, 3), 0), 1);
    }

    #[test]
    fn incremental_update_matches_full_rescan() {
        let mut words = vec![
            (Word::from_symbols(vec![0, 1, 2, 1, 2, 3]), 3),
            (Word::from_symbols(vec![1, 2, 1, 2]), 2),
            (Word::from_symbols(vec![0, 1, 2]), 5),
        ];
        let (mut counts, mut index) = compute_pair_statistics(&words);
        apply(&mut words, (1, 2), 9, &mut counts, &mut index);
        counts.remove(&(1, 2));
        assert_eq!(counts, rebuild(&words));
        assert_eq!(index.count((9, 9), 0), 1);
        assert_eq!(index.count((9, 9), 1), 1);
    }

    #[test]
    fn repeated_fused_symbols_are_counted_once() {
        // a b a b c -> ab ab c: (ab, ab) once, (ab, c) once.
        let mut words = vec![(Word::from_symbols(vec![1, 2, 1, 2, 3]), 1)];
        let (mut counts, mut index) = compute_pair_statistics(&words);
        apply(&mut words, (1, 2), 7, &mut counts, &mut index);
        assert_eq!(counts.get(&(7, 7)), Some(&1));
        assert_eq!(counts.get(&(7, 3)), Some(&1));
        assert_eq!(counts.get(&(2, 1)), None);
    }

    #[test]
    fn chained_merges_stay_consistent() {
        let mut words = vec![
            (Word::from_symbols(vec![4, 1, 2, 3, 1, 2, 3]), 2),
            (Word::from_symbols(vec![1, 2, 3, 3]), 7),
            (Word::from_symbols(vec![3, 3, 3, 3]), 1),
        ];
        let (mut counts, mut index) = compute_pair_statistics(&words);
        apply(&mut words, (1, 2), 5, &mut counts, &mut index);
        counts.remove(&(1, 2));
        apply(&mut words, (5, 3), 6, &mut counts, &mut index);
        counts.remove(&(5, 3));
        apply(&mut words, (3, 3), 8, &mut counts, &mut index);
        counts.remove(&(3, 3));
        assert_eq!(counts, rebuild(&words));
    }
}
