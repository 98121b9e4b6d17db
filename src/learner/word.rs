use crate::symbols::{Pair, SymbolId};

/// Symbol sequence of one vocabulary entry while merges are being learned.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub(crate) struct Word {
    symbols: Vec<SymbolId>,
}

impl Word {
    pub(crate) fn from_symbols(symbols: Vec<SymbolId>) -> Self {
        Self { symbols }
    }

    #[cfg(test)]
    pub(crate) fn symbols(&self) -> &[SymbolId] {
        &self.symbols
    }

    pub(crate) fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Invokes the provided closure for each adjacent pair, left to right.
    pub(crate) fn for_each_pair<F>(&self, mut f: F)
    where
        F: FnMut(Pair),
    {
        for window in self.symbols.windows(2) {
            f((window[0], window[1]));
        }
    }

    /// Position of the first `symbol` at or after `from`.
    pub(crate) fn find(&self, symbol: SymbolId, from: usize) -> Option<usize> {
        self.symbols
            .get(from..)?
            .iter()
            .position(|&s| s == symbol)
            .map(|offset| from + offset)
    }

    /// Returns a copy with every non-overlapping occurrence of `pair` (scanned
    /// left to right) replaced by `replacement`, or `None` when `pair` does not occur.
    pub(crate) fn merged(&self, pair: Pair, replacement: SymbolId) -> Option<Word> {
        let mut out = Vec::with_capacity(self.symbols.len());
        let mut merged_any = false;
        let mut i = 0usize;
        while i < self.symbols.len() {
            if i + 1 < self.symbols.len()
                && self.symbols[i] == pair.0
                && self.symbols[i + 1] == pair.1
            {
                out.push(replacement);
                merged_any = true;
                i += 2;
            } else {
                out.push(self.symbols[i]);
                i += 1;
            }
        }
        merged_any.then(|| Word::from_symbols(out))
    }
}

impl std::ops::Index<usize> for Word {
    type Output = SymbolId;

    fn index(&self, index: usize) -> &SymbolId {
        &self.symbols[index]
    }
}
