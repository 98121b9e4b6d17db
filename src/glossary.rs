//! Glossary isolation: substrings that are emitted verbatim and never merged.

use fancy_regex::Regex;

use crate::error::Result;

/// A span of a word, either protected by the glossary or open to merging.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Span<'a> {
    /// Text matched by a glossary entry.
    Protected(&'a str),
    /// Text between glossary matches.
    Open(&'a str),
}

impl<'a> Span<'a> {
    /// Underlying text of the span.
    #[must_use]
    pub fn as_str(&self) -> &'a str {
        match self {
            Self::Protected(text) | Self::Open(text) => text,
        }
    }
}

/// Compiled alternation of literal glossary entries followed by regex patterns.
///
/// Leftmost match wins; among matches starting at the same position the
/// earlier entry wins.
#[derive(Debug, Clone)]
pub struct Glossary {
    regex: Option<Regex>,
}

impl Glossary {
    /// Compiles `literals` (escaped) and `patterns` (used as-is) into one alternation.
    pub fn new<S: AsRef<str>>(literals: &[S], patterns: &[S]) -> Result<Self> {
        let parts: Vec<String> = literals
            .iter()
            .map(|s| fancy_regex::escape(s.as_ref()).into_owned())
            .chain(patterns.iter().map(|s| s.as_ref().to_string()))
            .collect();
        if parts.is_empty() {
            return Ok(Self { regex: None });
        }
        let regex = Regex::new(&format!("({})", parts.join("|")))?;
        Ok(Self { regex: Some(regex) })
    }

    /// Returns `true` when no entries were configured.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regex.is_none()
    }

    /// Splits `word` into protected and open spans, in order. Empty spans are
    /// omitted, as are zero-length matches.
    pub fn isolate<'a>(&self, word: &'a str) -> Result<Vec<Span<'a>>> {
        let Some(regex) = &self.regex else {
            return Ok(if word.is_empty() {
                Vec::new()
            } else {
                vec![Span::Open(word)]
            });
        };
        let mut spans = Vec::new();
        let mut last = 0usize;
        for mat in regex.find_iter(word) {
            let mat = mat?;
            if mat.start() == mat.end() {
                continue;
            }
            if mat.start() > last {
                spans.push(Span::Open(&word[last..mat.start()]));
            }
            spans.push(Span::Protected(mat.as_str()));
            last = mat.end();
        }
        if last < word.len() {
            spans.push(Span::Open(&word[last..]));
        }
        Ok(spans)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn texts(spans: &[Span<'_>]) -> Vec<String> {
        spans.iter().map(|span| span.as_str().to_string()).collect()
    }

    #[test]
    fn isolates_repeated_literal() {
        let glossary = Glossary::new(&["USA"], &[]).expect("compile");
        let spans = glossary.isolate("1934USABUSA").expect("isolate");
        assert_eq!(texts(&spans), vec!["1934", "USA", "B", "USA"]);
        assert_eq!(spans[1], Span::Protected("USA"));
        assert_eq!(spans[2], Span::Open("B"));
    }

    #[test]
    fn literals_are_escaped() {
        let glossary = Glossary::new(&["a.b"], &[]).expect("compile");
        assert_eq!(
            texts(&glossary.isolate("axba.b").expect("isolate")),
            vec!["axb", "a.b"]
        );
    }

    #[test]
    fn regex_patterns_follow_literals() {
        let glossary = Glossary::new(&["<tag>"], &[r"\d+"]).expect("compile");
        let spans = glossary.isolate("ab12<tag>c").expect("isolate");
        assert_eq!(
            spans,
            vec![
                Span::Open("ab"),
                Span::Protected("12"),
                Span::Protected("<tag>"),
                Span::Open("c"),
            ]
        );
    }

    #[test]
    fn earlier_entry_wins_at_same_position() {
        let glossary = Glossary::new(&["ab", "abc"], &[]).expect("compile");
        assert_eq!(
            texts(&glossary.isolate("abcd").expect("isolate")),
            vec!["ab", "cd"]
        );
    }

    #[test]
    fn empty_glossary_passes_word_through() {
        let glossary = Glossary::new::<&str>(&[], &[]).expect("compile");
        assert!(glossary.is_empty());
        assert_eq!(glossary.isolate("word").expect("isolate"), vec![Span::Open("word")]);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        assert!(Glossary::new(&[], &["("]).is_err());
    }
}
