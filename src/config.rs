//! Configuration builders controlling learning, encoding, and vocabulary ingestion.

use serde::{Deserialize, Serialize};

use crate::error::{BpeError, Result};
use crate::symbols::Version;

/// Default separator appended to non-final subwords.
pub const DEFAULT_SEPARATOR: &str = "@@";

/// Default unknown marker: U+FDEA, a noncharacter that never participates in merges.
pub const DEFAULT_UNKNOWN_CHAR: char = '\u{FDEA}';

/// Default replacement for the unknown marker.
pub const DEFAULT_UNKNOWN_TAG: &str = "<unk>";

/// Configuration for merge learning.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct LearnerConfig {
    /// Maximum number of new symbols (merges) to learn, excluding forced merges.
    pub symbols: usize,
    /// Learning stops once no pair reaches this frequency.
    pub min_frequency: u64,
    /// End-of-word convention of the produced table.
    pub version: Version,
    /// Logs every accepted merge through the `log` facade.
    pub verbose: bool,
}

impl LearnerConfig {
    /// Returns a builder initialised with [`LearnerConfig::default`].
    #[must_use]
    pub fn builder() -> LearnerBuilder {
        LearnerBuilder::default()
    }

    /// Validates the invariants required for learning.
    pub fn validate(&self) -> Result<()> {
        if self.min_frequency == 0 {
            return Err(BpeError::InvalidConfig(
                "min_frequency must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}

impl Default for LearnerConfig {
    fn default() -> Self {
        Self {
            symbols: 10_000,
            min_frequency: 2,
            version: Version::V0_2,
            verbose: false,
        }
    }
}

/// Builder for [`LearnerConfig`].
#[derive(Debug, Default, Clone)]
pub struct LearnerBuilder {
    cfg: LearnerConfig,
}

impl LearnerBuilder {
    /// Creates a builder with [`LearnerConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the merge budget.
    #[must_use]
    pub fn symbols(mut self, value: usize) -> Self {
        self.cfg.symbols = value;
        self
    }

    /// Sets the minimum pair frequency.
    #[must_use]
    pub fn min_frequency(mut self, value: u64) -> Self {
        self.cfg.min_frequency = value;
        self
    }

    /// Sets the end-of-word convention.
    #[must_use]
    pub fn version(mut self, version: Version) -> Self {
        self.cfg.version = version;
        self
    }

    /// Enables or disables per-merge logging.
    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.cfg.verbose = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`LearnerConfig`].
    pub fn build(self) -> Result<LearnerConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration for applying a merge table.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct EncoderConfig {
    /// String appended to every non-final subword of a word.
    pub separator: String,
    /// Literal substrings that are never merged.
    pub glossaries: Vec<String>,
    /// Regex patterns whose matches are never merged; tried after the literals.
    pub regex_glossaries: Vec<String>,
    /// Character that, when it is the whole encoded word, is replaced by `unknown_tag`.
    pub unknown_char: char,
    /// Replacement for `unknown_char`; `None` disables the substitution.
    pub unknown_tag: Option<String>,
    /// Logs glossary isolation and out-of-vocabulary splitting at debug level.
    pub verbose: bool,
}

impl EncoderConfig {
    /// Returns a builder initialised with [`EncoderConfig::default`].
    #[must_use]
    pub fn builder() -> EncoderBuilder {
        EncoderBuilder::default()
    }

    /// Validates the encoder settings.
    pub fn validate(&self) -> Result<()> {
        if self.separator.is_empty() {
            return Err(BpeError::InvalidConfig("separator must not be empty".into()));
        }
        if self.separator.chars().any(char::is_whitespace) {
            return Err(BpeError::InvalidConfig(format!(
                "separator {:?} must not contain whitespace",
                self.separator
            )));
        }
        if self.glossaries.iter().any(String::is_empty) {
            return Err(BpeError::InvalidConfig(
                "glossary entries must not be empty".into(),
            ));
        }
        Ok(())
    }
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            separator: DEFAULT_SEPARATOR.into(),
            glossaries: Vec::new(),
            regex_glossaries: Vec::new(),
            unknown_char: DEFAULT_UNKNOWN_CHAR,
            unknown_tag: Some(DEFAULT_UNKNOWN_TAG.into()),
            verbose: false,
        }
    }
}

/// Builder for [`EncoderConfig`].
#[derive(Debug, Default, Clone)]
pub struct EncoderBuilder {
    cfg: EncoderConfig,
}

impl EncoderBuilder {
    /// Creates a builder with [`EncoderConfig::default`] settings.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the continuation separator.
    #[must_use]
    pub fn separator(mut self, value: impl Into<String>) -> Self {
        self.cfg.separator = value.into();
        self
    }

    /// Sets the literal glossary entries.
    #[must_use]
    pub fn glossaries<I, S>(mut self, entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.glossaries = entries.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the regex glossary patterns.
    #[must_use]
    pub fn regex_glossaries<I, S>(mut self, patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.cfg.regex_glossaries = patterns.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the unknown marker character.
    #[must_use]
    pub fn unknown_char(mut self, value: char) -> Self {
        self.cfg.unknown_char = value;
        self
    }

    /// Sets (or clears) the unknown tag.
    #[must_use]
    pub fn unknown_tag(mut self, value: Option<String>) -> Self {
        self.cfg.unknown_tag = value;
        self
    }

    /// Enables or disables debug logging.
    #[must_use]
    pub fn verbose(mut self, enabled: bool) -> Self {
        self.cfg.verbose = enabled;
        self
    }

    /// Finalises the builder, returning a validated [`EncoderConfig`].
    pub fn build(self) -> Result<EncoderConfig> {
        self.cfg.validate()?;
        Ok(self.cfg)
    }
}

/// Configuration controlling how vocabularies are read from text.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct VocabConfig {
    /// Input is a `WORD COUNT` dictionary instead of running text.
    pub dict_input: bool,
    /// Words with a count below this value are dropped.
    pub min_count: u64,
}

impl Default for VocabConfig {
    fn default() -> Self {
        Self {
            dict_input: false,
            min_count: 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn learner_builder_overrides_defaults() {
        let cfg = LearnerConfig::builder()
            .symbols(42)
            .min_frequency(3)
            .version(Version::V0_1)
            .verbose(true)
            .build()
            .expect("config should be valid");
        assert_eq!(cfg.symbols, 42);
        assert_eq!(cfg.min_frequency, 3);
        assert_eq!(cfg.version, Version::V0_1);
        assert!(cfg.verbose);
    }

    #[test]
    fn learner_rejects_zero_min_frequency() {
        let err = LearnerConfig::builder()
            .min_frequency(0)
            .build()
            .expect_err("validation should fail");
        assert!(matches!(
            err,
            BpeError::InvalidConfig(message) if message.contains("min_frequency")
        ));
    }

    #[test]
    fn encoder_rejects_whitespace_separator() {
        let err = EncoderConfig::builder()
            .separator("@ @")
            .build()
            .expect_err("validation should fail");
        assert!(matches!(err, BpeError::InvalidConfig(_)));
        assert!(EncoderConfig::builder().separator("").build().is_err());
    }

    #[test]
    fn encoder_defaults_match_conventions() {
        let cfg = EncoderConfig::default();
        assert_eq!(cfg.separator, "@@");
        assert_eq!(cfg.unknown_char, '\u{FDEA}');
        assert_eq!(cfg.unknown_tag.as_deref(), Some("<unk>"));
    }

    #[test]
    fn learner_config_serializes_version_as_string() {
        let json = serde_json::to_string(&LearnerConfig::default()).expect("serialize");
        assert!(json.contains("\"version\":\"0.2\""));
        let back: LearnerConfig = serde_json::from_str(&json).expect("deserialize");
        assert_eq!(back, LearnerConfig::default());
    }
}
