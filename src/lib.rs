//! Subword byte pair encoding (BPE): merge learning and segmentation.
//!
//! The crate exposes both a library API and a `subword` command line interface.
//! A typical run counts a word-frequency [`Vocabulary`], learns a ranked
//! [`MergeTable`] with a [`Learner`], persists it, and later replays it with an
//! [`Encoder`] to split words into subword units joined by a continuation
//! separator.
//!
//! ```no_run
//! use bpe_subword::{Encoder, EncoderConfig, Learner, LearnerConfig, VocabConfig, Vocabulary};
//!
//! # fn main() -> bpe_subword::Result<()> {
//! let vocab = Vocabulary::read("corpus.txt", &VocabConfig::default())?;
//! let learner_cfg = LearnerConfig::builder()
//!     .symbols(8000)
//!     .min_frequency(2)
//!     .build()?;
//! let artifacts = Learner::new(learner_cfg).learn(&vocab)?;
//! artifacts.table.save("codes.txt")?;
//!
//! let mut encoder = Encoder::new(artifacts.table, EncoderConfig::default())?;
//! println!("{}", encoder.segment("the lowest newer widths")?);
//! # Ok(())
//! # }
//! ```
//!
//! The CLI is enabled by default through the `cli` feature.  Users targeting the
//! library portion only can disable default features to avoid the CLI
//! dependencies: `bpe-subword = { version = "...", default-features = false }`.

#![forbid(unsafe_code)]
#![warn(
    missing_docs,
    clippy::all,
    rust_2018_idioms,
    future_incompatible,
    unused_lifetimes,
    unreachable_pub
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc,
    clippy::doc_markdown,
    clippy::multiple_crate_versions
)]

pub mod config;
pub mod encoder;
pub mod error;
pub mod glossary;
pub mod learner;
pub mod merges;
pub mod metrics;
pub mod symbols;
pub mod vocab;

pub use config::{
    EncoderBuilder, EncoderConfig, LearnerBuilder, LearnerConfig, VocabConfig, DEFAULT_SEPARATOR,
};
pub use encoder::Encoder;
pub use error::{BpeError, Result};
pub use glossary::Glossary;
pub use learner::{ForcedMerges, Learner, LearnerArtifacts};
pub use merges::{MergePair, MergeTable};
pub use metrics::{LearningMetrics, MergeRecord, StopReason};
pub use symbols::{Version, END_OF_WORD};
pub use vocab::{load_vocabulary_set, read_vocabulary_set, Vocabulary};
