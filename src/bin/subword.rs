use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use bpe_subword::config::{DEFAULT_UNKNOWN_CHAR, DEFAULT_UNKNOWN_TAG};
use bpe_subword::{
    load_vocabulary_set, Encoder, EncoderConfig, ForcedMerges, Learner, LearnerArtifacts,
    LearnerConfig, MergeTable, VocabConfig, Version, Vocabulary, DEFAULT_SEPARATOR,
};
use clap::{ArgAction, Args, Parser, Subcommand};
use env_logger::Env;
use log::info;

#[derive(Parser, Debug)]
#[command(author, version, about = "Subword BPE toolkit", long_about = None)]
struct Cli {
    /// Increase verbosity (-v, -vv); -v also logs every learned merge
    #[arg(short = 'v', long, global = true, action = ArgAction::Count)]
    verbose: u8,

    /// Decrease verbosity (-q, -qq)
    #[arg(short = 'q', long, global = true, action = ArgAction::Count)]
    quiet: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Learn a merge table from text or a word-count dictionary
    Learn(LearnArgs),
    /// Learn one merge table from several inputs and write a vocabulary per input
    LearnJoint(LearnJointArgs),
    /// Segment text with a learned merge table
    Apply(ApplyArgs),
    /// Count the words of a text into a vocabulary file
    Vocab(VocabArgs),
    /// Drop vocabulary entries below a minimum frequency
    Threshold(ThresholdArgs),
    /// Derive a segmented vocabulary and a minimal merge table subset
    Subset(SubsetArgs),
}

#[derive(Args, Debug)]
struct LearningOptions {
    /// Number of new symbols (merges) to learn
    #[arg(short, long, value_name = "COUNT", default_value_t = 10_000)]
    symbols: usize,

    /// Stop when no pair reaches this frequency
    #[arg(long, value_name = "FREQ", default_value_t = 2)]
    min_frequency: u64,

    /// Drop words whose count is below this value before learning
    #[arg(short = 'c', long, value_name = "COUNT", default_value_t = 1)]
    min_count: u64,

    /// Interpret inputs as `WORD COUNT` dictionaries
    #[arg(long)]
    dict_input: bool,

    /// Learn a version 0.1 table (end-of-word marker is a separate symbol)
    #[arg(long)]
    version01: bool,

    /// Separator used when writing segmented vocabularies
    #[arg(long, value_name = "STR", default_value = DEFAULT_SEPARATOR)]
    separator: String,
}

#[derive(Args, Debug)]
struct LearnArgs {
    /// Input text (default: standard input)
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output merge table (default: standard output)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    #[command(flatten)]
    learning: LearningOptions,

    /// Merge table whose merges are applied before learning
    #[arg(short = 'f', long, value_name = "PATH")]
    force_codes: Option<PathBuf>,

    /// Only force merges whose halves both fully match this regex
    #[arg(short = 'g', long, value_name = "REGEX", requires = "force_codes")]
    grep_force_codes: Option<String>,

    /// Write the segmented vocabulary of the input to this file
    #[arg(short = 'w', long, value_name = "PATH")]
    write_vocabulary: Option<PathBuf>,

    /// Write learning metrics as JSON to this file
    #[arg(long, value_name = "PATH")]
    metrics: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LearnJointArgs {
    /// Input texts
    #[arg(short, long, value_name = "PATH", num_args = 1.., required = true)]
    input: Vec<PathBuf>,

    /// Output merge table
    #[arg(short, long, value_name = "PATH")]
    output: PathBuf,

    #[command(flatten)]
    learning: LearningOptions,

    /// Segmented vocabulary files, one per input
    #[arg(short = 'w', long, value_name = "PATH", num_args = 1..)]
    write_vocabulary: Vec<PathBuf>,
}

#[derive(Args, Debug)]
struct ApplyArgs {
    /// Merge table produced by `learn`
    #[arg(short, long, value_name = "PATH")]
    codes: PathBuf,

    /// Input text (default: standard input)
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output file (default: standard output)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Separator appended to non-final subwords
    #[arg(short, long, value_name = "STR", default_value = DEFAULT_SEPARATOR)]
    separator: String,

    /// Segmented vocabulary; output units outside it are split further
    #[arg(long, value_name = "PATH")]
    vocabulary: Option<PathBuf>,

    /// Ignore vocabulary entries below this frequency
    #[arg(long, value_name = "FREQ", requires = "vocabulary")]
    vocabulary_threshold: Option<u64>,

    /// Strings that are never split or merged
    #[arg(long, value_name = "STR", num_args = 1..)]
    glossaries: Vec<String>,

    /// Regexes whose matches are never split or merged
    #[arg(long, value_name = "REGEX", num_args = 1..)]
    regex_glossaries: Vec<String>,

    /// Character that marks an unknown word
    #[arg(long, value_name = "CHAR", default_value_t = DEFAULT_UNKNOWN_CHAR)]
    unk_char: char,

    /// Replacement emitted for the unknown character
    #[arg(long, value_name = "TAG", default_value = DEFAULT_UNKNOWN_TAG)]
    unk_tag: String,

    /// Leave the unknown character untouched
    #[arg(long, conflicts_with = "unk_tag")]
    no_unk_tag: bool,
}

#[derive(Args, Debug)]
struct VocabArgs {
    /// Input text (default: standard input)
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output vocabulary (default: standard output)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Drop words whose count is below this value
    #[arg(short = 'c', long, value_name = "COUNT", default_value_t = 1)]
    min_count: u64,
}

#[derive(Args, Debug)]
struct ThresholdArgs {
    /// Input vocabulary (default: standard input)
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Output vocabulary (default: standard output)
    #[arg(short, long, value_name = "PATH")]
    output: Option<PathBuf>,

    /// Minimum frequency to keep
    #[arg(short, long, value_name = "FREQ")]
    threshold: u64,
}

#[derive(Args, Debug)]
struct SubsetArgs {
    /// Merge table produced by `learn`
    #[arg(short, long, value_name = "PATH")]
    codes: PathBuf,

    /// Vocabulary or text input (default: standard input)
    #[arg(short, long, value_name = "PATH")]
    input: Option<PathBuf>,

    /// Treat the input as running text instead of a `WORD COUNT` dictionary
    #[arg(long)]
    text_input: bool,

    /// Drop words whose count is below this value
    #[arg(short = 'm', long, value_name = "COUNT", default_value_t = 1)]
    min_count: u64,

    /// Separator appended to non-final subwords
    #[arg(short, long, value_name = "STR", default_value = DEFAULT_SEPARATOR)]
    separator: String,

    /// Write the merges needed to reach the segmented vocabulary here
    #[arg(short = 'o', long, value_name = "PATH")]
    output_codes: Option<PathBuf>,

    /// Segmented vocabulary output (default: standard output)
    #[arg(short = 'b', long, value_name = "PATH")]
    bpe_vocabulary: Option<PathBuf>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose, cli.quiet);
    let verbose = cli.verbose > 0;

    match cli.command {
        Commands::Learn(args) => run_learn(args, verbose),
        Commands::LearnJoint(args) => run_learn_joint(args, verbose),
        Commands::Apply(args) => run_apply(args, verbose),
        Commands::Vocab(args) => run_vocab(args),
        Commands::Threshold(args) => run_threshold(args),
        Commands::Subset(args) => run_subset(args),
    }
}

fn init_logging(verbose: u8, quiet: u8) {
    use log::LevelFilter;

    let level = if quiet > 0 {
        match quiet {
            1 => LevelFilter::Warn,
            _ => LevelFilter::Error,
        }
    } else {
        match verbose {
            0 => LevelFilter::Info,
            1 => LevelFilter::Debug,
            _ => LevelFilter::Trace,
        }
    };

    let mut builder = env_logger::Builder::from_env(Env::default().default_filter_or("info"));
    builder.format_timestamp_millis();
    builder.filter_level(level);
    let _ = builder.try_init();
}

fn open_input(path: Option<&Path>) -> Result<Box<dyn BufRead>> {
    match path {
        Some(path) => {
            let file = File::open(path)
                .with_context(|| format!("failed to open {}", path.display()))?;
            Ok(Box::new(BufReader::new(file)))
        }
        None => Ok(Box::new(BufReader::new(io::stdin()))),
    }
}

fn open_output(path: Option<&Path>) -> Result<Box<dyn Write>> {
    match path {
        Some(path) => {
            let file = File::create(path)
                .with_context(|| format!("failed to create {}", path.display()))?;
            Ok(Box::new(BufWriter::new(file)))
        }
        None => Ok(Box::new(BufWriter::new(io::stdout()))),
    }
}

fn describe(path: Option<&Path>) -> String {
    path.map_or_else(|| "standard input".to_string(), |p| p.display().to_string())
}

impl LearningOptions {
    fn learner_config(&self, verbose: bool) -> Result<LearnerConfig> {
        let version = if self.version01 {
            Version::V0_1
        } else {
            Version::V0_2
        };
        LearnerConfig::builder()
            .symbols(self.symbols)
            .min_frequency(self.min_frequency)
            .version(version)
            .verbose(verbose)
            .build()
            .context("invalid learner configuration")
    }

    fn vocab_config(&self) -> VocabConfig {
        VocabConfig {
            dict_input: self.dict_input,
            min_count: self.min_count,
        }
    }

    fn plain_encoder(&self, table: MergeTable) -> Result<Encoder> {
        let cfg = EncoderConfig::builder()
            .separator(self.separator.as_str())
            .build()
            .context("invalid separator")?;
        Encoder::new(table, cfg).context("failed to build encoder")
    }
}

fn run_learn(args: LearnArgs, verbose: bool) -> Result<()> {
    let cfg = args.learning.learner_config(verbose)?;
    let reader = open_input(args.input.as_deref())?;
    let vocab = Vocabulary::from_reader(reader, &args.learning.vocab_config())
        .with_context(|| format!("failed to read {}", describe(args.input.as_deref())))?;
    info!("vocabulary has {} distinct words", vocab.len());

    let forced = match &args.force_codes {
        Some(path) => {
            let table = MergeTable::load(path)
                .with_context(|| format!("failed to load forced merges {}", path.display()))?;
            let forced = ForcedMerges::new(&table);
            match &args.grep_force_codes {
                Some(pattern) => forced
                    .with_filter(pattern)
                    .with_context(|| format!("invalid force filter {pattern:?}"))?,
                None => forced,
            }
        }
        None => ForcedMerges::default(),
    };

    let artifacts = Learner::new(cfg)
        .learn_with_forced(&vocab, &forced)
        .context("learning failed")?;
    write_table(&artifacts.table, args.output.as_deref())?;
    write_metrics(&artifacts, args.metrics.as_deref())?;

    if let Some(path) = &args.write_vocabulary {
        let mut encoder = args.learning.plain_encoder(artifacts.table)?;
        let restricted = encoder.restricted_vocabulary(&vocab)?;
        restricted
            .save(path)
            .with_context(|| format!("failed to write vocabulary {}", path.display()))?;
    }
    Ok(())
}

fn run_learn_joint(args: LearnJointArgs, verbose: bool) -> Result<()> {
    if !args.write_vocabulary.is_empty() && args.write_vocabulary.len() != args.input.len() {
        bail!(
            "number of input files ({}) and vocabulary files ({}) must match",
            args.input.len(),
            args.write_vocabulary.len()
        );
    }
    let cfg = args.learning.learner_config(verbose)?;
    let vocab_cfg = args.learning.vocab_config();

    let mut vocabularies = Vec::with_capacity(args.input.len());
    let mut joint = Vocabulary::new();
    for path in &args.input {
        let vocab = Vocabulary::read(path, &vocab_cfg)
            .with_context(|| format!("failed to read {}", path.display()))?;
        joint.absorb(&vocab);
        vocabularies.push(vocab);
    }
    info!(
        "joint vocabulary has {} distinct words from {} inputs",
        joint.len(),
        args.input.len()
    );

    let artifacts = Learner::new(cfg).learn(&joint).context("learning failed")?;
    write_table(&artifacts.table, Some(&args.output))?;

    let mut encoder = args.learning.plain_encoder(artifacts.table)?;
    for (vocab, path) in vocabularies.iter().zip(&args.write_vocabulary) {
        let restricted = encoder.restricted_vocabulary(vocab)?;
        restricted
            .save(path)
            .with_context(|| format!("failed to write vocabulary {}", path.display()))?;
        info!("wrote {} subword entries to {}", restricted.len(), path.display());
    }
    Ok(())
}

fn run_apply(args: ApplyArgs, verbose: bool) -> Result<()> {
    let table = MergeTable::load(&args.codes)
        .with_context(|| format!("failed to load merge table {}", args.codes.display()))?;
    let unknown_tag = (!args.no_unk_tag).then_some(args.unk_tag);
    let cfg = EncoderConfig::builder()
        .separator(args.separator)
        .glossaries(args.glossaries)
        .regex_glossaries(args.regex_glossaries)
        .unknown_char(args.unk_char)
        .unknown_tag(unknown_tag)
        .verbose(verbose)
        .build()
        .context("invalid encoder configuration")?;
    let mut encoder = Encoder::new(table, cfg).context("failed to build encoder")?;
    if let Some(path) = &args.vocabulary {
        let words = load_vocabulary_set(path, args.vocabulary_threshold.unwrap_or(0))
            .with_context(|| format!("failed to read vocabulary {}", path.display()))?;
        info!("restricting output to {} vocabulary entries", words.len());
        encoder = encoder.with_vocabulary(words);
    }

    let reader = open_input(args.input.as_deref())?;
    let mut writer = open_output(args.output.as_deref())?;
    for line in reader.lines() {
        let line = line
            .with_context(|| format!("failed to read {}", describe(args.input.as_deref())))?;
        let segmented = encoder.segment(&line)?;
        writeln!(writer, "{segmented}").context("failed to write output")?;
    }
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn run_vocab(args: VocabArgs) -> Result<()> {
    let cfg = VocabConfig {
        dict_input: false,
        min_count: args.min_count,
    };
    let reader = open_input(args.input.as_deref())?;
    let vocab = Vocabulary::from_reader(reader, &cfg)
        .with_context(|| format!("failed to read {}", describe(args.input.as_deref())))?;
    let mut writer = open_output(args.output.as_deref())?;
    vocab.write(&mut writer).context("failed to write vocabulary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn run_threshold(args: ThresholdArgs) -> Result<()> {
    let reader = open_input(args.input.as_deref())?;
    let vocab = Vocabulary::parse_dict(reader)
        .with_context(|| format!("failed to read {}", describe(args.input.as_deref())))?;
    let before = vocab.len();
    let vocab = vocab.threshold(args.threshold);
    info!("kept {} of {before} entries", vocab.len());
    let mut writer = open_output(args.output.as_deref())?;
    vocab.write(&mut writer).context("failed to write vocabulary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn run_subset(args: SubsetArgs) -> Result<()> {
    let table = MergeTable::load(&args.codes)
        .with_context(|| format!("failed to load merge table {}", args.codes.display()))?;
    let cfg = VocabConfig {
        dict_input: !args.text_input,
        min_count: args.min_count,
    };
    let reader = open_input(args.input.as_deref())?;
    let vocab = Vocabulary::from_reader(reader, &cfg)
        .with_context(|| format!("failed to read {}", describe(args.input.as_deref())))?;

    let encoder_cfg = EncoderConfig::builder()
        .separator(args.separator.as_str())
        .build()
        .context("invalid separator")?;
    let mut encoder = Encoder::new(table, encoder_cfg).context("failed to build encoder")?;
    let bpe_vocab = encoder.restricted_vocabulary(&vocab)?;

    if let Some(path) = &args.output_codes {
        let subset = encoder.table().subset(&bpe_vocab, &args.separator);
        info!(
            "keeping {} of {} merges",
            subset.len(),
            encoder.table().len()
        );
        subset
            .save(path)
            .with_context(|| format!("failed to write merge table {}", path.display()))?;
    }

    let mut writer = open_output(args.bpe_vocabulary.as_deref())?;
    bpe_vocab
        .write(&mut writer)
        .context("failed to write segmented vocabulary")?;
    writer.flush().context("failed to flush output")?;
    Ok(())
}

fn write_table(table: &MergeTable, path: Option<&Path>) -> Result<()> {
    let mut writer = open_output(path)?;
    table
        .write(&mut writer)
        .context("failed to write merge table")?;
    writer.flush().context("failed to flush merge table")?;
    if let Some(path) = path {
        info!("wrote {} merges to {}", table.len(), path.display());
    }
    Ok(())
}

fn write_metrics(artifacts: &LearnerArtifacts, path: Option<&Path>) -> Result<()> {
    let Some(path) = path else {
        return Ok(());
    };
    artifacts
        .metrics
        .save_json(path)
        .with_context(|| format!("failed to write metrics {}", path.display()))?;
    info!("{artifacts}");
    Ok(())
}
