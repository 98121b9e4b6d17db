use std::hint::black_box;

use bpe_subword::{Encoder, EncoderConfig, Learner, LearnerConfig, Vocabulary};
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, SamplingMode, Throughput};

const STEMS: &[&str] = &[
    "low", "new", "wid", "high", "short", "long", "strong", "bright", "quick", "slow",
];
const SUFFIXES: &[&str] = &["", "er", "est", "ly", "ness", "ish", "en", "ening"];

fn build_vocabulary() -> Vocabulary {
    let mut vocab = Vocabulary::new();
    for (i, stem) in STEMS.iter().enumerate() {
        for (j, suffix) in SUFFIXES.iter().enumerate() {
            for prefix in ["", "un", "re", "over"] {
                let count = ((i + 1) * (SUFFIXES.len() - j) * 7) as u64;
                vocab.add(format!("{prefix}{stem}{suffix}"), count);
            }
        }
    }
    vocab
}

fn bench_learning(c: &mut Criterion) {
    let vocab = build_vocabulary();
    let cfg = LearnerConfig::builder()
        .symbols(200)
        .min_frequency(2)
        .build()
        .expect("configuration");

    let mut group = c.benchmark_group("learn_merges");
    group.throughput(Throughput::Elements(vocab.len() as u64));
    group.sampling_mode(SamplingMode::Flat);
    group.bench_function(BenchmarkId::from_parameter("symbols_200"), |b| {
        b.iter(|| {
            let learner = Learner::new(cfg.clone());
            let artifacts = learner.learn(&vocab).expect("learning");
            let _ = black_box(artifacts);
        });
    });
    group.finish();
}

fn bench_segmentation(c: &mut Criterion) {
    let vocab = build_vocabulary();
    let cfg = LearnerConfig::builder()
        .symbols(200)
        .build()
        .expect("configuration");
    let table = Learner::new(cfg).learn(&vocab).expect("learning").table;
    let sentence = vocab
        .sorted_entries()
        .iter()
        .map(|(word, _)| *word)
        .collect::<Vec<_>>()
        .join(" ");

    let mut group = c.benchmark_group("segment_sentence");
    group.throughput(Throughput::Bytes(sentence.len() as u64));
    group.bench_function(BenchmarkId::from_parameter("cold_cache"), |b| {
        b.iter(|| {
            let mut encoder =
                Encoder::new(table.clone(), EncoderConfig::default()).expect("encoder");
            black_box(encoder.segment(&sentence).expect("segment"));
        });
    });
    group.finish();
}

criterion_group!(benches, bench_learning, bench_segmentation);
criterion_main!(benches);
