use assert_cmd::Command;
use serde_json::Value;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

const CORPUS: &str = "the lowest newer widths of the newest lower wall\n\
                      low lower lowest new newer newest wide wider widest\n\
                      \x20 the wall was lower than the newest wall  \n";

fn temp_workspace() -> TempDir {
    tempfile::tempdir().expect("create tempdir")
}

fn subword() -> Command {
    Command::cargo_bin("subword").expect("binary exists")
}

fn path_arg(path: &Path) -> &str {
    path.to_str().expect("utf-8 path")
}

fn learn_codes(workspace: &TempDir, symbols: &str) -> std::path::PathBuf {
    let input_path = workspace.path().join("corpus.txt");
    let codes_path = workspace.path().join("codes.txt");
    fs::write(&input_path, CORPUS).expect("write corpus");
    subword()
        .args([
            "--quiet",
            "learn",
            "-i",
            path_arg(&input_path),
            "-o",
            path_arg(&codes_path),
            "-s",
            symbols,
            "--min-frequency",
            "2",
        ])
        .assert()
        .success();
    codes_path
}

#[test]
fn learn_apply_round_trip() {
    let workspace = temp_workspace();
    let codes_path = learn_codes(&workspace, "25");
    let codes = fs::read_to_string(&codes_path).expect("read codes");
    assert!(codes.starts_with("#version: 0.2\n"));
    assert!(codes.lines().count() > 1, "some merges learned");

    let output = subword()
        .args(["--quiet", "apply", "-c", path_arg(&codes_path)])
        .write_stdin(CORPUS)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let segmented = String::from_utf8(output).expect("utf-8 output");
    assert!(segmented.contains("@@"), "some words were split");
    let restored = segmented.replace("@@ ", "");
    let expected: String = CORPUS
        .lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" ") + "\n")
        .collect();
    assert_eq!(restored, expected);
    assert!(segmented.lines().all(|line| line == line.trim()));
}

#[test]
fn learn_writes_metrics_and_vocabulary() {
    let workspace = temp_workspace();
    let input_path = workspace.path().join("corpus.txt");
    let codes_path = workspace.path().join("codes.txt");
    let metrics_path = workspace.path().join("metrics.json");
    let vocab_path = workspace.path().join("vocab.txt");
    fs::write(&input_path, CORPUS).expect("write corpus");

    subword()
        .args([
            "--quiet",
            "learn",
            "-i",
            path_arg(&input_path),
            "-o",
            path_arg(&codes_path),
            "-s",
            "5",
            "--version01",
            "--metrics",
            path_arg(&metrics_path),
            "-w",
            path_arg(&vocab_path),
        ])
        .assert()
        .success();

    let codes = fs::read_to_string(&codes_path).expect("read codes");
    assert!(codes.starts_with("#version: 0.1\n"));

    let metrics: Value =
        serde_json::from_str(&fs::read_to_string(&metrics_path).expect("read metrics"))
            .expect("metrics are valid JSON");
    assert_eq!(metrics["merges"].as_array().expect("merges").len(), 5);
    assert_eq!(metrics["stop_reason"], "BudgetReached");

    let vocab = fs::read_to_string(&vocab_path).expect("read vocabulary");
    assert!(!vocab.is_empty());
    for line in vocab.lines() {
        let fields: Vec<&str> = line.split(' ').collect();
        assert_eq!(fields.len(), 2, "WORD COUNT line: {line:?}");
        fields[1].parse::<u64>().expect("numeric count");
    }
}

#[test]
fn apply_keeps_glossaries_intact() {
    let workspace = temp_workspace();
    let codes_path = workspace.path().join("empty.txt");
    fs::write(&codes_path, "#version: 0.2\n").expect("write codes");

    subword()
        .args([
            "--quiet",
            "apply",
            "-c",
            path_arg(&codes_path),
            "--glossaries",
            "like",
            "Manuel",
            "USA",
        ])
        .write_stdin("wordlikeword likeManuelword\n")
        .assert()
        .success()
        .stdout("w@@ o@@ r@@ d@@ like@@ w@@ o@@ r@@ d like@@ Manuel@@ w@@ o@@ r@@ d\n");
}

#[test]
fn subset_keeps_only_required_merges() {
    let workspace = temp_workspace();
    let codes_path = learn_codes(&workspace, "40");
    let dict_path = workspace.path().join("dict.txt");
    let subset_path = workspace.path().join("subset.txt");
    let bpe_vocab_path = workspace.path().join("bpe_vocab.txt");
    fs::write(&dict_path, "lowest 4\nwall 2\n").expect("write dictionary");

    subword()
        .args([
            "--quiet",
            "subset",
            "-c",
            path_arg(&codes_path),
            "-i",
            path_arg(&dict_path),
            "-o",
            path_arg(&subset_path),
            "-b",
            path_arg(&bpe_vocab_path),
        ])
        .assert()
        .success();

    let full = fs::read_to_string(&codes_path).expect("read codes");
    let subset = fs::read_to_string(&subset_path).expect("read subset");
    assert!(subset.starts_with("#version: 0.2\n"));
    let full_lines: Vec<&str> = full.lines().skip(1).collect();
    let subset_lines: Vec<&str> = subset.lines().skip(1).collect();
    assert!(subset_lines.len() <= full_lines.len());
    let mut positions = subset_lines.iter().map(|line| {
        full_lines
            .iter()
            .position(|candidate| candidate == line)
            .expect("subset merge comes from the full table")
    });
    let mut previous = positions.next();
    for position in positions {
        assert!(previous < Some(position), "rank order preserved");
        previous = Some(position);
    }

    let bpe_vocab = fs::read_to_string(&bpe_vocab_path).expect("read segmented vocabulary");
    assert!(!bpe_vocab.is_empty());
}

#[test]
fn vocab_and_threshold_filter_counts() {
    let output = subword()
        .args(["--quiet", "vocab"])
        .write_stdin("a b a c a b\n")
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let vocab = String::from_utf8(output).expect("utf-8 output");
    assert_eq!(vocab, "a 3\nb 2\nc 1\n");

    subword()
        .args(["--quiet", "threshold", "-t", "2"])
        .write_stdin(vocab)
        .assert()
        .success()
        .stdout("a 3\nb 2\n");
}

#[test]
fn learn_joint_requires_matching_vocabulary_count() {
    let workspace = temp_workspace();
    let first = workspace.path().join("a.txt");
    let second = workspace.path().join("b.txt");
    fs::write(&first, CORPUS).expect("write corpus");
    fs::write(&second, CORPUS).expect("write corpus");

    subword()
        .args([
            "--quiet",
            "learn-joint",
            "-i",
            path_arg(&first),
            path_arg(&second),
            "-o",
            path_arg(&workspace.path().join("codes.txt")),
            "-w",
            path_arg(&workspace.path().join("vocab.a")),
        ])
        .assert()
        .failure();
}

#[test]
fn learn_joint_writes_one_vocabulary_per_input() {
    let workspace = temp_workspace();
    let first = workspace.path().join("a.txt");
    let second = workspace.path().join("b.txt");
    let vocab_a = workspace.path().join("vocab.a");
    let vocab_b = workspace.path().join("vocab.b");
    fs::write(&first, CORPUS).expect("write corpus");
    fs::write(&second, "newest widest lowest\n").expect("write corpus");

    subword()
        .args([
            "--quiet",
            "learn-joint",
            "-i",
            path_arg(&first),
            path_arg(&second),
            "-o",
            path_arg(&workspace.path().join("codes.txt")),
            "-s",
            "30",
            "-w",
            path_arg(&vocab_a),
            path_arg(&vocab_b),
        ])
        .assert()
        .success();

    assert!(!fs::read_to_string(&vocab_a).expect("vocab a").is_empty());
    assert!(!fs::read_to_string(&vocab_b).expect("vocab b").is_empty());
}

#[test]
fn apply_with_fully_filtered_vocabulary_matches_unrestricted() {
    let workspace = temp_workspace();
    let codes_path = learn_codes(&workspace, "25");
    let vocab_path = workspace.path().join("vocab.txt");
    fs::write(&vocab_path, "low@@ 3\nest 2\n").expect("write vocabulary");

    let unrestricted = subword()
        .args(["--quiet", "apply", "-c", path_arg(&codes_path)])
        .write_stdin(CORPUS)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();

    subword()
        .args([
            "--quiet",
            "apply",
            "-c",
            path_arg(&codes_path),
            "--vocabulary",
            path_arg(&vocab_path),
            "--vocabulary-threshold",
            "999999",
        ])
        .write_stdin(CORPUS)
        .assert()
        .success()
        .stdout(unrestricted);
}
