//! End-to-end searches on in-process groups.

use std::fs;
use std::path::PathBuf;

use ferrogrep::{
    grep, Error, FileSink, GrepConfig, LocalGroup, Match, OverflowPolicy, ResultSet, Sink,
};
use proptest::prelude::*;
use tempfile::TempDir;

fn write_input(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("input.txt");
    let mut text = String::new();
    for line in lines {
        text.push_str(line);
        text.push('\n');
    }
    fs::write(&path, text).unwrap();
    path
}

/// Run a search on `workers` ranks and return every rank's outcome.
fn run_group(config: &GrepConfig, workers: usize) -> Vec<ferrogrep::Result<Option<ResultSet>>> {
    LocalGroup::new(workers)
        .unwrap()
        .run(|comm| grep::run(&comm, config))
}

/// Run a search that is expected to succeed and return the coordinator's results.
fn search(config: &GrepConfig, workers: usize) -> ResultSet {
    let mut outcomes = run_group(config, workers).into_iter();
    let results = outcomes.next().unwrap().unwrap().unwrap();
    for worker in outcomes {
        assert!(worker.unwrap().is_none());
    }
    results
}

fn pairs(results: &ResultSet) -> Vec<(u64, &str)> {
    results.iter().map(|m| (m.line, m.text.as_str())).collect()
}

fn linear_scan(lines: &[&str], pattern: &str) -> Vec<(u64, String)> {
    lines
        .iter()
        .enumerate()
        .filter(|(_, line)| line.contains(pattern))
        .map(|(i, line)| (i as u64 + 1, (*line).to_string()))
        .collect()
}

#[test]
fn single_match_in_second_line() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["apple", "banana", "cherry", "date"]);

    let results = search(&GrepConfig::new(input, "an"), 2);
    assert_eq!(pairs(&results), vec![(2, "banana")]);
    assert_eq!(results.per_rank(), &[1, 0]);
}

#[test]
fn empty_pattern_matches_every_source_line_but_no_padding() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["x", "y", "z"]);

    // 3 lines on 2 ranks: one padding line on rank 1
    let results = search(&GrepConfig::new(input, ""), 2);
    assert_eq!(pairs(&results), vec![(1, "x"), (2, "y"), (3, "z")]);
}

#[test]
fn line_filling_the_record_keeps_its_last_character() {
    let dir = TempDir::new().unwrap();
    let long = format!("{}!", "a".repeat(15));
    let input = write_input(&dir, &["short", &long, "other"]);

    let config = GrepConfig::new(input, "a!")
        .with_record_width(16)
        .with_overflow(OverflowPolicy::Reject);
    let results = search(&config, 3);
    assert_eq!(pairs(&results), vec![(2, long.as_str())]);
}

#[test]
fn one_worker_is_a_linear_scan() {
    let dir = TempDir::new().unwrap();
    let lines = ["alpha", "beta", "gamma", "delta", "epsilon", "zeta"];
    let input = write_input(&dir, &lines);

    let results = search(&GrepConfig::new(input, "ta"), 1);
    let got: Vec<(u64, String)> = results.into_iter().map(|m| (m.line, m.text)).collect();
    assert_eq!(got, linear_scan(&lines, "ta"));
    assert_eq!(got.len(), 3);
}

#[test]
fn no_matches_writes_an_empty_file() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["a", "b", "c", "d", "e", "f", "g", "h"]);

    let results = search(&GrepConfig::new(input, "zzz"), 4);
    assert!(results.is_empty());
    assert_eq!(results.per_rank(), &[0, 0, 0, 0]);

    let out = dir.path().join("program_result.txt");
    FileSink::new(&out).write_results(&results).unwrap();
    assert_eq!(fs::read(&out).unwrap(), b"");
}

#[test]
fn results_file_uses_line_colon_text() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["one fish", "two fish", "red", "blue fish"]);

    let results = search(&GrepConfig::new(input, "fish"), 3);
    let out = dir.path().join("out.txt");
    FileSink::new(&out).write_results(&results).unwrap();

    assert_eq!(
        fs::read_to_string(&out).unwrap(),
        "1:one fish\n2:two fish\n4:blue fish\n"
    );
}

#[test]
fn more_workers_than_lines() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["needle", "hay"]);

    let results = search(&GrepConfig::new(input, "needle"), 5);
    assert_eq!(pairs(&results), vec![(1, "needle")]);
    assert_eq!(results.per_rank(), &[1, 0, 0, 0, 0]);
}

#[test]
fn empty_file_yields_no_results() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &[]);

    let results = search(&GrepConfig::new(input, ""), 3);
    assert!(results.is_empty());
}

#[test]
fn trailing_spaces_survive_default_padding() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["end  ", "end"]);

    let results = search(&GrepConfig::new(input, "end "), 2);
    assert_eq!(pairs(&results), vec![(1, "end  ")]);
}

#[test]
fn over_long_lines_are_truncated_by_default() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["abcdefghij", "xyz"]);

    let config = GrepConfig::new(input, "ij").with_record_width(8);
    let results = search(&config, 2);
    assert!(results.is_empty());

    let mut config = config;
    config.pattern = "gh".to_string();
    let results = search(&config, 2);
    assert_eq!(
        results.matches(),
        &[Match {
            line: 1,
            text: "abcdefgh".to_string()
        }]
    );
}

#[test]
fn missing_input_fails_the_whole_group() {
    let dir = TempDir::new().unwrap();
    let config = GrepConfig::new(dir.path().join("absent.txt"), "x");

    let outcomes = run_group(&config, 3);
    assert!(matches!(outcomes[0], Err(Error::Io { .. })));
    for worker in &outcomes[1..] {
        assert!(matches!(worker, Err(Error::CoordinatorAborted)));
    }
    assert!(!dir.path().join("program_result.txt").exists());
    assert!(outcomes.iter().all(|o| o.as_ref().unwrap_err().leaves_peers_unblocked()));
}

#[test]
fn over_long_line_is_rejected_on_request() {
    let dir = TempDir::new().unwrap();
    let input = write_input(&dir, &["ok", "much too long"]);

    let config = GrepConfig::new(input, "o")
        .with_record_width(4)
        .with_overflow(OverflowPolicy::Reject);
    let outcomes = run_group(&config, 2);
    assert!(matches!(
        outcomes[0],
        Err(Error::RecordOverflow { line: 2, .. })
    ));
    assert!(matches!(outcomes[1], Err(Error::CoordinatorAborted)));
    assert!(outcomes.iter().all(|o| o.as_ref().unwrap_err().leaves_peers_unblocked()));
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn distributed_search_equals_linear_scan(
        lines in prop::collection::vec("[ab ]{0,12}", 0..40),
        pattern in "[ab]{0,2}",
        workers in 1usize..7,
    ) {
        let dir = TempDir::new().unwrap();
        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let input = write_input(&dir, &refs);

        let results = search(&GrepConfig::new(input, pattern.as_str()), workers);
        let got: Vec<(u64, String)> = results.iter().map(|m| (m.line, m.text.clone())).collect();

        prop_assert!(got.windows(2).all(|w| w[0].0 < w[1].0));
        prop_assert_eq!(got, linear_scan(&refs, &pattern));
        prop_assert_eq!(results.per_rank().len(), workers);
        prop_assert_eq!(results.per_rank().iter().sum::<u64>() as usize, results.len());
    }
}
