// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use sinkcheck::actual_verdicts::load_actual_verdicts;
use sinkcheck::driver;
use sinkcheck::options::{FixtureOptions, Options};
use sinkcheck::report::{BatchReport, OutcomeCounts, EXIT_ERROR, EXIT_MISMATCH, EXIT_PASS};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use std::str::FromStr;

// Grade every fixture in tests/fixtures against the engine verdicts recorded next to it.
#[test]
fn run_fixtures() {
    assert_eq!(run_directory(fixtures_path()), 0);
}

fn fixtures_path() -> PathBuf {
    let mut fixtures_path = PathBuf::from_str("tests/fixtures").unwrap();
    if !fixtures_path.exists() {
        fixtures_path = PathBuf::from_str("checker/tests/fixtures").unwrap();
    }
    fixtures_path
}

// Returns the engine output recorded for a fixture, i.e. name.results.json or name.results.jsonl.
fn results_path(fixture: &Path) -> PathBuf {
    let json = fixture.with_extension("results.json");
    if json.exists() {
        json
    } else {
        fixture.with_extension("results.jsonl")
    }
}

// Iterates through the fixtures in the directory at the given path and grades each one
// against its recorded engine output. Returns the number of fixtures that did not pass.
fn run_directory(directory_path: PathBuf) -> usize {
    let fixtures = driver::collect_fixtures(&[directory_path], &["cpp".to_string()])
        .expect("failed to read fixtures dir");
    assert!(!fixtures.is_empty());
    fixtures
        .into_iter()
        .map(|fixture| {
            let batch = check(&fixture);
            let mut text = Vec::new();
            batch
                .write(&mut text, Default::default())
                .expect("failed to write report");
            println!("{}", String::from_utf8_lossy(&text));
            usize::from(batch.exit_code() != EXIT_PASS)
        })
        .sum()
}

fn check(fixture: &Path) -> BatchReport {
    let actual = load_actual_verdicts(&results_path(fixture)).expect("failed to load results");
    driver::check_batch(
        &FixtureOptions::default(),
        &[fixture.to_path_buf()],
        actual,
    )
}

#[test]
fn taint_fixture_counts() {
    let batch = check(&fixtures_path().join("taint.cpp"));
    assert!(batch.failures.is_empty());
    assert!(batch.unclaimed.is_empty());
    assert_eq!(
        batch.totals(),
        OutcomeCounts {
            matches: 29,
            mismatches: 0,
            known_gaps: 16,
            known_over_approximations: 1,
            improvements: 0,
        }
    );
    let report = &batch.reports[0];
    assert!(report.overall_pass());
    assert!(report.unmatched.is_empty());
    // Two verdicts on the line after strcat; one of them is tainted.
    let buffer = report
        .results
        .iter()
        .find(|r| r.expected.location.line == 173)
        .unwrap();
    assert_eq!(buffer.actual, Some(true));
    assert_eq!(buffer.expected.expression, "buffer");
    // The declaration of the sink itself is not a call.
    assert!(report.results.iter().all(|r| r.expected.location.line != 2));
}

#[test]
fn multiline_fixture_uses_its_own_flags() {
    let batch = check(&fixtures_path().join("multiline.cpp"));
    assert!(batch.failures.is_empty(), "{:?}", batch.failures);
    let report = &batch.reports[0];
    let lines: Vec<usize> = report
        .results
        .iter()
        .map(|r| r.expected.location.line)
        .collect();
    assert_eq!(lines, vec![7, 9, 12, 13, 14]);
    let expressions: Vec<&str> = report
        .results
        .iter()
        .map(|r| r.expected.expression.as_str())
        .collect();
    assert_eq!(
        expressions,
        vec![
            "t, \"first\"",
            "a, \"http://example.com\"",
            "a + 1, \"a // b\"",
            "t * 2, \"nested (paren)\"",
            "t - 1, \"last\"",
        ]
    );
    assert_eq!(report.counts.known_gaps, 1);
    assert_eq!(report.counts.matches, 4);
    // Absolute paths reported by the engine are matched to the fixture.
    assert!(batch.unclaimed.is_empty());
}

#[test]
fn driver_reports_mismatches_and_failures() {
    let dir = tempfile::tempdir().unwrap();
    fs::write(
        dir.path().join("good.cpp"),
        "void f(int x) {\n  sink(x); // tainted\n}\n",
    )
    .unwrap();
    fs::write(
        dir.path().join("bad.cpp"),
        "void g(int y) {\n  sink(y); // tainted [FALSE POSITIVE]\n}\n",
    )
    .unwrap();
    fs::write(dir.path().join("notes.txt"), "sink(z); // nonsense\n").unwrap();
    let results = dir.path().join("results.json");
    fs::write(&results, "[]").unwrap();

    let options = Options::parse_from_str(&format!(
        "--results {} --format jsonl {}",
        results.display(),
        dir.path().display()
    ))
    .unwrap();
    let mut out = Vec::new();
    let code = driver::run(&options, &mut out).unwrap();
    let out = String::from_utf8(out).unwrap();
    // good.cpp expects taint the engine did not report.
    assert_eq!(code, EXIT_MISMATCH);
    assert!(out.contains("\"outcome\":\"mismatch\""));
    assert!(out.contains("\"record\":\"failure\""));
    assert!(out.contains("bad.cpp"));
    assert!(!out.contains("notes.txt"));
}

#[test]
fn driver_exit_code_for_failures_only() {
    let dir = tempfile::tempdir().unwrap();
    let fixture = dir.path().join("broken.cpp");
    fs::write(&fixture, "sink(a); // maybe\n").unwrap();
    let results = dir.path().join("results.jsonl");
    fs::write(&results, "").unwrap();
    let options = Options::parse_from_str(&format!(
        "-r {} {}",
        results.display(),
        fixture.display()
    ))
    .unwrap();
    let mut out = Vec::new();
    assert_eq!(driver::run(&options, &mut out).unwrap(), EXIT_ERROR);
    let out = String::from_utf8(out).unwrap();
    assert!(out.contains("ERROR"));
    assert!(out.contains("unexpected text `maybe`"));
}

#[test]
fn emit_expected_lists_directives() {
    let options = Options::parse_from_str(&format!(
        "--emit-expected --format jsonl {}",
        fixtures_path().join("multiline.cpp").display()
    ))
    .unwrap();
    let mut out = Vec::new();
    assert_eq!(driver::run(&options, &mut out).unwrap(), EXIT_PASS);
    let out = String::from_utf8(out).unwrap();
    assert_eq!(out.lines().count(), 5);
    assert!(out.contains("\"label\":\"tainted_not_detected\""));
}

#[test]
fn unreadable_results_are_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let results = dir.path().join("results.jsonl");
    fs::write(&results, "{\"file\": \"a.cpp\", \"line\": 1}\n{\"file\": \n").unwrap();
    let options = Options::parse_from_str(&format!(
        "-r {} {}",
        results.display(),
        fixtures_path().join("taint.cpp").display()
    ))
    .unwrap();
    let mut out = Vec::new();
    let error = driver::run(&options, &mut out).unwrap_err();
    assert!(error.to_string().contains("at line 2"));
}

#[test]
fn binary_exit_codes() {
    let fixtures = fixtures_path();
    let status = Command::new(env!("CARGO_BIN_EXE_sinkcheck"))
        .arg("--results")
        .arg(fixtures.join("taint.results.json"))
        .arg(fixtures.join("taint.cpp"))
        .env("SINKCHECK_LOG", "off")
        .status()
        .expect("failed to run sinkcheck");
    assert_eq!(status.code(), Some(EXIT_PASS));

    // Every tainted line now mismatches.
    let dir = tempfile::tempdir().unwrap();
    let empty = dir.path().join("empty.json");
    fs::write(&empty, "[]").unwrap();
    let status = Command::new(env!("CARGO_BIN_EXE_sinkcheck"))
        .arg("--results")
        .arg(&empty)
        .arg(fixtures.join("taint.cpp"))
        .env("SINKCHECK_LOG", "off")
        .status()
        .expect("failed to run sinkcheck");
    assert_eq!(status.code(), Some(EXIT_MISMATCH));
}
