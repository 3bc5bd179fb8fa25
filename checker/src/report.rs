// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::actual_verdicts::ActualVerdict;
use crate::comparator::{Comparison, ComparisonResult, Outcome};
use crate::errors::Error;
use crate::expected_verdicts::{ExpectedVerdict, Label};

use mirai_annotations::verify;
use serde::Serialize;
use std::io::Write;

/// Process exit code when no fixture has a mismatch or failed to load.
pub const EXIT_PASS: i32 = 0;
/// Process exit code when at least one sink call was graded a mismatch.
pub const EXIT_MISMATCH: i32 = 1;
/// Process exit code when nothing mismatched, but some input could not be processed.
pub const EXIT_ERROR: i32 = 2;

/// How reports are written.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum OutputFormat {
    /// One human readable line per sink call, followed by a summary.
    #[default]
    Text,
    /// A single JSON document.
    Json,
    /// One JSON record per line.
    JsonLines,
}

/// Number of sink calls per outcome.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct OutcomeCounts {
    pub matches: usize,
    pub mismatches: usize,
    pub known_gaps: usize,
    pub known_over_approximations: usize,
    pub improvements: usize,
}

impl OutcomeCounts {
    pub fn record(&mut self, outcome: Outcome) {
        match outcome {
            Outcome::Match => self.matches += 1,
            Outcome::Mismatch => self.mismatches += 1,
            Outcome::KnownGap => self.known_gaps += 1,
            Outcome::KnownOverApprox => self.known_over_approximations += 1,
            Outcome::Improvement => self.improvements += 1,
        }
    }

    pub fn add(&mut self, other: &OutcomeCounts) {
        self.matches += other.matches;
        self.mismatches += other.mismatches;
        self.known_gaps += other.known_gaps;
        self.known_over_approximations += other.known_over_approximations;
        self.improvements += other.improvements;
    }

    pub fn total(&self) -> usize {
        self.matches
            + self.mismatches
            + self.known_gaps
            + self.known_over_approximations
            + self.improvements
    }

    pub fn passed(&self) -> bool {
        self.mismatches == 0
    }
}

impl std::fmt::Display for OutcomeCounts {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} sink calls: {} ok, {} mismatched, {} known gaps, {} known over-approximations, {} improvements",
            self.total(),
            self.matches,
            self.mismatches,
            self.known_gaps,
            self.known_over_approximations,
            self.improvements
        )
    }
}

/// The graded sink calls of one fixture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct Report {
    pub file: String,
    pub counts: OutcomeCounts,
    pub passed: bool,
    pub results: Vec<ComparisonResult>,
    /// Engine verdicts for lines of this fixture that have no sink call directive.
    pub unmatched: Vec<ActualVerdict>,
}

impl Report {
    pub fn new(file: impl Into<String>, comparison: Comparison) -> Report {
        let file = file.into();
        let mut counts = OutcomeCounts::default();
        for result in &comparison.results {
            counts.record(result.outcome);
            if result.outcome == Outcome::Improvement {
                warn!(
                    "{}: engine now gets `{}` right; the fixture directive `{}` is stale",
                    result.expected.location, result.expected.expression, result.expected.label
                );
            }
        }
        for verdict in &comparison.unmatched {
            warn!(
                "{}: engine reported `{}` where the fixture has no sink call directive",
                verdict.location, verdict.expression
            );
        }
        verify!(counts.total() == comparison.results.len());
        Report {
            file,
            passed: counts.passed(),
            counts,
            results: comparison.results,
            unmatched: comparison.unmatched,
        }
    }

    pub fn overall_pass(&self) -> bool {
        self.passed
    }

    pub fn improvements(&self) -> impl Iterator<Item = &ComparisonResult> {
        self.results
            .iter()
            .filter(|r| r.outcome == Outcome::Improvement)
    }
}

/// A fixture that could not be graded, for example because of a malformed directive.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FixtureFailure {
    pub file: String,
    pub error: String,
}

/// The combined reports of all fixtures of a run.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct BatchReport {
    pub reports: Vec<Report>,
    pub failures: Vec<FixtureFailure>,
    /// Engine verdicts for files that are not among the fixtures.
    pub unclaimed: Vec<ActualVerdict>,
}

#[derive(Serialize)]
#[serde(tag = "record", rename_all = "snake_case")]
enum Record<'a> {
    Result {
        file: &'a str,
        line: usize,
        expression: &'a str,
        expected: Label,
        actual: Option<bool>,
        outcome: Outcome,
    },
    /// An engine verdict with no sink call to grade it against. `fixture` is None when the
    /// reported file matched no fixture at all.
    Unmatched {
        file: &'a str,
        line: usize,
        expression: &'a str,
        tainted: bool,
        fixture: Option<&'a str>,
    },
    Failure {
        file: &'a str,
        error: &'a str,
    },
    Summary {
        fixtures: usize,
        failures: usize,
        counts: OutcomeCounts,
        passed: bool,
    },
}

impl BatchReport {
    pub fn totals(&self) -> OutcomeCounts {
        let mut totals = OutcomeCounts::default();
        for report in &self.reports {
            totals.add(&report.counts);
        }
        totals
    }

    /// True if no sink call in any fixture mismatched. Fixtures that failed to load do not
    /// make the comparison fail, but they do affect the exit code.
    pub fn overall_pass(&self) -> bool {
        self.reports.iter().all(Report::overall_pass)
    }

    pub fn exit_code(&self) -> i32 {
        if !self.overall_pass() {
            EXIT_MISMATCH
        } else if !self.failures.is_empty() {
            EXIT_ERROR
        } else {
            EXIT_PASS
        }
    }

    pub fn write(&self, out: &mut dyn Write, format: OutputFormat) -> Result<(), Error> {
        match format {
            OutputFormat::Text => self.write_text(out),
            OutputFormat::Json => serde_json::to_writer_pretty(&mut *out, self)
                .map_err(|e| Error::Output(e.into()))
                .and_then(|_| writeln!(out).map_err(Error::Output)),
            OutputFormat::JsonLines => self.write_json_lines(out),
        }
    }

    fn write_text(&self, out: &mut dyn Write) -> Result<(), Error> {
        for report in &self.reports {
            for result in &report.results {
                let actual = match result.actual {
                    Some(true) => "tainted",
                    Some(false) => "clean",
                    None => "nothing",
                };
                writeln!(
                    out,
                    "{}: `{}` expected {}, engine reported {}: {}",
                    result.expected.location,
                    result.expected.expression,
                    result.expected.label,
                    actual,
                    result.outcome
                )
                .map_err(Error::Output)?;
            }
            let verdict = if report.passed { "PASS" } else { "FAIL" };
            writeln!(out, "{}: {}: {}", report.file, report.counts, verdict)
                .map_err(Error::Output)?;
        }
        for failure in &self.failures {
            writeln!(out, "{}: ERROR: {}", failure.file, failure.error).map_err(Error::Output)?;
        }
        let verdict = match self.exit_code() {
            EXIT_PASS => "PASS",
            EXIT_MISMATCH => "FAIL",
            _ => "ERROR",
        };
        writeln!(
            out,
            "{} fixtures, {} failed to load, {}: {}",
            self.reports.len(),
            self.failures.len(),
            self.totals(),
            verdict
        )
        .map_err(Error::Output)
    }

    fn write_json_lines(&self, out: &mut dyn Write) -> Result<(), Error> {
        let results = self.reports.iter().flat_map(|r| &r.results).map(|r| {
            Record::Result {
                file: &r.expected.location.file,
                line: r.expected.location.line,
                expression: &r.expected.expression,
                expected: r.expected.label,
                actual: r.actual,
                outcome: r.outcome,
            }
        });
        let unmatched = self
            .reports
            .iter()
            .flat_map(|r| r.unmatched.iter().map(move |v| (Some(r.file.as_str()), v)))
            .chain(self.unclaimed.iter().map(|v| (None, v)))
            .map(|(fixture, v)| Record::Unmatched {
                file: &v.location.file,
                line: v.location.line,
                expression: &v.expression,
                tainted: v.tainted,
                fixture,
            });
        let failures = self.failures.iter().map(|f| Record::Failure {
            file: &f.file,
            error: &f.error,
        });
        let summary = Record::Summary {
            fixtures: self.reports.len(),
            failures: self.failures.len(),
            counts: self.totals(),
            passed: self.overall_pass(),
        };
        for record in results
            .chain(unmatched)
            .chain(failures)
            .chain(std::iter::once(summary))
        {
            write_json_line(out, &record)?;
        }
        Ok(())
    }
}

/// The expected verdicts of a run in `--emit-expected` mode.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ExpectedListing {
    pub verdicts: Vec<ExpectedVerdict>,
    pub failures: Vec<FixtureFailure>,
}

impl ExpectedListing {
    pub fn exit_code(&self) -> i32 {
        if self.failures.is_empty() {
            EXIT_PASS
        } else {
            EXIT_ERROR
        }
    }

    pub fn write(&self, out: &mut dyn Write, format: OutputFormat) -> Result<(), Error> {
        match format {
            OutputFormat::Text => {
                for verdict in &self.verdicts {
                    writeln!(
                        out,
                        "{}: `{}` {}",
                        verdict.location, verdict.expression, verdict.label
                    )
                    .map_err(Error::Output)?;
                }
                for failure in &self.failures {
                    writeln!(out, "{}: ERROR: {}", failure.file, failure.error)
                        .map_err(Error::Output)?;
                }
                Ok(())
            }
            OutputFormat::Json => serde_json::to_writer_pretty(&mut *out, self)
                .map_err(|e| Error::Output(e.into()))
                .and_then(|_| writeln!(out).map_err(Error::Output)),
            OutputFormat::JsonLines => {
                for verdict in &self.verdicts {
                    write_json_line(out, verdict)?;
                }
                for failure in &self.failures {
                    write_json_line(
                        out,
                        &Record::Failure {
                            file: &failure.file,
                            error: &failure.error,
                        },
                    )?;
                }
                Ok(())
            }
        }
    }
}

fn write_json_line<T: Serialize>(out: &mut dyn Write, value: &T) -> Result<(), Error> {
    serde_json::to_writer(&mut *out, value).map_err(|e| Error::Output(e.into()))?;
    writeln!(out).map_err(Error::Output)
}
