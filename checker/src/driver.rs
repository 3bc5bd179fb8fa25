// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

// Runs the checker over a set of fixtures. Every fixture is graded independently of the
// others, so the fixtures are processed in parallel. A fixture that cannot be read or that
// has a malformed directive is recorded as a failure and does not stop the others.

use crate::actual_verdicts::{load_actual_verdicts, ActualVerdict};
use crate::comparator::compare;
use crate::errors::Error;
use crate::expected_verdicts::ExpectedVerdict;
use crate::location::Location;
use crate::options::{FixtureOptions, Options};
use crate::report::{BatchReport, ExpectedListing, FixtureFailure, Report};
use crate::utils::refers_to_same_file;

use itertools::Itertools;
use log_derive::logfn_inputs;
use rayon::prelude::*;
use std::fs::read_to_string;
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Runs sinkcheck as configured by `options`, writing the report to `out`.
/// Returns the process exit code.
pub fn run(options: &Options, out: &mut dyn Write) -> Result<i32, Error> {
    debug!("{:?}", options);
    let fixtures = collect_fixtures(&options.inputs, &options.extensions)?;
    info!("found {} fixtures", fixtures.len());
    if options.emit_expected {
        let listing = extract_batch(&options.fixture, &fixtures);
        listing.write(out, options.format)?;
        return Ok(listing.exit_code());
    }
    let actual = match &options.results {
        Some(path) => load_actual_verdicts(path)?,
        None => Vec::new(),
    };
    let batch = check_batch(&options.fixture, &fixtures, actual);
    batch.write(out, options.format)?;
    Ok(batch.exit_code())
}

/// Expands `inputs` into a sorted list of fixture files. Files named directly are always
/// included, directories are searched recursively for files with one of `extensions`.
#[logfn_inputs(DEBUG)]
pub fn collect_fixtures(inputs: &[PathBuf], extensions: &[String]) -> Result<Vec<PathBuf>, Error> {
    let mut fixtures = Vec::new();
    for input in inputs {
        if !input.is_dir() {
            fixtures.push(input.clone());
            continue;
        }
        for entry in WalkDir::new(input) {
            let entry = entry.map_err(|source| Error::Walk {
                path: input.clone(),
                source,
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            let wanted = entry
                .path()
                .extension()
                .and_then(|e| e.to_str())
                .map_or(false, |e| extensions.iter().any(|x| x == e));
            if wanted {
                fixtures.push(entry.into_path());
            }
        }
    }
    Ok(fixtures.into_iter().sorted().dedup().collect())
}

/// Grades every fixture against the engine verdicts that refer to it.
pub fn check_batch(
    options: &FixtureOptions,
    fixtures: &[PathBuf],
    actual: Vec<ActualVerdict>,
) -> BatchReport {
    let names = fixtures.iter().map(|f| display_name(f)).collect_vec();
    let mut claimed = vec![false; actual.len()];
    let mut per_fixture: Vec<Vec<ActualVerdict>> = vec![Vec::new(); fixtures.len()];
    for (i, verdict) in actual.iter().enumerate() {
        let reported = &verdict.location.file;
        let fixture = names.iter().position(|name| name == reported).or_else(|| {
            names
                .iter()
                .position(|name| refers_to_same_file(name, reported))
        });
        if let Some(f) = fixture {
            claimed[i] = true;
            per_fixture[f].push(ActualVerdict {
                location: Location::new(names[f].clone(), verdict.location.line),
                ..verdict.clone()
            });
        }
    }
    let unclaimed = actual
        .into_iter()
        .zip(claimed)
        .filter_map(|(verdict, claimed)| if claimed { None } else { Some(verdict) })
        .collect_vec();
    for verdict in &unclaimed {
        warn!(
            "{}: engine reported a verdict for a file that is not a fixture",
            verdict.location
        );
    }

    let outcomes: Vec<Result<Report, Error>> = fixtures
        .par_iter()
        .zip(per_fixture.par_iter())
        .map(|(fixture, actual)| check_fixture(options, fixture, actual))
        .collect();

    let mut batch = BatchReport {
        unclaimed,
        ..BatchReport::default()
    };
    for (name, outcome) in names.into_iter().zip(outcomes) {
        match outcome {
            Ok(report) => batch.reports.push(report),
            Err(e) => {
                error!("{}: {}", name, e);
                batch.failures.push(FixtureFailure {
                    file: name,
                    error: e.to_string(),
                });
            }
        }
    }
    batch
}

/// Grades a single fixture. `actual` holds the engine verdicts for this fixture, keyed by
/// the fixture's display name.
pub fn check_fixture(
    options: &FixtureOptions,
    fixture: &Path,
    actual: &[ActualVerdict],
) -> Result<Report, Error> {
    let name = display_name(fixture);
    let expected = read_expected(options, fixture, &name)?;
    let comparison = compare(&expected, actual);
    let report = Report::new(name, comparison);
    debug!("{}: {}", report.file, report.counts);
    Ok(report)
}

/// Extracts the expected verdicts of all fixtures without grading them.
pub fn extract_batch(options: &FixtureOptions, fixtures: &[PathBuf]) -> ExpectedListing {
    let extracted: Vec<(String, Result<Vec<ExpectedVerdict>, Error>)> = fixtures
        .par_iter()
        .map(|fixture| {
            let name = display_name(fixture);
            let verdicts = read_expected(options, fixture, &name);
            (name, verdicts)
        })
        .collect();
    let mut listing = ExpectedListing::default();
    for (name, verdicts) in extracted {
        match verdicts {
            Ok(verdicts) => listing.verdicts.extend(verdicts),
            Err(e) => {
                error!("{}: {}", name, e);
                listing.failures.push(FixtureFailure {
                    file: name,
                    error: e.to_string(),
                });
            }
        }
    }
    listing
}

fn read_expected(
    options: &FixtureOptions,
    fixture: &Path,
    name: &str,
) -> Result<Vec<ExpectedVerdict>, Error> {
    let text = read_to_string(fixture).map_err(|source| Error::Io {
        path: fixture.to_path_buf(),
        source,
    })?;
    let extractor = options.for_fixture(&text)?.extractor()?;
    Ok(extractor.extract(name, &text)?)
}

fn display_name(path: &Path) -> String {
    path.display().to_string()
}
