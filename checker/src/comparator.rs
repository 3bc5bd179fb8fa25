// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::actual_verdicts::ActualVerdict;
use crate::expected_verdicts::{ExpectedVerdict, Label};
use crate::location::Location;

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt::{Display, Formatter, Result};

/// How an engine verdict relates to what the fixture expected.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// The engine reported exactly what the fixture expected.
    Match,
    /// The engine disagrees with the fixture. This is the only outcome that fails a run.
    Mismatch,
    /// The engine missed taint, as the fixture says it is known to.
    KnownGap,
    /// The engine flagged a clean value, as the fixture says it is known to.
    KnownOverApprox,
    /// The engine got right what the fixture says it is known to get wrong.
    /// The directive in the fixture is stale and should be updated.
    Improvement,
}

impl Outcome {
    /// Applies the grading policy to a single sink call.
    pub fn classify(expected: Label, engine_reports_taint: bool) -> Outcome {
        match (expected, engine_reports_taint) {
            (Label::Clean, false) | (Label::Tainted, true) => Outcome::Match,
            (Label::Clean, true) | (Label::Tainted, false) => Outcome::Mismatch,
            (Label::TaintedNotDetected, false) => Outcome::KnownGap,
            (Label::FalsePositive, true) => Outcome::KnownOverApprox,
            (Label::TaintedNotDetected, true) | (Label::FalsePositive, false) => {
                Outcome::Improvement
            }
        }
    }

    pub fn is_failure(self) -> bool {
        self == Outcome::Mismatch
    }
}

impl Display for Outcome {
    fn fmt(&self, f: &mut Formatter<'_>) -> Result {
        f.write_str(match self {
            Outcome::Match => "ok",
            Outcome::Mismatch => "MISMATCH",
            Outcome::KnownGap => "known gap",
            Outcome::KnownOverApprox => "known over-approximation",
            Outcome::Improvement => "IMPROVEMENT",
        })
    }
}

/// The grade of one expected verdict.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct ComparisonResult {
    pub expected: ExpectedVerdict,
    /// Whether the engine reported taint at the call, or None if it reported nothing there.
    pub actual: Option<bool>,
    pub outcome: Outcome,
}

/// The result of lining up a fixture's expectations with the engine's verdicts.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Comparison {
    /// One result per expected verdict, in the order of the expected verdicts.
    pub results: Vec<ComparisonResult>,
    /// Engine verdicts at locations that carry no expectation, in the order they were given.
    pub unmatched: Vec<ActualVerdict>,
}

/// Grades the engine verdicts in `actual` against the expectations in `expected`.
/// Verdicts are matched by location only, so the order of `actual` does not matter.
/// If the engine reports several verdicts for one line, the line counts as tainted if
/// any of them is tainted. A line the engine says nothing about counts as not tainted.
#[logfn_inputs(TRACE)]
pub fn compare(expected: &[ExpectedVerdict], actual: &[ActualVerdict]) -> Comparison {
    let mut reported: BTreeMap<&Location, bool> = BTreeMap::new();
    for verdict in actual {
        *reported.entry(&verdict.location).or_insert(false) |= verdict.tainted;
    }
    let results = expected
        .iter()
        .map(|e| {
            let actual = reported.get(&e.location).copied();
            ComparisonResult {
                expected: e.clone(),
                actual,
                outcome: Outcome::classify(e.label, actual.unwrap_or(false)),
            }
        })
        .collect();
    let expected_sites: BTreeSet<&Location> = expected.iter().map(|e| &e.location).collect();
    let unmatched = actual
        .iter()
        .filter(|a| !expected_sites.contains(&a.location))
        .cloned()
        .collect();
    Comparison { results, unmatched }
}
