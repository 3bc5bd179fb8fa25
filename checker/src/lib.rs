// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.
//
// sinkcheck grades a taint-analysis engine against hand written fixtures. Every call to the
// sink function in a fixture carries a trailing comment saying what the engine is expected
// to report for that call ("tainted", "clean", "tainted [NOT DETECTED]", "[FALSE POSITIVE]").
// The checker never tracks taint itself. It extracts these expectations, lines them up with
// the verdicts the engine actually produced and reports where the two disagree.

#[macro_use]
extern crate log;

pub mod actual_verdicts;
pub mod comparator;
pub mod driver;
pub mod errors;
pub mod expected_verdicts;
pub mod location;
pub mod options;
pub mod report;
pub mod source_scanner;
pub mod utils;
