// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::Error;
use crate::location::Location;

use log_derive::logfn_inputs;
use serde::{Deserialize, Serialize};
use std::fs::read_to_string;
use std::path::Path;

/// What the engine under test reported for one sink call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActualVerdict {
    #[serde(flatten)]
    pub location: Location,
    #[serde(default)]
    pub expression: String,
    /// Engines that only list their findings may leave this out.
    #[serde(default = "reported_as_tainted", alias = "is_tainted")]
    pub tainted: bool,
}

fn reported_as_tainted() -> bool {
    true
}

impl ActualVerdict {
    pub fn new(location: Location, expression: impl Into<String>, tainted: bool) -> ActualVerdict {
        ActualVerdict {
            location,
            expression: expression.into(),
            tainted,
        }
    }
}

/// Reads the engine output at `path`. See `parse_actual_verdicts` for the accepted formats.
#[logfn_inputs(TRACE)]
pub fn load_actual_verdicts(path: &Path) -> Result<Vec<ActualVerdict>, Error> {
    let text = read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;
    let verdicts = parse_actual_verdicts(&text).map_err(|(line, source)| Error::Results {
        path: path.to_path_buf(),
        line,
        source,
    })?;
    info!(
        "read {} engine verdicts from {}",
        verdicts.len(),
        path.display()
    );
    Ok(verdicts)
}

/// Parses engine output given either as a JSON array of verdicts or as JSON Lines, one
/// verdict per non-blank line. On failure, returns the offending line for JSON Lines input.
pub fn parse_actual_verdicts(
    text: &str,
) -> Result<Vec<ActualVerdict>, (Option<usize>, serde_json::Error)> {
    if text.trim_start().starts_with('[') {
        return serde_json::from_str(text).map_err(|e| (None, e));
    }
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| serde_json::from_str(line).map_err(|e| (Some(i + 1), e)))
        .collect()
}
