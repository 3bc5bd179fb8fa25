// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::location::Location;

use std::io;
use std::path::PathBuf;
use thiserror::Error;

/// Everything that can stop the checker from producing a report for a fixture,
/// or from running at all.
#[derive(Debug, Error)]
pub enum Error {
    #[error("cannot read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("cannot walk {}: {source}", .path.display())]
    Walk {
        path: PathBuf,
        #[source]
        source: walkdir::Error,
    },

    #[error("malformed engine results in {}{}: {source}", .path.display(), .line.map_or_else(String::new, |l| format!(" at line {l}")))]
    Results {
        path: PathBuf,
        line: Option<usize>,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("invalid flags: {0}")]
    Flags(#[from] clap::Error),

    #[error("{0}")]
    Options(String),

    #[error("cannot write report: {0}")]
    Output(#[source] io::Error),
}

/// A sink call whose directive comment cannot be turned into an expected verdict.
/// Fatal for the fixture it occurs in, but not for the batch.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("{location}: {kind}")]
pub struct ParseError {
    pub location: Location,
    pub kind: ParseErrorKind,
}

impl ParseError {
    pub fn new(location: Location, kind: ParseErrorKind) -> ParseError {
        ParseError { location, kind }
    }
}

#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ParseErrorKind {
    #[error("sink call has no directive comment and no default label is configured")]
    MissingDirective,

    #[error("malformed directive: {0}")]
    Directive(#[from] DirectiveError),

    #[error("more than one line of a multi-line sink call carries a comment")]
    AmbiguousDirective,

    #[error("more than one sink call starts on this line")]
    DuplicateSite,

    #[error("another sink call appears on a continuation line of a multi-line sink call")]
    NestedCall,

    #[error("sink call is not closed before the end of the file")]
    UnterminatedCall,
}

/// Violations of the directive grammar `("clean" | "tainted")? marker*`.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum DirectiveError {
    #[error("unexpected text `{0}`")]
    UnknownWord(String),

    #[error("unknown marker `[{0}]`")]
    UnknownMarker(String),

    #[error("marker is missing its closing `]`")]
    UnclosedMarker,

    #[error("at most one of [NOT DETECTED] and [FALSE POSITIVE] may be given")]
    ConflictingMarkers,

    #[error("[NOT DETECTED] only applies to tainted values")]
    NotDetectedWithoutTaint,

    #[error("[FALSE POSITIVE] only applies to clean values")]
    FalsePositiveOnTaint,
}
