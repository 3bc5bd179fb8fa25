// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::{DirectiveError, Error, ParseError, ParseErrorKind};
use crate::location::Location;
use crate::source_scanner::{find_closing_paren, is_outside_literals, LineScanner, ScannedLine};

use itertools::Itertools;
use lazy_static::lazy_static;
use log_derive::{logfn, logfn_inputs};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

/// What a fixture says the engine should report for a sink call.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Label {
    /// The value reaching the sink is clean and the engine should not flag it.
    Clean,
    /// The value reaching the sink is tainted and the engine should flag it.
    Tainted,
    /// The value is tainted, but the engine is known to miss it.
    TaintedNotDetected,
    /// The value is clean, but the engine is known to flag it anyway.
    FalsePositive,
}

impl Display for Label {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Label::Clean => "clean",
            Label::Tainted => "tainted",
            Label::TaintedNotDetected => "tainted [NOT DETECTED]",
            Label::FalsePositive => "[FALSE POSITIVE]",
        })
    }
}

/// The verdict a fixture expects for one sink call.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExpectedVerdict {
    #[serde(flatten)]
    pub location: Location,
    /// The argument text of the sink call.
    pub expression: String,
    pub label: Label,
}

lazy_static! {
    static ref IDENTIFIER: Regex = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$").unwrap();
    static ref DECLARATOR_PREFIX: Regex =
        Regex::new(r"^\s*(?:[A-Za-z_][\w:<>,]*\s*[*&\s]*)+$").unwrap();
}

/// Words that may directly precede a call in statement position.
const STATEMENT_KEYWORDS: &[&str] = &[
    "return",
    "else",
    "case",
    "do",
    "throw",
    "co_return",
    "co_yield",
];

/// Finds calls to the sink function and turns their directive comments into expected verdicts.
#[derive(Debug)]
pub struct Extractor {
    sink: String,
    call_pattern: Regex,
    default_label: Option<Label>,
}

impl Extractor {
    /// Creates an extractor for calls to `sink`. Calls without a directive comment get
    /// `default_label`, or are rejected if there is no default.
    #[logfn_inputs(TRACE)]
    pub fn new(sink: &str, default_label: Option<Label>) -> Result<Extractor, Error> {
        if !IDENTIFIER.is_match(sink) {
            return Err(Error::Options(format!(
                "sink name `{sink}` is not a valid identifier"
            )));
        }
        let call_pattern = Regex::new(&format!(r"\b{}\s*\(", regex::escape(sink)))
            .map_err(|e| Error::Options(e.to_string()))?;
        Ok(Extractor {
            sink: sink.to_owned(),
            call_pattern,
            default_label,
        })
    }

    pub fn sink(&self) -> &str {
        &self.sink
    }

    pub fn default_label(&self) -> Option<Label> {
        self.default_label
    }

    /// Lazily scans `text` for sink calls. Every call to this method starts a fresh scan,
    /// so the same text always yields the same sequence.
    pub fn verdicts<'a>(&'a self, file: &'a str, text: &'a str) -> Verdicts<'a> {
        Verdicts {
            extractor: self,
            file,
            lines: text.lines().collect(),
            next_line: 0,
            scanner: LineScanner::new(),
        }
    }

    /// Collects all expected verdicts of `text`, stopping at the first malformed directive.
    #[logfn(TRACE)]
    pub fn extract(&self, file: &str, text: &str) -> Result<Vec<ExpectedVerdict>, ParseError> {
        self.verdicts(file, text)
            .collect::<Result<Vec<_>, _>>()
    }

    /// Returns, for every sink call in `code`, the byte offset just past its opening parenthesis.
    fn call_sites(&self, code: &str) -> Vec<usize> {
        self.call_pattern
            .find_iter(code)
            .filter(|m| is_outside_literals(code, m.start()))
            .filter(|m| is_call_context(&code[..m.start()]))
            .map(|m| m.end())
            .collect()
    }

    fn label_for(&self, comments: &[&str], location: &Location) -> Result<Label, ParseError> {
        let error = |kind: ParseErrorKind| ParseError::new(location.clone(), kind);
        match comments {
            [] => self
                .default_label
                .ok_or_else(|| error(ParseErrorKind::MissingDirective)),
            [comment] => match parse_directive(comment) {
                Ok(Some(label)) => Ok(label),
                Ok(None) => self
                    .default_label
                    .ok_or_else(|| error(ParseErrorKind::MissingDirective)),
                Err(e) => Err(error(ParseErrorKind::Directive(e))),
            },
            _ => Err(error(ParseErrorKind::AmbiguousDirective)),
        }
    }
}

/// Decides if an occurrence of the sink name preceded by `before` is a call rather than
/// a declaration or definition of the sink, such as `void sink(...) {}` or
/// `std::vector<int> sink(int x);`.
fn is_call_context(before: &str) -> bool {
    let before = before.trim_end();
    match before.chars().last() {
        Some(c) if c.is_alphanumeric() || c == '_' => {
            let word = before
                .rsplit(|c: char| !(c.is_alphanumeric() || c == '_'))
                .next()
                .unwrap_or_default();
            STATEMENT_KEYWORDS.contains(&word)
        }
        Some('*') | Some('&') | Some('>') => {
            let first_word = before.split_whitespace().next().unwrap_or_default();
            !DECLARATOR_PREFIX.is_match(before) || STATEMENT_KEYWORDS.contains(&first_word)
        }
        _ => true,
    }
}

/// Parses the text of a directive comment. Returns Ok(None) for an empty comment.
#[logfn_inputs(TRACE)]
pub fn parse_directive(comment: &str) -> Result<Option<Label>, DirectiveError> {
    #[derive(PartialEq)]
    enum Marker {
        NotDetected,
        FalsePositive,
    }

    let mut rest = comment.trim();
    if rest.is_empty() {
        return Ok(None);
    }
    let mut ground: Option<bool> = None;
    let mut markers = Vec::new();
    while !rest.is_empty() {
        if let Some(tail) = rest.strip_prefix('[') {
            let close = tail.find(']').ok_or(DirectiveError::UnclosedMarker)?;
            match &tail[..close] {
                "NOT DETECTED" => markers.push(Marker::NotDetected),
                "FALSE POSITIVE" => markers.push(Marker::FalsePositive),
                other => return Err(DirectiveError::UnknownMarker(other.to_owned())),
            }
            rest = tail[close + 1..].trim_start();
            continue;
        }
        let end = rest
            .find(|c: char| c.is_whitespace() || c == '[')
            .unwrap_or(rest.len());
        let word = &rest[..end];
        match (word, ground, markers.is_empty()) {
            ("tainted", None, true) => ground = Some(true),
            ("clean", None, true) => ground = Some(false),
            _ => return Err(DirectiveError::UnknownWord(word.to_owned())),
        }
        rest = rest[end..].trim_start();
    }
    if markers.len() > 1 {
        return Err(DirectiveError::ConflictingMarkers);
    }
    let label = match (ground, markers.pop()) {
        (Some(true), None) => Label::Tainted,
        (Some(false), None) => Label::Clean,
        (Some(true), Some(Marker::NotDetected)) => Label::TaintedNotDetected,
        (Some(false) | None, Some(Marker::FalsePositive)) => Label::FalsePositive,
        (Some(false) | None, Some(Marker::NotDetected)) => {
            return Err(DirectiveError::NotDetectedWithoutTaint)
        }
        (Some(true), Some(Marker::FalsePositive)) => {
            return Err(DirectiveError::FalsePositiveOnTaint)
        }
        (None, None) => return Ok(None),
    };
    Ok(Some(label))
}

/// A lazy scan over the lines of a fixture, yielding one expected verdict per sink call.
pub struct Verdicts<'a> {
    extractor: &'a Extractor,
    file: &'a str,
    lines: Vec<&'a str>,
    next_line: usize,
    scanner: LineScanner,
}

impl<'a> Verdicts<'a> {
    fn location(&self, index: usize) -> Location {
        Location::new(self.file, index + 1)
    }

    /// Reads the arguments of the call whose opening parenthesis ends at `open` on line
    /// `start`, following the call onto later lines until its parentheses balance.
    /// Another sink call anywhere on those later lines is an error.
    fn read_call(
        &mut self,
        start: usize,
        first: ScannedLine<'a>,
        open: usize,
    ) -> Result<ExpectedVerdict, ParseError> {
        let location = self.location(start);
        let mut depth = 1;
        let mut pieces: Vec<String> = Vec::new();
        let mut comments: Vec<&'a str> = Vec::new();
        let mut code = first.code;
        let mut from = open;
        comments.extend(first.comment);
        loop {
            if let Some(close) = find_closing_paren(&code[from..], &mut depth) {
                pieces.push(code[from..from + close].trim().to_owned());
                break;
            }
            pieces.push(code[from..].trim().to_owned());
            if self.next_line >= self.lines.len() {
                return Err(ParseError::new(location, ParseErrorKind::UnterminatedCall));
            }
            let index = self.next_line;
            let scanned = self.scanner.scan(self.lines[index]);
            self.next_line += 1;
            if !self.extractor.call_sites(&scanned.code).is_empty() {
                return Err(ParseError::new(
                    self.location(index),
                    ParseErrorKind::NestedCall,
                ));
            }
            comments.extend(scanned.comment);
            code = scanned.code;
            from = 0;
        }
        let comments = comments
            .into_iter()
            .filter(|c| !c.trim().is_empty())
            .collect_vec();
        let label = self.extractor.label_for(&comments, &location)?;
        let expression = pieces.iter().filter(|p| !p.is_empty()).join(" ");
        debug!("{}: {}({}) expects {}", location, self.extractor.sink, expression, label);
        Ok(ExpectedVerdict {
            location,
            expression,
            label,
        })
    }
}

impl<'a> Iterator for Verdicts<'a> {
    type Item = Result<ExpectedVerdict, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        while self.next_line < self.lines.len() {
            let index = self.next_line;
            self.next_line += 1;
            let scanned = self.scanner.scan(self.lines[index]);
            let sites = self.extractor.call_sites(&scanned.code);
            match sites.as_slice() {
                [] => continue,
                [open] => return Some(self.read_call(index, scanned, *open)),
                _ => {
                    return Some(Err(ParseError::new(
                        self.location(index),
                        ParseErrorKind::DuplicateSite,
                    )))
                }
            }
        }
        None
    }
}
