// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use crate::errors::Error;
use crate::expected_verdicts::{Extractor, Label};
use crate::report::OutputFormat;
use crate::source_scanner::LineScanner;

use clap::{value_parser, Arg, ArgAction, ArgMatches, Command};
use lazy_static::lazy_static;
use log_derive::logfn_inputs;
use mirai_annotations::assume_unreachable;
use regex::Regex;
use std::path::PathBuf;

/// The name of the environment variable, and of the fixture comment, that supply extra flags.
pub const FLAGS_VARIABLE: &str = "SINKCHECK_FLAGS";

/// File extensions of fixtures found by walking a directory.
pub const DEFAULT_EXTENSIONS: &[&str] = &["c", "cc", "cpp", "cxx", "h", "hh", "hpp"];

lazy_static! {
    static ref FIXTURE_FLAGS: Regex =
        Regex::new(r"^[ \t]*SINKCHECK_FLAGS(?:[ \t]+(?P<flags>.*))?$").unwrap();
}

fn sink_arg() -> Arg {
    Arg::new("sink")
        .long("sink")
        .value_name("IDENT")
        .help("Name of the sink function whose calls carry directives.")
}

fn default_label_arg() -> Arg {
    Arg::new("default_label")
        .long("default-label")
        .value_parser(["clean", "tainted", "none"])
        .help("Label of sink calls without a directive comment.")
        .long_help("With `none`, a sink call without a directive comment is a parse error.")
}

/// Creates the clap::Command metadata for command line parsing.
fn make_options_parser() -> Command {
    Command::new("sinkcheck")
        .version(env!("CARGO_PKG_VERSION"))
        .about("Checks taint-analysis engine verdicts against directive comments in fixtures.")
        .arg(sink_arg().default_value("sink"))
        .arg(default_label_arg().default_value("clean"))
        .arg(Arg::new("results")
            .long("results")
            .short('r')
            .value_name("PATH")
            .value_parser(value_parser!(PathBuf))
            .required_unless_present("emit_expected")
            .help("Verdicts of the engine under test, as a JSON array or JSON Lines.")
            .long_help("Each verdict has a `file`, a `line`, an optional `expression` and an optional `tainted` flag that defaults to true."))
        .arg(Arg::new("format")
            .long("format")
            .value_parser(["text", "json", "jsonl"])
            .default_value("text")
            .help("Output format of the report."))
        .arg(Arg::new("extension")
            .long("ext")
            .value_name("EXT")
            .action(ArgAction::Append)
            .help("Extension of fixture files to pick up from directories. May be repeated."))
        .arg(Arg::new("emit_expected")
            .long("emit-expected")
            .action(ArgAction::SetTrue)
            .help("Only print the expected verdicts of the fixtures."))
        .arg(Arg::new("inputs")
            .value_name("PATH")
            .num_args(1..)
            .required(true)
            .value_parser(value_parser!(PathBuf))
            .help("Fixture files, or directories to search for fixtures."))
}

/// Creates the parser for the flags a fixture may set for itself.
fn make_fixture_flags_parser() -> Command {
    Command::new(FLAGS_VARIABLE)
        .no_binary_name(true)
        .disable_help_flag(true)
        .arg(sink_arg())
        .arg(default_label_arg())
}

/// Finds the first line of `text` that consists of a `// SINKCHECK_FLAGS ...` comment and
/// returns the text of its flags. Lines inside block comments do not count.
fn fixture_flags(text: &str) -> Option<&str> {
    let mut scanner = LineScanner::new();
    text.lines().find_map(|line| {
        let scanned = scanner.scan(line);
        if !scanned.code.trim().is_empty() {
            return None;
        }
        let captures = FIXTURE_FLAGS.captures(scanned.comment?)?;
        Some(captures.name("flags").map_or("", |m| m.as_str()))
    })
}

/// The options that decide how directives are read. A fixture may override them.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FixtureOptions {
    pub sink: String,
    pub default_label: Option<Label>,
}

impl Default for FixtureOptions {
    fn default() -> Self {
        FixtureOptions {
            sink: String::from("sink"),
            default_label: Some(Label::Clean),
        }
    }
}

impl FixtureOptions {
    /// Returns these options, overridden by any `// SINKCHECK_FLAGS ...` line in `text`.
    #[logfn_inputs(TRACE)]
    pub fn for_fixture(&self, text: &str) -> Result<FixtureOptions, Error> {
        let mut options = self.clone();
        if let Some(flags) = fixture_flags(text) {
            let flags = shellwords::split(flags).map_err(|e| {
                Error::Options(format!("cannot split {FLAGS_VARIABLE}: {e:?}"))
            })?;
            let matches = make_fixture_flags_parser().try_get_matches_from(flags)?;
            options.apply(&matches);
        }
        Ok(options)
    }

    pub fn extractor(&self) -> Result<Extractor, Error> {
        Extractor::new(&self.sink, self.default_label)
    }

    fn apply(&mut self, matches: &ArgMatches) {
        if let Some(sink) = matches.get_one::<String>("sink") {
            self.sink = sink.clone();
        }
        if let Some(label) = matches.get_one::<String>("default_label") {
            self.default_label = match label.as_str() {
                "clean" => Some(Label::Clean),
                "tainted" => Some(Label::Tainted),
                "none" => None,
                _ => assume_unreachable!(),
            };
        }
    }
}

/// Represents the options of a sinkcheck run.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub fixture: FixtureOptions,
    pub results: Option<PathBuf>,
    pub format: OutputFormat,
    pub extensions: Vec<String>,
    pub emit_expected: bool,
    pub inputs: Vec<PathBuf>,
}

impl Options {
    /// Parses options from an argument string, split using unix shell escaping rules.
    /// The string does not include a binary name.
    pub fn parse_from_str(s: &str) -> Result<Options, Error> {
        let mut args = vec![String::from("sinkcheck")];
        args.extend(
            shellwords::split(s)
                .map_err(|e| Error::Options(format!("cannot parse argument string: {e:?}")))?,
        );
        Ok(Options::parse(&args)?)
    }

    /// Parses options from a list of strings, the first of which is the binary name.
    pub fn parse(args: &[String]) -> Result<Options, clap::Error> {
        let matches = make_options_parser().try_get_matches_from(args.iter())?;
        let mut fixture = FixtureOptions::default();
        fixture.apply(&matches);
        let format = match matches.get_one::<String>("format").map(String::as_str) {
            Some("json") => OutputFormat::Json,
            Some("jsonl") => OutputFormat::JsonLines,
            Some("text") | None => OutputFormat::Text,
            Some(_) => assume_unreachable!(),
        };
        let extensions = match matches.get_many::<String>("extension") {
            Some(values) => values.cloned().collect(),
            None => DEFAULT_EXTENSIONS.iter().map(|e| e.to_string()).collect(),
        };
        Ok(Options {
            fixture,
            results: matches.get_one::<PathBuf>("results").cloned(),
            format,
            extensions,
            emit_expected: matches.get_flag("emit_expected"),
            inputs: matches
                .get_many::<PathBuf>("inputs")
                .map(|paths| paths.cloned().collect())
                .unwrap_or_default(),
        })
    }

    /// Inserts the arguments held by the SINKCHECK_FLAGS environment variable, if any,
    /// right after the binary name.
    pub fn with_environment_flags(mut args: Vec<String>) -> Result<Vec<String>, Error> {
        if let Ok(flags) = std::env::var(FLAGS_VARIABLE) {
            let extra = shellwords::split(&flags).map_err(|e| {
                Error::Options(format!("cannot split {FLAGS_VARIABLE}: {e:?}"))
            })?;
            let rest = args.split_off(args.len().min(1));
            args.extend(extra);
            args.extend(rest);
        }
        Ok(args)
    }
}
