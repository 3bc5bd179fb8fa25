// Copyright (c) Facebook, Inc. and its affiliates.
//
// This source code is licensed under the MIT license found in the
// LICENSE file in the root directory of this source tree.

use sinkcheck::driver;
use sinkcheck::options::Options;
use sinkcheck::report::EXIT_ERROR;
use std::env;
use std::io::{self, Write};

fn main() {
    // Initialize loggers.
    let e = env_logger::Env::new()
        .filter_or("SINKCHECK_LOG", "warn")
        .write_style("SINKCHECK_LOG_STYLE");
    env_logger::init_from_env(e);

    let command_line_arguments = match Options::with_environment_flags(env::args().collect()) {
        Ok(args) => args,
        Err(e) => {
            eprintln!("sinkcheck: {e}");
            std::process::exit(EXIT_ERROR);
        }
    };
    let options = Options::parse(&command_line_arguments).unwrap_or_else(|e| e.exit());

    let stdout = io::stdout();
    let mut out = stdout.lock();
    let exit_code = driver::run(&options, &mut out).unwrap_or_else(|e| {
        eprintln!("sinkcheck: {e}");
        EXIT_ERROR
    });
    if let Err(e) = out.flush() {
        eprintln!("sinkcheck: {e}");
    }
    std::process::exit(exit_code);
}
