//! Command-line interface.
//!
//! Exit codes: 0 on success, 1 for any diagnostic or unhandled runtime
//! exception, 2 for usage errors.

use std::path::PathBuf;

use clap::error::ErrorKind;
use clap::Parser;

use crate::compile::{compile_file, Options};

#[derive(Parser)]
#[command(name = "augusta")]
#[command(about = "Ada 83 front-end and interpreter", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Add an include path for `with`-clause resolution (repeatable)
    #[arg(short = 'I', value_name = "PATH")]
    pub include: Vec<PathBuf>,

    /// Interpret the program instead of emitting IR
    #[arg(short = 'i', long = "interpret")]
    pub interpret: bool,

    /// Report each compilation phase on stderr
    #[arg(short = 'v', long = "verbose")]
    pub verbose: bool,

    /// The source file to compile
    pub source: PathBuf,

    /// Arguments handed to the interpreted program
    #[arg(trailing_var_arg = true)]
    pub args: Vec<String>,
}

/// Entry point for the binary. Returns the process exit code.
pub fn run_cli() -> i32 {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) => {
            let code = match e.kind() {
                ErrorKind::DisplayHelp | ErrorKind::DisplayVersion => 0,
                _ => 2,
            };
            let _ = e.print();
            return code;
        }
    };

    let mut include_paths = vec![PathBuf::from(".")];
    include_paths.extend(cli.include);
    let opts = Options {
        include_paths,
        interpret: cli.interpret,
        verbose: cli.verbose,
    };

    match compile_file(&cli.source, &opts) {
        Ok(()) => 0,
        Err(e) => {
            eprintln!("{}", e);
            1
        }
    }
}
