//! `entsync` applies a table of entitlement changes to one messaging network
//! and writes a per-row results report plus a roster snapshot.
//!
//! The final summary line goes to stdout; everything else is logged.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::process::ExitCode;

use clap::Parser;
use tracing::{debug, error};

mod args;
mod logging;
mod run;

use args::Args;

fn main() -> ExitCode {
    let args = Args::parse();
    let dotenv = dotenvy::dotenv();
    logging::init(args.log_format);
    if let Ok(path) = &dotenv {
        debug!(path = %path.display(), "loaded .env");
    }

    match run::run(&args) {
        Ok(summary) => {
            println!("{summary}");
            ExitCode::SUCCESS
        }
        Err(err) => {
            error!(error = ?err, "run failed");
            eprintln!("entsync failed: {err:#}");
            ExitCode::from(run::exit_code(&err))
        }
    }
}
