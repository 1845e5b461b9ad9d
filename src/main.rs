//! costlens command-line entry point.

use std::io::{self, Write};
use std::process::ExitCode;

use clap::Parser;
use costlens::cli::{Cli, execute};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

fn init_tracing(verbose: bool) {
    let default = if verbose { "costlens=debug" } else { "costlens=warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr).with_target(false))
        .with(filter)
        .init();
}

fn main() -> anyhow::Result<ExitCode> {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    match execute(&cli) {
        Ok(output) => {
            io::stdout().write_all(output.as_bytes())?;
            Ok(ExitCode::SUCCESS)
        }
        Err(e) => {
            writeln!(io::stderr(), "Error: {e}")?;
            Ok(ExitCode::FAILURE)
        }
    }
}
