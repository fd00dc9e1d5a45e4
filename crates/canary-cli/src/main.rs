use std::process::ExitCode;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt as tracing_fmt, prelude::*, EnvFilter};

mod args;
mod cmd;
mod io;
mod output;

fn main() -> ExitCode {
    let cli = args::Cli::parse();
    output::init(cli.json);

    if let Err(err) = init_tracing(cli.verbose, cli.json) {
        output::report_error(&err);
        return ExitCode::FAILURE;
    }

    match cmd::dispatch(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            output::report_error(&err);
            ExitCode::FAILURE
        }
    }
}

fn init_tracing(verbose: u8, json: bool) -> Result<()> {
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::try_from_default_env()?
    } else {
        let level = match verbose {
            0 => "warn",
            1 => "info",
            2 => "debug",
            _ => "trace",
        };
        EnvFilter::new(format!("warn,canary={level},canary_core={level}"))
    };

    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry
            .with(tracing_fmt::layer().json().with_writer(std::io::stderr))
            .try_init()?;
    } else {
        registry
            .with(tracing_fmt::layer().with_writer(std::io::stderr))
            .try_init()?;
    }

    Ok(())
}
