// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Printpool: shared print service, one dispatch cycle per invocation.
//
// Entry point. Initialises logging, parses arguments, runs the cycle, and
// turns the report into a summary and an exit code.

mod cli;
mod services;

use std::process::ExitCode;

use clap::Parser;

use cli::Cli;
use services::cycle::run_cycle;
use services::summary::{EXIT_SETUP_ERROR, Summary, exit_code};

#[tokio::main]
async fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    tracing::info!("Printpool starting");

    let report = match run_cycle(&cli).await {
        Ok(report) => report,
        Err(e) => {
            tracing::error!(error = %e, "dispatch cycle could not run");
            return ExitCode::from(EXIT_SETUP_ERROR);
        }
    };

    if cli.json {
        match serde_json::to_string_pretty(&report) {
            Ok(json) => println!("{json}"),
            Err(e) => {
                tracing::error!(error = %e, "failed to serialize report");
                return ExitCode::from(EXIT_SETUP_ERROR);
            }
        }
    } else {
        print!("{}", Summary(&report));
    }

    ExitCode::from(exit_code(&report))
}
