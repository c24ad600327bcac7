//! seqtrace - entry point
//!
//! Parses the command line, sets up logging and runs one tracing session.

use std::process::ExitCode;

use anyhow::Context;
use clap::Parser;

use seqtrace::config::Preferences;
use seqtrace::session;
use seqtrace::ui::cli::{self, Args};

fn main() -> ExitCode {
    // 1. Parse command line arguments; bare usage output is not a failure
    let args = match Args::try_parse() {
        Ok(args) => args,
        Err(e) => {
            let usage = cli::is_usage_request(e.kind());
            let _ = e.print();
            return if usage {
                ExitCode::SUCCESS
            } else {
                ExitCode::FAILURE
            };
        }
    };

    // 2. Initialize logger with verbosity level
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(args.log_level()))
        .init();

    // 3. Resolve output preferences once
    let prefs = Preferences::detect();
    log::debug!("Output redirected: {}", prefs.is_redirected());

    match run(args, &prefs) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            cli::print_error(&prefs, &e);
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args, prefs: &Preferences) -> anyhow::Result<()> {
    let mut config = args.into_config();
    cli::print_inputs(prefs, &config);

    config.validate()?;
    let report = session::run(&config)
        .with_context(|| format!("tracing {}", config.path.display()))?;

    log::info!(
        "Process {} traced for {} steps",
        report.process_id,
        report.summary.steps
    );
    cli::print_report(prefs, &report);
    Ok(())
}
