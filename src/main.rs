//! appctl - asset build and launch wrapper for a Node.js web application
//!
//! Compiles stylesheets and scripts with external tools when their sources
//! change, bundles them for production, and (re)starts the server either
//! under a persistent process monitor or as a background debug process.

use std::process::ExitCode;

use appctl_lib::process::SystemRunner;
use appctl_lib::{parse_args, AppError};
use colored::Colorize;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Initialize the logging/tracing system
fn init_tracing(verbose: bool) {
    let filter = if verbose {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appctl_lib=debug"))
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("appctl_lib=info"))
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn fail(err: &AppError) -> ExitCode {
    eprintln!("{} {}", "error:".red().bold(), err);
    ExitCode::from(u8::try_from(err.exit_code()).unwrap_or(1))
}

#[tokio::main]
async fn main() -> ExitCode {
    let options = match parse_args(std::env::args()) {
        Ok(Some(options)) => options,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => return fail(&err),
    };

    init_tracing(options.verbose);

    match options.execute(&SystemRunner).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => fail(&err),
    }
}
