use std::process::ExitCode;

use clap::Parser as _;
use tracing_subscriber::EnvFilter;

use bytepatch::cli::{self, Cli};

fn main() -> ExitCode {
    let cli = Cli::parse();

    // Diagnostic filtering happens in the merge logger; the subscriber
    // passes everything through unless RUST_LOG narrows it.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .without_time()
        .init();

    match cli::run(&cli) {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("fatal: {e:#}");
            ExitCode::from(2)
        }
    }
}
