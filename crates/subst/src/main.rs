//! subst CLI - placeholder substitution for files and streams.
//!
//! Reads each input through the substitution engine and writes the result to
//! stdout or `--output`. Settings come from `subst.toml` (auto-discovered)
//! and command line flags.

mod commands;
mod error;
mod output;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use commands::SubstituteArgs;
use output::Report;

/// subst - Placeholder substitution.
#[derive(Parser)]
#[command(name = "subst", version, about)]
struct Cli {
    #[command(flatten)]
    args: SubstituteArgs,
}

fn main() {
    let cli = Cli::parse();
    let report = Report::stderr();

    // --verbose enables DEBUG level, otherwise use RUST_LOG or default to WARN
    let filter = if cli.args.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::from_default_env()
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    if let Err(err) = cli.args.execute(&report) {
        report.failed(&err);
        std::process::exit(1);
    }
}
