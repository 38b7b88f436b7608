//! Default `subst` command: substitute placeholders in files or stdin.

use std::fs::File;
use std::io::{self, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use clap::Args;
use clap::builder::RangedU64ValueParser;
use subst_config::{CliSettings, Config};
use subst_core::{MAX_DEPTH_LIMIT, SubstitutingReader, Substitutor};

use crate::error::CliError;
use crate::output::Report;

/// Input path meaning standard input.
const STDIN_PATH: &str = "-";

/// Arguments for the substitute command.
#[derive(Args)]
pub(crate) struct SubstituteArgs {
    /// Input files (default: stdin). Use `-` for stdin.
    files: Vec<PathBuf>,

    /// Path to configuration file (default: auto-discover subst.toml).
    #[arg(short, long, env = "SUBST_CONFIG")]
    config: Option<PathBuf>,

    /// Set a variable (overrides config). May be repeated.
    #[arg(short = 's', long = "set", value_name = "KEY=VALUE", value_parser = parse_key_value)]
    set: Vec<(String, String)>,

    /// Hide environment variables from templates.
    #[arg(long)]
    no_env: bool,

    /// Fail on placeholders without a value or default.
    #[arg(long)]
    fail_on_undefined: bool,

    /// Maximum nesting depth, 1 to 128 (overrides config).
    #[arg(long, value_parser = max_depth_parser())]
    max_depth: Option<usize>,

    /// Write output to a file instead of stdout.
    #[arg(short, long)]
    output: Option<PathBuf>,

    /// Enable verbose output (debug logs on stderr).
    #[arg(short, long)]
    pub verbose: bool,
}

impl SubstituteArgs {
    /// Execute the substitute command.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration fails, an input cannot be read or
    /// substituted, or the output cannot be written.
    pub(crate) fn execute(self, report: &Report) -> Result<(), CliError> {
        let cli_settings = CliSettings {
            fail_on_undefined: self.fail_on_undefined.then_some(true),
            max_depth: self.max_depth,
            env: self.no_env.then_some(false),
            variables: self.set,
        };
        let config = Config::load(self.config.as_deref(), Some(&cli_settings))?;
        if let Some(path) = &config.config_path {
            tracing::info!(path = %path.display(), "Using configuration");
        }
        let substitutor = config.build_substitutor();

        match &self.output {
            Some(path) => {
                check_not_input(&self.files, path)?;
                let mut writer = BufWriter::new(File::create(path)?);
                let bytes = substitute_inputs(&self.files, &substitutor, &mut writer)?;
                writer.flush()?;
                report.wrote(path, bytes);
            }
            None => {
                let mut writer = BufWriter::new(io::stdout().lock());
                substitute_inputs(&self.files, &substitutor, &mut writer)?;
                writer.flush()?;
            }
        }

        Ok(())
    }
}

/// Substitute every input in order into `writer`. No inputs means stdin.
///
/// Returns the total number of bytes written.
fn substitute_inputs(
    files: &[PathBuf],
    substitutor: &Substitutor,
    writer: &mut dyn Write,
) -> Result<u64, CliError> {
    if files.is_empty() {
        return substitute_stdin(substitutor, writer);
    }
    let mut total = 0;
    for path in files {
        if path.as_os_str() == STDIN_PATH {
            total += substitute_stdin(substitutor, writer)?;
            continue;
        }
        let file = File::open(path).map_err(|source| CliError::Input {
            path: path.clone(),
            source,
        })?;
        let bytes = substitute_stream(file, substitutor, writer).map_err(|source| {
            CliError::Input {
                path: path.clone(),
                source,
            }
        })?;
        tracing::debug!(path = %path.display(), bytes, "Substituted input");
        total += bytes;
    }
    Ok(total)
}

fn substitute_stdin(substitutor: &Substitutor, writer: &mut dyn Write) -> Result<u64, CliError> {
    let bytes = substitute_stream(io::stdin().lock(), substitutor, writer)?;
    tracing::debug!(bytes, "Substituted stdin");
    Ok(bytes)
}

/// Stream one source through the substitutor. Returns bytes written.
fn substitute_stream<R: Read>(
    source: R,
    substitutor: &Substitutor,
    writer: &mut dyn Write,
) -> io::Result<u64> {
    let mut reader = SubstitutingReader::new(source, substitutor.clone());
    io::copy(&mut reader, writer)
}

/// Refuse to truncate a file that is also being read.
fn check_not_input(files: &[PathBuf], output: &Path) -> Result<(), CliError> {
    let Ok(output) = output.canonicalize() else {
        return Ok(());
    };
    let clash = files
        .iter()
        .filter_map(|path| path.canonicalize().ok())
        .any(|path| path == output);
    if clash {
        return Err(CliError::Validation(format!(
            "{} is both an input and the output",
            output.display()
        )));
    }
    Ok(())
}

/// Accepts `1..=MAX_DEPTH_LIMIT`.
fn max_depth_parser() -> RangedU64ValueParser<usize> {
    RangedU64ValueParser::new().range(1..=MAX_DEPTH_LIMIT as u64)
}

/// Parse a `KEY=VALUE` argument.
fn parse_key_value(arg: &str) -> Result<(String, String), String> {
    match arg.split_once('=') {
        Some((key, value)) if !key.is_empty() => Ok((key.to_owned(), value.to_owned())),
        _ => Err(format!("expected KEY=VALUE, got '{arg}'")),
    }
}
