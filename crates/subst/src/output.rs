//! Status lines on stderr. Stdout carries only substituted text.

use std::fmt::Display;
use std::path::Path;

use console::{Style, Term};

/// Reports how a run ended.
pub(crate) struct Report {
    term: Term,
    done: Style,
    failed: Style,
}

impl Report {
    /// Report to stderr, colored when it is a terminal.
    #[must_use]
    pub(crate) fn stderr() -> Self {
        Self {
            term: Term::stderr(),
            done: Style::new().green(),
            failed: Style::new().red().bold(),
        }
    }

    /// Announce a finished output file.
    pub(crate) fn wrote(&self, path: &Path, bytes: u64) {
        self.line(&self.done, &wrote_message(path, bytes));
    }

    /// Announce the error that ends the run.
    pub(crate) fn failed(&self, err: &dyn Display) {
        self.line(&self.failed, &format!("error: {err}"));
    }

    fn line(&self, style: &Style, msg: &str) {
        // Nowhere left to report a failing stderr.
        let _ = self.term.write_line(&style.apply_to(msg).to_string());
    }
}

fn wrote_message(path: &Path, bytes: u64) -> String {
    let unit = if bytes == 1 { "byte" } else { "bytes" };
    format!("Wrote {bytes} {unit} to {}", path.display())
}
