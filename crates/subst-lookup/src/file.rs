//! File contents lookup.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use subst_core::{Lookup, LookupError};

/// Resolves keys as file paths and returns the file contents.
///
/// A leading `~` in the key expands to the home directory. Missing files are
/// absent; other read failures are errors.
///
/// When fenced, relative keys are resolved against the first root and the
/// final path (after following symlinks and `..`) must lie inside one of the
/// roots; anything else is rejected.
#[derive(Debug, Clone, Default)]
pub struct FileLookup {
    roots: Vec<PathBuf>,
}

impl FileLookup {
    /// Lookup reading any path, relative to the working directory.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Lookup restricted to files under `roots`.
    #[must_use]
    pub fn fenced<P: Into<PathBuf>>(roots: impl IntoIterator<Item = P>) -> Self {
        Self {
            roots: roots.into_iter().map(Into::into).collect(),
        }
    }

    /// Allowed root directories. Empty when unfenced.
    pub fn roots(&self) -> &[PathBuf] {
        &self.roots
    }

    /// Path to read for `key`, or `None` when the file does not exist.
    fn resolve_path(&self, key: &str) -> Result<Option<PathBuf>, LookupError> {
        let expanded = shellexpand::tilde(key);
        let path = Path::new(expanded.as_ref());

        let Some(first_root) = self.roots.first() else {
            return Ok(Some(path.to_path_buf()));
        };

        let candidate = if path.is_relative() {
            first_root.join(path)
        } else {
            path.to_path_buf()
        };
        let canonical = match candidate.canonicalize() {
            Ok(canonical) => canonical,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(LookupError::with_source(
                    format!("failed to resolve '{key}'"),
                    e,
                ));
            }
        };

        let inside = self.roots.iter().any(|root| {
            root.canonicalize()
                .is_ok_and(|root| canonical.starts_with(root))
        });
        if !inside {
            tracing::debug!(key, path = %canonical.display(), "File outside allowed roots");
            return Err(LookupError::denied(key));
        }
        Ok(Some(canonical))
    }
}

impl Lookup for FileLookup {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        let Some(path) = self.resolve_path(key)? else {
            return Ok(None);
        };
        match std::fs::read_to_string(&path) {
            Ok(content) => {
                tracing::debug!(path = %path.display(), bytes = content.len(), "Read file value");
                Ok(Some(content))
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(LookupError::with_source(format!("failed to read '{key}'"), e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::fs;

    use super::*;

    #[test]
    fn test_reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("greeting.txt");
        fs::write(&path, "hello").unwrap();

        let lookup = FileLookup::new();
        let key = path.to_str().unwrap();
        assert_eq!(lookup.lookup(key).unwrap().as_deref(), Some("hello"));
    }

    #[test]
    fn test_missing_file_absent() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nope.txt");
        assert_eq!(FileLookup::new().lookup(path.to_str().unwrap()).unwrap(), None);

        let fenced = FileLookup::fenced([dir.path()]);
        assert_eq!(fenced.lookup("nope.txt").unwrap(), None);
    }

    #[test]
    fn test_fenced_relative_key() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir(dir.path().join("partials")).unwrap();
        fs::write(dir.path().join("partials/header.txt"), "# Header").unwrap();

        let lookup = FileLookup::fenced([dir.path()]);
        assert_eq!(
            lookup.lookup("partials/header.txt").unwrap().as_deref(),
            Some("# Header")
        );
    }

    #[test]
    fn test_fenced_rejects_escape() {
        let outer = tempfile::tempdir().unwrap();
        let root = outer.path().join("root");
        fs::create_dir(&root).unwrap();
        fs::write(outer.path().join("secret.txt"), "top secret").unwrap();

        let lookup = FileLookup::fenced([&root]);
        let err = lookup.lookup("../secret.txt").unwrap_err();
        assert_eq!(err.message(), "access to '../secret.txt' denied");

        let absolute = outer.path().join("secret.txt");
        assert!(lookup.lookup(absolute.to_str().unwrap()).is_err());
    }

    #[test]
    fn test_fenced_accepts_absolute_inside_root() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("value.txt");
        fs::write(&path, "42").unwrap();

        let lookup = FileLookup::fenced([dir.path()]);
        assert_eq!(lookup.lookup(path.to_str().unwrap()).unwrap().as_deref(), Some("42"));
        assert_eq!(lookup.roots(), [dir.path().to_path_buf()]);
    }
}
