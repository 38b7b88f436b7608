//! Environment variable lookup.

use subst_core::{Lookup, LookupError};

/// Resolves keys as environment variable names.
///
/// Unset variables, values that are not valid unicode, and names the
/// platform cannot represent (empty, containing `=` or NUL) are absent.
#[derive(Debug, Clone, Copy, Default)]
pub struct EnvLookup;

impl Lookup for EnvLookup {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        if key.is_empty() || key.contains(['=', '\0']) {
            return Ok(None);
        }
        Ok(std::env::var(key).ok())
    }
}
