//! Environment variable expansion for configuration strings.
//!
//! Supports:
//! - `${VAR}` - expands to the value of VAR, errors if unset
//! - `${VAR:-default}` - expands to VAR if set, otherwise uses default
//! - `$${VAR}` - literal `${VAR}`, left for template time

use std::sync::{Arc, LazyLock};

use subst_core::Substitutor;
use subst_lookup::EnvLookup;

use crate::ConfigError;

static EXPANDER: LazyLock<Substitutor> =
    LazyLock::new(|| Substitutor::new(Arc::new(EnvLookup)).with_fail_on_undefined(true));

/// Expand environment variable references in a string.
///
/// Returns the original string unchanged if no `${` is present.
pub(crate) fn expand_env(value: &str, field: &str) -> Result<String, ConfigError> {
    if !value.contains("${") {
        return Ok(value.to_owned());
    }

    EXPANDER.replace(value).map_err(|e| ConfigError::EnvVar {
        field: field.to_owned(),
        message: e.to_string(),
    })
}
