//! Key resolution contract.
//!
//! The engine never knows where values come from. Anything that maps a key to
//! an optional value implements [`Lookup`]; concrete sources (environment,
//! files, maps) live in the `subst-lookup` crate.

use std::collections::{BTreeMap, HashMap};
use std::hash::BuildHasher;
use std::sync::{Arc, LazyLock};

/// Resolves placeholder keys to values.
///
/// `Ok(None)` means the key is unknown and triggers default-value fallback or
/// literal passthrough. `Err` is reserved for real failures (I/O, access
/// denied) and aborts the substitution.
pub trait Lookup: Send + Sync {
    /// Look up the value for `key`.
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError>;
}

/// Failure raised by a [`Lookup`] implementation.
#[derive(Debug, thiserror::Error)]
#[error("{message}")]
pub struct LookupError {
    message: String,
    #[source]
    source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl LookupError {
    /// Create an error with a message.
    #[must_use]
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            source: None,
        }
    }

    /// Create an error wrapping an underlying cause.
    #[must_use]
    pub fn with_source(
        message: impl Into<String>,
        source: impl Into<Box<dyn std::error::Error + Send + Sync>>,
    ) -> Self {
        Self {
            message: message.into(),
            source: Some(source.into()),
        }
    }

    /// Error for a key rejected by an access restriction.
    #[must_use]
    pub fn denied(key: &str) -> Self {
        Self::new(format!("access to '{key}' denied"))
    }

    /// Error message without the source chain.
    pub fn message(&self) -> &str {
        &self.message
    }
}

/// Lookup that never resolves anything.
#[derive(Debug, Clone, Copy, Default)]
pub struct NullLookup;

impl Lookup for NullLookup {
    fn lookup(&self, _key: &str) -> Result<Option<String>, LookupError> {
        Ok(None)
    }
}

static NULL_LOOKUP: LazyLock<Arc<dyn Lookup>> = LazyLock::new(|| Arc::new(NullLookup));

/// Shared [`NullLookup`] handle.
///
/// Built once per process; every call hands out the same allocation.
pub fn null_lookup() -> Arc<dyn Lookup> {
    Arc::clone(&NULL_LOOKUP)
}

/// Adapter turning an infallible closure into a [`Lookup`].
///
/// Created with [`lookup_fn`].
#[derive(Clone, Copy)]
pub struct FnLookup<F>(F);

impl<F> Lookup for FnLookup<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        Ok((self.0)(key))
    }
}

/// Wrap a closure as a [`Lookup`].
///
/// # Example
///
/// ```
/// use subst_core::{Lookup, lookup_fn};
///
/// let lookup = lookup_fn(|key| (key == "name").then(|| "world".to_owned()));
/// assert_eq!(lookup.lookup("name").unwrap().as_deref(), Some("world"));
/// assert_eq!(lookup.lookup("other").unwrap(), None);
/// ```
pub fn lookup_fn<F>(f: F) -> FnLookup<F>
where
    F: Fn(&str) -> Option<String> + Send + Sync,
{
    FnLookup(f)
}

impl<S: BuildHasher + Send + Sync> Lookup for HashMap<String, String, S> {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        Ok(self.get(key).cloned())
    }
}

impl Lookup for BTreeMap<String, String> {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        Ok(self.get(key).cloned())
    }
}

impl<L: Lookup + ?Sized> Lookup for Arc<L> {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        (**self).lookup(key)
    }
}

impl<L: Lookup + ?Sized> Lookup for Box<L> {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        (**self).lookup(key)
    }
}
