//! Access restriction wrapper.

use std::fmt;

use subst_core::{Lookup, LookupError};

type AllowFn = dyn Fn(&str) -> bool + Send + Sync;

/// Wraps a lookup and rejects keys the predicate does not allow.
///
/// Rejected keys fail with a [`LookupError`] instead of resolving as absent,
/// so a template cannot silently fall back to a default for a forbidden key.
///
/// # Example
///
/// ```
/// use subst_core::Lookup;
/// use subst_lookup::{MapLookup, RestrictedLookup};
///
/// let inner = MapLookup::new().with("APP_NAME", "demo").with("SECRET", "hunter2");
/// let lookup = RestrictedLookup::allow_prefixes(inner, ["APP_"]);
///
/// assert_eq!(lookup.lookup("APP_NAME").unwrap().as_deref(), Some("demo"));
/// assert!(lookup.lookup("SECRET").is_err());
/// ```
pub struct RestrictedLookup<L> {
    inner: L,
    allow: Box<AllowFn>,
}

impl<L: Lookup> RestrictedLookup<L> {
    /// Allow keys for which `allow` returns true.
    pub fn new(inner: L, allow: impl Fn(&str) -> bool + Send + Sync + 'static) -> Self {
        Self {
            inner,
            allow: Box::new(allow),
        }
    }

    /// Allow keys starting with any of `prefixes`.
    pub fn allow_prefixes<S: Into<String>>(inner: L, prefixes: impl IntoIterator<Item = S>) -> Self {
        let prefixes: Vec<String> = prefixes.into_iter().map(Into::into).collect();
        Self::new(inner, move |key| {
            prefixes.iter().any(|prefix| key.starts_with(prefix.as_str()))
        })
    }

    /// The wrapped lookup.
    pub fn inner(&self) -> &L {
        &self.inner
    }
}

impl<L: Lookup> Lookup for RestrictedLookup<L> {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        if !(self.allow)(key) {
            tracing::debug!(key, "Lookup denied");
            return Err(LookupError::denied(key));
        }
        self.inner.lookup(key)
    }
}

impl<L: fmt::Debug> fmt::Debug for RestrictedLookup<L> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestrictedLookup")
            .field("inner", &self.inner)
            .finish_non_exhaustive()
    }
}
