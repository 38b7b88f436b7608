//! Prefix-routed lookup.
//!
//! A key like `env:HOME` goes to the lookup registered as `env` with the
//! remainder `HOME`. Keys without a known prefix go to the default lookup.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use subst_core::{Lookup, LookupError};

/// Separator between lookup name and key.
const NAME_SEPARATOR: char = ':';

/// Dispatches `name:key` to named lookups.
///
/// Names are matched case-insensitively.
#[derive(Clone, Default)]
pub struct InterpolatorLookup {
    lookups: BTreeMap<String, Arc<dyn Lookup>>,
    default: Option<Arc<dyn Lookup>>,
}

impl InterpolatorLookup {
    /// Create a lookup with no routes and no default.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `lookup` under `name`, builder style.
    #[must_use]
    pub fn with(mut self, name: &str, lookup: Arc<dyn Lookup>) -> Self {
        self.register(name, lookup);
        self
    }

    /// Set the lookup used for keys without a registered prefix.
    #[must_use]
    pub fn with_default(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.default = Some(lookup);
        self
    }

    /// Register `lookup` under `name`, replacing any previous one.
    pub fn register(&mut self, name: &str, lookup: Arc<dyn Lookup>) {
        self.lookups.insert(name.to_lowercase(), lookup);
    }

    /// Registered names, lowercase and sorted.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.lookups.keys().map(String::as_str)
    }
}

impl Lookup for InterpolatorLookup {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        if let Some((name, rest)) = key.split_once(NAME_SEPARATOR)
            && let Some(lookup) = self.lookups.get(&name.to_lowercase())
        {
            return lookup.lookup(rest);
        }
        match &self.default {
            Some(lookup) => lookup.lookup(key),
            None => Ok(None),
        }
    }
}

impl fmt::Debug for InterpolatorLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("InterpolatorLookup")
            .field("names", &self.lookups.keys().collect::<Vec<_>>())
            .field("has_default", &self.default.is_some())
            .finish()
    }
}
