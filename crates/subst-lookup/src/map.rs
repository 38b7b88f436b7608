//! In-memory key/value lookup.

use std::collections::BTreeMap;

use subst_core::{Lookup, LookupError};

/// Resolves keys from an owned map.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MapLookup {
    values: BTreeMap<String, String>,
}

impl MapLookup {
    /// Create an empty lookup.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value, builder style.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    /// Add or replace a value. Returns the previous value.
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.values.insert(key.into(), value.into())
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Whether there are no entries.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Lookup for MapLookup {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        Ok(self.values.get(key).cloned())
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for MapLookup {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        let mut map = Self::new();
        map.extend(iter);
        map
    }
}

impl<K: Into<String>, V: Into<String>> Extend<(K, V)> for MapLookup {
    fn extend<I: IntoIterator<Item = (K, V)>>(&mut self, iter: I) {
        for (key, value) in iter {
            self.insert(key, value);
        }
    }
}
