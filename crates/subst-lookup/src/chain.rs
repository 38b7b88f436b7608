//! Ordered fallback across several lookups.

use std::fmt;
use std::sync::Arc;

use subst_core::{Lookup, LookupError};

/// Asks each lookup in turn and returns the first value found.
///
/// Errors stop the search.
#[derive(Clone, Default)]
pub struct ChainLookup {
    lookups: Vec<Arc<dyn Lookup>>,
}

impl ChainLookup {
    /// Create an empty chain. Every key is absent.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a lookup consulted after the existing ones.
    #[must_use]
    pub fn then(mut self, lookup: Arc<dyn Lookup>) -> Self {
        self.lookups.push(lookup);
        self
    }

    /// Number of lookups in the chain.
    pub fn len(&self) -> usize {
        self.lookups.len()
    }

    /// Whether the chain has no lookups.
    pub fn is_empty(&self) -> bool {
        self.lookups.is_empty()
    }
}

impl Lookup for ChainLookup {
    fn lookup(&self, key: &str) -> Result<Option<String>, LookupError> {
        for lookup in &self.lookups {
            if let Some(value) = lookup.lookup(key)? {
                return Ok(Some(value));
            }
        }
        Ok(None)
    }
}

impl fmt::Debug for ChainLookup {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChainLookup")
            .field("len", &self.lookups.len())
            .finish()
    }
}
