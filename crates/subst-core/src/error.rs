//! Substitution error types.

use crate::LookupError;

/// Error raised by [`Substitutor`](crate::Substitutor) operations.
///
/// Unterminated placeholders and unresolved keys are not errors; they pass
/// through as literal text unless
/// [`with_fail_on_undefined`](crate::Substitutor::with_fail_on_undefined) is set.
#[derive(Debug, thiserror::Error)]
pub enum SubstError {
    /// Requested character window lies outside the source.
    #[error("Invalid range: offset {offset} + length {length} exceeds source length {len}")]
    InvalidRange {
        /// Window start in characters.
        offset: usize,
        /// Window length in characters.
        length: usize,
        /// Source length in characters.
        len: usize,
    },
    /// Nested substitution went deeper than the configured maximum.
    #[error("Recursion depth {max_depth} exceeded while resolving: {chain}")]
    RecursionLimit {
        /// Configured maximum depth.
        max_depth: usize,
        /// Keys being resolved when the limit tripped (e.g. `a -> b -> a`).
        chain: String,
    },
    /// Key has no value and no default.
    #[error("Cannot resolve variable '{key}'")]
    Undefined {
        /// Fully substituted key.
        key: String,
    },
    /// Lookup failed while resolving a key.
    #[error("Lookup of '{key}' failed: {source}")]
    Lookup {
        /// Fully substituted key.
        key: String,
        /// Underlying failure.
        #[source]
        source: LookupError,
    },
}
