//! Placeholder interpolation engine.
//!
//! Finds `${key}` style placeholders in text, resolves each key through a
//! pluggable [`Lookup`] and writes the value back, recursively: keys and
//! values may themselves contain placeholders.
//!
//! # Architecture
//!
//! - [`Matcher`]: recognizes prefix, suffix, escape and default separator at a
//!   buffer position
//! - [`Substitutor`]: the scanning and resolution algorithm, with a depth
//!   limit against self-referencing values
//! - [`SubstitutingReader`]: streams an [`std::io::Read`] source through the
//!   same algorithm without loading it whole
//!
//! Concrete lookups (environment, files, maps) live in `subst-lookup`.
//!
//! # Syntax
//!
//! With the default configuration:
//!
//! - `${key}` - value of `key`, left as is when unresolved
//! - `${key:-default}` - value of `key`, otherwise `default`
//! - `${outer${inner}}` - key built from another placeholder
//! - `$${key}` - literal `${key}`
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use subst_core::{Substitutor, lookup_fn};
//!
//! let subst = Substitutor::new(Arc::new(lookup_fn(|key| match key {
//!     "env" => Some("prod".to_owned()),
//!     "host.prod" => Some("db.internal".to_owned()),
//!     _ => None,
//! })))
//! .with_prefix("{{")
//! .with_suffix("}}");
//!
//! let url = subst.replace("postgres://{{host.{{env}}}}:{{port:-5432}}").unwrap();
//! assert_eq!(url, "postgres://db.internal:5432");
//! ```

mod error;
mod lookup;
mod matcher;
mod reader;
mod substitutor;

pub use error::SubstError;
pub use lookup::{FnLookup, Lookup, LookupError, NullLookup, lookup_fn, null_lookup};
pub use matcher::Matcher;
pub use reader::SubstitutingReader;
pub use substitutor::{
    DEFAULT_ESCAPE, DEFAULT_MAX_DEPTH, DEFAULT_PREFIX, DEFAULT_SEPARATOR, DEFAULT_SUFFIX,
    MAX_DEPTH_LIMIT, Progress, ScanState, Substitutor,
};
