//! Value sources for placeholder resolution.
//!
//! Every type here implements [`subst_core::Lookup`]:
//!
//! - [`EnvLookup`]: process environment variables
//! - [`MapLookup`]: in-memory key/value pairs
//! - [`FileLookup`]: file contents, optionally fenced to root directories
//! - [`RestrictedLookup`]: wraps another lookup with an access check
//! - [`InterpolatorLookup`]: routes `name:key` to a lookup registered as `name`
//! - [`ChainLookup`]: first value found across several lookups
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use subst_core::Substitutor;
//! use subst_lookup::{InterpolatorLookup, MapLookup};
//!
//! let lookup = InterpolatorLookup::new()
//!     .with("app", Arc::new(MapLookup::new().with("name", "demo")))
//!     .with_default(Arc::new(MapLookup::new().with("version", "1.2")));
//!
//! let subst = Substitutor::new(Arc::new(lookup));
//! assert_eq!(subst.replace("${app:name} ${version}").unwrap(), "demo 1.2");
//! ```

mod chain;
mod env;
mod file;
mod interpolator;
mod map;
mod restricted;

pub use chain::ChainLookup;
pub use env::EnvLookup;
pub use file::FileLookup;
pub use interpolator::InterpolatorLookup;
pub use map::MapLookup;
pub use restricted::RestrictedLookup;
