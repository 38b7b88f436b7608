//! CLI command implementations.

pub(crate) mod substitute;

pub(crate) use substitute::SubstituteArgs;
