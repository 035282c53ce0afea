//! Token bundle and secret wrappers.

pub mod bundle;
pub mod secret;
