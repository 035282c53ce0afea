//! Token models, timestamp parsing, and the expiry policy.

pub mod expiry;
pub mod token;

pub use expiry::*;
pub use token::{bundle::*, secret::*};
