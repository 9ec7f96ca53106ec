//! Small shared utilities.

pub mod context_hash;

pub use context_hash::{context_hash, normalize_context};
