//! Utility functions and helpers.
//!
//! Common functionality used across multiple PyConflict crates.

pub mod hash;
pub mod name;

// Re-export commonly used utilities
pub use hash::{blake3_hash, cache_key};
pub use name::{is_valid_name, normalize_name};
