//! # pyconflict-core
//!
//! Core types and utilities shared across all PyConflict crates.
//!
//! This crate provides:
//! - PEP 440 `Version` and `SpecifierSet` with full ordering and containment
//! - PEP 508 `Dependency` parsing, `Package`, `Environment` and `Conflict`
//! - `PycError` enum for unified error handling
//! - The `PackageSource` and `EnvironmentSource` ports
//!
//! ## Architecture
//!
//! The crate is organized into modules:
//! - `types`: Core data types (Version, SpecifierSet, Package, etc.)
//! - `error`: Error types and result aliases
//! - `source`: Traits implemented by the registry client and the environment inspector
//! - `utils`: Name normalization and hashing helpers

pub mod error;
pub mod source;
pub mod types;
pub mod utils;

// Re-export commonly used types
pub use error::{PycError, PycResult};
pub use source::{EnvironmentSource, PackageSource};
pub use types::{
    Conflict, ConflictSeverity, Dependency, Environment, Package, Specifier, SpecifierSet, Version,
};
