//! Core data types for Python dependency checking.
//!
//! This module provides the fundamental types used throughout PyConflict:
//! - PEP 440 versions and specifier sets
//! - PEP 508 dependency requirements
//! - Package releases, environment snapshots and conflict reports

pub mod conflict;
pub mod dependency;
pub mod environment;
pub mod package;
pub mod specifier;
pub mod version;

// Re-export all public types
pub use conflict::{Conflict, ConflictSeverity};
pub use dependency::Dependency;
pub use environment::Environment;
pub use package::Package;
pub use specifier::{Operator, Specifier, SpecifierSet};
pub use version::{LocalSegment, Prerelease, PrereleaseKind, Version};
