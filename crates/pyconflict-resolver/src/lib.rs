//! Conflict checking engine for PyConflict
//!
//! This crate turns a package's declared requirements and a snapshot of the
//! target environment into conflicts and remediation hints. It performs no
//! I/O of its own; package metadata and environment facts arrive through the
//! `PackageSource` and `EnvironmentSource` ports from `pyconflict-core`.

pub mod check;
pub mod conflict;
pub mod marker;
pub mod stable;
pub mod suggest;
pub mod version;

#[cfg(test)]
mod testing;

// Re-export main types
pub use check::{CheckAddPackage, CheckAddRequest, CheckAddResponse};
pub use conflict::{ConflictDetector, PYTHON_DEPENDENCY};
pub use marker::{MarkerEnvironment, MarkerEvaluator, MarkerTree};
pub use stable::{LatestStable, LatestStableRequest, LatestStableResponse};
pub use suggest::SuggestionGenerator;
pub use version::VersionResolver;
