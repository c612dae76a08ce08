//! Configuration for PyConflict
//!
//! This crate parses `pyconflict.toml` and the `[tool.pyconflict]` table of
//! `pyproject.toml`, and layers them with the global config file,
//! `PYCONFLICT_*` environment variables and command line flags into one
//! resolved [`Settings`] value.

pub mod merge;
pub mod toml;

// Re-export main types
pub use crate::merge::{CliOverrides, ConfigLoader, ConfigSource, LoadedConfig, Settings};
pub use crate::toml::{CacheSection, ConfigFile, EnvironmentSection, IndexSection};

use pyconflict_core::PycError;

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, PycError>;
