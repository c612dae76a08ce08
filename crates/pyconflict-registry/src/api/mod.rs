//! PyPI JSON API response types
//!
//! Only the fields the checker reads are modelled; everything else in the
//! response is ignored.

use std::collections::HashMap;
use serde::{Deserialize, Serialize};

/// Response of `/{name}/json` and `/{name}/{version}/json`
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageResponse {
    pub info: PackageInfo,
    /// Files per release version. Empty for the version-specific endpoint.
    #[serde(default)]
    pub releases: HashMap<String, Vec<ReleaseFile>>,
}

/// The `info` object
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PackageInfo {
    pub name: String,
    pub version: String,
    pub summary: Option<String>,
    /// `Requires-Python` of this release; PyPI sends `""` when unset
    pub requires_python: Option<String>,
    /// PEP 508 requirement lines
    pub requires_dist: Option<Vec<String>>,
    #[serde(default)]
    pub yanked: bool,
}

/// One distribution file of a release
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ReleaseFile {
    pub filename: Option<String>,
    pub requires_python: Option<String>,
    #[serde(default)]
    pub yanked: bool,
    pub upload_time_iso_8601: Option<String>,
}

impl PackageInfo {
    /// `requires_python` with PyPI's empty-string placeholder removed
    pub fn requires_python(&self) -> Option<&str> {
        self.requires_python
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}

impl ReleaseFile {
    pub fn requires_python(&self) -> Option<&str> {
        self.requires_python
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
    }
}
