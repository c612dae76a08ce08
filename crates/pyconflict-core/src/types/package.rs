//! Package metadata types.
//!
//! A [`Package`] is one release of a distribution as described by the package
//! index: its version, the interpreter range it supports and its direct
//! requirements.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Dependency, Version};
use crate::utils::normalize_name;

/// One release of a distribution
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Package {
    pub name: String,
    pub version: Version,
    /// `Requires-Python` specifier text, if the release declares one
    pub requires_python: Option<String>,
    pub dependencies: Vec<Dependency>,
}

impl Package {
    /// Create a release with no requirements
    pub fn new(name: impl Into<String>, version: Version) -> Self {
        Self {
            name: name.into(),
            version,
            requires_python: None,
            dependencies: Vec::new(),
        }
    }

    pub fn with_requires_python(mut self, requires_python: impl Into<String>) -> Self {
        self.requires_python = Some(requires_python.into());
        self
    }

    pub fn with_dependency(mut self, dependency: Dependency) -> Self {
        self.dependencies.push(dependency);
        self
    }

    /// PEP 503 normalized name
    pub fn normalized_name(&self) -> String {
        normalize_name(&self.name)
    }

    /// Whether this release declares a requirement on `name`
    pub fn depends_on(&self, name: &str) -> bool {
        let wanted = normalize_name(name);
        self.dependencies
            .iter()
            .any(|dep| dep.normalized_name() == wanted)
    }
}

/// `name==version`
impl fmt::Display for Package {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}=={}", self.name, self.version)
    }
}
