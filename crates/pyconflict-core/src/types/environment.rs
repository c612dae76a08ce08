//! Snapshot of the target Python environment.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use super::Version;
use crate::utils::normalize_name;

/// Installed distributions plus interpreter facts, keyed by normalized name
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Environment {
    packages: BTreeMap<String, Version>,
    python_version: Version,
    /// `sys.platform` value, e.g. `linux`, `darwin`, `win32`
    platform: String,
    machine: Option<String>,
    implementation: Option<String>,
}

impl Environment {
    pub fn new<I, S>(packages: I, python_version: Version, platform: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = (S, Version)>,
        S: AsRef<str>,
    {
        let packages = packages
            .into_iter()
            .map(|(name, version)| (normalize_name(name.as_ref()), version))
            .collect();
        Self {
            packages,
            python_version,
            platform: platform.into(),
            machine: None,
            implementation: None,
        }
    }

    /// `platform.machine()` value, e.g. `x86_64`
    pub fn with_machine(mut self, machine: impl Into<String>) -> Self {
        self.machine = Some(machine.into());
        self
    }

    /// `sys.implementation.name`, e.g. `cpython`
    pub fn with_implementation(mut self, implementation: impl Into<String>) -> Self {
        self.implementation = Some(implementation.into());
        self
    }

    pub fn packages(&self) -> &BTreeMap<String, Version> {
        &self.packages
    }

    pub fn python_version(&self) -> &Version {
        &self.python_version
    }

    pub fn platform(&self) -> &str {
        &self.platform
    }

    pub fn machine(&self) -> Option<&str> {
        self.machine.as_deref()
    }

    pub fn implementation(&self) -> Option<&str> {
        self.implementation.as_deref()
    }

    pub fn installed_version(&self, name: &str) -> Option<&Version> {
        self.packages.get(&normalize_name(name))
    }

    pub fn has_package(&self, name: &str) -> bool {
        self.installed_version(name).is_some()
    }
}
