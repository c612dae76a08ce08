//! Conflict reports.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::{SpecifierSet, Version};

/// How serious a conflict is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConflictSeverity {
    Error,
    Warning,
    Info,
}

impl ConflictSeverity {
    pub fn as_str(&self) -> &'static str {
        match self {
            ConflictSeverity::Error => "error",
            ConflictSeverity::Warning => "warning",
            ConflictSeverity::Info => "info",
        }
    }
}

impl fmt::Display for ConflictSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An installed distribution that violates a requirement of the package
/// being added
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Conflict {
    pub dependency_name: String,
    /// `name==version` of the package declaring the requirement
    pub required_by: String,
    pub required_constraint: SpecifierSet,
    pub installed_version: Option<Version>,
    pub conflicting_package: Option<String>,
    pub severity: ConflictSeverity,
}

impl Conflict {
    /// An error-severity conflict with no third-party culprit
    pub fn new(
        dependency_name: impl Into<String>,
        required_by: impl Into<String>,
        required_constraint: SpecifierSet,
        installed_version: Option<Version>,
    ) -> Self {
        Self {
            dependency_name: dependency_name.into(),
            required_by: required_by.into(),
            required_constraint,
            installed_version,
            conflicting_package: None,
            severity: ConflictSeverity::Error,
        }
    }

    /// Name part of `required_by`
    pub fn required_by_name(&self) -> &str {
        self.required_by
            .split_once("==")
            .map_or(self.required_by.as_str(), |(name, _)| name)
    }
}

impl fmt::Display for Conflict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{} requires {}{}", self.required_by, self.dependency_name, self.required_constraint)?;
        match &self.installed_version {
            Some(version) => write!(f, "  installed: {}", version)?,
            None => f.write_str("  installed: none")?,
        }
        if let Some(other) = &self.conflicting_package {
            write!(f, " (conflicts with {})", other)?;
        }
        Ok(())
    }
}
