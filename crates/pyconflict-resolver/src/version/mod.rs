//! Version selection and constraint combination
//!
//! Provides the version operations conflict detection builds on: stable
//! filtering, latest-compatible selection and combining several specifier
//! sets into one.

use std::collections::BTreeSet;

use pyconflict_core::{PycError, PycResult, SpecifierSet, Version};
use tracing::debug;

/// Stateless version operations over PEP 440 versions
#[derive(Debug, Clone, Copy, Default)]
pub struct VersionResolver;

impl VersionResolver {
    pub fn new() -> Self {
        Self
    }

    /// Whether `version` satisfies `specifier`. The empty set admits
    /// everything.
    pub fn is_compatible(&self, version: &Version, specifier: &SpecifierSet) -> bool {
        specifier.contains(version)
    }

    /// Versions without pre-release or dev qualifiers, in input order
    pub fn filter_stable_versions(&self, versions: &[Version]) -> Vec<Version> {
        versions
            .iter()
            .filter(|version| !version.is_prerelease())
            .cloned()
            .collect()
    }

    /// Highest version satisfying `specifier`
    pub fn get_latest_compatible(
        &self,
        versions: &[Version],
        specifier: &SpecifierSet,
    ) -> Option<Version> {
        versions
            .iter()
            .filter(|version| self.is_compatible(version, specifier))
            .max()
            .cloned()
    }

    /// All versions satisfying `specifier`, ascending and deduplicated
    pub fn find_matching(&self, versions: &[Version], specifier: &SpecifierSet) -> Vec<Version> {
        let matching: BTreeSet<&Version> = versions
            .iter()
            .filter(|version| self.is_compatible(version, specifier))
            .collect();
        matching.into_iter().cloned().collect()
    }

    /// Combine constraints into a single conjunctive set.
    ///
    /// Fails with `IncompatibleConstraint` when the combined clauses do not
    /// re-parse, or when their bounds leave no version at all. Sets whose
    /// emptiness cannot be shown from bounds alone are returned unchanged.
    pub fn find_overlapping_range(&self, constraints: &[SpecifierSet]) -> PycResult<SpecifierSet> {
        let combined = constraints
            .iter()
            .filter(|set| !set.is_empty())
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join(",");

        let merged = SpecifierSet::parse(&combined).map_err(|_| PycError::IncompatibleConstraint {
            constraint: combined.clone(),
        })?;

        if merged.is_unsatisfiable() {
            debug!(constraint = %merged, "constraints have no overlap");
            return Err(PycError::IncompatibleConstraint {
                constraint: merged.to_string(),
            });
        }

        Ok(merged)
    }
}
