//! Conflict detection
//!
//! Compares a candidate package's direct requirements with what is already
//! installed. Only installed distributions can conflict: a requirement on
//! something absent will simply be installed alongside the candidate.

use pyconflict_core::{Conflict, Dependency, Environment, Package, PycResult, SpecifierSet};
use tracing::debug;

use crate::marker::MarkerEvaluator;
use crate::version::VersionResolver;

/// Pseudo-dependency name used for interpreter mismatches
pub const PYTHON_DEPENDENCY: &str = "python";

/// Detects conflicts between a package and an environment
#[derive(Debug, Clone)]
pub struct ConflictDetector<'r> {
    resolver: &'r VersionResolver,
    markers: MarkerEvaluator,
}

impl<'r> ConflictDetector<'r> {
    pub fn new(resolver: &'r VersionResolver) -> Self {
        Self {
            resolver,
            markers: MarkerEvaluator::new(),
        }
    }

    /// Conflicts in the order the package declares its dependencies
    pub fn detect_conflicts(&self, package: &Package, environment: &Environment) -> Vec<Conflict> {
        package
            .dependencies
            .iter()
            .filter(|dep| self.applies(dep, environment))
            .filter_map(|dep| self.check_dependency(dep, package, environment))
            .collect()
    }

    /// Check the interpreter against the package's `Requires-Python`.
    ///
    /// Returns `Ok(None)` when there is no constraint or it is satisfied, and
    /// an error when the constraint itself cannot be parsed.
    pub fn check_interpreter(
        &self,
        package: &Package,
        environment: &Environment,
    ) -> PycResult<Option<Conflict>> {
        let Some(requires_python) = package.requires_python.as_deref() else {
            return Ok(None);
        };
        let specifier = SpecifierSet::parse(requires_python)?;
        let interpreter = environment.python_version();

        if specifier.contains_with_prereleases(interpreter, true) {
            return Ok(None);
        }

        debug!(
            package = %package,
            interpreter = %interpreter,
            requires_python,
            "interpreter outside Requires-Python"
        );
        Ok(Some(Conflict::new(
            PYTHON_DEPENDENCY,
            package.to_string(),
            specifier,
            Some(interpreter.clone()),
        )))
    }

    fn applies(&self, dep: &Dependency, environment: &Environment) -> bool {
        match dep.marker.as_deref() {
            Some(marker) => {
                let applies = self.markers.evaluate(marker, environment);
                if !applies {
                    debug!(dependency = %dep.name, marker, "skipping dependency, marker is false");
                }
                applies
            },
            None => true,
        }
    }

    fn check_dependency(
        &self,
        dep: &Dependency,
        package: &Package,
        environment: &Environment,
    ) -> Option<Conflict> {
        let installed = environment.installed_version(&dep.name)?;

        if self.resolver.is_compatible(installed, &dep.specifier) {
            debug!(dependency = %dep.name, installed = %installed, "requirement satisfied");
            return None;
        }

        debug!(
            dependency = %dep.name,
            installed = %installed,
            required = %dep.specifier,
            "requirement not satisfied"
        );
        Some(Conflict::new(
            dep.name.clone(),
            package.to_string(),
            dep.specifier.clone(),
            Some(installed.clone()),
        ))
    }
}
