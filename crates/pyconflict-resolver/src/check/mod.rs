//! The check-add use case: "will adding this package break my environment?"

use serde::Serialize;
use tracing::{debug, info};

use pyconflict_core::{
    Conflict, Environment, EnvironmentSource, Package, PackageSource, PycResult,
};

use crate::conflict::ConflictDetector;
use crate::suggest::SuggestionGenerator;
use crate::version::VersionResolver;

/// Confidence of a direct-dependency-only check
const BASE_CONFIDENCE: f64 = 0.90;
/// Applied when a transitive check was asked for but not performed
const DEEP_FACTOR: f64 = 0.90;

/// What to check
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckAddRequest {
    pub package_name: String,
    /// Exact release to check; latest when `None`
    pub version: Option<String>,
    /// Transitive checking was requested
    pub deep: bool,
}

impl CheckAddRequest {
    pub fn new(package_name: impl Into<String>) -> Self {
        Self {
            package_name: package_name.into(),
            version: None,
            deep: false,
        }
    }

    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = Some(version.into());
        self
    }

    pub fn deep(mut self, deep: bool) -> Self {
        self.deep = deep;
        self
    }
}

/// Outcome of a check
#[derive(Debug, Clone, Serialize)]
pub struct CheckAddResponse {
    pub safe_to_add: bool,
    pub package: Package,
    pub conflicts: Vec<Conflict>,
    pub suggestions: Vec<String>,
    /// Heuristic in `[0, 1]` for how much of the dependency graph was checked
    pub confidence: f64,
    pub caveats: Vec<String>,
}

/// Checks a package against the current environment
pub struct CheckAddPackage<'r, P, E> {
    packages: P,
    environment: E,
    detector: ConflictDetector<'r>,
    suggestions: SuggestionGenerator<'r>,
}

impl<'r, P, E> CheckAddPackage<'r, P, E>
where
    P: PackageSource,
    E: EnvironmentSource,
{
    /// Both services borrow the caller's `resolver`
    pub fn new(packages: P, environment: E, resolver: &'r VersionResolver) -> Self {
        Self {
            packages,
            environment,
            detector: ConflictDetector::new(resolver),
            suggestions: SuggestionGenerator::new(resolver),
        }
    }

    pub async fn execute(&self, request: &CheckAddRequest) -> PycResult<CheckAddResponse> {
        let environment = self.snapshot()?;
        debug!(
            installed = environment.packages().len(),
            python = %environment.python_version(),
            platform = environment.platform(),
            "environment snapshot taken"
        );

        let package = self
            .packages
            .get_package(&request.package_name, request.version.as_deref())
            .await?;
        info!(package = %package, dependencies = package.dependencies.len(), "checking package");

        let mut conflicts = self.detector.detect_conflicts(&package, &environment);
        let mut caveats = Self::caveats(request);

        match self.detector.check_interpreter(&package, &environment) {
            Ok(Some(conflict)) => conflicts.push(conflict),
            Ok(None) => {},
            Err(err) => {
                debug!(error = %err, "unreadable Requires-Python");
                caveats.push(format!(
                    "Requires-Python constraint '{}' could not be parsed and was not checked",
                    package.requires_python.as_deref().unwrap_or_default()
                ));
            },
        }

        let suggestions = self.suggestions.generate(&package, &conflicts, &environment);

        Ok(CheckAddResponse {
            safe_to_add: conflicts.is_empty(),
            package,
            conflicts,
            suggestions,
            confidence: Self::confidence(request.deep),
            caveats,
        })
    }

    fn snapshot(&self) -> PycResult<Environment> {
        let mut environment = Environment::new(
            self.environment.get_installed_packages()?,
            self.environment.get_interpreter_version()?,
            self.environment.get_platform()?,
        );
        if let Some(machine) = self.environment.get_machine()? {
            environment = environment.with_machine(machine);
        }
        if let Some(implementation) = self.environment.get_implementation()? {
            environment = environment.with_implementation(implementation);
        }
        Ok(environment)
    }

    fn confidence(deep: bool) -> f64 {
        let mut confidence = BASE_CONFIDENCE;
        if deep {
            confidence *= DEEP_FACTOR;
        }
        (confidence * 100.0).round() / 100.0
    }

    fn caveats(request: &CheckAddRequest) -> Vec<String> {
        let mut caveats = vec![
            "Only direct dependencies checked (not transitive)".to_string(),
            "Optional extras not included".to_string(),
        ];
        if request.deep {
            caveats.push(
                "Transitive dependency checking (--deep) is not implemented yet".to_string(),
            );
        } else {
            caveats.push("Use --deep for transitive dependency checking".to_string());
        }
        caveats
    }
}
