//! In-memory sources for use case tests.

use std::collections::BTreeMap;

use pyconflict_core::utils::normalize_name;
use pyconflict_core::{
    EnvironmentSource, Package, PackageSource, PycError, PycResult, SpecifierSet, Version,
};

#[derive(Debug, Clone, Default)]
pub struct MockPackageSource {
    releases: BTreeMap<String, Vec<Package>>,
}

impl MockPackageSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_package(mut self, package: Package) -> Self {
        self.releases
            .entry(package.normalized_name())
            .or_default()
            .push(package);
        self
    }

    fn releases(&self, name: &str) -> PycResult<&Vec<Package>> {
        self.releases
            .get(&normalize_name(name))
            .ok_or_else(|| PycError::PackageNotFound {
                name: name.to_string(),
            })
    }
}

impl PackageSource for MockPackageSource {
    async fn get_package(&self, name: &str, version: Option<&str>) -> PycResult<Package> {
        let releases = self.releases(name)?;
        let found = match version {
            Some(version) => {
                let wanted = Version::parse(version)?;
                releases.iter().find(|p| p.version == wanted)
            },
            None => releases
                .iter()
                .filter(|p| !p.version.is_prerelease())
                .max_by(|a, b| a.version.cmp(&b.version)),
        };
        found.cloned().ok_or_else(|| PycError::PackageNotFound {
            name: format!("{}=={}", name, version.unwrap_or("latest")),
        })
    }

    async fn get_latest_stable(
        &self,
        name: &str,
        python_version: Option<&Version>,
    ) -> PycResult<Version> {
        self.releases(name)?
            .iter()
            .filter(|p| !p.version.is_prerelease())
            .filter(|p| match (python_version, p.requires_python.as_deref()) {
                (Some(python), Some(requires)) => SpecifierSet::parse(requires)
                    .map(|spec| spec.contains_with_prereleases(python, true))
                    .unwrap_or(true),
                _ => true,
            })
            .map(|p| p.version.clone())
            .max()
            .ok_or_else(|| PycError::Repository {
                message: format!("No stable version found for {}", name),
            })
    }

    async fn get_all_versions(&self, name: &str) -> PycResult<Vec<Version>> {
        let mut versions: Vec<Version> =
            self.releases(name)?.iter().map(|p| p.version.clone()).collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }
}

#[derive(Debug, Clone)]
pub struct MockEnvironment {
    pub packages: BTreeMap<String, Version>,
    pub python: Version,
    pub platform: String,
}

impl MockEnvironment {
    pub fn new(packages: &[(&str, &str)]) -> Self {
        Self {
            packages: packages
                .iter()
                .map(|(name, version)| (name.to_string(), Version::parse(version).unwrap()))
                .collect(),
            python: Version::new([3, 11, 4]),
            platform: "linux".to_string(),
        }
    }

    pub fn with_python(mut self, python: &str) -> Self {
        self.python = Version::parse(python).unwrap();
        self
    }
}

impl EnvironmentSource for MockEnvironment {
    fn get_installed_packages(&self) -> PycResult<BTreeMap<String, Version>> {
        Ok(self.packages.clone())
    }

    fn get_interpreter_version(&self) -> PycResult<Version> {
        Ok(self.python.clone())
    }

    fn get_platform(&self) -> PycResult<String> {
        Ok(self.platform.clone())
    }
}
