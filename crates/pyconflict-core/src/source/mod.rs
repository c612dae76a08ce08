//! Ports to the outside world.
//!
//! The resolver only ever sees these traits. The registry crate implements
//! [`PackageSource`] over the PyPI JSON API and the CLI implements
//! [`EnvironmentSource`] by inspecting a Python interpreter; tests substitute
//! in-memory versions of both.

use std::collections::BTreeMap;

use crate::error::PycResult;
use crate::types::{Package, Version};

/// Where package metadata comes from
#[allow(async_fn_in_trait)]
pub trait PackageSource {
    /// Fetch one release, or the latest one when `version` is `None`.
    ///
    /// Fails with `PackageNotFound` when the name or version is unknown.
    async fn get_package(&self, name: &str, version: Option<&str>) -> PycResult<Package>;

    /// Newest stable, non-yanked release. With `python_version`, only
    /// releases whose `Requires-Python` admits that interpreter qualify.
    ///
    /// Fails with `Repository` when no release qualifies.
    async fn get_latest_stable(
        &self,
        name: &str,
        python_version: Option<&Version>,
    ) -> PycResult<Version>;

    /// Every parseable release version, newest first
    async fn get_all_versions(&self, name: &str) -> PycResult<Vec<Version>>;
}

/// Facts about the environment a package would be installed into
pub trait EnvironmentSource {
    /// Installed distributions keyed by their declared name
    fn get_installed_packages(&self) -> PycResult<BTreeMap<String, Version>>;

    fn get_interpreter_version(&self) -> PycResult<Version>;

    /// `sys.platform` value
    fn get_platform(&self) -> PycResult<String>;

    /// `platform.machine()` value, when known
    fn get_machine(&self) -> PycResult<Option<String>> {
        Ok(None)
    }

    /// `sys.implementation.name`, when known
    fn get_implementation(&self) -> PycResult<Option<String>> {
        Ok(None)
    }
}
