//! The latest-stable use case.

use serde::Serialize;
use tracing::info;

use pyconflict_core::{PackageSource, PycResult, Version};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LatestStableRequest {
    pub package_name: String,
    /// Only consider releases installable on this interpreter, e.g. `3.8`
    pub python_version: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LatestStableResponse {
    pub package_name: String,
    pub version: Version,
    pub is_filtered_by_python: bool,
}

/// Looks up the newest stable release of a package
pub struct LatestStable<P> {
    packages: P,
}

impl<P: PackageSource> LatestStable<P> {
    pub fn new(packages: P) -> Self {
        Self { packages }
    }

    pub async fn execute(&self, request: &LatestStableRequest) -> PycResult<LatestStableResponse> {
        let python = request
            .python_version
            .as_deref()
            .map(Version::parse)
            .transpose()?;

        let version = self
            .packages
            .get_latest_stable(&request.package_name, python.as_ref())
            .await?;
        info!(package = %request.package_name, version = %version, "latest stable release");

        Ok(LatestStableResponse {
            package_name: request.package_name.clone(),
            version,
            is_filtered_by_python: python.is_some(),
        })
    }
}
