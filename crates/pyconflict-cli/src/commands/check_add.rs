//! `pyconflict check-add`

use tracing::info;

use pyconflict_core::utils::is_valid_name;
use pyconflict_core::{EnvironmentSource, PackageSource, PycError, PycResult, Version};
use pyconflict_resolver::{CheckAddPackage, CheckAddRequest, VersionResolver};

use super::{CommandContext, ExitStatus};
use crate::output::{report, OutputHandler};

/// Build a request from `name`, `name==version` or `name` plus `--version`
pub fn build_request(package: &str, pinned: Option<&str>, deep: bool) -> PycResult<CheckAddRequest> {
    let (name, version) = match (package.split_once("=="), pinned) {
        (Some((name, version)), None) => (name.trim(), Some(version.trim())),
        _ => (package.trim(), pinned.map(str::trim)),
    };

    if !is_valid_name(name) {
        return Err(PycError::InvalidRequirement {
            requirement: package.to_string(),
            reason: "expected a package name, optionally followed by ==VERSION".to_string(),
        });
    }

    let mut request = CheckAddRequest::new(name).deep(deep);
    if let Some(version) = version {
        Version::parse(version)?;
        request = request.with_version(version);
    }
    Ok(request)
}

pub async fn execute(request: CheckAddRequest, json: bool, ctx: &CommandContext) -> PycResult<ExitStatus> {
    info!(package = %request.package_name, version = ?request.version, "checking package");
    let packages = ctx.package_source()?;
    let environment = ctx.environment_source()?;
    run(&request, packages, environment, &ctx.resolver, json, &ctx.output).await
}

/// Run the check against any sources and print the result
pub async fn run<P, E>(
    request: &CheckAddRequest,
    packages: P,
    environment: E,
    resolver: &VersionResolver,
    json: bool,
    output: &OutputHandler,
) -> PycResult<ExitStatus>
where
    P: PackageSource,
    E: EnvironmentSource,
{
    let response = CheckAddPackage::new(packages, environment, resolver)
        .execute(request)
        .await?;

    let rendered = if json {
        report::check_add_json(&response)?
    } else {
        report::check_add_human(&response, output.colors())
    };
    output.print(&rendered);

    Ok(if response.safe_to_add {
        ExitStatus::Success
    } else {
        ExitStatus::Conflict
    })
}
