//! `pyconflict stable`

use pyconflict_core::utils::is_valid_name;
use pyconflict_core::{PackageSource, PycError, PycResult};
use pyconflict_resolver::{LatestStable, LatestStableRequest};

use super::{CommandContext, ExitStatus};
use crate::output::{report, OutputHandler};

pub fn build_request(package: &str, python_version: Option<String>) -> PycResult<LatestStableRequest> {
    let name = package.trim();
    if !is_valid_name(name) {
        return Err(PycError::InvalidRequirement {
            requirement: package.to_string(),
            reason: "expected a package name".to_string(),
        });
    }
    Ok(LatestStableRequest {
        package_name: name.to_string(),
        python_version: python_version.map(|v| v.trim().to_string()),
    })
}

pub async fn execute(
    request: LatestStableRequest,
    json: bool,
    ctx: &CommandContext,
) -> PycResult<ExitStatus> {
    run(&request, ctx.package_source()?, json, &ctx.output).await
}

pub async fn run<P: PackageSource>(
    request: &LatestStableRequest,
    packages: P,
    json: bool,
    output: &OutputHandler,
) -> PycResult<ExitStatus> {
    let response = LatestStable::new(packages).execute(request).await?;

    let rendered = if json {
        report::stable_json(&response)?
    } else {
        report::stable_human(&response, output.colors())
    };
    output.print(&rendered);

    Ok(ExitStatus::Success)
}
