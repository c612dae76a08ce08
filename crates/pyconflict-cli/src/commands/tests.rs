//! Unit tests for CLI commands.

use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use super::*;
use pyconflict_core::{Dependency, EnvironmentSource, Package, PackageSource, Version};
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::CacheAction;

fn v(s: &str) -> Version {
    Version::parse(s).unwrap()
}

#[derive(Default)]
struct StubPackages {
    packages: HashMap<String, Package>,
}

impl StubPackages {
    fn with(mut self, package: Package) -> Self {
        self.packages.insert(package.normalized_name(), package);
        self
    }
}

impl PackageSource for StubPackages {
    async fn get_package(&self, name: &str, _version: Option<&str>) -> PycResult<Package> {
        self.packages
            .get(name)
            .cloned()
            .ok_or_else(|| PycError::PackageNotFound { name: name.to_string() })
    }

    async fn get_latest_stable(&self, name: &str, _python: Option<&Version>) -> PycResult<Version> {
        self.get_package(name, None).await.map(|p| p.version)
    }

    async fn get_all_versions(&self, name: &str) -> PycResult<Vec<Version>> {
        self.get_package(name, None).await.map(|p| vec![p.version])
    }
}

struct StubEnvironment {
    installed: BTreeMap<String, Version>,
}

impl StubEnvironment {
    fn new(installed: &[(&str, &str)]) -> Self {
        Self {
            installed: installed
                .iter()
                .map(|(name, version)| (name.to_string(), v(version)))
                .collect(),
        }
    }
}

impl EnvironmentSource for StubEnvironment {
    fn get_installed_packages(&self) -> PycResult<BTreeMap<String, Version>> {
        Ok(self.installed.clone())
    }

    fn get_interpreter_version(&self) -> PycResult<Version> {
        Ok(v("3.11.4"))
    }

    fn get_platform(&self) -> PycResult<String> {
        Ok("linux".to_string())
    }
}

fn django() -> Package {
    Package::new("django", v("4.2.0"))
        .with_dependency(Dependency::parse("sqlparse>=0.3.1").unwrap())
        .with_dependency(Dependency::parse("asgiref<4,>=3.6.0").unwrap())
}

fn test_context(cache_dir: &TempDir) -> CommandContext {
    let settings = Settings {
        cache_dir: Utf8PathBuf::from_path_buf(cache_dir.path().to_path_buf()).unwrap(),
        ..Settings::default()
    };
    CommandContext {
        settings,
        output: OutputHandler::plain(),
        resolver: VersionResolver::new(),
    }
}

#[test]
fn test_build_request_forms() {
    let request = check_add::build_request("django", None, false).unwrap();
    assert_eq!(request.package_name, "django");
    assert_eq!(request.version, None);

    let request = check_add::build_request("django==3.2", None, true).unwrap();
    assert_eq!(request.package_name, "django");
    assert_eq!(request.version.as_deref(), Some("3.2"));
    assert!(request.deep);

    let request = check_add::build_request("requests", Some("2.28.0"), false).unwrap();
    assert_eq!(request.version.as_deref(), Some("2.28.0"));
}

#[test]
fn test_build_request_rejects_bad_input() {
    let err = check_add::build_request("django==3.x", None, false).unwrap_err();
    assert_eq!(ExitStatus::from_error(&err), ExitStatus::InvalidInput);

    let err = check_add::build_request("not a package", None, false).unwrap_err();
    assert_eq!(ExitStatus::from_error(&err), ExitStatus::InvalidInput);

    let err = check_add::build_request("django==3.2", Some("4.0"), false).unwrap_err();
    assert!(matches!(err, PycError::InvalidRequirement { .. }));

    assert!(stable::build_request("", None).is_err());
}

#[test]
fn test_exit_status_mapping() {
    let cases = [
        (PycError::PackageNotFound { name: "x".into() }, ExitStatus::NotFound),
        (PycError::invalid_version("1.x", "bad"), ExitStatus::InvalidInput),
        (
            PycError::ConfigValidation {
                field: "index.url".into(),
                reason: "bad".into(),
            },
            ExitStatus::InvalidInput,
        ),
        (PycError::Repository { message: "down".into() }, ExitStatus::Repository),
        (PycError::RateLimited { url: "u".into() }, ExitStatus::Repository),
        (
            PycError::Network {
                message: "timeout".into(),
                source: None,
            },
            ExitStatus::Repository,
        ),
        (PycError::Environment { message: "no python".into() }, ExitStatus::Unexpected),
    ];

    for (error, expected) in cases {
        assert_eq!(ExitStatus::from_error(&error), expected, "{error}");
    }

    let codes: Vec<u8> = [
        ExitStatus::Success,
        ExitStatus::Conflict,
        ExitStatus::NotFound,
        ExitStatus::InvalidInput,
        ExitStatus::Repository,
        ExitStatus::Unexpected,
    ]
    .iter()
    .map(|status| status.code())
    .collect();
    assert_eq!(codes, vec![0, 1, 2, 3, 4, 5]);
}

#[tokio::test]
async fn test_check_add_safe() {
    let request = check_add::build_request("django", None, false).unwrap();
    let status = check_add::run(
        &request,
        StubPackages::default().with(django()),
        StubEnvironment::new(&[("sqlparse", "0.4.4"), ("asgiref", "3.7.2")]),
        &VersionResolver::new(),
        true,
        &OutputHandler::plain(),
    )
    .await
    .unwrap();

    assert_eq!(status, ExitStatus::Success);
}

#[tokio::test]
async fn test_check_add_conflict() {
    let request = check_add::build_request("django", None, false).unwrap();
    let status = check_add::run(
        &request,
        StubPackages::default().with(django()),
        StubEnvironment::new(&[("sqlparse", "0.2.4")]),
        &VersionResolver::new(),
        false,
        &OutputHandler::plain(),
    )
    .await
    .unwrap();

    assert_eq!(status, ExitStatus::Conflict);
}

#[tokio::test]
async fn test_check_add_unknown_package() {
    let request = check_add::build_request("djagno", None, false).unwrap();
    let err = check_add::run(
        &request,
        StubPackages::default(),
        StubEnvironment::new(&[]),
        &VersionResolver::new(),
        true,
        &OutputHandler::plain(),
    )
    .await
    .unwrap_err();

    assert_eq!(ExitStatus::from_error(&err), ExitStatus::NotFound);
}

#[tokio::test]
async fn test_stable_against_index() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/numpy/json"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "info": {"name": "numpy", "version": "2.0.0"},
            "releases": {
                "1.24.4": [{"requires_python": ">=3.8", "yanked": false}],
                "2.0.0": [{"requires_python": ">=3.9", "yanked": false}]
            }
        })))
        .mount(&server)
        .await;

    let cache_dir = TempDir::new().unwrap();
    let mut ctx = test_context(&cache_dir);
    ctx.settings.index_url = server.uri();
    ctx.settings.max_retries = 0;

    let request = stable::build_request("numpy", Some("3.8".to_string())).unwrap();
    let status = stable::run(&request, ctx.package_source().unwrap(), true, &ctx.output)
        .await
        .unwrap();
    assert_eq!(status, ExitStatus::Success);

    // The response was cached under the configured directory
    assert_eq!(ctx.cache().unwrap().stats().unwrap().total_entries, 1);
}

#[test]
fn test_cache_commands() {
    let cache_dir = TempDir::new().unwrap();
    let ctx = test_context(&cache_dir);
    let cache = ctx.cache().unwrap();
    cache.set("fresh", json!(1), Duration::from_secs(60)).unwrap();
    cache.set("stale", json!(2), Duration::ZERO).unwrap();

    assert_eq!(cache::execute(CacheAction::Info, &ctx).unwrap(), ExitStatus::Success);

    cache::execute(CacheAction::Prune, &ctx).unwrap();
    assert_eq!(cache.stats().unwrap().total_entries, 1);

    cache::execute(CacheAction::Clear, &ctx).unwrap();
    assert_eq!(cache.stats().unwrap().total_entries, 0);
}

#[test]
fn test_disabled_cache_is_not_attached() {
    let cache_dir = TempDir::new().unwrap();
    let mut ctx = test_context(&cache_dir);
    ctx.settings.cache_enabled = false;

    let client = ctx.package_source().unwrap();
    assert_eq!(client.base_url(), "https://pypi.org/pypi");
}
