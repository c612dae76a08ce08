//! PyPI JSON API client with retry logic and an optional disk cache

use std::time::Duration;

use reqwest::{Client, ClientBuilder, StatusCode};
use tracing::{debug, warn};

use pyconflict_core::{Dependency, Package, PackageSource, PycError, PycResult, SpecifierSet, Version};

use crate::api::PackageResponse;
use crate::cache::DiskCache;

/// Default package index
pub const DEFAULT_INDEX_URL: &str = "https://pypi.org/pypi";

/// Default lifetime of cached responses
pub const DEFAULT_CACHE_TTL: Duration = Duration::from_secs(3600);

/// Configuration for exponential backoff retry logic
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts
    pub max_retries: u32,
    /// Initial delay before first retry
    pub initial_delay: Duration,
    /// Maximum delay between retries
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            multiplier: 2.0,
        }
    }
}

/// HTTP settings for [`PypiClient`]
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Index base URL without trailing slash
    pub base_url: String,
    pub timeout: Duration,
    pub user_agent: String,
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_INDEX_URL.to_string(),
            timeout: Duration::from_secs(30),
            user_agent: concat!("pyconflict/", env!("CARGO_PKG_VERSION")).to_string(),
            retry: RetryConfig::default(),
        }
    }
}

/// Client for the PyPI JSON API
#[derive(Debug, Clone)]
pub struct PypiClient {
    /// Underlying HTTP client with connection pooling
    client: Client,
    retry_config: RetryConfig,
    base_url: String,
    cache: Option<DiskCache>,
    cache_ttl: Duration,
}

impl PypiClient {
    /// Create a client for pypi.org with default settings
    pub fn new() -> PycResult<Self> {
        Self::with_config(ClientConfig::default())
    }

    /// Create a client with custom configuration
    pub fn with_config(config: ClientConfig) -> PycResult<Self> {
        let client = ClientBuilder::new()
            .pool_max_idle_per_host(16)
            .pool_idle_timeout(Duration::from_secs(90))
            .timeout(config.timeout)
            .gzip(true)
            .user_agent(config.user_agent)
            .build()
            .map_err(|e| PycError::network(format!("Failed to create HTTP client: {}", e), e))?;

        Ok(Self {
            client,
            retry_config: config.retry,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            cache: None,
            cache_ttl: DEFAULT_CACHE_TTL,
        })
    }

    /// Serve repeated lookups from `cache`
    pub fn with_cache(mut self, cache: DiskCache) -> Self {
        self.cache = Some(cache);
        self
    }

    pub fn with_cache_ttl(mut self, ttl: Duration) -> Self {
        self.cache_ttl = ttl;
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Execute HTTP request with exponential backoff retry logic
    async fn with_retry<F, Fut, T>(&self, url: &str, operation: F) -> PycResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = PycResult<T>>,
    {
        let mut delay = self.retry_config.initial_delay;
        let attempts = self.retry_config.max_retries.saturating_add(1);
        let mut last_error = None;

        for attempt in 1..=attempts {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(error) if !error.is_recoverable() => return Err(error),
                Err(error) => {
                    debug!(url, attempt, error = %error, "request failed");
                    last_error = Some(error);

                    if attempt == attempts {
                        break;
                    }

                    tokio::time::sleep(delay).await;
                    delay = std::cmp::min(
                        Duration::from_millis(
                            (delay.as_millis() as f64 * self.retry_config.multiplier) as u64,
                        ),
                        self.retry_config.max_delay,
                    );
                },
            }
        }

        let last = last_error
            .map(|e| e.to_string())
            .unwrap_or_else(|| "no attempts were made".to_string());
        Err(PycError::Repository {
            message: format!("Request to {} failed after {} attempts: {}", url, attempts, last),
        })
    }

    /// Fetch the raw JSON document for a package, or one release of it
    pub async fn fetch_json(
        &self,
        name: &str,
        version: Option<&str>,
    ) -> PycResult<serde_json::Value> {
        let cache_key = format!("package:{}:{}", name, version.unwrap_or("latest"));
        if let Some(cached) = self.cache.as_ref().and_then(|cache| cache.get(&cache_key)) {
            return Ok(cached);
        }

        let url = match version {
            Some(version) => format!("{}/{}/{}/json", self.base_url, name, version),
            None => format!("{}/{}/json", self.base_url, name),
        };
        let display_name = match version {
            Some(version) => format!("{}=={}", name, version),
            None => name.to_string(),
        };

        let value = self
            .with_retry(&url, || async {
                debug!(url = %url, "fetching package metadata");
                let response = self
                    .client
                    .get(&url)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| {
                        PycError::network(format!("Failed to fetch {}: {}", url, e), e)
                    })?;

                match response.status() {
                    StatusCode::OK => response.json::<serde_json::Value>().await.map_err(|e| {
                        PycError::network(format!("Failed to parse response from {}: {}", url, e), e)
                    }),
                    StatusCode::NOT_FOUND => Err(PycError::PackageNotFound {
                        name: display_name.clone(),
                    }),
                    StatusCode::TOO_MANY_REQUESTS => Err(PycError::RateLimited { url: url.clone() }),
                    status => Err(PycError::Network {
                        message: format!("Index returned status {} for {}", status, url),
                        source: None,
                    }),
                }
            })
            .await?;

        if let Some(cache) = &self.cache {
            if let Err(err) = cache.set(&cache_key, value.clone(), self.cache_ttl) {
                warn!(key = %cache_key, error = %err, "failed to cache response");
            }
        }

        Ok(value)
    }

    async fn fetch_response(&self, name: &str, version: Option<&str>) -> PycResult<PackageResponse> {
        let value = self.fetch_json(name, version).await?;
        serde_json::from_value(value).map_err(|e| PycError::Repository {
            message: format!("Unexpected metadata format for '{}': {}", name, e),
        })
    }
}

/// Turn a metadata document into a [`Package`]. Requirement lines that do
/// not parse are dropped.
pub fn package_from_response(response: &PackageResponse) -> PycResult<Package> {
    let info = &response.info;
    let version = Version::parse(&info.version)?;

    let mut package = Package::new(info.name.clone(), version);
    if let Some(requires_python) = info.requires_python() {
        package = package.with_requires_python(requires_python);
    }

    for line in info.requires_dist.iter().flatten() {
        match Dependency::parse(line) {
            Ok(dependency) => package = package.with_dependency(dependency),
            Err(err) => debug!(package = %info.name, requirement = %line, error = %err, "skipping requirement"),
        }
    }

    Ok(package)
}

/// Newest stable release in `response` that is not fully yanked and, when
/// `python_version` is given, whose files all admit that interpreter
pub fn latest_stable_from_response(
    response: &PackageResponse,
    python_version: Option<&Version>,
) -> Option<Version> {
    response
        .releases
        .iter()
        .filter_map(|(key, files)| {
            let version = Version::parse(key).ok()?;
            if version.is_prerelease() {
                return None;
            }
            if !files.is_empty() && files.iter().all(|file| file.yanked) {
                return None;
            }
            if let Some(python) = python_version {
                let excluded = files.iter().any(|file| {
                    file.requires_python()
                        .and_then(|spec| SpecifierSet::parse(spec).ok())
                        .map_or(false, |spec| !spec.contains_with_prereleases(python, true))
                });
                if excluded {
                    return None;
                }
            }
            Some(version)
        })
        .max()
}

impl PackageSource for PypiClient {
    async fn get_package(&self, name: &str, version: Option<&str>) -> PycResult<Package> {
        let response = self.fetch_response(name, version).await?;
        package_from_response(&response)
    }

    async fn get_latest_stable(
        &self,
        name: &str,
        python_version: Option<&Version>,
    ) -> PycResult<Version> {
        let response = self.fetch_response(name, None).await?;
        latest_stable_from_response(&response, python_version).ok_or_else(|| {
            PycError::Repository {
                message: format!("No stable version found for {}", name),
            }
        })
    }

    async fn get_all_versions(&self, name: &str) -> PycResult<Vec<Version>> {
        let response = self.fetch_response(name, None).await?;
        let mut versions: Vec<Version> = response
            .releases
            .keys()
            .filter_map(|key| match Version::parse(key) {
                Ok(version) => Some(version),
                Err(_) => {
                    debug!(package = name, release = %key, "skipping unparseable release");
                    None
                },
            })
            .collect();
        versions.sort_by(|a, b| b.cmp(a));
        Ok(versions)
    }
}
