//! `pyconflict.toml` parsing and validation
//!
//! The same schema is accepted at the top level of `pyconflict.toml` and
//! under `[tool.pyconflict]` in `pyproject.toml`. Every key is optional.

use camino::Utf8Path;
use serde::{Deserialize, Serialize};
use url::Url;

use pyconflict_core::PycError;

use crate::ConfigResult;

/// Upper bound for `index.max-retries`
pub const MAX_RETRIES_LIMIT: u32 = 10;

/// Complete configuration file
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct ConfigFile {
    pub index: IndexSection,
    pub cache: CacheSection,
    pub environment: EnvironmentSection,
}

/// `[index]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct IndexSection {
    /// JSON API base URL
    pub url: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_retries: Option<u32>,
}

/// `[cache]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct CacheSection {
    pub enabled: Option<bool>,
    pub dir: Option<String>,
    pub max_size_mb: Option<u64>,
    pub ttl_secs: Option<u64>,
}

/// `[environment]` section
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "kebab-case")]
pub struct EnvironmentSection {
    /// Interpreter to inspect
    pub python: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct PyProject {
    #[serde(default)]
    tool: Option<ToolTable>,
}

#[derive(Debug, Default, Deserialize)]
struct ToolTable {
    #[serde(default)]
    pyconflict: Option<ConfigFile>,
}

/// Parse a `pyconflict.toml` document
pub fn parse_config_file(content: &str) -> ConfigResult<ConfigFile> {
    let config: ConfigFile =
        ::toml::from_str(content).map_err(|e| toml_error(content, &e))?;
    validate_config(&config)?;
    Ok(config)
}

/// Parse the `[tool.pyconflict]` table of a `pyproject.toml` document.
/// Returns `None` when the table is absent.
pub fn parse_pyproject(content: &str) -> ConfigResult<Option<ConfigFile>> {
    let pyproject: PyProject = ::toml::from_str(content).map_err(|e| toml_error(content, &e))?;
    let config = pyproject.tool.and_then(|tool| tool.pyconflict);
    if let Some(config) = &config {
        validate_config(config)?;
    }
    Ok(config)
}

/// Serialize a configuration back to TOML
pub fn serialize_config(config: &ConfigFile) -> ConfigResult<String> {
    ::toml::to_string_pretty(config).map_err(|e| PycError::TomlParse {
        message: format!("TOML serialization error: {}", e),
        line: 0,
        column: 0,
    })
}

/// Check value ranges. Field names use their dotted TOML path.
pub fn validate_config(config: &ConfigFile) -> ConfigResult<()> {
    if let Some(url) = &config.index.url {
        validate_index_url("index.url", url)?;
    }
    if config.index.timeout_secs == Some(0) {
        return Err(invalid("index.timeout-secs", "must be greater than zero"));
    }
    if let Some(retries) = config.index.max_retries {
        validate_max_retries("index.max-retries", retries)?;
    }
    if config.cache.max_size_mb == Some(0) {
        return Err(invalid("cache.max-size-mb", "must be greater than zero"));
    }
    if matches!(&config.cache.dir, Some(dir) if dir.trim().is_empty()) {
        return Err(invalid("cache.dir", "must not be empty"));
    }
    if matches!(&config.environment.python, Some(python) if python.trim().is_empty()) {
        return Err(invalid("environment.python", "must not be empty"));
    }
    Ok(())
}

pub fn validate_max_retries(field: &str, value: u32) -> ConfigResult<u32> {
    if value > MAX_RETRIES_LIMIT {
        return Err(invalid(
            field,
            &format!("{} exceeds the maximum of {}", value, MAX_RETRIES_LIMIT),
        ));
    }
    Ok(value)
}

/// Accept only absolute http(s) URLs
pub fn validate_index_url(field: &str, value: &str) -> ConfigResult<String> {
    let url = Url::parse(value).map_err(|e| invalid(field, &format!("'{}' is not a valid URL: {}", value, e)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(invalid(
            field,
            &format!("unsupported scheme '{}', expected http or https", url.scheme()),
        ));
    }
    Ok(value.trim_end_matches('/').to_string())
}

/// Load and parse a `pyconflict.toml` file
pub async fn load_from_file(path: &Utf8Path) -> ConfigResult<ConfigFile> {
    let content = read(path).await?;
    parse_config_file(&content).map_err(|e| in_file(path, e))
}

/// Load the `[tool.pyconflict]` table from a `pyproject.toml` file
pub async fn load_pyproject(path: &Utf8Path) -> ConfigResult<Option<ConfigFile>> {
    let content = read(path).await?;
    parse_pyproject(&content).map_err(|e| in_file(path, e))
}

async fn read(path: &Utf8Path) -> ConfigResult<String> {
    tokio::fs::read_to_string(path)
        .await
        .map_err(|e| PycError::io(format!("Failed to read {}", path), e))
}

fn in_file(path: &Utf8Path, error: PycError) -> PycError {
    match error {
        PycError::TomlParse { message, line, column } => PycError::TomlParse {
            message: format!("{}: {}", path, message),
            line,
            column,
        },
        PycError::ConfigValidation { field, reason } => PycError::ConfigValidation {
            field,
            reason: format!("{} (in {})", reason, path),
        },
        other => other,
    }
}

pub(crate) fn invalid(field: &str, reason: &str) -> PycError {
    PycError::ConfigValidation {
        field: field.to_string(),
        reason: reason.to_string(),
    }
}

fn toml_error(content: &str, error: &::toml::de::Error) -> PycError {
    let (line, column) = error
        .span()
        .map(|span| line_column(content, span.start))
        .unwrap_or((0, 0));
    PycError::TomlParse {
        message: error.message().to_string(),
        line,
        column,
    }
}

/// 1-based line and column of a byte offset
fn line_column(content: &str, offset: usize) -> (usize, usize) {
    let offset = offset.min(content.len());
    let before = &content[..offset];
    let line = before.matches('\n').count() + 1;
    let line_start = before.rfind('\n').map_or(0, |idx| idx + 1);
    let column = before[line_start..].chars().count() + 1;
    (line, column)
}
