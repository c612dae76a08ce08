//! Configuration layering, fallback logic, and environment overrides

use std::collections::HashMap;
use std::time::Duration;

use camino::{Utf8Path, Utf8PathBuf};
use tracing::debug;

use crate::toml::{
    invalid, load_from_file, load_pyproject, validate_index_url, validate_max_retries, ConfigFile,
};
use crate::ConfigResult;

/// Project configuration file name
pub const PROJECT_CONFIG_FILE: &str = "pyconflict.toml";
/// Fallback project file carrying a `[tool.pyconflict]` table
pub const PYPROJECT_FILE: &str = "pyproject.toml";

/// Environment variables understood by the loader
pub const ENV_INDEX_URL: &str = "PYCONFLICT_INDEX_URL";
pub const ENV_TIMEOUT: &str = "PYCONFLICT_TIMEOUT";
pub const ENV_MAX_RETRIES: &str = "PYCONFLICT_MAX_RETRIES";
pub const ENV_CACHE_DIR: &str = "PYCONFLICT_CACHE_DIR";
pub const ENV_NO_CACHE: &str = "PYCONFLICT_NO_CACHE";
pub const ENV_CACHE_TTL: &str = "PYCONFLICT_CACHE_TTL";
pub const ENV_PYTHON: &str = "PYCONFLICT_PYTHON";

/// Fully resolved settings
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Settings {
    pub index_url: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub cache_enabled: bool,
    pub cache_dir: Utf8PathBuf,
    pub cache_max_size_mb: u64,
    pub cache_ttl_secs: u64,
    /// Interpreter command or path
    pub python: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            index_url: "https://pypi.org/pypi".to_string(),
            timeout_secs: 30,
            max_retries: 3,
            cache_enabled: true,
            cache_dir: default_cache_dir(),
            cache_max_size_mb: 100,
            cache_ttl_secs: 3600,
            python: "python3".to_string(),
        }
    }
}

impl Settings {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Overlay the keys present in a configuration file
    pub fn apply_file(&mut self, file: &ConfigFile) {
        if let Some(url) = &file.index.url {
            self.index_url = url.trim_end_matches('/').to_string();
        }
        if let Some(timeout) = file.index.timeout_secs {
            self.timeout_secs = timeout;
        }
        if let Some(retries) = file.index.max_retries {
            self.max_retries = retries;
        }
        if let Some(enabled) = file.cache.enabled {
            self.cache_enabled = enabled;
        }
        if let Some(dir) = &file.cache.dir {
            self.cache_dir = Utf8PathBuf::from(dir);
        }
        if let Some(max_size) = file.cache.max_size_mb {
            self.cache_max_size_mb = max_size;
        }
        if let Some(ttl) = file.cache.ttl_secs {
            self.cache_ttl_secs = ttl;
        }
        if let Some(python) = &file.environment.python {
            self.python = python.clone();
        }
    }

    /// Overlay `PYCONFLICT_*` variables. Returns the names that were applied.
    pub fn apply_env(&mut self, env: &HashMap<String, String>) -> ConfigResult<Vec<String>> {
        let mut keys: Vec<&String> = env.keys().collect();
        keys.sort();

        let mut applied = Vec::new();
        for key in keys {
            let value = env[key].trim();
            match key.as_str() {
                ENV_INDEX_URL => self.index_url = validate_index_url(key, value)?,
                ENV_TIMEOUT => self.timeout_secs = parse_positive(key, value)?,
                ENV_MAX_RETRIES => {
                    let retries = value
                        .parse()
                        .map_err(|_| invalid(key, &format!("'{}' is not a whole number", value)))?;
                    self.max_retries = validate_max_retries(key, retries)?;
                },
                ENV_CACHE_DIR => {
                    if value.is_empty() {
                        return Err(invalid(key, "must not be empty"));
                    }
                    self.cache_dir = Utf8PathBuf::from(value);
                },
                ENV_NO_CACHE => self.cache_enabled = !parse_flag(key, value)?,
                ENV_CACHE_TTL => {
                    self.cache_ttl_secs = value
                        .parse()
                        .map_err(|_| invalid(key, &format!("'{}' is not a number of seconds", value)))?;
                },
                ENV_PYTHON => {
                    if value.is_empty() {
                        return Err(invalid(key, "must not be empty"));
                    }
                    self.python = value.to_string();
                },
                _ => continue,
            }
            applied.push(key.clone());
        }

        Ok(applied)
    }

    /// Apply CLI flag overrides. Returns whether any flag was set.
    pub fn apply_cli(&mut self, cli: &CliOverrides) -> ConfigResult<bool> {
        let mut applied = false;
        if let Some(url) = &cli.index_url {
            self.index_url = validate_index_url("--index-url", url)?;
            applied = true;
        }
        if let Some(python) = &cli.python {
            self.python = python.clone();
            applied = true;
        }
        if cli.no_cache {
            self.cache_enabled = false;
            applied = true;
        }
        Ok(applied)
    }
}

/// Values passed on the command line
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CliOverrides {
    pub index_url: Option<String>,
    pub python: Option<String>,
    pub no_cache: bool,
}

/// Configuration source tracking
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    /// Built-in defaults
    Defaults,
    /// Global config file
    Global(Utf8PathBuf),
    /// Project pyconflict.toml file
    ProjectToml(Utf8PathBuf),
    /// `[tool.pyconflict]` in a pyproject.toml file
    PyProject(Utf8PathBuf),
    /// Environment variable
    Environment(String),
    /// CLI flag
    CommandLine,
}

/// Resolved settings and where they came from, lowest precedence first
#[derive(Debug, Clone)]
pub struct LoadedConfig {
    pub settings: Settings,
    pub sources: Vec<ConfigSource>,
}

/// Main configuration loading interface
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    /// Directory the project search starts from
    cwd: Utf8PathBuf,
    /// Global config file, if the platform has a config directory
    global_path: Option<Utf8PathBuf>,
}

impl ConfigLoader {
    /// Create a new configuration loader
    pub fn new(cwd: Utf8PathBuf) -> Self {
        Self {
            cwd,
            global_path: default_global_path(),
        }
    }

    /// Use a specific global config file, or none
    pub fn with_global_path(mut self, path: Option<Utf8PathBuf>) -> Self {
        self.global_path = path;
        self
    }

    /// Resolve settings from every layer
    pub async fn load(
        &self,
        env: &HashMap<String, String>,
        cli: &CliOverrides,
    ) -> ConfigResult<LoadedConfig> {
        let mut settings = Settings::default();
        let mut sources = vec![ConfigSource::Defaults];

        if let Some((file, path)) = self.load_global_config().await? {
            settings.apply_file(&file);
            sources.push(ConfigSource::Global(path));
        }

        if let Some((file, source)) = self.load_project_config().await? {
            settings.apply_file(&file);
            sources.push(source);
        }

        for key in settings.apply_env(env)? {
            sources.push(ConfigSource::Environment(key));
        }

        if settings.apply_cli(cli)? {
            sources.push(ConfigSource::CommandLine);
        }

        debug!(?sources, "configuration resolved");
        Ok(LoadedConfig { settings, sources })
    }

    /// Load global configuration
    pub async fn load_global_config(&self) -> ConfigResult<Option<(ConfigFile, Utf8PathBuf)>> {
        match &self.global_path {
            Some(path) if path.is_file() => {
                let config = load_from_file(path).await?;
                Ok(Some((config, path.clone())))
            },
            _ => Ok(None),
        }
    }

    /// Walk up from the working directory to the nearest project
    /// configuration. In each directory `pyconflict.toml` wins; a
    /// `pyproject.toml` only counts when it has a `[tool.pyconflict]` table.
    pub async fn load_project_config(&self) -> ConfigResult<Option<(ConfigFile, ConfigSource)>> {
        let mut current: Option<&Utf8Path> = Some(self.cwd.as_path());

        while let Some(dir) = current {
            let config_path = dir.join(PROJECT_CONFIG_FILE);
            if config_path.is_file() {
                let config = load_from_file(&config_path).await?;
                return Ok(Some((config, ConfigSource::ProjectToml(config_path))));
            }

            let pyproject_path = dir.join(PYPROJECT_FILE);
            if pyproject_path.is_file() {
                if let Some(config) = load_pyproject(&pyproject_path).await? {
                    return Ok(Some((config, ConfigSource::PyProject(pyproject_path))));
                }
            }

            current = dir.parent();
        }

        Ok(None)
    }
}

/// Collect `PYCONFLICT_*` variables from the process environment
pub fn collect_env_overrides() -> HashMap<String, String> {
    std::env::vars()
        .filter(|(key, _)| key.starts_with("PYCONFLICT_"))
        .collect()
}

/// `<config_dir>/pyconflict/config.toml`
pub fn default_global_path() -> Option<Utf8PathBuf> {
    let dir = Utf8PathBuf::from_path_buf(dirs::config_dir()?).ok()?;
    Some(dir.join("pyconflict").join("config.toml"))
}

/// `<cache_dir>/pyconflict`, falling back to the temp directory
pub fn default_cache_dir() -> Utf8PathBuf {
    dirs::cache_dir()
        .and_then(|dir| Utf8PathBuf::from_path_buf(dir).ok())
        .or_else(|| Utf8PathBuf::from_path_buf(std::env::temp_dir()).ok())
        .unwrap_or_else(|| Utf8PathBuf::from("."))
        .join("pyconflict")
}

fn parse_positive(field: &str, value: &str) -> ConfigResult<u64> {
    match value.parse::<u64>() {
        Ok(0) => Err(invalid(field, "must be greater than zero")),
        Ok(number) => Ok(number),
        Err(_) => Err(invalid(field, &format!("'{}' is not a whole number", value))),
    }
}

fn parse_flag(field: &str, value: &str) -> ConfigResult<bool> {
    match value.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "" | "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(invalid(field, &format!("'{}' is not a boolean", value))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pyconflict_core::PycError;
    use tempfile::TempDir;

    fn temp_dir() -> (TempDir, Utf8PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = Utf8PathBuf::try_from(dir.path().to_path_buf()).unwrap();
        (dir, path)
    }

    fn env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[tokio::test]
    async fn test_defaults_only() {
        let (_dir, cwd) = temp_dir();
        let loader = ConfigLoader::new(cwd).with_global_path(None);

        let loaded = loader.load(&HashMap::new(), &CliOverrides::default()).await.unwrap();

        assert_eq!(loaded.settings.index_url, "https://pypi.org/pypi");
        assert_eq!(loaded.settings.timeout(), Duration::from_secs(30));
        assert_eq!(loaded.settings.cache_ttl(), Duration::from_secs(3600));
        assert!(loaded.settings.cache_enabled);
        assert_eq!(loaded.settings.python, "python3");
        assert_eq!(loaded.sources, vec![ConfigSource::Defaults]);
    }

    #[tokio::test]
    async fn test_project_config_found_in_parent() {
        let (_dir, root) = temp_dir();
        tokio::fs::write(root.join(PROJECT_CONFIG_FILE), "[index]\nmax-retries = 7\n")
            .await
            .unwrap();
        let nested = root.join("src").join("app");
        tokio::fs::create_dir_all(&nested).await.unwrap();

        let loader = ConfigLoader::new(nested).with_global_path(None);
        let (config, source) = loader.load_project_config().await.unwrap().unwrap();

        assert_eq!(config.index.max_retries, Some(7));
        assert_eq!(source, ConfigSource::ProjectToml(root.join(PROJECT_CONFIG_FILE)));
    }

    #[tokio::test]
    async fn test_pyproject_fallback() {
        let (_dir, root) = temp_dir();
        tokio::fs::write(
            root.join(PYPROJECT_FILE),
            "[project]\nname = \"demo\"\n\n[tool.pyconflict.environment]\npython = \"python3.12\"\n",
        )
        .await
        .unwrap();

        let loader = ConfigLoader::new(root.clone()).with_global_path(None);
        let loaded = loader.load(&HashMap::new(), &CliOverrides::default()).await.unwrap();

        assert_eq!(loaded.settings.python, "python3.12");
        assert!(loaded
            .sources
            .contains(&ConfigSource::PyProject(root.join(PYPROJECT_FILE))));
    }

    #[tokio::test]
    async fn test_pyconflict_toml_beats_pyproject() {
        let (_dir, root) = temp_dir();
        tokio::fs::write(root.join(PROJECT_CONFIG_FILE), "[cache]\nttl-secs = 5\n")
            .await
            .unwrap();
        tokio::fs::write(root.join(PYPROJECT_FILE), "[tool.pyconflict.cache]\nttl-secs = 9\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(root).with_global_path(None);
        let loaded = loader.load(&HashMap::new(), &CliOverrides::default()).await.unwrap();

        assert_eq!(loaded.settings.cache_ttl_secs, 5);
    }

    #[tokio::test]
    async fn test_pyproject_without_table_is_skipped() {
        let (_dir, root) = temp_dir();
        tokio::fs::write(root.join(PYPROJECT_FILE), "[project]\nname = \"demo\"\n")
            .await
            .unwrap();

        let loader = ConfigLoader::new(root.clone()).with_global_path(None);
        let found = loader.load_project_config().await.unwrap();
        let skipped = ConfigSource::PyProject(root.join(PYPROJECT_FILE));
        assert!(found.map_or(true, |(_, source)| source != skipped));
    }

    #[tokio::test]
    async fn test_layer_precedence() {
        let (_dir, root) = temp_dir();
        let global = root.join("global.toml");
        tokio::fs::write(
            &global,
            "[index]\nurl = \"https://global.example/pypi\"\ntimeout-secs = 11\n[cache]\nmax-size-mb = 7\n",
        )
        .await
        .unwrap();
        let project = root.join("project");
        tokio::fs::create_dir_all(&project).await.unwrap();
        tokio::fs::write(
            project.join(PROJECT_CONFIG_FILE),
            "[index]\nurl = \"https://project.example/pypi\"\ntimeout-secs = 12\n",
        )
        .await
        .unwrap();

        let loader = ConfigLoader::new(project.clone()).with_global_path(Some(global.clone()));
        let env = env(&[
            (ENV_TIMEOUT, "13"),
            (ENV_PYTHON, "/opt/python/bin/python"),
            ("UNRELATED", "x"),
        ]);
        let cli = CliOverrides {
            python: Some("python3.9".to_string()),
            no_cache: true,
            ..CliOverrides::default()
        };

        let loaded = loader.load(&env, &cli).await.unwrap();
        let settings = loaded.settings;

        assert_eq!(settings.cache_max_size_mb, 7);
        assert_eq!(settings.index_url, "https://project.example/pypi");
        assert_eq!(settings.timeout_secs, 13);
        assert_eq!(settings.python, "python3.9");
        assert!(!settings.cache_enabled);

        assert_eq!(
            loaded.sources,
            vec![
                ConfigSource::Defaults,
                ConfigSource::Global(global),
                ConfigSource::ProjectToml(project.join(PROJECT_CONFIG_FILE)),
                ConfigSource::Environment(ENV_PYTHON.to_string()),
                ConfigSource::Environment(ENV_TIMEOUT.to_string()),
                ConfigSource::CommandLine,
            ]
        );
    }

    #[test]
    fn test_env_overrides() {
        let mut settings = Settings::default();
        let applied = settings
            .apply_env(&env(&[
                (ENV_INDEX_URL, "https://mirror.example/pypi/"),
                (ENV_MAX_RETRIES, "0"),
                (ENV_CACHE_DIR, "/var/cache/pyc"),
                (ENV_CACHE_TTL, "60"),
                (ENV_NO_CACHE, "yes"),
            ]))
            .unwrap();

        assert_eq!(applied.len(), 5);
        assert_eq!(settings.index_url, "https://mirror.example/pypi");
        assert_eq!(settings.max_retries, 0);
        assert_eq!(settings.cache_dir, Utf8PathBuf::from("/var/cache/pyc"));
        assert_eq!(settings.cache_ttl_secs, 60);
        assert!(!settings.cache_enabled);
    }

    #[test]
    fn test_invalid_env_value_names_variable() {
        let cases = [
            (ENV_TIMEOUT, "soon"),
            (ENV_TIMEOUT, "0"),
            (ENV_INDEX_URL, "pypi"),
            (ENV_MAX_RETRIES, "4294967295"),
            (ENV_MAX_RETRIES, "11"),
            (ENV_NO_CACHE, "maybe"),
            (ENV_PYTHON, ""),
        ];

        for (key, value) in cases {
            let mut settings = Settings::default();
            match settings.apply_env(&env(&[(key, value)])).unwrap_err() {
                PycError::ConfigValidation { field, .. } => assert_eq!(field, key),
                other => panic!("expected validation error for {key}={value}, got {other:?}"),
            }
        }
    }

    #[test]
    fn test_cli_overrides() {
        let mut settings = Settings::default();
        assert!(!settings.apply_cli(&CliOverrides::default()).unwrap());

        let cli = CliOverrides {
            index_url: Some("https://cli.example/pypi".to_string()),
            ..CliOverrides::default()
        };
        assert!(settings.apply_cli(&cli).unwrap());
        assert_eq!(settings.index_url, "https://cli.example/pypi");

        let bad = CliOverrides {
            index_url: Some("::".to_string()),
            ..CliOverrides::default()
        };
        assert!(matches!(
            settings.apply_cli(&bad),
            Err(PycError::ConfigValidation { ref field, .. }) if field == "--index-url"
        ));
    }

    #[tokio::test]
    async fn test_broken_project_file_reports_path() {
        let (_dir, root) = temp_dir();
        tokio::fs::write(root.join(PROJECT_CONFIG_FILE), "[index\n").await.unwrap();

        let loader = ConfigLoader::new(root).with_global_path(None);
        match loader.load(&HashMap::new(), &CliOverrides::default()).await.unwrap_err() {
            PycError::TomlParse { message, line, .. } => {
                assert!(message.contains(PROJECT_CONFIG_FILE));
                assert_eq!(line, 1);
            },
            other => panic!("expected TOML parse error, got {other:?}"),
        }
    }
}
