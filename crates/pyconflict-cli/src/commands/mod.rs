//! Command implementations and dispatch logic.
//!
//! Each command is an async function that takes a [`CommandContext`] and
//! reports how the process should exit.

use std::process::ExitCode;

use camino::Utf8PathBuf;
use tracing::{debug, warn};

use pyconflict_config::merge::collect_env_overrides;
use pyconflict_config::{CliOverrides, ConfigLoader, Settings};
use pyconflict_core::{PycError, PycResult};
use pyconflict_registry::{ClientConfig, DiskCache, PypiClient, RetryConfig};
use pyconflict_resolver::VersionResolver;

pub mod cache;
pub mod check_add;
pub mod stable;

#[cfg(test)]
mod tests;

use crate::environment::InterpreterEnvironment;
use crate::{output::OutputHandler, Commands};

/// Process exit status
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExitStatus {
    /// Safe to add, or the command succeeded
    Success,
    /// Conflicts were found
    Conflict,
    NotFound,
    /// Malformed version, specifier, requirement or configuration
    InvalidInput,
    /// Index unreachable or misbehaving
    Repository,
    Unexpected,
}

impl ExitStatus {
    pub fn code(self) -> u8 {
        match self {
            ExitStatus::Success => 0,
            ExitStatus::Conflict => 1,
            ExitStatus::NotFound => 2,
            ExitStatus::InvalidInput => 3,
            ExitStatus::Repository => 4,
            ExitStatus::Unexpected => 5,
        }
    }

    pub fn from_error(error: &PycError) -> Self {
        match error {
            PycError::PackageNotFound { .. } => ExitStatus::NotFound,
            error if error.is_invalid_input() => ExitStatus::InvalidInput,
            PycError::Repository { .. } | PycError::Network { .. } | PycError::RateLimited { .. } => {
                ExitStatus::Repository
            },
            _ => ExitStatus::Unexpected,
        }
    }
}

impl From<ExitStatus> for ExitCode {
    fn from(status: ExitStatus) -> Self {
        ExitCode::from(status.code())
    }
}

/// Shared context for all commands
pub struct CommandContext {
    pub settings: Settings,
    pub output: OutputHandler,
    /// Shared by every service that compares versions
    pub resolver: VersionResolver,
}

impl CommandContext {
    /// Resolve settings from config files, the environment and CLI flags
    pub async fn new(overrides: &CliOverrides) -> PycResult<Self> {
        let cwd = std::env::current_dir()
            .map_err(|e| PycError::io("Failed to get current directory".to_string(), e))?;
        let cwd = Utf8PathBuf::from_path_buf(cwd).map_err(|path| PycError::Environment {
            message: format!("Working directory is not valid UTF-8: {}", path.display()),
        })?;

        let loaded = ConfigLoader::new(cwd)
            .load(&collect_env_overrides(), overrides)
            .await?;
        debug!(sources = ?loaded.sources, "settings loaded");

        Ok(Self {
            settings: loaded.settings,
            output: OutputHandler::new(),
            resolver: VersionResolver::new(),
        })
    }

    pub fn cache(&self) -> PycResult<DiskCache> {
        DiskCache::new(self.settings.cache_dir.clone(), self.settings.cache_max_size_mb)
    }

    /// PyPI client configured from settings. An unusable cache directory
    /// only disables caching.
    pub fn package_source(&self) -> PycResult<PypiClient> {
        let client = PypiClient::with_config(ClientConfig {
            base_url: self.settings.index_url.clone(),
            timeout: self.settings.timeout(),
            retry: RetryConfig {
                max_retries: self.settings.max_retries,
                ..RetryConfig::default()
            },
            ..ClientConfig::default()
        })?
        .with_cache_ttl(self.settings.cache_ttl());

        if !self.settings.cache_enabled {
            return Ok(client);
        }

        match self.cache() {
            Ok(cache) => Ok(client.with_cache(cache)),
            Err(err) => {
                warn!(error = %err, "continuing without cache");
                Ok(client)
            },
        }
    }

    pub fn environment_source(&self) -> PycResult<InterpreterEnvironment> {
        InterpreterEnvironment::inspect(&self.settings.python)
    }
}

/// Dispatch a command to its handler
pub async fn dispatch_command(command: Commands, ctx: &CommandContext) -> PycResult<ExitStatus> {
    match command {
        Commands::CheckAdd {
            package,
            pinned,
            json,
            deep,
        } => {
            let request = check_add::build_request(&package, pinned.as_deref(), deep)?;
            check_add::execute(request, json, ctx).await
        },
        Commands::Stable {
            package,
            python_version,
            json,
        } => {
            let request = stable::build_request(&package, python_version)?;
            stable::execute(request, json, ctx).await
        },
        Commands::Cache { action } => cache::execute(action, ctx),
    }
}
