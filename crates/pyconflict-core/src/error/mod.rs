//! Error types and result aliases for PyConflict operations.
//!
//! Provides a unified error type that covers every failure the checker can
//! surface, from malformed version strings to registry outages, with
//! actionable messages.

use thiserror::Error;

/// Unified error type for all PyConflict operations
#[derive(Error, Debug)]
pub enum PycError {
    // Version language errors
    #[error("Invalid version '{version}': {reason}")]
    InvalidVersion { version: String, reason: String },

    #[error("Invalid version specifier '{specifier}': {reason}")]
    InvalidSpecifier { specifier: String, reason: String },

    #[error("Invalid requirement '{requirement}': {reason}")]
    InvalidRequirement { requirement: String, reason: String },

    #[error("Invalid environment marker '{marker}': {reason}")]
    InvalidMarker { marker: String, reason: String },

    #[error("Incompatible constraint: {constraint}")]
    IncompatibleConstraint { constraint: String },

    // Repository errors
    #[error("Package '{name}' not found in the package index")]
    PackageNotFound { name: String },

    #[error("Repository error: {message}")]
    Repository { message: String },

    #[error("Network error: {message}")]
    Network {
        message: String,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    #[error("Rate limited by package index: {url}")]
    RateLimited { url: String },

    // Cache errors
    #[error("Cache error: {message}")]
    Cache { message: String },

    // Environment errors
    #[error("Cannot read environment: {message}")]
    Environment { message: String },

    // Config errors
    #[error("Failed to parse configuration: {message} at line {line}, column {column}")]
    TomlParse {
        message: String,
        line: usize,
        column: usize,
    },

    #[error("Configuration field '{field}' is invalid: {reason}")]
    ConfigValidation { field: String, reason: String },

    // IO errors
    #[error("IO error: {message}")]
    Io {
        message: String,
        #[source]
        source: std::io::Error,
    },
}

/// Result type alias for PyConflict operations
pub type PycResult<T> = Result<T, PycError>;

impl PycError {
    /// Create a version parse error
    pub fn invalid_version(version: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidVersion {
            version: version.into(),
            reason: reason.into(),
        }
    }

    /// Create a specifier parse error
    pub fn invalid_specifier(specifier: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidSpecifier {
            specifier: specifier.into(),
            reason: reason.into(),
        }
    }

    /// Create a marker parse or evaluation error
    pub fn invalid_marker(marker: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidMarker {
            marker: marker.into(),
            reason: reason.into(),
        }
    }

    /// Create a network error from any error type
    pub fn network<E>(message: String, source: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Network {
            message,
            source: Some(Box::new(source)),
        }
    }

    /// Create an IO error from std::io::Error
    pub fn io(message: String, source: std::io::Error) -> Self {
        Self::Io { message, source }
    }

    /// Check if this error is worth retrying
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            PycError::Network { .. } | PycError::RateLimited { .. } | PycError::Io { .. }
        )
    }

    /// Check if this error was caused by malformed user or package input
    pub fn is_invalid_input(&self) -> bool {
        matches!(
            self,
            PycError::InvalidVersion { .. }
                | PycError::InvalidSpecifier { .. }
                | PycError::InvalidRequirement { .. }
                | PycError::InvalidMarker { .. }
                | PycError::IncompatibleConstraint { .. }
                | PycError::TomlParse { .. }
                | PycError::ConfigValidation { .. }
        )
    }

    /// Get a user-friendly suggestion for fixing this error
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            PycError::PackageNotFound { .. } => {
                Some("Check the package name spelling on https://pypi.org")
            },
            PycError::InvalidVersion { .. } => {
                Some("Versions must follow PEP 440, for example 1.2.3, 2.0rc1 or 1.0.post2")
            },
            PycError::Network { .. } | PycError::Repository { .. } => {
                Some("Check your internet connection or the configured index URL and try again")
            },
            PycError::RateLimited { .. } => Some("Wait a moment before retrying"),
            PycError::Environment { .. } => {
                Some("Point --python at a working interpreter or set PYCONFLICT_PYTHON")
            },
            PycError::Cache { .. } => Some("Run 'pyconflict cache clear' or pass --no-cache"),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = PycError::PackageNotFound {
            name: "djagno".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Package 'djagno' not found in the package index"
        );
        assert!(err.suggestion().is_some());

        let err = PycError::invalid_version("1.x", "unexpected character 'x'");
        assert_eq!(
            err.to_string(),
            "Invalid version '1.x': unexpected character 'x'"
        );
    }

    #[test]
    fn test_error_classification() {
        let network = PycError::Network {
            message: "timeout".to_string(),
            source: None,
        };
        assert!(network.is_recoverable());
        assert!(!network.is_invalid_input());

        let rate_limited = PycError::RateLimited {
            url: "https://pypi.org/pypi/django/json".to_string(),
        };
        assert!(rate_limited.is_recoverable());

        let not_found = PycError::PackageNotFound {
            name: "x".to_string(),
        };
        assert!(!not_found.is_recoverable());

        let invalid = PycError::invalid_specifier(">=>1", "unknown operator");
        assert!(invalid.is_invalid_input());
    }
}
