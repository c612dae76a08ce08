//! Error message formatting with actionable suggestions.
//!
//! Human errors go to stderr with a help line and the source chain; with
//! `--json` the same error is a small JSON object.

use std::error::Error;

use pyconflict_core::PycError;

use super::colors::ColorSupport;
use crate::commands::ExitStatus;

/// Error formatter with suggestions
pub struct ErrorFormatter {
    colors: ColorSupport,
}

impl ErrorFormatter {
    /// Create a new error formatter
    pub fn new() -> Self {
        Self {
            colors: ColorSupport::detect(),
        }
    }

    #[cfg(test)]
    fn plain() -> Self {
        Self {
            colors: ColorSupport::disabled(),
        }
    }

    /// Format an error with context and suggestions
    pub fn format_error(&self, error: &PycError) -> String {
        let mut output = String::new();

        output.push_str(&self.colors.red("Error"));
        output.push_str(": ");
        output.push_str(&error.to_string());

        if let Some(suggestion) = error.suggestion() {
            output.push('\n');
            output.push_str(&self.colors.dim("help"));
            output.push_str(": ");
            output.push_str(suggestion);
        }

        let mut source = error.source();
        while let Some(err) = source {
            output.push('\n');
            output.push_str(&self.colors.dim("caused by"));
            output.push_str(": ");
            output.push_str(&err.to_string());
            source = err.source();
        }

        output
    }

    /// `{"error": ..., "exit_code": ...}`
    pub fn format_json(&self, error: &PycError, status: ExitStatus) -> String {
        let value = serde_json::json!({
            "error": error.to_string(),
            "exit_code": status.code(),
        });
        serde_json::to_string_pretty(&value).unwrap_or_else(|_| value.to_string())
    }
}

impl Default for ErrorFormatter {
    fn default() -> Self {
        Self::new()
    }
}
