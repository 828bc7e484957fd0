//! Error types for dossier.
//!
//! Library crates use [`DossierError`] via `thiserror`.
//! The CLI wraps this with `color-eyre` for rich diagnostics.

use std::path::PathBuf;

/// Top-level error type for all dossier operations.
#[derive(Debug, thiserror::Error)]
pub enum DossierError {
    /// Configuration loading or validation error.
    #[error("config error: {message}")]
    Config { message: String },

    /// Network/HTTP error talking to a search or generation backend.
    #[error("network error: {0}")]
    Network(String),

    /// HTML or JSON parsing error.
    #[error("parse error: {message}")]
    Parse { message: String },

    /// Text generation backend error (missing credentials, API error, bad payload).
    #[error("generation error: {0}")]
    Generation(String),

    /// Document rendering error (DOCX/PDF backends).
    #[error("render error: {0}")]
    Render(String),

    /// Filesystem I/O error.
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// Data validation error (blank topic, malformed report, etc.).
    #[error("validation error: {message}")]
    Validation { message: String },
}

/// Convenience alias used throughout the codebase.
pub type Result<T> = std::result::Result<T, DossierError>;

impl DossierError {
    /// Create a config error from any displayable message.
    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    /// Create a parse error from any displayable message.
    pub fn parse(msg: impl Into<String>) -> Self {
        Self::Parse {
            message: msg.into(),
        }
    }

    /// Create a validation error from any displayable message.
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation {
            message: msg.into(),
        }
    }

    /// Wrap a `std::io::Error` with a path for context.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn error_display_formatting() {
        let err = DossierError::config("missing API key");
        assert_eq!(err.to_string(), "config error: missing API key");

        let err = DossierError::validation("topic is empty");
        assert!(err.to_string().contains("topic is empty"));

        let err = DossierError::Generation("HTTP 429".into());
        assert_eq!(err.to_string(), "generation error: HTTP 429");
    }

    #[test]
    fn io_error_keeps_path() {
        let err = DossierError::io(
            "/tmp/out/report.pdf",
            std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        );
        let msg = err.to_string();
        assert!(msg.contains("report.pdf"));
        assert!(msg.contains("disk full"));
    }
}
