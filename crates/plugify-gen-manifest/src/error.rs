//! Manifest error types

use thiserror::Error;

/// Result type alias for manifest loading
pub type ManifestResult<T> = Result<T, ManifestError>;

/// Error raised while turning manifest text into a [`Package`](crate::Package)
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ManifestError {
    /// The text is not a well-formed manifest document
    #[error("manifest parse error at line {line}, column {column}: {message}")]
    Parse {
        line: usize,
        column: usize,
        message: String,
    },

    /// The document parsed but describes an invalid package
    #[error("manifest validation error at {path}: {message}")]
    Validation { path: String, message: String },
}

impl ManifestError {
    /// Build a validation error for the IR node at `path`
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        ManifestError::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Returns a stable numeric code for the error kind
    pub fn error_code(&self) -> u32 {
        match self {
            ManifestError::Parse { .. } => 1,
            ManifestError::Validation { .. } => 2,
        }
    }
}

impl From<serde_json::Error> for ManifestError {
    fn from(err: serde_json::Error) -> Self {
        let mut message = err.to_string();
        // serde_json appends its own position; we report it separately
        if let Some(idx) = message.rfind(" at line ") {
            message.truncate(idx);
        }
        ManifestError::Parse {
            line: err.line(),
            column: err.column(),
            message,
        }
    }
}

#[cfg(test)]
#[path = "error/error_tests.rs"]
mod error_tests;
