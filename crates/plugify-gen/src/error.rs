//! Error types for binding generation

use plugify_gen_manifest::ManifestError;
use thiserror::Error;

/// Result type alias for generator operations
pub type GenResult<T> = Result<T, GenError>;

/// Error type for a conversion. A conversion stops at the first one.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GenError {
    /// The manifest text is not well formed
    #[error("manifest parse error at line {line}, column {column}: {message}")]
    ManifestParse {
        line: usize,
        column: usize,
        message: String,
    },

    /// The manifest parsed but describes an invalid package
    #[error("manifest validation error at {path}: {message}")]
    ManifestValidation { path: String, message: String },

    /// The requested target is not registered
    #[error("unsupported target `{target}`; supported targets: {supported}")]
    UnsupportedTarget { target: String, supported: String },

    /// An IR construct has no rule for the target
    #[error("cannot map `{symbol}` for target {target}: {reason}")]
    TypeMapping {
        target: String,
        symbol: String,
        reason: String,
    },

    /// The renaming policy ran out of candidates
    #[error("name collision in {scope} for target {target}: no free name for `{name}`")]
    NameCollision {
        target: String,
        scope: String,
        name: String,
    },

    /// Generator options are malformed or out of range
    #[error("invalid options: {0}")]
    InvalidOptions(String),
}

impl GenError {
    pub(crate) fn mapping(
        target: impl ToString,
        symbol: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        GenError::TypeMapping {
            target: target.to_string(),
            symbol: symbol.into(),
            reason: reason.into(),
        }
    }

    /// Returns a stable numeric code for the error kind
    pub fn error_code(&self) -> u32 {
        match self {
            GenError::ManifestParse { .. } => 1,
            GenError::ManifestValidation { .. } => 2,
            GenError::UnsupportedTarget { .. } => 3,
            GenError::TypeMapping { .. } => 4,
            GenError::NameCollision { .. } => 5,
            GenError::InvalidOptions(_) => 6,
        }
    }

    /// Taxonomy name of the error kind
    pub fn kind(&self) -> &'static str {
        match self {
            GenError::ManifestParse { .. } => "ManifestParseError",
            GenError::ManifestValidation { .. } => "ManifestValidationError",
            GenError::UnsupportedTarget { .. } => "UnsupportedTargetError",
            GenError::TypeMapping { .. } => "TypeMappingError",
            GenError::NameCollision { .. } => "NameCollisionError",
            GenError::InvalidOptions(_) => "InvalidOptionsError",
        }
    }
}

impl From<ManifestError> for GenError {
    fn from(err: ManifestError) -> Self {
        match err {
            ManifestError::Parse {
                line,
                column,
                message,
            } => GenError::ManifestParse {
                line,
                column,
                message,
            },
            ManifestError::Validation { path, message } => {
                GenError::ManifestValidation { path, message }
            }
        }
    }
}
