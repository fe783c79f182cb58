//! Settings error types.

use std::path::PathBuf;

use thiserror::Error;

/// Why settings could not be produced. File errors carry the path they came
/// from; validation errors name the offending field.
#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("cannot read settings file {}: {source}", path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("settings file {} is not valid JSON: {source}", path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// Merged settings that do not fit the schema (e.g. a string where a
    /// number belongs).
    #[error("settings do not match the schema: {0}")]
    Schema(#[from] serde_json::Error),

    #[error("invalid setting {field}: {reason}")]
    Invalid { field: String, reason: String },
}

impl SettingsError {
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Dotted settings path of a validation failure.
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::Invalid { field, .. } => Some(field),
            _ => None,
        }
    }
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;
