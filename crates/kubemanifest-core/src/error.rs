//! Core error types

use thiserror::Error;

#[derive(Error, Debug)]
pub enum CoreError {
    #[error("Failed to unmarshal manifest: {message}")]
    Parse { message: String },

    #[error("Manifest contains no documents")]
    EmptyManifest,

    #[error("Missing required field: {field}")]
    MissingField { field: String },

    #[error("unexpected ID format ({key:?}), expected \"namespace::groupVersion::kind::name\"")]
    InvalidKey { key: String },

    #[error("Invalid group version {value:?}: {reason}")]
    InvalidGroupVersion { value: String, reason: String },
}

impl CoreError {
    /// Build a parse error from any displayable cause
    pub fn parse(cause: impl std::fmt::Display) -> Self {
        Self::Parse {
            message: cause.to_string(),
        }
    }

    /// Check if this is a malformed identity (tracking key or group version)
    pub fn is_format_error(&self) -> bool {
        matches!(
            self,
            CoreError::InvalidKey { .. } | CoreError::InvalidGroupVersion { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, CoreError>;
