//! CLI error types with exit code handling
//!
//! This module provides a unified error type for CLI operations that
//! maps errors to appropriate exit codes.

use kubemanifest_core::CoreError;
use kubemanifest_kube::KubeError;
use miette::Diagnostic;
use thiserror::Error;

use crate::exit_codes;

/// CLI-specific error type that includes exit code information
#[derive(Error, Debug, Diagnostic, Clone)]
pub enum CliError {
    /// Manifest or tracking key could not be parsed
    #[error("Invalid input: {message}")]
    #[diagnostic(code(kubemanifest::cli::input))]
    Input {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Config file unreadable or invalid
    #[error("Configuration error: {message}")]
    #[diagnostic(code(kubemanifest::cli::config))]
    Config { message: String },

    /// Object or kind missing on the cluster
    #[error("{message}")]
    #[diagnostic(code(kubemanifest::cli::not_found))]
    NotFound {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Object exists already or changed under us
    #[error("{message}")]
    #[diagnostic(code(kubemanifest::cli::conflict))]
    Conflict {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Waiting for a state ran out of time
    #[error("{message}")]
    #[diagnostic(code(kubemanifest::cli::timeout))]
    Timeout {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// Object can never become ready as configured
    #[error("{message}")]
    #[diagnostic(code(kubemanifest::cli::readiness))]
    Readiness {
        message: String,
        #[help]
        help: Option<String>,
    },

    /// API server unreachable or request rejected
    #[error("Cluster error: {message}")]
    #[diagnostic(code(kubemanifest::cli::cluster))]
    Cluster { message: String },

    /// IO error (file not found, permissions, etc.)
    #[error("IO error: {message}")]
    #[diagnostic(code(kubemanifest::cli::io))]
    Io { message: String },

    /// Internal error (runtime, unexpected failure)
    #[error("Internal error: {message}")]
    #[diagnostic(code(kubemanifest::cli::internal))]
    Internal { message: String },
}

impl CliError {
    /// Get the exit code for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            CliError::Input { .. } => exit_codes::INPUT_ERROR,
            CliError::Config { .. } => exit_codes::CONFIG_ERROR,
            CliError::NotFound { .. } => exit_codes::NOT_FOUND,
            CliError::Conflict { .. } => exit_codes::CONFLICT,
            CliError::Timeout { .. } => exit_codes::TIMEOUT,
            CliError::Readiness { .. } => exit_codes::ERROR,
            CliError::Cluster { .. } => exit_codes::CLUSTER_ERROR,
            CliError::Io { .. } => exit_codes::IO_ERROR,
            CliError::Internal { .. } => exit_codes::ERROR,
        }
    }

    /// Create an input error
    pub fn input(message: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: None,
        }
    }

    /// Create an input error with help text
    pub fn input_with_help(message: impl Into<String>, help: impl Into<String>) -> Self {
        Self::Input {
            message: message.into(),
            help: Some(help.into()),
        }
    }

    /// Create a configuration error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create an IO error for a path
    pub fn io(path: &std::path::Path, err: std::io::Error) -> Self {
        Self::Io {
            message: format!("{}: {}", path.display(), err),
        }
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let help = err.is_format_error().then(|| {
            "tracking keys look like namespace::groupVersion::kind::name, e.g. default::apps/v1::Deployment::web"
                .to_string()
        });
        CliError::Input {
            message: err.to_string(),
            help,
        }
    }
}

impl From<KubeError> for CliError {
    fn from(err: KubeError) -> Self {
        let message = err.to_string();
        match err {
            KubeError::Core(inner) => inner.into(),
            KubeError::NotFound { .. } => CliError::NotFound {
                message,
                help: None,
            },
            KubeError::UnknownKind { .. } => CliError::NotFound {
                message,
                help: Some("is the CustomResourceDefinition installed?".to_string()),
            },
            KubeError::AlreadyExists { .. } => CliError::Conflict {
                message,
                help: Some("use `kubemanifest import` to adopt the existing object".to_string()),
            },
            KubeError::Conflict { .. } => CliError::Conflict {
                message,
                help: None,
            },
            KubeError::Timeout { .. } => CliError::Timeout {
                message,
                help: Some("raise the deadline with --timeout".to_string()),
            },
            KubeError::CreatedNotReady { key, source } => {
                let help = Some(format!("the object exists; track it as {key}"));
                if source.is_timeout() {
                    CliError::Timeout { message, help }
                } else {
                    CliError::Readiness { message, help }
                }
            }
            KubeError::Readiness { .. } => CliError::Readiness {
                message,
                help: None,
            },
            KubeError::InvalidConfig(_) => CliError::Config { message },
            KubeError::Api { .. } => CliError::Cluster { message },
            KubeError::Io(_) => CliError::Io { message },
            _ => CliError::Internal { message },
        }
    }
}

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;
