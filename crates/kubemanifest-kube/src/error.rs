//! Error types for kubemanifest-kube

use std::time::Duration;

use kubemanifest_core::{CoreError, ObjectRef};
use thiserror::Error;

use crate::patch::PatchError;

/// Result type for kubemanifest-kube operations
pub type Result<T> = std::result::Result<T, KubeError>;

/// Errors that can occur while reconciling a resource
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum KubeError {
    /// Manifest or tracking key could not be decoded
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Remote object is absent
    #[error("{kind} '{name}' not found in namespace '{namespace}'")]
    NotFound {
        kind: String,
        namespace: String,
        name: String,
    },

    /// Remote object already exists on create
    #[error("{kind} '{name}' already exists in namespace '{namespace}'")]
    AlreadyExists {
        kind: String,
        namespace: String,
        name: String,
    },

    /// Optimistic concurrency check failed
    #[error("conflict writing {resource}: {message}\nHint: re-run with freshly read state")]
    Conflict { resource: String, message: String },

    /// The server does not serve this resource type
    #[error("unknown resource type: {gvk}")]
    UnknownKind { gvk: String },

    /// Kubernetes API error
    #[error("Kubernetes API error during {operation} of {resource}: {source}")]
    Api {
        operation: &'static str,
        resource: String,
        #[source]
        source: kube::Error,
    },

    /// Patch could not be computed
    #[error("failed to create patch for {resource}: {source}")]
    PatchComputation {
        resource: String,
        #[source]
        source: PatchError,
    },

    /// A readiness classifier rejected the observed state
    #[error("cannot determine readiness of {resource}: {message}")]
    Readiness { resource: String, message: String },

    /// Deadline exceeded while still waiting
    #[error("timed out after {elapsed:?} waiting for {resource} to be {target} during {operation} (last state: {last_state})")]
    Timeout {
        operation: &'static str,
        resource: String,
        target: &'static str,
        elapsed: Duration,
        last_state: String,
    },

    /// Object was created but never became ready; the key is still valid
    #[error("{key} was created but is not ready: {source}")]
    CreatedNotReady {
        key: String,
        #[source]
        source: Box<KubeError>,
    },

    /// Invalid configuration
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_json::Error> for KubeError {
    fn from(e: serde_json::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl From<serde_yaml::Error> for KubeError {
    fn from(e: serde_yaml::Error) -> Self {
        KubeError::Serialization(e.to_string())
    }
}

impl KubeError {
    /// Build a not-found error for a reference
    pub fn not_found(object_ref: &ObjectRef) -> Self {
        KubeError::NotFound {
            kind: object_ref.gvk.kind.clone(),
            namespace: object_ref.namespace.clone(),
            name: object_ref.name.clone(),
        }
    }

    /// Check if this is a Kubernetes 404 Not Found error
    pub fn is_not_found(&self) -> bool {
        match self {
            KubeError::NotFound { .. } => true,
            KubeError::Api {
                source: kube::Error::Api(resp),
                ..
            } => resp.code == 404,
            _ => false,
        }
    }

    /// Check if the object is gone: absent, or its kind is no longer served
    pub fn is_gone(&self) -> bool {
        self.is_not_found() || matches!(self, KubeError::UnknownKind { .. })
    }

    /// Check if this is a conflict error (409)
    pub fn is_conflict(&self) -> bool {
        match self {
            KubeError::Conflict { .. } => true,
            KubeError::Api {
                source: kube::Error::Api(resp),
                ..
            } => resp.code == 409,
            _ => false,
        }
    }

    /// Check if a wait deadline was exceeded
    pub fn is_timeout(&self) -> bool {
        match self {
            KubeError::Timeout { .. } => true,
            KubeError::CreatedNotReady { source, .. } => source.is_timeout(),
            _ => false,
        }
    }

    /// Tracking key carried by a create that failed after the object was made
    pub fn created_key(&self) -> Option<&str> {
        match self {
            KubeError::CreatedNotReady { key, .. } => Some(key),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kubemanifest_core::GroupVersionKind;

    fn api_error(code: u16) -> KubeError {
        KubeError::Api {
            operation: "get",
            resource: "default/ConfigMap/cfg".to_string(),
            source: kube::Error::Api(kube::core::ErrorResponse {
                status: "Failure".to_string(),
                message: "boom".to_string(),
                reason: "Test".to_string(),
                code,
            }),
        }
    }

    #[test]
    fn test_not_found_classification() {
        let object_ref = ObjectRef::new("default", GroupVersionKind::new("", "v1", "ConfigMap"), "cfg");
        let err = KubeError::not_found(&object_ref);

        assert!(err.is_not_found());
        assert!(err.is_gone());
        assert!(!err.is_conflict());
        assert_eq!(err.to_string(), "ConfigMap 'cfg' not found in namespace 'default'");

        assert!(api_error(404).is_not_found());
        assert!(!api_error(500).is_not_found());
    }

    #[test]
    fn test_unknown_kind_is_gone_but_not_not_found() {
        let err = KubeError::UnknownKind {
            gvk: "example.com/v1, Kind=Widget".to_string(),
        };
        assert!(err.is_gone());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_conflict_classification() {
        assert!(api_error(409).is_conflict());
        assert!(
            KubeError::Conflict {
                resource: "default/Deployment/web".to_string(),
                message: "the object has been modified".to_string(),
            }
            .is_conflict()
        );
    }

    #[test]
    fn test_created_not_ready_keeps_key() {
        let err = KubeError::CreatedNotReady {
            key: "default::v1::Service::api".to_string(),
            source: Box::new(KubeError::Timeout {
                operation: "create",
                resource: "default/Service/api".to_string(),
                target: "ready",
                elapsed: Duration::from_secs(300),
                last_state: "pending: waiting for load balancer ingress".to_string(),
            }),
        };

        assert_eq!(err.created_key(), Some("default::v1::Service::api"));
        assert!(err.is_timeout());
        assert!(err.to_string().contains("default::v1::Service::api"));
    }

    #[test]
    fn test_core_errors_pass_through() {
        let err: KubeError = CoreError::InvalidKey {
            key: "bad".to_string(),
        }
        .into();
        assert!(err.to_string().contains("namespace::groupVersion::kind::name"));
    }
}
