//! The remote API seam
//!
//! Everything that talks to a cluster goes through [`ResourceApi`]. The
//! production implementation is [`ClusterApi`] (kube-rs dynamic objects);
//! [`MockResourceApi`] keeps objects in memory for tests.

mod cluster;
mod mock;

use async_trait::async_trait;
use kubemanifest_core::{ObjectRef, ResourceObject};

use crate::error::Result;
use crate::patch::PatchDescriptor;

pub use cluster::ClusterApi;
pub use mock::{MockResourceApi, OperationCounts, RecordedPatch};

/// Deletion propagation policy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DeletePropagation {
    /// Let the server apply its default policy
    #[default]
    ServerDefault,
    /// Delete dependents before the owner disappears
    Foreground,
}

impl DeletePropagation {
    pub fn from_cascade(cascade: bool) -> Self {
        if cascade {
            DeletePropagation::Foreground
        } else {
            DeletePropagation::ServerDefault
        }
    }
}

/// CRUD access to remote objects by identity
///
/// Implementations map a missing object to `KubeError::NotFound`, an
/// unserved kind to `KubeError::UnknownKind` and a failed precondition to
/// `KubeError::Conflict`.
#[async_trait]
pub trait ResourceApi: Send + Sync {
    /// Fetch the live object
    async fn get(&self, object_ref: &ObjectRef) -> Result<ResourceObject>;

    /// Create the object; returns the server's copy
    async fn create(&self, object: &ResourceObject) -> Result<ResourceObject>;

    /// Send a patch; `expected_version` is the resourceVersion precondition
    async fn patch(
        &self,
        object_ref: &ObjectRef,
        patch: &PatchDescriptor,
        expected_version: Option<&str>,
    ) -> Result<ResourceObject>;

    /// Request deletion; completes before the object is actually gone
    async fn delete(&self, object_ref: &ObjectRef, propagation: DeletePropagation) -> Result<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_propagation_from_cascade() {
        assert_eq!(
            DeletePropagation::from_cascade(true),
            DeletePropagation::Foreground
        );
        assert_eq!(
            DeletePropagation::from_cascade(false),
            DeletePropagation::ServerDefault
        );
    }
}
