//! Patch computation and application
//!
//! Updates never send a full replacement. The engine diffs the previously
//! applied manifest, the new manifest and the live object:
//! - native kinds get a three-way strategic merge patch
//! - everything else gets a JSON merge patch of `current -> target`
//!
//! Concurrency tokens are cleared from all three inputs before diffing and
//! the live token is sent as a precondition with the write, so a patch is
//! empty exactly when nothing we manage has changed.

pub mod merge;
pub mod meta;
pub mod strategic;

use std::fmt;
use std::sync::Arc;

use kubemanifest_core::{ObjectRef, ResourceObject};
use serde_json::{Map, Value as JsonValue};
use thiserror::Error;
use tracing::{debug, info, instrument};

use crate::api::ResourceApi;
use crate::error::{KubeError, Result};
use crate::scheme::NativeScheme;

pub use merge::{apply_merge_patch, create_merge_patch};
pub use meta::{ListStrategy, PatchMeta};
pub use strategic::{apply_strategic_patch, create_three_way_patch};

/// Errors raised while computing a patch
#[derive(Debug, Error)]
pub enum PatchError {
    #[error("failed to serialize {what}: {source}")]
    Serialize {
        what: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{what} configuration is not an object")]
    NotAnObject { what: &'static str },

    #[error("element of list '{field}' has no merge key '{key}'")]
    MissingMergeKey { field: String, key: &'static str },

    #[error("list '{field}' merges by '{key}' but holds a non-object element")]
    NonObjectElement { field: String, key: &'static str },
}

/// How the server should interpret patch bytes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PatchStrategy {
    /// RFC 7386 JSON merge patch
    Merge,
    /// Kubernetes strategic merge patch
    StrategicMerge,
}

impl fmt::Display for PatchStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatchStrategy::Merge => write!(f, "merge"),
            PatchStrategy::StrategicMerge => write!(f, "strategic-merge"),
        }
    }
}

/// A computed patch ready to send
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PatchDescriptor {
    pub strategy: PatchStrategy,
    pub bytes: Vec<u8>,
}

impl PatchDescriptor {
    /// Serialized form of a patch with no changes
    pub const EMPTY: &'static [u8] = b"{}";

    pub fn new(strategy: PatchStrategy, bytes: Vec<u8>) -> Self {
        Self { strategy, bytes }
    }

    /// True when applying the patch would change nothing
    pub fn is_empty(&self) -> bool {
        self.bytes == Self::EMPTY
    }

    /// Decode the patch body
    pub fn to_value(&self) -> std::result::Result<JsonValue, PatchError> {
        serde_json::from_slice(&self.bytes).map_err(|source| PatchError::Serialize {
            what: "patch",
            source,
        })
    }

    /// Patch body carrying `metadata.resourceVersion` as a write precondition
    pub fn with_precondition(
        &self,
        resource_version: Option<&str>,
    ) -> std::result::Result<JsonValue, PatchError> {
        let mut body = self.to_value()?;
        let Some(rv) = resource_version else {
            return Ok(body);
        };

        let JsonValue::Object(map) = &mut body else {
            return Err(PatchError::NotAnObject { what: "patch" });
        };
        let metadata = map
            .entry("metadata".to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if let JsonValue::Object(metadata) = metadata {
            metadata.insert(
                "resourceVersion".to_string(),
                JsonValue::String(rv.to_string()),
            );
        }
        Ok(body)
    }
}

impl fmt::Display for PatchDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf8_lossy(&self.bytes))
    }
}

/// Result of reconciling one object
#[derive(Debug, Clone)]
pub enum PatchOutcome {
    /// Nothing to change, no write was sent
    Unchanged,
    /// The patch was accepted; holds the server's copy
    Patched(ResourceObject),
}

impl PatchOutcome {
    pub fn is_unchanged(&self) -> bool {
        matches!(self, PatchOutcome::Unchanged)
    }
}

/// Computes and applies minimal patches
#[derive(Debug, Clone)]
pub struct PatchEngine {
    scheme: Arc<NativeScheme>,
}

impl PatchEngine {
    pub fn new(scheme: Arc<NativeScheme>) -> Self {
        Self { scheme }
    }

    pub fn scheme(&self) -> &NativeScheme {
        &self.scheme
    }

    /// Compute the patch moving `current` towards `target`
    ///
    /// The strategy depends on whether the target's kind is native.
    pub fn create_patch(
        &self,
        target: &ResourceObject,
        original: &ResourceObject,
        current: &ResourceObject,
    ) -> std::result::Result<PatchDescriptor, PatchError> {
        let current = canonical(current, "current configuration")?;
        let original = canonical(original, "original configuration")?;
        let target_value = canonical(target, "target configuration")?;

        let (patch, strategy) = match self.scheme.lookup(&target.gvk()) {
            Some(native) => (
                create_three_way_patch(&original, &target_value, &current, native.patch_meta())?,
                PatchStrategy::StrategicMerge,
            ),
            None => (
                create_merge_patch(&current, &target_value),
                PatchStrategy::Merge,
            ),
        };

        let bytes = serde_json::to_vec(&patch).map_err(|source| PatchError::Serialize {
            what: "patch",
            source,
        })?;
        Ok(PatchDescriptor::new(strategy, bytes))
    }

    /// Fetch live state and compute the patch without writing
    pub async fn plan<A: ResourceApi + ?Sized>(
        &self,
        api: &A,
        target: &ResourceObject,
        original: &ResourceObject,
    ) -> Result<(PatchDescriptor, Option<String>)> {
        let mut current = api.get(&target.object_ref()).await?;
        let live_version = current.resource_version().map(str::to_owned);

        let mut target = target.clone();
        let mut original = original.clone();
        current.set_resource_version(None);
        target.set_resource_version(None);
        original.set_resource_version(None);

        let patch = self
            .create_patch(&target, &original, &current)
            .map_err(|source| KubeError::PatchComputation {
                resource: target.display_name(),
                source,
            })?;
        Ok((patch, live_version))
    }

    /// Fetch live state, compute the patch and send it if non-empty
    ///
    /// The write carries the live concurrency token; a conflict is returned
    /// as-is and never retried.
    #[instrument(skip_all, fields(resource = %target.display_name()))]
    pub async fn apply<A: ResourceApi + ?Sized>(
        &self,
        api: &A,
        target: &ResourceObject,
        original: &ResourceObject,
    ) -> Result<PatchOutcome> {
        let (patch, live_version) = self.plan(api, target, original).await?;

        if patch.is_empty() {
            info!("No changes for {}, skipping patch", target.display_name());
            return Ok(PatchOutcome::Unchanged);
        }

        debug!(strategy = %patch.strategy, patch = %patch, "Patching {}", target.display_name());
        let object_ref: ObjectRef = target.object_ref();
        let patched = api
            .patch(&object_ref, &patch, live_version.as_deref())
            .await?;
        Ok(PatchOutcome::Patched(patched))
    }
}

fn canonical(
    object: &ResourceObject,
    what: &'static str,
) -> std::result::Result<JsonValue, PatchError> {
    let bytes = serde_json::to_vec(object.body())
        .map_err(|source| PatchError::Serialize { what, source })?;
    serde_json::from_slice(&bytes).map_err(|source| PatchError::Serialize { what, source })
}
