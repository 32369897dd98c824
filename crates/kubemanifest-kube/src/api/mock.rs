//! In-memory resource API for testing
//!
//! Behaves like a small API server: it assigns resource versions, applies
//! merge and strategic patches, enforces write preconditions and can be
//! scripted to report status progressions or keep deleted objects around
//! for a few reads.

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Arc, RwLock};

use kubemanifest_core::{GroupVersionKind, ObjectRef, ResourceObject};

use super::{DeletePropagation, ResourceApi};
use crate::error::{KubeError, Result};
use crate::patch::{
    PatchDescriptor, PatchMeta, PatchStrategy, apply_merge_patch, apply_strategic_patch,
};
use crate::scheme::NativeScheme;

/// In-memory resource API for testing
#[derive(Clone)]
pub struct MockResourceApi {
    state: Arc<RwLock<MockState>>,
    scheme: Arc<NativeScheme>,
}

#[derive(Default)]
struct MockState {
    /// tracking key -> object
    objects: HashMap<String, ResourceObject>,
    /// statuses reported by successive reads
    statuses: HashMap<String, VecDeque<JsonValue>>,
    /// reads a deleted object stays visible for
    linger: HashMap<String, usize>,
    terminating: HashMap<String, usize>,
    conflicts: HashSet<String>,
    failing_gets: HashMap<String, u16>,
    unserved: HashSet<GroupVersionKind>,
    counts: OperationCounts,
    patches: Vec<RecordedPatch>,
    deletions: Vec<(ObjectRef, DeletePropagation)>,
    version: u64,
}

/// Counts of operations performed for testing assertions
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct OperationCounts {
    pub gets: usize,
    pub creates: usize,
    pub patches: usize,
    pub deletes: usize,
}

/// A patch received by the mock
#[derive(Debug, Clone)]
pub struct RecordedPatch {
    pub object_ref: ObjectRef,
    pub strategy: PatchStrategy,
    pub body: JsonValue,
    pub expected_version: Option<String>,
}

impl MockResourceApi {
    /// Create a new empty mock API
    pub fn new() -> Self {
        Self {
            state: Arc::new(RwLock::new(MockState::default())),
            scheme: NativeScheme::shared(),
        }
    }

    /// Create with pre-populated objects
    pub fn with_objects(objects: Vec<ResourceObject>) -> Self {
        let api = Self::new();
        for object in objects {
            api.seed(object);
        }
        api
    }

    /// Store an object as if it already existed; returns the stored copy
    pub fn seed(&self, object: ResourceObject) -> ResourceObject {
        let mut state = self.state.write().unwrap();
        let stored = state.stamp(object);
        state.objects.insert(stored.tracking_key(), stored.clone());
        stored
    }

    /// Current stored copy, without counting a read
    pub fn object(&self, object_ref: &ObjectRef) -> Option<ResourceObject> {
        let state = self.state.read().unwrap();
        state.objects.get(&object_ref.to_key()).cloned()
    }

    /// Report these statuses on successive reads; the last one sticks
    ///
    /// A `null` status removes the field.
    pub fn script_statuses(
        &self,
        object_ref: &ObjectRef,
        statuses: impl IntoIterator<Item = JsonValue>,
    ) {
        let mut state = self.state.write().unwrap();
        state
            .statuses
            .entry(object_ref.to_key())
            .or_default()
            .extend(statuses);
    }

    /// Keep the object readable for `reads` gets after it is deleted
    pub fn linger_after_delete(&self, object_ref: &ObjectRef, reads: usize) {
        let mut state = self.state.write().unwrap();
        state.linger.insert(object_ref.to_key(), reads);
    }

    /// Simulate another writer touching the object right before our next patch
    pub fn bump_version_on_next_patch(&self, object_ref: &ObjectRef) {
        let mut state = self.state.write().unwrap();
        state.conflicts.insert(object_ref.to_key());
    }

    /// Fail the next read of the object with an API error
    pub fn fail_next_get(&self, object_ref: &ObjectRef, code: u16) {
        let mut state = self.state.write().unwrap();
        state.failing_gets.insert(object_ref.to_key(), code);
    }

    /// Stop serving a kind, as if its CRD was removed
    pub fn unserve(&self, gvk: GroupVersionKind) {
        let mut state = self.state.write().unwrap();
        state.unserved.insert(gvk);
    }

    /// Get operation counts for assertions
    pub fn operation_counts(&self) -> OperationCounts {
        self.state.read().unwrap().counts.clone()
    }

    /// Reset operation counts
    pub fn reset_counts(&self) {
        let mut state = self.state.write().unwrap();
        state.counts = OperationCounts::default();
    }

    /// All patches received, in order
    pub fn patches(&self) -> Vec<RecordedPatch> {
        self.state.read().unwrap().patches.clone()
    }

    /// All delete requests received, in order
    pub fn deletions(&self) -> Vec<(ObjectRef, DeletePropagation)> {
        self.state.read().unwrap().deletions.clone()
    }

    fn patch_meta(&self, gvk: &GroupVersionKind) -> PatchMeta {
        self.scheme
            .lookup(gvk)
            .map(|kind| kind.patch_meta().clone())
            .unwrap_or_default()
    }
}

impl Default for MockResourceApi {
    fn default() -> Self {
        Self::new()
    }
}

impl MockState {
    fn stamp(&mut self, mut object: ResourceObject) -> ResourceObject {
        self.version += 1;
        object.set_resource_version(Some(&self.version.to_string()));
        object
    }

    fn check_served(&self, gvk: &GroupVersionKind) -> Result<()> {
        if self.unserved.contains(gvk) {
            return Err(KubeError::UnknownKind {
                gvk: gvk.to_string(),
            });
        }
        Ok(())
    }
}

fn injected_failure(object_ref: &ObjectRef, code: u16) -> KubeError {
    KubeError::Api {
        operation: "get",
        resource: object_ref.display_name(),
        source: kube::Error::Api(kube::core::ErrorResponse {
            status: "Failure".to_string(),
            message: "injected failure".to_string(),
            reason: "InternalError".to_string(),
            code,
        }),
    }
}

fn with_status(object: &ResourceObject, status: JsonValue) -> Result<ResourceObject> {
    let mut value = object.to_value();
    if let JsonValue::Object(body) = &mut value {
        if status.is_null() {
            body.shift_remove("status");
        } else {
            body.insert("status".to_string(), status);
        }
    }
    Ok(ResourceObject::from_value(value)?)
}

#[async_trait]
impl ResourceApi for MockResourceApi {
    async fn get(&self, object_ref: &ObjectRef) -> Result<ResourceObject> {
        let mut state = self.state.write().unwrap();
        state.counts.gets += 1;
        state.check_served(&object_ref.gvk)?;

        let key = object_ref.to_key();
        if let Some(code) = state.failing_gets.remove(&key) {
            return Err(injected_failure(object_ref, code));
        }

        let expired = match state.terminating.get_mut(&key) {
            Some(0) => true,
            Some(remaining) => {
                *remaining -= 1;
                false
            }
            None => false,
        };
        if expired {
            state.terminating.remove(&key);
            state.objects.remove(&key);
        }

        let next_status = state.statuses.get_mut(&key).and_then(VecDeque::pop_front);
        let Some(object) = state.objects.get_mut(&key) else {
            return Err(KubeError::not_found(object_ref));
        };
        if let Some(status) = next_status {
            *object = with_status(object, status)?;
        }

        Ok(object.clone())
    }

    async fn create(&self, object: &ResourceObject) -> Result<ResourceObject> {
        let mut state = self.state.write().unwrap();
        state.counts.creates += 1;

        let object_ref = object.object_ref();
        state.check_served(&object_ref.gvk)?;

        let key = object_ref.to_key();
        if state.objects.contains_key(&key) {
            return Err(KubeError::AlreadyExists {
                kind: object_ref.gvk.kind.clone(),
                namespace: object_ref.namespace.clone(),
                name: object_ref.name.clone(),
            });
        }

        let stored = state.stamp(object.clone());
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn patch(
        &self,
        object_ref: &ObjectRef,
        patch: &PatchDescriptor,
        expected_version: Option<&str>,
    ) -> Result<ResourceObject> {
        let body = patch
            .to_value()
            .map_err(|source| KubeError::PatchComputation {
                resource: object_ref.display_name(),
                source,
            })?;
        let meta = self.patch_meta(&object_ref.gvk);

        let mut state = self.state.write().unwrap();
        state.counts.patches += 1;
        state.check_served(&object_ref.gvk)?;
        state.patches.push(RecordedPatch {
            object_ref: object_ref.clone(),
            strategy: patch.strategy,
            body: body.clone(),
            expected_version: expected_version.map(str::to_owned),
        });

        let key = object_ref.to_key();
        let Some(current) = state.objects.get(&key).cloned() else {
            return Err(KubeError::not_found(object_ref));
        };

        let current = if state.conflicts.remove(&key) {
            let bumped = state.stamp(current);
            state.objects.insert(key.clone(), bumped.clone());
            bumped
        } else {
            current
        };

        if let Some(expected) = expected_version {
            if current.resource_version() != Some(expected) {
                return Err(KubeError::Conflict {
                    resource: object_ref.display_name(),
                    message: "the object has been modified; please apply your changes to the latest version and try again".to_string(),
                });
            }
        }

        let patched = match patch.strategy {
            PatchStrategy::Merge => {
                let mut document = current.to_value();
                apply_merge_patch(&mut document, &body);
                document
            }
            PatchStrategy::StrategicMerge => apply_strategic_patch(&current.to_value(), &body, &meta)
                .map_err(|source| KubeError::PatchComputation {
                    resource: object_ref.display_name(),
                    source,
                })?,
        };

        let stored = state.stamp(ResourceObject::from_value(patched)?);
        state.objects.insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, object_ref: &ObjectRef, propagation: DeletePropagation) -> Result<()> {
        let mut state = self.state.write().unwrap();
        state.counts.deletes += 1;
        state.check_served(&object_ref.gvk)?;

        let key = object_ref.to_key();
        if !state.objects.contains_key(&key) || state.terminating.contains_key(&key) {
            return Err(KubeError::not_found(object_ref));
        }

        state.deletions.push((object_ref.clone(), propagation));
        match state.linger.remove(&key) {
            Some(reads) => {
                state.terminating.insert(key, reads);
            }
            None => {
                state.objects.remove(&key);
            }
        }
        Ok(())
    }
}
