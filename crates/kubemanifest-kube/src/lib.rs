//! kubemanifest kube - reconciling single manifests against a cluster
//!
//! This crate provides:
//! - **Scheme Registry**: the built-in Kubernetes kinds and their list merge rules
//! - **Patch Engine**: three-way strategic merge patches for built-in kinds,
//!   JSON merge patches for everything else
//! - **Readiness Monitor**: status heuristics, rollout checks and polling with timeouts
//! - **Reconciler**: create/read/update/delete/import of one object by tracking key
//! - **Remote API**: the `ResourceApi` seam, backed by kube-rs or an in-memory mock

pub mod api;
pub mod config;
pub mod error;
pub mod patch;
pub mod readiness;
pub mod reconcile;
pub mod scheme;

pub use api::{
    ClusterApi, DeletePropagation, MockResourceApi, OperationCounts, RecordedPatch, ResourceApi,
};
pub use config::{ReconcileConfig, WaitConfig};
pub use error::{KubeError, Result};
pub use patch::{
    ListStrategy, PatchDescriptor, PatchEngine, PatchError, PatchMeta, PatchOutcome, PatchStrategy,
};
pub use readiness::{
    Classification, ClassifierTable, Readiness, ReadinessClassifier, StatusSnapshot, classify,
};
pub use reconcile::{Applied, ManifestRequest, Reconciler, Updated};
pub use scheme::{NativeKind, NativeScheme};

pub use kubemanifest_core::{ObjectRef, ResourceObject};
