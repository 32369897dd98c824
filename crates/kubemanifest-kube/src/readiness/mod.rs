//! Readiness detection for remote objects
//!
//! An object is classified by the first rule that applies:
//! 1. no status (absent or null): ready
//! 2. a classifier registered for its group and kind decides
//! 3. `status.readyReplicas` present: ready when above zero
//! 4. `status.phase` present: ready when in [`READY_PHASES`]
//! 5. `status.loadBalancer.ingress` present (for core Services, only when
//!    `spec.type` is `LoadBalancer`): ready when non-empty
//! 6. an empty status map: pending
//! 7. anything else: ready
//!
//! Polling lives in [`wait`].

pub mod rollout;
pub mod wait;

use std::collections::HashMap;
use std::fmt;

use kubemanifest_core::{GroupVersionKind, ResourceObject, ValueExt};
use serde_json::Value as JsonValue;

use crate::error::Result;

pub use rollout::{DaemonSetRollout, DeploymentRollout, StatefulSetRollout};
pub use wait::{DeletionState, DeletionWatch, PollState, ReadinessWatch, Watch, wait_for};

/// Phases that mean the object is usable
pub const READY_PHASES: &[&str] = &["Active", "Bound", "Running", "Ready", "Online", "Healthy"];

/// Whether an object is usable yet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Readiness {
    Pending,
    Ready,
}

impl fmt::Display for Readiness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Readiness::Pending => write!(f, "pending"),
            Readiness::Ready => write!(f, "ready"),
        }
    }
}

/// A readiness verdict and the observation behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Classification {
    pub readiness: Readiness,
    pub reason: String,
}

impl Classification {
    pub fn ready(reason: impl Into<String>) -> Self {
        Self {
            readiness: Readiness::Ready,
            reason: reason.into(),
        }
    }

    pub fn pending(reason: impl Into<String>) -> Self {
        Self {
            readiness: Readiness::Pending,
            reason: reason.into(),
        }
    }

    pub fn is_ready(&self) -> bool {
        self.readiness == Readiness::Ready
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.readiness, self.reason)
    }
}

/// Kind-specific readiness check
///
/// Its verdict replaces the generic status heuristics. An error means the
/// object can never become ready as configured.
pub trait ReadinessClassifier: Send + Sync {
    /// Name of the classifier for logging
    fn name(&self) -> &'static str;

    /// Classify an object whose status is present
    fn classify(&self, object: &ResourceObject) -> Result<Classification>;
}

/// Classifiers keyed by group and kind
pub struct ClassifierTable {
    classifiers: HashMap<(String, String), Box<dyn ReadinessClassifier>>,
}

impl ClassifierTable {
    /// A table with no classifiers; only the generic heuristics apply
    pub fn empty() -> Self {
        Self {
            classifiers: HashMap::new(),
        }
    }

    /// Rollout classifiers for Deployments, DaemonSets and StatefulSets
    pub fn with_rollout_classifiers() -> Self {
        let mut table = Self::empty();
        table.register("apps", "Deployment", DeploymentRollout);
        table.register("apps", "DaemonSet", DaemonSetRollout);
        table.register("apps", "StatefulSet", StatefulSetRollout);
        table
    }

    pub fn register(
        &mut self,
        group: &str,
        kind: &str,
        classifier: impl ReadinessClassifier + 'static,
    ) {
        self.classifiers
            .insert((group.to_string(), kind.to_string()), Box::new(classifier));
    }

    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&dyn ReadinessClassifier> {
        self.classifiers
            .get(&(gvk.group.clone(), gvk.kind.clone()))
            .map(Box::as_ref)
    }

    pub fn len(&self) -> usize {
        self.classifiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.classifiers.is_empty()
    }
}

impl Default for ClassifierTable {
    fn default() -> Self {
        Self::with_rollout_classifiers()
    }
}

impl fmt::Debug for ClassifierTable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut names: Vec<&str> = self.classifiers.values().map(|c| c.name()).collect();
        names.sort_unstable();
        f.debug_struct("ClassifierTable")
            .field("classifiers", &names)
            .finish()
    }
}

/// Readiness-relevant fields, best-effort decoded from a status
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub ready_replicas: Option<i64>,
    pub phase: Option<String>,
    pub load_balancer_ingress: Option<usize>,
    /// The status was an empty map
    pub empty: bool,
}

impl StatusSnapshot {
    /// Decode a status; fields with unexpected types are ignored
    pub fn from_status(status: &JsonValue) -> Self {
        let load_balancer_ingress = status.lookup_map(&["loadBalancer"]).map(|lb| {
            lb.get("ingress")
                .and_then(JsonValue::as_array)
                .map_or(0, Vec::len)
        });

        Self {
            ready_replicas: status.lookup_i64(&["readyReplicas"]),
            phase: status.lookup_str(&["phase"]).map(str::to_owned),
            load_balancer_ingress,
            empty: status.as_object().is_some_and(|s| s.is_empty()),
        }
    }

    /// Apply the generic heuristics
    pub fn classify(&self, object: &ResourceObject) -> Classification {
        if let Some(ready) = self.ready_replicas {
            return if ready > 0 {
                Classification::ready(format!("{ready} ready replicas"))
            } else {
                Classification::pending("no ready replicas")
            };
        }

        if let Some(phase) = &self.phase {
            return if READY_PHASES.contains(&phase.as_str()) {
                Classification::ready(format!("phase {phase}"))
            } else {
                Classification::pending(format!("phase {phase}"))
            };
        }

        if let Some(ingress) = self.load_balancer_ingress {
            if waits_for_load_balancer(object) {
                return if ingress > 0 {
                    Classification::ready("load balancer ingress assigned")
                } else {
                    Classification::pending("waiting for load balancer ingress")
                };
            }
        }

        if self.empty {
            return Classification::pending("status not yet reported");
        }

        Classification::ready("no readiness fields in status")
    }
}

fn waits_for_load_balancer(object: &ResourceObject) -> bool {
    if object.gvk().is_core("v1", "Service") {
        return object.body().lookup_str(&["spec", "type"]) == Some("LoadBalancer");
    }
    true
}

/// Classify an object against the rules above
pub fn classify(object: &ResourceObject, classifiers: &ClassifierTable) -> Result<Classification> {
    let Some(status) = object.status() else {
        return Ok(Classification::ready("no status"));
    };

    if let Some(classifier) = classifiers.lookup(&object.gvk()) {
        return classifier.classify(object);
    }

    Ok(StatusSnapshot::from_status(status).classify(object))
}
