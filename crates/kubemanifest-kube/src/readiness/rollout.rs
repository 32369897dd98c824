//! Rollout classifiers for workload controllers
//!
//! These mirror `kubectl rollout status`: a workload is ready once its
//! controller has observed the latest spec and every replica runs the new
//! template. A rollout that can never finish as configured is an error.

use k8s_openapi::api::apps::v1::{DaemonSetStatus, DeploymentStatus, StatefulSetStatus};
use kubemanifest_core::{ResourceObject, ValueExt};
use serde::de::DeserializeOwned;

use super::{Classification, ReadinessClassifier};
use crate::error::{KubeError, Result};

const ROLLING_UPDATE: &str = "RollingUpdate";
const PROGRESS_DEADLINE_EXCEEDED: &str = "ProgressDeadlineExceeded";

/// Decode the typed status, or `None` while it is still empty
fn decode_status<K: DeserializeOwned>(object: &ResourceObject) -> Result<Option<K>> {
    let Some(status) = object
        .status()
        .filter(|s| !s.as_object().is_some_and(|m| m.is_empty()))
    else {
        return Ok(None);
    };

    serde_json::from_value(status.clone())
        .map(Some)
        .map_err(|e| KubeError::Readiness {
            resource: object.display_name(),
            message: format!("cannot decode {} status: {e}", object.kind()),
        })
}

fn spec_i64(object: &ResourceObject, path: &[&str]) -> Option<i64> {
    object.spec().and_then(|spec| spec.lookup_i64(path))
}

fn not_observed(kind: &str) -> Classification {
    Classification::pending(format!("waiting for {kind} spec update to be observed"))
}

/// `kubectl rollout status` for Deployments
#[derive(Debug, Clone, Copy, Default)]
pub struct DeploymentRollout;

impl ReadinessClassifier for DeploymentRollout {
    fn name(&self) -> &'static str {
        "deployment-rollout"
    }

    fn classify(&self, object: &ResourceObject) -> Result<Classification> {
        let Some(status) = decode_status::<DeploymentStatus>(object)? else {
            return Ok(not_observed("deployment"));
        };
        let name = object.name();

        if object.generation().unwrap_or(0) > status.observed_generation.unwrap_or(0) {
            return Ok(not_observed("deployment"));
        }

        let timed_out = status.conditions.iter().flatten().any(|c| {
            c.type_ == "Progressing" && c.reason.as_deref() == Some(PROGRESS_DEADLINE_EXCEEDED)
        });
        if timed_out {
            return Err(KubeError::Readiness {
                resource: object.display_name(),
                message: format!("deployment {name:?} exceeded its progress deadline"),
            });
        }

        let updated = i64::from(status.updated_replicas.unwrap_or(0));
        let replicas = i64::from(status.replicas.unwrap_or(0));
        let available = i64::from(status.available_replicas.unwrap_or(0));

        if let Some(desired) = spec_i64(object, &["replicas"]) {
            if updated < desired {
                return Ok(Classification::pending(format!(
                    "waiting for deployment {name:?} rollout to finish: {updated} out of {desired} new replicas have been updated"
                )));
            }
        }
        if replicas > updated {
            return Ok(Classification::pending(format!(
                "waiting for deployment {name:?} rollout to finish: {} old replicas are pending termination",
                replicas - updated
            )));
        }
        if available < updated {
            return Ok(Classification::pending(format!(
                "waiting for deployment {name:?} rollout to finish: {available} of {updated} updated replicas are available"
            )));
        }

        Ok(Classification::ready(format!(
            "deployment {name:?} successfully rolled out"
        )))
    }
}

/// `kubectl rollout status` for DaemonSets
#[derive(Debug, Clone, Copy, Default)]
pub struct DaemonSetRollout;

impl ReadinessClassifier for DaemonSetRollout {
    fn name(&self) -> &'static str {
        "daemonset-rollout"
    }

    fn classify(&self, object: &ResourceObject) -> Result<Classification> {
        check_rolling_update(object)?;
        let Some(status) = decode_status::<DaemonSetStatus>(object)? else {
            return Ok(not_observed("daemon set"));
        };
        let name = object.name();

        if object.generation().unwrap_or(0) > status.observed_generation.unwrap_or(0) {
            return Ok(not_observed("daemon set"));
        }

        let desired = status.desired_number_scheduled;
        let updated = status.updated_number_scheduled.unwrap_or(0);
        let available = status.number_available.unwrap_or(0);

        if updated < desired {
            return Ok(Classification::pending(format!(
                "waiting for daemon set {name:?} rollout to finish: {updated} out of {desired} new pods have been updated"
            )));
        }
        if available < desired {
            return Ok(Classification::pending(format!(
                "waiting for daemon set {name:?} rollout to finish: {available} of {desired} updated pods are available"
            )));
        }

        Ok(Classification::ready(format!(
            "daemon set {name:?} successfully rolled out"
        )))
    }
}

/// `kubectl rollout status` for StatefulSets
#[derive(Debug, Clone, Copy, Default)]
pub struct StatefulSetRollout;

impl ReadinessClassifier for StatefulSetRollout {
    fn name(&self) -> &'static str {
        "statefulset-rollout"
    }

    fn classify(&self, object: &ResourceObject) -> Result<Classification> {
        check_rolling_update(object)?;
        let Some(status) = decode_status::<StatefulSetStatus>(object)? else {
            return Ok(not_observed("statefulset"));
        };

        let observed = status.observed_generation.unwrap_or(0);
        if observed == 0 || object.generation().unwrap_or(0) > observed {
            return Ok(not_observed("statefulset"));
        }

        let desired = spec_i64(object, &["replicas"]);
        let ready = i64::from(status.ready_replicas.unwrap_or(0));
        if let Some(desired) = desired {
            if ready < desired {
                return Ok(Classification::pending(format!(
                    "waiting for {} pods to be ready",
                    desired - ready
                )));
            }
        }

        let updated = i64::from(status.updated_replicas.unwrap_or(0));
        let has_rolling_update = object
            .spec()
            .and_then(|spec| spec.lookup_map(&["updateStrategy", "rollingUpdate"]))
            .is_some();
        if has_rolling_update {
            let partition = spec_i64(object, &["updateStrategy", "rollingUpdate", "partition"]);
            if let (Some(desired), Some(partition)) = (desired, partition) {
                if updated < desired - partition {
                    return Ok(Classification::pending(format!(
                        "waiting for partitioned roll out to finish: {updated} out of {} new pods have been updated",
                        desired - partition
                    )));
                }
            }
            return Ok(Classification::ready(format!(
                "partitioned roll out complete: {updated} new pods have been updated"
            )));
        }

        let revision = status.update_revision.unwrap_or_default();
        if status.current_revision.unwrap_or_default() != revision {
            return Ok(Classification::pending(format!(
                "waiting for statefulset rolling update to complete {updated} pods at revision {revision}"
            )));
        }

        Ok(Classification::ready(format!(
            "statefulset rolling update complete {ready} pods at revision {revision}"
        )))
    }
}

/// Rollout status is only defined for the RollingUpdate strategy
fn check_rolling_update(object: &ResourceObject) -> Result<()> {
    let strategy = object
        .spec()
        .and_then(|spec| spec.lookup_str(&["updateStrategy", "type"]))
        .unwrap_or(ROLLING_UPDATE);
    if strategy != ROLLING_UPDATE {
        return Err(KubeError::Readiness {
            resource: object.display_name(),
            message: format!(
                "rollout status is only available for {ROLLING_UPDATE} strategy type, got {strategy}"
            ),
        });
    }
    Ok(())
}
