//! Polling until an object reaches a terminal state
//!
//! A [`Watch`] performs one observation per tick. [`wait_for`] sleeps for
//! the initial delay, then ticks every poll interval until the watch
//! reports a terminal state, a tick fails, or the deadline passes.

use std::fmt;
use std::time::Instant;

use async_trait::async_trait;
use kubemanifest_core::{ObjectRef, ResourceObject};
use tracing::debug;

use super::{Classification, ClassifierTable, Readiness, classify};
use crate::api::ResourceApi;
use crate::config::WaitConfig;
use crate::error::{KubeError, Result};

/// A state reported by a watch
pub trait PollState: Copy + fmt::Display + Send {
    /// True when waiting can stop
    fn is_terminal(&self) -> bool;

    /// Name of the terminal state, for timeout messages
    fn target() -> &'static str;
}

impl PollState for Readiness {
    fn is_terminal(&self) -> bool {
        *self == Readiness::Ready
    }

    fn target() -> &'static str {
        "ready"
    }
}

/// Progress of a deletion
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeletionState {
    Deleting,
    Deleted,
}

impl fmt::Display for DeletionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeletionState::Deleting => write!(f, "deleting"),
            DeletionState::Deleted => write!(f, "deleted"),
        }
    }
}

impl PollState for DeletionState {
    fn is_terminal(&self) -> bool {
        *self == DeletionState::Deleted
    }

    fn target() -> &'static str {
        "deleted"
    }
}

/// One observation of a remote object per tick
#[async_trait]
pub trait Watch: Send {
    type State: PollState;

    /// Observe once
    async fn tick(&mut self) -> Result<Self::State>;

    /// Object being watched
    fn object_ref(&self) -> &ObjectRef;

    /// Last observation, for timeout diagnostics
    fn last_observed(&self) -> String;
}

/// Waits for an object to be classified ready
pub struct ReadinessWatch<'a, A: ResourceApi + ?Sized> {
    api: &'a A,
    classifiers: &'a ClassifierTable,
    object_ref: ObjectRef,
    last: Option<Classification>,
    observed: Option<ResourceObject>,
}

impl<'a, A: ResourceApi + ?Sized> ReadinessWatch<'a, A> {
    pub fn new(api: &'a A, classifiers: &'a ClassifierTable, object_ref: ObjectRef) -> Self {
        Self {
            api,
            classifiers,
            object_ref,
            last: None,
            observed: None,
        }
    }

    /// Object as last fetched
    pub fn into_observed(self) -> Option<ResourceObject> {
        self.observed
    }
}

#[async_trait]
impl<'a, A: ResourceApi + ?Sized> Watch for ReadinessWatch<'a, A> {
    type State = Readiness;

    async fn tick(&mut self) -> Result<Readiness> {
        let object = self.api.get(&self.object_ref).await?;
        let classification = classify(&object, self.classifiers)?;
        debug!(
            resource = %self.object_ref.display_name(),
            state = %classification,
            "Readiness poll"
        );

        let readiness = classification.readiness;
        self.last = Some(classification);
        self.observed = Some(object);
        Ok(readiness)
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object_ref
    }

    fn last_observed(&self) -> String {
        self.last
            .as_ref()
            .map_or_else(|| "never observed".to_string(), ToString::to_string)
    }
}

/// Waits for an object to disappear
pub struct DeletionWatch<'a, A: ResourceApi + ?Sized> {
    api: &'a A,
    object_ref: ObjectRef,
    last: Option<DeletionState>,
}

impl<'a, A: ResourceApi + ?Sized> DeletionWatch<'a, A> {
    pub fn new(api: &'a A, object_ref: ObjectRef) -> Self {
        Self {
            api,
            object_ref,
            last: None,
        }
    }
}

#[async_trait]
impl<'a, A: ResourceApi + ?Sized> Watch for DeletionWatch<'a, A> {
    type State = DeletionState;

    async fn tick(&mut self) -> Result<DeletionState> {
        let state = match self.api.get(&self.object_ref).await {
            Ok(_) => DeletionState::Deleting,
            Err(e) if e.is_not_found() => DeletionState::Deleted,
            Err(e) => return Err(e),
        };
        debug!(resource = %self.object_ref.display_name(), %state, "Deletion poll");

        self.last = Some(state);
        Ok(state)
    }

    fn object_ref(&self) -> &ObjectRef {
        &self.object_ref
    }

    fn last_observed(&self) -> String {
        self.last
            .map_or_else(|| "never observed".to_string(), |s| s.to_string())
    }
}

/// Poll `watch` until it reports a terminal state
///
/// Tick errors abort the wait. Running out of time, including inside a
/// slow tick, yields `KubeError::Timeout` carrying the last observation.
pub async fn wait_for<W: Watch>(
    config: &WaitConfig,
    operation: &'static str,
    watch: &mut W,
) -> Result<W::State> {
    let start = Instant::now();
    let deadline = start + config.timeout;

    tokio::time::sleep(config.delay.min(config.timeout)).await;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        let polled = tokio::time::timeout(remaining, watch.tick()).await;
        let state = match polled {
            Ok(state) => state?,
            Err(_) => return Err(timed_out(operation, start, watch)),
        };
        if state.is_terminal() {
            return Ok(state);
        }

        let now = Instant::now();
        if now >= deadline {
            return Err(timed_out(operation, start, watch));
        }

        tokio::time::sleep(config.poll_interval.min(deadline - now)).await;
    }
}

fn timed_out<W: Watch>(operation: &'static str, start: Instant, watch: &W) -> KubeError {
    KubeError::Timeout {
        operation,
        resource: watch.object_ref().display_name(),
        target: W::State::target(),
        elapsed: start.elapsed(),
        last_state: watch.last_observed(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::{DeletePropagation, MockResourceApi};
    use serde_json::json;
    use std::time::Duration;

    fn fast(timeout_ms: u64) -> WaitConfig {
        WaitConfig {
            timeout: Duration::from_millis(timeout_ms),
            delay: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
        }
    }

    fn seeded_widget(api: &MockResourceApi) -> ObjectRef {
        api.seed(
            ResourceObject::from_value(json!({
                "apiVersion": "example.com/v1",
                "kind": "Widget",
                "metadata": {"name": "w", "namespace": "default"}
            }))
            .unwrap(),
        )
        .object_ref()
    }

    #[tokio::test]
    async fn test_ready_after_progression() {
        let api = MockResourceApi::new();
        let object_ref = seeded_widget(&api);
        api.script_statuses(
            &object_ref,
            [
                json!({"phase": "Pending"}),
                json!({"readyReplicas": 0}),
                json!({"phase": "Running"}),
            ],
        );
        let classifiers = ClassifierTable::empty();

        let mut watch = ReadinessWatch::new(&api, &classifiers, object_ref);
        let state = wait_for(&fast(2_000), "create", &mut watch).await.unwrap();

        assert_eq!(state, Readiness::Ready);
        assert_eq!(api.operation_counts().gets, 3);
        let observed = watch.into_observed().unwrap();
        assert_eq!(observed.status(), Some(&json!({"phase": "Running"})));
    }

    #[tokio::test]
    async fn test_timeout_reports_last_state() {
        let api = MockResourceApi::new();
        let object_ref = seeded_widget(&api);
        api.script_statuses(&object_ref, [json!({"phase": "Pending"})]);
        let classifiers = ClassifierTable::empty();

        let mut watch = ReadinessWatch::new(&api, &classifiers, object_ref);
        let err = wait_for(&fast(30), "update", &mut watch).await.unwrap_err();

        match err {
            KubeError::Timeout {
                operation,
                target,
                last_state,
                ..
            } => {
                assert_eq!(operation, "update");
                assert_eq!(target, "ready");
                assert_eq!(last_state, "pending: phase Pending");
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_fetch_error_aborts() {
        let api = MockResourceApi::new();
        let object_ref = seeded_widget(&api);
        api.script_statuses(&object_ref, [json!({"phase": "Pending"})]);
        api.fail_next_get(&object_ref, 500);
        let classifiers = ClassifierTable::empty();

        let mut watch = ReadinessWatch::new(&api, &classifiers, object_ref);
        let err = wait_for(&fast(2_000), "create", &mut watch).await.unwrap_err();

        assert!(matches!(err, KubeError::Api { .. }));
        assert_eq!(api.operation_counts().gets, 1);
    }

    #[tokio::test]
    async fn test_vanished_object_aborts_readiness_wait() {
        let api = MockResourceApi::new();
        let classifiers = ClassifierTable::empty();
        let object_ref = ObjectRef::new(
            "default",
            kubemanifest_core::GroupVersionKind::new("", "v1", "ConfigMap"),
            "gone",
        );

        let mut watch = ReadinessWatch::new(&api, &classifiers, object_ref);
        let err = wait_for(&fast(2_000), "create", &mut watch).await.unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_deletion_wait() {
        let api = MockResourceApi::new();
        let object_ref = seeded_widget(&api);
        api.linger_after_delete(&object_ref, 2);
        api.delete(&object_ref, DeletePropagation::Foreground)
            .await
            .unwrap();

        let mut watch = DeletionWatch::new(&api, object_ref);
        let state = wait_for(&fast(2_000), "delete", &mut watch).await.unwrap();

        assert_eq!(state, DeletionState::Deleted);
        assert_eq!(api.operation_counts().gets, 3);
    }

    #[tokio::test]
    async fn test_deletion_of_absent_object_finishes_on_first_poll() {
        let api = MockResourceApi::new();
        let object_ref = seeded_widget(&api);
        api.delete(&object_ref, DeletePropagation::ServerDefault)
            .await
            .unwrap();

        let mut watch = DeletionWatch::new(&api, object_ref);
        let state = wait_for(&fast(2_000), "delete", &mut watch).await.unwrap();

        assert_eq!(state, DeletionState::Deleted);
        assert_eq!(api.operation_counts().gets, 1);
    }

    /// API whose reads hang far longer than any test deadline
    struct StalledApi;

    #[async_trait]
    impl ResourceApi for StalledApi {
        async fn get(&self, object_ref: &ObjectRef) -> Result<ResourceObject> {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Err(KubeError::Readiness {
                resource: object_ref.display_name(),
                message: "read stalled".to_string(),
            })
        }

        async fn create(&self, _object: &ResourceObject) -> Result<ResourceObject> {
            unreachable!("waits never create")
        }

        async fn patch(
            &self,
            _object_ref: &ObjectRef,
            _patch: &crate::patch::PatchDescriptor,
            _expected_version: Option<&str>,
        ) -> Result<ResourceObject> {
            unreachable!("waits never patch")
        }

        async fn delete(&self, _object_ref: &ObjectRef, _propagation: DeletePropagation) -> Result<()> {
            unreachable!("waits never delete")
        }
    }

    #[tokio::test]
    async fn test_slow_read_cannot_outlast_deadline() {
        let api = StalledApi;
        let classifiers = ClassifierTable::empty();
        let object_ref = ObjectRef::new(
            "default",
            kubemanifest_core::GroupVersionKind::new("", "v1", "ConfigMap"),
            "slow",
        );

        let started = Instant::now();
        let mut watch = ReadinessWatch::new(&api, &classifiers, object_ref);
        let err = wait_for(&fast(100), "create", &mut watch).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(500));
        match err {
            KubeError::Timeout { last_state, .. } => assert_eq!(last_state, "never observed"),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_read_bounds_deletion_wait() {
        let api = StalledApi;
        let object_ref = ObjectRef::new(
            "default",
            kubemanifest_core::GroupVersionKind::new("", "v1", "ConfigMap"),
            "slow",
        );

        let started = Instant::now();
        let mut watch = DeletionWatch::new(&api, object_ref);
        let err = wait_for(&fast(100), "delete", &mut watch).await.unwrap_err();

        assert!(started.elapsed() < Duration::from_millis(500));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_deletion_timeout() {
        let api = MockResourceApi::new();
        let object_ref = seeded_widget(&api);

        let mut watch = DeletionWatch::new(&api, object_ref);
        let err = wait_for(&fast(20), "delete", &mut watch).await.unwrap_err();

        assert!(err.is_timeout());
        assert!(err.to_string().contains("to be deleted"));
    }
}
