//! Lifecycle operations on one managed object
//!
//! The [`Reconciler`] is what a declarative tool calls: it takes manifest
//! text and a tracking key, talks to the cluster through a [`ResourceApi`],
//! and waits for the outcome before returning.
//!
//! - `create`: namespace resolution, create, wait until ready
//! - `read`: current state, or `None` when the object is gone
//! - `update`: minimal patch from previous manifest, new manifest and live state
//! - `delete`: delete request, wait until not found
//! - `import`: adopt an existing object by key

use std::sync::Arc;

use kubemanifest_core::{ObjectRef, ResourceObject, decode_manifest};
use tracing::{debug, info, instrument};

use crate::api::{DeletePropagation, ResourceApi};
use crate::config::{ReconcileConfig, WaitConfig};
use crate::error::{KubeError, Result};
use crate::patch::{PatchDescriptor, PatchEngine, PatchOutcome};
use crate::readiness::{ClassifierTable, DeletionWatch, ReadinessWatch, wait_for};
use crate::scheme::NativeScheme;

/// Desired state handed in by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManifestRequest {
    /// YAML or JSON manifest text
    pub content: String,
    /// Namespace to use when the manifest names none
    pub namespace: Option<String>,
    /// Delete dependents in the foreground
    pub delete_cascade: bool,
}

impl ManifestRequest {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            content: content.into(),
            ..Default::default()
        }
    }

    pub fn namespace(mut self, namespace: impl Into<String>) -> Self {
        self.namespace = Some(namespace.into());
        self
    }

    pub fn cascade(mut self, cascade: bool) -> Self {
        self.delete_cascade = cascade;
        self
    }

    /// Decode the manifest and resolve its namespace
    pub fn resolve(&self) -> Result<ResourceObject> {
        resolve_manifest(&self.content, self.namespace.as_deref())
    }
}

fn resolve_manifest(content: &str, namespace: Option<&str>) -> Result<ResourceObject> {
    let mut object = decode_manifest(content)?;
    object.resolve_namespace(namespace);
    Ok(object)
}

/// A reconciled object and its tracking key
#[derive(Debug, Clone, PartialEq)]
pub struct Applied {
    pub key: String,
    pub object: ResourceObject,
}

impl Applied {
    fn new(object: ResourceObject) -> Self {
        Self {
            key: object.tracking_key(),
            object,
        }
    }
}

/// Result of an update
#[derive(Debug, Clone, PartialEq)]
pub struct Updated {
    pub applied: Applied,
    /// False when the patch was empty and nothing was sent
    pub changed: bool,
}

/// Reconciles single objects against a cluster
pub struct Reconciler<A: ResourceApi> {
    api: A,
    patcher: PatchEngine,
    classifiers: ClassifierTable,
    config: ReconcileConfig,
}

impl<A: ResourceApi> Reconciler<A> {
    /// Create with the shared native scheme and rollout classifiers
    pub fn new(api: A, config: ReconcileConfig) -> Self {
        Self::with_scheme(api, NativeScheme::shared(), config)
    }

    pub fn with_scheme(api: A, scheme: Arc<NativeScheme>, config: ReconcileConfig) -> Self {
        Self {
            api,
            patcher: PatchEngine::new(scheme),
            classifiers: ClassifierTable::default(),
            config,
        }
    }

    /// Replace the readiness classifiers
    pub fn with_classifiers(mut self, classifiers: ClassifierTable) -> Self {
        self.classifiers = classifiers;
        self
    }

    pub fn api(&self) -> &A {
        &self.api
    }

    pub fn config(&self) -> &ReconcileConfig {
        &self.config
    }

    /// Create the object and wait until it is ready
    ///
    /// Once the create call succeeds, any later failure is returned as
    /// `KubeError::CreatedNotReady` carrying the tracking key, so the caller
    /// can still record the object.
    #[instrument(skip_all, fields(namespace = request.namespace.as_deref()))]
    pub async fn create(&self, request: &ManifestRequest) -> Result<Applied> {
        let object = request.resolve()?;
        info!("Creating {}", object.display_name());

        let created = self.api.create(&object).await?;
        let key = created.tracking_key();
        debug!(%key, "Created, waiting for readiness");

        match self
            .wait_ready(&self.config.create, "create", created.object_ref())
            .await
        {
            Ok(ready) => {
                info!("{} is ready", ready.display_name());
                Ok(Applied::new(ready))
            }
            Err(source) => Err(KubeError::CreatedNotReady {
                key,
                source: Box::new(source),
            }),
        }
    }

    /// Current state, or `None` if the object or its kind is gone
    #[instrument(skip(self))]
    pub async fn read(&self, key: &str) -> Result<Option<ResourceObject>> {
        let object_ref = ObjectRef::from_key(key)?;
        match self.api.get(&object_ref).await {
            Ok(object) => Ok(Some(object)),
            Err(e) if e.is_gone() => {
                info!("{} no longer exists", object_ref.display_name());
                Ok(None)
            }
            Err(e) => Err(e),
        }
    }

    /// Patch the object from `original_content` towards `request` and wait
    ///
    /// Manifests without a namespace resolve to the namespace in `key`.
    #[instrument(skip(self, original_content, request))]
    pub async fn update(
        &self,
        key: &str,
        original_content: &str,
        request: &ManifestRequest,
    ) -> Result<Updated> {
        let (target, original) = self.resolve_change(key, original_content, request)?;
        info!("Updating {}", target.display_name());

        let outcome = self.patcher.apply(&self.api, &target, &original).await?;
        let changed = !outcome.is_unchanged();
        if let PatchOutcome::Patched(patched) = &outcome {
            debug!(resource_version = ?patched.resource_version(), "Patch accepted");
        }

        let ready = self
            .wait_ready(&self.config.update, "update", target.object_ref())
            .await?;
        Ok(Updated {
            applied: Applied::new(ready),
            changed,
        })
    }

    /// Compute the patch an update would send, without sending it
    #[instrument(skip(self, original_content, request))]
    pub async fn plan(
        &self,
        key: &str,
        original_content: &str,
        request: &ManifestRequest,
    ) -> Result<PatchDescriptor> {
        let (target, original) = self.resolve_change(key, original_content, request)?;
        let (patch, _) = self.patcher.plan(&self.api, &target, &original).await?;
        Ok(patch)
    }

    /// Delete the object and wait until it is gone
    ///
    /// A missing object on the delete request is an error; disappearing
    /// while waiting is success.
    #[instrument(skip(self))]
    pub async fn delete(&self, key: &str, cascade: bool) -> Result<()> {
        let object_ref = ObjectRef::from_key(key)?;
        info!("Deleting {}", object_ref.display_name());

        self.api
            .delete(&object_ref, DeletePropagation::from_cascade(cascade))
            .await?;

        let mut watch = DeletionWatch::new(&self.api, object_ref);
        wait_for(&self.config.delete, "delete", &mut watch).await?;
        info!("Deleted {key}");
        Ok(())
    }

    /// Adopt an existing object by key
    #[instrument(skip(self))]
    pub async fn import(&self, key: &str) -> Result<Applied> {
        let object_ref = ObjectRef::from_key(key)?;
        let object = self.api.get(&object_ref).await?;
        info!("Imported {}", object.display_name());
        Ok(Applied {
            key: key.to_string(),
            object,
        })
    }

    fn resolve_change(
        &self,
        key: &str,
        original_content: &str,
        request: &ManifestRequest,
    ) -> Result<(ResourceObject, ResourceObject)> {
        let object_ref = ObjectRef::from_key(key)?;
        let namespace = request
            .namespace
            .as_deref()
            .or_else(|| object_ref.namespace());

        let target = resolve_manifest(&request.content, namespace)?;
        let original = resolve_manifest(original_content, namespace)?;
        Ok((target, original))
    }

    async fn wait_ready(
        &self,
        config: &WaitConfig,
        operation: &'static str,
        object_ref: ObjectRef,
    ) -> Result<ResourceObject> {
        let resource = object_ref.display_name();
        let mut watch = ReadinessWatch::new(&self.api, &self.classifiers, object_ref);
        wait_for(config, operation, &mut watch).await?;

        let fetched = watch.into_observed();
        fetched.ok_or_else(|| never_observed(operation, resource))
    }
}

fn never_observed(operation: &str, resource: String) -> KubeError {
    KubeError::Readiness {
        resource,
        message: format!("{operation} wait finished without observing the object"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::MockResourceApi;
    use serde_json::json;
    use std::time::Duration;

    fn fast_config() -> ReconcileConfig {
        let wait = WaitConfig {
            timeout: Duration::from_millis(500),
            delay: Duration::from_millis(1),
            poll_interval: Duration::from_millis(5),
        };
        ReconcileConfig {
            create: wait.clone(),
            update: wait.clone(),
            delete: wait,
        }
    }

    fn reconciler() -> Reconciler<MockResourceApi> {
        Reconciler::new(MockResourceApi::new(), fast_config())
    }

    const CONFIG_MAP: &str = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: settings\ndata:\n  key: a\n";

    #[test]
    fn test_request_resolve_namespace() {
        let request = ManifestRequest::new(CONFIG_MAP).namespace("apps");
        assert_eq!(request.resolve().unwrap().namespace(), Some("apps"));

        let defaulted = ManifestRequest::new(CONFIG_MAP);
        assert_eq!(defaulted.resolve().unwrap().namespace(), Some("default"));
    }

    #[tokio::test]
    async fn test_create_returns_key() {
        let reconciler = reconciler();
        let applied = reconciler
            .create(&ManifestRequest::new(CONFIG_MAP).namespace("apps"))
            .await
            .unwrap();

        assert_eq!(applied.key, "apps::v1::ConfigMap::settings");
        assert_eq!(reconciler.api().operation_counts().creates, 1);
    }

    #[tokio::test]
    async fn test_create_timeout_keeps_key() {
        let reconciler = reconciler();
        let object_ref = ObjectRef::from_key("default::v1::ConfigMap::settings").unwrap();
        reconciler
            .api()
            .script_statuses(&object_ref, [json!({"phase": "Pending"})]);

        let err = reconciler
            .create(&ManifestRequest::new(CONFIG_MAP))
            .await
            .unwrap_err();

        assert_eq!(err.created_key(), Some("default::v1::ConfigMap::settings"));
        assert!(err.is_timeout());
    }

    #[tokio::test]
    async fn test_create_invalid_manifest_creates_nothing() {
        let reconciler = reconciler();
        let err = reconciler
            .create(&ManifestRequest::new("kind: [broken"))
            .await
            .unwrap_err();

        assert!(matches!(err, KubeError::Core(_)));
        assert!(err.created_key().is_none());
        assert_eq!(reconciler.api().operation_counts().creates, 0);
    }

    #[tokio::test]
    async fn test_read_gone_is_none() {
        let reconciler = reconciler();
        let missing = reconciler
            .read("default::v1::ConfigMap::settings")
            .await
            .unwrap();
        assert!(missing.is_none());
    }

    #[tokio::test]
    async fn test_read_bad_key() {
        let err = reconciler().read("not-a-key").await.unwrap_err();
        assert!(matches!(err, KubeError::Core(_)));
    }

    #[tokio::test]
    async fn test_update_unchanged_sends_nothing() {
        let reconciler = reconciler();
        let applied = reconciler
            .create(&ManifestRequest::new(CONFIG_MAP))
            .await
            .unwrap();

        let updated = reconciler
            .update(&applied.key, CONFIG_MAP, &ManifestRequest::new(CONFIG_MAP))
            .await
            .unwrap();

        assert!(!updated.changed);
        assert_eq!(reconciler.api().operation_counts().patches, 0);
    }

    #[tokio::test]
    async fn test_update_uses_key_namespace() {
        let reconciler = reconciler();
        let applied = reconciler
            .create(&ManifestRequest::new(CONFIG_MAP).namespace("apps"))
            .await
            .unwrap();

        let changed = CONFIG_MAP.replace("key: a", "key: b");
        let updated = reconciler
            .update(&applied.key, CONFIG_MAP, &ManifestRequest::new(changed))
            .await
            .unwrap();

        assert!(updated.changed);
        assert_eq!(updated.applied.key, "apps::v1::ConfigMap::settings");
        assert_eq!(updated.applied.object.body()["data"], json!({"key": "b"}));
    }

    #[tokio::test]
    async fn test_delete_missing_is_error() {
        let err = reconciler()
            .delete("default::v1::ConfigMap::settings", false)
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_delete_finishes_when_first_poll_misses() {
        let reconciler = reconciler();
        let applied = reconciler
            .create(&ManifestRequest::new(CONFIG_MAP))
            .await
            .unwrap();
        reconciler.api().reset_counts();

        reconciler.delete(&applied.key, false).await.unwrap();

        let counts = reconciler.api().operation_counts();
        assert_eq!(counts.deletes, 1);
        assert_eq!(counts.gets, 1);
    }

    #[test]
    fn test_never_observed_names_the_object() {
        let object_ref = ObjectRef::from_key("default::v1::ConfigMap::settings").unwrap();

        match never_observed("create", object_ref.display_name()) {
            KubeError::Readiness { resource, message } => {
                assert_eq!(resource, "default/ConfigMap/settings");
                assert!(message.starts_with("create "));
            }
            other => panic!("expected readiness error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_import_missing_is_error() {
        let err = reconciler()
            .import("default::v1::ConfigMap::settings")
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }
}
