//! Resource API backed by a live cluster
//!
//! Objects travel as kube-rs `DynamicObject`s; the API resource and scope
//! come from discovery, with a pinned lookup for kinds registered after the
//! discovery snapshot was taken.

use async_trait::async_trait;
use kube::{
    Client,
    api::{Api, DeleteParams, DynamicObject, Patch, PatchParams, PostParams, PropagationPolicy},
    core::GroupVersionKind,
    discovery::{self, ApiCapabilities, ApiResource, Discovery, Scope},
};
use kubemanifest_core::{DEFAULT_NAMESPACE, ObjectRef, ResourceObject};
use tracing::debug;

use super::{DeletePropagation, ResourceApi};
use crate::error::{KubeError, Result};
use crate::patch::{PatchDescriptor, PatchStrategy};

/// Resource API talking to the Kubernetes API server
pub struct ClusterApi {
    /// Kubernetes client
    client: Client,
    /// Cached discovery information
    discovery: Discovery,
}

impl ClusterApi {
    /// Create from a client, running discovery
    pub async fn new(client: Client) -> Result<Self> {
        let discovery = run_discovery(&client).await?;
        Ok(Self { client, discovery })
    }

    /// Connect using the ambient kubeconfig or in-cluster config
    pub async fn try_default() -> Result<Self> {
        let client = Client::try_default()
            .await
            .map_err(|source| KubeError::Api {
                operation: "connect",
                resource: "cluster".to_string(),
                source,
            })?;
        Self::new(client).await
    }

    async fn resolve(&self, object_ref: &ObjectRef) -> Result<(ApiResource, ApiCapabilities)> {
        let gvk = GroupVersionKind::gvk(
            &object_ref.gvk.group,
            &object_ref.gvk.version,
            &object_ref.gvk.kind,
        );
        if let Some(found) = self.discovery.resolve_gvk(&gvk) {
            return Ok(found);
        }

        debug!("{} missing from discovery cache, querying group", object_ref.gvk);
        match discovery::pinned_kind(&self.client, &gvk).await {
            Ok(found) => Ok(found),
            Err(kube::Error::Api(resp)) if resp.code == 404 => Err(KubeError::UnknownKind {
                gvk: object_ref.gvk.to_string(),
            }),
            Err(kube::Error::Discovery(_)) => Err(KubeError::UnknownKind {
                gvk: object_ref.gvk.to_string(),
            }),
            Err(source) => Err(KubeError::Api {
                operation: "discovery",
                resource: object_ref.display_name(),
                source,
            }),
        }
    }

    async fn api_for(&self, object_ref: &ObjectRef) -> Result<Api<DynamicObject>> {
        let (api_resource, capabilities) = self.resolve(object_ref).await?;
        if capabilities.scope == Scope::Namespaced {
            let ns = object_ref.namespace().unwrap_or(DEFAULT_NAMESPACE);
            Ok(Api::namespaced_with(self.client.clone(), ns, &api_resource))
        } else {
            Ok(Api::all_with(self.client.clone(), &api_resource))
        }
    }
}

async fn run_discovery(client: &Client) -> Result<Discovery> {
    Discovery::new(client.clone())
        .run()
        .await
        .map_err(|source| KubeError::Api {
            operation: "discovery",
            resource: "cluster".to_string(),
            source,
        })
}

/// Map a kube-rs error onto the reconciler's taxonomy
fn api_error(source: kube::Error, operation: &'static str, object_ref: &ObjectRef) -> KubeError {
    match source {
        kube::Error::Api(resp) if resp.code == 404 => KubeError::not_found(object_ref),
        kube::Error::Api(resp) if resp.code == 409 && resp.reason == "AlreadyExists" => {
            KubeError::AlreadyExists {
                kind: object_ref.gvk.kind.clone(),
                namespace: object_ref.namespace.clone(),
                name: object_ref.name.clone(),
            }
        }
        kube::Error::Api(resp) if resp.code == 409 => KubeError::Conflict {
            resource: object_ref.display_name(),
            message: resp.message,
        },
        source => KubeError::Api {
            operation,
            resource: object_ref.display_name(),
            source,
        },
    }
}

fn into_resource(object: DynamicObject) -> Result<ResourceObject> {
    let value = serde_json::to_value(&object)?;
    Ok(ResourceObject::from_value(value)?)
}

#[async_trait]
impl ResourceApi for ClusterApi {
    async fn get(&self, object_ref: &ObjectRef) -> Result<ResourceObject> {
        let api = self.api_for(object_ref).await?;
        let object = api
            .get(&object_ref.name)
            .await
            .map_err(|e| api_error(e, "get", object_ref))?;
        into_resource(object)
    }

    async fn create(&self, object: &ResourceObject) -> Result<ResourceObject> {
        let object_ref = object.object_ref();
        let api = self.api_for(&object_ref).await?;
        let dynamic: DynamicObject = serde_json::from_value(object.to_value())?;

        let created = api
            .create(&PostParams::default(), &dynamic)
            .await
            .map_err(|e| api_error(e, "create", &object_ref))?;
        into_resource(created)
    }

    async fn patch(
        &self,
        object_ref: &ObjectRef,
        patch: &PatchDescriptor,
        expected_version: Option<&str>,
    ) -> Result<ResourceObject> {
        let api = self.api_for(object_ref).await?;
        let body = patch
            .with_precondition(expected_version)
            .map_err(|source| KubeError::PatchComputation {
                resource: object_ref.display_name(),
                source,
            })?;

        let params = PatchParams::default();
        let result = match patch.strategy {
            PatchStrategy::Merge => api.patch(&object_ref.name, &params, &Patch::Merge(&body)).await,
            PatchStrategy::StrategicMerge => {
                api.patch(&object_ref.name, &params, &Patch::Strategic(&body))
                    .await
            }
        };

        let patched = result.map_err(|e| api_error(e, "patch", object_ref))?;
        into_resource(patched)
    }

    async fn delete(&self, object_ref: &ObjectRef, propagation: DeletePropagation) -> Result<()> {
        let api = self.api_for(object_ref).await?;
        let params = DeleteParams {
            propagation_policy: match propagation {
                DeletePropagation::Foreground => Some(PropagationPolicy::Foreground),
                DeletePropagation::ServerDefault => None,
            },
            ..Default::default()
        };

        api.delete(&object_ref.name, &params)
            .await
            .map_err(|e| api_error(e, "delete", object_ref))?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kube::core::ErrorResponse;
    use kubemanifest_core::GroupVersionKind as CoreGvk;

    fn web() -> ObjectRef {
        ObjectRef::new("prod", CoreGvk::new("apps", "v1", "Deployment"), "web")
    }

    fn response(code: u16, reason: &str) -> kube::Error {
        kube::Error::Api(ErrorResponse {
            status: "Failure".to_string(),
            message: "server said no".to_string(),
            reason: reason.to_string(),
            code,
        })
    }

    #[test]
    fn test_api_error_mapping() {
        assert!(matches!(
            api_error(response(404, "NotFound"), "get", &web()),
            KubeError::NotFound { .. }
        ));
        assert!(matches!(
            api_error(response(409, "AlreadyExists"), "create", &web()),
            KubeError::AlreadyExists { .. }
        ));
        assert!(matches!(
            api_error(response(409, "Conflict"), "patch", &web()),
            KubeError::Conflict { message, .. } if message == "server said no"
        ));
        assert!(matches!(
            api_error(response(500, "InternalError"), "patch", &web()),
            KubeError::Api { operation: "patch", .. }
        ));
    }

    #[test]
    fn test_into_resource_keeps_identity() {
        let dynamic: DynamicObject = serde_json::from_value(serde_json::json!({
            "apiVersion": "apps/v1",
            "kind": "Deployment",
            "metadata": {"name": "web", "namespace": "prod", "resourceVersion": "7"},
            "spec": {"replicas": 2},
            "status": {"readyReplicas": 2}
        }))
        .unwrap();

        let object = into_resource(dynamic).unwrap();
        assert_eq!(object.object_ref(), web());
        assert_eq!(object.resource_version(), Some("7"));
        assert_eq!(object.status(), Some(&serde_json::json!({"readyReplicas": 2})));
    }
}
