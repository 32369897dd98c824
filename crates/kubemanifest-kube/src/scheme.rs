//! Registry of native Kubernetes kinds
//!
//! Native kinds are the built-in types compiled in from `k8s-openapi`. They
//! get strategic merge patches with per-kind list merge rules; anything not
//! registered here (custom resources included) falls back to a plain JSON
//! merge patch.
//!
//! The registry is built once per process through [`NativeScheme::shared`]
//! and handed to the patch engine as an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use k8s_openapi::api::core::v1 as core_v1;
use k8s_openapi::api::{
    admissionregistration, apps, autoscaling, batch, certificates, coordination, discovery, events,
    networking, node, policy, rbac, scheduling, storage,
};
use kubemanifest_core::GroupVersionKind;
use once_cell::sync::OnceCell;

use crate::patch::meta::{ListStrategy, PatchMeta};

static SHARED: OnceCell<Arc<NativeScheme>> = OnceCell::new();

const POD: &[&str] = &["spec"];
const WORKLOAD: &[&str] = &["spec", "template", "spec"];
const CRON_JOB: &[&str] = &["spec", "jobTemplate", "spec", "template", "spec"];
const POD_TEMPLATE: &[&str] = &["template", "spec"];

/// A registered native kind and its merge metadata
#[derive(Debug, Clone)]
pub struct NativeKind {
    gvk: GroupVersionKind,
    pod_spec_path: Option<&'static [&'static str]>,
    patch_meta: PatchMeta,
}

impl NativeKind {
    pub fn gvk(&self) -> &GroupVersionKind {
        &self.gvk
    }

    /// Location of the embedded PodSpec, if the kind has one
    pub fn pod_spec_path(&self) -> Option<&'static [&'static str]> {
        self.pod_spec_path
    }

    /// List merge rules used to build strategic patches
    pub fn patch_meta(&self) -> &PatchMeta {
        &self.patch_meta
    }
}

/// Set of kinds eligible for strategic merge patches
#[derive(Debug)]
pub struct NativeScheme {
    kinds: HashMap<GroupVersionKind, NativeKind>,
}

impl NativeScheme {
    /// Build the registry with every built-in kind
    pub fn new() -> Self {
        let mut scheme = Self {
            kinds: HashMap::new(),
        };

        scheme.register::<core_v1::Pod>(Some(POD));
        scheme.register::<core_v1::PodTemplate>(Some(POD_TEMPLATE));
        scheme.register::<core_v1::ReplicationController>(Some(WORKLOAD));
        scheme.register::<core_v1::ConfigMap>(None);
        scheme.register::<core_v1::Secret>(None);
        scheme.register::<core_v1::Service>(None);
        scheme.register::<core_v1::ServiceAccount>(None);
        scheme.register::<core_v1::Endpoints>(None);
        scheme.register::<core_v1::Namespace>(None);
        scheme.register::<core_v1::Node>(None);
        scheme.register::<core_v1::PersistentVolume>(None);
        scheme.register::<core_v1::PersistentVolumeClaim>(None);
        scheme.register::<core_v1::LimitRange>(None);
        scheme.register::<core_v1::ResourceQuota>(None);

        scheme.register::<apps::v1::Deployment>(Some(WORKLOAD));
        scheme.register::<apps::v1::StatefulSet>(Some(WORKLOAD));
        scheme.register::<apps::v1::DaemonSet>(Some(WORKLOAD));
        scheme.register::<apps::v1::ReplicaSet>(Some(WORKLOAD));
        scheme.register::<apps::v1::ControllerRevision>(None);

        scheme.register::<batch::v1::Job>(Some(WORKLOAD));
        scheme.register::<batch::v1::CronJob>(Some(CRON_JOB));

        scheme.register::<autoscaling::v1::HorizontalPodAutoscaler>(None);
        scheme.register::<autoscaling::v2::HorizontalPodAutoscaler>(None);
        scheme.register::<networking::v1::Ingress>(None);
        scheme.register::<networking::v1::IngressClass>(None);
        scheme.register::<networking::v1::NetworkPolicy>(None);
        scheme.register::<policy::v1::PodDisruptionBudget>(None);

        scheme.register::<rbac::v1::Role>(None);
        scheme.register::<rbac::v1::RoleBinding>(None);
        scheme.register::<rbac::v1::ClusterRole>(None);
        scheme.register::<rbac::v1::ClusterRoleBinding>(None);

        scheme.register::<storage::v1::StorageClass>(None);
        scheme.register::<storage::v1::CSIDriver>(None);
        scheme.register::<storage::v1::CSINode>(None);
        scheme.register::<storage::v1::VolumeAttachment>(None);

        scheme.register::<admissionregistration::v1::MutatingWebhookConfiguration>(None);
        scheme.register::<admissionregistration::v1::ValidatingWebhookConfiguration>(None);
        scheme.register::<certificates::v1::CertificateSigningRequest>(None);
        scheme.register::<coordination::v1::Lease>(None);
        scheme.register::<discovery::v1::EndpointSlice>(None);
        scheme.register::<events::v1::Event>(None);
        scheme.register::<node::v1::RuntimeClass>(None);
        scheme.register::<scheduling::v1::PriorityClass>(None);

        scheme
    }

    /// The process-wide registry, built on first use
    ///
    /// Concurrent first callers block until the single initialization
    /// finishes, then all observe the same instance.
    pub fn shared() -> Arc<NativeScheme> {
        Arc::clone(SHARED.get_or_init(|| Arc::new(NativeScheme::new())))
    }

    fn register<K: k8s_openapi::Resource>(&mut self, pod_spec_path: Option<&'static [&'static str]>) {
        let gvk = GroupVersionKind::new(K::GROUP, K::VERSION, K::KIND);
        let patch_meta = kind_patch_meta(&gvk, pod_spec_path);
        self.kinds.insert(
            gvk.clone(),
            NativeKind {
                gvk,
                pod_spec_path,
                patch_meta,
            },
        );
    }

    /// Look up a kind; `None` means it is not native
    pub fn lookup(&self, gvk: &GroupVersionKind) -> Option<&NativeKind> {
        self.kinds.get(gvk)
    }

    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }
}

impl Default for NativeScheme {
    fn default() -> Self {
        Self::new()
    }
}

fn kind_patch_meta(gvk: &GroupVersionKind, pod_spec_path: Option<&[&str]>) -> PatchMeta {
    let mut meta = PatchMeta::new()
        .with_list("metadata.ownerReferences", ListStrategy::MergeKey("uid"))
        .with_list("metadata.finalizers", ListStrategy::MergePrimitives)
        .with_list("status.conditions", ListStrategy::MergeKey("type"));

    if let Some(path) = pod_spec_path {
        meta = meta.with_pod_spec(path);
    }

    meta = match (gvk.group.as_str(), gvk.kind.as_str()) {
        ("", "Service") => meta.with_list("spec.ports", ListStrategy::MergeKey("port")),
        ("", "ServiceAccount") => meta.with_list("secrets", ListStrategy::MergeKey("name")),
        ("", "Node") => meta
            .with_list("status.addresses", ListStrategy::MergeKey("type"))
            .with_list("spec.podCIDRs", ListStrategy::MergePrimitives),
        ("admissionregistration.k8s.io", _) => {
            meta.with_list("webhooks", ListStrategy::MergeKey("name"))
        }
        _ => meta,
    };

    meta
}
