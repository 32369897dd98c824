//! Tracking keys: the durable identity of a managed object
//!
//! A key is `namespace::groupVersion::kind::name`. Separators inside field
//! values are not escaped, so names containing `::` cannot be tracked.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{CoreError, Result};
use crate::gvk::{GroupVersion, GroupVersionKind};

/// Separator between the four key fields
pub const KEY_SEPARATOR: &str = "::";

/// Identity of one remote object
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    /// Namespace, empty for cluster-scoped objects
    pub namespace: String,
    pub gvk: GroupVersionKind,
    pub name: String,
}

impl ObjectRef {
    pub fn new(namespace: impl Into<String>, gvk: GroupVersionKind, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            gvk,
            name: name.into(),
        }
    }

    /// Encode as a tracking key
    pub fn to_key(&self) -> String {
        [
            self.namespace.as_str(),
            &self.gvk.api_version(),
            self.gvk.kind.as_str(),
            self.name.as_str(),
        ]
        .join(KEY_SEPARATOR)
    }

    /// Decode a tracking key, parsing its group version
    pub fn from_key(key: &str) -> Result<Self> {
        let (namespace, group_version, kind, name) = split_key(key)?;
        let gvk = GroupVersion::parse(group_version)?.with_kind(kind);
        Ok(Self::new(namespace, gvk, name))
    }

    /// Namespace, or `None` for cluster-scoped references
    pub fn namespace(&self) -> Option<&str> {
        Some(self.namespace.as_str()).filter(|ns| !ns.is_empty())
    }

    /// Get display name for logging
    pub fn display_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}", ns, self.gvk.kind, self.name),
            None => format!("{}/{}", self.gvk.kind, self.name),
        }
    }
}

impl fmt::Display for ObjectRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

impl FromStr for ObjectRef {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        Self::from_key(s)
    }
}

/// Split a tracking key into `(namespace, groupVersion, kind, name)`
///
/// Fails unless the key has exactly four `::`-separated fields.
pub fn split_key(key: &str) -> Result<(&str, &str, &str, &str)> {
    let parts: Vec<&str> = key.split(KEY_SEPARATOR).collect();
    match parts.as_slice() {
        [namespace, group_version, kind, name] => Ok((*namespace, *group_version, *kind, *name)),
        _ => Err(CoreError::InvalidKey {
            key: key.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn deployment_ref() -> ObjectRef {
        ObjectRef::new(
            "prod",
            GroupVersionKind::new("apps", "v1", "Deployment"),
            "web",
        )
    }

    #[test]
    fn test_encode() {
        assert_eq!(deployment_ref().to_key(), "prod::apps/v1::Deployment::web");

        let service = ObjectRef::new("default", GroupVersionKind::new("", "v1", "Service"), "api");
        assert_eq!(service.to_key(), "default::v1::Service::api");
    }

    #[test]
    fn test_round_trip() {
        let refs = [
            deployment_ref(),
            ObjectRef::new("", GroupVersionKind::new("rbac.authorization.k8s.io", "v1", "ClusterRole"), "admin"),
            ObjectRef::new("ns", GroupVersionKind::new("stable.example.com", "v1beta1", "CronTab"), "my-tab"),
            ObjectRef::new("kube-system", GroupVersionKind::new("", "v1", "ConfigMap"), "cfg.with.dots"),
        ];

        for object_ref in refs {
            let key = object_ref.to_key();
            assert_eq!(ObjectRef::from_key(&key).unwrap(), object_ref, "key {key}");
            assert_eq!(key.parse::<ObjectRef>().unwrap().to_string(), key);
        }
    }

    #[test]
    fn test_split_key() {
        let (namespace, group_version, kind, name) =
            split_key("prod::apps/v1::Deployment::web").unwrap();
        assert_eq!(namespace, "prod");
        assert_eq!(group_version, "apps/v1");
        assert_eq!(kind, "Deployment");
        assert_eq!(name, "web");
    }

    #[test]
    fn test_split_key_wrong_field_count() {
        for key in [
            "",
            "web",
            "prod::v1::ConfigMap",
            "prod::apps/v1::Deployment::web::extra",
            "a:b:c:d",
        ] {
            let err = split_key(key).unwrap_err();
            assert!(matches!(err, CoreError::InvalidKey { .. }), "key {key:?}");
            assert!(err.is_format_error());
        }
    }

    #[test]
    fn test_from_key_invalid_group_version() {
        let err = ObjectRef::from_key("ns::a/b/c::Kind::name").unwrap_err();
        assert!(matches!(err, CoreError::InvalidGroupVersion { .. }));
    }

    #[test]
    fn test_error_message_names_expected_format() {
        let err = ObjectRef::from_key("bogus").unwrap_err();
        assert!(err.to_string().contains("namespace::groupVersion::kind::name"));
    }

    #[test]
    fn test_cluster_scoped_display() {
        let cluster_role = ObjectRef::from_key("::rbac.authorization.k8s.io/v1::ClusterRole::admin").unwrap();
        assert!(cluster_role.namespace().is_none());
        assert_eq!(cluster_role.display_name(), "ClusterRole/admin");
    }
}
