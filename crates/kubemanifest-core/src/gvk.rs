//! Group/Version/Kind identification of resource types

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{CoreError, Result};

/// API group and version (e.g., "apps/v1", or "v1" for the core group)
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersion {
    /// API group, empty for the core group
    pub group: String,
    /// API version
    pub version: String,
}

impl GroupVersion {
    /// Parse an apiVersion string
    ///
    /// - "apps/v1" -> group="apps", version="v1"
    /// - "v1" -> group="", version="v1" (core API)
    /// - "" -> empty group and version (unset)
    pub fn parse(value: &str) -> Result<Self> {
        if value.is_empty() || value == "/" {
            return Ok(Self {
                group: String::new(),
                version: String::new(),
            });
        }

        match value.split_once('/') {
            None => Ok(Self {
                group: String::new(),
                version: value.to_string(),
            }),
            Some((_, version)) if version.contains('/') => Err(CoreError::InvalidGroupVersion {
                value: value.to_string(),
                reason: "more than one '/'".to_string(),
            }),
            Some((group, version)) => Ok(Self {
                group: group.to_string(),
                version: version.to_string(),
            }),
        }
    }

    /// Attach a kind to this group version
    pub fn with_kind(self, kind: impl Into<String>) -> GroupVersionKind {
        GroupVersionKind {
            group: self.group,
            version: self.version,
            kind: kind.into(),
        }
    }
}

impl fmt::Display for GroupVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.group.is_empty() {
            write!(f, "{}", self.version)
        } else {
            write!(f, "{}/{}", self.group, self.version)
        }
    }
}

/// Group, version and kind of a resource type
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GroupVersionKind {
    pub group: String,
    pub version: String,
    pub kind: String,
}

impl GroupVersionKind {
    /// Create from explicit parts
    pub fn new(group: impl Into<String>, version: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            group: group.into(),
            version: version.into(),
            kind: kind.into(),
        }
    }

    /// Create from an apiVersion string and a kind
    pub fn from_api_version(api_version: &str, kind: &str) -> Result<Self> {
        Ok(GroupVersion::parse(api_version)?.with_kind(kind))
    }

    /// The group version part
    pub fn group_version(&self) -> GroupVersion {
        GroupVersion {
            group: self.group.clone(),
            version: self.version.clone(),
        }
    }

    /// The apiVersion string as written in manifests
    pub fn api_version(&self) -> String {
        self.group_version().to_string()
    }

    /// Check if this is a core-group kind at the given version
    pub fn is_core(&self, version: &str, kind: &str) -> bool {
        self.group.is_empty() && self.version == version && self.kind == kind
    }
}

impl fmt::Display for GroupVersionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, Kind={}", self.group_version(), self.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_group_version() {
        let gv = GroupVersion::parse("apps/v1").unwrap();
        assert_eq!(gv.group, "apps");
        assert_eq!(gv.version, "v1");

        let core = GroupVersion::parse("v1").unwrap();
        assert_eq!(core.group, "");
        assert_eq!(core.version, "v1");
        assert_eq!(core.to_string(), "v1");
    }

    #[test]
    fn test_parse_group_version_various_api_groups() {
        for api_version in [
            "networking.k8s.io/v1",
            "batch/v1",
            "autoscaling/v2",
            "stable.example.com/v1beta1",
        ] {
            let gv = GroupVersion::parse(api_version).unwrap();
            assert_eq!(gv.to_string(), api_version);
        }
    }

    #[test]
    fn test_parse_group_version_rejects_extra_slash() {
        let err = GroupVersion::parse("a/b/c").unwrap_err();
        assert!(err.is_format_error());
    }

    #[test]
    fn test_parse_group_version_empty() {
        let gv = GroupVersion::parse("").unwrap();
        assert!(gv.group.is_empty());
        assert!(gv.version.is_empty());
    }

    #[test]
    fn test_gvk_api_version() {
        let gvk = GroupVersionKind::from_api_version("apps/v1", "Deployment").unwrap();
        assert_eq!(gvk.api_version(), "apps/v1");
        assert_eq!(gvk.to_string(), "apps/v1, Kind=Deployment");

        let service = GroupVersionKind::from_api_version("v1", "Service").unwrap();
        assert!(service.is_core("v1", "Service"));
        assert!(!gvk.is_core("v1", "Deployment"));
    }
}
