//! Field merge metadata for strategic patches
//!
//! Lists inside native objects either merge element-wise by a key field
//! (`containers` by `name`), merge as a set of primitives (`finalizers`), or
//! are replaced wholesale. Paths are dotted field names from the object root;
//! list elements share the path of their list.

use std::collections::HashMap;

/// How a list at a given path is combined
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ListStrategy {
    /// Replace the whole list
    #[default]
    Replace,
    /// Merge object elements matched by the named key field
    MergeKey(&'static str),
    /// Merge as a set of primitive values
    MergePrimitives,
}

/// List merge rules for one kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PatchMeta {
    lists: HashMap<String, ListStrategy>,
}

impl PatchMeta {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule for the list at `path`
    pub fn with_list(mut self, path: &str, strategy: ListStrategy) -> Self {
        self.lists.insert(path.to_string(), strategy);
        self
    }

    /// Add the rules of a PodSpec rooted at `prefix`
    pub fn with_pod_spec(mut self, prefix: &[&str]) -> Self {
        let root = prefix.join(".");
        for (list, key) in [
            ("containers", "name"),
            ("initContainers", "name"),
            ("ephemeralContainers", "name"),
            ("volumes", "name"),
            ("imagePullSecrets", "name"),
            ("hostAliases", "ip"),
            ("topologySpreadConstraints", "topologyKey"),
            ("resourceClaims", "name"),
        ] {
            self.lists
                .insert(format!("{root}.{list}"), ListStrategy::MergeKey(key));
        }

        for containers in ["containers", "initContainers", "ephemeralContainers"] {
            for (list, key) in [
                ("ports", "containerPort"),
                ("env", "name"),
                ("volumeMounts", "mountPath"),
                ("volumeDevices", "devicePath"),
            ] {
                self.lists.insert(
                    format!("{root}.{containers}.{list}"),
                    ListStrategy::MergeKey(key),
                );
            }
        }
        self
    }

    /// Strategy for the list at a dotted path
    pub fn strategy(&self, path: &str) -> ListStrategy {
        self.lists.get(path).copied().unwrap_or_default()
    }
}

/// Extend a dotted path by one field
pub(crate) fn child_path(path: &str, field: &str) -> String {
    if path.is_empty() {
        field.to_string()
    } else {
        format!("{path}.{field}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unknown_path_replaces() {
        let meta = PatchMeta::new();
        assert_eq!(meta.strategy("spec.args"), ListStrategy::Replace);
    }

    #[test]
    fn test_pod_spec_rules() {
        let meta = PatchMeta::new().with_pod_spec(&["spec", "template", "spec"]);

        assert_eq!(
            meta.strategy("spec.template.spec.containers"),
            ListStrategy::MergeKey("name")
        );
        assert_eq!(
            meta.strategy("spec.template.spec.containers.ports"),
            ListStrategy::MergeKey("containerPort")
        );
        assert_eq!(
            meta.strategy("spec.template.spec.initContainers.env"),
            ListStrategy::MergeKey("name")
        );
        assert_eq!(
            meta.strategy("spec.template.spec.containers.args"),
            ListStrategy::Replace
        );
        assert_eq!(meta.strategy("spec.containers"), ListStrategy::Replace);
    }

    #[test]
    fn test_child_path() {
        assert_eq!(child_path("", "spec"), "spec");
        assert_eq!(child_path("spec", "ports"), "spec.ports");
    }
}
