//! The in-memory representation of one remote resource
//!
//! A [`ResourceObject`] owns the full ordered body of the resource
//! (`apiVersion`, `kind`, `metadata`, `spec`, `status`, and whatever else the
//! kind carries). Identity fields are read from and written to that body, so
//! there is a single source of truth for what gets serialized and diffed.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value as JsonValue};

use crate::error::{CoreError, Result};
use crate::gvk::{GroupVersion, GroupVersionKind};
use crate::key::ObjectRef;
use crate::value::ValueExt;

/// Namespace used when neither the manifest nor the caller names one
pub const DEFAULT_NAMESPACE: &str = "default";

/// One remote resource, decoded into an ordered value tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResourceObject {
    body: Map<String, JsonValue>,
}

impl ResourceObject {
    /// Build from a decoded value, checking the identity invariants
    ///
    /// The value must be a mapping with non-empty `apiVersion`, `kind` and
    /// `metadata.name`, and `apiVersion` must be a valid group version.
    pub fn from_value(value: JsonValue) -> Result<Self> {
        let JsonValue::Object(body) = value else {
            return Err(CoreError::parse("manifest is not a mapping"));
        };

        let object = Self { body };
        let api_version = object.api_version();
        if api_version.is_empty() {
            return Err(CoreError::MissingField {
                field: "apiVersion".to_string(),
            });
        }
        GroupVersion::parse(api_version)?;
        if object.kind().is_empty() {
            return Err(CoreError::MissingField {
                field: "kind".to_string(),
            });
        }
        if object.name().is_empty() {
            return Err(CoreError::MissingField {
                field: "metadata.name".to_string(),
            });
        }

        Ok(object)
    }

    pub fn api_version(&self) -> &str {
        self.body.lookup_str(&["apiVersion"]).unwrap_or_default()
    }

    pub fn kind(&self) -> &str {
        self.body.lookup_str(&["kind"]).unwrap_or_default()
    }

    pub fn name(&self) -> &str {
        self.body
            .lookup_str(&["metadata", "name"])
            .unwrap_or_default()
    }

    /// Group, version and kind of this object
    pub fn gvk(&self) -> GroupVersionKind {
        let api_version = self.api_version();
        GroupVersion::parse(api_version)
            .unwrap_or_else(|_| GroupVersion {
                group: String::new(),
                version: api_version.to_string(),
            })
            .with_kind(self.kind())
    }

    /// Namespace, or `None` when unset or empty
    pub fn namespace(&self) -> Option<&str> {
        self.body
            .lookup_str(&["metadata", "namespace"])
            .filter(|ns| !ns.is_empty())
    }

    pub fn set_namespace(&mut self, namespace: &str) {
        self.metadata_mut().insert(
            "namespace".to_string(),
            JsonValue::String(namespace.to_string()),
        );
    }

    /// Resolve the namespace once, before first remote use
    ///
    /// Precedence: namespace in the manifest, then the caller-supplied one,
    /// then [`DEFAULT_NAMESPACE`].
    pub fn resolve_namespace(&mut self, caller: Option<&str>) {
        if self.namespace().is_some() {
            return;
        }
        let namespace = caller
            .filter(|ns| !ns.is_empty())
            .unwrap_or(DEFAULT_NAMESPACE)
            .to_string();
        self.set_namespace(&namespace);
    }

    /// Server-assigned concurrency token
    pub fn resource_version(&self) -> Option<&str> {
        self.body
            .lookup_str(&["metadata", "resourceVersion"])
            .filter(|rv| !rv.is_empty())
    }

    /// Set or clear the concurrency token
    pub fn set_resource_version(&mut self, resource_version: Option<&str>) {
        match resource_version {
            Some(rv) => {
                self.metadata_mut().insert(
                    "resourceVersion".to_string(),
                    JsonValue::String(rv.to_string()),
                );
            }
            None => {
                if let Some(JsonValue::Object(metadata)) = self.body.get_mut("metadata") {
                    metadata.shift_remove("resourceVersion");
                }
            }
        }
    }

    pub fn generation(&self) -> Option<i64> {
        self.body.lookup_i64(&["metadata", "generation"])
    }

    pub fn spec(&self) -> Option<&JsonValue> {
        self.body.get("spec")
    }

    /// Observed state, or `None` when the key is absent or null
    pub fn status(&self) -> Option<&JsonValue> {
        self.body.get("status").filter(|s| !s.is_null())
    }

    /// The full ordered body
    pub fn body(&self) -> &Map<String, JsonValue> {
        &self.body
    }

    /// Clone the body into a standalone value
    pub fn to_value(&self) -> JsonValue {
        JsonValue::Object(self.body.clone())
    }

    /// Identity of this object
    pub fn object_ref(&self) -> ObjectRef {
        ObjectRef {
            namespace: self.namespace().unwrap_or_default().to_string(),
            gvk: self.gvk(),
            name: self.name().to_string(),
        }
    }

    /// Durable `namespace::groupVersion::kind::name` key
    pub fn tracking_key(&self) -> String {
        self.object_ref().to_key()
    }

    /// Get display name for logging
    pub fn display_name(&self) -> String {
        match self.namespace() {
            Some(ns) => format!("{}/{}/{}", ns, self.kind(), self.name()),
            None => format!("{}/{}", self.kind(), self.name()),
        }
    }

    fn metadata_mut(&mut self) -> &mut Map<String, JsonValue> {
        let entry = self
            .body
            .entry("metadata".to_string())
            .or_insert_with(|| JsonValue::Object(Map::new()));
        if !entry.is_object() {
            *entry = JsonValue::Object(Map::new());
        }
        match entry {
            JsonValue::Object(map) => map,
            _ => unreachable!("metadata was just replaced with a map"),
        }
    }
}
