//! Manifest text decoding
//!
//! Manifests are UTF-8 YAML or JSON. A stream may hold several documents;
//! only the first non-empty one is used, one resource per call.

use serde::Deserialize;
use serde_json::Value as JsonValue;

use crate::error::{CoreError, Result};
use crate::object::ResourceObject;

/// Decode manifest text into a resource object
///
/// Empty documents (including comment-only ones) are skipped. The first
/// remaining document must be a mapping with `apiVersion`, `kind` and
/// `metadata.name`.
pub fn decode_manifest(content: &str) -> Result<ResourceObject> {
    for document in serde_yaml::Deserializer::from_str(content) {
        let value = JsonValue::deserialize(document).map_err(CoreError::parse)?;
        if value.is_null() {
            continue;
        }
        return ResourceObject::from_value(value);
    }

    Err(CoreError::EmptyManifest)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_yaml() {
        let obj = decode_manifest(
            r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: settings
  namespace: apps
data:
  key: value
"#,
        )
        .unwrap();

        assert_eq!(obj.kind(), "ConfigMap");
        assert_eq!(obj.name(), "settings");
        assert_eq!(obj.namespace(), Some("apps"));
    }

    #[test]
    fn test_decode_json() {
        let obj = decode_manifest(
            r#"{"apiVersion": "apps/v1", "kind": "Deployment", "metadata": {"name": "web"}}"#,
        )
        .unwrap();

        assert_eq!(obj.api_version(), "apps/v1");
        assert_eq!(obj.name(), "web");
    }

    #[test]
    fn test_first_non_empty_document_wins() {
        let content = "---\n\n---\napiVersion: v1\nkind: A\nmetadata:\n  name: first\n---\napiVersion: v1\nkind: B\nmetadata:\n  name: second\n";
        let obj = decode_manifest(content).unwrap();

        assert_eq!(obj.kind(), "A");
        assert_eq!(obj.name(), "first");
    }

    #[test]
    fn test_comment_only_document_skipped() {
        let content = "# just a comment\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: creds\n";
        let obj = decode_manifest(content).unwrap();

        assert_eq!(obj.kind(), "Secret");
    }

    #[test]
    fn test_empty_manifest() {
        assert!(matches!(decode_manifest(""), Err(CoreError::EmptyManifest)));
        assert!(matches!(
            decode_manifest("---\n---\n"),
            Err(CoreError::EmptyManifest)
        ));
    }

    #[test]
    fn test_invalid_yaml() {
        let err = decode_manifest("kind: [unclosed").unwrap_err();
        assert!(matches!(err, CoreError::Parse { .. }));
        assert!(err.to_string().starts_with("Failed to unmarshal manifest"));
    }

    #[test]
    fn test_not_a_mapping() {
        assert!(matches!(
            decode_manifest("- a\n- b\n"),
            Err(CoreError::Parse { .. })
        ));
    }
}
