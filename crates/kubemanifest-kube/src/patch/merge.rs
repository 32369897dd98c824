//! JSON merge patch (RFC 7386)
//!
//! Used for kinds outside the native scheme. Lists are always replaced and
//! removed fields are expressed as `null`.

use serde_json::{Map, Value as JsonValue};

/// Create a merge patch turning `current` into `target`
pub fn create_merge_patch(current: &JsonValue, target: &JsonValue) -> JsonValue {
    match (current, target) {
        (JsonValue::Object(current), JsonValue::Object(target)) => {
            JsonValue::Object(diff_maps(current, target))
        }
        _ => target.clone(),
    }
}

fn diff_maps(current: &Map<String, JsonValue>, target: &Map<String, JsonValue>) -> Map<String, JsonValue> {
    let mut patch = Map::new();

    for (key, target_value) in target {
        match current.get(key) {
            Some(current_value) if current_value == target_value => {}
            Some(JsonValue::Object(current_map)) if target_value.is_object() => {
                if let JsonValue::Object(target_map) = target_value {
                    patch.insert(
                        key.clone(),
                        JsonValue::Object(diff_maps(current_map, target_map)),
                    );
                }
            }
            _ => {
                patch.insert(key.clone(), target_value.clone());
            }
        }
    }

    for key in current.keys() {
        if !target.contains_key(key) {
            patch.insert(key.clone(), JsonValue::Null);
        }
    }

    patch
}

/// Apply a merge patch in place
pub fn apply_merge_patch(document: &mut JsonValue, patch: &JsonValue) {
    let JsonValue::Object(patch_map) = patch else {
        *document = patch.clone();
        return;
    };

    if !document.is_object() {
        *document = JsonValue::Object(Map::new());
    }
    let Some(document_map) = document.as_object_mut() else {
        return;
    };

    for (key, patch_value) in patch_map {
        if patch_value.is_null() {
            document_map.shift_remove(key);
        } else {
            let slot = document_map.entry(key.clone()).or_insert(JsonValue::Null);
            apply_merge_patch(slot, patch_value);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_identical_is_empty() {
        let doc = json!({"spec": {"size": 3, "tags": ["a", "b"]}});
        assert_eq!(create_merge_patch(&doc, &doc), json!({}));
    }

    #[test]
    fn test_changed_and_added_fields() {
        let current = json!({"spec": {"size": 3, "color": "red"}});
        let target = json!({"spec": {"size": 5, "color": "red", "shape": "round"}});

        assert_eq!(
            create_merge_patch(&current, &target),
            json!({"spec": {"size": 5, "shape": "round"}})
        );
    }

    #[test]
    fn test_removed_field_is_null() {
        let current = json!({"metadata": {"labels": {"a": "1", "b": "2"}}, "status": {"ok": true}});
        let target = json!({"metadata": {"labels": {"a": "1"}}});

        assert_eq!(
            create_merge_patch(&current, &target),
            json!({"metadata": {"labels": {"b": null}}, "status": null})
        );
    }

    #[test]
    fn test_lists_replaced_wholesale() {
        let current = json!({"spec": {"items": [1, 2, 3]}});
        let target = json!({"spec": {"items": [1, 3]}});

        assert_eq!(
            create_merge_patch(&current, &target),
            json!({"spec": {"items": [1, 3]}})
        );
    }

    #[test]
    fn test_type_change_replaces() {
        let current = json!({"spec": {"value": {"nested": 1}}});
        let target = json!({"spec": {"value": "flat"}});

        assert_eq!(
            create_merge_patch(&current, &target),
            json!({"spec": {"value": "flat"}})
        );
    }

    #[test]
    fn test_apply_reaches_target() {
        let current = json!({
            "metadata": {"name": "tab", "labels": {"a": "1", "b": "2"}},
            "spec": {"cron": "* * * * */5", "image": "old"}
        });
        let target = json!({
            "metadata": {"name": "tab", "labels": {"a": "1"}},
            "spec": {"cron": "* * * * */10", "image": "old", "replicas": 2}
        });

        let patch = create_merge_patch(&current, &target);
        let mut patched = current.clone();
        apply_merge_patch(&mut patched, &patch);

        assert_eq!(patched, target);
    }
}
