//! Three-way strategic merge patch
//!
//! The patch is built from two diffs and then merged:
//! - deletions: `original -> target`, keeping only removals, so fields we
//!   stopped declaring get deleted
//! - delta: `current -> target`, ignoring removals, so fields added by the
//!   server or other writers survive
//!
//! Lists follow [`PatchMeta`]: keyed lists patch element-wise and delete
//! elements with `{"<key>": .., "$patch": "delete"}`, primitive sets use
//! `$deleteFromPrimitiveList/<field>`, every other list is replaced.

use serde_json::{Map, Value as JsonValue};

use super::PatchError;
use super::meta::{ListStrategy, PatchMeta, child_path};

/// Directive key inside a list element
pub const PATCH_DIRECTIVE: &str = "$patch";
/// Directive value removing a keyed list element
pub const DELETE_DIRECTIVE: &str = "delete";
/// Prefix of the sibling key listing primitives to remove
pub const DELETE_FROM_PRIMITIVE_LIST: &str = "$deleteFromPrimitiveList/";

#[derive(Debug, Clone, Copy)]
struct DiffOptions {
    ignore_deletions: bool,
    ignore_changes_and_additions: bool,
}

const DELETIONS_ONLY: DiffOptions = DiffOptions {
    ignore_deletions: false,
    ignore_changes_and_additions: true,
};

const CHANGES_ONLY: DiffOptions = DiffOptions {
    ignore_deletions: true,
    ignore_changes_and_additions: false,
};

/// Create a three-way strategic patch
pub fn create_three_way_patch(
    original: &JsonValue,
    target: &JsonValue,
    current: &JsonValue,
    meta: &PatchMeta,
) -> Result<JsonValue, PatchError> {
    let original = as_object(original, "original")?;
    let target = as_object(target, "target")?;
    let current = as_object(current, "current")?;

    let delta = diff_maps(current, target, meta, "", CHANGES_ONLY)?;
    let deletions = diff_maps(original, target, meta, "", DELETIONS_ONLY)?;

    Ok(JsonValue::Object(merge_patches(deletions, delta, meta, "")?))
}

fn as_object<'a>(value: &'a JsonValue, what: &'static str) -> Result<&'a Map<String, JsonValue>, PatchError> {
    value.as_object().ok_or(PatchError::NotAnObject { what })
}

fn diff_maps(
    from: &Map<String, JsonValue>,
    to: &Map<String, JsonValue>,
    meta: &PatchMeta,
    path: &str,
    options: DiffOptions,
) -> Result<Map<String, JsonValue>, PatchError> {
    let mut patch = Map::new();

    for (key, to_value) in to {
        let field = child_path(path, key);
        match (from.get(key), to_value) {
            (None, _) => {
                if !options.ignore_changes_and_additions {
                    patch.insert(key.clone(), to_value.clone());
                }
            }
            (Some(from_value), _) if from_value == to_value => {}
            (Some(JsonValue::Object(from_map)), JsonValue::Object(to_map)) => {
                let nested = diff_maps(from_map, to_map, meta, &field, options)?;
                if !nested.is_empty() {
                    patch.insert(key.clone(), JsonValue::Object(nested));
                }
            }
            (Some(JsonValue::Array(from_list)), JsonValue::Array(to_list)) => {
                diff_lists(key, from_list, to_list, meta, &field, options, &mut patch)?;
            }
            (Some(_), _) => {
                if !options.ignore_changes_and_additions {
                    patch.insert(key.clone(), to_value.clone());
                }
            }
        }
    }

    if !options.ignore_deletions {
        for key in from.keys() {
            if !to.contains_key(key) {
                patch.insert(key.clone(), JsonValue::Null);
            }
        }
    }

    Ok(patch)
}

fn diff_lists(
    key: &str,
    from: &[JsonValue],
    to: &[JsonValue],
    meta: &PatchMeta,
    field: &str,
    options: DiffOptions,
    patch: &mut Map<String, JsonValue>,
) -> Result<(), PatchError> {
    match meta.strategy(field) {
        ListStrategy::Replace => {
            if !options.ignore_changes_and_additions {
                patch.insert(key.to_string(), JsonValue::Array(to.to_vec()));
            }
        }
        ListStrategy::MergePrimitives => {
            let added: Vec<JsonValue> = to.iter().filter(|v| !from.contains(v)).cloned().collect();
            let removed: Vec<JsonValue> = from.iter().filter(|v| !to.contains(v)).cloned().collect();

            if !options.ignore_changes_and_additions && !added.is_empty() {
                patch.insert(key.to_string(), JsonValue::Array(added));
            }
            if !options.ignore_deletions && !removed.is_empty() {
                patch.insert(
                    format!("{DELETE_FROM_PRIMITIVE_LIST}{key}"),
                    JsonValue::Array(removed),
                );
            }
        }
        ListStrategy::MergeKey(merge_key) => {
            let mut elements = Vec::new();

            for to_element in to {
                let to_map = element_map(to_element, field, merge_key)?;
                let id = merge_key_value(to_map, field, merge_key)?;
                match find_element(from, field, merge_key, id)? {
                    None => {
                        if !options.ignore_changes_and_additions {
                            elements.push(to_element.clone());
                        }
                    }
                    Some(from_map) => {
                        let nested = diff_maps(from_map, to_map, meta, field, options)?;
                        if !nested.is_empty() {
                            let mut element = Map::new();
                            element.insert(merge_key.to_string(), id.clone());
                            element.extend(nested);
                            elements.push(JsonValue::Object(element));
                        }
                    }
                }
            }

            if !options.ignore_deletions {
                for from_element in from {
                    let from_map = element_map(from_element, field, merge_key)?;
                    let id = merge_key_value(from_map, field, merge_key)?;
                    if find_element(to, field, merge_key, id)?.is_none() {
                        let mut element = Map::new();
                        element.insert(merge_key.to_string(), id.clone());
                        element.insert(
                            PATCH_DIRECTIVE.to_string(),
                            JsonValue::String(DELETE_DIRECTIVE.to_string()),
                        );
                        elements.push(JsonValue::Object(element));
                    }
                }
            }

            if !elements.is_empty() {
                patch.insert(key.to_string(), JsonValue::Array(elements));
            }
        }
    }

    Ok(())
}

/// Merge the deletion patch with the change patch; changes win on scalars
fn merge_patches(
    mut merged: Map<String, JsonValue>,
    delta: Map<String, JsonValue>,
    meta: &PatchMeta,
    path: &str,
) -> Result<Map<String, JsonValue>, PatchError> {
    for (key, delta_value) in delta {
        let field = child_path(path, &key);
        let Some(existing) = merged.get_mut(&key) else {
            merged.insert(key, delta_value);
            continue;
        };

        match (existing, delta_value) {
            (JsonValue::Object(existing_map), JsonValue::Object(delta_map)) => {
                let combined = merge_patches(std::mem::take(existing_map), delta_map, meta, &field)?;
                *existing_map = combined;
            }
            (JsonValue::Array(existing_list), JsonValue::Array(delta_list)) => {
                merge_patch_lists(existing_list, delta_list, meta, &field)?;
            }
            (slot, delta_value) => *slot = delta_value,
        }
    }

    Ok(merged)
}

fn merge_patch_lists(
    existing: &mut Vec<JsonValue>,
    delta: Vec<JsonValue>,
    meta: &PatchMeta,
    field: &str,
) -> Result<(), PatchError> {
    let ListStrategy::MergeKey(merge_key) = meta.strategy(field) else {
        for value in delta {
            if !existing.contains(&value) {
                existing.push(value);
            }
        }
        return Ok(());
    };

    for delta_element in delta {
        let delta_map = element_map(&delta_element, field, merge_key)?;
        let id = merge_key_value(delta_map, field, merge_key)?.clone();
        let position = existing.iter().position(|e| {
            e.get(merge_key) == Some(&id) && e.get(PATCH_DIRECTIVE).is_none()
        });

        match (position, delta_element) {
            (Some(i), JsonValue::Object(delta_map)) => {
                if let JsonValue::Object(existing_map) = &mut existing[i] {
                    let combined = merge_patches(std::mem::take(existing_map), delta_map, meta, field)?;
                    *existing_map = combined;
                }
            }
            (_, element) => existing.push(element),
        }
    }

    Ok(())
}

/// Apply a strategic patch produced by [`create_three_way_patch`]
pub fn apply_strategic_patch(
    document: &JsonValue,
    patch: &JsonValue,
    meta: &PatchMeta,
) -> Result<JsonValue, PatchError> {
    match (document, patch) {
        (JsonValue::Object(document), JsonValue::Object(patch)) => Ok(JsonValue::Object(
            apply_map(document.clone(), patch, meta, "")?,
        )),
        _ => Ok(strip_directives(patch)),
    }
}

fn apply_map(
    mut document: Map<String, JsonValue>,
    patch: &Map<String, JsonValue>,
    meta: &PatchMeta,
    path: &str,
) -> Result<Map<String, JsonValue>, PatchError> {
    for (key, patch_value) in patch {
        if key == PATCH_DIRECTIVE {
            continue;
        }
        if let Some(list_field) = key.strip_prefix(DELETE_FROM_PRIMITIVE_LIST) {
            if let (Some(JsonValue::Array(list)), Some(removed)) =
                (document.get_mut(list_field), patch_value.as_array())
            {
                list.retain(|v| !removed.contains(v));
            }
            continue;
        }
        if patch_value.is_null() {
            document.shift_remove(key);
            continue;
        }

        let field = child_path(path, key);
        let slot = document.entry(key.clone()).or_insert(JsonValue::Null);
        let updated = match (std::mem::take(slot), patch_value) {
            (JsonValue::Object(existing), JsonValue::Object(nested)) => {
                JsonValue::Object(apply_map(existing, nested, meta, &field)?)
            }
            (JsonValue::Array(existing), JsonValue::Array(nested)) => {
                JsonValue::Array(apply_list(existing, nested, meta, &field)?)
            }
            (_, value) => strip_directives(value),
        };
        *slot = updated;
    }

    Ok(document)
}

fn apply_list(
    mut list: Vec<JsonValue>,
    patch: &[JsonValue],
    meta: &PatchMeta,
    field: &str,
) -> Result<Vec<JsonValue>, PatchError> {
    match meta.strategy(field) {
        ListStrategy::Replace => Ok(patch.iter().map(strip_directives).collect()),
        ListStrategy::MergePrimitives => {
            for value in patch {
                if !list.contains(value) {
                    list.push(value.clone());
                }
            }
            Ok(list)
        }
        ListStrategy::MergeKey(merge_key) => {
            for patch_element in patch {
                let patch_map = element_map(patch_element, field, merge_key)?;
                let id = merge_key_value(patch_map, field, merge_key)?;
                let position = list.iter().position(|e| e.get(merge_key) == Some(id));
                let delete = patch_map.get(PATCH_DIRECTIVE).and_then(JsonValue::as_str)
                    == Some(DELETE_DIRECTIVE);

                match position {
                    Some(i) if delete => {
                        list.remove(i);
                    }
                    None if delete => {}
                    Some(i) => {
                        list[i] = match std::mem::take(&mut list[i]) {
                            JsonValue::Object(existing) => {
                                JsonValue::Object(apply_map(existing, patch_map, meta, field)?)
                            }
                            _ => strip_directives(patch_element),
                        };
                    }
                    None => list.push(strip_directives(patch_element)),
                }
            }
            Ok(list)
        }
    }
}

fn strip_directives(value: &JsonValue) -> JsonValue {
    match value {
        JsonValue::Object(map) => JsonValue::Object(
            map.iter()
                .filter(|(k, _)| !k.starts_with('$'))
                .map(|(k, v)| (k.clone(), strip_directives(v)))
                .collect(),
        ),
        JsonValue::Array(list) => JsonValue::Array(list.iter().map(strip_directives).collect()),
        other => other.clone(),
    }
}

fn element_map<'a>(
    element: &'a JsonValue,
    field: &str,
    merge_key: &'static str,
) -> Result<&'a Map<String, JsonValue>, PatchError> {
    element.as_object().ok_or_else(|| PatchError::NonObjectElement {
        field: field.to_string(),
        key: merge_key,
    })
}

fn merge_key_value<'a>(
    element: &'a Map<String, JsonValue>,
    field: &str,
    merge_key: &'static str,
) -> Result<&'a JsonValue, PatchError> {
    element.get(merge_key).ok_or_else(|| PatchError::MissingMergeKey {
        field: field.to_string(),
        key: merge_key,
    })
}

fn find_element<'a>(
    list: &'a [JsonValue],
    field: &str,
    merge_key: &'static str,
    id: &JsonValue,
) -> Result<Option<&'a Map<String, JsonValue>>, PatchError> {
    for element in list {
        let map = element_map(element, field, merge_key)?;
        if map.get(merge_key) == Some(id) {
            return Ok(Some(map));
        }
    }
    Ok(None)
}
