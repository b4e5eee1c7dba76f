//! Value propagation through the field tree.
//!
//! Composite values are plain nested JSON, not references, so a change to
//! one field has to be copied into every enclosing composite by hand. The
//! updater owns that bookkeeping:
//!
//! - upward: the new value is written into the parent's container slot,
//!   then the parent's refreshed value into the grandparent's, up to the top;
//! - dirty flags: every ancestor is marked dirty and its `dirty_count`
//!   incremented exactly once per call;
//! - change flags: every ancestor recomputes `has_changes` from its
//!   refreshed composite;
//! - downward: writing a whole object or array brings the already
//!   materialized descendants in line with the new composite.
//!
//! Validation results are pushed through the same ancestor chain by
//! [`apply_validation_errors`].

use std::collections::{BTreeMap, HashSet};
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::creator::create_fields_for_schema;
use crate::defaults::default_value;
use crate::field::values_equal;
use crate::path::{
    ancestors, build_array_item_path, build_property_path, leading_index, parent_path,
    property_name,
};
use crate::registry::{FieldMap, descendants, remove_descendants};
use crate::schema::{Schema, SchemaShape};

/// How descendants take on a composite value written above them.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum SyncMode {
    /// The write is an edit: changed descendants become dirty and keep their
    /// pristine values.
    Edit,
    /// The write is a reset: descendants adopt the value as their new
    /// pristine value and become clean.
    Pristine,
}

/// Applies an edit to the field at `path` and propagates it.
///
/// Returns `false` without touching anything if no field is registered at
/// `path`; resolving or creating the field first is the caller's job.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, create_fields_for_schema, update_field_value};
/// use serde_json::json;
///
/// let schema = Arc::new(Schema::object([("name", Schema::string())]));
/// let mut fields = FieldMap::new();
/// create_fields_for_schema(&mut fields, "user", &schema, None, false);
///
/// assert!(update_field_value(&mut fields, "user.name", json!("Ada")));
/// assert_eq!(fields["user"].value, json!({ "name": "Ada" }));
/// assert!(fields["user"].dirty && fields["user"].has_changes);
/// ```
pub fn update_field_value(fields: &mut FieldMap, path: &str, value: Value) -> bool {
    update_field_value_in(fields, path, value, &mut HashSet::new())
}

/// [`update_field_value`] as one step of a larger edit: ancestors already in
/// `touched` are not counted again, and `path` itself joins `touched` so that
/// later steps of the same edit do not count it as an ancestor.
pub(crate) fn update_field_value_in(
    fields: &mut FieldMap,
    path: &str,
    value: Value,
    touched: &mut HashSet<String>,
) -> bool {
    let Some(field) = fields.get_mut(path) else {
        debug!(path, "Update skipped, field not registered");
        return false;
    };
    field.update_value(value);

    sync_descendants(fields, path, SyncMode::Edit);
    if let Some(field) = fields.get_mut(path) {
        field.refresh_has_changes();
    }

    update_parent_structures(fields, path);
    touched.insert(path.to_string());
    mark_ancestors_dirty(fields, path, touched);
    refresh_ancestor_changes(fields, path);
    true
}

/// Copies the value at `path` into each enclosing composite, bottom-up.
pub fn update_parent_structures(fields: &mut FieldMap, path: &str) {
    let mut child = path;
    while let Some(parent) = parent_path(child) {
        let Some(value) = fields.get(child).map(|field| field.value.clone()) else {
            break;
        };
        let Some(field) = fields.get_mut(parent) else {
            break;
        };
        let as_array = field.schema.is_array_schema();
        if !write_slot(&mut field.value, property_name(child), value, as_array) {
            warn!(path = child, parent, "Parent value cannot hold child value");
            break;
        }
        child = parent;
    }
}

/// Like [`update_parent_structures`], for values that appear through
/// materialization rather than an edit: wherever an ancestor's pristine
/// slot matched its current slot, the pristine slot is updated too, so no
/// change is reported.
pub(crate) fn seed_parent_structures(fields: &mut FieldMap, path: &str) {
    let mut child = path;
    while let Some(parent) = parent_path(child) {
        let Some(value) = fields.get(child).map(|field| field.value.clone()) else {
            break;
        };
        let Some(field) = fields.get_mut(parent) else {
            break;
        };
        let key = property_name(child);
        let as_array = field.schema.is_array_schema();
        let current = read_slot(&field.value, key).unwrap_or(&Value::Null);
        let pristine = read_slot(&field.pristine_value, key).unwrap_or(&Value::Null);
        let unchanged = values_equal(current, pristine);

        if !write_slot(&mut field.value, key, value.clone(), as_array) {
            break;
        }
        if unchanged {
            write_slot(&mut field.pristine_value, key, value, as_array);
        }
        field.refresh_has_changes();
        child = parent;
    }
}

/// Marks every ancestor of `path` dirty, once per ancestor per `touched`
/// set.
pub fn mark_ancestors_dirty(fields: &mut FieldMap, path: &str, touched: &mut HashSet<String>) {
    for ancestor in ancestors(path) {
        if !touched.insert(ancestor.to_string()) {
            continue;
        }
        if let Some(field) = fields.get_mut(ancestor) {
            field.dirty = true;
            field.dirty_count += 1;
            field.touch();
        }
    }
}

/// Recomputes `has_changes` on every ancestor of `path`.
pub fn refresh_ancestor_changes(fields: &mut FieldMap, path: &str) {
    for ancestor in ancestors(path) {
        if let Some(field) = fields.get_mut(ancestor) {
            field.refresh_has_changes();
        }
    }
}

/// Clears errors on every field.
pub fn clear_errors(fields: &mut FieldMap) {
    for field in fields.values_mut() {
        field.clear_errors();
    }
}

/// Replaces all validation state with `errors_by_path`.
///
/// Every field is reset first. Each path with messages then gets them as its
/// own errors and counts as one invalid field; each of its ancestors gains
/// one to its `error_count` and the distinct messages in its `errors`.
///
/// # Examples
///
/// ```
/// use std::collections::BTreeMap;
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, apply_validation_errors, create_fields_for_schema};
///
/// let schema = Arc::new(Schema::object([("a", Schema::string()), ("b", Schema::string())]));
/// let mut fields = FieldMap::new();
/// create_fields_for_schema(&mut fields, "form", &schema, None, false);
///
/// let mut errors = BTreeMap::new();
/// errors.insert("form.a".to_string(), vec!["This field is required".to_string()]);
/// errors.insert("form.b".to_string(), vec!["This field is required".to_string()]);
/// apply_validation_errors(&mut fields, &errors);
///
/// assert_eq!(fields["form"].error_count, 2);
/// assert_eq!(fields["form"].errors, vec!["This field is required"]);
/// ```
pub fn apply_validation_errors(
    fields: &mut FieldMap,
    errors_by_path: &BTreeMap<String, Vec<String>>,
) {
    clear_errors(fields);

    for (path, messages) in errors_by_path {
        if messages.is_empty() {
            continue;
        }
        let Some(field) = fields.get_mut(path) else {
            continue;
        };
        merge_messages(&mut field.errors, messages);
        field.error_count += 1;

        for ancestor in ancestors(path) {
            if let Some(parent) = fields.get_mut(ancestor) {
                merge_messages(&mut parent.errors, messages);
                parent.error_count += 1;
            }
        }
    }
}

fn merge_messages(target: &mut Vec<String>, messages: &[String]) {
    for message in messages {
        if !target.contains(message) {
            target.push(message.clone());
        }
    }
}

/// Brings the descendants of `path` in line with its composite value.
///
/// Existing descendant fields take the value found at their slot, missing
/// ones are created, and array element fields past the new length are
/// removed. Absent declared object properties are filled with their
/// default. The field at `path` ends up holding the normalized composite.
pub(crate) fn sync_descendants(fields: &mut FieldMap, path: &str, mode: SyncMode) {
    let Some(field) = fields.get(path) else {
        return;
    };
    let schema = Arc::clone(&field.schema);
    let value = field.value.clone();

    let synced = match (schema.shape(), value) {
        (SchemaShape::Primitive, _) => return,
        (SchemaShape::Object(properties), Value::Object(mut map)) => {
            let mut ordered = Map::new();
            for (name, property) in properties {
                let child_path = build_property_path(path, name);
                let child = sync_child(
                    fields,
                    &child_path,
                    property,
                    map.remove(name),
                    schema.is_property_required(name),
                    mode,
                );
                ordered.insert(name.clone(), child);
            }
            ordered.extend(map);
            Value::Object(ordered)
        }
        (SchemaShape::Array(items), Value::Array(mut list)) => {
            let len = list.len();
            let stale: Vec<String> = descendants(fields, path)
                .filter(|(key, _)| leading_index(key, path).is_some_and(|(index, _)| index >= len))
                .map(|(key, _)| key.clone())
                .collect();
            for key in &stale {
                fields.remove(key);
            }
            for (index, item) in list.iter_mut().enumerate() {
                let item_path = build_array_item_path(path, index);
                *item = sync_child(fields, &item_path, items, Some(item.take()), false, mode);
            }
            Value::Array(list)
        }
        _ => {
            let removed = remove_descendants(fields, path);
            debug!(path, removed, "Dropped descendants of non-composite value");
            return;
        }
    };

    if let Some(field) = fields.get_mut(path) {
        if mode == SyncMode::Pristine {
            field.pristine_value = synced.clone();
        }
        field.value = synced;
    }
}

fn sync_child(
    fields: &mut FieldMap,
    path: &str,
    schema: &Arc<Schema>,
    value: Option<Value>,
    required: bool,
    mode: SyncMode,
) -> Value {
    let next = value.unwrap_or_else(|| default_value(schema));
    if !fields.contains_key(path) {
        return create_fields_for_schema(fields, path, schema, Some(next), required);
    }
    let Some(field) = fields.get_mut(path) else {
        return Value::Null;
    };

    match mode {
        SyncMode::Edit => {
            if values_equal(&field.value, &next) {
                return field.value.clone();
            }
            field.value = next;
            field.dirty = true;
            field.dirty_count += 1;
        }
        SyncMode::Pristine => {
            field.value = next.clone();
            field.pristine_value = next;
            field.dirty = false;
            field.dirty_count = 0;
        }
    }
    field.touch();

    sync_descendants(fields, path, mode);
    match fields.get_mut(path) {
        Some(field) => {
            field.refresh_has_changes();
            field.value.clone()
        }
        None => Value::Null,
    }
}

pub(crate) fn read_slot<'a>(container: &'a Value, key: &str) -> Option<&'a Value> {
    match container {
        Value::Object(map) => map.get(key),
        Value::Array(list) => key.parse::<usize>().ok().and_then(|index| list.get(index)),
        _ => None,
    }
}

/// Writes `value` into `container` at `key`. A `null` container becomes an
/// empty array or object first. Array slots may be overwritten or appended,
/// never skipped.
pub(crate) fn write_slot(container: &mut Value, key: &str, value: Value, as_array: bool) -> bool {
    if container.is_null() {
        *container = if as_array {
            Value::Array(Vec::new())
        } else {
            Value::Object(Map::new())
        };
    }
    match container {
        Value::Object(map) => {
            map.insert(key.to_string(), value);
            true
        }
        Value::Array(list) => match key.parse::<usize>() {
            Ok(index) if index < list.len() => {
                list[index] = value;
                true
            }
            Ok(index) if index == list.len() => {
                list.push(value);
                true
            }
            _ => false,
        },
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn settings_fields() -> FieldMap {
        let schema = Arc::new(
            Schema::from_json(json!({
                "type": "object",
                "properties": {
                    "general": {
                        "type": "object",
                        "properties": {
                            "language": { "type": "string", "default": "en" },
                            "theme": { "type": "string", "default": "light" }
                        }
                    },
                    "tags": { "type": "array", "items": { "type": "string" }, "default": ["a", "b"] }
                }
            }))
            .unwrap(),
        );
        let mut fields = FieldMap::new();
        create_fields_for_schema(&mut fields, "settings", &schema, None, false);
        fields
    }

    #[test]
    fn test_update_writes_through_every_ancestor() {
        let mut fields = settings_fields();
        update_field_value(&mut fields, "settings.general.language", json!("de"));

        assert_eq!(fields["settings.general"].value["language"], json!("de"));
        assert_eq!(fields["settings"].value["general"]["language"], json!("de"));
        assert!(fields["settings"].has_changes);
        assert!(!fields["settings.general.theme"].dirty);
    }

    #[test]
    fn test_ancestors_count_every_call() {
        let mut fields = settings_fields();
        for expected in 1..=3 {
            update_field_value(&mut fields, "settings.general.language", json!(format!("v{expected}")));
            assert_eq!(fields["settings.general.language"].dirty_count, expected);
            assert_eq!(fields["settings.general"].dirty_count, expected);
            assert_eq!(fields["settings"].dirty_count, expected);
        }
    }

    #[test]
    fn test_shared_touched_set_counts_ancestors_once() {
        let mut fields = settings_fields();
        let mut touched = HashSet::new();
        update_field_value_in(&mut fields, "settings.tags", json!(["a", "b", ""]), &mut touched);
        update_field_value_in(&mut fields, "settings.tags.2", json!("c"), &mut touched);

        assert_eq!(fields["settings.tags.2"].dirty_count, 1);
        assert_eq!(fields["settings.tags"].dirty_count, 1);
        assert_eq!(fields["settings"].dirty_count, 1);
        assert_eq!(fields["settings"].value["tags"], json!(["a", "b", "c"]));
    }

    #[test]
    fn test_update_missing_field_is_noop() {
        let mut fields = settings_fields();
        assert!(!update_field_value(&mut fields, "settings.unknown", json!(1)));
        assert!(!fields["settings"].dirty);
    }

    #[test]
    fn test_edit_back_to_pristine_clears_changes_on_ancestors() {
        let mut fields = settings_fields();
        update_field_value(&mut fields, "settings.tags.1", json!("z"));
        assert!(fields["settings.tags"].has_changes);
        update_field_value(&mut fields, "settings.tags.1", json!("b"));
        assert!(!fields["settings.tags"].has_changes);
        assert!(!fields["settings"].has_changes);
        assert!(fields["settings"].dirty);
    }

    #[test]
    fn test_composite_write_syncs_descendants() {
        let mut fields = settings_fields();
        update_field_value(&mut fields, "settings.tags", json!(["x"]));
        assert_eq!(fields["settings.tags.0"].value, json!("x"));
        assert!(fields["settings.tags.0"].dirty);
        assert!(!fields.contains_key("settings.tags.1"));

        update_field_value(&mut fields, "settings.general", json!({ "theme": "dark" }));
        assert_eq!(fields["settings.general.theme"].value, json!("dark"));
        // Absent declared keys are filled with their default.
        assert_eq!(
            fields["settings.general"].value,
            json!({ "language": "en", "theme": "dark" })
        );
        assert!(!fields["settings.general.language"].dirty);
    }

    #[test]
    fn test_null_composite_drops_descendants() {
        let mut fields = settings_fields();
        update_field_value(&mut fields, "settings.general", Value::Null);
        assert!(!fields.contains_key("settings.general.language"));
        assert_eq!(fields["settings"].value["general"], Value::Null);
    }

    #[test]
    fn test_apply_validation_errors_resets_first() {
        let mut fields = settings_fields();
        let mut errors = BTreeMap::new();
        errors.insert(
            "settings.general.language".to_string(),
            vec!["Must be at least 3 characters".to_string()],
        );
        apply_validation_errors(&mut fields, &errors);
        assert_eq!(fields["settings"].error_count, 1);
        assert_eq!(fields["settings.general"].errors, vec!["Must be at least 3 characters"]);

        apply_validation_errors(&mut fields, &BTreeMap::new());
        assert_eq!(fields["settings"].error_count, 0);
        assert!(fields["settings.general"].errors.is_empty());
    }

    #[test]
    fn test_write_slot_rules() {
        let mut list = json!([1]);
        assert!(write_slot(&mut list, "1", json!(2), true));
        assert!(!write_slot(&mut list, "5", json!(9), true));
        assert_eq!(list, json!([1, 2]));

        let mut empty = Value::Null;
        assert!(write_slot(&mut empty, "a", json!(true), false));
        assert_eq!(empty, json!({ "a": true }));
    }
}
