//! Resolve-or-create for field paths.
//!
//! Fields normally exist from construction onward, but some paths only
//! become addressable later: array elements that were appended by value,
//! properties below an object that was nulled out and re-filled, or any path
//! whose registry entries were dropped by a composite write. The resolver
//! walks such a path segment by segment and materializes what is missing.
//!
//! Reading ([`resolve_field`]) never changes what the form holds: array
//! elements are only materialized below the current length, and property
//! fields only below an existing object value. Writing
//! ([`materialize_path`]) may also grow arrays ([`expand_array_to_index`])
//! and turn a `null` object into a filled one ([`ensure_object_property`]).

use std::collections::HashSet;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::config::ArrayConfig;
use crate::creator::create_fields_for_schema;
use crate::defaults::default_value;
use crate::error::{FormError, Result};
use crate::field::Field;
use crate::path::{
    build_array_item_path, build_child_path, build_property_path, is_array_index, parse_path,
};
use crate::registry::FieldMap;
use crate::schema::SchemaShape;
use crate::updater::{seed_parent_structures, update_field_value_in};

#[derive(Debug, Clone, Copy)]
enum Mode<'a> {
    Read,
    Write(&'a ArrayConfig),
}

/// Looks up the field at `path`, materializing it from its parent's value if
/// it is not registered yet.
///
/// Returns `None` when the path leaves the schema (an undeclared property),
/// points past the end of an array, or runs through a parent whose value
/// cannot hold it. Top-level paths are only ever looked up.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, create_fields_for_schema, resolve_field};
/// use serde_json::json;
///
/// let schema = Arc::new(Schema::array(Schema::string()));
/// let mut fields = FieldMap::new();
/// create_fields_for_schema(&mut fields, "tags", &schema, Some(json!(["a"])), false);
///
/// assert_eq!(resolve_field(&mut fields, "tags.0").unwrap().value, json!("a"));
/// assert!(resolve_field(&mut fields, "tags.1").is_none());
/// assert!(resolve_field(&mut fields, "missing").is_none());
/// ```
pub fn resolve_field<'a>(fields: &'a mut FieldMap, path: &str) -> Option<&'a Field> {
    if !fields.contains_key(path) {
        walk(fields, path, Mode::Read, &mut HashSet::new()).ok()?;
    }
    fields.get(path)
}

/// Materializes every missing field along `path` for a write.
///
/// Unlike [`resolve_field`], numeric segments past the end of an array grow
/// the array with default elements (at most `arrays.max_growth` of them),
/// and a property below a `null` object turns the object back into a filled
/// composite. Both are recorded as edits.
///
/// # Errors
///
/// Returns [`FormError::FieldNotFound`] if the first segment is not a
/// registered field or a later segment is not declared by the schema, and
/// [`FormError::IndexOutOfBounds`] if an index lies further past the end of
/// its array than `arrays.max_growth` allows.
pub fn materialize_path(fields: &mut FieldMap, path: &str, arrays: &ArrayConfig) -> Result<()> {
    materialize_path_in(fields, path, arrays, &mut HashSet::new())
}

/// [`materialize_path`] as the first step of a write: the edits it makes
/// record their paths in `touched`, so the final write of the same call does
/// not count those ancestors a second time.
pub(crate) fn materialize_path_in(
    fields: &mut FieldMap,
    path: &str,
    arrays: &ArrayConfig,
    touched: &mut HashSet<String>,
) -> Result<()> {
    if fields.contains_key(path) {
        return Ok(());
    }
    walk(fields, path, Mode::Write(arrays), touched)
}

fn walk(
    fields: &mut FieldMap,
    path: &str,
    mode: Mode<'_>,
    touched: &mut HashSet<String>,
) -> Result<()> {
    let not_found = || FormError::FieldNotFound(path.to_string());
    let segments = parse_path(path);
    let Some((first, rest)) = segments.split_first() else {
        return Err(not_found());
    };
    if !fields.contains_key(*first) {
        return Err(not_found());
    }

    let mut current = (*first).to_string();
    for segment in rest {
        let next = build_child_path(&current, segment);
        if !fields.contains_key(&next) {
            materialize_child(fields, &current, segment, mode, touched).map_err(|err| match err {
                FormError::IndexOutOfBounds { .. } => err,
                _ => not_found(),
            })?;
            debug!(path = %next, "Materialized field");
        }
        current = next;
    }
    Ok(())
}

fn materialize_child(
    fields: &mut FieldMap,
    parent: &str,
    segment: &str,
    mode: Mode<'_>,
    touched: &mut HashSet<String>,
) -> Result<()> {
    let invalid = || FormError::FieldNotFound(build_child_path(parent, segment));
    let field = fields.get(parent).ok_or_else(invalid)?;
    let schema = Arc::clone(&field.schema);

    match schema.shape() {
        SchemaShape::Array(items) => {
            if !is_array_index(segment) {
                return Err(invalid());
            }
            let index: usize = segment.parse().map_err(|_| invalid())?;
            let existing = field.value.as_array().and_then(|list| list.get(index)).cloned();
            match (existing, mode) {
                (Some(item), _) => {
                    let item_path = build_array_item_path(parent, index);
                    create_fields_for_schema(fields, &item_path, items, Some(item), false);
                    Ok(())
                }
                (None, Mode::Write(arrays)) => {
                    expand_array(fields, parent, index, arrays, touched).map(drop)
                }
                (None, Mode::Read) => Err(invalid()),
            }
        }
        SchemaShape::Object(properties) => {
            if !properties.contains_key(segment) {
                return Err(invalid());
            }
            if matches!(mode, Mode::Read) && !field.value.is_object() {
                return Err(invalid());
            }
            ensure_property(fields, parent, segment, touched).map(drop)
        }
        SchemaShape::Primitive => Err(invalid()),
    }
}

/// Grows the array at `array_path` with default elements until `index` is
/// in range, creating a field per new element. Returns the element path.
///
/// Growing is an edit of the array: it becomes dirty and the change
/// propagates to its ancestors. An index already in range is a no-op.
///
/// # Errors
///
/// [`FormError::FieldNotFound`] if no field is registered at `array_path`,
/// [`FormError::NotAnArray`] if it is not an array field, and
/// [`FormError::IndexOutOfBounds`] if reaching `index` would append more
/// than `arrays.max_growth` elements.
pub fn expand_array_to_index(
    fields: &mut FieldMap,
    array_path: &str,
    index: usize,
    arrays: &ArrayConfig,
) -> Result<String> {
    expand_array(fields, array_path, index, arrays, &mut HashSet::new())
}

fn expand_array(
    fields: &mut FieldMap,
    array_path: &str,
    index: usize,
    arrays: &ArrayConfig,
    touched: &mut HashSet<String>,
) -> Result<String> {
    let field = fields
        .get(array_path)
        .ok_or_else(|| FormError::FieldNotFound(array_path.to_string()))?;
    let SchemaShape::Array(items) = field.schema.shape() else {
        return Err(FormError::NotAnArray(array_path.to_string()));
    };
    let mut list = match &field.value {
        Value::Array(list) => list.clone(),
        Value::Null => Vec::new(),
        _ => return Err(FormError::NotAnArray(array_path.to_string())),
    };

    let items = Arc::clone(items);
    let item_path = build_array_item_path(array_path, index);
    if let Some(item) = list.get(index) {
        if !fields.contains_key(&item_path) {
            create_fields_for_schema(fields, &item_path, &items, Some(item.clone()), false);
        }
        return Ok(item_path);
    }
    if index - list.len() >= arrays.max_growth {
        warn!(
            path = array_path,
            index,
            len = list.len(),
            max_growth = arrays.max_growth,
            "Array growth limit exceeded"
        );
        return Err(FormError::IndexOutOfBounds {
            path: array_path.to_string(),
            index,
            len: list.len(),
        });
    }

    let default = default_value(&items);
    list.resize(index + 1, default);
    debug!(path = array_path, len = list.len(), "Expanded array");
    update_field_value_in(fields, array_path, Value::Array(list), touched);
    Ok(item_path)
}

/// Makes sure the declared property `name` of the object at `object_path`
/// has a field, returning its path.
///
/// A property missing from the object's value is seeded with its default;
/// the object's pristine value is seeded alongside when it held the same
/// slot, so seeding alone does not register as a change. A `null` object is
/// first replaced by a filled composite, which is an edit.
///
/// # Errors
///
/// [`FormError::FieldNotFound`] if the object field is missing, does not
/// declare `name`, or holds a non-object value.
pub fn ensure_object_property(
    fields: &mut FieldMap,
    object_path: &str,
    name: &str,
) -> Result<String> {
    ensure_property(fields, object_path, name, &mut HashSet::new())
}

fn ensure_property(
    fields: &mut FieldMap,
    object_path: &str,
    name: &str,
    touched: &mut HashSet<String>,
) -> Result<String> {
    let property_path = build_property_path(object_path, name);
    let not_found = |path: &str| FormError::FieldNotFound(path.to_string());

    let field = fields
        .get(object_path)
        .ok_or_else(|| not_found(&property_path))?;
    let schema = Arc::clone(&field.schema);
    let property = schema
        .property(name)
        .ok_or_else(|| not_found(&property_path))?;
    if fields.contains_key(&property_path) {
        return Ok(property_path);
    }

    match &field.value {
        Value::Object(map) => {
            let seed = map.get(name).cloned();
            create_fields_for_schema(
                fields,
                &property_path,
                property,
                seed,
                schema.is_property_required(name),
            );
            seed_parent_structures(fields, &property_path);
        }
        Value::Null => {
            debug!(path = object_path, "Refilling null object");
            update_field_value_in(fields, object_path, Value::Object(Map::new()), touched);
        }
        _ => return Err(not_found(&property_path)),
    }

    if fields.contains_key(&property_path) {
        Ok(property_path)
    } else {
        Err(not_found(&property_path))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::registry::remove_descendants;
    use crate::schema::Schema;
    use crate::updater::update_field_value;

    fn profile_fields() -> FieldMap {
        let schema = Arc::new(
            Schema::from_json(json!({
                "type": "object",
                "properties": {
                    "name": { "type": "string", "default": "John" },
                    "tags": { "type": "array", "items": { "type": "string" } }
                }
            }))
            .unwrap(),
        );
        let mut fields = FieldMap::new();
        create_fields_for_schema(&mut fields, "profile", &schema, None, false);
        fields
    }

    #[test]
    fn test_read_does_not_extend_arrays() {
        let mut fields = profile_fields();
        assert!(resolve_field(&mut fields, "profile.tags.0").is_none());
        assert_eq!(fields["profile.tags"].value, json!([]));
        assert!(!fields["profile"].dirty);
    }

    #[test]
    fn test_read_rejects_undeclared_property() {
        let mut fields = profile_fields();
        assert!(resolve_field(&mut fields, "profile.nickname").is_none());
        assert!(resolve_field(&mut fields, "profile.name.first").is_none());
    }

    #[test]
    fn test_read_rematerializes_dropped_field_without_change() {
        let mut fields = profile_fields();
        fields.remove("profile.name");
        let field = resolve_field(&mut fields, "profile.name").unwrap();
        assert_eq!(field.value, json!("John"));
        assert!(!fields["profile"].has_changes);
        assert!(!fields["profile"].dirty);
    }

    #[test]
    fn test_read_seeds_absent_key_into_parent_and_pristine() {
        let mut fields = profile_fields();
        fields.remove("profile.name");
        for slot in ["value", "pristine"] {
            let field = fields.get_mut("profile").unwrap();
            let target = if slot == "value" { &mut field.value } else { &mut field.pristine_value };
            target.as_object_mut().unwrap().remove("name");
        }

        resolve_field(&mut fields, "profile.name").unwrap();
        assert_eq!(fields["profile"].value["name"], json!("John"));
        assert_eq!(fields["profile"].pristine_value["name"], json!("John"));
        assert!(!fields["profile"].has_changes);
    }

    #[test]
    fn test_read_through_null_object_fails() {
        let mut fields = profile_fields();
        update_field_value(&mut fields, "profile", Value::Null);
        assert!(resolve_field(&mut fields, "profile.name").is_none());
    }

    #[test]
    fn test_write_expands_array() {
        let mut fields = profile_fields();
        materialize_path(&mut fields, "profile.tags.2", &ArrayConfig::default()).unwrap();
        assert_eq!(fields["profile.tags"].value, json!(["", "", ""]));
        assert!(fields.contains_key("profile.tags.1"));
        assert!(fields["profile.tags"].dirty);
        assert!(fields["profile"].has_changes);
    }

    #[test]
    fn test_write_refills_null_object() {
        let mut fields = profile_fields();
        update_field_value(&mut fields, "profile", Value::Null);
        materialize_path(&mut fields, "profile.name", &ArrayConfig::default()).unwrap();
        assert_eq!(fields["profile"].value, json!({ "name": "John", "tags": [] }));
        assert!(fields.contains_key("profile.tags"));
    }

    #[test]
    fn test_write_rejects_unknown_paths() {
        let mut fields = profile_fields();
        let arrays = ArrayConfig::default();
        let err = materialize_path(&mut fields, "profile.nickname", &arrays).unwrap_err();
        assert_eq!(err.code(), "FIELD_NOT_FOUND");
        assert!(materialize_path(&mut fields, "other.name", &arrays).is_err());
        assert!(materialize_path(&mut fields, "profile.tags.x", &arrays).is_err());
    }

    #[test]
    fn test_write_growth_limit() {
        let mut fields = profile_fields();
        let arrays = ArrayConfig { max_growth: 2 };

        let err = materialize_path(&mut fields, "profile.tags.2", &arrays).unwrap_err();
        assert!(matches!(err, FormError::IndexOutOfBounds { index: 2, len: 0, .. }));
        let huge = format!("profile.tags.{}", usize::MAX);
        let err = materialize_path(&mut fields, &huge, &arrays).unwrap_err();
        assert_eq!(err.code(), "INDEX_OUT_OF_BOUNDS");
        assert_eq!(fields["profile.tags"].value, json!([]));
        assert!(!fields["profile"].dirty);

        materialize_path(&mut fields, "profile.tags.1", &arrays).unwrap();
        assert_eq!(fields["profile.tags"].value, json!(["", ""]));
    }

    #[test]
    fn test_write_counts_each_ancestor_once() {
        let mut fields = profile_fields();
        let mut touched = HashSet::new();
        materialize_path_in(&mut fields, "profile.tags.0", &ArrayConfig::default(), &mut touched)
            .unwrap();
        update_field_value_in(&mut fields, "profile.tags.0", json!("a"), &mut touched);

        assert_eq!(fields["profile.tags.0"].dirty_count, 1);
        assert_eq!(fields["profile.tags"].dirty_count, 1);
        assert_eq!(fields["profile"].dirty_count, 1);
    }

    #[test]
    fn test_expand_array_errors() {
        let mut fields = profile_fields();
        assert!(matches!(
            expand_array_to_index(&mut fields, "profile.name", 0, &ArrayConfig::default()),
            Err(FormError::NotAnArray(_))
        ));
        remove_descendants(&mut fields, "profile");
        assert!(matches!(
            expand_array_to_index(&mut fields, "profile.tags", 0, &ArrayConfig::default()),
            Err(FormError::FieldNotFound(_))
        ));
    }
}
