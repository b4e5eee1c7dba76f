//! Structural array operations.
//!
//! Every operation follows the same sequence: compute the new element list,
//! re-key the element fields in one batch so that every surviving element
//! keeps its own field (and dirty state) under its new index, then hand the
//! new list to [`update_field_value`]. The updater creates fields for new
//! elements, marks the array dirty and propagates the change upward.

use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use crate::defaults::default_value;
use crate::error::{FormError, Result};
use crate::path::{build_array_item_path, is_array_index, parent_path, property_name};
use crate::registry::{FieldMap, reindex_items, remove_branch};
use crate::schema::Schema;
use crate::updater::update_field_value;

/// Appends an element to the array at `array_path` and returns its path.
///
/// Without a value the item schema's default is appended.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, add_item, create_fields_for_schema};
/// use serde_json::json;
///
/// let schema = Arc::new(Schema::array(Schema::string()));
/// let mut fields = FieldMap::new();
/// create_fields_for_schema(&mut fields, "tags", &schema, None, false);
///
/// let path = add_item(&mut fields, "tags", Some(json!("rust"))).unwrap();
/// assert_eq!(path, "tags.0");
/// assert_eq!(fields["tags"].value, json!(["rust"]));
/// assert!(fields["tags"].dirty);
/// ```
pub fn add_item(fields: &mut FieldMap, array_path: &str, value: Option<Value>) -> Result<String> {
    let (items, mut list) = array_parts(fields, array_path)?;
    let index = list.len();
    list.push(value.unwrap_or_else(|| default_value(&items)));

    update_field_value(fields, array_path, Value::Array(list));
    debug!(path = array_path, index, "Added array item");
    Ok(build_array_item_path(array_path, index))
}

/// Removes the element at `element_path` (`<array>.<index>`) and returns the
/// new length of the array.
///
/// The element's fields are deleted and every later element moves down by
/// one index, descendants included.
///
/// # Errors
///
/// [`FormError::InvalidPath`] if the path does not end in an index,
/// [`FormError::IndexOutOfBounds`] if the index is past the end, plus the
/// errors of [`array_length`].
pub fn remove_item(fields: &mut FieldMap, element_path: &str) -> Result<usize> {
    let invalid = || FormError::InvalidPath(element_path.to_string());
    let array_path = parent_path(element_path).ok_or_else(invalid)?;
    let segment = property_name(element_path);
    if !is_array_index(segment) {
        return Err(invalid());
    }
    let index: usize = segment.parse().map_err(|_| invalid())?;

    let (_, mut list) = array_parts(fields, array_path)?;
    check_bounds(array_path, index, list.len())?;
    list.remove(index);

    let removed = remove_branch(fields, element_path);
    reindex_items(fields, array_path, |i| if i > index { i - 1 } else { i });
    update_field_value(fields, array_path, Value::Array(list.clone()));

    debug!(path = array_path, index, removed, "Removed array item");
    Ok(list.len())
}

/// Moves the element at `from` to position `to`, shifting the elements in
/// between by one.
///
/// # Errors
///
/// [`FormError::IndexOutOfBounds`] if either index is not below the current
/// length, plus the errors of [`array_length`].
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, create_fields_for_schema, move_item};
/// use serde_json::json;
///
/// let schema = Arc::new(Schema::array(Schema::string()));
/// let mut fields = FieldMap::new();
/// create_fields_for_schema(&mut fields, "steps", &schema, Some(json!(["a", "b", "c"])), false);
///
/// move_item(&mut fields, "steps", 0, 2).unwrap();
/// assert_eq!(fields["steps"].value, json!(["b", "c", "a"]));
/// assert_eq!(fields["steps.2"].value, json!("a"));
/// ```
pub fn move_item(fields: &mut FieldMap, array_path: &str, from: usize, to: usize) -> Result<()> {
    let (_, mut list) = array_parts(fields, array_path)?;
    check_bounds(array_path, from, list.len())?;
    check_bounds(array_path, to, list.len())?;
    if from == to {
        return Ok(());
    }

    let item = list.remove(from);
    list.insert(to, item);

    reindex_items(fields, array_path, |i| {
        if i == from {
            to
        } else if from < to && (from + 1..=to).contains(&i) {
            i - 1
        } else if to < from && (to..from).contains(&i) {
            i + 1
        } else {
            i
        }
    });
    update_field_value(fields, array_path, Value::Array(list));

    debug!(path = array_path, from, to, "Moved array item");
    Ok(())
}

/// Inserts an element at `index` (which may equal the length) and returns
/// its path. Elements at or after `index` move up by one.
///
/// # Errors
///
/// [`FormError::IndexOutOfBounds`] if `index` is greater than the length,
/// plus the errors of [`array_length`].
pub fn insert_item(
    fields: &mut FieldMap,
    array_path: &str,
    index: usize,
    value: Option<Value>,
) -> Result<String> {
    let (items, mut list) = array_parts(fields, array_path)?;
    if index > list.len() {
        return Err(FormError::IndexOutOfBounds {
            path: array_path.to_string(),
            index,
            len: list.len(),
        });
    }
    list.insert(index, value.unwrap_or_else(|| default_value(&items)));

    reindex_items(fields, array_path, |i| if i >= index { i + 1 } else { i });
    update_field_value(fields, array_path, Value::Array(list));

    debug!(path = array_path, index, "Inserted array item");
    Ok(build_array_item_path(array_path, index))
}

/// Returns the number of elements in the array at `array_path`.
///
/// # Errors
///
/// [`FormError::FieldNotFound`] if no field is registered at the path,
/// [`FormError::NotAnArray`] if the field is not an array.
pub fn array_length(fields: &FieldMap, array_path: &str) -> Result<usize> {
    array_parts(fields, array_path).map(|(_, list)| list.len())
}

/// Returns `true` if `index` addresses an existing element.
pub fn is_valid_array_index(fields: &FieldMap, array_path: &str, index: usize) -> bool {
    array_length(fields, array_path).is_ok_and(|len| index < len)
}

fn array_parts(fields: &FieldMap, array_path: &str) -> Result<(Arc<Schema>, Vec<Value>)> {
    let field = fields
        .get(array_path)
        .ok_or_else(|| FormError::FieldNotFound(array_path.to_string()))?;
    let Some(items) = field.schema.array_item_schema() else {
        return Err(FormError::NotAnArray(array_path.to_string()));
    };
    let list = match &field.value {
        Value::Array(list) => list.clone(),
        Value::Null => Vec::new(),
        _ => return Err(FormError::NotAnArray(array_path.to_string())),
    };
    Ok((Arc::clone(items), list))
}

fn check_bounds(array_path: &str, index: usize, len: usize) -> Result<()> {
    if index < len {
        Ok(())
    } else {
        Err(FormError::IndexOutOfBounds {
            path: array_path.to_string(),
            index,
            len,
        })
    }
}
