//! Field creation for schema nodes.
//!
//! [`create_fields_for_schema`] dispatches on the schema's
//! [`shape`](crate::Schema::shape) to one of three creators. Every creator
//! writes straight into the registry instead of returning a subtree, and
//! returns the value the created field ended up holding so that a caller
//! building a parent composite can slot it in.
//!
//! - Objects register themselves, then recurse into every declared
//!   property. Declared properties missing from the seed are filled with
//!   their default, so an object composite always carries every declared
//!   key.
//! - Arrays register themselves, then create one field per *existing*
//!   element. Arrays are never padded.
//! - Everything else becomes a single leaf field.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::trace;

use crate::defaults::default_value;
use crate::field::Field;
use crate::path::{build_array_item_path, build_property_path};
use crate::registry::FieldMap;
use crate::schema::{Schema, SchemaShape};

/// Creates the field for `schema` at `path` and, for composites, all of its
/// nested fields. Returns the created field's value.
///
/// `required` carries the parent's verdict (e.g. a `required` name list on
/// the enclosing object) and is combined with the node's own flag.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, create_fields_for_schema};
/// use serde_json::json;
///
/// let schema = Arc::new(Schema::object([
///     ("name", Schema::string()),
///     ("tags", Schema::array(Schema::string())),
/// ]));
/// let mut fields = FieldMap::new();
/// let value = create_fields_for_schema(
///     &mut fields,
///     "user",
///     &schema,
///     Some(json!({ "tags": ["a", "b"] })),
///     false,
/// );
///
/// assert_eq!(value, json!({ "name": "", "tags": ["a", "b"] }));
/// let paths: Vec<_> = fields.keys().map(String::as_str).collect();
/// assert_eq!(paths, vec!["user", "user.name", "user.tags", "user.tags.0", "user.tags.1"]);
/// ```
pub fn create_fields_for_schema(
    fields: &mut FieldMap,
    path: &str,
    schema: &Arc<Schema>,
    value: Option<Value>,
    required: bool,
) -> Value {
    match schema.shape() {
        SchemaShape::Object(_) => create_object_field(fields, path, schema, value, required),
        SchemaShape::Array(_) => create_array_field(fields, path, schema, value, required),
        SchemaShape::Primitive => create_primitive_field(fields, path, schema, value, required),
    }
}

/// Creates an object field and every declared property below it.
pub fn create_object_field(
    fields: &mut FieldMap,
    path: &str,
    schema: &Arc<Schema>,
    value: Option<Value>,
    required: bool,
) -> Value {
    let SchemaShape::Object(properties) = schema.shape() else {
        return create_primitive_field(fields, path, schema, value, required);
    };

    let mut composite = match value {
        Some(Value::Object(map)) => map,
        _ => match default_value(schema) {
            Value::Object(map) => map,
            _ => Map::new(),
        },
    };

    register(
        fields,
        path,
        schema,
        Value::Object(composite.clone()),
        required,
    );

    let mut ordered = Map::new();
    for (name, property) in properties {
        let child_path = build_property_path(path, name);
        let child_value = create_fields_for_schema(
            fields,
            &child_path,
            property,
            composite.remove(name),
            schema.is_property_required(name),
        );
        ordered.insert(name.clone(), child_value);
    }
    // undeclared keys of the seed are kept after the declared ones
    ordered.extend(composite);

    finish(fields, path, Value::Object(ordered))
}

/// Creates an array field and one field per existing element.
pub fn create_array_field(
    fields: &mut FieldMap,
    path: &str,
    schema: &Arc<Schema>,
    value: Option<Value>,
    required: bool,
) -> Value {
    let SchemaShape::Array(items) = schema.shape() else {
        return create_primitive_field(fields, path, schema, value, required);
    };

    let mut list = match value {
        Some(Value::Array(list)) => list,
        _ => match default_value(schema) {
            Value::Array(list) => list,
            _ => Vec::new(),
        },
    };

    register(fields, path, schema, Value::Array(list.clone()), required);

    for (index, item) in list.iter_mut().enumerate() {
        let item_path = build_array_item_path(path, index);
        *item = create_fields_for_schema(fields, &item_path, items, Some(item.take()), false);
    }

    finish(fields, path, Value::Array(list))
}

/// Creates a single leaf field.
pub fn create_primitive_field(
    fields: &mut FieldMap,
    path: &str,
    schema: &Arc<Schema>,
    value: Option<Value>,
    required: bool,
) -> Value {
    let value = value.unwrap_or_else(|| default_value(schema));
    register(fields, path, schema, value.clone(), required);
    value
}

fn register(fields: &mut FieldMap, path: &str, schema: &Arc<Schema>, value: Value, required: bool) {
    let mut field = Field::new(path, Arc::clone(schema), Some(value));
    field.required |= required;
    trace!(path, "Created field");
    fields.insert(path.to_string(), field);
}

/// Stores the completed composite as both current and pristine value.
fn finish(fields: &mut FieldMap, path: &str, value: Value) -> Value {
    if let Some(field) = fields.get_mut(path) {
        field.value = value.clone();
        field.pristine_value = value.clone();
    }
    value
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn schema(value: Value) -> Arc<Schema> {
        Arc::new(Schema::from_json(value).unwrap())
    }

    #[test]
    fn test_primitive_creator_uses_default() {
        let mut fields = FieldMap::new();
        let value = create_fields_for_schema(
            &mut fields,
            "age",
            &schema(json!({ "type": "number", "default": 30 })),
            None,
            false,
        );
        assert_eq!(value, json!(30));
        assert_eq!(fields["age"].value, json!(30));
        assert!(!fields["age"].required);
    }

    #[test]
    fn test_object_creator_recurses_and_resolves_required() {
        let mut fields = FieldMap::new();
        let node = schema(json!({
            "type": "object",
            "required": ["email"],
            "properties": {
                "email": { "type": "string" },
                "profile": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "default": "John" }
                    }
                }
            }
        }));
        let value = create_fields_for_schema(&mut fields, "user", &node, None, true);

        assert_eq!(value, json!({ "email": "", "profile": { "name": "John" } }));
        assert!(fields["user"].required);
        assert!(fields["user.email"].required);
        assert!(!fields["user.profile"].required);
        assert_eq!(fields["user.profile.name"].value, json!("John"));
        assert_eq!(fields["user"].pristine_value, value);
    }

    #[test]
    fn test_array_creator_does_not_pad() {
        let mut fields = FieldMap::new();
        let node = schema(json!({
            "type": "array",
            "items": { "type": "object", "properties": { "label": { "type": "string" } } }
        }));
        let value = create_fields_for_schema(&mut fields, "rows", &node, Some(json!([{}])), false);

        assert_eq!(value, json!([{ "label": "" }]));
        assert!(fields.contains_key("rows.0"));
        assert!(fields.contains_key("rows.0.label"));
        assert!(!fields.contains_key("rows.1"));
    }

    #[test]
    fn test_object_creator_ignores_non_object_seed() {
        let mut fields = FieldMap::new();
        let node = schema(json!({
            "type": "object",
            "properties": { "a": { "type": "boolean" } }
        }));
        let value = create_fields_for_schema(&mut fields, "flags", &node, Some(json!(3)), false);
        assert_eq!(value, json!({ "a": false }));
    }
}
