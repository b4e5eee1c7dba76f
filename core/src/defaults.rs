//! Initial values for schema nodes.

use serde_json::{Map, Value};

use crate::schema::{Schema, SchemaType};

/// Computes the initial value for a schema node.
///
/// An explicit `default` always wins. Otherwise the value is the zero value
/// of the node's type: `""`, `0`, `false`, `[]`, or for objects a map built
/// recursively from the properties that declare a default or are required.
/// Optional properties without a default stay absent. Untyped nodes yield
/// `null`.
///
/// # Examples
///
/// ```
/// use form_model_core::{Schema, default_value};
/// use serde_json::json;
///
/// let schema = Schema::object([
///     ("name", Schema::string().required()),
///     ("role", Schema::string().with_default(json!("viewer"))),
///     ("nickname", Schema::string()),
/// ]);
/// assert_eq!(default_value(&schema), json!({ "name": "", "role": "viewer" }));
/// ```
pub fn default_value(schema: &Schema) -> Value {
    if let Some(default) = &schema.default {
        return default.clone();
    }

    match schema.schema_type {
        Some(SchemaType::String) => Value::String(String::new()),
        Some(SchemaType::Number | SchemaType::Integer) => Value::from(0),
        Some(SchemaType::Boolean) => Value::Bool(false),
        Some(SchemaType::Array) => Value::Array(Vec::new()),
        Some(SchemaType::Object) => {
            let mut map = Map::new();
            if let Some(properties) = &schema.properties {
                for (name, property) in properties {
                    if property.default.is_some() || schema.is_property_required(name) {
                        map.insert(name.clone(), default_value(property));
                    }
                }
            }
            Value::Object(map)
        }
        None => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_primitive_zero_values() {
        assert_eq!(default_value(&Schema::string()), json!(""));
        assert_eq!(default_value(&Schema::number()), json!(0));
        assert_eq!(default_value(&Schema::integer()), json!(0));
        assert_eq!(default_value(&Schema::boolean()), json!(false));
        assert_eq!(default_value(&Schema::array(Schema::string())), json!([]));
        assert_eq!(default_value(&Schema::default()), Value::Null);
    }

    #[test]
    fn test_explicit_default_wins() {
        let schema = Schema::array(Schema::string()).with_default(json!(["a", "b"]));
        assert_eq!(default_value(&schema), json!(["a", "b"]));
    }

    #[test]
    fn test_nested_object_defaults() {
        let schema = Schema::from_json(json!({
            "type": "object",
            "required": ["profile"],
            "properties": {
                "profile": {
                    "type": "object",
                    "properties": {
                        "name": { "type": "string", "default": "John" },
                        "bio": { "type": "string" }
                    }
                },
                "notes": { "type": "string" }
            }
        }))
        .unwrap();
        assert_eq!(
            default_value(&schema),
            json!({ "profile": { "name": "John" } })
        );
    }
}
