//! Schema node definitions and classification.
//!
//! A [`Schema`] is the JSON-Schema-like description of one location in a
//! form. Nodes deserialize directly from JSON (`{"type": "string",
//! "minLength": 1}`) and can also be assembled with the builder methods.
//! Child schemas are reference-counted so that every field created for a
//! node shares it instead of cloning it.
//!
//! Classification follows three rules:
//!
//! - an **object** schema has type `object` *and* declares `properties`;
//! - an **array** schema has type `array` *and* declares `items`;
//! - a **primitive** schema has type `string`, `number`, `integer` or
//!   `boolean`.
//!
//! Anything else (an object without properties, an untyped node) is
//! materialized as a single leaf field holding whatever value it is given.

use std::sync::Arc;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{FormError, Result};

/// The `type` tag of a schema node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SchemaType {
    /// Text value.
    String,
    /// Floating point value.
    Number,
    /// Whole number value.
    Integer,
    /// `true`/`false`.
    Boolean,
    /// Ordered list of items sharing one item schema.
    Array,
    /// Map of named properties.
    Object,
}

/// The two shapes `required` takes in schema input.
///
/// A property node may carry `"required": true`, while an object node may
/// carry `"required": ["name", "email"]` listing its required properties.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Required {
    /// This node itself is required.
    Flag(bool),
    /// Names of required properties of this object node.
    Properties(Vec<String>),
}

/// A schema node.
///
/// # Examples
///
/// ```
/// use form_model_core::{Schema, SchemaType};
///
/// let schema = Schema::from_json(serde_json::json!({
///     "type": "object",
///     "properties": {
///         "name": { "type": "string", "minLength": 1 },
///         "tags": { "type": "array", "items": { "type": "string" } }
///     }
/// }))
/// .unwrap();
///
/// assert!(schema.is_object_schema());
/// assert_eq!(schema.property("name").unwrap().schema_type, Some(SchemaType::String));
/// assert!(schema.property("tags").unwrap().is_array_schema());
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Schema {
    /// Node type tag.
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub schema_type: Option<SchemaType>,
    /// Human-readable label.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// Longer description.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Explicit initial value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default: Option<Value>,
    /// Required flag or list of required property names.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required: Option<Required>,
    /// Alternate spelling of the required flag.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_required: Option<bool>,
    /// Read-only fields are skipped by validation.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub read_only: bool,
    /// Allowed values.
    #[serde(rename = "enum", default, skip_serializing_if = "Option::is_none")]
    pub enum_values: Option<Vec<Value>>,
    /// Minimum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_length: Option<u64>,
    /// Maximum string length in characters.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_length: Option<u64>,
    /// Inclusive numeric lower bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub minimum: Option<f64>,
    /// Inclusive numeric upper bound.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub maximum: Option<f64>,
    /// Item schema of an array node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Arc<Schema>>,
    /// Property schemas of an object node.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, Arc<Schema>>>,
    /// Alternative object schemas, exactly one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<Arc<Schema>>>,
    /// Alternative object schemas, at least one applies.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<Arc<Schema>>>,
    /// Object schemas that all apply.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<Arc<Schema>>>,
}

/// Structural classification of a schema node.
#[derive(Debug, Clone, Copy)]
pub enum SchemaShape<'a> {
    /// Object node with its declared properties.
    Object(&'a IndexMap<String, Arc<Schema>>),
    /// Array node with its item schema.
    Array(&'a Arc<Schema>),
    /// Any other node, materialized as a single leaf.
    Primitive,
}

impl Schema {
    /// Creates a node of the given type.
    pub fn new(schema_type: SchemaType) -> Self {
        Self {
            schema_type: Some(schema_type),
            ..Self::default()
        }
    }

    /// Creates a string node.
    pub fn string() -> Self {
        Self::new(SchemaType::String)
    }

    /// Creates a number node.
    pub fn number() -> Self {
        Self::new(SchemaType::Number)
    }

    /// Creates an integer node.
    pub fn integer() -> Self {
        Self::new(SchemaType::Integer)
    }

    /// Creates a boolean node.
    pub fn boolean() -> Self {
        Self::new(SchemaType::Boolean)
    }

    /// Creates an array node with the given item schema.
    pub fn array(items: Schema) -> Self {
        Self {
            items: Some(Arc::new(items)),
            ..Self::new(SchemaType::Array)
        }
    }

    /// Creates an object node from `(name, schema)` pairs.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_model_core::Schema;
    ///
    /// let schema = Schema::object([
    ///     ("name", Schema::string().required()),
    ///     ("age", Schema::integer().with_minimum(0.0)),
    /// ]);
    /// assert!(schema.is_object_schema());
    /// assert_eq!(schema.required_properties(), vec!["name"]);
    /// ```
    pub fn object<'a>(properties: impl IntoIterator<Item = (&'a str, Schema)>) -> Self {
        let properties = properties
            .into_iter()
            .map(|(name, schema)| (name.to_string(), Arc::new(schema)))
            .collect();
        Self {
            properties: Some(properties),
            ..Self::new(SchemaType::Object)
        }
    }

    /// Parses a schema node from a JSON value.
    ///
    /// # Errors
    ///
    /// Returns [`Json`](FormError::Json) if the value is not a valid node.
    pub fn from_json(value: Value) -> Result<Self> {
        Ok(serde_json::from_value(value)?)
    }

    /// Parses the root schema of a form.
    ///
    /// Accepts either a full object node or a shorthand map of top-level
    /// property schemas, which is wrapped into `{"type": "object",
    /// "properties": <map>}`. A node that declares `properties` without a
    /// `type` is treated as an object node.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSchema`](FormError::InvalidSchema) if the value is not
    /// a JSON object, or [`Json`](FormError::Json) if a node is malformed.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_model_core::Schema;
    ///
    /// let shorthand = Schema::root_from_json(serde_json::json!({
    ///     "name": { "type": "string" }
    /// }))
    /// .unwrap();
    /// assert!(shorthand.is_object_schema());
    /// assert!(shorthand.property("name").is_some());
    /// ```
    pub fn root_from_json(value: Value) -> Result<Self> {
        let Value::Object(map) = value else {
            return Err(FormError::InvalidSchema(
                "root schema must be a JSON object".to_string(),
            ));
        };

        let is_node = map.get("type").is_some_and(Value::is_string)
            || map.get("properties").is_some_and(Value::is_object);
        let schema = if is_node {
            Self::from_json(Value::Object(map))?
        } else {
            let properties = map
                .into_iter()
                .map(|(name, node)| Ok((name, Arc::new(Self::from_json(node)?))))
                .collect::<Result<IndexMap<_, _>>>()?;
            Self {
                properties: Some(properties),
                ..Self::new(SchemaType::Object)
            }
        };

        Ok(schema.into_root())
    }

    /// Normalizes a node for use as a form root: implied object type and
    /// flattened combinators.
    pub(crate) fn into_root(mut self) -> Self {
        if self.schema_type.is_none() && self.properties.is_some() {
            self.schema_type = Some(SchemaType::Object);
        }
        self.flatten_combinators()
    }

    /// Sets the default value.
    pub fn with_default(mut self, value: Value) -> Self {
        self.default = Some(value);
        self
    }

    /// Marks the node as required.
    pub fn required(mut self) -> Self {
        self.required = Some(Required::Flag(true));
        self
    }

    /// Sets the title.
    pub fn with_title(mut self, title: &str) -> Self {
        self.title = Some(title.to_string());
        self
    }

    /// Marks the node as read-only.
    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Sets the minimum string length.
    pub fn with_min_length(mut self, min: u64) -> Self {
        self.min_length = Some(min);
        self
    }

    /// Sets the maximum string length.
    pub fn with_max_length(mut self, max: u64) -> Self {
        self.max_length = Some(max);
        self
    }

    /// Sets the inclusive numeric lower bound.
    pub fn with_minimum(mut self, min: f64) -> Self {
        self.minimum = Some(min);
        self
    }

    /// Sets the inclusive numeric upper bound.
    pub fn with_maximum(mut self, max: f64) -> Self {
        self.maximum = Some(max);
        self
    }

    /// Restricts the node to a list of allowed values.
    pub fn with_enum(mut self, values: Vec<Value>) -> Self {
        self.enum_values = Some(values);
        self
    }

    /// Returns `true` for an object node with declared properties.
    pub fn is_object_schema(&self) -> bool {
        self.schema_type == Some(SchemaType::Object) && self.properties.is_some()
    }

    /// Returns `true` for an array node with an item schema.
    pub fn is_array_schema(&self) -> bool {
        self.schema_type == Some(SchemaType::Array) && self.items.is_some()
    }

    /// Returns `true` for string, number, integer and boolean nodes.
    pub fn is_primitive_schema(&self) -> bool {
        matches!(
            self.schema_type,
            Some(
                SchemaType::String | SchemaType::Number | SchemaType::Integer | SchemaType::Boolean
            )
        )
    }

    /// Classifies the node.
    pub fn shape(&self) -> SchemaShape<'_> {
        if self.is_object_schema() {
            if let Some(properties) = &self.properties {
                return SchemaShape::Object(properties);
            }
        }
        if self.is_array_schema() {
            if let Some(items) = &self.items {
                return SchemaShape::Array(items);
            }
        }
        SchemaShape::Primitive
    }

    /// Returns the item schema of an array node.
    pub fn array_item_schema(&self) -> Option<&Arc<Schema>> {
        if self.is_array_schema() {
            self.items.as_ref()
        } else {
            None
        }
    }

    /// Returns the schema of a declared property.
    pub fn property(&self, name: &str) -> Option<&Arc<Schema>> {
        self.properties.as_ref()?.get(name)
    }

    /// Returns `true` if the node itself is flagged as required.
    pub fn is_required(&self) -> bool {
        matches!(self.required, Some(Required::Flag(true))) || self.is_required == Some(true)
    }

    /// Returns the names of the declared properties that are required.
    ///
    /// A property counts as required if the object lists it in its
    /// `required` array or if the property node carries the required flag.
    pub fn required_properties(&self) -> Vec<&str> {
        let Some(properties) = &self.properties else {
            return Vec::new();
        };
        let listed: &[String] = match &self.required {
            Some(Required::Properties(names)) => names,
            _ => &[],
        };
        properties
            .iter()
            .filter(|(name, schema)| schema.is_required() || listed.contains(name))
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Returns `true` if the named property is required by this object node.
    pub fn is_property_required(&self, name: &str) -> bool {
        if let Some(Required::Properties(names)) = &self.required {
            if names.iter().any(|n| n == name) {
                return true;
            }
        }
        self.property(name).is_some_and(|schema| schema.is_required())
    }

    /// Returns a copy of the node with `oneOf`/`anyOf`/`allOf` property sets
    /// merged into its own properties, recursively.
    ///
    /// Own properties win over combinator properties; among combinators the
    /// first declaration of a name wins, scanning `allOf`, then `oneOf`, then
    /// `anyOf`. Required names are only inherited from `allOf` branches. The
    /// combinator lists are kept so that variant selection stays possible
    /// on top of the flattened node.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_model_core::Schema;
    ///
    /// let schema = Schema::from_json(serde_json::json!({
    ///     "type": "object",
    ///     "properties": { "kind": { "type": "string" } },
    ///     "oneOf": [
    ///         { "type": "object", "properties": { "email": { "type": "string" } } },
    ///         { "type": "object", "properties": { "phone": { "type": "string" } } }
    ///     ]
    /// }))
    /// .unwrap()
    /// .flatten_combinators();
    ///
    /// assert!(schema.property("email").is_some());
    /// assert!(schema.property("phone").is_some());
    /// ```
    pub fn flatten_combinators(&self) -> Schema {
        let mut flat = self.clone();

        if let Some(properties) = &mut flat.properties {
            for schema in properties.values_mut() {
                *schema = Arc::new(schema.flatten_combinators());
            }
        }
        if let Some(items) = &mut flat.items {
            *items = Arc::new(items.flatten_combinators());
        }

        let branches = [&self.all_of, &self.one_of, &self.any_of];
        if branches.iter().all(|branch| branch.is_none()) {
            return flat;
        }

        let mut merged = flat.properties.take().unwrap_or_default();
        let mut inherited_required = Vec::new();
        for (position, branch) in branches.into_iter().enumerate() {
            for alternative in branch.iter().flatten() {
                let alternative = alternative.flatten_combinators();
                if position == 0 {
                    inherited_required.extend(
                        alternative
                            .required_properties()
                            .into_iter()
                            .map(String::from),
                    );
                }
                for (name, schema) in alternative.properties.unwrap_or_default() {
                    merged.entry(name).or_insert(schema);
                }
            }
        }

        if !inherited_required.is_empty() {
            match &mut flat.required {
                Some(Required::Properties(names)) => {
                    for name in inherited_required {
                        if !names.contains(&name) {
                            names.push(name);
                        }
                    }
                }
                None => flat.required = Some(Required::Properties(inherited_required)),
                Some(Required::Flag(_)) => {}
            }
        }

        if !merged.is_empty() {
            if flat.schema_type.is_none() {
                flat.schema_type = Some(SchemaType::Object);
            }
            flat.properties = Some(merged);
        }
        flat
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_classification() {
        assert!(Schema::object([("a", Schema::string())]).is_object_schema());
        assert!(!Schema::new(SchemaType::Object).is_object_schema());
        assert!(Schema::array(Schema::string()).is_array_schema());
        assert!(!Schema::new(SchemaType::Array).is_array_schema());
        assert!(Schema::integer().is_primitive_schema());
        assert!(!Schema::default().is_primitive_schema());
        assert!(matches!(
            Schema::new(SchemaType::Object).shape(),
            SchemaShape::Primitive
        ));
    }

    #[test]
    fn test_deserialize_camel_case_constraints() {
        let schema = Schema::from_json(json!({
            "type": "string",
            "minLength": 2,
            "maxLength": 10,
            "isRequired": true,
            "readOnly": true,
            "enum": ["a", "b"]
        }))
        .unwrap();
        assert_eq!(schema.min_length, Some(2));
        assert_eq!(schema.max_length, Some(10));
        assert!(schema.is_required());
        assert!(schema.read_only);
        assert_eq!(schema.enum_values, Some(vec![json!("a"), json!("b")]));
    }

    #[test]
    fn test_required_properties_from_list_and_flag() {
        let schema = Schema::from_json(json!({
            "type": "object",
            "required": ["email"],
            "properties": {
                "name": { "type": "string", "required": true },
                "email": { "type": "string" },
                "age": { "type": "number" }
            }
        }))
        .unwrap();
        assert_eq!(schema.required_properties(), vec!["name", "email"]);
        assert!(schema.is_property_required("email"));
        assert!(!schema.is_property_required("age"));
    }

    #[test]
    fn test_properties_keep_declaration_order() {
        let schema = Schema::root_from_json(json!({
            "zip": { "type": "string" },
            "city": { "type": "string" },
            "address": { "type": "string" }
        }))
        .unwrap();
        let names: Vec<_> = schema.properties.unwrap().keys().cloned().collect();
        assert_eq!(names, vec!["zip", "city", "address"]);
    }

    #[test]
    fn test_root_from_json_rejects_non_object() {
        let err = Schema::root_from_json(json!([1, 2])).unwrap_err();
        assert_eq!(err.code(), "INVALID_SCHEMA");
    }

    #[test]
    fn test_root_from_json_untyped_properties() {
        let schema = Schema::root_from_json(json!({
            "properties": { "name": { "type": "string" } }
        }))
        .unwrap();
        assert!(schema.is_object_schema());
    }

    #[test]
    fn test_flatten_keeps_own_properties_first() {
        let schema = Schema::from_json(json!({
            "type": "object",
            "properties": { "name": { "type": "string", "maxLength": 5 } },
            "allOf": [
                {
                    "type": "object",
                    "required": ["code"],
                    "properties": {
                        "name": { "type": "number" },
                        "code": { "type": "string" }
                    }
                }
            ],
            "anyOf": [
                { "type": "object", "required": ["extra"], "properties": { "extra": { "type": "boolean" } } }
            ]
        }))
        .unwrap()
        .flatten_combinators();

        assert_eq!(
            schema.property("name").unwrap().schema_type,
            Some(SchemaType::String)
        );
        assert!(schema.property("code").is_some());
        assert!(schema.property("extra").is_some());
        assert!(schema.is_property_required("code"));
        assert!(!schema.is_property_required("extra"));
    }

    #[test]
    fn test_flatten_nested_items() {
        let schema = Schema::from_json(json!({
            "type": "array",
            "items": {
                "oneOf": [
                    { "type": "object", "properties": { "a": { "type": "string" } } }
                ]
            }
        }))
        .unwrap()
        .flatten_combinators();

        let items = schema.array_item_schema().unwrap();
        assert!(items.is_object_schema());
    }
}
