//! Field and value validation.
//!
//! Validation produces data, not failures: every rule that does not hold
//! yields a [`ValidationError`] whose `Display` text is the user-facing
//! message. Rules run in a fixed order per location:
//!
//! 1. required: a required location holding an empty value (`null`, a blank
//!    string, `[]` or `{}`) gets a single [`ValidationError::Required`] and
//!    nothing else;
//! 2. an empty optional value is valid, no further rules apply;
//! 3. `enum` membership;
//! 4. type rules: string length, or numeric parsing, whole-number and range
//!    checks for `number`/`integer` nodes.
//!
//! [`validate_all`] checks every registered field on its own;
//! [`validate_value`] walks a schema and a plain value together.
//!
//! # Examples
//!
//! ```
//! use form_model_core::{Schema, ValidationConfig, validate_value};
//! use serde_json::json;
//!
//! let schema = Schema::object([
//!     ("name", Schema::string().with_min_length(1)),
//!     ("age", Schema::integer().with_minimum(18.0)),
//! ]);
//! let errors = validate_value(&schema, &json!({ "name": "", "age": 12 }), &ValidationConfig::default());
//!
//! assert_eq!(errors["name"], vec!["This field is required"]);
//! assert_eq!(errors["age"], vec!["Must be greater than or equal to 18"]);
//! ```

use std::collections::{BTreeMap, HashSet};

use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::config::ValidationConfig;
use crate::field::{Field, values_equal};
use crate::path::{build_array_item_path, build_child_path, path_depth};
use crate::registry::FieldMap;
use crate::schema::{Schema, SchemaShape, SchemaType};

/// Validation messages, keyed by the path they apply to.
pub type ErrorsByPath = BTreeMap<String, Vec<String>>;

/// A rule violation at one location.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required location holds an empty value.
    #[error("This field is required")]
    Required,
    /// String shorter than `minLength`.
    #[error("Must be at least {0} characters")]
    MinLength(u64),
    /// String longer than `maxLength`.
    #[error("Must be at most {0} characters")]
    MaxLength(u64),
    /// Value of a numeric node that does not parse as a number.
    #[error("Must be a valid number")]
    NotANumber,
    /// Fractional value of an `integer` node.
    #[error("Must be a whole number")]
    NotAnInteger,
    /// Number below `minimum`.
    #[error("Must be greater than or equal to {0}")]
    Minimum(f64),
    /// Number above `maximum`.
    #[error("Must be less than or equal to {0}")]
    Maximum(f64),
    /// Value outside the `enum` list (rendered comma-separated).
    #[error("Must be one of: {0}")]
    NotInEnum(String),
    /// Location nested deeper than the configured maximum.
    #[error("Maximum validation depth of {0} exceeded")]
    DepthExceeded(usize),
    /// Location reached twice during one [`validate_value`] walk. Paths
    /// collide when a property name contains the path separator and
    /// shadows a nested location (`"a.b"` next to `"a": { "b": .. }`); the
    /// second visit is reported instead of checked. A registry field is
    /// visited once per [`validate_all`] pass, so it never gets this.
    #[error("Circular reference detected")]
    CircularReference,
}

/// Validates every registered field and returns the messages by path.
///
/// Fields are checked independently (composites only for emptiness, their
/// contents through their own descendant fields). `readOnly` fields are
/// skipped unless [`ValidationConfig::validate_read_only`] is set. Fields
/// are not modified; paths without violations are absent from the result.
pub fn validate_all(fields: &FieldMap, config: &ValidationConfig) -> ErrorsByPath {
    let mut errors = ErrorsByPath::new();
    for (path, field) in fields {
        if field.schema.read_only && !config.validate_read_only {
            continue;
        }
        let mut visited = HashSet::new();
        let found = check_location(path, field, config, &mut visited);
        if !found.is_empty() {
            errors.insert(path.clone(), found.iter().map(ToString::to_string).collect());
        }
    }
    debug!(invalid = errors.len(), checked = fields.len(), "Validated form");
    errors
}

/// Runs the field-level rules for one field.
pub fn validate_field(field: &Field, config: &ValidationConfig) -> Vec<ValidationError> {
    check_location(&field.path, field, config, &mut HashSet::new())
}

/// Validates `value` against `schema`, descending into declared properties
/// and array elements.
///
/// Result keys are paths relative to `value`; violations of the root value
/// itself are reported under the empty path. Missing object properties are
/// checked as `null`, so required properties that are absent are reported.
pub fn validate_value(schema: &Schema, value: &Value, config: &ValidationConfig) -> ErrorsByPath {
    let mut errors = ErrorsByPath::new();
    let mut visited = HashSet::new();
    walk_value("", schema, value, schema.is_required(), config, &mut visited, &mut errors);
    errors
}

fn check_location(
    path: &str,
    field: &Field,
    config: &ValidationConfig,
    visited: &mut HashSet<String>,
) -> Vec<ValidationError> {
    if let Some(guard) = guard(path, config, visited) {
        return vec![guard];
    }
    check_rules(&field.schema, &field.value, field.required, config)
}

fn walk_value(
    path: &str,
    schema: &Schema,
    value: &Value,
    required: bool,
    config: &ValidationConfig,
    visited: &mut HashSet<String>,
    errors: &mut ErrorsByPath,
) {
    if !path.is_empty() {
        if let Some(guard) = guard(path, config, visited) {
            errors.insert(path.to_string(), vec![guard.to_string()]);
            return;
        }
    }
    if schema.read_only && !config.validate_read_only {
        return;
    }

    let found = check_rules(schema, value, required, config);
    if !found.is_empty() {
        errors.insert(path.to_string(), found.iter().map(ToString::to_string).collect());
    }

    match (schema.shape(), value) {
        (SchemaShape::Object(properties), Value::Object(map)) => {
            for (name, property) in properties {
                let child = map.get(name).unwrap_or(&Value::Null);
                walk_value(
                    &build_child_path(path, name),
                    property,
                    child,
                    schema.is_property_required(name),
                    config,
                    visited,
                    errors,
                );
            }
        }
        (SchemaShape::Array(items), Value::Array(list)) => {
            for (index, item) in list.iter().enumerate() {
                let item_path = if path.is_empty() {
                    index.to_string()
                } else {
                    build_array_item_path(path, index)
                };
                walk_value(&item_path, items, item, false, config, visited, errors);
            }
        }
        _ => {}
    }
}

fn guard(
    path: &str,
    config: &ValidationConfig,
    visited: &mut HashSet<String>,
) -> Option<ValidationError> {
    if path_depth(path) > config.max_depth {
        return Some(ValidationError::DepthExceeded(config.max_depth));
    }
    if !visited.insert(path.to_string()) {
        return Some(ValidationError::CircularReference);
    }
    None
}

fn check_rules(
    schema: &Schema,
    value: &Value,
    required: bool,
    config: &ValidationConfig,
) -> Vec<ValidationError> {
    let required = required
        || schema.is_required()
        || (config.min_length_implies_required
            && schema.schema_type == Some(SchemaType::String)
            && schema.min_length == Some(1));

    if is_empty_value(value) {
        return if required {
            vec![ValidationError::Required]
        } else {
            Vec::new()
        };
    }

    if let Some(allowed) = &schema.enum_values {
        if !allowed.iter().any(|candidate| values_equal(candidate, value)) {
            return vec![ValidationError::NotInEnum(render_list(allowed))];
        }
    }

    match schema.schema_type {
        Some(SchemaType::String) => check_string(schema, value),
        Some(SchemaType::Number) => check_number(schema, value, false),
        Some(SchemaType::Integer) => check_number(schema, value, true),
        _ => Vec::new(),
    }
}

fn check_string(schema: &Schema, value: &Value) -> Vec<ValidationError> {
    let Value::String(text) = value else {
        return Vec::new();
    };
    let len = text.chars().count() as u64;
    let mut errors = Vec::new();
    if let Some(min) = schema.min_length {
        if len < min {
            errors.push(ValidationError::MinLength(min));
        }
    }
    if let Some(max) = schema.max_length {
        if len > max {
            errors.push(ValidationError::MaxLength(max));
        }
    }
    errors
}

fn check_number(schema: &Schema, value: &Value, integer: bool) -> Vec<ValidationError> {
    let Some(number) = as_number(value) else {
        return vec![ValidationError::NotANumber];
    };
    if integer && number.fract() != 0.0 {
        return vec![ValidationError::NotAnInteger];
    }

    let mut errors = Vec::new();
    if let Some(min) = schema.minimum {
        if number < min {
            errors.push(ValidationError::Minimum(min));
        }
    }
    if let Some(max) = schema.maximum {
        if number > max {
            errors.push(ValidationError::Maximum(max));
        }
    }
    errors
}

/// Numbers, and strings that parse as finite numbers.
fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(number) => number.as_f64(),
        Value::String(text) => text.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
        _ => None,
    }
}

/// `null`, blank strings, and empty arrays and objects.
pub fn is_empty_value(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::String(text) => text.trim().is_empty(),
        Value::Array(list) => list.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

fn render_list(values: &[Value]) -> String {
    values
        .iter()
        .map(|value| match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        })
        .collect::<Vec<_>>()
        .join(", ")
}
