//! The field record and value-level operations on it.
//!
//! A [`Field`] is the unit of state for one path: current and pristine
//! value, the governing schema, error and dirty bookkeeping. The methods
//! here only touch the field itself; keeping parents and children in step
//! is the job of the [`updater`](crate::updater).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use crate::defaults::default_value;
use crate::schema::Schema;

/// State of one addressable location in a form.
///
/// `dirty` records that the field (or a descendant) was touched by an edit;
/// `has_changes` records that its value actually differs from the pristine
/// value. Editing a field back to its original value leaves it dirty but
/// unchanged.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    /// Dot-delimited registry key.
    pub path: String,
    /// Current value.
    pub value: Value,
    /// Baseline value for revert and change detection.
    pub pristine_value: Value,
    /// Schema node governing this field.
    #[serde(skip)]
    pub schema: Arc<Schema>,
    /// Validation messages for this path (and, after aggregation, the
    /// distinct messages of its descendants).
    pub errors: Vec<String>,
    /// Number of invalid fields in this subtree.
    pub error_count: usize,
    /// Number of edits that touched this subtree.
    pub dirty_count: usize,
    /// Whether the field must hold a non-empty value.
    pub required: bool,
    /// Touched by at least one edit since the last revert or commit.
    pub dirty: bool,
    /// Current value deep-differs from the pristine value.
    pub has_changes: bool,
    /// Time of the last mutation.
    pub last_modified: DateTime<Utc>,
}

impl Field {
    /// Creates a field. Without a value, the schema default is used.
    ///
    /// # Examples
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use form_model_core::{Field, Schema};
    /// use serde_json::json;
    ///
    /// let schema = Arc::new(Schema::string().with_default(json!("John")));
    /// let field = Field::new("name", schema, None);
    /// assert_eq!(field.value, json!("John"));
    /// assert_eq!(field.pristine_value, field.value);
    /// assert!(!field.dirty && !field.has_changes);
    /// ```
    pub fn new(path: impl Into<String>, schema: Arc<Schema>, value: Option<Value>) -> Self {
        let value = value.unwrap_or_else(|| default_value(&schema));
        Self {
            path: path.into(),
            pristine_value: value.clone(),
            value,
            required: schema.is_required(),
            schema,
            errors: Vec::new(),
            error_count: 0,
            dirty_count: 0,
            dirty: false,
            has_changes: false,
            last_modified: Utc::now(),
        }
    }

    /// Applies an edit: replaces the value, marks the field dirty and
    /// recomputes `has_changes` against the pristine value.
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use form_model_core::{Field, Schema};
    /// use serde_json::json;
    ///
    /// let mut field = Field::new("name", Arc::new(Schema::string()), Some(json!("John")));
    /// field.update_value(json!("Jane"));
    /// field.update_value(json!("John"));
    /// assert!(field.dirty);
    /// assert_eq!(field.dirty_count, 2);
    /// assert!(!field.has_changes);
    /// ```
    pub fn update_value(&mut self, value: Value) {
        self.value = value;
        self.dirty = true;
        self.dirty_count += 1;
        self.refresh_has_changes();
        self.touch();
    }

    /// Restores the pristine value and clears the dirty state.
    pub fn revert(&mut self) {
        self.value = self.pristine_value.clone();
        self.has_changes = false;
        self.dirty = false;
        self.dirty_count = 0;
        self.touch();
    }

    /// Replaces the pristine baseline, keeping the current value.
    pub fn set_pristine_value(&mut self, value: Value) {
        self.pristine_value = value;
        self.refresh_has_changes();
    }

    /// Recomputes `has_changes` from the current and pristine values.
    pub fn refresh_has_changes(&mut self) {
        self.has_changes = !values_equal(&self.value, &self.pristine_value);
    }

    /// Clears validation state.
    pub fn clear_errors(&mut self) {
        self.errors.clear();
        self.error_count = 0;
    }

    /// Refreshes the modification timestamp.
    pub fn touch(&mut self) {
        self.last_modified = Utc::now();
    }
}

/// Structural deep equality for form values.
///
/// Key order never matters, numbers compare by numeric value (`1 == 1.0`),
/// and an object key holding `null` is equal to a missing key.
///
/// # Examples
///
/// ```
/// use form_model_core::values_equal;
/// use serde_json::json;
///
/// assert!(values_equal(&json!({ "a": 1, "b": [1.0] }), &json!({ "b": [1], "a": 1.0 })));
/// assert!(values_equal(&json!({ "a": null }), &json!({})));
/// assert!(!values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
/// ```
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => {
            x == y
                || match (x.as_f64(), y.as_f64()) {
                    (Some(x), Some(y)) => x == y,
                    _ => false,
                }
        }
        (Value::Array(x), Value::Array(y)) => {
            x.len() == y.len() && x.iter().zip(y).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(x), Value::Object(y)) => {
            x.iter()
                .all(|(key, value)| values_equal(value, y.get(key).unwrap_or(&Value::Null)))
                && y
                    .iter()
                    .filter(|(key, _)| !x.contains_key(*key))
                    .all(|(_, value)| value.is_null())
        }
        _ => a == b,
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn string_field(value: &str) -> Field {
        Field::new("name", Arc::new(Schema::string()), Some(json!(value)))
    }

    #[test]
    fn test_new_uses_schema_default() {
        let field = Field::new("count", Arc::new(Schema::integer()), None);
        assert_eq!(field.value, json!(0));
        assert_eq!(field.pristine_value, json!(0));
        assert!(field.errors.is_empty());
    }

    #[test]
    fn test_new_resolves_required_flag() {
        let field = Field::new("name", Arc::new(Schema::string().required()), None);
        assert!(field.required);
    }

    #[test]
    fn test_update_then_revert() {
        let mut field = string_field("John");
        field.update_value(json!("Jane"));
        assert!(field.has_changes);
        assert_eq!(field.dirty_count, 1);

        field.revert();
        assert_eq!(field.value, json!("John"));
        assert!(!field.dirty);
        assert!(!field.has_changes);
        assert_eq!(field.dirty_count, 0);
    }

    #[test]
    fn test_set_pristine_value_recomputes_changes() {
        let mut field = string_field("John");
        field.update_value(json!("Jane"));
        field.set_pristine_value(json!("Jane"));
        assert!(!field.has_changes);
        assert!(field.dirty);
    }

    #[test]
    fn test_values_equal_numbers_and_nesting() {
        assert!(values_equal(&json!(2), &json!(2.0)));
        assert!(!values_equal(&json!(2), &json!(2.5)));
        assert!(!values_equal(&json!(2), &json!("2")));
        assert!(values_equal(
            &json!({ "a": { "b": [1, { "c": null }] } }),
            &json!({ "a": { "b": [1.0, {}] } })
        ));
        assert!(!values_equal(&json!({ "a": 1 }), &json!({ "a": 1, "b": 0 })));
        assert!(!values_equal(&json!([1]), &json!([1, 2])));
    }
}
