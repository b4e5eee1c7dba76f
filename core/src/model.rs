//! The form model façade.
//!
//! [`FormModel`] owns the field registry for one form and exposes every
//! operation on it. Each top-level property of the root schema becomes a
//! top-level field; paths below it address nested fields. Mutating
//! operations run to completion and then notify listeners with the updated
//! registry.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, warn};

use crate::array::{add_item, array_length, insert_item, move_item, remove_item};
use crate::buffer::{self, ChangeStatistics, Snapshot};
use crate::config::FormConfig;
use crate::creator::create_fields_for_schema;
use crate::error::Result;
use crate::field::Field;
use crate::path::parent_path;
use crate::registry::FieldMap;
use crate::resolver::{materialize_path, materialize_path_in, resolve_field};
use crate::schema::Schema;
use crate::updater::{self, apply_validation_errors, update_field_value_in};
use crate::validate::validate_all;

/// Handle returned by [`FormModel::add_listener`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ListenerId(u64);

type Listener = Box<dyn FnMut(&FieldMap)>;

/// State of one form: its schema, its fields and their change and
/// validation bookkeeping.
///
/// # Examples
///
/// ```
/// use form_model_core::FormModel;
/// use serde_json::json;
///
/// let mut model = FormModel::from_json(json!({
///     "name": { "type": "string", "default": "John", "minLength": 1 },
///     "tags": { "type": "array", "items": { "type": "string" } }
/// }))
/// .unwrap();
///
/// model.set_value("name", json!("Jane")).unwrap();
/// model.add_value("tags", Some(json!("admin"))).unwrap();
/// assert_eq!(model.values(), json!({ "name": "Jane", "tags": ["admin"] }));
/// assert!(model.has_unsaved_changes());
///
/// model.set_value("name", json!("")).unwrap();
/// assert!(!model.validate());
/// assert_eq!(model.field("name").unwrap().errors, vec!["This field is required"]);
///
/// model.revert_all();
/// assert_eq!(model.values(), json!({ "name": "John", "tags": [] }));
/// ```
pub struct FormModel {
    schema: Arc<Schema>,
    config: FormConfig,
    fields: FieldMap,
    listeners: Vec<(ListenerId, Listener)>,
    next_listener_id: u64,
}

impl FormModel {
    /// Builds a model with the default configuration.
    pub fn new(schema: Schema) -> Self {
        Self::with_config(schema, FormConfig::default())
    }

    /// Builds a model with an explicit configuration.
    pub fn with_config(schema: Schema, config: FormConfig) -> Self {
        let schema = Arc::new(schema.into_root());
        let fields = build_fields(&schema, None);
        debug!(fields = fields.len(), "Built form model");
        Self {
            schema,
            config,
            fields,
            listeners: Vec::new(),
            next_listener_id: 0,
        }
    }

    /// Builds a model from a JSON schema: a full object node or a shorthand
    /// map of top-level property schemas.
    ///
    /// # Errors
    ///
    /// Returns [`InvalidSchema`](crate::FormError::InvalidSchema) or
    /// [`Json`](crate::FormError::Json) if the schema cannot be parsed.
    pub fn from_json(schema: Value) -> Result<Self> {
        Self::from_json_with_config(schema, FormConfig::default())
    }

    /// Like [`from_json`](Self::from_json), with an explicit configuration.
    ///
    /// # Errors
    ///
    /// See [`from_json`](Self::from_json).
    pub fn from_json_with_config(schema: Value, config: FormConfig) -> Result<Self> {
        Ok(Self::with_config(Schema::root_from_json(schema)?, config))
    }

    /// Rebuilds every field from `values`, an object keyed by top-level
    /// property. The given values become the pristine baseline; properties
    /// missing from `values` take their defaults.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_model_core::{FormModel, Schema};
    /// use serde_json::json;
    ///
    /// let model = FormModel::new(Schema::object([("name", Schema::string())]))
    ///     .with_values(json!({ "name": "Ada" }));
    /// assert_eq!(model.field("name").unwrap().pristine_value, json!("Ada"));
    /// assert!(!model.has_unsaved_changes());
    /// ```
    pub fn with_values(mut self, values: Value) -> Self {
        let seed = match values {
            Value::Object(map) => Some(map),
            _ => None,
        };
        self.fields = build_fields(&self.schema, seed.as_ref());
        self
    }

    /// Replaces the schema. Every field is recreated from its default.
    pub fn set_schema(&mut self, schema: Schema) {
        self.schema = Arc::new(schema.into_root());
        self.fields = build_fields(&self.schema, None);
        debug!(fields = self.fields.len(), "Replaced schema");
        self.notify();
    }

    /// The normalized root schema.
    pub fn schema(&self) -> &Schema {
        &self.schema
    }

    /// The active configuration.
    pub fn config(&self) -> &FormConfig {
        &self.config
    }

    /// The field registry.
    pub fn fields(&self) -> &FieldMap {
        &self.fields
    }

    /// Looks up a registered field without materializing anything.
    pub fn field(&self, path: &str) -> Option<&Field> {
        self.fields.get(path)
    }

    /// Looks up the field at `path`, materializing it from its parent's
    /// value when needed. Never grows arrays or changes values.
    pub fn get_field(&mut self, path: &str) -> Option<&Field> {
        resolve_field(&mut self.fields, path)
    }

    /// Assembles the current form value from the top-level fields, in
    /// schema declaration order.
    pub fn values(&self) -> Value {
        let map: Map<String, Value> = self
            .schema
            .properties
            .iter()
            .flatten()
            .filter_map(|(name, _)| {
                let field = self.fields.get(name)?;
                Some((name.clone(), field.value.clone()))
            })
            .collect();
        Value::Object(map)
    }

    /// Sets the value at `path` and propagates it through the form.
    ///
    /// Missing fields along the path are created first; an element index
    /// past the end of an array grows the array, by at most
    /// [`ArrayConfig::max_growth`](crate::ArrayConfig::max_growth) elements.
    /// The whole call counts as one edit: every ancestor's `dirty_count`
    /// goes up by one, even when creating the path already edited it.
    ///
    /// # Errors
    ///
    /// Returns [`FieldNotFound`](crate::FormError::FieldNotFound) if the path
    /// does not lead to a location declared by the schema, or
    /// [`IndexOutOfBounds`](crate::FormError::IndexOutOfBounds) if it would
    /// grow an array past the configured limit.
    pub fn set_value(&mut self, path: &str, value: Value) -> Result<()> {
        let mut touched = HashSet::new();
        if let Err(err) =
            materialize_path_in(&mut self.fields, path, &self.config.arrays, &mut touched)
        {
            warn!(path, %err, "Cannot set value, path does not resolve");
            return Err(err);
        }
        update_field_value_in(&mut self.fields, path, value, &mut touched);
        debug!(path, "Set value");
        self.notify();
        Ok(())
    }

    /// Validates every field and stores the messages on the fields. Returns
    /// `true` if the form is valid.
    pub fn validate(&mut self) -> bool {
        let errors = validate_all(&self.fields, &self.config.validation);
        apply_validation_errors(&mut self.fields, &errors);
        errors.is_empty()
    }

    /// Removes all validation messages.
    pub fn clear_errors(&mut self) {
        updater::clear_errors(&mut self.fields);
    }

    /// Clears dirty and validation state on every field. Values and pristine
    /// values are kept.
    pub fn reset_form(&mut self) {
        for field in self.fields.values_mut() {
            field.dirty = false;
            field.dirty_count = 0;
            field.clear_errors();
        }
        debug!("Reset form state");
        self.notify();
    }

    /// Number of invalid fields after the last validation.
    pub fn error_count(&self) -> usize {
        self.fields
            .iter()
            .filter(|(path, _)| parent_path(path).is_none())
            .map(|(_, field)| field.error_count)
            .sum()
    }

    /// Returns `true` if the last validation found no invalid field.
    pub fn is_valid(&self) -> bool {
        self.error_count() == 0
    }

    // ------------------------------------------------------------------
    // Arrays
    // ------------------------------------------------------------------

    /// Appends an element (the item default when `value` is `None`) and
    /// returns its path.
    ///
    /// # Errors
    ///
    /// [`FieldNotFound`](crate::FormError::FieldNotFound) or
    /// [`NotAnArray`](crate::FormError::NotAnArray).
    pub fn add_value(&mut self, array_path: &str, value: Option<Value>) -> Result<String> {
        materialize_path(&mut self.fields, array_path, &self.config.arrays)?;
        let path = add_item(&mut self.fields, array_path, value)?;
        self.notify();
        Ok(path)
    }

    /// Removes the element at `element_path` and returns the new length.
    ///
    /// # Errors
    ///
    /// [`InvalidPath`](crate::FormError::InvalidPath),
    /// [`IndexOutOfBounds`](crate::FormError::IndexOutOfBounds),
    /// [`FieldNotFound`](crate::FormError::FieldNotFound) or
    /// [`NotAnArray`](crate::FormError::NotAnArray).
    pub fn delete_value(&mut self, element_path: &str) -> Result<usize> {
        if let Some(array_path) = parent_path(element_path) {
            resolve_field(&mut self.fields, array_path);
        }
        let len = remove_item(&mut self.fields, element_path)?;
        self.notify();
        Ok(len)
    }

    /// Inserts an element at `index` and returns its path.
    ///
    /// # Errors
    ///
    /// [`IndexOutOfBounds`](crate::FormError::IndexOutOfBounds) if `index`
    /// exceeds the length, [`FieldNotFound`](crate::FormError::FieldNotFound)
    /// or [`NotAnArray`](crate::FormError::NotAnArray).
    pub fn insert_array_item(
        &mut self,
        array_path: &str,
        index: usize,
        value: Option<Value>,
    ) -> Result<String> {
        materialize_path(&mut self.fields, array_path, &self.config.arrays)?;
        let path = insert_item(&mut self.fields, array_path, index, value)?;
        self.notify();
        Ok(path)
    }

    /// Moves the element at `from` to `to`.
    ///
    /// # Errors
    ///
    /// [`IndexOutOfBounds`](crate::FormError::IndexOutOfBounds) if either
    /// index is out of range, [`FieldNotFound`](crate::FormError::FieldNotFound)
    /// or [`NotAnArray`](crate::FormError::NotAnArray).
    pub fn move_array_item(&mut self, array_path: &str, from: usize, to: usize) -> Result<()> {
        resolve_field(&mut self.fields, array_path);
        move_item(&mut self.fields, array_path, from, to)?;
        self.notify();
        Ok(())
    }

    /// Number of elements in the array at `array_path`.
    ///
    /// # Errors
    ///
    /// [`FieldNotFound`](crate::FormError::FieldNotFound) or
    /// [`NotAnArray`](crate::FormError::NotAnArray).
    pub fn get_array_length(&mut self, array_path: &str) -> Result<usize> {
        resolve_field(&mut self.fields, array_path);
        array_length(&self.fields, array_path)
    }

    // ------------------------------------------------------------------
    // Change buffering
    // ------------------------------------------------------------------

    /// Reverts one field (or, for a composite, its whole branch).
    pub fn revert_field(&mut self, path: &str) -> bool {
        let reverted = buffer::revert_field(&mut self.fields, path);
        if reverted {
            self.notify();
        }
        reverted
    }

    /// Reverts `path` and every field below it.
    pub fn revert_branch(&mut self, path: &str) -> bool {
        let reverted = buffer::revert_branch(&mut self.fields, path);
        if reverted {
            self.notify();
        }
        reverted
    }

    /// Reverts the whole form to its pristine values.
    pub fn revert_all(&mut self) {
        buffer::revert_all(&mut self.fields);
        self.notify();
    }

    /// Returns `true` if any field differs from its pristine value.
    pub fn has_unsaved_changes(&self) -> bool {
        buffer::has_unsaved_changes(&self.fields)
    }

    /// Fields that differ from their pristine value.
    pub fn changed_fields(&self) -> Vec<&Field> {
        buffer::changed_fields(&self.fields)
    }

    /// Paths of the fields that differ from their pristine value.
    pub fn changed_paths(&self) -> Vec<String> {
        buffer::changed_paths(&self.fields)
    }

    /// Captures every field value.
    pub fn create_snapshot(&self) -> Snapshot {
        buffer::create_snapshot(&self.fields)
    }

    /// Restores a snapshot through regular edits.
    pub fn restore_from_snapshot(&mut self, snapshot: &Snapshot) {
        buffer::restore_from_snapshot(&mut self.fields, snapshot);
        self.notify();
    }

    /// Commits the current values as the pristine baseline.
    pub fn set_pristine_values(&mut self) {
        buffer::set_pristine_values(&mut self.fields);
        debug!("Committed pristine values");
    }

    /// Counts registered, changed and dirty fields.
    pub fn change_statistics(&self) -> ChangeStatistics {
        buffer::change_statistics(&self.fields)
    }

    // ------------------------------------------------------------------
    // Listeners
    // ------------------------------------------------------------------

    /// Registers a callback invoked with the registry after every mutating
    /// operation. Listeners run in registration order.
    pub fn add_listener(&mut self, listener: impl FnMut(&FieldMap) + 'static) -> ListenerId {
        let id = ListenerId(self.next_listener_id);
        self.next_listener_id += 1;
        self.listeners.push((id, Box::new(listener)));
        id
    }

    /// Unregisters a listener. Returns `false` if it was not registered.
    pub fn remove_listener(&mut self, id: ListenerId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(registered, _)| *registered != id);
        self.listeners.len() != before
    }

    fn notify(&mut self) {
        for (_, listener) in &mut self.listeners {
            listener(&self.fields);
        }
    }
}

impl fmt::Debug for FormModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FormModel")
            .field("schema", &self.schema)
            .field("config", &self.config)
            .field("fields", &self.fields.len())
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

fn build_fields(schema: &Arc<Schema>, values: Option<&Map<String, Value>>) -> FieldMap {
    let mut fields = FieldMap::new();
    if let Some(properties) = &schema.properties {
        for (name, property) in properties {
            let seed = values.and_then(|values| values.get(name)).cloned();
            create_fields_for_schema(
                &mut fields,
                name,
                property,
                seed,
                schema.is_property_required(name),
            );
        }
    }
    fields
}

#[cfg(test)]
mod tests {
    use std::cell::RefCell;
    use std::rc::Rc;

    use serde_json::json;

    use super::*;
    use crate::error::FormError;

    fn model() -> FormModel {
        FormModel::from_json(json!({
            "type": "object",
            "properties": {
                "name": { "type": "string", "default": "John" },
                "tags": { "type": "array", "items": { "type": "string" } }
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_set_value_unknown_path() {
        let mut model = model();
        let err = model.set_value("nickname", json!("x")).unwrap_err();
        assert!(matches!(err, FormError::FieldNotFound(ref path) if path == "nickname"));
        assert!(model.set_value("name.first", json!("x")).is_err());
    }

    #[test]
    fn test_set_value_past_array_end_grows_array() {
        let mut model = model();
        model.set_value("tags.1", json!("b")).unwrap();
        assert_eq!(model.field("tags").unwrap().value, json!(["", "b"]));
        assert_eq!(model.get_array_length("tags").unwrap(), 2);
    }

    #[test]
    fn test_get_field_never_grows_arrays() {
        let mut model = model();
        assert!(model.get_field("tags.0").is_none());
        assert_eq!(model.get_array_length("tags").unwrap(), 0);
    }

    #[test]
    fn test_listeners_run_after_mutations() {
        let mut model = model();
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink = Rc::clone(&seen);
        let id = model.add_listener(move |fields| {
            sink.borrow_mut().push(fields["name"].value.clone());
        });

        model.set_value("name", json!("Jane")).unwrap();
        model.validate();
        model.revert_all();
        assert_eq!(*seen.borrow(), vec![json!("Jane"), json!("John")]);

        assert!(model.remove_listener(id));
        assert!(!model.remove_listener(id));
        model.set_value("name", json!("Ada")).unwrap();
        assert_eq!(seen.borrow().len(), 2);
    }

    #[test]
    fn test_reset_form_keeps_values() {
        let mut model = model();
        model.set_value("name", json!("")).unwrap();
        model.validate();
        assert_eq!(model.error_count(), 0);

        model.reset_form();
        let field = model.field("name").unwrap();
        assert_eq!(field.value, json!(""));
        assert!(!field.dirty);
        assert!(field.has_changes);
    }

    #[test]
    fn test_set_schema_rebuilds_fields() {
        let mut model = model();
        model.set_value("name", json!("Jane")).unwrap();
        model.set_schema(Schema::object([("email", Schema::string())]));
        assert!(model.field("name").is_none());
        assert_eq!(model.values(), json!({ "email": "" }));
        assert!(!model.has_unsaved_changes());
    }

    #[test]
    fn test_debug_summarizes() {
        let rendered = format!("{:?}", model());
        assert!(rendered.contains("FormModel"));
        assert!(rendered.contains("fields: 2"));
    }
}
