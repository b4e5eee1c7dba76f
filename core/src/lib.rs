//! Schema-driven form state.
//!
//! This crate turns a JSON-Schema-like description of a form into a
//! registry of addressable fields and keeps that registry consistent while
//! it is edited:
//!
//! - [`Schema`] describes the form; [`default_value`] derives initial
//!   values from it.
//! - [`Field`] holds the state of one dot-delimited path: current and
//!   pristine value, dirty and change flags, validation messages.
//! - [`FormModel`] owns the registry ([`FieldMap`]) and exposes edits,
//!   array operations, validation, revert, snapshots and change listeners.
//!
//! The building blocks behind the façade (field creation, resolution,
//! propagation, array restructuring, validation and buffering) are public
//! free functions over a [`FieldMap`], so they can be used and tested on
//! their own.
//!
//! # Example
//!
//! ```
//! use form_model_core::FormModel;
//! use serde_json::json;
//!
//! let mut model = FormModel::from_json(json!({
//!     "type": "object",
//!     "properties": {
//!         "user": {
//!             "type": "object",
//!             "properties": {
//!                 "name": { "type": "string", "default": "John" },
//!                 "age": { "type": "integer", "minimum": 0 }
//!             }
//!         }
//!     }
//! }))
//! .unwrap();
//!
//! model.set_value("user.name", json!("Jane")).unwrap();
//! assert_eq!(model.field("user").unwrap().value["name"], json!("Jane"));
//! assert_eq!(model.changed_paths(), vec!["user", "user.name"]);
//!
//! model.set_value("user.age", json!(-1)).unwrap();
//! assert!(!model.validate());
//! assert_eq!(model.field("user").unwrap().error_count, 1);
//!
//! model.revert_branch("user");
//! assert!(!model.has_unsaved_changes());
//! ```

mod array;
mod buffer;
mod config;
mod creator;
mod defaults;
mod error;
mod field;
mod model;
pub mod path;
mod registry;
mod resolver;
mod schema;
mod updater;
mod validate;

pub use array::{add_item, array_length, insert_item, is_valid_array_index, move_item, remove_item};
pub use buffer::{
    ChangeStatistics, Snapshot, change_statistics, changed_fields, changed_paths, create_snapshot,
    has_unsaved_changes, rebuild_from_leaves, restore_from_snapshot, revert_all, revert_branch,
    revert_field, set_pristine_values,
};
pub use config::{ArrayConfig, FormConfig, ValidationConfig};
pub use creator::{
    create_array_field, create_fields_for_schema, create_object_field, create_primitive_field,
};
pub use defaults::default_value;
pub use error::{FormError, Result};
pub use field::{Field, values_equal};
pub use model::{FormModel, ListenerId};
pub use registry::{
    FieldMap, descendant_paths, descendants, has_descendants, leaf_paths, reindex_items,
    remove_branch, remove_descendants,
};
pub use resolver::{ensure_object_property, expand_array_to_index, materialize_path, resolve_field};
pub use schema::{Required, Schema, SchemaShape, SchemaType};
pub use updater::{
    apply_validation_errors, clear_errors, mark_ancestors_dirty, refresh_ancestor_changes,
    update_field_value, update_parent_structures,
};
pub use validate::{
    ErrorsByPath, ValidationError, is_empty_value, validate_all, validate_field, validate_value,
};
