//! Change buffering: revert, snapshot and commit.
//!
//! Every field carries its own pristine value, and composite pristine
//! values contain the pristine values of their children. Reverting a branch
//! therefore means restoring the root's pristine composite and pushing it
//! down, which also undoes structural edits (added, removed or moved array
//! elements) below the root.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use crate::field::{Field, values_equal};
use crate::path::parent_path;
use crate::registry::{FieldMap, descendant_paths, has_descendants, leaf_paths};
use crate::resolver::resolve_field;
use crate::updater::{
    SyncMode, refresh_ancestor_changes, sync_descendants, update_field_value,
    update_parent_structures,
};

/// A flat capture of every field value, keyed by path.
///
/// Iteration is in path order, so parents come before their children.
/// Serializes as a plain JSON object.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Snapshot(pub BTreeMap<String, Value>);

impl Snapshot {
    /// Returns the captured value at `path`.
    pub fn get(&self, path: &str) -> Option<&Value> {
        self.0.get(path)
    }

    /// Number of captured paths.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns `true` if nothing was captured.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Iterates the captured values in path order.
    pub fn iter(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.0.iter()
    }
}

/// Summary counts over the registry.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeStatistics {
    /// Registered fields.
    pub total_fields: usize,
    /// Fields whose value differs from the pristine value.
    pub changed_fields: usize,
    /// Fields touched by an edit.
    pub dirty_fields: usize,
    /// Whether any field has changes.
    pub has_unsaved_changes: bool,
}

/// Reverts the field at `path` to its pristine value. A field with
/// descendants is reverted as a branch. Returns `false` if no field is
/// registered at `path`.
pub fn revert_field(fields: &mut FieldMap, path: &str) -> bool {
    if has_descendants(fields, path) {
        return revert_branch(fields, path);
    }
    let Some(field) = fields.get_mut(path) else {
        return false;
    };
    field.revert();
    update_parent_structures(fields, path);
    refresh_ancestor_changes(fields, path);
    debug!(path, "Reverted field");
    true
}

/// Reverts `path` and everything below it. Fields outside the branch keep
/// their values; ancestors pick up the reverted composite.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
///
/// use form_model_core::{FieldMap, Schema, create_fields_for_schema, revert_branch, update_field_value};
/// use serde_json::json;
///
/// let schema = Arc::new(Schema::object([
///     ("profile", Schema::object([("name", Schema::string())])),
///     ("age", Schema::number()),
/// ]));
/// let mut fields = FieldMap::new();
/// create_fields_for_schema(&mut fields, "user", &schema, None, false);
/// update_field_value(&mut fields, "user.profile.name", json!("Ada"));
/// update_field_value(&mut fields, "user.age", json!(36));
///
/// assert!(revert_branch(&mut fields, "user.profile"));
/// assert_eq!(fields["user.profile.name"].value, json!(""));
/// assert_eq!(fields["user"].value["age"], json!(36));
/// assert!(fields["user"].has_changes);
/// ```
pub fn revert_branch(fields: &mut FieldMap, path: &str) -> bool {
    if !fields.contains_key(path) {
        return false;
    }
    for child in descendant_paths(fields, path) {
        if let Some(field) = fields.get_mut(&child) {
            field.revert();
        }
    }
    if let Some(field) = fields.get_mut(path) {
        field.revert();
    }

    sync_descendants(fields, path, SyncMode::Pristine);
    update_parent_structures(fields, path);
    refresh_ancestor_changes(fields, path);
    debug!(path, "Reverted branch");
    true
}

/// Reverts every field of the form.
pub fn revert_all(fields: &mut FieldMap) {
    for field in fields.values_mut() {
        field.revert();
    }
    let top_level: Vec<String> = fields
        .keys()
        .filter(|path| parent_path(path).is_none())
        .cloned()
        .collect();
    for path in &top_level {
        sync_descendants(fields, path, SyncMode::Pristine);
    }
    rebuild_from_leaves(fields);
    debug!(fields = fields.len(), "Reverted all fields");
}

/// Pushes every leaf value up through its ancestors and recomputes
/// `has_changes` everywhere.
pub fn rebuild_from_leaves(fields: &mut FieldMap) {
    for leaf in leaf_paths(fields) {
        update_parent_structures(fields, &leaf);
    }
    for field in fields.values_mut() {
        field.refresh_has_changes();
    }
}

/// Returns `true` if any field differs from its pristine value.
pub fn has_unsaved_changes(fields: &FieldMap) -> bool {
    fields.values().any(|field| field.has_changes)
}

/// Returns the fields that differ from their pristine value.
pub fn changed_fields(fields: &FieldMap) -> Vec<&Field> {
    fields.values().filter(|field| field.has_changes).collect()
}

/// Returns the paths of the fields that differ from their pristine value.
pub fn changed_paths(fields: &FieldMap) -> Vec<String> {
    changed_fields(fields)
        .into_iter()
        .map(|field| field.path.clone())
        .collect()
}

/// Captures the current value of every field.
pub fn create_snapshot(fields: &FieldMap) -> Snapshot {
    Snapshot(
        fields
            .iter()
            .map(|(path, field)| (path.clone(), field.value.clone()))
            .collect(),
    )
}

/// Applies a snapshot as edits.
///
/// Paths are applied in order; a value equal to the current one is skipped,
/// so restoring a snapshot of the current state changes nothing. Paths that
/// no longer resolve are skipped. Composite values restore their element
/// fields too, and fields created after the snapshot disappear with them.
pub fn restore_from_snapshot(fields: &mut FieldMap, snapshot: &Snapshot) {
    let mut applied = 0usize;
    for (path, value) in snapshot.iter() {
        let Some(current) = resolve_field(fields, path) else {
            debug!(path = %path, "Snapshot path no longer resolves");
            continue;
        };
        if values_equal(&current.value, value) {
            continue;
        }
        update_field_value(fields, path, value.clone());
        applied += 1;
    }
    rebuild_from_leaves(fields);
    debug!(applied, "Restored snapshot");
}

/// Commits the current values as the new pristine baseline.
pub fn set_pristine_values(fields: &mut FieldMap) {
    for field in fields.values_mut() {
        field.pristine_value = field.value.clone();
        field.dirty = false;
        field.dirty_count = 0;
        field.has_changes = false;
    }
}

/// Counts registered, changed and dirty fields in one pass.
pub fn change_statistics(fields: &FieldMap) -> ChangeStatistics {
    fields
        .values()
        .fold(ChangeStatistics::default(), |mut stats, field| {
            stats.total_fields += 1;
            stats.changed_fields += usize::from(field.has_changes);
            stats.dirty_fields += usize::from(field.dirty);
            stats.has_unsaved_changes |= field.has_changes;
            stats
        })
}
