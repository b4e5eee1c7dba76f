//! The field registry and its path-range helpers.
//!
//! The registry is an ordered map from path to [`Field`]. Because keys are
//! ordered, every descendant of `p` sits in one contiguous run of keys
//! starting with `p.`, which keeps branch scans and cascade deletes cheap.

use std::collections::BTreeMap;
use std::ops::Bound;

use tracing::trace;

use crate::field::Field;
use crate::path::{SEPARATOR, build_array_item_path, leading_index};

/// Path-keyed field registry.
pub type FieldMap = BTreeMap<String, Field>;

/// Returns the paths of every registered descendant of `path`.
pub fn descendant_paths(fields: &FieldMap, path: &str) -> Vec<String> {
    descendants(fields, path).map(|(key, _)| key.clone()).collect()
}

/// Iterates the registered descendants of `path` in key order.
pub fn descendants<'a>(
    fields: &'a FieldMap,
    path: &str,
) -> impl Iterator<Item = (&'a String, &'a Field)> {
    let prefix = format!("{path}{SEPARATOR}");
    fields
        .range::<String, _>((Bound::Included(prefix.clone()), Bound::Unbounded))
        .take_while(move |(key, _)| key.starts_with(&prefix))
}

/// Returns `true` if any field is registered below `path`.
pub fn has_descendants(fields: &FieldMap, path: &str) -> bool {
    descendants(fields, path).next().is_some()
}

/// Returns the paths of fields without registered descendants.
pub fn leaf_paths(fields: &FieldMap) -> Vec<String> {
    fields
        .keys()
        .filter(|key| !has_descendants(fields, key))
        .cloned()
        .collect()
}

/// Removes every registered descendant of `path`, keeping `path` itself.
pub fn remove_descendants(fields: &mut FieldMap, path: &str) -> usize {
    let doomed = descendant_paths(fields, path);
    for key in &doomed {
        fields.remove(key);
    }
    doomed.len()
}

/// Removes `path` and all of its descendants.
pub fn remove_branch(fields: &mut FieldMap, path: &str) -> usize {
    let removed = remove_descendants(fields, path);
    removed + usize::from(fields.remove(path).is_some())
}

/// Re-keys the element fields of an array in one batch.
///
/// `remap` receives each element index found below `array_path` and returns
/// its new index. All affected fields (elements and their descendants) are
/// lifted out of the registry before any is reinserted, so renames never
/// collide regardless of direction.
pub fn reindex_items(
    fields: &mut FieldMap,
    array_path: &str,
    remap: impl Fn(usize) -> usize,
) -> usize {
    let renames: Vec<(String, String)> = descendants(fields, array_path)
        .filter_map(|(key, _)| {
            let (index, rest) = leading_index(key, array_path)?;
            let target = remap(index);
            (target != index).then(|| {
                (
                    key.clone(),
                    format!("{}{rest}", build_array_item_path(array_path, target)),
                )
            })
        })
        .collect();

    let staged: Vec<(String, Field)> = renames
        .into_iter()
        .filter_map(|(old, new)| fields.remove(&old).map(|field| (new, field)))
        .collect();

    let count = staged.len();
    for (new, mut field) in staged {
        trace!(from = %field.path, to = %new, "Re-keyed field");
        field.path.clone_from(&new);
        fields.insert(new, field);
    }
    count
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use serde_json::json;

    use super::*;
    use crate::schema::Schema;

    fn registry(paths: &[&str]) -> FieldMap {
        paths
            .iter()
            .map(|path| {
                let field = Field::new(*path, Arc::new(Schema::string()), Some(json!(path)));
                (path.to_string(), field)
            })
            .collect()
    }

    #[test]
    fn test_descendants_stop_at_prefix_boundary() {
        let fields = registry(&["user", "user.age", "user.name", "username", "user0"]);
        assert_eq!(descendant_paths(&fields, "user"), vec!["user.age", "user.name"]);
        assert!(has_descendants(&fields, "user"));
        assert!(!has_descendants(&fields, "username"));
    }

    #[test]
    fn test_leaf_paths() {
        let fields = registry(&["a", "a-x", "a.b", "a.b.c", "a.d", "e"]);
        assert_eq!(leaf_paths(&fields), vec!["a-x", "a.b.c", "a.d", "e"]);
    }

    #[test]
    fn test_remove_branch() {
        let mut fields = registry(&["tags", "tags.0", "tags.1", "tags.1.x", "tags.10"]);
        assert_eq!(remove_branch(&mut fields, "tags.1"), 2);
        assert!(fields.contains_key("tags.10"));
        assert!(fields.contains_key("tags.0"));
    }

    #[test]
    fn test_reindex_shift_up_without_collision() {
        let mut fields = registry(&["list", "list.0", "list.1", "list.1.name", "list.2"]);
        let moved = reindex_items(&mut fields, "list", |i| if i >= 1 { i + 1 } else { i });
        assert_eq!(moved, 3);
        let keys: Vec<_> = fields.keys().cloned().collect();
        assert_eq!(keys, vec!["list", "list.0", "list.2", "list.2.name", "list.3"]);
        // Values travel with their fields.
        assert_eq!(fields["list.2.name"].value, json!("list.1.name"));
        assert_eq!(fields["list.3"].path, "list.3");
    }
}
