//! Dot-delimited field path helpers.
//!
//! Paths address fields in the registry: object properties use a name
//! segment (`user.profile.name`) and array elements a numeric segment
//! (`tags.0`). Top-level fields have no parent. All helpers are pure string
//! operations and agree with each other:
//!
//! ```
//! use form_model_core::path;
//!
//! let child = path::build_child_path("user.tags", "3");
//! assert_eq!(child, "user.tags.3");
//! assert_eq!(path::parent_path(&child), Some("user.tags"));
//! assert_eq!(path::property_name(&child), "3");
//! assert!(path::is_array_index(path::property_name(&child)));
//! ```

/// Segment separator.
pub const SEPARATOR: char = '.';

/// Splits a path into its segments.
pub fn parse_path(path: &str) -> Vec<&str> {
    if path.is_empty() {
        return Vec::new();
    }
    path.split(SEPARATOR).collect()
}

/// Returns the parent path, or `None` for a top-level path.
pub fn parent_path(path: &str) -> Option<&str> {
    path.rfind(SEPARATOR).map(|pos| &path[..pos])
}

/// Returns the last segment of a path.
pub fn property_name(path: &str) -> &str {
    match path.rfind(SEPARATOR) {
        Some(pos) => &path[pos + 1..],
        None => path,
    }
}

/// Returns `true` if the segment is a non-negative decimal index.
pub fn is_array_index(segment: &str) -> bool {
    !segment.is_empty() && segment.bytes().all(|b| b.is_ascii_digit())
}

/// Joins a parent path and a segment. An empty parent yields the segment.
pub fn build_child_path(parent: &str, segment: &str) -> String {
    if parent.is_empty() {
        segment.to_string()
    } else {
        format!("{parent}{SEPARATOR}{segment}")
    }
}

/// Builds the path of an array element.
pub fn build_array_item_path(array_path: &str, index: usize) -> String {
    build_child_path(array_path, &index.to_string())
}

/// Builds the path of an object property.
pub fn build_property_path(object_path: &str, property: &str) -> String {
    build_child_path(object_path, property)
}

/// Returns `true` if `path` lies strictly below `ancestor`.
///
/// ```
/// use form_model_core::path::is_child_path;
///
/// assert!(is_child_path("user.name", "user"));
/// assert!(!is_child_path("username", "user"));
/// assert!(!is_child_path("user", "user"));
/// ```
pub fn is_child_path(path: &str, ancestor: &str) -> bool {
    path.len() > ancestor.len()
        && path.starts_with(ancestor)
        && path[ancestor.len()..].starts_with(SEPARATOR)
}

/// Returns the number of segments in a path.
pub fn path_depth(path: &str) -> usize {
    parse_path(path).len()
}

/// Iterates the ancestors of a path, nearest parent first.
///
/// ```
/// use form_model_core::path::ancestors;
///
/// let all: Vec<_> = ancestors("a.b.0.c").collect();
/// assert_eq!(all, vec!["a.b.0", "a.b", "a"]);
/// ```
pub fn ancestors(path: &str) -> impl Iterator<Item = &str> {
    std::iter::successors(parent_path(path), |current| parent_path(*current))
}

/// For a path below `array_path`, returns the element index it falls under
/// together with the remainder after the index segment (including the
/// leading separator, empty for the element itself).
///
/// ```
/// use form_model_core::path::leading_index;
///
/// assert_eq!(leading_index("items.2.name", "items"), Some((2, ".name")));
/// assert_eq!(leading_index("items.2", "items"), Some((2, "")));
/// assert_eq!(leading_index("items", "items"), None);
/// ```
pub fn leading_index<'a>(path: &'a str, array_path: &str) -> Option<(usize, &'a str)> {
    if !is_child_path(path, array_path) {
        return None;
    }
    let relative = &path[array_path.len() + 1..];
    let (segment, rest) = match relative.find(SEPARATOR) {
        Some(pos) => relative.split_at(pos),
        None => (relative, ""),
    };
    if !is_array_index(segment) {
        return None;
    }
    segment.parse().ok().map(|index| (index, rest))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_path() {
        assert_eq!(parse_path("a.b.0.c"), vec!["a", "b", "0", "c"]);
        assert!(parse_path("").is_empty());
        assert_eq!(path_depth("a.b.0"), 3);
        assert_eq!(path_depth("a"), 1);
    }

    #[test]
    fn test_parent_and_property_name() {
        assert_eq!(parent_path("user.profile.name"), Some("user.profile"));
        assert_eq!(parent_path("user"), None);
        assert_eq!(property_name("user.profile.name"), "name");
        assert_eq!(property_name("user"), "user");
    }

    #[test]
    fn test_build_then_parent_round_trip() {
        for parent in ["a", "a.b", "items.0"] {
            for key in ["x", "0", "12"] {
                let child = build_child_path(parent, key);
                assert_eq!(parent_path(&child), Some(parent));
                assert_eq!(property_name(&child), key);
            }
        }
        assert_eq!(build_child_path("", "root"), "root");
        assert_eq!(build_array_item_path("tags", 4), "tags.4");
        assert_eq!(build_property_path("user", "age"), "user.age");
    }

    #[test]
    fn test_is_array_index() {
        assert!(is_array_index("0"));
        assert!(is_array_index("42"));
        assert!(!is_array_index(""));
        assert!(!is_array_index("-1"));
        assert!(!is_array_index("1a"));
    }

    #[test]
    fn test_ancestors_of_top_level_path() {
        assert_eq!(ancestors("name").count(), 0);
    }

    #[test]
    fn test_leading_index_ignores_named_children() {
        assert_eq!(leading_index("items.name", "items"), None);
        assert_eq!(leading_index("other.1", "items"), None);
        assert_eq!(leading_index("items.10.a.b", "items"), Some((10, ".a.b")));
    }
}
