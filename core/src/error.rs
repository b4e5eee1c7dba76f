//! Error types for form model operations.
//!
//! Covers the local failure modes of the model: paths that do not resolve
//! to a schema-backed field, structural array operations on the wrong kind
//! of field or with out-of-range indices, and configuration/schema loading.
//!
//! Validation failures are not errors in this sense; they are data attached
//! to fields (see [`ValidationError`](crate::ValidationError)).

use thiserror::Error;

/// Errors that can occur while operating on a form model.
#[derive(Debug, Error)]
pub enum FormError {
    /// The path does not correspond to a declared schema location.
    #[error("field not found: {0}")]
    FieldNotFound(String),

    /// An array operation was invoked on a field that is not an array.
    #[error("field is not an array: {0}")]
    NotAnArray(String),

    /// An array index lies outside the bounds allowed by the operation.
    #[error("index {index} out of bounds for array '{path}' of length {len}")]
    IndexOutOfBounds {
        /// Path of the array field.
        path: String,
        /// Offending index.
        index: usize,
        /// Array length at the time of the call.
        len: usize,
    },

    /// The path is syntactically unusable for the operation (e.g. an
    /// element path without a trailing numeric segment).
    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// The schema cannot back a form model.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// File I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON parsing or serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// YAML parsing or serialization failure.
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl FormError {
    /// Returns a stable identifier for the error kind.
    ///
    /// # Examples
    ///
    /// ```
    /// use form_model_core::FormError;
    ///
    /// let err = FormError::FieldNotFound("user.nickname".into());
    /// assert_eq!(err.code(), "FIELD_NOT_FOUND");
    /// ```
    pub fn code(&self) -> &'static str {
        match self {
            Self::FieldNotFound(_) => "FIELD_NOT_FOUND",
            Self::NotAnArray(_) => "NOT_AN_ARRAY",
            Self::IndexOutOfBounds { .. } => "INDEX_OUT_OF_BOUNDS",
            Self::InvalidPath(_) => "INVALID_PATH",
            Self::InvalidSchema(_) => "INVALID_SCHEMA",
            Self::Io(_) => "IO",
            Self::Json(_) => "JSON",
            Self::Yaml(_) => "YAML",
        }
    }
}

/// Convenience alias for results with [`FormError`].
pub type Result<T> = std::result::Result<T, FormError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_index_out_of_bounds_message() {
        let err = FormError::IndexOutOfBounds {
            path: "tags".to_string(),
            index: 5,
            len: 2,
        };
        assert_eq!(
            err.to_string(),
            "index 5 out of bounds for array 'tags' of length 2"
        );
        assert_eq!(err.code(), "INDEX_OUT_OF_BOUNDS");
    }

    #[test]
    fn test_json_error_converts() {
        let parse = serde_json::from_str::<serde_json::Value>("{").unwrap_err();
        let err: FormError = parse.into();
        assert_eq!(err.code(), "JSON");
    }
}
