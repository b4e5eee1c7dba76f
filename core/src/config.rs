//! Form model configuration.
//!
//! Controls the tunable parts of validation and array editing. Every key is
//! optional; missing keys take their defaults.
//!
//! # Example YAML
//!
//! ```yaml
//! validation:
//!   max_depth: 20
//!   min_length_implies_required: true
//!   validate_read_only: false
//! arrays:
//!   max_growth: 100
//! ```

use std::io::{BufReader, BufWriter};
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Validation settings.
///
/// # Examples
///
/// ```
/// # use form_model_core::ValidationConfig;
/// let config = ValidationConfig {
///     max_depth: 8,
///     ..ValidationConfig::default()
/// };
/// assert!(config.min_length_implies_required);
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    /// Paths deeper than this many segments are reported instead of checked.
    pub max_depth: usize,
    /// Treat a string schema with `minLength: 1` as required.
    pub min_length_implies_required: bool,
    /// Validate fields whose schema is marked `readOnly`.
    pub validate_read_only: bool,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            max_depth: 20,
            min_length_implies_required: true,
            validate_read_only: false,
        }
    }
}

/// Array editing settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ArrayConfig {
    /// Most elements a single write past the end of an array may append.
    /// `0` rejects every write past the end.
    pub max_growth: usize,
}

impl Default for ArrayConfig {
    fn default() -> Self {
        Self { max_growth: 100 }
    }
}

/// Top-level form model configuration.
///
/// # Examples
///
/// ```no_run
/// use form_model_core::FormConfig;
///
/// let config = FormConfig::load("form.yml").unwrap();
/// println!("max depth: {}", config.validation.max_depth);
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormConfig {
    /// Validation settings.
    pub validation: ValidationConfig,
    /// Array editing settings.
    pub arrays: ArrayConfig,
}

impl FormConfig {
    /// Loads configuration from a YAML file.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::FormError::Io) if the file cannot be read, or
    /// [`Yaml`](crate::FormError::Yaml) if parsing fails.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let file = std::fs::File::open(path)?;
        let reader = BufReader::new(file);
        let config = serde_yaml::from_reader(reader)?;
        Ok(config)
    }

    /// Saves the configuration as YAML.
    ///
    /// # Errors
    ///
    /// Returns [`Io`](crate::FormError::Io) if the file cannot be written, or
    /// [`Yaml`](crate::FormError::Yaml) if serialization fails.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let file = std::fs::File::create(path)?;
        let writer = BufWriter::new(file);
        serde_yaml::to_writer(writer, self)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_complete() {
        let yaml = r#"
validation:
  max_depth: 5
  min_length_implies_required: false
  validate_read_only: true
arrays:
  max_growth: 4
"#;
        let config: FormConfig = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(config.validation.max_depth, 5);
        assert!(!config.validation.min_length_implies_required);
        assert!(config.validation.validate_read_only);
        assert_eq!(config.arrays.max_growth, 4);
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: FormConfig = serde_yaml::from_str("validation:\n  max_depth: 3\n").unwrap();
        assert_eq!(config.validation.max_depth, 3);
        assert!(config.validation.min_length_implies_required);
        assert!(!config.validation.validate_read_only);
        assert_eq!(config.arrays, ArrayConfig::default());

        let empty: FormConfig = serde_yaml::from_str("{}").unwrap();
        assert_eq!(empty, FormConfig::default());
    }

    #[test]
    fn test_load_save_roundtrip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("form.yml");

        let mut original = FormConfig::default();
        original.validation.max_depth = 7;
        original.save(&path).unwrap();

        let loaded = FormConfig::load(&path).unwrap();
        assert_eq!(loaded, original);
    }

    #[test]
    fn test_load_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = FormConfig::load(dir.path().join("absent.yml")).unwrap_err();
        assert_eq!(err.code(), "IO");
    }
}
