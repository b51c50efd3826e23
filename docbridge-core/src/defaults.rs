//! Default column descriptions — the last-resort fallback for physical
//! columns nobody documented.
//!
//! File format:
//!
//! ```yaml
//! columns:
//!   created_at:
//!     desc: Timestamp the row was created.
//! ```

use std::collections::BTreeMap;
use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SourceError};

/// One default-description entry.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultColumn {
    #[serde(default)]
    pub desc: Option<String>,
}

/// Column name → default description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DefaultDescriptions {
    #[serde(default)]
    pub columns: BTreeMap<String, DefaultColumn>,
}

impl DefaultDescriptions {
    /// Load defaults from a YAML file.
    pub fn load_at(path: &Path) -> Result<Self, SourceError> {
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Self::default());
        }
        let parsed: Self = serde_yaml::from_str(&contents).map_err(|e| SourceError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(parsed)
    }

    /// Load from `path` if one was given, else return an empty mapping.
    pub fn load_optional(path: Option<&Path>) -> Result<Self, SourceError> {
        match path {
            Some(path) => Self::load_at(path),
            None => Ok(Self::default()),
        }
    }

    /// The default description for `column_name`, if one is declared.
    pub fn description_for(&self, column_name: &str) -> Option<&str> {
        self.columns
            .get(column_name)
            .and_then(|c| c.desc.as_deref())
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn missing_path_yields_empty_defaults() {
        let defaults = DefaultDescriptions::load_optional(None).unwrap();
        assert!(defaults.is_empty());
    }

    #[test]
    fn loads_desc_entries_and_ignores_entries_without_desc() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("defaults.yml");
        std::fs::write(
            &path,
            "columns:\n  created_at:\n    desc: When the row was created.\n  legacy: {}\n",
        )
        .unwrap();

        let defaults = DefaultDescriptions::load_at(&path).unwrap();
        assert_eq!(
            defaults.description_for("created_at"),
            Some("When the row was created.")
        );
        assert_eq!(defaults.description_for("legacy"), None);
        assert_eq!(defaults.description_for("unknown"), None);
    }

    #[test]
    fn empty_file_is_empty_defaults() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("defaults.yml");
        std::fs::write(&path, "").unwrap();
        assert!(DefaultDescriptions::load_at(&path).unwrap().is_empty());
    }

    #[test]
    fn malformed_yaml_reports_path() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("defaults.yml");
        std::fs::write(&path, "columns: [unclosed").unwrap();
        let err = DefaultDescriptions::load_at(&path).unwrap_err();
        assert!(matches!(err, SourceError::Yaml { .. }), "got: {err}");
        assert!(err.to_string().contains("defaults.yml"));
    }
}
