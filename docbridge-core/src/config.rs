//! Optional YAML run configuration.
//!
//! Every field may also be given on the command line; the CLI decides
//! precedence. A missing file is not an error, only a malformed one is.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, SourceError};

/// Default file name looked up inside the project directory.
pub const CONFIG_FILE_NAME: &str = "docbridge.yaml";

/// Default cooldown after any remote update, in seconds.
pub const DEFAULT_PAUSE_AFTER_UPDATE_SECS: u64 = 2;

/// Settings for a push run, as read from `docbridge.yaml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PushConfig {
    #[serde(default)]
    pub superset_url: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub superset_db_id: Option<i64>,
    #[serde(default)]
    pub dbt_db_name: Option<String>,
    #[serde(default)]
    pub dataset_filter: Option<String>,
    #[serde(default)]
    pub refresh_columns: Option<bool>,
    #[serde(default)]
    pub pause_after_update_secs: Option<u64>,
    #[serde(default)]
    pub default_descriptions_path: Option<PathBuf>,
}

impl PushConfig {
    /// `<project_dir>/docbridge.yaml` — pure, no I/O.
    pub fn default_path_at(project_dir: &Path) -> PathBuf {
        project_dir.join(CONFIG_FILE_NAME)
    }

    /// Load a config file. Returns `Ok(None)` if it does not exist.
    pub fn load_at(path: &Path) -> Result<Option<Self>, SourceError> {
        if !path.exists() {
            return Ok(None);
        }
        let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
        if contents.trim().is_empty() {
            return Ok(Some(Self::default()));
        }
        let parsed: Self = serde_yaml::from_str(&contents).map_err(|e| SourceError::Yaml {
            path: path.to_path_buf(),
            source: e,
        })?;
        Ok(Some(parsed))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn absent_file_is_none() {
        let tmp = TempDir::new().unwrap();
        let loaded = PushConfig::load_at(&PushConfig::default_path_at(tmp.path())).unwrap();
        assert!(loaded.is_none());
    }

    #[test]
    fn parses_known_fields() {
        let tmp = TempDir::new().unwrap();
        let path = PushConfig::default_path_at(tmp.path());
        std::fs::write(
            &path,
            "superset_url: https://bi.example.com\nsuperset_db_id: 3\nrefresh_columns: true\n",
        )
        .unwrap();
        let cfg = PushConfig::load_at(&path).unwrap().expect("config");
        assert_eq!(cfg.superset_url.as_deref(), Some("https://bi.example.com"));
        assert_eq!(cfg.superset_db_id, Some(3));
        assert_eq!(cfg.refresh_columns, Some(true));
        assert_eq!(cfg.pause_after_update_secs, None);
    }

    #[test]
    fn unknown_field_is_rejected() {
        let tmp = TempDir::new().unwrap();
        let path = PushConfig::default_path_at(tmp.path());
        std::fs::write(&path, "supeset_url: typo\n").unwrap();
        let err = PushConfig::load_at(&path).unwrap_err();
        assert!(matches!(err, SourceError::Yaml { .. }), "got: {err}");
    }
}
