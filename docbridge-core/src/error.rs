//! Error types for docbridge-core.

use std::path::PathBuf;

use thiserror::Error;

use crate::types::DatasetKey;

/// All errors that can arise while loading source metadata.
///
/// `DuplicateKey` and `EmptySource` are fatal configuration problems: they
/// mean source-to-target matching would be ambiguous or pointless.
#[derive(Debug, Error)]
pub enum SourceError {
    /// Underlying I/O failure, with the offending path.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// JSON parse error on a build artifact.
    #[error("failed to parse JSON at {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// YAML parse error on the defaults or config file.
    #[error("failed to parse YAML at {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// The document parsed but does not have the expected shape.
    #[error("malformed build artifact at {path}: {reason}")]
    Malformed { path: PathBuf, reason: String },

    /// A catalog table has no counterpart in the manifest.
    #[error("catalog table '{table_id}' is missing from manifest {path}")]
    MissingTable { path: PathBuf, table_id: String },

    /// Two source tables share the same `<schema>.<name>` key.
    #[error(
        "table {key} is a duplicate name (schema + table) across databases; \
         this would result in incorrect matching between the BI platform and dbt. \
         To fix this, remove duplicates or pass `--dbt-db-name`"
    )]
    DuplicateKey { key: DatasetKey },

    /// No source tables survived filtering.
    #[error("manifest is empty: no tables found{}", database_hint(.database_filter))]
    EmptySource { database_filter: Option<String> },
}

fn database_hint(filter: &Option<String>) -> String {
    match filter {
        Some(db) => format!(" for database '{db}'"),
        None => String::new(),
    }
}

/// Convenience constructor for [`SourceError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SourceError {
    SourceError::Io {
        path: path.into(),
        source,
    }
}
