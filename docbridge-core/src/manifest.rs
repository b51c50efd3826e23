//! Source metadata loading from the transformation tool's build artifacts.
//!
//! # Artifact layout
//!
//! ```text
//! <project_dir>/
//!   target/
//!     manifest.json   (documented tables — `nodes` + `sources`)
//!     catalog.json    (every physical column — superset of the manifest)
//! ```
//!
//! The manifest is held as a raw JSON document so that the default
//! description overlay can be written back without losing any field this
//! crate does not model.

use std::collections::BTreeMap;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::defaults::DefaultDescriptions;
use crate::error::{io_err, SourceError};
use crate::types::{DatasetKey, SourceColumn, SourceTable};

/// Both manifest partitions are treated uniformly.
const PARTITIONS: [&str; 2] = ["nodes", "sources"];

/// Source tables keyed by `<schema>.<name>`.
pub type SourceTables = BTreeMap<DatasetKey, SourceTable>;

// ---------------------------------------------------------------------------
// 1. Path helpers
// ---------------------------------------------------------------------------

/// `<project_dir>/target/manifest.json` — pure, no I/O.
pub fn manifest_path_at(project_dir: &Path) -> PathBuf {
    project_dir.join("target").join("manifest.json")
}

/// `<project_dir>/target/catalog.json` — pure, no I/O.
pub fn catalog_path_at(project_dir: &Path) -> PathBuf {
    project_dir.join("target").join("catalog.json")
}

fn read_json(path: &Path) -> Result<Value, SourceError> {
    let contents = std::fs::read_to_string(path).map_err(|e| io_err(path, e))?;
    let document: Value = serde_json::from_str(&contents).map_err(|e| SourceError::Json {
        path: path.to_path_buf(),
        source: e,
    })?;
    if !document.is_object() {
        return Err(SourceError::Malformed {
            path: path.to_path_buf(),
            reason: "top-level value is not an object".to_string(),
        });
    }
    Ok(document)
}

// ---------------------------------------------------------------------------
// 2. Manifest / catalog documents
// ---------------------------------------------------------------------------

/// The build manifest, with the path it was read from.
#[derive(Debug, Clone)]
pub struct Manifest {
    path: PathBuf,
    document: Value,
    modified: bool,
}

/// The build catalog. Only read, never written.
#[derive(Debug, Clone)]
pub struct Catalog {
    path: PathBuf,
    document: Value,
}

impl Manifest {
    /// Read and parse `path`.
    pub fn load_at(path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            path: path.to_path_buf(),
            document: read_json(path)?,
            modified: false,
        })
    }

    /// Wrap an already-parsed document; `path` is where [`Manifest::save`] writes.
    pub fn from_document(path: impl Into<PathBuf>, document: Value) -> Self {
        Self {
            path: path.into(),
            document,
            modified: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document(&self) -> &Value {
        &self.document
    }

    /// Whether the default overlay has touched the document since loading.
    pub fn is_modified(&self) -> bool {
        self.modified
    }

    fn partition(&self, name: &str) -> Result<&Map<String, Value>, SourceError> {
        self.document
            .get(name)
            .and_then(Value::as_object)
            .ok_or_else(|| SourceError::Malformed {
                path: self.path.clone(),
                reason: format!("missing `{name}` object"),
            })
    }

    /// Synthesize manifest column entries for catalog columns that the
    /// manifest does not document but the defaults do.
    ///
    /// Returns the number of columns added.
    pub fn apply_default_descriptions(
        &mut self,
        catalog: &Catalog,
        defaults: &DefaultDescriptions,
    ) -> Result<usize, SourceError> {
        let mut added = 0;
        for partition in PARTITIONS {
            let Some(catalog_tables) = catalog.partition(partition) else {
                continue;
            };
            let path = self.path.clone();
            let malformed = |reason: String| SourceError::Malformed {
                path: path.clone(),
                reason,
            };

            let manifest_tables = self
                .document
                .get_mut(partition)
                .and_then(Value::as_object_mut)
                .ok_or_else(|| malformed(format!("missing `{partition}` object")))?;

            for (table_id, catalog_table) in catalog_tables {
                let table_name = catalog_table
                    .pointer("/metadata/name")
                    .and_then(Value::as_str)
                    .unwrap_or(table_id);
                let Some(catalog_columns) = catalog_table.get("columns").and_then(Value::as_object)
                else {
                    continue;
                };

                let manifest_table =
                    manifest_tables
                        .get_mut(table_id)
                        .ok_or_else(|| SourceError::MissingTable {
                            path: path.clone(),
                            table_id: table_id.clone(),
                        })?;
                let manifest_columns = manifest_table
                    .as_object_mut()
                    .map(|table| {
                        table
                            .entry("columns")
                            .or_insert_with(|| Value::Object(Map::new()))
                    })
                    .and_then(Value::as_object_mut)
                    .ok_or_else(|| malformed(format!("`{partition}.{table_id}.columns` is not an object")))?;

                for column_name in catalog_columns.keys() {
                    tracing::debug!(table = %table_name, column = %column_name, "checking catalog column");
                    if manifest_columns.contains_key(column_name) {
                        continue;
                    }
                    let Some(description) = defaults.description_for(column_name) else {
                        continue;
                    };
                    tracing::info!(
                        table = %table_name,
                        column = %column_name,
                        "adding default description"
                    );
                    manifest_columns.insert(
                        column_name.clone(),
                        json!({
                            "name": column_name,
                            "description": description,
                            "meta": {},
                            "data_type": null,
                            "quote": null,
                            "tags": [],
                        }),
                    );
                    added += 1;
                }
            }
        }
        self.modified = true;
        Ok(added)
    }

    /// Write the document back to where it was read from, atomically.
    ///
    /// Writes to `<path>.tmp` then renames to `<path>`.
    pub fn save(&self) -> Result<(), SourceError> {
        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
        serde::Serialize::serialize(&self.document, &mut ser).map_err(|e| SourceError::Json {
            path: self.path.clone(),
            source: e,
        })?;

        let tmp = PathBuf::from(format!("{}.tmp", self.path.display()));
        let mut file = std::fs::File::create(&tmp).map_err(|e| io_err(&tmp, e))?;
        file.write_all(&buf).map_err(|e| io_err(&tmp, e))?;
        file.sync_all().map_err(|e| io_err(&tmp, e))?;
        drop(file);

        if let Err(e) = std::fs::rename(&tmp, &self.path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(io_err(&self.path, e));
        }
        tracing::info!(path = %self.path.display(), "updated manifest with default descriptions");
        Ok(())
    }
}

impl Catalog {
    /// Read and parse `path`.
    pub fn load_at(path: &Path) -> Result<Self, SourceError> {
        Ok(Self {
            path: path.to_path_buf(),
            document: read_json(path)?,
        })
    }

    pub fn from_document(path: impl Into<PathBuf>, document: Value) -> Self {
        Self {
            path: path.into(),
            document,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// A missing partition is treated as empty.
    fn partition(&self, name: &str) -> Option<&Map<String, Value>> {
        self.document.get(name).and_then(Value::as_object)
    }
}

// ---------------------------------------------------------------------------
// 3. Table extraction
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct ManifestEntry {
    name: String,
    schema: String,
    #[serde(default)]
    database: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    columns: BTreeMap<String, SourceColumn>,
}

/// Normalise the manifest into `<schema>.<name>` → [`SourceTable`].
///
/// When both a `catalog` and non-empty `defaults` are supplied, the default
/// overlay runs first (see [`Manifest::apply_default_descriptions`]); the
/// caller decides whether to [`Manifest::save`] afterwards.
///
/// `database_filter` keeps only tables whose declared database matches
/// exactly. Duplicate keys within the filtered set and an empty result are
/// both fatal.
pub fn load_tables(
    manifest: &mut Manifest,
    catalog: Option<&Catalog>,
    defaults: &DefaultDescriptions,
    database_filter: Option<&str>,
) -> Result<SourceTables, SourceError> {
    if let Some(catalog) = catalog {
        if !defaults.is_empty() {
            let added = manifest.apply_default_descriptions(catalog, defaults)?;
            tracing::info!(added, "applied default descriptions to manifest");
        }
    }

    let mut tables = SourceTables::new();
    for partition in PARTITIONS {
        for (table_id, entry) in manifest.partition(partition)? {
            let table = ManifestEntry::deserialize(entry).map_err(|e| SourceError::Malformed {
                path: manifest.path.clone(),
                reason: format!("`{partition}.{table_id}`: {e}"),
            })?;

            if let Some(db) = database_filter {
                if table.database.as_deref() != Some(db) {
                    tracing::debug!(table = %table_id, "skipping table outside database filter");
                    continue;
                }
            }

            let key = DatasetKey::new(&table.schema, &table.name);
            if tables.contains_key(&key) {
                return Err(SourceError::DuplicateKey { key });
            }
            tables.insert(
                key.clone(),
                SourceTable {
                    key,
                    description: table.description,
                    columns: table.columns,
                },
            );
        }
    }

    if tables.is_empty() {
        return Err(SourceError::EmptySource {
            database_filter: database_filter.map(str::to_string),
        });
    }
    tracing::info!(tables = tables.len(), "loaded source tables from manifest");
    Ok(tables)
}
