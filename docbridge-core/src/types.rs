//! Domain types shared by the loader, client and reconciliation engine.
//!
//! Remote payloads frequently carry `null` where a string is expected; those
//! are normalised to the empty string on deserialisation so equality checks
//! compare like with like.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Deserializer, Serialize};

// ---------------------------------------------------------------------------
// Newtypes
// ---------------------------------------------------------------------------

/// `<schema>.<name>`, the identifier both sides are matched on.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct DatasetKey(pub String);

impl DatasetKey {
    /// Build the key from a schema and a table name.
    pub fn new(schema: &str, name: &str) -> Self {
        Self(format!("{schema}.{name}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DatasetKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for DatasetKey {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for DatasetKey {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Target side (BI platform datasets)
// ---------------------------------------------------------------------------

/// Reference to a dataset owner. Only the id is ever resupplied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Owner {
    pub id: i64,
}

/// A dataset column as reported by the BI platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Column {
    pub id: i64,
    pub column_name: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub expression: String,
}

impl Column {
    /// Computed columns carry a SQL expression and have no physical source.
    pub fn is_computed(&self) -> bool {
        !self.expression.is_empty()
    }
}

/// The mutable part of a dataset, as returned by `GET /dataset/{id}`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct DatasetDetail {
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default)]
    pub owners: Vec<Owner>,
    #[serde(default)]
    pub columns: Vec<Column>,
}

/// A physical dataset in the BI platform's registry.
///
/// `description`, `owners` and `columns` are empty after listing and are
/// filled by [`TargetEntity::refresh_details`] right before merging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetEntity {
    pub id: i64,
    pub key: DatasetKey,
    pub description: String,
    pub owners: Vec<Owner>,
    pub columns: Vec<Column>,
}

impl TargetEntity {
    /// A freshly listed entity with no detail loaded yet.
    pub fn listed(id: i64, key: DatasetKey) -> Self {
        Self {
            id,
            key,
            description: String::new(),
            owners: Vec::new(),
            columns: Vec::new(),
        }
    }

    /// Replace the mutable fields with the latest remote state.
    pub fn refresh_details(&mut self, detail: DatasetDetail) {
        self.description = detail.description;
        self.owners = detail.owners;
        self.columns = detail.columns;
    }

    /// Owner ids in their current order.
    pub fn owner_ids(&self) -> Vec<i64> {
        self.owners.iter().map(|o| o.id).collect()
    }

    /// Current columns projected onto the writable fields.
    pub fn column_updates(&self) -> Vec<ColumnUpdate> {
        self.columns
            .iter()
            .map(|c| ColumnUpdate {
                id: c.id,
                column_name: c.column_name.clone(),
                description: c.description.clone(),
            })
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Source side (transformation tool manifest)
// ---------------------------------------------------------------------------

/// A documented column in the build manifest.
///
/// `description` is `None` when the manifest entry has no description key at
/// all; an explicit empty string is still a description.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceColumn {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// A table or source declared in the build manifest.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SourceTable {
    pub key: DatasetKey,
    pub description: Option<String>,
    pub columns: BTreeMap<String, SourceColumn>,
}

// ---------------------------------------------------------------------------
// Merge output
// ---------------------------------------------------------------------------

/// Writable projection of a column, as sent in the update payload.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnUpdate {
    pub id: i64,
    pub column_name: String,
    pub description: String,
}

/// The merged state for one dataset. Never persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconciledDelta {
    pub description_new: String,
    pub columns_new: Vec<ColumnUpdate>,
    pub owners_new: Vec<i64>,
}

impl ReconciledDelta {
    /// True when the delta matches the entity's current state.
    ///
    /// Columns are compared as sets keyed by id.
    pub fn matches(&self, target: &TargetEntity) -> bool {
        if self.description_new != target.description || self.owners_new != target.owner_ids() {
            return false;
        }
        let mut current = target.column_updates();
        let mut merged = self.columns_new.clone();
        current.sort_by_key(|c| c.id);
        merged.sort_by_key(|c| c.id);
        current == merged
    }
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
