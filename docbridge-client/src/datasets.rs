//! Dataset endpoints: paginated listing, detail, column refresh and update.
//!
//! Every function takes the [`Session`] explicitly; there is no ambient
//! client state.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use docbridge_core::{ColumnUpdate, DatasetDetail, DatasetKey, ReconciledDelta, TargetEntity};

use crate::error::ClientError;
use crate::session::Session;

/// Fixed listing page size.
pub const PAGE_SIZE: u32 = 100;

/// Optional narrowing of the remote dataset collection.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DatasetFilter {
    /// Keep only datasets living in this BI database.
    pub database_id: Option<i64>,
    /// Keep only datasets whose `<schema>.<name>` key contains this.
    pub key_substring: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListPage {
    #[serde(default)]
    result: Vec<ListedDataset>,
}

#[derive(Debug, Deserialize)]
struct ListedDataset {
    id: i64,
    kind: String,
    database: DatabaseRef,
    #[serde(default)]
    schema: Option<String>,
    table_name: String,
}

#[derive(Debug, Deserialize)]
struct DatabaseRef {
    id: i64,
}

#[derive(Debug, Deserialize)]
struct DetailEnvelope {
    result: DatasetDetail,
}

/// Body of `PUT /dataset/{id}`.
///
/// `owners` must always be present: the endpoint treats an omitted owners
/// field as "clear all owners".
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DatasetUpdate<'a> {
    pub description: &'a str,
    pub columns: &'a [ColumnUpdate],
    pub owners: &'a [i64],
}

impl<'a> From<&'a ReconciledDelta> for DatasetUpdate<'a> {
    fn from(delta: &'a ReconciledDelta) -> Self {
        Self {
            description: &delta.description_new,
            columns: &delta.columns_new,
            owners: &delta.owners_new,
        }
    }
}

/// Walk the dataset listing page by page until an empty page and return every
/// physical dataset that passes `filter`, in page-then-record order.
///
/// A duplicate key fails immediately with [`ClientError::DuplicateKey`]; an
/// empty result fails with [`ClientError::NoData`].
pub fn fetch_entities(
    session: &mut Session,
    filter: &DatasetFilter,
) -> Result<Vec<TargetEntity>, ClientError> {
    tracing::info!("getting physical datasets from the BI platform");

    let mut entities = Vec::new();
    let mut keys = HashSet::new();
    let mut listed = 0usize;
    let mut physical = 0usize;
    let mut in_database = 0usize;
    let mut page = 0u32;

    loop {
        tracing::info!("getting page {}", page + 1);
        let q = json!({ "page": page, "page_size": PAGE_SIZE }).to_string();
        let listing: ListPage = session.get_json("/dataset/", &[("q", q)])?;
        if listing.result.is_empty() {
            break;
        }

        for record in listing.result {
            listed += 1;
            if record.kind != "physical" {
                tracing::debug!(dataset_id = record.id, kind = %record.kind, "skipping non-physical dataset");
                continue;
            }
            physical += 1;

            if let Some(database_id) = filter.database_id {
                if record.database.id != database_id {
                    tracing::debug!(
                        dataset_id = record.id,
                        database_id = record.database.id,
                        "skipping dataset outside database filter"
                    );
                    continue;
                }
            }
            in_database += 1;

            let key = DatasetKey::new(record.schema.as_deref().unwrap_or_default(), &record.table_name);
            if let Some(substring) = filter.key_substring.as_deref() {
                if !key.as_str().contains(substring) {
                    tracing::info!(
                        "skipping {key} for dataset id {} due to dataset filter `{substring}`",
                        record.id
                    );
                    continue;
                }
                tracing::info!(
                    "matched {key} for dataset id {} due to dataset filter `{substring}`",
                    record.id
                );
            }

            if !keys.insert(key.clone()) {
                return Err(ClientError::DuplicateKey { key });
            }
            entities.push(TargetEntity::listed(record.id, key));
        }
        page += 1;
    }

    if entities.is_empty() {
        let reason = if listed == 0 {
            "the listing returned no datasets".to_string()
        } else if physical == 0 {
            format!("none of the {listed} listed datasets is physical")
        } else if in_database == 0 {
            format!(
                "no physical dataset belongs to database id {}",
                filter.database_id.unwrap_or_default()
            )
        } else {
            format!(
                "no physical dataset key contains `{}`",
                filter.key_substring.as_deref().unwrap_or_default()
            )
        };
        return Err(ClientError::NoData { reason });
    }

    tracing::info!(
        "there are {} physical datasets in the BI platform overall",
        entities.len()
    );
    Ok(entities)
}

/// `GET /dataset/{id}` — current description, owners and columns.
pub fn fetch_detail(session: &mut Session, dataset_id: i64) -> Result<DatasetDetail, ClientError> {
    tracing::info!(dataset_id, "pulling fresh column info");
    let envelope: DetailEnvelope = session.get_json(&format!("/dataset/{dataset_id}"), &[])?;
    Ok(envelope.result)
}

/// `PUT /dataset/{id}/refresh` — re-introspect columns from the database.
pub fn refresh_columns(session: &mut Session, dataset_id: i64) -> Result<(), ClientError> {
    tracing::info!(dataset_id, "refreshing columns");
    session.put_json::<()>(&format!("/dataset/{dataset_id}/refresh"), None)?;
    Ok(())
}

/// `PUT /dataset/{id}?override_columns=false`.
///
/// Columns absent from `update` are left untouched remotely.
pub fn update_dataset(
    session: &mut Session,
    dataset_id: i64,
    update: &DatasetUpdate<'_>,
) -> Result<(), ClientError> {
    session.put_json(
        &format!("/dataset/{dataset_id}?override_columns=false"),
        Some(update),
    )?;
    Ok(())
}
