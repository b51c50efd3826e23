//! Error types for docbridge-sync.

use thiserror::Error;

use docbridge_client::ClientError;
use docbridge_core::SourceError;

/// Errors that abort a whole push run.
///
/// Per-dataset failures never appear here; they are recorded as
/// [`crate::EntityOutcome::Failed`] and the batch moves on.
#[derive(Debug, Error)]
pub enum SyncError {
    /// Loading the build artifacts or defaults failed.
    #[error("source error: {0}")]
    Source(#[from] SourceError),

    /// Authentication, listing or another remote call outside the per-dataset loop failed.
    #[error("client error: {0}")]
    Client(#[from] ClientError),

    /// Neither side is empty, but no key appears on both.
    #[error(
        "none of the {datasets} BI datasets matches one of the {tables} dbt tables; \
         check `--dbt-db-name`, `--superset-db-id` and `--dataset-filter`"
    )]
    NoMatches { datasets: usize, tables: usize },
}

impl SyncError {
    /// True for configuration problems (credentials, ambiguous or empty
    /// matching); false for remote failures that may succeed on re-run.
    pub fn is_fatal(&self) -> bool {
        match self {
            SyncError::Source(_) | SyncError::NoMatches { .. } => true,
            SyncError::Client(e) => matches!(
                e,
                ClientError::MissingCredentials
                    | ClientError::Authentication(_)
                    | ClientError::DuplicateKey { .. }
                    | ClientError::NoData { .. }
            ),
        }
    }
}
