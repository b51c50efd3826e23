//! docbridge core library — domain types, source metadata loading, errors.
//!
//! Public API surface:
//! - [`types`] — newtypes and domain structs shared by every crate
//! - [`error`] — [`SourceError`]
//! - [`manifest`] — build-manifest / catalog loading and the default overlay
//! - [`defaults`] — default column descriptions
//! - [`config`] — optional YAML run configuration

pub mod config;
pub mod defaults;
pub mod error;
pub mod manifest;
pub mod types;

pub use config::PushConfig;
pub use defaults::DefaultDescriptions;
pub use error::SourceError;
pub use manifest::{load_tables, Catalog, Manifest, SourceTables};
pub use types::{
    Column, ColumnUpdate, DatasetDetail, DatasetKey, Owner, ReconciledDelta, SourceColumn,
    SourceTable, TargetEntity,
};
