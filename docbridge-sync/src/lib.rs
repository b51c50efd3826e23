//! # docbridge-sync
//!
//! Reconciliation engine and idempotent writer.
//!
//! Call [`pipeline::run`] to push every matched dataset's documentation, or
//! use [`merge`] / [`writer::apply`] directly for a single dataset.

pub mod diff;
pub mod error;
pub mod merge;
pub mod pipeline;
pub mod writer;

pub use error::SyncError;
pub use merge::{merge, merge_table};
pub use pipeline::{PushOptions, PushReport};
pub use writer::{ApplyOptions, ApplyOutcome, Cooldown, EntityOutcome, EntityReport, ThreadSleep};
