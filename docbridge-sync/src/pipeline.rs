//! Push pipeline: list → load → match → per-dataset write.
//!
//! Datasets are processed sequentially in listing order; each one's write
//! cycle finishes (or fails and is logged) before the next begins.

use std::path::PathBuf;

use serde::Serialize;

use docbridge_client::{fetch_entities, DatasetFilter, Session};
use docbridge_core::{
    load_tables,
    manifest::{catalog_path_at, manifest_path_at},
    Catalog, DefaultDescriptions, Manifest,
};

use crate::error::SyncError;
use crate::writer::{sync_entity, ApplyOptions, Cooldown, EntityOutcome, EntityReport};

/// Appended to the BI platform root URL to form the API base.
pub const API_PATH: &str = "/api/v1";

/// `https://bi.example.com/` → `https://bi.example.com/api/v1`.
pub fn api_base_url(root: &str) -> String {
    format!("{}{API_PATH}", root.trim_end_matches('/'))
}

/// Everything a push run needs besides the session.
#[derive(Debug, Clone)]
pub struct PushOptions {
    /// Root of the dbt project; artifacts live in `<project_dir>/target`.
    pub project_dir: PathBuf,
    /// Keep only source tables declared in this database.
    pub dbt_db_name: Option<String>,
    pub filter: DatasetFilter,
    pub default_descriptions_path: Option<PathBuf>,
    pub apply: ApplyOptions,
}

/// Outcome of a whole run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PushReport {
    /// Datasets returned by the listing after filtering.
    pub datasets_total: usize,
    /// Source tables loaded from the manifest.
    pub tables_total: usize,
    /// Datasets whose key has a source table.
    pub matched: usize,
    /// Whether default descriptions were written into the manifest.
    pub manifest_enriched: bool,
    pub entities: Vec<EntityReport>,
}

impl PushReport {
    pub fn updated(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Updated))
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Unchanged))
    }

    pub fn would_update(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::WouldUpdate { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|o| matches!(o, EntityOutcome::Failed { .. }))
    }

    fn count(&self, pred: impl Fn(&EntityOutcome) -> bool) -> usize {
        self.entities.iter().filter(|e| pred(&e.outcome)).count()
    }
}

/// Run a full push against an authenticated `session`.
///
/// Returns `Err` only for fatal conditions; per-dataset failures are
/// reported in [`PushReport::entities`].
pub fn run(
    session: &mut Session,
    options: &PushOptions,
    cooldown: &mut dyn Cooldown,
) -> Result<PushReport, SyncError> {
    let targets = fetch_entities(session, &options.filter)?;

    let defaults = DefaultDescriptions::load_optional(options.default_descriptions_path.as_deref())?;
    let mut manifest = Manifest::load_at(&manifest_path_at(&options.project_dir))?;
    let catalog = if defaults.is_empty() {
        None
    } else {
        Some(Catalog::load_at(&catalog_path_at(&options.project_dir))?)
    };

    tracing::info!("getting schemas, tables, columns and descriptions from dbt");
    let tables = load_tables(
        &mut manifest,
        catalog.as_ref(),
        &defaults,
        options.dbt_db_name.as_deref(),
    )?;
    let manifest_enriched = manifest.is_modified() && !options.apply.dry_run;

    if manifest.is_modified() {
        if options.apply.dry_run {
            tracing::info!(
                path = %manifest.path().display(),
                "[dry-run] not writing default descriptions back to manifest"
            );
        } else {
            manifest.save()?;
            tracing::info!(path = %manifest.path().display(), "wrote enriched manifest");
        }
    }
    tracing::info!("there are {} tables in dbt", tables.len());

    let datasets_total = targets.len();
    let matched: Vec<_> = targets
        .into_iter()
        .filter(|t| tables.contains_key(&t.key))
        .collect();
    tracing::info!(
        "there are {} physical datasets with matching tables in dbt",
        matched.len()
    );
    if matched.is_empty() {
        return Err(SyncError::NoMatches {
            datasets: datasets_total,
            tables: tables.len(),
        });
    }

    let mut report = PushReport {
        datasets_total,
        tables_total: tables.len(),
        matched: matched.len(),
        manifest_enriched,
        entities: Vec::with_capacity(matched.len()),
    };

    let total = matched.len();
    for (i, target) in matched.into_iter().enumerate() {
        tracing::info!(
            "processing dataset {}/{total}: {} (id {})",
            i + 1,
            target.key,
            target.id
        );
        // Present by construction of `matched`.
        let Some(source) = tables.get(&target.key) else {
            continue;
        };
        let entity = sync_entity(session, target, source, &defaults, &options.apply, cooldown);
        report.entities.push(entity);
    }

    tracing::info!(
        updated = report.updated(),
        unchanged = report.unchanged(),
        would_update = report.would_update(),
        failed = report.failed(),
        "push finished"
    );
    Ok(report)
}
