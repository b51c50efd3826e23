//! Idempotent writer.
//!
//! ## Per-dataset protocol
//!
//! 1. Optionally trigger a column refresh, then pause.
//! 2. Re-read description, owners and columns.
//! 3. Merge with the source table.
//! 4. Compare merged vs. current state → skip if identical.
//! 5. Write once, then pause.
//!
//! Any client error in steps 1–5 is logged with the dataset id and recorded
//! as [`EntityOutcome::Failed`]; it never aborts the batch.

use std::time::Duration;

use serde::Serialize;

use docbridge_client::{
    datasets::{fetch_detail, refresh_columns, update_dataset, DatasetUpdate},
    ClientError, Session,
};
use docbridge_core::{DatasetKey, DefaultDescriptions, ReconciledDelta, SourceTable, TargetEntity};

use crate::diff;
use crate::merge::merge_table;

// ---------------------------------------------------------------------------
// Options and outcomes
// ---------------------------------------------------------------------------

/// Knobs for a single dataset's write cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApplyOptions {
    /// Re-introspect columns before reading them.
    pub refresh_columns: bool,
    /// Cooldown after any remote update.
    pub pause: Duration,
    /// Compute everything, write nothing.
    pub dry_run: bool,
}

impl Default for ApplyOptions {
    fn default() -> Self {
        Self {
            refresh_columns: false,
            pause: Duration::from_secs(docbridge_core::config::DEFAULT_PAUSE_AFTER_UPDATE_SECS),
            dry_run: false,
        }
    }
}

/// Result of comparing and possibly writing one delta.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The update call was issued.
    Updated,
    /// Merged state equals current state; no call issued.
    Unchanged,
    /// `--dry-run`: the update *would* have been issued.
    WouldUpdate,
}

/// What happened to one dataset during a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum EntityOutcome {
    Updated,
    Unchanged,
    WouldUpdate {
        #[serde(skip_serializing_if = "Option::is_none")]
        preview: Option<String>,
    },
    Failed {
        #[serde(skip_serializing_if = "Option::is_none")]
        status: Option<u16>,
        error: String,
    },
}

/// Per-dataset line of the run report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntityReport {
    pub id: i64,
    pub key: DatasetKey,
    pub outcome: EntityOutcome,
}

// ---------------------------------------------------------------------------
// Cooldown
// ---------------------------------------------------------------------------

/// Read-after-write courtesy delay, applied after every remote update.
pub trait Cooldown {
    fn pause(&mut self, duration: Duration);
}

/// Blocks the current thread.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadSleep;

impl Cooldown for ThreadSleep {
    fn pause(&mut self, duration: Duration) {
        if duration.is_zero() {
            return;
        }
        tracing::info!(
            "pausing for {} seconds to allow databases to catch up with the update",
            duration.as_secs_f64()
        );
        std::thread::sleep(duration);
        tracing::info!("resuming");
    }
}

// ---------------------------------------------------------------------------
// prepare / apply
// ---------------------------------------------------------------------------

/// Steps 1–2: optional column refresh, then reload the mutable fields of
/// `target` from the remote.
///
/// The refresh is skipped in dry-run mode since it mutates remote state.
pub fn prepare(
    session: &mut Session,
    target: &mut TargetEntity,
    options: &ApplyOptions,
    cooldown: &mut dyn Cooldown,
) -> Result<(), ClientError> {
    if options.refresh_columns && !options.dry_run {
        refresh_columns(session, target.id)?;
        cooldown.pause(options.pause);
    }
    let detail = fetch_detail(session, target.id)?;
    target.refresh_details(detail);
    Ok(())
}

/// Steps 4–5: write `delta` only if it differs from `target`'s current state.
pub fn apply(
    session: &mut Session,
    target: &TargetEntity,
    delta: &ReconciledDelta,
    options: &ApplyOptions,
    cooldown: &mut dyn Cooldown,
) -> Result<ApplyOutcome, ClientError> {
    if delta.matches(target) {
        tracing::info!(key = %target.key, "skipping update as nothing would change");
        return Ok(ApplyOutcome::Unchanged);
    }
    if options.dry_run {
        tracing::info!(key = %target.key, "[dry-run] would update descriptions");
        return Ok(ApplyOutcome::WouldUpdate);
    }

    tracing::info!(key = %target.key, "adding new descriptions");
    update_dataset(session, target.id, &DatasetUpdate::from(delta))?;
    cooldown.pause(options.pause);
    Ok(ApplyOutcome::Updated)
}

/// Full write cycle for one dataset with failure isolation.
pub fn sync_entity(
    session: &mut Session,
    mut target: TargetEntity,
    source: &SourceTable,
    defaults: &DefaultDescriptions,
    options: &ApplyOptions,
    cooldown: &mut dyn Cooldown,
) -> EntityReport {
    let outcome = match try_sync_entity(session, &mut target, source, defaults, options, cooldown) {
        Ok(outcome) => outcome,
        Err(err) => {
            tracing::error!(
                dataset_id = target.id,
                key = %target.key,
                "the dataset wasn't updated: {err}"
            );
            EntityOutcome::Failed {
                status: err.status(),
                error: err.to_string(),
            }
        }
    };
    EntityReport {
        id: target.id,
        key: target.key,
        outcome,
    }
}

fn try_sync_entity(
    session: &mut Session,
    target: &mut TargetEntity,
    source: &SourceTable,
    defaults: &DefaultDescriptions,
    options: &ApplyOptions,
    cooldown: &mut dyn Cooldown,
) -> Result<EntityOutcome, ClientError> {
    prepare(session, target, options, cooldown)?;
    let delta = merge_table(target, source, defaults);
    Ok(match apply(session, target, &delta, options, cooldown)? {
        ApplyOutcome::Updated => EntityOutcome::Updated,
        ApplyOutcome::Unchanged => EntityOutcome::Unchanged,
        ApplyOutcome::WouldUpdate => EntityOutcome::WouldUpdate {
            preview: diff::preview(target, &delta),
        },
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use docbridge_client::{
        http::{mock::MockTransport, HttpMethod},
        Credentials,
    };
    use docbridge_core::SourceColumn;
    use serde_json::{json, Value};

    use super::*;

    const BASE: &str = "https://bi.example.com/api/v1";

    #[derive(Default)]
    struct RecordingCooldown(Vec<Duration>);

    impl Cooldown for RecordingCooldown {
        fn pause(&mut self, duration: Duration) {
            self.0.push(duration);
        }
    }

    fn session(transport: &MockTransport) -> Session {
        transport.push_json(
            HttpMethod::Post,
            format!("{BASE}/security/login"),
            200,
            json!({"access_token": "a", "refresh_token": "r"}),
        );
        Session::connect(BASE, Credentials::new("admin", "secret"), transport.clone())
            .expect("login")
    }

    fn detail(description: &str, column_description: &str) -> Value {
        json!({
            "result": {
                "description": description,
                "owners": [{ "id": 1 }],
                "columns": [
                    { "id": 1, "column_name": "amount", "description": column_description, "expression": "" },
                ],
            }
        })
    }

    fn source(description: &str, column_description: &str) -> SourceTable {
        SourceTable {
            key: DatasetKey::from("sales.orders"),
            description: Some(description.to_string()),
            columns: BTreeMap::from([(
                "amount".to_string(),
                SourceColumn {
                    description: Some(column_description.to_string()),
                },
            )]),
        }
    }

    fn listed() -> TargetEntity {
        TargetEntity::listed(7, DatasetKey::from("sales.orders"))
    }

    fn options(pause_secs: u64) -> ApplyOptions {
        ApplyOptions {
            refresh_columns: false,
            pause: Duration::from_secs(pause_secs),
            dry_run: false,
        }
    }

    #[test]
    fn changed_state_writes_once_and_pauses() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        transport.push_json(HttpMethod::Get, format!("{BASE}/dataset/7"), 200, detail("old", ""));
        transport.push_json(
            HttpMethod::Put,
            format!("{BASE}/dataset/7?override_columns=false"),
            200,
            json!({"id": 7}),
        );
        let mut cooldown = RecordingCooldown::default();

        let report = sync_entity(
            &mut session,
            listed(),
            &source("**Orders** table", "Order amount"),
            &DefaultDescriptions::default(),
            &options(2),
            &mut cooldown,
        );
        assert_eq!(report.outcome, EntityOutcome::Updated);
        assert_eq!(cooldown.0, vec![Duration::from_secs(2)]);

        let puts = transport.requests_to(HttpMethod::Put, "?override_columns=false");
        assert_eq!(puts.len(), 1);
        let body: Value = serde_json::from_slice(&puts[0].body).expect("json");
        assert_eq!(body["description"], "Orders table");
        assert_eq!(body["columns"][0]["description"], "Order amount");
        assert_eq!(body["owners"], json!([1]));
    }

    #[test]
    fn unchanged_state_issues_no_write_and_no_pause() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        transport.push_json(HttpMethod::Get, format!("{BASE}/dataset/7"), 200, detail("old", ""));
        let mut cooldown = RecordingCooldown::default();

        let report = sync_entity(
            &mut session,
            listed(),
            &source("old", ""),
            &DefaultDescriptions::default(),
            &options(2),
            &mut cooldown,
        );
        assert_eq!(report.outcome, EntityOutcome::Unchanged);
        assert!(cooldown.0.is_empty());
        assert!(transport.requests_to(HttpMethod::Put, "").is_empty());
    }

    #[test]
    fn second_run_after_write_is_a_no_op() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        transport.push_json(HttpMethod::Get, format!("{BASE}/dataset/7"), 200, detail("old", ""));
        transport.push_json(
            HttpMethod::Put,
            format!("{BASE}/dataset/7?override_columns=false"),
            200,
            json!({"id": 7}),
        );
        // The remote now reflects the first write.
        transport.push_json(
            HttpMethod::Get,
            format!("{BASE}/dataset/7"),
            200,
            detail("Orders table", "Order amount"),
        );
        let table = source("**Orders** table", "Order amount");
        let mut cooldown = RecordingCooldown::default();

        let first = sync_entity(&mut session, listed(), &table, &DefaultDescriptions::default(), &options(0), &mut cooldown);
        let second = sync_entity(&mut session, listed(), &table, &DefaultDescriptions::default(), &options(0), &mut cooldown);

        assert_eq!(first.outcome, EntityOutcome::Updated);
        assert_eq!(second.outcome, EntityOutcome::Unchanged);
        assert_eq!(transport.requests_to(HttpMethod::Put, "?override_columns=false").len(), 1);
    }

    #[test]
    fn refresh_precedes_read_and_is_followed_by_pause() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        transport.push_json(HttpMethod::Put, format!("{BASE}/dataset/7/refresh"), 200, json!({"message": "OK"}));
        transport.push_json(HttpMethod::Get, format!("{BASE}/dataset/7"), 200, detail("old", ""));
        let mut cooldown = RecordingCooldown::default();
        let mut opts = options(3);
        opts.refresh_columns = true;

        let report = sync_entity(&mut session, listed(), &source("old", ""), &DefaultDescriptions::default(), &opts, &mut cooldown);
        assert_eq!(report.outcome, EntityOutcome::Unchanged);
        assert_eq!(cooldown.0, vec![Duration::from_secs(3)]);

        let urls: Vec<_> = transport.requests().into_iter().skip(1).map(|r| r.url).collect();
        assert_eq!(
            urls,
            vec![format!("{BASE}/dataset/7/refresh"), format!("{BASE}/dataset/7")]
        );
    }

    #[test]
    fn dry_run_skips_refresh_and_write_but_reports_preview() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        transport.push_json(HttpMethod::Get, format!("{BASE}/dataset/7"), 200, detail("old", ""));
        let mut cooldown = RecordingCooldown::default();
        let opts = ApplyOptions {
            refresh_columns: true,
            pause: Duration::from_secs(2),
            dry_run: true,
        };

        let report = sync_entity(&mut session, listed(), &source("new", ""), &DefaultDescriptions::default(), &opts, &mut cooldown);
        match report.outcome {
            EntityOutcome::WouldUpdate { preview: Some(preview) } => {
                assert!(preview.contains("+description: new"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(cooldown.0.is_empty());
        assert!(transport.requests_to(HttpMethod::Put, "").is_empty());
    }

    #[test]
    fn http_failure_is_recorded_not_raised() {
        let transport = MockTransport::new();
        let mut session = session(&transport);
        transport.push_json(HttpMethod::Get, format!("{BASE}/dataset/7"), 200, detail("old", ""));
        transport.push_json(
            HttpMethod::Put,
            format!("{BASE}/dataset/7?override_columns=false"),
            422,
            json!({"message": {"columns": ["invalid"]}}),
        );
        let mut cooldown = RecordingCooldown::default();

        let report = sync_entity(&mut session, listed(), &source("new", ""), &DefaultDescriptions::default(), &options(2), &mut cooldown);
        assert_eq!(report.id, 7);
        match report.outcome {
            EntityOutcome::Failed { status, error } => {
                assert_eq!(status, Some(422));
                assert!(error.contains("invalid"));
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        assert!(cooldown.0.is_empty(), "no pause after a failed write");
    }

    #[test]
    fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(EntityOutcome::Failed {
            status: Some(500),
            error: "boom".to_string(),
        })
        .expect("serialize");
        assert_eq!(json, json!({"outcome": "failed", "status": 500, "error": "boom"}));

        let json = serde_json::to_value(EntityOutcome::Unchanged).expect("serialize");
        assert_eq!(json, json!({"outcome": "unchanged"}));
    }
}
