//! `docbridge push` — reconcile and write dataset descriptions.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tabled::{settings::Style, Table, Tabled};

use docbridge_sync::{pipeline, EntityOutcome, PushReport, ThreadSleep};

use super::args::{ApplyFlags, TargetArgs};

/// Arguments for `docbridge push`.
#[derive(Args, Debug)]
pub struct PushArgs {
    #[command(flatten)]
    pub target: TargetArgs,

    /// Refresh each dataset's columns from the database before merging.
    #[arg(long, overrides_with = "no_refresh_columns")]
    pub refresh_columns: bool,

    /// Skip the column refresh even if the config file enables it.
    #[arg(long, overrides_with = "refresh_columns")]
    pub no_refresh_columns: bool,

    /// Seconds to wait after every remote update [default: 2].
    #[arg(long = "pause-after-update", value_name = "SECONDS")]
    pub pause_after_update: Option<u64>,

    /// Read and merge, but issue no refresh or update calls.
    #[arg(long)]
    pub dry_run: bool,

    /// Emit the run report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl PushArgs {
    pub fn run(self) -> Result<()> {
        let resolved = self.target.resolve(ApplyFlags {
            refresh_columns: refresh_columns_flag(self.refresh_columns, self.no_refresh_columns),
            pause_after_update_secs: self.pause_after_update,
            dry_run: self.dry_run,
        })?;
        let mut session = resolved.connect()?;

        let report = pipeline::run(&mut session, &resolved.options, &mut ThreadSleep)
            .context("push failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize report JSON")?
            );
            return Ok(());
        }
        print_table(&report);
        Ok(())
    }
}

/// `None` when neither switch was given, so the config file decides.
fn refresh_columns_flag(refresh: bool, no_refresh: bool) -> Option<bool> {
    match (refresh, no_refresh) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

#[derive(Tabled)]
struct ReportRow {
    #[tabled(rename = "id")]
    id: i64,
    #[tabled(rename = "dataset")]
    dataset: String,
    #[tabled(rename = "outcome")]
    outcome: String,
    #[tabled(rename = "detail")]
    detail: String,
}

fn print_table(report: &PushReport) {
    println!(
        "docbridge v{} | {} datasets | {} dbt tables | {} matched",
        env!("CARGO_PKG_VERSION"),
        report.datasets_total,
        report.tables_total,
        report.matched,
    );

    let rows: Vec<ReportRow> = report
        .entities
        .iter()
        .map(|entity| {
            let (outcome, detail) = describe(&entity.outcome);
            ReportRow {
                id: entity.id,
                dataset: entity.key.to_string(),
                outcome,
                detail,
            }
        })
        .collect();
    let mut table = Table::new(rows);
    table.with(Style::rounded());
    println!("{table}");

    println!(
        "{} updated, {} unchanged, {} would update, {} failed",
        report.updated().to_string().green().bold(),
        report.unchanged(),
        report.would_update().to_string().yellow().bold(),
        report.failed().to_string().red().bold(),
    );
    if report.manifest_enriched {
        println!("Default descriptions were written back to the dbt manifest.");
    }
}

fn describe(outcome: &EntityOutcome) -> (String, String) {
    match outcome {
        EntityOutcome::Updated => ("UPDATED".green().to_string(), String::new()),
        EntityOutcome::Unchanged => ("UNCHANGED".bright_black().to_string(), String::new()),
        EntityOutcome::WouldUpdate { .. } => (
            "WOULD UPDATE".yellow().to_string(),
            "run `docbridge diff` for details".to_string(),
        ),
        EntityOutcome::Failed { status, error } => {
            let label = match status {
                Some(code) => format!("FAILED ({code})"),
                None => "FAILED".to_string(),
            };
            (label.red().bold().to_string(), error.clone())
        }
    }
}

#[cfg(test)]
mod tests {
    use clap::Parser;

    use super::*;

    #[derive(Parser)]
    struct Harness {
        #[command(flatten)]
        push: PushArgs,
    }

    fn refresh_flag(args: &[&str]) -> Option<bool> {
        let parsed = Harness::try_parse_from(std::iter::once("push").chain(args.iter().copied()))
            .expect("parse");
        refresh_columns_flag(parsed.push.refresh_columns, parsed.push.no_refresh_columns)
    }

    #[test]
    fn refresh_switches_resolve_last_one_wins() {
        assert_eq!(refresh_flag(&[]), None);
        assert_eq!(refresh_flag(&["--refresh-columns"]), Some(true));
        assert_eq!(refresh_flag(&["--no-refresh-columns"]), Some(false));
        assert_eq!(
            refresh_flag(&["--refresh-columns", "--no-refresh-columns"]),
            Some(false)
        );
    }
}
