//! Flags shared by `push` and `diff`, and their resolution against
//! `docbridge.yaml`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{bail, Context, Result};
use clap::Args;

use docbridge_client::{Credentials, DatasetFilter, Session, UreqTransport};
use docbridge_core::{config::DEFAULT_PAUSE_AFTER_UPDATE_SECS, PushConfig};
use docbridge_sync::{
    pipeline::{api_base_url, PushOptions},
    ApplyOptions,
};

/// Which BI platform to talk to and which datasets and tables to match.
#[derive(Args, Debug, Clone)]
pub struct TargetArgs {
    /// Root URL of the BI platform, e.g. `https://bi.example.com`.
    pub superset_url: Option<String>,

    /// dbt project directory; artifacts are read from `<dir>/target`.
    #[arg(long, default_value = ".")]
    pub project_dir: PathBuf,

    /// Only consider datasets from this BI database id.
    #[arg(long)]
    pub superset_db_id: Option<i64>,

    /// Only consider dbt tables declared in this database.
    #[arg(long)]
    pub dbt_db_name: Option<String>,

    /// Only consider datasets whose `<schema>.<table>` contains this string.
    #[arg(long)]
    pub dataset_filter: Option<String>,

    /// YAML file of fallback column descriptions (`columns.<name>.desc`).
    #[arg(long)]
    pub default_descriptions: Option<PathBuf>,

    #[arg(long, env = "USERNAME", hide_env_values = true)]
    pub username: Option<String>,

    #[arg(long, env = "PASSWORD", hide_env_values = true)]
    pub password: Option<String>,

    /// Config file [default: <project-dir>/docbridge.yaml if present].
    #[arg(long)]
    pub config: Option<PathBuf>,
}

/// Write-cycle flags as given on the command line.
#[derive(Debug, Clone, Copy, Default)]
pub struct ApplyFlags {
    /// `None` leaves the decision to the config file.
    pub refresh_columns: Option<bool>,
    pub pause_after_update_secs: Option<u64>,
    pub dry_run: bool,
}

/// Fully resolved run settings.
#[derive(Debug)]
pub struct Resolved {
    pub api_base_url: String,
    pub credentials: Credentials,
    pub options: PushOptions,
}

impl TargetArgs {
    /// Merge flags (and their env fallbacks) over the config file.
    pub fn resolve(self, flags: ApplyFlags) -> Result<Resolved> {
        let config = self.load_config()?;

        let Some(root) = self.superset_url.or(config.superset_url) else {
            bail!("missing BI platform URL: pass it as an argument or set `superset_url` in the config file");
        };
        let credentials = Credentials::from_parts(
            self.username.or(config.username),
            self.password.or(config.password),
        )?;

        let default_descriptions_path = self.default_descriptions.or_else(|| {
            config
                .default_descriptions_path
                .map(|p| relative_to(&self.project_dir, p))
        });
        let pause_secs = flags
            .pause_after_update_secs
            .or(config.pause_after_update_secs)
            .unwrap_or(DEFAULT_PAUSE_AFTER_UPDATE_SECS);

        let options = PushOptions {
            project_dir: self.project_dir,
            dbt_db_name: self.dbt_db_name.or(config.dbt_db_name),
            filter: DatasetFilter {
                database_id: self.superset_db_id.or(config.superset_db_id),
                key_substring: self.dataset_filter.or(config.dataset_filter),
            },
            default_descriptions_path,
            apply: ApplyOptions {
                refresh_columns: flags
                    .refresh_columns
                    .or(config.refresh_columns)
                    .unwrap_or(false),
                pause: Duration::from_secs(pause_secs),
                dry_run: flags.dry_run,
            },
        };

        Ok(Resolved {
            api_base_url: api_base_url(&root),
            credentials,
            options,
        })
    }

    fn load_config(&self) -> Result<PushConfig> {
        match &self.config {
            Some(path) => PushConfig::load_at(path)
                .with_context(|| format!("failed to load config {}", path.display()))?
                .with_context(|| format!("config file {} does not exist", path.display())),
            None => {
                let path = PushConfig::default_path_at(&self.project_dir);
                let config = PushConfig::load_at(&path)
                    .with_context(|| format!("failed to load config {}", path.display()))?;
                Ok(config.unwrap_or_default())
            }
        }
    }
}

impl Resolved {
    /// Log in with the resolved credentials.
    pub fn connect(&self) -> Result<Session> {
        tracing::info!(url = %self.api_base_url, "logging in");
        Session::connect(
            self.api_base_url.clone(),
            self.credentials.clone(),
            UreqTransport::default(),
        )
        .context("could not log in to the BI platform")
    }
}

fn relative_to(project_dir: &Path, path: PathBuf) -> PathBuf {
    if path.is_absolute() {
        path
    } else {
        project_dir.join(path)
    }
}
