//! `docbridge diff` — show unified diffs for what push would write.

use anyhow::{Context, Result};
use clap::Args;

use docbridge_sync::{pipeline, EntityOutcome, ThreadSleep};

use super::args::{ApplyFlags, TargetArgs};

/// Arguments for `docbridge diff`.
#[derive(Args, Debug)]
pub struct DiffArgs {
    #[command(flatten)]
    pub target: TargetArgs,
}

impl DiffArgs {
    pub fn run(self) -> Result<()> {
        let resolved = self.target.resolve(ApplyFlags {
            dry_run: true,
            ..ApplyFlags::default()
        })?;
        let mut session = resolved.connect()?;

        let report = pipeline::run(&mut session, &resolved.options, &mut ThreadSleep)
            .context("diff failed")?;

        let mut printed = 0;
        for entity in &report.entities {
            match &entity.outcome {
                EntityOutcome::WouldUpdate { preview: Some(diff) } => {
                    print!("{diff}");
                    if !diff.ends_with('\n') {
                        println!();
                    }
                    printed += 1;
                }
                EntityOutcome::Failed { error, .. } => {
                    eprintln!("could not diff {} (id {}): {error}", entity.key, entity.id);
                }
                _ => {}
            }
        }

        if printed == 0 {
            println!("No differences.");
        }
        Ok(())
    }
}
