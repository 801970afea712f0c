use anyhow::Result;
use clap::Args;
use dbready::{
    migrate_database, BootstrapHost, BootstrapPlan, Bootstrapper, DbreadyConfig, OutputFormat,
};
use serde::Serialize;
use std::time::Instant;

use super::{print_plan, CliHost};

/// Arguments for the Migrate command
#[derive(Args)]
pub struct MigrateArgs {
    /// Only show the plan, do not touch the database
    #[clap(long)]
    pub dry_run: bool,
}

#[derive(Debug, Serialize)]
struct MigrateOutput {
    dry_run: bool,
    before: BootstrapPlan,
    #[serde(skip_serializing_if = "Option::is_none")]
    after: Option<BootstrapPlan>,
    #[serde(skip_serializing_if = "Option::is_none")]
    elapsed_ms: Option<u128>,
}

pub fn run(config: &DbreadyConfig, args: MigrateArgs, output_format: OutputFormat) -> Result<()> {
    let MigrateArgs { dry_run } = args;

    let host = CliHost::from_config(config)?;
    let before = Bootstrapper::new(None).plan(host.store_factory())?;

    let (after, elapsed_ms) = if dry_run {
        (None, None)
    } else {
        let start = Instant::now();
        let host = migrate_database(host)?;
        let elapsed = start.elapsed().as_millis();
        let after = Bootstrapper::new(host.logger()).plan(host.store_factory())?;
        (Some(after), Some(elapsed))
    };

    let output = MigrateOutput {
        dry_run,
        before,
        after,
        elapsed_ms,
    };

    if let Some(json) = output_format.to_json_string(&output) {
        println!("{}", json?);
        return Ok(());
    }

    print_plan("Before", &output.before);
    if let (Some(after), Some(elapsed)) = (&output.after, output.elapsed_ms) {
        println!();
        print_plan("After", after);
        println!();
        println!("Done in {} ms", elapsed);
    } else {
        eprintln!();
        eprintln!("Dry run, database left untouched.");
    }
    Ok(())
}
