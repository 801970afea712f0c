use anyhow::Result;
use dbready::config::DatabaseFileInfo;
use dbready::{BootstrapHost, BootstrapPlan, Bootstrapper, DbreadyConfig, OutputFormat};
use serde::Serialize;

use super::{print_plan, CliHost};

#[derive(Debug, Serialize)]
struct StatusOutput {
    database: DatabaseFileInfo,
    schema_dir: String,
    #[serde(flatten)]
    plan: BootstrapPlan,
}

pub fn run(config: &DbreadyConfig, output_format: OutputFormat) -> Result<()> {
    let host = CliHost::from_config(config)?;
    let plan = Bootstrapper::new(host.logger()).plan(host.store_factory())?;

    let output = StatusOutput {
        database: config.database_info(),
        schema_dir: config.schema_dir.clone(),
        plan,
    };

    if let Some(json) = output_format.to_json_string(&output) {
        println!("{}", json?);
        return Ok(());
    }

    println!("Database: {}", output.database.path);
    println!("Schema:   {}\n", output.schema_dir);
    print_plan("Bootstrap Status", &output.plan);

    if output.plan.action.is_mutating() {
        eprintln!();
        eprintln!("Run `dbready migrate` to apply.");
    }
    Ok(())
}
