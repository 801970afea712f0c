pub mod config;
pub mod history;
pub mod migrate;
pub mod status;

use anyhow::Result;
use dbready::{
    BootstrapHost, BootstrapLogger, BootstrapPlan, DbreadyConfig, SchemaModel,
    SqliteStoreFactory, TracingLogger,
};

/// The CLI acting as the host application
pub(crate) struct CliHost {
    factory: SqliteStoreFactory,
}

impl CliHost {
    pub(crate) fn from_config(config: &DbreadyConfig) -> Result<Self> {
        let model = SchemaModel::from_dir(&config.schema_dir)?;
        Ok(Self {
            factory: SqliteStoreFactory::new(&config.database_path, model),
        })
    }
}

impl BootstrapHost for CliHost {
    type Factory = SqliteStoreFactory;

    fn store_factory(&self) -> &SqliteStoreFactory {
        &self.factory
    }

    fn logger(&self) -> Option<&dyn BootstrapLogger> {
        Some(&TracingLogger)
    }
}

pub(crate) fn print_plan(title: &str, plan: &BootstrapPlan) {
    println!("{}", title);
    println!("{}\n", "=".repeat(title.len()));
    println!(
        "  Reachable:      {}",
        if plan.observation.can_connect {
            "yes"
        } else {
            "no"
        }
    );
    println!("  Applied:        {}", plan.observation.applied.len());
    println!("  Pending:        {}", plan.observation.pending.len());
    for change in &plan.observation.pending {
        println!("    - {}", change);
    }
    println!("  Decision:       {}", plan.decision);
    println!("  Action:         {}", plan.action);
}
