use anyhow::Result;
use clap::Args;
use dbready::{BootstrapHost, DbreadyConfig, HistoryEntry, OutputFormat, StoreFactory};
use tabled::settings::Style;
use tabled::{Table, Tabled};

use super::CliHost;

/// Arguments for the History command
#[derive(Args)]
pub struct HistoryArgs {
    /// Only show the last N entries
    #[clap(short = 'n', long)]
    pub limit: Option<usize>,
}

#[derive(Tabled)]
struct HistoryRow {
    change_id: String,
    origin: String,
    applied_at: String,
}

impl From<&HistoryEntry> for HistoryRow {
    fn from(entry: &HistoryEntry) -> Self {
        Self {
            change_id: entry.change_id.to_string(),
            origin: entry.origin.to_string(),
            applied_at: entry.applied_at.to_rfc3339(),
        }
    }
}

pub fn run(config: &DbreadyConfig, args: HistoryArgs, output_format: OutputFormat) -> Result<()> {
    let host = CliHost::from_config(config)?;
    let mut store = host.store_factory().open_scope()?;
    let mut entries = store.history()?;

    if let Some(limit) = args.limit {
        let skip = entries.len().saturating_sub(limit);
        entries = entries.split_off(skip);
    }

    match output_format {
        OutputFormat::JsonLine => {
            for entry in &entries {
                println!("{}", serde_json::to_string(entry)?);
            }
        }
        OutputFormat::Json => println!("{}", serde_json::to_string(&entries)?),
        OutputFormat::JsonPretty => println!("{}", serde_json::to_string_pretty(&entries)?),
        OutputFormat::Psv => {
            println!("change_id|origin|applied_at");
            for row in entries.iter().map(HistoryRow::from) {
                println!("{}|{}|{}", row.change_id, row.origin, row.applied_at);
            }
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            if entries.is_empty() {
                eprintln!("No changes recorded in {}", config.database_path);
                return Ok(());
            }
            let rows: Vec<HistoryRow> = entries.iter().map(HistoryRow::from).collect();
            let table = match output_format {
                OutputFormat::Markdown => Table::new(rows).with(Style::markdown()).to_string(),
                _ => Table::new(rows).with(Style::rounded()).to_string(),
            };
            println!("{}", table);
        }
    }
    Ok(())
}
