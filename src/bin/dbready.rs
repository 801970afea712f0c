use clap::{Parser, Subcommand};
use dbready::{DbreadyConfig, OutputFormat};
use tracing::Level;

mod commands;

use commands::history::HistoryArgs;
use commands::migrate::MigrateArgs;

#[derive(Parser)]
#[clap(author, version, about, long_about = None)]
#[clap(propagate_version = true)]
struct Cli {
    /// configuration file path, by default $HOME/.dbready/dbready.toml is used
    #[clap(short, long)]
    config: Option<String>,

    /// Print debug information
    #[clap(long)]
    debug: bool,

    /// Output format: table, markdown, json, json-pretty, json-line, psv
    #[clap(long, global = true, default_value = "table")]
    format: OutputFormat,

    /// SQLite database to bootstrap, overrides the configured path
    #[clap(long, global = true)]
    database: Option<String>,

    /// Schema directory with model.sql and changes/, overrides the configured path
    #[clap(long, global = true)]
    schema_dir: Option<String>,

    #[clap(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show what a bootstrap run would do, without changing the database
    Status,

    /// Bring the database schema up to date
    Migrate(MigrateArgs),

    /// List the changes recorded in the database's history
    History(HistoryArgs),

    /// Show the effective configuration
    Config,
}

fn log_level(debug: bool) -> Level {
    if debug {
        Level::DEBUG
    } else {
        Level::WARN
    }
}

fn main() {
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_max_level(log_level(cli.debug))
        .with_writer(std::io::stderr)
        .init();

    let mut config = match DbreadyConfig::new(&cli.config) {
        Ok(c) => c,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };
    if let Some(database) = cli.database {
        config.database_path = database;
    }
    if let Some(schema_dir) = cli.schema_dir {
        config.schema_dir = schema_dir;
    }

    let result = match cli.command {
        Commands::Status => commands::status::run(&config, cli.format),
        Commands::Migrate(args) => commands::migrate::run(&config, args, cli.format),
        Commands::History(args) => commands::history::run(&config, args, cli.format),
        Commands::Config => commands::config::run(&config, cli.format),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
