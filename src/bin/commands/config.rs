use anyhow::Result;
use dbready::config::DatabaseFileInfo;
use dbready::{DbreadyConfig, OutputFormat};
use serde::Serialize;

#[derive(Debug, Serialize)]
struct ConfigInfo {
    config_file: String,
    data_dir: String,
    schema_dir: String,
    database: DatabaseFileInfo,
}

pub fn run(config: &DbreadyConfig, output_format: OutputFormat) -> Result<()> {
    let info = ConfigInfo {
        config_file: DbreadyConfig::config_file_path(),
        data_dir: config.data_dir.clone(),
        schema_dir: config.schema_dir.clone(),
        database: config.database_info(),
    };

    match output_format.to_json_string(&info) {
        Some(json) => println!("{}", json?),
        None => println!("{}", config.summary()),
    }
    Ok(())
}
