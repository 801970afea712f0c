use anyhow::{anyhow, Result};
use config::Config;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};

pub struct DbreadyConfig {
    /// Directory holding dbready's data (default database location)
    pub data_dir: String,

    /// Path to the SQLite database to bootstrap
    pub database_path: String,

    /// Directory holding `model.sql` and `changes/*.sql`
    pub schema_dir: String,
}

const EMPTY_CONFIG: &str = r#"### dbready configuration file

### directory for data used by dbready
# data_dir = "~/.dbready"

### SQLite database to bootstrap (default: <data_dir>/dbready.sqlite3)
# database_path = "/var/lib/app/app.sqlite3"

### schema directory containing model.sql and changes/*.sql
# schema_dir = "./schema"
"#;

const DATABASE_FILE_NAME: &str = "dbready.sqlite3";

impl Default for DbreadyConfig {
    fn default() -> Self {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| ".".to_string());
        let data_dir = format!("{}/.dbready", home_dir);

        Self {
            database_path: format!("{}/{}", data_dir, DATABASE_FILE_NAME),
            data_dir,
            schema_dir: "./schema".to_string(),
        }
    }
}

impl DbreadyConfig {
    /// Function to create and initialize a new configuration
    ///
    /// Without an explicit path, `$HOME/.dbready/dbready.toml` is used and
    /// created with commented defaults when missing.
    pub fn new(path: &Option<String>) -> Result<DbreadyConfig> {
        let config_file = match path {
            Some(p) => PathBuf::from(p),
            None => {
                let dbready_dir = Path::new(&Self::config_file_path())
                    .parent()
                    .map(Path::to_path_buf)
                    .ok_or_else(|| anyhow!("Could not determine config directory"))?;
                std::fs::create_dir_all(&dbready_dir)
                    .map_err(|e| anyhow!("Unable to create dbready directory: {}", e))?;
                PathBuf::from(Self::config_file_path())
            }
        };

        if !config_file.exists() {
            std::fs::write(&config_file, EMPTY_CONFIG).map_err(|e| {
                anyhow!(
                    "Unable to create config file {}: {}",
                    config_file.display(),
                    e
                )
            })?;
        }

        Self::load(&config_file)
    }

    /// Load configuration from a TOML file layered under `DBREADY_*` variables
    ///
    /// E.g., `DBREADY_DATABASE_PATH=/tmp/app.sqlite3 dbready migrate` overrides
    /// the database path from the file.
    pub fn load(config_file: &Path) -> Result<DbreadyConfig> {
        Self::load_with_env(config_file, None)
    }

    fn load_with_env(
        config_file: &Path,
        env: Option<HashMap<String, String>>,
    ) -> Result<DbreadyConfig> {
        let path_str = config_file
            .to_str()
            .ok_or_else(|| anyhow!("Could not convert path to string"))?;

        let settings = Config::builder()
            .add_source(config::File::new(path_str, config::FileFormat::Toml).required(false))
            .add_source(config::Environment::with_prefix("DBREADY").source(env))
            .build()
            .map_err(|e| anyhow!("Failed to build configuration: {}", e))?;

        let config = settings
            .try_deserialize::<HashMap<String, String>>()
            .map_err(|e| anyhow!("Failed to deserialize configuration: {}", e))?;

        let defaults = DbreadyConfig::default();

        let data_dir = match config.get("data_dir") {
            Some(p) => expand_home(p),
            None => defaults.data_dir,
        };

        let database_path = match config.get("database_path") {
            Some(p) => expand_home(p),
            None => format!("{}/{}", data_dir.trim_end_matches('/'), DATABASE_FILE_NAME),
        };

        let schema_dir = config
            .get("schema_dir")
            .map(|p| expand_home(p))
            .unwrap_or(defaults.schema_dir);

        Ok(DbreadyConfig {
            data_dir,
            database_path,
            schema_dir,
        })
    }

    /// Display configuration summary
    pub fn summary(&self) -> String {
        let db = self.database_info();
        let mut lines = vec![
            format!("Config File:        {}", Self::config_file_path()),
            format!("Data Directory:     {}", self.data_dir),
            format!("Database Path:      {}", self.database_path),
            format!("Schema Directory:   {}", self.schema_dir),
        ];

        match db.size_bytes {
            Some(size) => lines.push(format!("Database Size:      {}", format_size(size))),
            None => lines.push("Database Size:      (not created)".to_string()),
        }

        lines.join("\n")
    }

    /// Get the config file path
    pub fn config_file_path() -> String {
        let home_dir = dirs::home_dir()
            .map(|h| h.to_string_lossy().to_string())
            .unwrap_or_else(|| "~".to_string());
        format!("{}/.dbready/dbready.toml", home_dir)
    }

    /// Information about the configured database file
    pub fn database_info(&self) -> DatabaseFileInfo {
        let path = Path::new(&self.database_path);
        let size_bytes = std::fs::metadata(path).ok().map(|m| m.len());
        DatabaseFileInfo {
            path: self.database_path.clone(),
            exists: path.exists(),
            size_bytes,
        }
    }
}

/// Information about the SQLite database file
#[derive(Debug, Serialize, Clone)]
pub struct DatabaseFileInfo {
    pub path: String,
    pub exists: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub size_bytes: Option<u64>,
}

fn expand_home(path: &str) -> String {
    match (path.strip_prefix("~/"), dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest).to_string_lossy().to_string(),
        _ => path.to_string(),
    }
}

/// Format bytes as human-readable size
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} B", bytes)
    }
}
