use clap::ValueEnum;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Configuration as stored in TOML files (with optional fields for merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawAttainmentConfig {
    #[serde(default)]
    pub database: RawDatabaseConfig,

    #[serde(default)]
    pub report: RawReportConfig,
}

/// Database config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawDatabaseConfig {
    /// Local database file
    pub path: Option<PathBuf>,

    /// Remote Turso database URL
    pub url: Option<String>,

    /// Auth token for the remote database
    pub auth_token: Option<String>,
}

/// Report config as stored in TOML (optional fields for proper merging)
#[derive(Debug, Clone, Deserialize, Default)]
pub struct RawReportConfig {
    pub format: Option<ReportFormat>,
    pub output: Option<PathBuf>,
    pub persist: Option<bool>,
}

/// Final configuration with defaults applied
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AttainmentConfig {
    #[serde(default)]
    pub database: DatabaseConfig,

    #[serde(default)]
    pub report: ReportConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// Local database file, used when no `url` is set
    pub path: PathBuf,

    /// Remote Turso database URL
    #[serde(skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,

    /// Auth token for the remote database
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_token: Option<String>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: attainment_paths::default_database_path(),
            url: None,
            auth_token: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct ReportConfig {
    /// Output format for `attainment report`
    pub format: ReportFormat,

    /// Write the report here instead of stdout
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,

    /// Store derived tables after every report run
    pub persist: bool,
}

/// How reports are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum ReportFormat {
    /// Terminal tables
    #[default]
    Table,
    /// A single JSON document
    Json,
}
