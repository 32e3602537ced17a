use super::types::{
    AttainmentConfig, DatabaseConfig, RawAttainmentConfig, RawDatabaseConfig, RawReportConfig,
    ReportConfig,
};
use anyhow::{Context, Result};
use directories::ProjectDirs;
use std::path::{Path, PathBuf};
use tracing::debug;

pub struct ConfigLoader;

impl ConfigLoader {
    /// Load merged configuration (user + project)
    pub fn load() -> Result<AttainmentConfig> {
        let mut raw = RawAttainmentConfig::default();

        // Layer 1: User config
        if let Some(user_path) = Self::user_config_path()
            && user_path.exists()
        {
            raw = Self::merge_raw(raw, Self::read_raw(&user_path)?);
        }

        // Layer 2: Project config
        let project_path = Self::project_config_path();
        if project_path.exists() {
            raw = Self::merge_raw(raw, Self::read_raw(&project_path)?);
        }

        // Convert to final config with defaults applied
        Ok(Self::finalize(raw))
    }

    /// Get user config path (platform-specific)
    pub fn user_config_path() -> Option<PathBuf> {
        ProjectDirs::from("", "", "attainment").map(|dirs| dirs.config_dir().join("config.toml"))
    }

    /// Get project config path
    /// Can be overridden with ATTAINMENT_PROJECT_CONFIG_DIR env var (useful for isolated tests)
    pub fn project_config_path() -> PathBuf {
        if let Ok(dir) = std::env::var("ATTAINMENT_PROJECT_CONFIG_DIR") {
            PathBuf::from(dir).join("config.toml")
        } else {
            PathBuf::from(".attainment/config.toml")
        }
    }

    fn read_raw(path: &Path) -> Result<RawAttainmentConfig> {
        debug!(path = %path.display(), "loading config layer");
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read {}", path.display()))?;
        toml::from_str(&contents).with_context(|| format!("invalid config in {}", path.display()))
    }

    /// Merge two raw configs (overlay values override base only if explicitly set)
    fn merge_raw(base: RawAttainmentConfig, overlay: RawAttainmentConfig) -> RawAttainmentConfig {
        RawAttainmentConfig {
            database: RawDatabaseConfig {
                path: overlay.database.path.or(base.database.path),
                url: overlay.database.url.or(base.database.url),
                auth_token: overlay.database.auth_token.or(base.database.auth_token),
            },
            report: RawReportConfig {
                format: overlay.report.format.or(base.report.format),
                output: overlay.report.output.or(base.report.output),
                persist: overlay.report.persist.or(base.report.persist),
            },
        }
    }

    /// Convert raw config to final config with defaults applied
    fn finalize(raw: RawAttainmentConfig) -> AttainmentConfig {
        AttainmentConfig {
            database: DatabaseConfig {
                path: raw
                    .database
                    .path
                    .unwrap_or_else(attainment_paths::default_database_path),
                url: raw.database.url,
                auth_token: raw.database.auth_token,
            },
            report: ReportConfig {
                format: raw.report.format.unwrap_or_default(),
                output: raw.report.output,
                persist: raw.report.persist.unwrap_or(false),
            },
        }
    }

    /// Load config from a specific path (for testing)
    #[cfg(test)]
    pub fn load_from_path(path: &Path) -> Result<AttainmentConfig> {
        if path.exists() {
            Ok(Self::finalize(Self::read_raw(path)?))
        } else {
            Ok(AttainmentConfig::default())
        }
    }
}
