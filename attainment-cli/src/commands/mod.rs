pub mod config;
pub mod import;
pub mod report;
pub mod validate;

use anyhow::{Context, Result, bail};
use attainment_engine::storage::TursoCatalogStore;
use tracing::debug;

use crate::config::DatabaseConfig;

/// Open the configured catalog database, creating a local file if needed.
pub async fn open_store(config: &DatabaseConfig) -> Result<TursoCatalogStore> {
    if let Some(url) = &config.url {
        let Some(token) = &config.auth_token else {
            bail!("database.url is set but database.auth_token is missing");
        };
        debug!(%url, "connecting to remote database");
        return TursoCatalogStore::new_remote(url, token)
            .await
            .with_context(|| format!("failed to connect to {}", url));
    }

    if let Some(parent) = config.path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    debug!(path = %config.path.display(), "opening local database");
    TursoCatalogStore::new_local(&config.path)
        .await
        .with_context(|| format!("failed to open {}", config.path.display()))
}
