//! Shared helpers for the CLI subcommands: tracing setup and collaborator
//! construction.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::EnvFilter;

use concierge_store::{
    ContentCatalog, Database, InMemoryMessageStore, MessageStore, SessionStore, StaticCatalog,
};

use crate::config::{AppConfig, LogFormat, StoreBackend};

/// Initialize the tracing subscriber with the given default log level.
pub fn init_tracing(default_level: &str, format: LogFormat) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);
    match format {
        LogFormat::Compact => builder.compact().init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// The configured catalog document, or the built-in demo hotel.
pub fn open_catalog(config: &AppConfig) -> Result<Arc<dyn ContentCatalog>> {
    match &config.catalog_path {
        Some(path) => {
            let catalog = StaticCatalog::from_json_file(path)
                .with_context(|| format!("failed to load catalog {}", path.display()))?;
            info!(path = %path.display(), "catalog loaded");
            Ok(Arc::new(catalog))
        }
        None => {
            info!("using built-in demo catalog");
            Ok(Arc::new(StaticCatalog::hotel_defaults()))
        }
    }
}

/// Open the conversation log.
pub async fn open_store(config: &AppConfig) -> Result<Arc<dyn MessageStore>> {
    match config.store_backend {
        StoreBackend::Memory => {
            info!("conversation log kept in memory");
            Ok(Arc::new(InMemoryMessageStore::new()))
        }
        StoreBackend::Sqlite => {
            let db = open_database(&config.db_path).await?;
            Ok(Arc::new(SessionStore::new(db)))
        }
    }
}

/// Open (creating parent directories) and migrate the SQLite database.
pub async fn open_database(path: &Path) -> Result<Database> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    let db = Database::open_and_migrate(path.to_path_buf())
        .await
        .context("failed to open database")?;
    info!(path = %path.display(), "store initialized");
    Ok(db)
}
