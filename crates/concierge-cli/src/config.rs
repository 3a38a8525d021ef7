//! Application configuration.
//!
//! Reads `config/default.toml`:
//!
//! ```toml
//! [engine]     # EngineConfig fields, all optional
//! [logging]    # level = "info", format = "compact" | "json"
//! [store]      # backend = "sqlite" | "memory", path = "data/concierge.db"
//! [catalog]    # path = "config/catalog.json" (optional)
//! ```
//!
//! A missing file yields the defaults.  `CONCIERGE_LOG`, `CONCIERGE_DB` and
//! `CONCIERGE_CATALOG` override the file (a `.env` file is honoured).

use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use concierge_dialog::EngineConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/default.toml";
const DEFAULT_DB_PATH: &str = "data/concierge.db";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreBackend {
    Sqlite,
    Memory,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Compact,
    Json,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub engine: EngineConfig,
    pub log_level: String,
    pub log_format: LogFormat,
    pub store_backend: StoreBackend,
    pub db_path: PathBuf,
    /// Catalog document to load instead of the built-in demo hotel.
    pub catalog_path: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            log_format: LogFormat::Compact,
            store_backend: StoreBackend::Sqlite,
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            catalog_path: None,
        }
    }
}

/// Load the configuration at `path`, then apply environment overrides.
pub fn load(path: &Path) -> Result<AppConfig> {
    let mut config = match std::fs::read_to_string(path) {
        Ok(content) => parse(&content)
            .with_context(|| format!("invalid configuration in {}", path.display()))?,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => AppConfig::default(),
        Err(e) => {
            return Err(e).with_context(|| format!("failed to read {}", path.display()));
        }
    };

    if let Ok(level) = std::env::var("CONCIERGE_LOG") {
        config.log_level = level;
    }
    if let Ok(db) = std::env::var("CONCIERGE_DB") {
        config.db_path = PathBuf::from(db);
    }
    if let Ok(catalog) = std::env::var("CONCIERGE_CATALOG") {
        config.catalog_path = Some(PathBuf::from(catalog));
    }
    Ok(config)
}

/// Parse a configuration document.  Absent sections keep their defaults.
pub fn parse(content: &str) -> Result<AppConfig> {
    let table: toml::Table = content.parse().context("failed to parse TOML")?;
    let defaults = AppConfig::default();

    let engine = match table.get("engine") {
        Some(value) => value
            .clone()
            .try_into::<EngineConfig>()
            .context("invalid [engine] section")?,
        None => defaults.engine,
    };

    let logging = section(&table, "logging");
    let log_level = logging
        .and_then(|t| t.get("level"))
        .and_then(|v| v.as_str())
        .map(str::to_string)
        .unwrap_or(defaults.log_level);
    let log_format = match logging.and_then(|t| t.get("format")).and_then(|v| v.as_str()) {
        None | Some("compact") => LogFormat::Compact,
        Some("json") => LogFormat::Json,
        Some(other) => bail!("unknown log format `{other}` (expected compact or json)"),
    };

    let store = section(&table, "store");
    let store_backend = match store.and_then(|t| t.get("backend")).and_then(|v| v.as_str()) {
        None | Some("sqlite") => StoreBackend::Sqlite,
        Some("memory") => StoreBackend::Memory,
        Some(other) => bail!("unknown store backend `{other}` (expected sqlite or memory)"),
    };
    let db_path = store
        .and_then(|t| t.get("path"))
        .and_then(|v| v.as_str())
        .map(PathBuf::from)
        .unwrap_or(defaults.db_path);

    let catalog_path = section(&table, "catalog")
        .and_then(|t| t.get("path"))
        .and_then(|v| v.as_str())
        .filter(|p| !p.is_empty())
        .map(PathBuf::from);

    Ok(AppConfig {
        engine,
        log_level,
        log_format,
        store_backend,
        db_path,
        catalog_path,
    })
}

fn section<'a>(table: &'a toml::Table, name: &str) -> Option<&'a toml::Table> {
    match table.get(name) {
        Some(toml::Value::Table(t)) => Some(t),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_is_default() {
        let config = parse("").unwrap();
        assert_eq!(config.engine, EngineConfig::default());
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Compact);
        assert_eq!(config.store_backend, StoreBackend::Sqlite);
        assert_eq!(config.db_path, PathBuf::from("data/concierge.db"));
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn sections_are_read() {
        let config = parse(
            r#"
            [engine]
            escalation_threshold = 5
            confidence_threshold = 0.7

            [logging]
            level = "debug"
            format = "json"

            [store]
            backend = "memory"
            path = "/tmp/c.db"

            [catalog]
            path = "hotel.json"
            "#,
        )
        .unwrap();
        assert_eq!(config.engine.escalation_threshold, 5);
        assert_eq!(config.engine.confidence_threshold, 0.7);
        assert_eq!(config.engine.max_input_length, 1000);
        assert_eq!(config.log_level, "debug");
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.store_backend, StoreBackend::Memory);
        assert_eq!(config.db_path, PathBuf::from("/tmp/c.db"));
        assert_eq!(config.catalog_path, Some(PathBuf::from("hotel.json")));
    }

    #[test]
    fn bad_values_are_errors() {
        assert!(parse("[store]\nbackend = \"redis\"").is_err());
        assert!(parse("[logging]\nformat = \"xml\"").is_err());
        assert!(parse("[engine]\nescalation_threshold = \"three\"").is_err());
        assert!(parse("not toml at all [").is_err());
    }

    #[test]
    fn missing_file_uses_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let config = load(&dir.path().join("absent.toml")).unwrap();
        assert_eq!(config.engine, EngineConfig::default());
    }

    #[test]
    fn file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("app.toml");
        std::fs::write(&path, "[engine]\nflow_timeout_secs = 60\n").unwrap();
        let config = load(&path).unwrap();
        assert_eq!(config.engine.flow_timeout_secs, 60);
    }
}
