use anyhow::{anyhow, Context, Result};
use mockd_core::{ServiceConfig, STORE_KEY};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;
use tracing::debug;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreCfg {
    #[serde(default = "def_engine")]
    pub engine: String, // lmdb | memory | json
    #[serde(default = "def_store_path")]
    pub path: String,
    #[serde(default = "def_store_key")]
    pub key: String,
}
fn def_engine() -> String { "lmdb".into() }
fn def_store_path() -> String { "./data".into() }
fn def_store_key() -> String { STORE_KEY.into() }

impl Default for StoreCfg {
    fn default() -> Self {
        Self { engine: def_engine(), path: def_store_path(), key: def_store_key() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconcileCfg {
    #[serde(default = "def_duplicates_window")]
    pub duplicates_window_ms: u64,
    #[serde(default = "def_persist_window")]
    pub persist_window_ms: u64,
    #[serde(default = "def_persist_retries")]
    pub persist_retries: u32,
    #[serde(default = "def_retry_backoff")]
    pub retry_backoff_ms: u64,
    #[serde(default = "def_event_capacity")]
    pub event_capacity: usize,
}
fn def_duplicates_window() -> u64 { 100 }
fn def_persist_window() -> u64 { 1000 }
fn def_persist_retries() -> u32 { 2 }
fn def_retry_backoff() -> u64 { 250 }
fn def_event_capacity() -> usize { 1024 }

impl Default for ReconcileCfg {
    fn default() -> Self {
        Self {
            duplicates_window_ms: def_duplicates_window(),
            persist_window_ms: def_persist_window(),
            persist_retries: def_persist_retries(),
            retry_backoff_ms: def_retry_backoff(),
            event_capacity: def_event_capacity(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TracingCfg {
    #[serde(default = "def_service_name")]
    pub service_name: String,
    #[serde(default)]
    pub otlp_endpoint: String,
    /// Print spans to stdout when no OTLP endpoint is set.
    #[serde(default)]
    pub stdout_spans: bool,
    #[serde(default = "def_logging")]
    pub logging_mode: String, // plain | pretty | json
    #[serde(default = "def_level")]
    pub level: String,
}
fn def_service_name() -> String { "mockd".into() }
fn def_logging() -> String { "plain".into() }
fn def_level() -> String { "info".into() }

impl Default for TracingCfg {
    fn default() -> Self {
        Self {
            service_name: def_service_name(),
            otlp_endpoint: String::new(),
            stdout_spans: false,
            logging_mode: def_logging(),
            level: def_level(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransferCfg {
    #[serde(default = "def_passphrase")]
    pub passphrase: String,
}
fn def_passphrase() -> String { "mockd-export".into() }

impl Default for TransferCfg {
    fn default() -> Self {
        Self { passphrase: def_passphrase() }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct FileConfig {
    #[serde(default)]
    pub store: StoreCfg,
    #[serde(default)]
    pub reconcile: ReconcileCfg,
    #[serde(default)]
    pub tracing: TracingCfg,
    #[serde(default)]
    pub transfer: TransferCfg,
}

pub fn load_config(path: &str) -> Result<FileConfig> {
    let content = fs::read_to_string(path).with_context(|| format!("read config {}", path))?;
    if path.ends_with(".yaml") || path.ends_with(".yml") {
        Ok(serde_yml::from_str(&content)?)
    } else if path.ends_with(".json") {
        Ok(serde_json::from_str(&content)?)
    } else if path.ends_with(".toml") {
        Ok(toml::from_str(&content)?)
    } else {
        Err(anyhow!("Unknown config extension: {}", path))
    }
}

/// Like [`load_config`], but a missing file yields the defaults.
pub fn load_or_default(path: &str) -> Result<FileConfig> {
    if Path::new(path).exists() {
        load_config(path)
    } else {
        debug!("config {} not found, using defaults", path);
        Ok(FileConfig::default())
    }
}

pub fn to_service_config(cfg: &FileConfig) -> ServiceConfig {
    ServiceConfig {
        store_key: cfg.store.key.clone(),
        duplicates_window: Duration::from_millis(cfg.reconcile.duplicates_window_ms),
        persist_window: Duration::from_millis(cfg.reconcile.persist_window_ms),
        persist_retries: cfg.reconcile.persist_retries,
        persist_backoff: Duration::from_millis(cfg.reconcile.retry_backoff_ms),
        event_capacity: cfg.reconcile.event_capacity,
        export_passphrase: cfg.transfer.passphrase.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write(dir: &tempfile::TempDir, name: &str, content: &str) -> String {
        let path = dir.path().join(name);
        fs::write(&path, content).unwrap();
        path.to_string_lossy().into_owned()
    }

    #[test]
    fn yaml_overrides_keep_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(
            &dir,
            "mockd.yaml",
            "store:\n  engine: json\n  path: /tmp/mockd\nreconcile:\n  persist_window_ms: 50\n",
        );
        let cfg = load_config(&path).unwrap();
        assert_eq!(cfg.store.engine, "json");
        assert_eq!(cfg.store.key, "environments");
        assert_eq!(cfg.reconcile.persist_window_ms, 50);
        assert_eq!(cfg.reconcile.duplicates_window_ms, 100);
        assert_eq!(cfg.tracing.logging_mode, "plain");
    }

    #[test]
    fn toml_and_json_are_supported() {
        let dir = tempfile::tempdir().unwrap();
        let toml_path = write(&dir, "mockd.toml", "[tracing]\nlogging_mode = \"json\"\n");
        assert_eq!(load_config(&toml_path).unwrap().tracing.logging_mode, "json");

        let json_path = write(&dir, "mockd.json", r#"{"transfer": {"passphrase": "s3cret"}}"#);
        assert_eq!(load_config(&json_path).unwrap().transfer.passphrase, "s3cret");
    }

    #[test]
    fn unknown_extension_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write(&dir, "mockd.ini", "x=1");
        assert!(load_config(&path).is_err());
    }

    #[test]
    fn missing_file_falls_back_to_defaults() {
        let cfg = load_or_default("/definitely/not/here/mockd.yaml").unwrap();
        assert_eq!(cfg.store.engine, "lmdb");
        assert!(load_config("/definitely/not/here/mockd.yaml").is_err());
    }

    #[test]
    fn service_config_uses_milliseconds() {
        let mut cfg = FileConfig::default();
        cfg.reconcile.retry_backoff_ms = 75;
        let service = to_service_config(&cfg);
        assert_eq!(service.persist_backoff, Duration::from_millis(75));
        assert_eq!(service.duplicates_window, Duration::from_millis(100));
        assert_eq!(service.persist_window, Duration::from_secs(1));
        assert_eq!(service.store_key, "environments");
    }
}
