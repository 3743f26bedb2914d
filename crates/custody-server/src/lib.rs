//! Service wiring for the custody ledger: configuration, the holder
//! directory, the expiry scanner and the application context that owns them.

pub mod context;
pub mod directory;
pub mod scanner;

use std::{collections::HashMap, path::Path, path::PathBuf, time::Duration};

use anyhow::Context as _;
use custody_core::expiry::{DEFAULT_THRESHOLDS, ExpiryPolicy};
use custody_store_sqlite::StoreOptions;
use serde::Deserialize;

pub use context::AppContext;

// ─── Configuration ────────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `custody.toml` and `CUSTODY_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:               String,
  #[serde(default = "default_port")]
  pub port:               u16,
  #[serde(default = "default_store_path")]
  pub store_path:         PathBuf,
  /// How long a writer waits for the database lock.
  #[serde(default = "default_busy_timeout_ms")]
  pub busy_timeout_ms:    u64,
  /// Seconds between expiry scans; `0` disables the background scanner.
  #[serde(default = "default_scan_interval_secs")]
  pub scan_interval_secs: u64,
  /// Days-before-expiry at which reminders go out.
  #[serde(default = "default_thresholds")]
  pub expiry_thresholds:  Vec<u32>,
  #[serde(default)]
  pub directory:          DirectoryConfig,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DirectoryConfig {
  /// Holder id to display name.
  #[serde(default)]
  pub names:            HashMap<String, String>,
  #[serde(default)]
  pub alert_recipients: Vec<String>,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("custody.db") }
fn default_busy_timeout_ms() -> u64 { 5_000 }
fn default_scan_interval_secs() -> u64 { 24 * 60 * 60 }
fn default_thresholds() -> Vec<u32> { DEFAULT_THRESHOLDS.to_vec() }

impl ServerConfig {
  /// Layer the optional TOML file at `path` under the environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("CUSTODY")
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true)
          .list_separator(",")
          .with_list_parse_key("expiry_thresholds")
          .with_list_parse_key("directory.alert_recipients"),
      )
      .build()
      .context("failed to read configuration")?
      .try_deserialize()
      .context("failed to deserialise ServerConfig")
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn store_options(&self) -> StoreOptions {
    StoreOptions { busy_timeout: Duration::from_millis(self.busy_timeout_ms) }
  }

  pub fn scan_interval(&self) -> Option<Duration> {
    (self.scan_interval_secs > 0).then(|| Duration::from_secs(self.scan_interval_secs))
  }

  pub fn expiry_policy(&self) -> ExpiryPolicy { ExpiryPolicy::new(self.expiry_thresholds.clone()) }

  /// `store_path` with a leading `~` expanded to the home directory.
  pub fn resolved_store_path(&self) -> PathBuf { expand_tilde(&self.store_path) }
}

fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
