//! Client configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML
//! file, `SISCODEX_*` environment variables. Command-line flags are applied
//! on top by the binary.

use std::{path::Path, time::Duration};

use anyhow::Context as _;
use config::{Config, Environment, File};
use serde::Deserialize;

pub const DEFAULT_BASE_URL: &str = "http://localhost:8080/api";
pub const DEFAULT_LOCALE: &str = "en";
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  /// Root of the CodEx JSON API; endpoint paths are appended to it.
  pub base_url:      String,
  /// Bearer token sent with every request when present.
  pub token:         Option<String>,
  pub locale:        String,
  pub timeout_secs:  u64,
  /// Concurrency cap for batch operations; unbounded if unset.
  pub max_in_flight: Option<usize>,
}

impl Default for ClientConfig {
  fn default() -> Self {
    Self {
      base_url:      DEFAULT_BASE_URL.to_owned(),
      token:         None,
      locale:        DEFAULT_LOCALE.to_owned(),
      timeout_secs:  DEFAULT_TIMEOUT_SECS,
      max_in_flight: None,
    }
  }
}

impl ClientConfig {
  /// Load from `path` (if it exists) and the process environment.
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    Self::load_from(path, Environment::with_prefix("SISCODEX"))
  }

  fn load_from(path: &Path, env: Environment) -> anyhow::Result<Self> {
    let settings = Config::builder()
      .add_source(File::from(path).required(false))
      .add_source(env)
      .build()
      .with_context(|| format!("failed to read config from {}", path.display()))?;

    settings
      .try_deserialize()
      .context("failed to deserialise ClientConfig")
  }

  pub fn timeout(&self) -> Duration { Duration::from_secs(self.timeout_secs) }
}
