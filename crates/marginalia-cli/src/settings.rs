//! Layered CLI configuration: optional TOML file, then `MARGINALIA_*`
//! environment variables, then command-line flags.

use std::path::{Path, PathBuf};

use anyhow::Context as _;
use serde::Deserialize;

#[derive(Deserialize, Clone, Debug)]
pub struct CliConfig {
  #[serde(default = "default_store_path")]
  pub store_path:    PathBuf,
  #[serde(default = "default_user")]
  pub user:          String,
  #[serde(default = "default_provider_name")]
  pub provider_name: String,
  #[serde(default = "default_revision")]
  pub revision:      String,
}

fn default_store_path() -> PathBuf { PathBuf::from("~/.marginalia/comments.db") }

fn default_user() -> String { std::env::var("USER").unwrap_or_else(|_| "me".to_owned()) }

fn default_provider_name() -> String { "local".to_owned() }

fn default_revision() -> String { "working-copy".to_owned() }

impl CliConfig {
  /// Read `file` (if it exists) and the environment.
  pub fn load(file: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(file).required(false))
      .add_source(config::Environment::with_prefix("MARGINALIA"))
      .build()
      .context("failed to read config file")?;

    let mut cfg: CliConfig = settings
      .try_deserialize()
      .context("failed to deserialise CliConfig")?;
    cfg.store_path = expand_tilde(&cfg.store_path);
    Ok(cfg)
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
