use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub backend: BackendConfig,
  #[serde(default)]
  pub cache: CacheConfig,
  /// Default log filter when RUST_LOG is not set (e.g. "info", "acctview=debug")
  pub log_level: Option<String>,
  /// Custom title for header (defaults to the backend location if not set)
  pub title: Option<String>,
  /// Account type selected on startup (defaults to all types)
  pub default_type: Option<String>,
}

/// Where account data comes from
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum BackendConfig {
  /// Local SQLite store; defaults to $XDG_DATA_HOME/acctview/accounts.db
  Sqlite {
    #[serde(default)]
    path: Option<PathBuf>,
  },
  /// REST backend rooted at `url`
  Http { url: String },
}

impl Default for BackendConfig {
  fn default() -> Self {
    BackendConfig::Sqlite { path: None }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CacheConfig {
  /// Maximum number of cached filtered views. Unset keeps every visited view.
  pub capacity: Option<NonZeroUsize>,
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./acctview.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/acctview/config.yaml
  ///
  /// Without any file the defaults are used.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Config::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    // Check current directory
    let local = PathBuf::from("acctview.yaml");
    if local.exists() {
      return Some(local);
    }

    // Check XDG config directory
    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("acctview").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::parse(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  fn parse(contents: &str) -> std::result::Result<Self, serde_yaml::Error> {
    // An empty file is a valid, all-defaults config
    if contents.trim().is_empty() {
      return Ok(Config::default());
    }
    serde_yaml::from_str(contents)
  }

  /// Get the REST backend token from the environment, if set.
  ///
  /// Checks ACCTVIEW_API_TOKEN.
  pub fn get_api_token() -> Option<String> {
    std::env::var("ACCTVIEW_API_TOKEN")
      .ok()
      .filter(|t| !t.is_empty())
  }
}
