//! Configuration loading
//!
//! Settings come from `<config_home>/stash/config.toml` (all keys optional),
//! then `STASH_DB` / `STASH_USER` environment variables, then CLI flags.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

pub const DB_ENV: &str = "STASH_DB";
pub const USER_ENV: &str = "STASH_USER";

#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// SQLite file; defaults to ~/.stash/data.db
    pub database_path: Option<PathBuf>,
    /// Email of the acting user when `--user` is not given
    pub user: Option<String>,
    /// Prefix for money output (e.g. "€ ", "$ ")
    pub currency_symbol: Option<String>,
}

impl Config {
    /// Default location of the config file
    pub fn default_path() -> Option<PathBuf> {
        dir_spec::config_home().map(|dir| dir.join("stash").join("config.toml"))
    }

    /// Load from the default location; a missing file yields defaults
    pub fn load() -> Result<Self> {
        let config = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(config.with_env_overrides(|key| std::env::var(key).ok()))
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading config from {:?}", path);
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {:?}", path))?;
        Self::parse(&raw).with_context(|| format!("Invalid config file {:?}", path))
    }

    pub fn parse(raw: &str) -> Result<Self> {
        Ok(toml::from_str(raw)?)
    }

    /// Apply environment overrides using `lookup` (injectable for tests)
    pub fn with_env_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(db) = lookup(DB_ENV).filter(|v| !v.is_empty()) {
            self.database_path = Some(PathBuf::from(db));
        }
        if let Some(user) = lookup(USER_ENV).filter(|v| !v.is_empty()) {
            self.user = Some(user);
        }
        self
    }
}
