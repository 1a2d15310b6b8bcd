//! Configuration loading
//!
//! Settings come from a TOML file (`$STOCKBOOK_CONFIG`, else
//! `~/.stockbook/config.toml`) with environment overrides on top. A missing
//! file means defaults.

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

use crate::error::PortfolioError;

const DEFAULT_CURRENCY: &str = "KSH";
const DEFAULT_PRICE_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Database file; defaults to ~/.stockbook/data.db
    pub database_path: Option<PathBuf>,
    /// User whose portfolio is shown when --user is not given
    pub default_user: Option<String>,
    /// Endpoint serving `[{"symbol": .., "price": ..}]`
    pub price_feed_url: Option<String>,
    pub price_timeout_secs: u64,
    /// Label printed before amounts
    pub currency: String,
    /// Use stored quotes only, never call the price feed
    pub skip_price_fetch: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: None,
            default_user: None,
            price_feed_url: None,
            price_timeout_secs: DEFAULT_PRICE_TIMEOUT_SECS,
            currency: DEFAULT_CURRENCY.to_string(),
            skip_price_fetch: false,
        }
    }
}

impl Config {
    /// Load from the default location and apply environment overrides
    pub fn load() -> Result<Self> {
        let path = match std::env::var_os("STOCKBOOK_CONFIG") {
            Some(path) => PathBuf::from(path),
            None => crate::db::get_data_dir()?.join("config.toml"),
        };

        let mut config = Self::from_file(&path)?;
        config.apply_env(|key| std::env::var(key).ok());
        Ok(config)
    }

    /// Read a config file; a missing file yields defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        if !path.exists() {
            debug!("No config file at {:?}, using defaults", path);
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(path)
            .map_err(PortfolioError::from)
            .context(format!("Failed to read config file {:?}", path))?;
        Self::from_toml(&text).context(format!("Invalid config file {:?}", path))
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| PortfolioError::ParseError(e.to_string()).into())
    }

    /// Overlay STOCKBOOK_* variables read through `lookup`
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(user) = lookup("STOCKBOOK_USER").filter(|u| !u.trim().is_empty()) {
            self.default_user = Some(user);
        }
        if let Some(url) = lookup("STOCKBOOK_PRICE_URL").filter(|u| !u.trim().is_empty()) {
            self.price_feed_url = Some(url);
        }
        if let Some(path) = lookup("STOCKBOOK_DB").filter(|p| !p.trim().is_empty()) {
            self.database_path = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup("STOCKBOOK_SKIP_PRICE_FETCH") {
            self.skip_price_fetch = flag != "0";
        }
    }

    /// Resolve the acting user: explicit flag first, then configuration
    pub fn resolve_user(&self, cli_user: Option<&str>) -> Result<String> {
        cli_user
            .map(str::to_string)
            .or_else(|| self.default_user.clone())
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty())
            .ok_or_else(|| {
                anyhow!("No user given. Pass --user <address>, set STOCKBOOK_USER, or set default_user in config.toml")
            })
    }

    pub fn price_timeout(&self) -> Duration {
        Duration::from_secs(self.price_timeout_secs)
    }
}
