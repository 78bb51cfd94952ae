//! Configuration loading and management
//!
//! Configuration is loaded from `~/.config/carousight/config.toml`
//!
//! This module follows the XDG Base Directory Specification:
//! - Config: `$XDG_CONFIG_HOME/carousight/` (~/.config/carousight/)
//! - Data: `$XDG_DATA_HOME/carousight/` (~/.local/share/carousight/)
//! - State/Logs: `$XDG_STATE_HOME/carousight/` (~/.local/state/carousight/)

use crate::error::{Error, Result};
use crate::types::Platform;
use serde::Deserialize;
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};

/// Returns a best-effort home directory path.
fn home_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .or_else(dirs::home_dir)
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns XDG_CONFIG_HOME or ~/.config
fn xdg_config_home() -> PathBuf {
    std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".config"))
}

/// Returns XDG_DATA_HOME or ~/.local/share
fn xdg_data_home() -> PathBuf {
    std::env::var("XDG_DATA_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/share"))
}

/// Returns XDG_STATE_HOME or ~/.local/state
fn xdg_state_home() -> PathBuf {
    std::env::var("XDG_STATE_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| home_dir().join(".local/state"))
}

/// Main configuration struct
#[derive(Debug, Deserialize, Default)]
pub struct Config {
    /// LLM configuration for recommendations
    #[serde(default)]
    pub llm: LlmConfig,

    /// Scraping provider configuration
    #[serde(default)]
    pub scraper: ScraperConfig,

    /// Backfill matcher configuration
    #[serde(default)]
    pub backfill: BackfillConfig,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,

    /// Path overrides
    #[serde(default)]
    pub paths: PathOverrides,

    /// Tracked accounts
    #[serde(default)]
    pub accounts: Vec<AccountConfig>,
}

/// LLM provider configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LlmConfig {
    /// Provider type
    #[serde(default)]
    pub provider: LlmProvider,
    /// Model to use
    #[serde(default = "default_llm_model")]
    pub model: String,
    /// API endpoint (optional, uses default for provider)
    pub endpoint: Option<String>,
    /// API key (can also use env var)
    pub api_key: Option<String>,
    /// Request timeout in seconds
    #[serde(default = "default_llm_timeout")]
    pub timeout_secs: u64,
    /// Sampling temperature
    #[serde(default = "default_llm_temperature")]
    pub temperature: f64,
    /// Maximum tokens in the completion
    #[serde(default = "default_llm_max_tokens")]
    pub max_tokens: u32,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProvider::default(),
            model: default_llm_model(),
            endpoint: None,
            api_key: None,
            timeout_secs: default_llm_timeout(),
            temperature: default_llm_temperature(),
            max_tokens: default_llm_max_tokens(),
        }
    }
}

fn default_llm_model() -> String {
    "anthropic/claude-sonnet-4.5".to_string()
}

fn default_llm_timeout() -> u64 {
    120
}

fn default_llm_temperature() -> f64 {
    0.3
}

fn default_llm_max_tokens() -> u32 {
    2000
}

/// Supported LLM providers
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    #[default]
    OpenRouter,
    OpenAI,
    Claude,
}

impl LlmProvider {
    /// Returns the default endpoint for this provider
    pub fn default_endpoint(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "https://openrouter.ai/api",
            LlmProvider::OpenAI => "https://api.openai.com",
            LlmProvider::Claude => "https://api.anthropic.com",
        }
    }

    /// Environment variable consulted when no api_key is configured
    pub fn api_key_env(&self) -> &'static str {
        match self {
            LlmProvider::OpenRouter => "OPENROUTER_API_KEY",
            LlmProvider::OpenAI => "OPENAI_API_KEY",
            LlmProvider::Claude => "ANTHROPIC_API_KEY",
        }
    }
}

/// Scraping provider (Apify) configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ScraperConfig {
    /// API token (can also use `APIFY_API_TOKEN`)
    pub api_token: Option<String>,

    /// Provider API base URL
    #[serde(default = "default_scraper_base_url")]
    pub base_url: String,

    /// Maximum posts fetched per profile
    #[serde(default = "default_results_limit")]
    pub results_limit: usize,

    /// HTTP request timeout in seconds
    #[serde(default = "default_scraper_timeout")]
    pub timeout_secs: u64,

    /// Maximum seconds to wait for an actor run to finish
    #[serde(default = "default_run_timeout")]
    pub run_timeout_secs: u64,
}

impl Default for ScraperConfig {
    fn default() -> Self {
        Self {
            api_token: None,
            base_url: default_scraper_base_url(),
            results_limit: default_results_limit(),
            timeout_secs: default_scraper_timeout(),
            run_timeout_secs: default_run_timeout(),
        }
    }
}

fn default_scraper_base_url() -> String {
    "https://api.apify.com".to_string()
}

fn default_results_limit() -> usize {
    30
}

fn default_scraper_timeout() -> u64 {
    90
}

fn default_run_timeout() -> u64 {
    600
}

/// Backfill matcher configuration
#[derive(Debug, Deserialize, Clone)]
pub struct BackfillConfig {
    /// Minimum hook-text similarity (0, 1] required to accept a match
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f64,
}

impl Default for BackfillConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
        }
    }
}

fn default_similarity_threshold() -> f64 {
    0.4
}

/// Logging configuration
#[derive(Debug, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Maximum number of log files to keep
    #[serde(default = "default_max_log_files")]
    pub max_files: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            max_files: default_max_log_files(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_max_log_files() -> usize {
    5
}

/// Overrides for the XDG-derived storage locations
#[derive(Debug, Deserialize, Default)]
pub struct PathOverrides {
    /// SQLite database file
    pub database: Option<PathBuf>,
    /// Directory dashboards are written to
    pub dashboard_dir: Option<PathBuf>,
    /// Root holding `<account>/performance_context.json`
    pub context_dir: Option<PathBuf>,
}

/// A tracked account
#[derive(Debug, Deserialize, Clone)]
pub struct AccountConfig {
    /// Account name (used as the database key)
    pub name: String,

    /// Platform name → profile username
    #[serde(default)]
    pub platforms: BTreeMap<String, String>,

    /// Root of locally generated content, scanned by the backfill matcher
    pub output_dir: Option<PathBuf>,

    /// Explicit performance context location
    pub context_path: Option<PathBuf>,
}

impl AccountConfig {
    /// Platform profiles as typed pairs, in platform name order.
    pub fn platform_profiles(&self) -> Result<Vec<(Platform, String)>> {
        self.platforms
            .iter()
            .map(|(platform, username)| {
                let platform = platform.parse::<Platform>().map_err(|e| {
                    Error::Config(format!("account {}: {}", self.name, e))
                })?;
                Ok((platform, username.clone()))
            })
            .collect()
    }
}

impl Config {
    /// Load configuration from the default path
    pub fn load() -> Result<Self> {
        let config_path = Self::config_path();

        if !config_path.exists() {
            tracing::info!("No config file found at {:?}, using defaults", config_path);
            return Ok(Config::default());
        }

        Self::load_from(&config_path)
    }

    /// Load configuration from a specific path
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("failed to read config file {:?}: {}", path, e)))?;

        let config: Config = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints not expressible in serde
    pub fn validate(&self) -> Result<()> {
        let threshold = self.backfill.similarity_threshold;
        if !(threshold > 0.0 && threshold <= 1.0) {
            return Err(Error::Config(
                "backfill.similarity_threshold must be in (0, 1]".to_string(),
            ));
        }
        if self.scraper.results_limit == 0 {
            return Err(Error::Config(
                "scraper.results_limit must be at least 1".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for account in &self.accounts {
            if account.name.trim().is_empty() {
                return Err(Error::Config("account name must not be empty".to_string()));
            }
            if !seen.insert(account.name.as_str()) {
                return Err(Error::Config(format!(
                    "account {} is configured twice",
                    account.name
                )));
            }
            account.platform_profiles()?;
        }
        Ok(())
    }

    /// Look up a configured account by name
    pub fn account(&self, name: &str) -> Option<&AccountConfig> {
        self.accounts.iter().find(|a| a.name == name)
    }

    /// Names of all configured accounts, in config order
    pub fn account_names(&self) -> Vec<String> {
        self.accounts.iter().map(|a| a.name.clone()).collect()
    }

    /// Returns the default config file path
    ///
    /// `$XDG_CONFIG_HOME/carousight/config.toml` (~/.config/carousight/config.toml)
    pub fn config_path() -> PathBuf {
        xdg_config_home().join("carousight").join("config.toml")
    }

    /// Returns the data directory path (database, dashboards, contexts)
    ///
    /// `$XDG_DATA_HOME/carousight/` (~/.local/share/carousight/)
    pub fn data_dir() -> PathBuf {
        xdg_data_home().join("carousight")
    }

    /// Returns the state directory path (for logs)
    ///
    /// `$XDG_STATE_HOME/carousight/` (~/.local/state/carousight/)
    pub fn state_dir() -> PathBuf {
        xdg_state_home().join("carousight")
    }

    /// Returns the database file path
    ///
    /// Defaults to `$XDG_DATA_HOME/carousight/analytics.db`
    pub fn database_path(&self) -> PathBuf {
        self.paths
            .database
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("analytics.db"))
    }

    /// Returns the directory dashboards are written to
    pub fn dashboard_dir(&self) -> PathBuf {
        self.paths
            .dashboard_dir
            .clone()
            .unwrap_or_else(Self::data_dir)
    }

    /// Returns the performance context path for an account
    ///
    /// Defaults to `$XDG_DATA_HOME/carousight/accounts/<name>/performance_context.json`
    pub fn context_path(&self, account: &str) -> PathBuf {
        if let Some(path) = self.account(account).and_then(|a| a.context_path.clone()) {
            return path;
        }
        self.paths
            .context_dir
            .clone()
            .unwrap_or_else(|| Self::data_dir().join("accounts"))
            .join(account)
            .join("performance_context.json")
    }

    /// Ensure XDG base directory environment variables are set.
    ///
    /// This is mainly for CLI binaries that want explicit, stable path behavior
    /// before invoking other components that read these env vars.
    pub fn ensure_xdg_env() {
        let home = home_dir();

        if std::env::var("XDG_DATA_HOME").is_err() {
            std::env::set_var("XDG_DATA_HOME", home.join(".local/share"));
        }

        if std::env::var("XDG_STATE_HOME").is_err() {
            std::env::set_var("XDG_STATE_HOME", home.join(".local/state"));
        }

        if std::env::var("XDG_CONFIG_HOME").is_err() {
            std::env::set_var("XDG_CONFIG_HOME", home.join(".config"));
        }
    }
}
