//! Configuration loading from TOML with environment variable resolution.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Secrets (the bot token) are referenced by env-var name in the config
//! and resolved at runtime via `std::env::var`.

use anyhow::{Context, Result};
use secrecy::SecretString;
use serde::Deserialize;
use std::fs;
use std::time::Duration;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone)]
pub struct AppConfig {
    pub bot: BotConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub marketplace: MarketplaceConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub notifier: NotifierConfig,
    #[serde(default)]
    pub api: ApiConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct BotConfig {
    pub name: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct SchedulerConfig {
    /// Period between sweep starts.
    #[serde(default = "default_poll_interval_secs")]
    pub poll_interval_secs: u64,
    /// Pause between two monitor evaluations within one sweep.
    #[serde(default = "default_inter_monitor_delay_ms")]
    pub inter_monitor_delay_ms: u64,
}

#[derive(Debug, Deserialize, Clone)]
pub struct MarketplaceConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Upper bound on a single listings fetch.
    #[serde(default = "default_fetch_timeout_secs")]
    pub fetch_timeout_secs: u64,
    #[serde(default = "default_page_size")]
    pub page_size: u32,
    #[serde(default = "default_condition")]
    pub condition: String,
    #[serde(default = "default_shipping_country")]
    pub shipping_country: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_database_url")]
    pub database_url: String,
}

/// Where alerts go.
#[derive(Debug, Deserialize, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum NotifierProvider {
    /// Discord direct messages.
    Discord,
    /// Log the alert only (dry run).
    Log,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NotifierConfig {
    #[serde(default = "default_provider")]
    pub provider: NotifierProvider,
    #[serde(default = "default_bot_token_env")]
    pub bot_token_env: String,
    #[serde(default = "default_discord_api_base")]
    pub api_base: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ApiConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_api_port")]
    pub port: u16,
}

fn default_poll_interval_secs() -> u64 {
    90
}
fn default_inter_monitor_delay_ms() -> u64 {
    2_000
}
fn default_base_url() -> String {
    "https://mp-search-api.tcgplayer.com".to_string()
}
fn default_fetch_timeout_secs() -> u64 {
    15
}
fn default_page_size() -> u32 {
    25
}
fn default_condition() -> String {
    "Near Mint".to_string()
}
fn default_shipping_country() -> String {
    "US".to_string()
}
fn default_database_url() -> String {
    "sqlite://monitors.db".to_string()
}
fn default_provider() -> NotifierProvider {
    NotifierProvider::Discord
}
fn default_bot_token_env() -> String {
    "BOT_TOKEN".to_string()
}
fn default_discord_api_base() -> String {
    "https://discord.com/api/v10".to_string()
}
fn default_api_port() -> u16 {
    8080
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            poll_interval_secs: default_poll_interval_secs(),
            inter_monitor_delay_ms: default_inter_monitor_delay_ms(),
        }
    }
}

impl Default for MarketplaceConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            fetch_timeout_secs: default_fetch_timeout_secs(),
            page_size: default_page_size(),
            condition: default_condition(),
            shipping_country: default_shipping_country(),
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            database_url: default_database_url(),
        }
    }
}

impl Default for NotifierConfig {
    fn default() -> Self {
        Self {
            provider: default_provider(),
            bot_token_env: default_bot_token_env(),
            api_base: default_discord_api_base(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_api_port(),
        }
    }
}

impl SchedulerConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs)
    }

    pub fn inter_monitor_delay(&self) -> Duration {
        Duration::from_millis(self.inter_monitor_delay_ms)
    }
}

impl MarketplaceConfig {
    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_secs(self.fetch_timeout_secs)
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        Self::parse(&contents).with_context(|| format!("Failed to parse config file: {path}"))
    }

    /// Parse configuration from TOML text and validate it.
    pub fn parse(contents: &str) -> Result<Self> {
        let config: AppConfig = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.scheduler.poll_interval_secs == 0 {
            anyhow::bail!("scheduler.poll_interval_secs must be > 0");
        }
        if self.marketplace.fetch_timeout_secs == 0 {
            anyhow::bail!("marketplace.fetch_timeout_secs must be > 0");
        }
        if self.marketplace.page_size == 0 {
            anyhow::bail!("marketplace.page_size must be > 0");
        }
        Ok(())
    }

    /// Resolve an environment variable name to its value.
    /// Useful for loading secrets referenced in the config.
    pub fn resolve_env(env_name: &str) -> Result<String> {
        std::env::var(env_name)
            .with_context(|| format!("Environment variable not set: {env_name}"))
    }

    /// The bot token named by `notifier.bot_token_env`, if set and non-empty.
    pub fn bot_token(&self) -> Option<SecretString> {
        Self::resolve_env(&self.notifier.bot_token_env)
            .ok()
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::new)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_config() {
        // Requires config.toml in the working directory; absent in some
        // test environments, which is acceptable.
        let result = AppConfig::load("config.toml");
        if let Ok(cfg) = result {
            assert_eq!(cfg.bot.name, "pricewatch");
            assert_eq!(cfg.scheduler.poll_interval_secs, 90);
            assert_eq!(cfg.scheduler.inter_monitor_delay_ms, 2_000);
            assert!(cfg.marketplace.fetch_timeout_secs <= 15);
        }
    }

    #[test]
    fn test_minimal_config_uses_defaults() {
        let cfg = AppConfig::parse("[bot]\nname = \"pw\"\n").unwrap();
        assert_eq!(cfg.scheduler.poll_interval(), Duration::from_secs(90));
        assert_eq!(cfg.scheduler.inter_monitor_delay(), Duration::from_secs(2));
        assert_eq!(cfg.marketplace.fetch_timeout(), Duration::from_secs(15));
        assert_eq!(cfg.marketplace.page_size, 25);
        assert_eq!(cfg.marketplace.condition, "Near Mint");
        assert_eq!(cfg.notifier.provider, NotifierProvider::Discord);
        assert!(!cfg.api.enabled);
    }

    #[test]
    fn test_full_config() {
        let cfg = AppConfig::parse(
            r#"
            [bot]
            name = "pw"

            [scheduler]
            poll_interval_secs = 60
            inter_monitor_delay_ms = 500

            [marketplace]
            fetch_timeout_secs = 10
            condition = "Lightly Played"

            [storage]
            database_url = "sqlite://data/pw.db"

            [notifier]
            provider = "log"

            [api]
            enabled = true
            port = 9000
            "#,
        )
        .unwrap();

        assert_eq!(cfg.scheduler.poll_interval_secs, 60);
        assert_eq!(cfg.scheduler.inter_monitor_delay(), Duration::from_millis(500));
        assert_eq!(cfg.marketplace.fetch_timeout_secs, 10);
        assert_eq!(cfg.marketplace.condition, "Lightly Played");
        assert_eq!(cfg.storage.database_url, "sqlite://data/pw.db");
        assert_eq!(cfg.notifier.provider, NotifierProvider::Log);
        assert!(cfg.api.enabled);
        assert_eq!(cfg.api.port, 9000);
    }

    #[test]
    fn test_zero_poll_interval_rejected() {
        let err = AppConfig::parse("[bot]\nname = \"pw\"\n[scheduler]\npoll_interval_secs = 0\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_unknown_provider_rejected() {
        let err = AppConfig::parse("[bot]\nname = \"pw\"\n[notifier]\nprovider = \"pager\"\n");
        assert!(err.is_err());
    }

    #[test]
    fn test_missing_bot_token_env() {
        let mut cfg = AppConfig::parse("[bot]\nname = \"pw\"\n").unwrap();
        cfg.notifier.bot_token_env = "PRICEWATCH_TEST_TOKEN_NOT_SET_XYZ".to_string();
        assert!(cfg.bot_token().is_none());
    }
}
