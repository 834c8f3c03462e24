use crate::models::tariff::Tariff;
use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub logging: LoggingConfig,
    pub auth: AuthConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    pub daemon: DaemonConfig,
    #[serde(default)]
    pub stats: StatsConfig,
    pub subscription: SubscriptionConfig,
    #[serde(default)]
    pub registration: RegistrationConfig,
    #[serde(default)]
    pub tariffs: Vec<Tariff>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    pub port: u16,
    #[serde(default = "default_num_threads")]
    pub num_threads: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Json,
    Console,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub console: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// HMAC key for user bearer tokens
    pub jwt_secret: String,
    #[serde(default = "default_token_ttl_days")]
    pub token_ttl_days: i64,
    /// Static shared secret for the admin surface, sent as `X-Admin-Key`
    pub admin_key: String,
    #[serde(default = "default_argon2_memory_kib")]
    pub argon2_memory_kib: u32,
    #[serde(default = "default_argon2_iterations")]
    pub argon2_iterations: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StorageConfig {
    #[serde(default = "default_journal_path")]
    pub journal_path: PathBuf,
    /// Compact the journal once this many records were appended since the last compaction
    #[serde(default = "default_compact_threshold")]
    pub compact_threshold: usize,
    #[serde(default = "default_compact_interval_secs")]
    pub compact_interval_secs: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct DaemonConfig {
    pub config_path: PathBuf,
    pub template_path: PathBuf,
    #[serde(default = "default_backup_suffix")]
    pub backup_suffix: String,
    /// Inbound whose client list we own. Falls back to the first `vless` inbound.
    #[serde(default)]
    pub inbound_tag: Option<String>,
    #[serde(default = "default_restart_command")]
    pub restart_command: Vec<String>,
    #[serde(default = "default_restart_delay_ms")]
    pub restart_delay_ms: u64,
    #[serde(default = "default_restart_queue")]
    pub restart_queue: usize,
}

#[derive(Debug, Clone, Deserialize)]
pub struct StatsConfig {
    #[serde(default = "default_stats_command")]
    pub command: String,
    #[serde(default = "default_stats_server")]
    pub server: String,
    #[serde(default = "default_stats_directions")]
    pub directions: Vec<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SubscriptionConfig {
    #[serde(default = "default_subscription_path")]
    pub path: PathBuf,
    /// Public host clients connect to
    pub host: String,
    /// Public port; defaults to the inbound's listening port
    #[serde(default)]
    pub port: Option<u16>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RegistrationConfig {
    #[serde(default = "default_tariff_id")]
    pub default_tariff_id: u32,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            journal_path: default_journal_path(),
            compact_threshold: default_compact_threshold(),
            compact_interval_secs: default_compact_interval_secs(),
        }
    }
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self {
            command: default_stats_command(),
            server: default_stats_server(),
            directions: default_stats_directions(),
        }
    }
}

impl Default for RegistrationConfig {
    fn default() -> Self {
        Self {
            default_tariff_id: default_tariff_id(),
        }
    }
}

impl DaemonConfig {
    pub fn backup_path(&self) -> PathBuf {
        let mut name = self.config_path.clone().into_os_string();
        name.push(&self.backup_suffix);
        PathBuf::from(name)
    }

    pub fn restart_delay(&self) -> Duration {
        Duration::from_millis(self.restart_delay_ms)
    }
}

// Default value functions
fn default_num_threads() -> usize {
    num_cpus::get()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Json
}

fn default_token_ttl_days() -> i64 {
    30
}

fn default_argon2_memory_kib() -> u32 {
    19_456
}

fn default_argon2_iterations() -> u32 {
    2
}

fn default_journal_path() -> PathBuf {
    PathBuf::from("vpn-gate.journal")
}

fn default_compact_threshold() -> usize {
    10_000
}

fn default_compact_interval_secs() -> u64 {
    60
}

fn default_backup_suffix() -> String {
    ".bak".to_string()
}

fn default_restart_command() -> Vec<String> {
    vec!["systemctl".into(), "restart".into(), "xray".into()]
}

fn default_restart_delay_ms() -> u64 {
    1000
}

fn default_restart_queue() -> usize {
    8
}

fn default_stats_command() -> String {
    "xray".to_string()
}

fn default_stats_server() -> String {
    "127.0.0.1:10085".to_string()
}

fn default_stats_directions() -> Vec<String> {
    vec!["uplink".into(), "downlink".into()]
}

fn default_subscription_path() -> PathBuf {
    PathBuf::from("subscription.txt")
}

fn default_tariff_id() -> u32 {
    1
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .context(format!("Failed to read config file: {}", path.display()))?;

        Self::from_toml(&content)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Config = toml::from_str(content).context("Failed to parse config file")?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<()> {
        if self.server.port == 0 {
            bail!("Server port must be greater than 0");
        }

        if self.server.num_threads == 0 {
            bail!("num_threads must be greater than 0");
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            bail!(
                "Invalid log level '{}'. Must be one of: trace, debug, info, warn, error",
                self.logging.level
            );
        }

        if self.auth.jwt_secret.is_empty() {
            bail!("jwt_secret must not be empty");
        }

        if self.auth.admin_key.is_empty() {
            bail!("admin_key must not be empty");
        }

        if self.auth.token_ttl_days <= 0 {
            bail!("token_ttl_days must be greater than 0");
        }

        if self.storage.compact_threshold == 0 {
            bail!("storage.compact_threshold must be greater than 0");
        }

        if self.storage.compact_interval_secs == 0 {
            bail!("storage.compact_interval_secs must be greater than 0");
        }

        if self.daemon.restart_command.is_empty() {
            bail!("restart_command must contain at least the program name");
        }

        if self.daemon.restart_queue == 0 {
            bail!("restart_queue must be greater than 0");
        }

        if self.daemon.backup_suffix.is_empty() {
            bail!("backup_suffix must not be empty");
        }

        if self.stats.directions.is_empty() {
            bail!("stats.directions must list at least one direction");
        }

        for direction in &self.stats.directions {
            if direction != "uplink" && direction != "downlink" {
                bail!(
                    "Invalid stats direction '{}'. Must be uplink or downlink",
                    direction
                );
            }
        }

        if self.subscription.host.is_empty() {
            bail!("subscription.host must not be empty");
        }

        let mut ids = HashSet::new();
        for tariff in &self.tariffs {
            if !ids.insert(tariff.id) {
                bail!("Duplicate tariff id {}", tariff.id);
            }
        }

        if !ids.contains(&self.registration.default_tariff_id) {
            bail!(
                "default_tariff_id {} is not in the tariff catalog",
                self.registration.default_tariff_id
            );
        }

        Ok(())
    }
}
