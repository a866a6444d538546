//! Configuration management for the relay watcher.
//!
//! Loads configuration from a TOML file; every field outside the relay
//! targets has a serde default.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub watch: WatchConfig,
    pub relay: RelayConfig,
    #[serde(default)]
    pub state: StateConfig,
    #[serde(default)]
    pub http: HttpConfig,
    #[serde(default)]
    pub log: LogConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Directory observed for new files
    pub directory: PathBuf,

    /// Filename suffix a file must carry to qualify
    #[serde(default = "default_suffix")]
    pub suffix: String,

    /// Interval between the two size samples of the settle check
    #[serde(default = "default_settle_poll_ms")]
    pub settle_poll_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RelayConfig {
    /// Remote destinations; every one must confirm receipt before the
    /// source file is trashed
    pub targets: Vec<TargetConfig>,

    #[serde(default)]
    pub retry: RetryConfig,

    /// Wait after the last target confirms, before the source is trashed
    #[serde(default = "default_grace_delay_secs")]
    pub grace_delay_secs: u64,

    /// Optional command held alive while a file is being relayed, as a
    /// no-sleep assertion (e.g. "caffeinate")
    #[serde(default)]
    pub inhibit_command: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TargetConfig {
    /// Remote hostname or address
    pub host: String,

    /// SSH port
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// SSH username
    pub username: String,

    /// Remote directory the file lands in; the filename is preserved
    pub remote_dir: PathBuf,

    /// Private key file; SSH agent authentication is used when absent
    #[serde(default)]
    pub key_file: Option<PathBuf>,

    /// Password authentication fallback
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// First backoff interval after a failed transfer
    #[serde(default = "default_initial_backoff_secs")]
    pub initial_backoff_secs: u64,

    /// Backoff cap
    #[serde(default = "default_max_backoff_secs")]
    pub max_backoff_secs: u64,

    /// Backoff growth factor; 1.0 keeps the interval fixed
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,

    /// Give up after this many attempts; unset retries unboundedly
    #[serde(default)]
    pub max_attempts: Option<u32>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StateConfig {
    /// Directory holding the ledger, counter, start-time and trash
    #[serde(default = "default_state_dir")]
    pub state_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HttpConfig {
    /// Bind address for the status API
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Status API port
    #[serde(default = "default_http_port")]
    pub port: u16,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// Default values
fn default_suffix() -> String {
    ".torrent".to_string()
}

fn default_settle_poll_ms() -> u64 {
    500
}

fn default_grace_delay_secs() -> u64 {
    60
}

fn default_ssh_port() -> u16 {
    22
}

fn default_initial_backoff_secs() -> u64 {
    30
}

fn default_max_backoff_secs() -> u64 {
    30
}

fn default_multiplier() -> f64 {
    1.0
}

fn default_state_dir() -> PathBuf {
    std::env::var_os("HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("/var/lib"))
        .join(".torrent-relay")
}

fn default_bind() -> String {
    "127.0.0.1".to_string()
}

fn default_http_port() -> u16 {
    8384
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            initial_backoff_secs: default_initial_backoff_secs(),
            max_backoff_secs: default_max_backoff_secs(),
            multiplier: default_multiplier(),
            max_attempts: None,
        }
    }
}

impl Default for StateConfig {
    fn default() -> Self {
        Self {
            state_dir: default_state_dir(),
        }
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            port: default_http_port(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: &PathBuf) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)?;
        if config.relay.targets.is_empty() {
            anyhow::bail!("at least one [[relay.targets]] entry is required");
        }
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const MINIMAL: &str = r#"
[watch]
directory = "/downloads"

[[relay.targets]]
host = "nas.local"
username = "media"
remote_dir = "/volume1/watch"

[[relay.targets]]
host = "seedbox.example.com"
username = "seed"
remote_dir = "/home/seed/watch"
"#;

    #[test]
    fn minimal_config_gets_defaults() {
        let config: Config = toml::from_str(MINIMAL).unwrap();
        assert_eq!(config.watch.suffix, ".torrent");
        assert_eq!(config.relay.targets.len(), 2);
        assert_eq!(config.relay.targets[0].port, 22);
        assert_eq!(config.relay.retry.initial_backoff_secs, 30);
        assert_eq!(config.relay.retry.max_attempts, None);
        assert_eq!(config.relay.grace_delay_secs, 60);
        assert_eq!(config.http.port, 8384);
        assert_eq!(config.log.level, "info");
    }

    #[test]
    fn retry_overrides_parse() {
        let toml_str = format!(
            "{MINIMAL}\n[relay.retry]\ninitial_backoff_secs = 5\nmultiplier = 2.0\nmax_attempts = 10\n"
        );
        let config: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(config.relay.retry.initial_backoff_secs, 5);
        assert_eq!(config.relay.retry.multiplier, 2.0);
        assert_eq!(config.relay.retry.max_attempts, Some(10));
    }

    #[test]
    fn empty_targets_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[watch]\ndirectory = \"/downloads\"\n[relay]\ntargets = []\n").unwrap();
        assert!(Config::from_file(&path).is_err());
    }
}
