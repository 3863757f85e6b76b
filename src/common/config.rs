//! Configuration file handling

use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use super::paths::config_path;
use super::Result;

/// Main configuration structure
#[derive(Debug, Deserialize, Default, Clone)]
pub struct Config {
    /// How the trust client binary is invoked
    #[serde(default)]
    pub client: ClientConfig,

    /// Signing passphrases exported to every invocation
    #[serde(default)]
    pub passphrases: SigningPassphrases,

    /// Server readiness probe settings
    #[serde(default)]
    pub readiness: ReadinessConfig,
}

/// Trust client invocation settings
#[derive(Debug, Deserialize, Clone)]
pub struct ClientConfig {
    /// Binary name or path
    #[serde(default = "default_binary")]
    pub binary: PathBuf,

    /// Config file handed to the binary in local (embedded) mode
    #[serde(default = "default_local_config")]
    pub local_config: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            binary: default_binary(),
            local_config: default_local_config(),
        }
    }
}

fn default_binary() -> PathBuf {
    PathBuf::from("notary")
}

fn default_local_config() -> PathBuf {
    PathBuf::from("config.json")
}

/// Passphrases for the four signing roles
///
/// These are fixed test fixtures, not secrets. The set is chosen once at
/// startup and reused for every invocation of the run.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct SigningPassphrases {
    #[serde(default = "default_root_passphrase")]
    pub root: String,
    #[serde(default = "default_targets_passphrase")]
    pub targets: String,
    #[serde(default = "default_snapshot_passphrase")]
    pub snapshot: String,
    #[serde(default = "default_delegation_passphrase")]
    pub delegation: String,
}

impl Default for SigningPassphrases {
    fn default() -> Self {
        Self {
            root: default_root_passphrase(),
            targets: default_targets_passphrase(),
            snapshot: default_snapshot_passphrase(),
            delegation: default_delegation_passphrase(),
        }
    }
}

fn default_root_passphrase() -> String {
    "root_ponies".to_string()
}
fn default_targets_passphrase() -> String {
    "targets_ponies".to_string()
}
fn default_snapshot_passphrase() -> String {
    "snapshot_ponies".to_string()
}
fn default_delegation_passphrase() -> String {
    "user_ponies".to_string()
}

impl SigningPassphrases {
    /// Environment variables carrying the passphrases, in role order
    pub fn env_vars(&self) -> [(&'static str, &str); 4] {
        [
            ("NOTARY_ROOT_PASSPHRASE", self.root.as_str()),
            ("NOTARY_TARGETS_PASSPHRASE", self.targets.as_str()),
            ("NOTARY_SNAPSHOT_PASSPHRASE", self.snapshot.as_str()),
            ("NOTARY_DELEGATION_PASSPHRASE", self.delegation.as_str()),
        ]
    }
}

/// Readiness probe settings
#[derive(Debug, Deserialize, Clone)]
pub struct ReadinessConfig {
    /// Server address that selects local mode when given on the command line
    #[serde(default = "default_server")]
    pub default_server: String,

    /// Health endpoint probed in local mode
    #[serde(default = "default_health_path")]
    pub health_path: String,

    /// Total probing budget
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,

    /// Pause after a failed probe
    #[serde(default = "default_retry_interval")]
    pub retry_interval_secs: u64,

    /// Pause after readiness is confirmed, for the signer handshake
    #[serde(default = "default_grace_period")]
    pub grace_period_secs: u64,

    /// Consecutive successful probes needed to declare readiness
    #[serde(default = "default_required_successes")]
    pub required_successes: u32,
}

impl Default for ReadinessConfig {
    fn default() -> Self {
        Self {
            default_server: default_server(),
            health_path: default_health_path(),
            timeout_secs: default_timeout(),
            retry_interval_secs: default_retry_interval(),
            grace_period_secs: default_grace_period(),
            required_successes: default_required_successes(),
        }
    }
}

fn default_server() -> String {
    "http://server:4443".to_string()
}
fn default_health_path() -> String {
    "/_notary_server/health".to_string()
}
fn default_timeout() -> u64 {
    240
}
fn default_retry_interval() -> u64 {
    11
}
fn default_grace_period() -> u64 {
    30
}
fn default_required_successes() -> u32 {
    2
}

impl ReadinessConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn retry_interval(&self) -> Duration {
        Duration::from_secs(self.retry_interval_secs)
    }

    pub fn grace_period(&self) -> Duration {
        Duration::from_secs(self.grace_period_secs)
    }
}

impl Config {
    /// Load configuration from the default config file
    ///
    /// Returns default configuration if file doesn't exist
    pub fn load() -> Result<Self> {
        if let Some(path) = config_path() {
            if path.exists() {
                return Self::load_from(&path);
            }
        }
        Ok(Self::default())
    }

    /// Load configuration from an explicit path, which must exist
    pub fn load_from(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| super::Error::FileRead {
            path: path.display().to_string(),
            error: e.to_string(),
        })?;
        Self::parse(&content)
    }

    /// Parse configuration from TOML text
    pub fn parse(content: &str) -> Result<Self> {
        let config: Self =
            toml::from_str(content).map_err(|e| super::Error::ConfigParse(e.to_string()))?;
        if config.readiness.required_successes == 0 {
            return Err(super::Error::ConfigParse(
                "readiness.required_successes must be at least 1".to_string(),
            ));
        }
        Ok(config)
    }
}
