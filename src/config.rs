use crate::error::ExporterError;
use anyhow::{Context, Result};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use std::time::Duration;

/// Shortest accepted poll interval for any entity kind.
pub const MIN_POLL_INTERVAL_SECONDS: u64 = 5;
/// Longest accepted poll interval for any entity kind.
pub const MAX_POLL_INTERVAL_SECONDS: u64 = 600;

#[derive(Debug, Deserialize, Clone)]
pub struct Config {
    pub powerflex: PowerFlexConfig,
    #[serde(default)]
    pub collection: CollectionConfig,
    #[serde(default)]
    pub leader_election: LeaderElectionConfig,
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub inventory: InventoryConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct PowerFlexConfig {
    /// Gateway base URL, e.g. `https://gateway.example:443`
    pub endpoint: String,
    pub username: String,
    pub password: SecretString,
    #[serde(default)]
    pub insecure: bool,
    /// PEM bundle used to verify the gateway certificate
    #[serde(default)]
    pub cert_path: Option<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct CollectionConfig {
    #[serde(default = "default_poll_interval")]
    pub sdc_poll_interval_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub volume_poll_interval_seconds: u64,
    #[serde(default = "default_poll_interval")]
    pub storage_pool_poll_interval_seconds: u64,
    #[serde(default = "default_true")]
    pub sdc_metrics_enabled: bool,
    #[serde(default = "default_true")]
    pub volume_metrics_enabled: bool,
    #[serde(default = "default_true")]
    pub storage_pool_metrics_enabled: bool,
    #[serde(default = "default_max_concurrent_queries")]
    pub max_concurrent_queries: usize,
    #[serde(default = "default_token_refresh_interval")]
    pub token_refresh_interval_seconds: u64,
    #[serde(default = "default_auth_timeout")]
    pub auth_timeout_seconds: u64,
    #[serde(default = "default_driver_names")]
    pub driver_names: Vec<String>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct LeaderElectionConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub endpoint: String,
    #[serde(default = "default_namespace")]
    pub namespace: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_addr")]
    pub addr: String,
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Static cluster inventory consumed by [`crate::discovery::StaticInventory`]
#[derive(Debug, Deserialize, Clone, Default)]
pub struct InventoryConfig {
    #[serde(default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(default)]
    pub volumes: Vec<VolumeEntry>,
    #[serde(default)]
    pub storage_classes: Vec<StorageClassEntry>,
}

#[derive(Debug, Deserialize, Clone)]
pub struct NodeEntry {
    pub name: String,
    pub sdc_guid: String,
    #[serde(default)]
    pub ip: String,
    pub driver: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct VolumeEntry {
    /// Gateway volume ID (the CSI volume handle)
    pub volume_id: String,
    pub persistent_volume: String,
    #[serde(default)]
    pub persistent_volume_claim: String,
    #[serde(default)]
    pub namespace: String,
    #[serde(default)]
    pub storage_class: String,
    #[serde(default)]
    pub storage_system_id: String,
    pub driver: String,
}

#[derive(Debug, Deserialize, Clone)]
pub struct StorageClassEntry {
    pub name: String,
    pub driver: String,
    #[serde(default)]
    pub storage_system_id: String,
    #[serde(default)]
    pub storage_pools: Vec<String>,
}

fn default_poll_interval() -> u64 {
    5
}

fn default_true() -> bool {
    true
}

fn default_max_concurrent_queries() -> usize {
    10
}

fn default_token_refresh_interval() -> u64 {
    300
}

fn default_auth_timeout() -> u64 {
    30
}

fn default_driver_names() -> Vec<String> {
    vec!["csi-vxflexos.dellemc.com".to_string()]
}

fn default_namespace() -> String {
    "powerflex-exporter".to_string()
}

fn default_addr() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    9090
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self {
            sdc_poll_interval_seconds: default_poll_interval(),
            volume_poll_interval_seconds: default_poll_interval(),
            storage_pool_poll_interval_seconds: default_poll_interval(),
            sdc_metrics_enabled: true,
            volume_metrics_enabled: true,
            storage_pool_metrics_enabled: true,
            max_concurrent_queries: default_max_concurrent_queries(),
            token_refresh_interval_seconds: default_token_refresh_interval(),
            auth_timeout_seconds: default_auth_timeout(),
            driver_names: default_driver_names(),
        }
    }
}

impl Default for LeaderElectionConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            endpoint: String::new(),
            namespace: default_namespace(),
        }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            addr: default_addr(),
            port: default_port(),
        }
    }
}

impl CollectionConfig {
    pub fn sdc_poll_interval(&self) -> Duration {
        Duration::from_secs(self.sdc_poll_interval_seconds)
    }

    pub fn volume_poll_interval(&self) -> Duration {
        Duration::from_secs(self.volume_poll_interval_seconds)
    }

    pub fn storage_pool_poll_interval(&self) -> Duration {
        Duration::from_secs(self.storage_pool_poll_interval_seconds)
    }

    pub fn token_refresh_interval(&self) -> Duration {
        Duration::from_secs(self.token_refresh_interval_seconds)
    }

    pub fn auth_timeout(&self) -> Duration {
        Duration::from_secs(self.auth_timeout_seconds)
    }

    /// Check interval bounds and concurrency limits
    pub fn validate(&self) -> crate::error::Result<()> {
        for (name, value) in [
            ("sdc_poll_interval_seconds", self.sdc_poll_interval_seconds),
            ("volume_poll_interval_seconds", self.volume_poll_interval_seconds),
            (
                "storage_pool_poll_interval_seconds",
                self.storage_pool_poll_interval_seconds,
            ),
        ] {
            if !(MIN_POLL_INTERVAL_SECONDS..=MAX_POLL_INTERVAL_SECONDS).contains(&value) {
                return Err(ExporterError::Config(format!(
                    "{} must be between {} and {} seconds, got {}",
                    name, MIN_POLL_INTERVAL_SECONDS, MAX_POLL_INTERVAL_SECONDS, value
                )));
            }
        }

        if self.max_concurrent_queries == 0 {
            return Err(ExporterError::Config(
                "max_concurrent_queries must be greater than 0".to_string(),
            ));
        }

        if self.token_refresh_interval_seconds == 0 {
            return Err(ExporterError::Config(
                "token_refresh_interval_seconds must be greater than 0".to_string(),
            ));
        }

        if self.driver_names.is_empty() {
            return Err(ExporterError::Config(
                "driver_names must list at least one CSI driver".to_string(),
            ));
        }

        Ok(())
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self> {
        // Load environment variables from .env if present
        dotenvy::dotenv().ok();

        let config = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .add_source(config::Environment::with_prefix("POWERFLEX_EXPORTER").separator("__"))
            .build()
            .context("Failed to build configuration")?;

        config
            .try_deserialize()
            .context("Failed to deserialize configuration")
    }

    /// Reject configurations the exporter cannot run with
    pub fn validate(&self) -> crate::error::Result<()> {
        if self.powerflex.endpoint.trim().is_empty() {
            return Err(ExporterError::Config(
                "Missing required field: powerflex.endpoint".to_string(),
            ));
        }
        if self.powerflex.username.trim().is_empty() {
            return Err(ExporterError::Config(
                "Missing required field: powerflex.username".to_string(),
            ));
        }
        if self.powerflex.password.expose_secret().is_empty() {
            return Err(ExporterError::Config(
                "Missing required field: powerflex.password".to_string(),
            ));
        }
        if self.leader_election.enabled && self.leader_election.endpoint.trim().is_empty() {
            return Err(ExporterError::Config(
                "leader_election.endpoint is required when leader election is enabled"
                    .to_string(),
            ));
        }
        self.collection.validate()
    }
}
