//! PowerFlex Gateway API Type Definitions
//!
//! Serde models for the gateway REST responses the exporter consumes.
//!
//! # Design Notes
//!
//! - **Optional Fields**: The gateway omits counters it has never sampled, so
//!   `#[serde(default)]` is used on every statistics field. A missing counter
//!   reads as zero rather than failing the whole entity.
//! - **Naming**: The gateway speaks camelCase; structs use
//!   `#[serde(rename_all = "camelCase")]`.
//!
//! # API Endpoints Covered
//!
//! - `GET /api/types/Sdc/instances` → [`Sdc`]
//! - `GET /api/instances/Sdc::{id}/relationships/Volume` → [`Volume`]
//! - `GET /api/instances/Sdc::{id}/relationships/Statistics` → [`IoCounters`]
//! - `GET /api/instances/Volume::{id}/relationships/Statistics` → [`IoCounters`]
//! - `GET /api/types/StoragePool/instances` → [`StoragePool`]
//! - `GET /api/instances/StoragePool::{id}/relationships/Statistics` → [`StoragePoolCounters`]
//! - `POST /dtapi/rest/v1/metrics/query` → [`BulkMetricsResponse`]

use serde::{Deserialize, Serialize};

/// Which statistics API an entity is read through
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Generation {
    /// Per-entity windowed counters (`relationships/Statistics`)
    Legacy,
    /// Batched named metrics (`/dtapi/rest/v1/metrics/query`)
    Bulk,
}

impl Generation {
    /// Derive the statistics generation from a gateway version string such as `"4.5"`
    pub fn from_version(version: &str) -> Self {
        let major = version
            .trim()
            .trim_matches('"')
            .split('.')
            .next()
            .and_then(|m| m.parse::<u32>().ok())
            .unwrap_or(0);
        if major >= 5 {
            Generation::Bulk
        } else {
            Generation::Legacy
        }
    }
}

impl std::fmt::Display for Generation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Generation::Legacy => write!(f, "legacy"),
            Generation::Bulk => write!(f, "bulk"),
        }
    }
}

/// Storage data client (one per cluster node)
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sdc {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub sdc_guid: String,
    #[serde(default)]
    pub sdc_ip: String,
    #[serde(default)]
    pub system_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Volume {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub storage_pool_id: String,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePool {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub protection_domain_id: String,
}

/// Bandwidth window counter
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bwc {
    #[serde(default)]
    pub num_occurrences: u64,
    #[serde(default)]
    pub num_seconds: u64,
    #[serde(default)]
    pub total_weight_in_kb: u64,
}

/// Legacy I/O statistics shared by SDCs and volumes
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IoCounters {
    #[serde(default)]
    pub user_data_read_bwc: Bwc,
    #[serde(default)]
    pub user_data_write_bwc: Bwc,
    #[serde(default)]
    pub user_data_sdc_read_latency: Bwc,
    #[serde(default)]
    pub user_data_sdc_write_latency: Bwc,
}

/// Legacy storage pool capacity statistics, all in KB
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoragePoolCounters {
    #[serde(default)]
    pub max_capacity_in_kb: u64,
    #[serde(default)]
    pub spare_capacity_in_kb: u64,
    #[serde(default)]
    pub capacity_in_use_in_kb: u64,
    #[serde(default)]
    pub primary_vac_in_kb: u64,
}

/// Body of a bulk metrics query
#[derive(Debug, Clone, Serialize)]
pub struct BulkMetricsQuery {
    pub resource_type: String,
    pub ids: Vec<String>,
    pub metrics: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkMetricsResponse {
    #[serde(default)]
    pub resource_type: String,
    #[serde(default)]
    pub timestamp: Option<String>,
    #[serde(default)]
    pub resources: Vec<BulkResource>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BulkResource {
    pub id: String,
    #[serde(default)]
    pub metrics: Vec<NamedMetric>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct NamedMetric {
    pub name: String,
    #[serde(default)]
    pub values: Vec<f64>,
}

impl BulkResource {
    /// Most recent sample of a named metric, 0 when absent
    pub fn value(&self, name: &str) -> f64 {
        self.metrics
            .iter()
            .find(|m| m.name == name)
            .and_then(|m| m.values.last().copied())
            .unwrap_or_default()
    }
}
