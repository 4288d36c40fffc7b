//! Collected Records
//!
//! Value objects produced by the gather stage and consumed once by the push
//! stage. Each record carries entity metadata plus normalized figures, and
//! knows the [`LabelSet`] its series are exported under.

use crate::metrics::LabelSet;
use crate::normalize::{CapacityMetrics, IoMetrics};

/// Entity kinds collected on independent tickers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntityKind {
    Sdc,
    Volume,
    StoragePool,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Sdc => "sdc",
            EntityKind::Volume => "volume",
            EntityKind::StoragePool => "storage_pool",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SdcMeta {
    pub id: String,
    pub name: String,
    pub ip: String,
    pub node_name: String,
    pub storage_system_id: String,
}

impl SdcMeta {
    pub fn labels(&self) -> LabelSet {
        LabelSet::new()
            .with("sdc_id", &self.id)
            .with("sdc_name", &self.name)
            .with("ip", &self.ip)
            .with("node_name", &self.node_name)
            .with("storage_system_id", &self.storage_system_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct SdcRecord {
    pub meta: SdcMeta,
    pub metrics: IoMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VolumeMeta {
    pub id: String,
    pub name: String,
    pub storage_system_id: String,
    pub persistent_volume: String,
    pub persistent_volume_claim: String,
    pub namespace: String,
    pub storage_class: String,
    pub mapped_node_ids: Vec<String>,
    pub mapped_node_ips: Vec<String>,
}

impl VolumeMeta {
    pub fn labels(&self) -> LabelSet {
        LabelSet::new()
            .with("volume_id", &self.id)
            .with("volume_name", &self.name)
            .with("storage_system_id", &self.storage_system_id)
            .with("persistent_volume", &self.persistent_volume)
            .with("persistent_volume_claim", &self.persistent_volume_claim)
            .with("namespace", &self.namespace)
            .with("storage_class", &self.storage_class)
            .with("mapped_node_ids", self.mapped_node_ids.join("__"))
            .with("mapped_node_ips", self.mapped_node_ips.join("__"))
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VolumeRecord {
    pub meta: VolumeMeta,
    pub metrics: IoMetrics,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageClassMeta {
    pub name: String,
    pub driver: String,
    pub storage_system_id: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoragePoolMeta {
    pub id: String,
    pub name: String,
}

impl StoragePoolMeta {
    pub fn labels(&self, class: &StorageClassMeta) -> LabelSet {
        LabelSet::new()
            .with("storage_pool_id", &self.id)
            .with("storage_pool_name", &self.name)
            .with("storage_class", &class.name)
            .with("driver", &class.driver)
            .with("storage_system_id", &class.storage_system_id)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct PoolCapacity {
    pub meta: StoragePoolMeta,
    pub metrics: CapacityMetrics,
}

/// One storage class with the capacity of every pool it draws from
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StorageClassRecord {
    pub class: StorageClassMeta,
    pub pools: Vec<PoolCapacity>,
}
