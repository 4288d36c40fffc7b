//! Cluster Object Discovery
//!
//! Collection needs to know which nodes, persistent volumes and storage
//! classes belong to the PowerFlex CSI driver. [`ClusterDiscovery`] is the
//! query interface; [`StaticInventory`] answers it from the `[inventory]`
//! configuration section.

use crate::config::InventoryConfig;
use crate::error::Result;

/// A cluster node running an SDC
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NodeRef {
    pub name: String,
    pub sdc_guid: String,
    pub ip: String,
}

/// A persistent volume provisioned by the driver
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PersistentVolumeRef {
    pub volume_id: String,
    pub persistent_volume: String,
    pub persistent_volume_claim: String,
    pub namespace: String,
    pub storage_class: String,
    pub storage_system_id: String,
}

/// A storage class and the pools it provisions from
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StorageClassRef {
    pub name: String,
    pub driver: String,
    pub storage_system_id: String,
    pub storage_pools: Vec<String>,
}

/// Synchronous lookup of cluster objects filtered by CSI driver name
pub trait ClusterDiscovery: Send + Sync {
    fn list_nodes(&self, driver: &str) -> Result<Vec<NodeRef>>;

    fn list_volumes(&self, driver: &str) -> Result<Vec<PersistentVolumeRef>>;

    fn list_storage_classes(&self, driver: &str) -> Result<Vec<StorageClassRef>>;
}

/// Inventory declared in configuration
#[derive(Debug, Clone, Default)]
pub struct StaticInventory {
    inventory: InventoryConfig,
}

impl StaticInventory {
    pub fn new(inventory: InventoryConfig) -> Self {
        Self { inventory }
    }
}

impl ClusterDiscovery for StaticInventory {
    fn list_nodes(&self, driver: &str) -> Result<Vec<NodeRef>> {
        Ok(self
            .inventory
            .nodes
            .iter()
            .filter(|n| n.driver == driver)
            .map(|n| NodeRef {
                name: n.name.clone(),
                sdc_guid: n.sdc_guid.clone(),
                ip: n.ip.clone(),
            })
            .collect())
    }

    fn list_volumes(&self, driver: &str) -> Result<Vec<PersistentVolumeRef>> {
        Ok(self
            .inventory
            .volumes
            .iter()
            .filter(|v| v.driver == driver)
            .map(|v| PersistentVolumeRef {
                volume_id: v.volume_id.clone(),
                persistent_volume: v.persistent_volume.clone(),
                persistent_volume_claim: v.persistent_volume_claim.clone(),
                namespace: v.namespace.clone(),
                storage_class: v.storage_class.clone(),
                storage_system_id: v.storage_system_id.clone(),
            })
            .collect())
    }

    fn list_storage_classes(&self, driver: &str) -> Result<Vec<StorageClassRef>> {
        Ok(self
            .inventory
            .storage_classes
            .iter()
            .filter(|c| c.driver == driver)
            .map(|c| StorageClassRef {
                name: c.name.clone(),
                driver: c.driver.clone(),
                storage_system_id: c.storage_system_id.clone(),
                storage_pools: c.storage_pools.clone(),
            })
            .collect())
    }
}
