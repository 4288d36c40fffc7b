//! Metrics Collectors
//!
//! One collector per entity kind. Each collector enumerates the entities of
//! its kind for the current tick, builds retrievers for them, and runs them
//! through the collection [`pipeline`](crate::pipeline).
//!
//! # Architecture
//!
//! Collectors follow a consistent pattern:
//! - Accept a [`CollectionContext`] containing shared state
//! - Enumerate entities from cluster discovery and the gateway
//! - Fetch a bulk batch when the storage system uses bulk metrics
//! - Gather records with bounded concurrency, push them to the cache
//! - Return the number of entities pushed
//!
//! # Error Handling
//!
//! Enumeration and bulk-batch failures abort the collector and propagate to
//! the scheduler, which logs them and waits for the next tick. Per-entity
//! failures are logged inside the pipeline and only drop that entity.

use crate::cache::MetricsWrapper;
use crate::discovery::{ClusterDiscovery, NodeRef};
use crate::error::Result;
use crate::pipeline::WorkerPool;
use crate::powerflex::types::{Generation, Sdc};
use crate::powerflex::ManagementClient;
use crate::records::SdcMeta;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::debug;

/// Shared context passed to all collectors
///
/// Fields are reference-counted because pipeline stages run on spawned tasks.
#[derive(Clone)]
pub struct CollectionContext {
    /// Gateway API client
    pub client: Arc<dyn ManagementClient>,
    /// Cluster object lookup
    pub discovery: Arc<dyn ClusterDiscovery>,
    /// Instrument cache the push stage writes to
    pub cache: Arc<MetricsWrapper>,
    /// Gather-stage concurrency bound
    pub pool: WorkerPool,
    /// CSI drivers whose objects are collected
    pub driver_names: Vec<String>,
}

/// Result type for collector functions: number of entities pushed
pub type CollectionResult = Result<usize>;

// Collector modules
pub mod pool;
pub mod sdc;
pub mod volume;

// Re-export collector functions for convenient access
pub use pool::collect_storage_pool_metrics;
pub use sdc::collect_sdc_metrics;
pub use volume::collect_volume_metrics;

/// Match driver nodes to gateway SDCs by GUID
///
/// Nodes without a known SDC are skipped.
pub(crate) async fn resolve_sdcs(ctx: &CollectionContext) -> Result<(Generation, Vec<SdcMeta>)> {
    let generation = ctx.client.generation().await?;

    let mut nodes: Vec<NodeRef> = Vec::new();
    for driver in &ctx.driver_names {
        nodes.extend(ctx.discovery.list_nodes(driver)?);
    }

    let sdcs = ctx.client.list_sdcs().await?;
    let by_guid: HashMap<String, &Sdc> = sdcs
        .iter()
        .map(|sdc| (sdc.sdc_guid.to_lowercase(), sdc))
        .collect();

    let metas = nodes
        .iter()
        .filter_map(|node| match by_guid.get(&node.sdc_guid.to_lowercase()) {
            Some(sdc) => Some(SdcMeta {
                id: sdc.id.clone(),
                name: sdc.name.clone().unwrap_or_default(),
                ip: if sdc.sdc_ip.is_empty() {
                    node.ip.clone()
                } else {
                    sdc.sdc_ip.clone()
                },
                node_name: node.name.clone(),
                storage_system_id: sdc.system_id.clone(),
            }),
            None => {
                debug!(node = %node.name, sdc_guid = %node.sdc_guid, "No SDC registered for node");
                None
            }
        })
        .collect();

    Ok((generation, metas))
}
