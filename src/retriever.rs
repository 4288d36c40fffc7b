//! Statistics Retrievers
//!
//! A retriever is one entity that can report statistics for the current tick.
//! Retrievers are rebuilt every tick and never outlive it.
//!
//! Each retriever carries an explicit [`Generation`] tag. `Legacy` entities
//! are read one by one through their `relationships/Statistics` endpoint;
//! `Bulk` entities are answered from a [`BulkBatch`] fetched once per tick
//! for all IDs of the same kind. Either way the raw statistics come back as
//! an [`IoStatistics`] / [`CapacityStatistics`] variant and are normalized
//! to the same units.

use crate::error::{ExporterError, Result};
use crate::normalize::{CapacityStatistics, IoStatistics};
use crate::powerflex::types::{BulkMetricsQuery, BulkResource, Generation};
use crate::powerflex::ManagementClient;
use crate::records::{
    PoolCapacity, SdcMeta, SdcRecord, StorageClassMeta, StorageClassRecord, StoragePoolMeta,
    VolumeMeta, VolumeRecord,
};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Something that can report statistics for one entity
#[async_trait]
pub trait Retriever: Send + Sync {
    type Statistics: Send;

    fn id(&self) -> &str;

    fn generation(&self) -> Generation;

    fn client(&self) -> &Arc<dyn ManagementClient>;

    async fn statistics(&self) -> Result<Self::Statistics>;
}

/// Bulk metrics for every entity of one kind, keyed by entity ID
#[derive(Debug, Clone, Default)]
pub struct BulkBatch {
    resources: HashMap<String, BulkResource>,
}

impl BulkBatch {
    /// Issue one bulk query for `ids`
    ///
    /// An empty response, or one that lacks any requested ID, fails the
    /// whole batch because the single call was meant to serve all of them.
    pub async fn fetch(
        client: &dyn ManagementClient,
        resource_type: &str,
        ids: Vec<String>,
        metrics: &[&str],
    ) -> Result<Self> {
        if ids.is_empty() {
            return Ok(Self::default());
        }

        let query = BulkMetricsQuery {
            resource_type: resource_type.to_string(),
            ids: ids.clone(),
            metrics: metrics.iter().map(|m| m.to_string()).collect(),
        };
        let response = client.query_bulk_metrics(&query).await?;

        if response.resources.is_empty() {
            return Err(ExporterError::BulkBatch(format!(
                "empty {} response for {} requested IDs",
                resource_type,
                ids.len()
            )));
        }

        let resources: HashMap<String, BulkResource> = response
            .resources
            .into_iter()
            .map(|r| (r.id.clone(), r))
            .collect();

        if let Some(missing) = ids.iter().find(|id| !resources.contains_key(*id)) {
            return Err(ExporterError::BulkBatch(format!(
                "{} {} missing from bulk response",
                resource_type, missing
            )));
        }

        debug!(
            resource_type,
            count = resources.len(),
            "Fetched bulk metrics batch"
        );
        Ok(Self { resources })
    }

    /// Fetch only when the generation uses bulk metrics
    pub async fn fetch_for(
        generation: Generation,
        client: &dyn ManagementClient,
        resource_type: &str,
        ids: Vec<String>,
        metrics: &[&str],
    ) -> Result<Self> {
        match generation {
            Generation::Legacy => Ok(Self::default()),
            Generation::Bulk => Self::fetch(client, resource_type, ids, metrics).await,
        }
    }

    pub fn resource(&self, id: &str) -> Result<BulkResource> {
        self.resources
            .get(id)
            .cloned()
            .ok_or_else(|| ExporterError::BulkBatch(format!("{} not in bulk batch", id)))
    }

    pub fn len(&self) -> usize {
        self.resources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.resources.is_empty()
    }
}

pub struct SdcRetriever {
    meta: SdcMeta,
    generation: Generation,
    client: Arc<dyn ManagementClient>,
    batch: Arc<BulkBatch>,
}

impl SdcRetriever {
    pub fn new(
        meta: SdcMeta,
        generation: Generation,
        client: Arc<dyn ManagementClient>,
        batch: Arc<BulkBatch>,
    ) -> Self {
        Self {
            meta,
            generation,
            client,
            batch,
        }
    }

    pub fn meta(&self) -> &SdcMeta {
        &self.meta
    }

    pub async fn record(&self) -> Result<SdcRecord> {
        let statistics = self.statistics().await?;
        Ok(SdcRecord {
            meta: self.meta.clone(),
            metrics: statistics.normalize(),
        })
    }
}

#[async_trait]
impl Retriever for SdcRetriever {
    type Statistics = IoStatistics;

    fn id(&self) -> &str {
        &self.meta.id
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn client(&self) -> &Arc<dyn ManagementClient> {
        &self.client
    }

    async fn statistics(&self) -> Result<IoStatistics> {
        match self.generation {
            Generation::Legacy => Ok(IoStatistics::Legacy(
                self.client.sdc_statistics(&self.meta.id).await?,
            )),
            Generation::Bulk => Ok(IoStatistics::Bulk(self.batch.resource(&self.meta.id)?)),
        }
    }
}

pub struct VolumeRetriever {
    meta: VolumeMeta,
    generation: Generation,
    client: Arc<dyn ManagementClient>,
    batch: Arc<BulkBatch>,
}

impl VolumeRetriever {
    pub fn new(
        meta: VolumeMeta,
        generation: Generation,
        client: Arc<dyn ManagementClient>,
        batch: Arc<BulkBatch>,
    ) -> Self {
        Self {
            meta,
            generation,
            client,
            batch,
        }
    }

    pub fn meta(&self) -> &VolumeMeta {
        &self.meta
    }

    pub async fn record(&self) -> Result<VolumeRecord> {
        let statistics = self.statistics().await?;
        Ok(VolumeRecord {
            meta: self.meta.clone(),
            metrics: statistics.normalize(),
        })
    }
}

#[async_trait]
impl Retriever for VolumeRetriever {
    type Statistics = IoStatistics;

    fn id(&self) -> &str {
        &self.meta.id
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn client(&self) -> &Arc<dyn ManagementClient> {
        &self.client
    }

    async fn statistics(&self) -> Result<IoStatistics> {
        match self.generation {
            Generation::Legacy => Ok(IoStatistics::Legacy(
                self.client.volume_statistics(&self.meta.id).await?,
            )),
            Generation::Bulk => Ok(IoStatistics::Bulk(self.batch.resource(&self.meta.id)?)),
        }
    }
}

pub struct StoragePoolRetriever {
    meta: StoragePoolMeta,
    generation: Generation,
    client: Arc<dyn ManagementClient>,
    batch: Arc<BulkBatch>,
}

impl StoragePoolRetriever {
    pub fn new(
        meta: StoragePoolMeta,
        generation: Generation,
        client: Arc<dyn ManagementClient>,
        batch: Arc<BulkBatch>,
    ) -> Self {
        Self {
            meta,
            generation,
            client,
            batch,
        }
    }

    pub fn meta(&self) -> &StoragePoolMeta {
        &self.meta
    }
}

#[async_trait]
impl Retriever for StoragePoolRetriever {
    type Statistics = CapacityStatistics;

    fn id(&self) -> &str {
        &self.meta.id
    }

    fn generation(&self) -> Generation {
        self.generation
    }

    fn client(&self) -> &Arc<dyn ManagementClient> {
        &self.client
    }

    async fn statistics(&self) -> Result<CapacityStatistics> {
        match self.generation {
            Generation::Legacy => Ok(CapacityStatistics::Legacy(
                self.client.storage_pool_statistics(&self.meta.id).await?,
            )),
            Generation::Bulk => Ok(CapacityStatistics::Bulk(
                self.batch.resource(&self.meta.id)?,
            )),
        }
    }
}

/// A storage class and the pool retrievers behind it
pub struct StorageClassRetriever {
    class: StorageClassMeta,
    pools: Vec<StoragePoolRetriever>,
}

impl StorageClassRetriever {
    pub fn new(class: StorageClassMeta, pools: Vec<StoragePoolRetriever>) -> Self {
        Self { class, pools }
    }

    pub fn class(&self) -> &StorageClassMeta {
        &self.class
    }

    pub fn pools(&self) -> &[StoragePoolRetriever] {
        &self.pools
    }

    /// Capacity of every pool that answered
    ///
    /// A pool whose statistics fail is skipped. The class fails only when it
    /// has pools and none of them answered.
    pub async fn record(&self) -> Result<StorageClassRecord> {
        let mut pools = Vec::with_capacity(self.pools.len());
        let mut last_error = None;

        for pool in &self.pools {
            match pool.statistics().await {
                Ok(statistics) => pools.push(PoolCapacity {
                    meta: pool.meta.clone(),
                    metrics: statistics.normalize(),
                }),
                Err(e) => {
                    warn!(
                        storage_pool_id = %pool.meta.id,
                        storage_class = %self.class.name,
                        error = %e,
                        "Skipping storage pool"
                    );
                    last_error = Some(e);
                }
            }
        }

        match last_error {
            Some(e) if pools.is_empty() => Err(e),
            _ => Ok(StorageClassRecord {
                class: self.class.clone(),
                pools,
            }),
        }
    }
}
