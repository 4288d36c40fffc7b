//! Storage Pool Metrics Collector
//!
//! Collects logical capacity for every storage pool referenced by a driver
//! storage class. A class may draw from several pools; each pool is exported
//! under its own pool ID. A pool listed by several classes is exported once
//! per tick, under the first class that lists it in inventory order.
//!
//! # Metrics Produced
//! - `powerflex_storage_pool_total_logical_capacity_gigabytes`
//! - `powerflex_storage_pool_logical_capacity_available_gigabytes`
//! - `powerflex_storage_pool_logical_capacity_in_use_gigabytes`
//! - `powerflex_storage_pool_logical_provisioned_gigabytes`
//!   - Labels: storage_pool_id, storage_pool_name, storage_class, driver,
//!     storage_system_id

use super::{CollectionContext, CollectionResult};
use crate::error::{ExporterError, Result};
use crate::normalize::CAPACITY_METRIC_NAMES;
use crate::pipeline;
use crate::powerflex::types::StoragePool;
use crate::records::{StorageClassMeta, StorageClassRecord, StoragePoolMeta};
use crate::retriever::{BulkBatch, StorageClassRetriever, StoragePoolRetriever};
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Build this tick's storage class retrievers
pub async fn enumerate_storage_classes(
    ctx: &CollectionContext,
) -> Result<Vec<StorageClassRetriever>> {
    let generation = ctx.client.generation().await?;

    let mut classes = Vec::new();
    for driver in &ctx.driver_names {
        classes.extend(ctx.discovery.list_storage_classes(driver)?);
    }

    let pools = ctx.client.list_storage_pools().await?;
    let by_name: HashMap<&str, &StoragePool> =
        pools.iter().map(|p| (p.name.as_str(), p)).collect();

    // Resolve names first so the bulk batch can cover every pool at once
    let mut resolved: Vec<(StorageClassMeta, Vec<StoragePoolMeta>)> = Vec::new();
    let mut pool_ids = BTreeSet::new();
    for class in classes {
        let mut metas = Vec::new();
        for name in &class.storage_pools {
            match by_name.get(name.as_str()) {
                Some(pool) => {
                    if !pool_ids.insert(pool.id.clone()) {
                        debug!(
                            storage_class = %class.name,
                            storage_pool = %name,
                            "Storage pool already exported by an earlier class"
                        );
                        continue;
                    }
                    metas.push(StoragePoolMeta {
                        id: pool.id.clone(),
                        name: pool.name.clone(),
                    });
                }
                None => warn!(
                    storage_class = %class.name,
                    storage_pool = %name,
                    "Storage pool not found on gateway"
                ),
            }
        }
        resolved.push((
            StorageClassMeta {
                name: class.name,
                driver: class.driver,
                storage_system_id: class.storage_system_id,
            },
            metas,
        ));
    }

    let batch = Arc::new(
        BulkBatch::fetch_for(
            generation,
            ctx.client.as_ref(),
            "storage_pool",
            pool_ids.into_iter().collect(),
            &CAPACITY_METRIC_NAMES,
        )
        .await?,
    );

    Ok(resolved
        .into_iter()
        .map(|(class, metas)| {
            let pools = metas
                .into_iter()
                .map(|meta| {
                    StoragePoolRetriever::new(meta, generation, ctx.client.clone(), batch.clone())
                })
                .collect();
            StorageClassRetriever::new(class, pools)
        })
        .collect())
}

/// Collects storage pool capacity metrics
///
/// # Returns
///
/// * `Ok(n)` - `n` storage classes were pushed to the instrument cache
/// * `Err(_)` - Enumeration or the bulk batch failed; nothing was pushed
pub async fn collect_storage_pool_metrics(ctx: &CollectionContext) -> CollectionResult {
    let retrievers = enumerate_storage_classes(ctx).await?;
    let total = retrievers.len();

    let records = ctx.pool.gather(
        "storage_pool",
        pipeline::source(retrievers),
        |retriever: StorageClassRetriever| async move { retriever.record().await },
    );

    let cache = ctx.cache.clone();
    let pushed = pipeline::push("storage_pool", records, move |record: StorageClassRecord| {
        cache.record_capacity(&record)?;
        Ok::<_, ExporterError>(record.class.name)
    });

    let pushed = pipeline::drain(pushed).await.len();
    info!(
        "Updated storage pool metrics for {}/{} storage classes",
        pushed, total
    );
    Ok(pushed)
}
