//! Volume Metrics Collector
//!
//! Collects I/O statistics for every driver-provisioned volume mapped to a
//! known SDC.
//!
//! # Metrics Produced
//! - `powerflex_volume_read_bw_megabytes_per_second`
//! - `powerflex_volume_write_bw_megabytes_per_second`
//! - `powerflex_volume_read_iops_per_second`
//! - `powerflex_volume_write_iops_per_second`
//! - `powerflex_volume_read_latency_milliseconds`
//! - `powerflex_volume_write_latency_milliseconds`
//!   - Labels: volume_id, volume_name, storage_system_id, persistent_volume,
//!     persistent_volume_claim, namespace, storage_class, mapped_node_ids,
//!     mapped_node_ips
//!
//! # Keep-alive
//!
//! A tick that finds no volumes still pushes one record with empty labels and
//! zero values, overwriting whatever the default series held before.

use super::{resolve_sdcs, CollectionContext, CollectionResult};
use crate::discovery::PersistentVolumeRef;
use crate::error::{ExporterError, Result};
use crate::normalize::IO_METRIC_NAMES;
use crate::pipeline;
use crate::records::{VolumeMeta, VolumeRecord};
use crate::retriever::{BulkBatch, VolumeRetriever};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

/// Build this tick's volume retrievers, one per volume ID
///
/// A volume mapped to several SDCs is visited once; later mappings only add
/// to its mapped node lists.
pub async fn enumerate_volumes(ctx: &CollectionContext) -> Result<Vec<VolumeRetriever>> {
    let (generation, sdcs) = resolve_sdcs(ctx).await?;

    let mut persistent_volumes: HashMap<String, PersistentVolumeRef> = HashMap::new();
    for driver in &ctx.driver_names {
        for pv in ctx.discovery.list_volumes(driver)? {
            persistent_volumes.insert(pv.volume_id.clone(), pv);
        }
    }

    let mut visited: HashMap<String, usize> = HashMap::new();
    let mut metas: Vec<VolumeMeta> = Vec::new();

    for sdc in &sdcs {
        let volumes = match ctx.client.sdc_volumes(&sdc.id).await {
            Ok(volumes) => volumes,
            Err(e) => {
                warn!(sdc_id = %sdc.id, error = %e, "Failed to list volumes mapped to SDC");
                continue;
            }
        };

        for volume in volumes {
            if let Some(&index) = visited.get(&volume.id) {
                metas[index].mapped_node_ids.push(sdc.id.clone());
                metas[index].mapped_node_ips.push(sdc.ip.clone());
                continue;
            }

            let Some(pv) = persistent_volumes.get(&volume.id) else {
                debug!(volume_id = %volume.id, "Volume is not managed by the driver");
                continue;
            };

            visited.insert(volume.id.clone(), metas.len());
            metas.push(VolumeMeta {
                id: volume.id.clone(),
                name: volume.name.clone(),
                storage_system_id: if pv.storage_system_id.is_empty() {
                    sdc.storage_system_id.clone()
                } else {
                    pv.storage_system_id.clone()
                },
                persistent_volume: pv.persistent_volume.clone(),
                persistent_volume_claim: pv.persistent_volume_claim.clone(),
                namespace: pv.namespace.clone(),
                storage_class: pv.storage_class.clone(),
                mapped_node_ids: vec![sdc.id.clone()],
                mapped_node_ips: vec![sdc.ip.clone()],
            });
        }
    }

    let ids = metas.iter().map(|m| m.id.clone()).collect();
    let batch = Arc::new(
        BulkBatch::fetch_for(generation, ctx.client.as_ref(), "volume", ids, &IO_METRIC_NAMES)
            .await?,
    );

    Ok(metas
        .into_iter()
        .map(|meta| VolumeRetriever::new(meta, generation, ctx.client.clone(), batch.clone()))
        .collect())
}

/// Collects volume I/O metrics
///
/// # Returns
///
/// * `Ok(n)` - `n` records were pushed (1 for the keep-alive record)
/// * `Err(_)` - Enumeration or the bulk batch failed; nothing was pushed
pub async fn collect_volume_metrics(ctx: &CollectionContext) -> CollectionResult {
    let retrievers = enumerate_volumes(ctx).await?;
    let total = retrievers.len();

    let records = if retrievers.is_empty() {
        debug!("No volumes found, publishing empty volume record");
        let (tx, rx) = mpsc::unbounded_channel();
        if tx.send(VolumeRecord::default()).is_err() {
            debug!("Empty volume record dropped");
        }
        rx
    } else {
        ctx.pool.gather(
            "volume",
            pipeline::source(retrievers),
            |retriever: VolumeRetriever| async move { retriever.record().await },
        )
    };

    let cache = ctx.cache.clone();
    let pushed = pipeline::push("volume", records, move |record: VolumeRecord| {
        cache.record_volume(&record)?;
        Ok::<_, ExporterError>(record.meta.id)
    });

    let pushed = pipeline::drain(pushed).await.len();
    info!("Updated volume metrics for {}/{} volumes", pushed, total);
    Ok(pushed)
}
