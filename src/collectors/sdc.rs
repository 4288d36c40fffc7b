//! SDC Metrics Collector
//!
//! Collects per-node I/O statistics from the storage data client (SDC)
//! running on each cluster node.
//!
//! # Metrics Produced
//! - `powerflex_export_node_read_bw_megabytes_per_second`
//! - `powerflex_export_node_write_bw_megabytes_per_second`
//! - `powerflex_export_node_read_iops_per_second`
//! - `powerflex_export_node_write_iops_per_second`
//! - `powerflex_export_node_read_latency_milliseconds`
//! - `powerflex_export_node_write_latency_milliseconds`
//!   - Labels: sdc_id, sdc_name, ip, node_name, storage_system_id

use super::{resolve_sdcs, CollectionContext, CollectionResult};
use crate::error::{ExporterError, Result};
use crate::normalize::IO_METRIC_NAMES;
use crate::pipeline;
use crate::records::SdcRecord;
use crate::retriever::{BulkBatch, SdcRetriever};
use std::sync::Arc;
use tracing::info;

/// Build this tick's SDC retrievers
pub async fn enumerate_sdcs(ctx: &CollectionContext) -> Result<Vec<SdcRetriever>> {
    let (generation, metas) = resolve_sdcs(ctx).await?;

    let ids = metas.iter().map(|m| m.id.clone()).collect();
    let batch = Arc::new(
        BulkBatch::fetch_for(generation, ctx.client.as_ref(), "sdc", ids, &IO_METRIC_NAMES).await?,
    );

    Ok(metas
        .into_iter()
        .map(|meta| SdcRetriever::new(meta, generation, ctx.client.clone(), batch.clone()))
        .collect())
}

/// Collects SDC I/O metrics
///
/// # Returns
///
/// * `Ok(n)` - `n` SDCs were pushed to the instrument cache
/// * `Err(_)` - Enumeration or the bulk batch failed; nothing was pushed
pub async fn collect_sdc_metrics(ctx: &CollectionContext) -> CollectionResult {
    let retrievers = enumerate_sdcs(ctx).await?;
    let total = retrievers.len();

    let records = ctx.pool.gather(
        "sdc",
        pipeline::source(retrievers),
        |retriever: SdcRetriever| async move { retriever.record().await },
    );

    let cache = ctx.cache.clone();
    let pushed = pipeline::push("sdc", records, move |record: SdcRecord| {
        cache.record_sdc(&record)?;
        Ok::<_, ExporterError>(record.meta.id)
    });

    let pushed = pipeline::drain(pushed).await.len();
    info!("Updated sdc metrics for {}/{} SDCs", pushed, total);
    Ok(pushed)
}
