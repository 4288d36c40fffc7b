//! Instrument cache tests
//!
//! One instrument set per entity, relabeling on metadata change, and cleanup
//! when instrument creation fails part way.

mod common;

use common::RecordingMeter;
use powerflex_exporter::cache::{MetricsWrapper, IO_SERIES};
use powerflex_exporter::metrics::PrometheusMeter;
use powerflex_exporter::normalize::{CapacityMetrics, IoMetrics};
use powerflex_exporter::records::*;
use std::sync::Arc;

fn sdc_record(id: &str, name: &str, read_bw: f64) -> SdcRecord {
    SdcRecord {
        meta: SdcMeta {
            id: id.to_string(),
            name: name.to_string(),
            ip: "10.0.0.1".to_string(),
            node_name: "worker-1".to_string(),
            storage_system_id: "system-1".to_string(),
        },
        metrics: IoMetrics {
            read_bw_mbps: read_bw,
            ..Default::default()
        },
    }
}

const READ_BW: &str = "powerflex_export_node_read_bw_megabytes_per_second";

#[test]
fn test_repeated_record_reuses_instruments() {
    // Given: A cache over a recording meter
    let meter = Arc::new(RecordingMeter::default());
    let cache = MetricsWrapper::new(meter.clone());

    // When: The same SDC is recorded twice with new values
    cache.record_sdc(&sdc_record("s1", "alpha", 1.0)).unwrap();
    cache.record_sdc(&sdc_record("s1", "alpha", 2.5)).unwrap();

    // Then: One instrument set exists and carries the latest value
    assert_eq!(cache.len(EntityKind::Sdc), 1);
    assert_eq!(meter.created.lock().unwrap().len(), IO_SERIES.len());
    assert_eq!(meter.value(READ_BW, "sdc_id", "s1"), Some(2.5));
}

#[test]
fn test_label_change_recreates_instruments() {
    // Given: An SDC recorded under name "alpha"
    let meter = Arc::new(RecordingMeter::default());
    let cache = MetricsWrapper::new(meter.clone());
    cache.record_sdc(&sdc_record("s1", "alpha", 1.0)).unwrap();

    // When: The SDC is renamed
    cache.record_sdc(&sdc_record("s1", "beta", 3.0)).unwrap();

    // Then: The old series are retired and the new labels are current
    assert_eq!(cache.len(EntityKind::Sdc), 1);
    assert_eq!(meter.retired_count(), IO_SERIES.len());
    assert_eq!(meter.live_series(), IO_SERIES.len());
    let labels = cache.labels(EntityKind::Sdc, "s1").unwrap();
    assert_eq!(labels.get("sdc_name"), Some("beta"));
    assert_eq!(meter.value(READ_BW, "sdc_name", "beta"), Some(3.0));
}

#[test]
fn test_partial_creation_failure_discards_set() {
    // Given: A meter that refuses the write IOPS series
    let meter = Arc::new(RecordingMeter::default());
    meter.fail_on("write_iops_per_second");
    let cache = MetricsWrapper::new(meter.clone());

    // When: Recording an SDC
    let result = cache.record_sdc(&sdc_record("s1", "alpha", 1.0));

    // Then: Nothing is cached and the already created series are retired
    assert!(result.is_err());
    assert!(cache.is_empty(EntityKind::Sdc));
    assert_eq!(meter.retired_count(), 3);
    assert_eq!(meter.live_series(), 0);
}

#[test]
fn test_failed_relabel_keeps_previous_set() {
    // Given: An SDC recorded successfully
    let meter = Arc::new(RecordingMeter::default());
    let cache = MetricsWrapper::new(meter.clone());
    cache.record_sdc(&sdc_record("s1", "alpha", 1.0)).unwrap();

    // When: A relabel fails during creation
    meter.fail_on("read_latency_milliseconds");
    let result = cache.record_sdc(&sdc_record("s1", "beta", 2.0));

    // Then: The entity keeps its previous labels
    assert!(result.is_err());
    let labels = cache.labels(EntityKind::Sdc, "s1").unwrap();
    assert_eq!(labels.get("sdc_name"), Some("alpha"));
}

#[test]
fn test_volume_labels_join_mapped_nodes() {
    // Given: A volume mapped to two SDCs
    let meter = Arc::new(RecordingMeter::default());
    let cache = MetricsWrapper::new(meter);
    let record = VolumeRecord {
        meta: VolumeMeta {
            id: "v1".to_string(),
            name: "vol-1".to_string(),
            mapped_node_ids: vec!["s1".to_string(), "s2".to_string()],
            mapped_node_ips: vec!["10.0.0.1".to_string(), "10.0.0.2".to_string()],
            ..Default::default()
        },
        metrics: IoMetrics::default(),
    };

    // When: Recording it
    cache.record_volume(&record).unwrap();

    // Then: Node lists are joined with a double underscore
    let labels = cache.labels(EntityKind::Volume, "v1").unwrap();
    assert_eq!(labels.get("mapped_node_ids"), Some("s1__s2"));
    assert_eq!(labels.get("mapped_node_ips"), Some("10.0.0.1__10.0.0.2"));
}

#[test]
fn test_storage_class_fans_out_per_pool() {
    // Given: A storage class backed by two pools
    let meter = Arc::new(RecordingMeter::default());
    let cache = MetricsWrapper::new(meter.clone());
    let class = StorageClassMeta {
        name: "vxflexos".to_string(),
        driver: "csi-vxflexos.dellemc.com".to_string(),
        storage_system_id: "system-1".to_string(),
    };
    let pool = |id: &str, total: f64| PoolCapacity {
        meta: StoragePoolMeta {
            id: id.to_string(),
            name: format!("{}-name", id),
        },
        metrics: CapacityMetrics {
            total_logical_gb: total,
            ..Default::default()
        },
    };
    let record = StorageClassRecord {
        class,
        pools: vec![pool("p1", 100.0), pool("p2", 200.0)],
    };

    // When: Recording the class
    cache.record_capacity(&record).unwrap();

    // Then: Each pool has its own series labeled with the class
    assert_eq!(cache.len(EntityKind::StoragePool), 2);
    let labels = cache.labels(EntityKind::StoragePool, "p2").unwrap();
    assert_eq!(labels.get("storage_class"), Some("vxflexos"));
    assert_eq!(
        meter.value(
            "powerflex_storage_pool_total_logical_capacity_gigabytes",
            "storage_pool_id",
            "p2"
        ),
        Some(200.0)
    );
}

#[test]
fn test_relabel_removes_stale_prometheus_series() {
    // Given: A cache backed by the Prometheus meter
    let meter = PrometheusMeter::new().unwrap();
    let cache = MetricsWrapper::new(Arc::new(meter.clone()));
    cache.record_sdc(&sdc_record("s1", "alpha", 1.0)).unwrap();
    assert!(meter.render().unwrap().contains("sdc_name=\"alpha\""));

    // When: The SDC is renamed
    cache.record_sdc(&sdc_record("s1", "beta", 1.0)).unwrap();

    // Then: Only the new series is exported
    let rendered = meter.render().unwrap();
    assert!(rendered.contains("sdc_name=\"beta\""));
    assert!(!rendered.contains("sdc_name=\"alpha\""));
}
