//! Statistics normalization tests
//!
//! Unit conversions for both statistics generations, plus properties that
//! must hold for arbitrary counter values.

mod common;

use common::{bulk_resource, bwc};
use powerflex_exporter::normalize::*;
use powerflex_exporter::powerflex::types::{Generation, IoCounters, StoragePoolCounters};
use proptest::prelude::*;

const GIB_IN_KB: u64 = 1 << 20;

fn approx(a: f64, b: f64) -> bool {
    (a - b).abs() < 1e-9
}

#[test]
fn test_legacy_io_window_normalization() {
    // Given: A 5 second window with 2560 KB read over 50 operations
    let counters = IoCounters {
        user_data_read_bwc: bwc(50, 5, 2560),
        user_data_write_bwc: bwc(10, 5, 5120),
        user_data_sdc_read_latency: bwc(4, 5, 8192),
        user_data_sdc_write_latency: bwc(0, 5, 100),
    };

    // When: Normalizing
    let metrics = IoStatistics::Legacy(counters).normalize();

    // Then: Bandwidth is MB/s, IOPS per second, latency per operation
    assert!(approx(metrics.read_bw_mbps, 0.5));
    assert!(approx(metrics.write_bw_mbps, 1.0));
    assert!(approx(metrics.read_iops, 10.0));
    assert!(approx(metrics.write_iops, 2.0));
    assert!(approx(metrics.read_latency_ms, 2.0));
    assert_eq!(metrics.write_latency_ms, 0.0, "no completed ops means zero latency");
}

#[test]
fn test_empty_window_yields_zero() {
    // Given: A window that never sampled
    let empty = bwc(0, 0, 0);

    // Then: All derived figures are zero instead of NaN
    assert_eq!(bandwidth_mbps(&empty), 0.0);
    assert_eq!(iops(&empty), 0.0);
    assert_eq!(latency_ms(&empty), 0.0);
}

#[test]
fn test_bulk_io_unit_conversion() {
    // Given: Bulk metrics in bytes/s and microseconds
    let resource = bulk_resource(
        "ec1",
        &[
            (HOST_READ_BANDWIDTH, 1_048_576.0),
            (HOST_WRITE_BANDWIDTH, 3_145_728.0),
            (HOST_READ_IOPS, 120.0),
            (HOST_WRITE_IOPS, 30.0),
            (HOST_READ_LATENCY, 2500.0),
            (HOST_WRITE_LATENCY, 750.0),
        ],
    );

    // When: Normalizing
    let metrics = IoStatistics::Bulk(resource).normalize();

    // Then: Bytes become MB and microseconds become milliseconds
    assert!(approx(metrics.read_bw_mbps, 1.0));
    assert!(approx(metrics.write_bw_mbps, 3.0));
    assert!(approx(metrics.read_iops, 120.0));
    assert!(approx(metrics.write_iops, 30.0));
    assert!(approx(metrics.read_latency_ms, 2.5));
    assert!(approx(metrics.write_latency_ms, 0.75));
}

#[test]
fn test_bulk_missing_metric_reads_as_zero() {
    // Given: A resource that only reports read bandwidth
    let resource = bulk_resource("ec1", &[(HOST_READ_BANDWIDTH, 2_097_152.0)]);

    // When: Normalizing
    let metrics = IoStatistics::Bulk(resource).normalize();

    // Then: Missing metrics are zero
    assert!(approx(metrics.read_bw_mbps, 2.0));
    assert_eq!(metrics.write_iops, 0.0);
    assert_eq!(metrics.write_latency_ms, 0.0);
}

#[test]
fn test_legacy_capacity_halves_mirrored_raw_capacity() {
    // Given: 10 GiB raw, 2 GiB spare, 4 GiB raw in use, 3 GiB provisioned
    let counters = StoragePoolCounters {
        max_capacity_in_kb: 10 * GIB_IN_KB,
        spare_capacity_in_kb: 2 * GIB_IN_KB,
        capacity_in_use_in_kb: 4 * GIB_IN_KB,
        primary_vac_in_kb: 3 * GIB_IN_KB,
    };

    // When: Normalizing
    let metrics = CapacityStatistics::Legacy(counters).normalize();

    // Then: Logical figures are half the raw ones
    assert!(approx(metrics.total_logical_gb, 4.0));
    assert!(approx(metrics.logical_in_use_gb, 2.0));
    assert!(approx(metrics.logical_available_gb, 2.0));
    assert!(approx(metrics.logical_provisioned_gb, 3.0));
}

#[test]
fn test_bulk_capacity_bytes_to_gigabytes() {
    // Given: Bulk capacity in bytes
    let gib = (1u64 << 30) as f64;
    let resource = bulk_resource(
        "pool-1",
        &[
            (LOGICAL_CAPACITY, 100.0 * gib),
            (LOGICAL_FREE, 60.0 * gib),
            (LOGICAL_USED, 40.0 * gib),
            (LOGICAL_PROVISIONED, 150.0 * gib),
        ],
    );

    // When: Normalizing
    let metrics = CapacityStatistics::Bulk(resource).normalize();

    // Then: Values are in GB
    assert_eq!(metrics.values(), [100.0, 60.0, 40.0, 150.0]);
}

#[test]
fn test_generation_from_version() {
    assert_eq!(Generation::from_version("3.6"), Generation::Legacy);
    assert_eq!(Generation::from_version("4.5"), Generation::Legacy);
    assert_eq!(Generation::from_version("5.0"), Generation::Bulk);
    assert_eq!(Generation::from_version("\"5.1\""), Generation::Bulk);
    assert_eq!(Generation::from_version("unknown"), Generation::Legacy);
    assert_eq!(Generation::Bulk.to_string(), "bulk");
}

proptest! {
    #[test]
    fn test_legacy_io_always_finite_and_non_negative(
        occurrences in any::<u64>(),
        seconds in any::<u64>(),
        weight in any::<u64>(),
    ) {
        // Given: Arbitrary window counters
        let window = bwc(occurrences, seconds, weight);
        let counters = IoCounters {
            user_data_read_bwc: window,
            user_data_write_bwc: window,
            user_data_sdc_read_latency: window,
            user_data_sdc_write_latency: window,
        };

        // When: Normalizing
        let metrics = IoStatistics::Legacy(counters).normalize();

        // Then: Every value is finite and non-negative
        for value in metrics.values() {
            prop_assert!(value.is_finite());
            prop_assert!(value >= 0.0);
        }
    }

    #[test]
    fn test_bulk_io_clamps_negative_samples(sample in -1e12f64..1e12) {
        // Given: A bulk sample that may be negative
        let resource = bulk_resource("ec1", &[
            (HOST_READ_BANDWIDTH, sample),
            (HOST_READ_LATENCY, sample),
        ]);

        // When: Normalizing
        let metrics = IoStatistics::Bulk(resource).normalize();

        // Then: Values never go below zero
        prop_assert!(metrics.read_bw_mbps >= 0.0);
        prop_assert!(metrics.read_latency_ms >= 0.0);
    }

    #[test]
    fn test_legacy_capacity_never_underflows(
        max in any::<u64>(),
        spare in any::<u64>(),
        in_use in any::<u64>(),
    ) {
        // Given: Counters where spare or in-use may exceed the maximum
        let counters = StoragePoolCounters {
            max_capacity_in_kb: max,
            spare_capacity_in_kb: spare,
            capacity_in_use_in_kb: in_use,
            primary_vac_in_kb: 0,
        };

        // When: Normalizing
        let metrics = CapacityStatistics::Legacy(counters).normalize();

        // Then: Available capacity is never negative
        prop_assert!(metrics.logical_available_gb >= 0.0);
        prop_assert!(metrics.total_logical_gb >= 0.0);
    }
}
