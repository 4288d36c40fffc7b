//! Statistics Normalization
//!
//! Both statistics generations are reduced to the same units here, so that
//! everything downstream of the gather stage is generation-agnostic:
//!
//! | Field     | Unit  | Legacy source                         | Bulk source                  |
//! |-----------|-------|---------------------------------------|------------------------------|
//! | bandwidth | MB/s  | `totalWeightInKb / numSeconds / 1024` | `host_*_bandwidth` B/s ÷ 2²⁰ |
//! | IOPS      | ops/s | `numOccurrences / numSeconds`         | `host_*_iops`                |
//! | latency   | ms    | `totalWeightInKb / numOccurrences / 1024` | `host_*_latency` µs ÷ 1000 |
//! | capacity  | GB    | KB counters ÷ 2²⁰                     | `logical_*` bytes ÷ 2³⁰      |
//!
//! Every value is finite and non-negative. A zero divisor or a missing
//! metric yields 0.

use crate::powerflex::types::{Bwc, BulkResource, IoCounters, StoragePoolCounters};

pub const HOST_READ_BANDWIDTH: &str = "host_read_bandwidth";
pub const HOST_WRITE_BANDWIDTH: &str = "host_write_bandwidth";
pub const HOST_READ_IOPS: &str = "host_read_iops";
pub const HOST_WRITE_IOPS: &str = "host_write_iops";
pub const HOST_READ_LATENCY: &str = "host_read_latency";
pub const HOST_WRITE_LATENCY: &str = "host_write_latency";

pub const LOGICAL_CAPACITY: &str = "logical_capacity";
pub const LOGICAL_FREE: &str = "logical_free";
pub const LOGICAL_USED: &str = "logical_used";
pub const LOGICAL_PROVISIONED: &str = "logical_provisioned";

/// Metric names requested for SDCs and volumes in bulk mode
pub const IO_METRIC_NAMES: [&str; 6] = [
    HOST_READ_BANDWIDTH,
    HOST_WRITE_BANDWIDTH,
    HOST_READ_IOPS,
    HOST_WRITE_IOPS,
    HOST_READ_LATENCY,
    HOST_WRITE_LATENCY,
];

/// Metric names requested for storage pools in bulk mode
pub const CAPACITY_METRIC_NAMES: [&str; 4] = [
    LOGICAL_CAPACITY,
    LOGICAL_FREE,
    LOGICAL_USED,
    LOGICAL_PROVISIONED,
];

const BYTES_PER_MB: f64 = (1u64 << 20) as f64;
const BYTES_PER_GB: f64 = (1u64 << 30) as f64;
const KB_PER_GB: f64 = (1u64 << 20) as f64;
const MICROS_PER_MILLI: f64 = 1000.0;

/// Normalized I/O figures for one SDC or volume
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct IoMetrics {
    pub read_bw_mbps: f64,
    pub write_bw_mbps: f64,
    pub read_iops: f64,
    pub write_iops: f64,
    pub read_latency_ms: f64,
    pub write_latency_ms: f64,
}

impl IoMetrics {
    /// Values in the order of [`crate::cache::IO_SERIES`]
    pub fn values(&self) -> [f64; 6] {
        [
            self.read_bw_mbps,
            self.write_bw_mbps,
            self.read_iops,
            self.write_iops,
            self.read_latency_ms,
            self.write_latency_ms,
        ]
    }
}

/// Normalized capacity figures for one storage pool
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct CapacityMetrics {
    pub total_logical_gb: f64,
    pub logical_available_gb: f64,
    pub logical_in_use_gb: f64,
    pub logical_provisioned_gb: f64,
}

impl CapacityMetrics {
    /// Values in the order of [`crate::cache::CAPACITY_SERIES`]
    pub fn values(&self) -> [f64; 4] {
        [
            self.total_logical_gb,
            self.logical_available_gb,
            self.logical_in_use_gb,
            self.logical_provisioned_gb,
        ]
    }
}

/// Raw I/O statistics tagged by the generation that produced them
#[derive(Debug, Clone)]
pub enum IoStatistics {
    Legacy(IoCounters),
    Bulk(BulkResource),
}

impl IoStatistics {
    pub fn normalize(&self) -> IoMetrics {
        match self {
            IoStatistics::Legacy(counters) => IoMetrics {
                read_bw_mbps: bandwidth_mbps(&counters.user_data_read_bwc),
                write_bw_mbps: bandwidth_mbps(&counters.user_data_write_bwc),
                read_iops: iops(&counters.user_data_read_bwc),
                write_iops: iops(&counters.user_data_write_bwc),
                read_latency_ms: latency_ms(&counters.user_data_sdc_read_latency),
                write_latency_ms: latency_ms(&counters.user_data_sdc_write_latency),
            },
            IoStatistics::Bulk(resource) => IoMetrics {
                read_bw_mbps: non_negative(resource.value(HOST_READ_BANDWIDTH) / BYTES_PER_MB),
                write_bw_mbps: non_negative(resource.value(HOST_WRITE_BANDWIDTH) / BYTES_PER_MB),
                read_iops: non_negative(resource.value(HOST_READ_IOPS)),
                write_iops: non_negative(resource.value(HOST_WRITE_IOPS)),
                read_latency_ms: non_negative(
                    resource.value(HOST_READ_LATENCY) / MICROS_PER_MILLI,
                ),
                write_latency_ms: non_negative(
                    resource.value(HOST_WRITE_LATENCY) / MICROS_PER_MILLI,
                ),
            },
        }
    }
}

/// Raw pool capacity statistics tagged by generation
#[derive(Debug, Clone)]
pub enum CapacityStatistics {
    Legacy(StoragePoolCounters),
    Bulk(BulkResource),
}

impl CapacityStatistics {
    pub fn normalize(&self) -> CapacityMetrics {
        match self {
            CapacityStatistics::Legacy(counters) => {
                // Raw capacity is mirrored, so logical capacity is half of it
                let total_kb = counters
                    .max_capacity_in_kb
                    .saturating_sub(counters.spare_capacity_in_kb)
                    / 2;
                let in_use_kb = counters.capacity_in_use_in_kb / 2;
                CapacityMetrics {
                    total_logical_gb: total_kb as f64 / KB_PER_GB,
                    logical_available_gb: total_kb.saturating_sub(in_use_kb) as f64 / KB_PER_GB,
                    logical_in_use_gb: in_use_kb as f64 / KB_PER_GB,
                    logical_provisioned_gb: counters.primary_vac_in_kb as f64 / KB_PER_GB,
                }
            }
            CapacityStatistics::Bulk(resource) => CapacityMetrics {
                total_logical_gb: non_negative(resource.value(LOGICAL_CAPACITY) / BYTES_PER_GB),
                logical_available_gb: non_negative(resource.value(LOGICAL_FREE) / BYTES_PER_GB),
                logical_in_use_gb: non_negative(resource.value(LOGICAL_USED) / BYTES_PER_GB),
                logical_provisioned_gb: non_negative(
                    resource.value(LOGICAL_PROVISIONED) / BYTES_PER_GB,
                ),
            },
        }
    }
}

/// MB/s from a bandwidth window, 0 for an empty window
pub fn bandwidth_mbps(bwc: &Bwc) -> f64 {
    if bwc.num_seconds == 0 {
        return 0.0;
    }
    bwc.total_weight_in_kb as f64 / bwc.num_seconds as f64 / 1024.0
}

/// Operations per second from a bandwidth window, 0 for an empty window
pub fn iops(bwc: &Bwc) -> f64 {
    if bwc.num_seconds == 0 {
        return 0.0;
    }
    bwc.num_occurrences as f64 / bwc.num_seconds as f64
}

/// Milliseconds per operation from a latency window, 0 when nothing completed
pub fn latency_ms(bwc: &Bwc) -> f64 {
    if bwc.num_occurrences == 0 {
        return 0.0;
    }
    bwc.total_weight_in_kb as f64 / bwc.num_occurrences as f64 / 1024.0
}

fn non_negative(value: f64) -> f64 {
    if value.is_finite() && value > 0.0 {
        value
    } else {
        0.0
    }
}
