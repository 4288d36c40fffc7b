//! Instrument Cache
//!
//! [`MetricsWrapper`] maps each entity ID to the instruments exported for it
//! and the labels they were created with.
//!
//! # Entity Lifecycle
//!
//! ```text
//! absent ──record──► active(L0) ──record, labels differ──► active(L1) ──► ...
//! ```
//!
//! Entries are never removed: an entity that disappears keeps its last
//! value until it reports again. When a label value changes the instrument
//! set is rebuilt under the new labels and the old series are retired.
//!
//! # Concurrency
//!
//! Each entity kind lives in its own [`DashMap`]. Rebuilding one entity's
//! instruments holds only that entry's shard, so push workers for other
//! entities proceed in parallel.

use crate::error::Result;
use crate::metrics::{Instrument, LabelSet, Meter};
use crate::records::{EntityKind, SdcRecord, StorageClassRecord, VolumeRecord};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::sync::Arc;
use tracing::{debug, warn};

/// Name suffix and help text of one exported series
#[derive(Debug, Clone, Copy)]
pub struct SeriesSpec {
    pub suffix: &'static str,
    pub help: &'static str,
}

pub const SDC_PREFIX: &str = "powerflex_export_node";
pub const VOLUME_PREFIX: &str = "powerflex_volume";
pub const STORAGE_POOL_PREFIX: &str = "powerflex_storage_pool";

/// I/O series, in the order of [`crate::normalize::IoMetrics::values`]
pub const IO_SERIES: [SeriesSpec; 6] = [
    SeriesSpec {
        suffix: "read_bw_megabytes_per_second",
        help: "Read bandwidth in MB/s",
    },
    SeriesSpec {
        suffix: "write_bw_megabytes_per_second",
        help: "Write bandwidth in MB/s",
    },
    SeriesSpec {
        suffix: "read_iops_per_second",
        help: "Read operations per second",
    },
    SeriesSpec {
        suffix: "write_iops_per_second",
        help: "Write operations per second",
    },
    SeriesSpec {
        suffix: "read_latency_milliseconds",
        help: "Average read latency in milliseconds",
    },
    SeriesSpec {
        suffix: "write_latency_milliseconds",
        help: "Average write latency in milliseconds",
    },
];

/// Capacity series, in the order of [`crate::normalize::CapacityMetrics::values`]
pub const CAPACITY_SERIES: [SeriesSpec; 4] = [
    SeriesSpec {
        suffix: "total_logical_capacity_gigabytes",
        help: "Total logical capacity in GB",
    },
    SeriesSpec {
        suffix: "logical_capacity_available_gigabytes",
        help: "Available logical capacity in GB",
    },
    SeriesSpec {
        suffix: "logical_capacity_in_use_gigabytes",
        help: "Logical capacity in use in GB",
    },
    SeriesSpec {
        suffix: "logical_provisioned_gigabytes",
        help: "Logical capacity provisioned to volumes in GB",
    },
];

/// Instruments of one entity plus the labels they carry
pub struct InstrumentSet {
    labels: LabelSet,
    instruments: Vec<Box<dyn Instrument>>,
}

impl InstrumentSet {
    /// Create every series in `specs`; on failure retire the ones already made
    fn create(
        meter: &dyn Meter,
        prefix: &str,
        specs: &[SeriesSpec],
        labels: LabelSet,
    ) -> Result<Self> {
        let mut instruments: Vec<Box<dyn Instrument>> = Vec::with_capacity(specs.len());
        for spec in specs {
            let name = format!("{}_{}", prefix, spec.suffix);
            match meter.create_instrument(&name, spec.help, &labels) {
                Ok(instrument) => instruments.push(instrument),
                Err(e) => {
                    for created in &instruments {
                        created.retire();
                    }
                    return Err(e);
                }
            }
        }
        Ok(Self {
            labels,
            instruments,
        })
    }

    fn apply(&self, values: &[f64]) {
        for (instrument, value) in self.instruments.iter().zip(values) {
            instrument.set(*value);
        }
    }

    fn retire(&self) {
        for instrument in &self.instruments {
            instrument.retire();
        }
    }

    pub fn labels(&self) -> &LabelSet {
        &self.labels
    }
}

pub struct MetricsWrapper {
    meter: Arc<dyn Meter>,
    sdcs: DashMap<String, InstrumentSet>,
    volumes: DashMap<String, InstrumentSet>,
    pools: DashMap<String, InstrumentSet>,
}

impl MetricsWrapper {
    pub fn new(meter: Arc<dyn Meter>) -> Self {
        Self {
            meter,
            sdcs: DashMap::new(),
            volumes: DashMap::new(),
            pools: DashMap::new(),
        }
    }

    pub fn record_sdc(&self, record: &SdcRecord) -> Result<()> {
        self.record(
            &self.sdcs,
            SDC_PREFIX,
            &IO_SERIES,
            &record.meta.id,
            record.meta.labels(),
            &record.metrics.values(),
        )
    }

    pub fn record_volume(&self, record: &VolumeRecord) -> Result<()> {
        self.record(
            &self.volumes,
            VOLUME_PREFIX,
            &IO_SERIES,
            &record.meta.id,
            record.meta.labels(),
            &record.metrics.values(),
        )
    }

    /// Record every pool of a storage class, each under its own pool ID
    ///
    /// A failing pool does not stop the others; the first error is returned
    /// after all pools were attempted.
    pub fn record_capacity(&self, record: &StorageClassRecord) -> Result<()> {
        let mut first_error = None;
        for pool in &record.pools {
            let result = self.record(
                &self.pools,
                STORAGE_POOL_PREFIX,
                &CAPACITY_SERIES,
                &pool.meta.id,
                pool.meta.labels(&record.class),
                &pool.metrics.values(),
            );
            if let Err(e) = result {
                warn!(
                    storage_pool_id = %pool.meta.id,
                    storage_class = %record.class.name,
                    error = %e,
                    "Failed to record storage pool capacity"
                );
                first_error.get_or_insert(e);
            }
        }
        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    /// Labels currently attached to an entity, if it was ever recorded
    pub fn labels(&self, kind: EntityKind, id: &str) -> Option<LabelSet> {
        self.map(kind).get(id).map(|set| set.labels().clone())
    }

    /// Number of entities of `kind` holding instruments
    pub fn len(&self, kind: EntityKind) -> usize {
        self.map(kind).len()
    }

    pub fn is_empty(&self, kind: EntityKind) -> bool {
        self.map(kind).is_empty()
    }

    fn map(&self, kind: EntityKind) -> &DashMap<String, InstrumentSet> {
        match kind {
            EntityKind::Sdc => &self.sdcs,
            EntityKind::Volume => &self.volumes,
            EntityKind::StoragePool => &self.pools,
        }
    }

    fn record(
        &self,
        map: &DashMap<String, InstrumentSet>,
        prefix: &str,
        specs: &[SeriesSpec],
        id: &str,
        labels: LabelSet,
        values: &[f64],
    ) -> Result<()> {
        match map.entry(id.to_string()) {
            Entry::Occupied(mut entry) => {
                if entry.get().labels != labels {
                    debug!(entity_id = id, prefix = prefix, "Labels changed, recreating instruments");
                    let fresh = InstrumentSet::create(self.meter.as_ref(), prefix, specs, labels)?;
                    let stale = entry.insert(fresh);
                    stale.retire();
                }
                entry.get().apply(values);
            }
            Entry::Vacant(entry) => {
                let set = InstrumentSet::create(self.meter.as_ref(), prefix, specs, labels)?;
                set.apply(values);
                entry.insert(set);
            }
        }
        Ok(())
    }
}
