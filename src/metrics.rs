//! Prometheus Metric Transport
//!
//! This module is the exporter side of collection. Entity series are created
//! on demand through the [`Meter`] / [`Instrument`] interface, which the
//! instrument cache in [`crate::cache`] drives; [`PrometheusMeter`] backs it
//! with a Prometheus registry that the HTTP server renders on `/metrics`.
//!
//! # Metric Families
//!
//! - `powerflex_export_node_*` - per-SDC bandwidth, IOPS and latency
//! - `powerflex_volume_*` - per-volume bandwidth, IOPS and latency
//! - `powerflex_storage_pool_*` - per-pool logical capacity
//! - `powerflex_up` - 1 when the last authentication succeeded
//! - `powerflex_collection_*` - per-kind tick bookkeeping
//!
//! # Metric Types
//!
//! Entity series are gauges holding the last collected value. Each tick
//! overwrites the previous sample instead of accumulating.

use crate::error::{ExporterError, Result};
use prometheus::{
    Encoder, Gauge, GaugeVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// Ordered label key/value pairs attached to one entity's series
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LabelSet(Vec<(&'static str, String)>);

impl LabelSet {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn with(mut self, key: &'static str, value: impl Into<String>) -> Self {
        self.0.push((key, value.into()));
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0
            .iter()
            .find(|(k, _)| *k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn keys(&self) -> Vec<&'static str> {
        self.0.iter().map(|(k, _)| *k).collect()
    }

    pub fn values(&self) -> Vec<&str> {
        self.0.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// One exported series
pub trait Instrument: Send + Sync {
    /// Replace the current value
    fn set(&self, value: f64);

    /// Remove the series from the exporter
    fn retire(&self);
}

/// Factory for entity series
pub trait Meter: Send + Sync {
    fn create_instrument(
        &self,
        name: &str,
        help: &str,
        labels: &LabelSet,
    ) -> Result<Box<dyn Instrument>>;
}

struct Family {
    keys: Vec<&'static str>,
    vec: GaugeVec,
}

/// Gauge child bound to one label combination
struct PrometheusGauge {
    vec: GaugeVec,
    values: Vec<String>,
    gauge: Gauge,
}

impl Instrument for PrometheusGauge {
    fn set(&self, value: f64) {
        self.gauge.set(value);
    }

    fn retire(&self) {
        let values: Vec<&str> = self.values.iter().map(String::as_str).collect();
        // Already gone when an identical set was retired first
        let _ = self.vec.remove_label_values(&values);
    }
}

/// Prometheus-backed [`Meter`] plus the exporter's own health series
#[derive(Clone)]
pub struct PrometheusMeter {
    registry: Arc<Registry>,
    families: Arc<Mutex<HashMap<String, Family>>>,

    pub up: Arc<Gauge>,
    pub collection_duration_seconds: Arc<GaugeVec>,
    pub collected_entities: Arc<GaugeVec>,
    pub collection_failures_total: Arc<IntCounterVec>,
}

impl PrometheusMeter {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let up = Gauge::with_opts(
            Opts::new("up", "PowerFlex gateway reachable and authenticated (1=yes, 0=no)")
                .namespace("powerflex"),
        )?;

        let collection_duration_seconds = GaugeVec::new(
            Opts::new(
                "collection_duration_seconds",
                "Wall time of the last collection tick",
            )
            .namespace("powerflex"),
            &["kind"],
        )?;

        let collected_entities = GaugeVec::new(
            Opts::new(
                "collection_entities",
                "Entities pushed to the exporter in the last collection tick",
            )
            .namespace("powerflex"),
            &["kind"],
        )?;

        let collection_failures_total = IntCounterVec::new(
            Opts::new(
                "collection_failures_total",
                "Collection ticks aborted by an error",
            )
            .namespace("powerflex"),
            &["kind"],
        )?;

        registry.register(Box::new(up.clone()))?;
        registry.register(Box::new(collection_duration_seconds.clone()))?;
        registry.register(Box::new(collected_entities.clone()))?;
        registry.register(Box::new(collection_failures_total.clone()))?;

        Ok(Self {
            registry: Arc::new(registry),
            families: Arc::new(Mutex::new(HashMap::new())),
            up: Arc::new(up),
            collection_duration_seconds: Arc::new(collection_duration_seconds),
            collected_entities: Arc::new(collected_entities),
            collection_failures_total: Arc::new(collection_failures_total),
        })
    }

    /// Render metrics in Prometheus text format
    pub fn render(&self) -> anyhow::Result<String> {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Meter for PrometheusMeter {
    fn create_instrument(
        &self,
        name: &str,
        help: &str,
        labels: &LabelSet,
    ) -> Result<Box<dyn Instrument>> {
        let keys = labels.keys();
        let mut families = self
            .families
            .lock()
            .map_err(|_| ExporterError::Instrument("metric family table poisoned".to_string()))?;

        let vec = match families.get(name) {
            Some(family) if family.keys == keys => family.vec.clone(),
            Some(family) => {
                return Err(ExporterError::Instrument(format!(
                    "{} is registered with labels {:?}, not {:?}",
                    name, family.keys, keys
                )));
            }
            None => {
                let vec = GaugeVec::new(Opts::new(name, help), &keys)?;
                self.registry.register(Box::new(vec.clone()))?;
                families.insert(
                    name.to_string(),
                    Family {
                        keys,
                        vec: vec.clone(),
                    },
                );
                vec
            }
        };

        let gauge = vec.get_metric_with_label_values(&labels.values())?;
        Ok(Box::new(PrometheusGauge {
            vec,
            values: labels.values().into_iter().map(str::to_string).collect(),
            gauge,
        }))
    }
}
