//! Shared test doubles
//!
//! In-memory stand-ins for the gateway client and the metric exporter.

#![allow(dead_code)]

use async_trait::async_trait;
use powerflex_exporter::config::{
    Config, InventoryConfig, NodeEntry, PowerFlexConfig, StorageClassEntry, VolumeEntry,
};
use powerflex_exporter::error::{ExporterError, Result};
use powerflex_exporter::metrics::{Instrument, LabelSet, Meter};
use powerflex_exporter::powerflex::types::*;
use powerflex_exporter::powerflex::{GatewayClient, GatewayConnection, ManagementClient};
use powerflex_exporter::token::{Authenticator, TokenManager};
use secrecy::SecretString;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const DRIVER: &str = "csi-vxflexos.dellemc.com";

/// Gateway fake answering from fixed tables
#[derive(Default)]
pub struct FakeClient {
    pub bulk: bool,
    pub auth_fails: AtomicBool,
    pub sdcs: Vec<Sdc>,
    pub sdc_volumes: HashMap<String, Vec<Volume>>,
    pub failing_volume_listings: HashSet<String>,
    pub sdc_stats: HashMap<String, IoCounters>,
    pub volume_stats: HashMap<String, IoCounters>,
    pub pools: Vec<StoragePool>,
    pub pool_stats: HashMap<String, StoragePoolCounters>,
    pub bulk_responses: HashMap<String, BulkMetricsResponse>,

    pub auth_calls: AtomicUsize,
    pub statistics_calls: AtomicUsize,
    pub bulk_queries: Mutex<Vec<BulkMetricsQuery>>,
}

impl FakeClient {
    pub fn bulk_query_count(&self) -> usize {
        self.bulk_queries.lock().unwrap().len()
    }
}

fn not_found(kind: &str, id: &str) -> ExporterError {
    ExporterError::PowerFlexApi(format!("{}::{} not found", kind, id))
}

#[async_trait]
impl ManagementClient for FakeClient {
    async fn authenticate(&self) -> Result<()> {
        self.auth_calls.fetch_add(1, Ordering::SeqCst);
        if self.auth_fails.load(Ordering::SeqCst) {
            return Err(ExporterError::Auth("invalid credentials".to_string()));
        }
        Ok(())
    }

    async fn generation(&self) -> Result<Generation> {
        Ok(if self.bulk {
            Generation::Bulk
        } else {
            Generation::Legacy
        })
    }

    async fn list_sdcs(&self) -> Result<Vec<Sdc>> {
        Ok(self.sdcs.clone())
    }

    async fn sdc_volumes(&self, sdc_id: &str) -> Result<Vec<Volume>> {
        if self.failing_volume_listings.contains(sdc_id) {
            return Err(ExporterError::PowerFlexApi("listing failed".to_string()));
        }
        Ok(self.sdc_volumes.get(sdc_id).cloned().unwrap_or_default())
    }

    async fn sdc_statistics(&self, sdc_id: &str) -> Result<IoCounters> {
        self.statistics_calls.fetch_add(1, Ordering::SeqCst);
        self.sdc_stats
            .get(sdc_id)
            .cloned()
            .ok_or_else(|| not_found("Sdc", sdc_id))
    }

    async fn volume_statistics(&self, volume_id: &str) -> Result<IoCounters> {
        self.statistics_calls.fetch_add(1, Ordering::SeqCst);
        self.volume_stats
            .get(volume_id)
            .cloned()
            .ok_or_else(|| not_found("Volume", volume_id))
    }

    async fn list_storage_pools(&self) -> Result<Vec<StoragePool>> {
        Ok(self.pools.clone())
    }

    async fn storage_pool_statistics(&self, pool_id: &str) -> Result<StoragePoolCounters> {
        self.statistics_calls.fetch_add(1, Ordering::SeqCst);
        self.pool_stats
            .get(pool_id)
            .cloned()
            .ok_or_else(|| not_found("StoragePool", pool_id))
    }

    async fn query_bulk_metrics(&self, query: &BulkMetricsQuery) -> Result<BulkMetricsResponse> {
        self.bulk_queries.lock().unwrap().push(query.clone());
        Ok(self
            .bulk_responses
            .get(&query.resource_type)
            .cloned()
            .unwrap_or_default())
    }
}

pub fn sdc(id: &str, guid: &str, ip: &str) -> Sdc {
    Sdc {
        id: id.to_string(),
        name: Some(format!("{}-name", id)),
        sdc_guid: guid.to_string(),
        sdc_ip: ip.to_string(),
        system_id: "system-1".to_string(),
    }
}

pub fn volume(id: &str) -> Volume {
    Volume {
        id: id.to_string(),
        name: format!("{}-name", id),
        storage_pool_id: "pool-1".to_string(),
    }
}

pub fn bwc(num_occurrences: u64, num_seconds: u64, total_weight_in_kb: u64) -> Bwc {
    Bwc {
        num_occurrences,
        num_seconds,
        total_weight_in_kb,
    }
}

pub fn bulk_resource(id: &str, metrics: &[(&str, f64)]) -> BulkResource {
    BulkResource {
        id: id.to_string(),
        metrics: metrics
            .iter()
            .map(|(name, value)| NamedMetric {
                name: name.to_string(),
                values: vec![*value],
            })
            .collect(),
    }
}

pub fn node(name: &str, guid: &str, ip: &str) -> NodeEntry {
    NodeEntry {
        name: name.to_string(),
        sdc_guid: guid.to_string(),
        ip: ip.to_string(),
        driver: DRIVER.to_string(),
    }
}

pub fn persistent_volume(volume_id: &str, pv: &str) -> VolumeEntry {
    VolumeEntry {
        volume_id: volume_id.to_string(),
        persistent_volume: pv.to_string(),
        persistent_volume_claim: format!("{}-claim", pv),
        namespace: "default".to_string(),
        storage_class: "vxflexos".to_string(),
        storage_system_id: String::new(),
        driver: DRIVER.to_string(),
    }
}

pub fn storage_class(name: &str, pools: &[&str]) -> StorageClassEntry {
    StorageClassEntry {
        name: name.to_string(),
        driver: DRIVER.to_string(),
        storage_system_id: "system-1".to_string(),
        storage_pools: pools.iter().map(|p| p.to_string()).collect(),
    }
}

pub fn test_config(inventory: InventoryConfig) -> Config {
    let mut config = Config {
        powerflex: PowerFlexConfig {
            endpoint: "https://gateway.test".to_string(),
            username: "admin".to_string(),
            password: SecretString::from("secret"),
            insecure: true,
            cert_path: None,
        },
        collection: Default::default(),
        leader_election: Default::default(),
        server: Default::default(),
        inventory,
    };
    config.server.addr = "127.0.0.1".to_string();
    config.server.port = 0;
    config
}

type ValueTable = Arc<Mutex<HashMap<(String, Vec<String>), f64>>>;

/// Meter that keeps series in memory and can be told to fail
#[derive(Default)]
pub struct RecordingMeter {
    pub values: ValueTable,
    pub created: Mutex<Vec<(String, LabelSet)>>,
    pub retired: Arc<Mutex<Vec<(String, LabelSet)>>>,
    /// Series names ending with this suffix fail to create
    pub fail_suffix: Mutex<Option<String>>,
}

impl RecordingMeter {
    pub fn fail_on(&self, suffix: &str) {
        *self.fail_suffix.lock().unwrap() = Some(suffix.to_string());
    }

    /// Current value of series `name` whose `key` label equals `value`
    pub fn value(&self, name: &str, key: &str, value: &str) -> Option<f64> {
        let created = self.created.lock().unwrap();
        let labels = created
            .iter()
            .rev()
            .find(|(n, l)| n == name && l.get(key) == Some(value))
            .map(|(_, l)| l.clone())?;
        let values: Vec<String> = labels.values().into_iter().map(str::to_string).collect();
        self.values
            .lock()
            .unwrap()
            .get(&(name.to_string(), values))
            .copied()
    }

    pub fn live_series(&self) -> usize {
        self.values.lock().unwrap().len()
    }

    pub fn retired_count(&self) -> usize {
        self.retired.lock().unwrap().len()
    }
}

struct RecordingInstrument {
    name: String,
    labels: LabelSet,
    values: ValueTable,
    retired: Arc<Mutex<Vec<(String, LabelSet)>>>,
}

impl RecordingInstrument {
    fn key(&self) -> (String, Vec<String>) {
        (
            self.name.clone(),
            self.labels.values().into_iter().map(str::to_string).collect(),
        )
    }
}

impl Instrument for RecordingInstrument {
    fn set(&self, value: f64) {
        self.values.lock().unwrap().insert(self.key(), value);
    }

    fn retire(&self) {
        self.values.lock().unwrap().remove(&self.key());
        self.retired
            .lock()
            .unwrap()
            .push((self.name.clone(), self.labels.clone()));
    }
}

impl Meter for RecordingMeter {
    fn create_instrument(
        &self,
        name: &str,
        _help: &str,
        labels: &LabelSet,
    ) -> Result<Box<dyn Instrument>> {
        if let Some(suffix) = self.fail_suffix.lock().unwrap().as_deref() {
            if name.ends_with(suffix) {
                return Err(ExporterError::Instrument(format!("refusing {}", name)));
            }
        }
        self.created
            .lock()
            .unwrap()
            .push((name.to_string(), labels.clone()));
        Ok(Box::new(RecordingInstrument {
            name: name.to_string(),
            labels: labels.clone(),
            values: self.values.clone(),
            retired: self.retired.clone(),
        }))
    }
}

/// Authenticator whose logins succeed until attempt `fail_from`
pub struct FlakyAuthenticator {
    pub logins: AtomicUsize,
    pub fail_from: usize,
}

impl FlakyAuthenticator {
    pub fn failing_from(attempt: usize) -> Self {
        Self {
            logins: AtomicUsize::new(0),
            fail_from: attempt,
        }
    }
}

#[async_trait]
impl Authenticator for FlakyAuthenticator {
    async fn login(&self) -> Result<SecretString> {
        let attempt = self.logins.fetch_add(1, Ordering::SeqCst) + 1;
        if attempt >= self.fail_from {
            return Err(ExporterError::Auth("gateway rejected login".to_string()));
        }
        Ok(SecretString::from(format!("session-{}", attempt)))
    }
}

/// REST client pointed at an unreachable gateway, sharing `tokens`
///
/// Only calls that never reach the network (such as `authenticate`) are
/// meaningful on it.
pub fn offline_gateway_client(tokens: Arc<TokenManager>) -> GatewayClient {
    let config = test_config(InventoryConfig::default());
    let connection = GatewayConnection::new(Arc::new(config.powerflex))
        .expect("Failed to build gateway connection");
    GatewayClient::new(Arc::new(connection), tokens, Duration::from_secs(1))
}
