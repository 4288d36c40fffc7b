//! PowerFlex Gateway API Client
//!
//! [`ManagementClient`] is the seam between collection and the gateway. The
//! collectors and retrievers only see the trait, which keeps them testable
//! against in-memory fakes. [`GatewayClient`] is the REST implementation.
//!
//! # Example
//!
//! ```no_run
//! use powerflex_exporter::config::PowerFlexConfig;
//! use powerflex_exporter::powerflex::{GatewayClient, GatewayConnection, ManagementClient};
//! use powerflex_exporter::token::TokenManager;
//! use secrecy::SecretString;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! # async fn example() -> anyhow::Result<()> {
//! let config = PowerFlexConfig {
//!     endpoint: "https://gateway.local".to_string(),
//!     username: "admin".to_string(),
//!     password: SecretString::from("password"),
//!     insecure: true,
//!     cert_path: None,
//! };
//!
//! let connection = Arc::new(GatewayConnection::new(Arc::new(config))?);
//! let tokens = Arc::new(TokenManager::new(connection.clone(), Duration::from_secs(300)));
//! tokens.refresh().await;
//!
//! let client = GatewayClient::new(connection, tokens, Duration::from_secs(30));
//! let sdcs = client.list_sdcs().await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{ExporterError, Result};
use crate::powerflex::connection::GatewayConnection;
use crate::powerflex::types::*;
use crate::token::TokenManager;
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::info;

/// Read-only view of the storage management plane
#[async_trait]
pub trait ManagementClient: Send + Sync {
    /// Confirm that a usable session exists
    async fn authenticate(&self) -> Result<()>;

    /// Statistics generation of the storage system
    async fn generation(&self) -> Result<Generation>;

    async fn list_sdcs(&self) -> Result<Vec<Sdc>>;

    /// Volumes mapped to one SDC
    async fn sdc_volumes(&self, sdc_id: &str) -> Result<Vec<Volume>>;

    async fn sdc_statistics(&self, sdc_id: &str) -> Result<IoCounters>;

    async fn volume_statistics(&self, volume_id: &str) -> Result<IoCounters>;

    async fn list_storage_pools(&self) -> Result<Vec<StoragePool>>;

    async fn storage_pool_statistics(&self, pool_id: &str) -> Result<StoragePoolCounters>;

    /// One batched metrics call covering many entities
    async fn query_bulk_metrics(&self, query: &BulkMetricsQuery) -> Result<BulkMetricsResponse>;
}

/// REST client for the PowerFlex gateway
///
/// Every call pulls the current session token from the shared
/// [`TokenManager`], waiting at most `auth_timeout` for an in-flight refresh.
pub struct GatewayClient {
    connection: Arc<GatewayConnection>,
    tokens: Arc<TokenManager>,
    auth_timeout: Duration,
    generation: OnceCell<Generation>,
}

impl GatewayClient {
    pub fn new(
        connection: Arc<GatewayConnection>,
        tokens: Arc<TokenManager>,
        auth_timeout: Duration,
    ) -> Self {
        Self {
            connection,
            tokens,
            auth_timeout,
            generation: OnceCell::new(),
        }
    }

    async fn token(&self) -> Result<SecretString> {
        self.tokens.get_token(self.auth_timeout).await
    }

    async fn get<T>(&self, path: &str) -> Result<T>
    where
        T: serde::de::DeserializeOwned,
    {
        let token = self.token().await?;
        self.connection.get_json(path, &token).await
    }
}

#[async_trait]
impl ManagementClient for GatewayClient {
    async fn authenticate(&self) -> Result<()> {
        let token = self.token().await?;
        if !self.tokens.is_authenticated() {
            return Err(ExporterError::Auth(format!(
                "last gateway login failed for user {}",
                self.connection.username()
            )));
        }
        if token.expose_secret().is_empty() {
            return Err(ExporterError::Auth(format!(
                "no session token for user {}",
                self.connection.username()
            )));
        }
        Ok(())
    }

    async fn generation(&self) -> Result<Generation> {
        self.generation
            .get_or_try_init(|| async {
                let version: String = self.get("/api/version").await?;
                let generation = Generation::from_version(&version);
                info!("Gateway version {} uses {} statistics", version, generation);
                Ok::<_, ExporterError>(generation)
            })
            .await
            .copied()
    }

    async fn list_sdcs(&self) -> Result<Vec<Sdc>> {
        self.get("/api/types/Sdc/instances").await
    }

    async fn sdc_volumes(&self, sdc_id: &str) -> Result<Vec<Volume>> {
        self.get(&format!("/api/instances/Sdc::{}/relationships/Volume", sdc_id))
            .await
    }

    async fn sdc_statistics(&self, sdc_id: &str) -> Result<IoCounters> {
        self.get(&format!(
            "/api/instances/Sdc::{}/relationships/Statistics",
            sdc_id
        ))
        .await
    }

    async fn volume_statistics(&self, volume_id: &str) -> Result<IoCounters> {
        self.get(&format!(
            "/api/instances/Volume::{}/relationships/Statistics",
            volume_id
        ))
        .await
    }

    async fn list_storage_pools(&self) -> Result<Vec<StoragePool>> {
        self.get("/api/types/StoragePool/instances").await
    }

    async fn storage_pool_statistics(&self, pool_id: &str) -> Result<StoragePoolCounters> {
        self.get(&format!(
            "/api/instances/StoragePool::{}/relationships/Statistics",
            pool_id
        ))
        .await
    }

    async fn query_bulk_metrics(&self, query: &BulkMetricsQuery) -> Result<BulkMetricsResponse> {
        let token = self.token().await?;
        self.connection
            .post_json("/dtapi/rest/v1/metrics/query", query, &token)
            .await
    }
}
