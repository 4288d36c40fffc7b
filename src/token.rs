//! Gateway Session Token Management
//!
//! [`TokenManager`] logs in on a fixed timer and hands out the current
//! session token to API callers.
//!
//! # Mutual Exclusion
//!
//! Refresh and read share one async mutex. A refresh holds it for the whole
//! login round trip, so a reader never sees a token that is about to be
//! replaced; readers wait for the refresh or give up at their own deadline.
//!
//! # Lifecycle
//!
//! ```text
//! start() ──► refresh ──► idle ──(interval)──► refresh ──► idle ...
//!                                  │
//!               stop() ────────────┴──► Ok(())
//!               shutdown.cancel() ────► Err(Cancelled)
//! ```

use crate::error::{ExporterError, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Something that can exchange credentials for a session token
#[async_trait]
pub trait Authenticator: Send + Sync {
    async fn login(&self) -> Result<SecretString>;
}

pub struct TokenManager {
    authenticator: Arc<dyn Authenticator>,
    token: Mutex<String>,
    last_refresh_ok: AtomicBool,
    refresh_interval: Duration,
    stop: CancellationToken,
}

impl TokenManager {
    pub fn new(authenticator: Arc<dyn Authenticator>, refresh_interval: Duration) -> Self {
        Self {
            authenticator,
            token: Mutex::new(String::new()),
            last_refresh_ok: AtomicBool::new(false),
            refresh_interval,
            stop: CancellationToken::new(),
        }
    }

    /// Refresh immediately, then on every interval until stopped
    ///
    /// # Returns
    ///
    /// * `Ok(())` - [`TokenManager::stop`] was called
    /// * `Err(ExporterError::Cancelled)` - `shutdown` was cancelled
    pub async fn start(&self, shutdown: CancellationToken) -> Result<()> {
        info!(
            "Starting token manager (refresh every {}s)",
            self.refresh_interval.as_secs()
        );
        self.refresh().await;

        let mut ticker = interval_at(
            Instant::now() + self.refresh_interval,
            self.refresh_interval,
        );
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                biased;
                _ = shutdown.cancelled() => {
                    info!("Token manager cancelled");
                    return Err(ExporterError::Cancelled);
                }
                _ = self.stop.cancelled() => {
                    info!("Token manager stopped");
                    return Ok(());
                }
                _ = ticker.tick() => {
                    self.refresh().await;
                }
            }
        }
    }

    /// Stop a running [`TokenManager::start`] loop
    pub fn stop(&self) {
        self.stop.cancel();
    }

    /// Log in and replace the cached token
    ///
    /// Returns whether the login succeeded. On failure the previous token
    /// stays cached.
    pub async fn refresh(&self) -> bool {
        let mut token = self.token.lock().await;
        debug!("Refreshing gateway token");
        match self.authenticator.login().await {
            Ok(fresh) => {
                *token = fresh.expose_secret().to_string();
                self.last_refresh_ok.store(true, Ordering::SeqCst);
                info!("Gateway token refreshed");
                true
            }
            Err(e) => {
                self.last_refresh_ok.store(false, Ordering::SeqCst);
                warn!(error = %e, "Token refresh failed, keeping previous token");
                false
            }
        }
    }

    /// Whether the most recent login succeeded
    ///
    /// False before the first refresh and after any failed one, even while
    /// an older token is still cached.
    pub fn is_authenticated(&self) -> bool {
        self.last_refresh_ok.load(Ordering::SeqCst)
    }

    /// Current token, waiting at most `timeout` for an in-flight refresh
    pub async fn get_token(&self, timeout: Duration) -> Result<SecretString> {
        let token = tokio::time::timeout(timeout, self.token.lock())
            .await
            .map_err(|_| ExporterError::Timeout("gateway token".to_string()))?;
        Ok(SecretString::from(token.clone()))
    }
}
