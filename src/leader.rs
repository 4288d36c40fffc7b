//! Leader Election
//!
//! Only the leader replica collects. The scheduler consumes [`LeaderElector`]
//! as an `init` call at startup plus an `is_leader` check on every tick.

use crate::error::{ExporterError, Result};
use async_trait::async_trait;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::info;

#[async_trait]
pub trait LeaderElector: Send + Sync {
    /// Join the election identified by `endpoint` in `namespace`
    async fn init(&self, endpoint: &str, namespace: &str) -> Result<()>;

    fn is_leader(&self) -> bool;
}

/// Single-replica elector: leads from construction unless told otherwise
#[derive(Debug)]
pub struct StandaloneElector {
    leader: AtomicBool,
    require_endpoint: bool,
}

impl StandaloneElector {
    pub fn new() -> Self {
        Self {
            leader: AtomicBool::new(true),
            require_endpoint: false,
        }
    }

    /// Elector that fails `init` when no election endpoint is configured
    pub fn requiring_endpoint() -> Self {
        Self {
            leader: AtomicBool::new(true),
            require_endpoint: true,
        }
    }

    pub fn set_leader(&self, leader: bool) {
        self.leader.store(leader, Ordering::SeqCst);
    }
}

impl Default for StandaloneElector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LeaderElector for StandaloneElector {
    async fn init(&self, endpoint: &str, namespace: &str) -> Result<()> {
        if self.require_endpoint && endpoint.trim().is_empty() {
            return Err(ExporterError::LeaderElection(
                "no election endpoint configured".to_string(),
            ));
        }
        info!(
            endpoint = endpoint,
            namespace = namespace,
            "Leader election initialized in standalone mode"
        );
        Ok(())
    }

    fn is_leader(&self) -> bool {
        self.leader.load(Ordering::SeqCst)
    }
}
