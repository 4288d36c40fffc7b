//! Collection Scheduler
//!
//! Drives collection from three independent tickers, one per entity kind.
//!
//! # Run Loop
//!
//! ```text
//!            ┌─ sdc ticker ──────┐
//!  select! ──┼─ volume ticker ───┼──► tick(kind)
//!            ├─ pool ticker ─────┘
//!            ├─ bootstrap errors ───► return Err   (leader init, HTTP server)
//!            └─ shutdown ───────────► return Ok
//! ```
//!
//! Each tick: skip unless leader, skip if the kind is disabled, authenticate,
//! then run the kind's collector. Everything inside a tick is recoverable;
//! only bootstrap failures end the loop. A tick that has started runs to
//! completion; shutdown is observed between ticks.

use crate::collectors::{self, CollectionContext};
use crate::config::Config;
use crate::leader::LeaderElector;
use crate::metrics::PrometheusMeter;
use crate::records::EntityKind;
use crate::server;
use crate::token::TokenManager;
use std::sync::Arc;
use tokio::sync::mpsc;
use tokio::time::{interval, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// What a single tick did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Another replica leads
    NotLeader,
    /// The entity kind is switched off
    Disabled,
    /// No usable gateway session
    AuthFailed,
    /// Enumeration or bulk batch failed
    Failed,
    /// Pipeline ran; number of entities pushed
    Collected(usize),
}

pub struct Scheduler {
    config: Config,
    ctx: CollectionContext,
    elector: Arc<dyn LeaderElector>,
    meter: PrometheusMeter,
    tokens: Option<Arc<TokenManager>>,
}

impl Scheduler {
    pub fn new(
        config: Config,
        ctx: CollectionContext,
        elector: Arc<dyn LeaderElector>,
        meter: PrometheusMeter,
    ) -> Self {
        Self {
            config,
            ctx,
            elector,
            meter,
            tokens: None,
        }
    }

    /// Run the token manager alongside the collection loop
    pub fn with_token_manager(mut self, tokens: Arc<TokenManager>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Run until `shutdown` is cancelled or a bootstrap task fails
    pub async fn run(self, shutdown: CancellationToken) -> anyhow::Result<()> {
        let (bootstrap_tx, mut bootstrap_errors) = mpsc::channel::<anyhow::Error>(2);

        // Leader election init
        let elector = self.elector.clone();
        let election = self.config.leader_election.clone();
        let tx = bootstrap_tx.clone();
        tokio::spawn(async move {
            if let Err(e) = elector.init(&election.endpoint, &election.namespace).await {
                let _ = tx.send(anyhow::Error::new(e).context("leader election init failed")).await;
            }
        });

        // Exporter init
        let server_config = self.config.server.clone();
        let meter = self.meter.clone();
        let tx = bootstrap_tx;
        tokio::spawn(async move {
            if let Err(e) = server::serve(server_config, meter).await {
                let _ = tx.send(e.context("metrics server failed")).await;
            }
        });

        if let Some(tokens) = &self.tokens {
            let tokens = tokens.clone();
            let token_shutdown = shutdown.child_token();
            tokio::spawn(async move {
                if let Err(e) = tokens.start(token_shutdown).await {
                    debug!("Token manager exited: {}", e);
                }
            });
        }

        let collection = &self.config.collection;
        let mut sdc_ticker = interval(collection.sdc_poll_interval());
        let mut volume_ticker = interval(collection.volume_poll_interval());
        let mut pool_ticker = interval(collection.storage_pool_poll_interval());
        for ticker in [&mut sdc_ticker, &mut volume_ticker, &mut pool_ticker] {
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        }

        info!(
            "Collection loop started (sdc {}s, volume {}s, storage pool {}s)",
            collection.sdc_poll_interval_seconds,
            collection.volume_poll_interval_seconds,
            collection.storage_pool_poll_interval_seconds
        );

        let result = loop {
            tokio::select! {
                _ = shutdown.cancelled() => {
                    info!("Shutdown requested, stopping collection loop");
                    break Ok(());
                }
                Some(e) = bootstrap_errors.recv() => {
                    error!("Bootstrap failure: {:#}", e);
                    break Err(e);
                }
                _ = sdc_ticker.tick() => {
                    self.tick(EntityKind::Sdc).await;
                }
                _ = volume_ticker.tick() => {
                    self.tick(EntityKind::Volume).await;
                }
                _ = pool_ticker.tick() => {
                    self.tick(EntityKind::StoragePool).await;
                }
            }
        };

        if let Some(tokens) = &self.tokens {
            tokens.stop();
        }
        result
    }

    fn enabled(&self, kind: EntityKind) -> bool {
        let collection = &self.config.collection;
        match kind {
            EntityKind::Sdc => collection.sdc_metrics_enabled,
            EntityKind::Volume => collection.volume_metrics_enabled,
            EntityKind::StoragePool => collection.storage_pool_metrics_enabled,
        }
    }

    /// One collection pass for `kind`
    pub async fn tick(&self, kind: EntityKind) -> TickOutcome {
        if !self.elector.is_leader() {
            debug!(kind = %kind, "Not leader, skipping collection");
            return TickOutcome::NotLeader;
        }

        if !self.enabled(kind) {
            debug!(kind = %kind, "Collection disabled");
            return TickOutcome::Disabled;
        }

        if let Err(e) = self.ctx.client.authenticate().await {
            warn!(kind = %kind, error = %e, "Gateway authentication failed, skipping tick");
            self.meter.up.set(0.0);
            return TickOutcome::AuthFailed;
        }
        self.meter.up.set(1.0);

        let started = Instant::now();
        let result = match kind {
            EntityKind::Sdc => collectors::collect_sdc_metrics(&self.ctx).await,
            EntityKind::Volume => collectors::collect_volume_metrics(&self.ctx).await,
            EntityKind::StoragePool => collectors::collect_storage_pool_metrics(&self.ctx).await,
        };

        self.meter
            .collection_duration_seconds
            .with_label_values(&[kind.as_str()])
            .set(started.elapsed().as_secs_f64());

        match result {
            Ok(pushed) => {
                self.meter
                    .collected_entities
                    .with_label_values(&[kind.as_str()])
                    .set(pushed as f64);
                TickOutcome::Collected(pushed)
            }
            Err(e) => {
                warn!(kind = %kind, error = %e, "Collection failed");
                self.meter
                    .collection_failures_total
                    .with_label_values(&[kind.as_str()])
                    .inc();
                TickOutcome::Failed
            }
        }
    }
}
