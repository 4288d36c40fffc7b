//! PowerFlex Prometheus Exporter
//!
//! A leader-gated telemetry daemon for Dell PowerFlex block storage used as a
//! Kubernetes CSI backend.
//!
//! # Overview
//!
//! On each tick the exporter enumerates storage data clients (SDCs), volumes
//! and storage pools, fetches their statistics from the PowerFlex gateway,
//! normalizes them to engineering units and updates a label-aware gauge
//! cache. Only the elected leader replica collects.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐      REST / JSON     ┌──────────────────────────────┐
//! │  PowerFlex  │ ◄─────────────────►  │          Exporter            │
//! │   Gateway   │   token auth         │                              │
//! └─────────────┘                      │  Scheduler ─► Collectors     │      HTTP      ┌────────────┐
//!                                      │     │          │ pipeline    │ ◄────────────► │ Prometheus │
//!                                      │  TokenManager  ▼             │   /metrics     └────────────┘
//!                                      │           MetricsWrapper     │
//!                                      └──────────────────────────────┘
//! ```
//!
//! # Modules
//!
//! - [`powerflex`] - Gateway REST client and API type definitions
//! - [`token`] - Periodic gateway token refresh
//! - [`discovery`] - Node, persistent volume and storage class inventory
//! - [`leader`] - Leader election gate
//! - [`retriever`] - Per-entity statistics retrieval and bulk batches
//! - [`normalize`] - Conversion of raw statistics to MB/s, IOPS, ms and GB
//! - [`pipeline`] - Bounded gather stage and unbounded push stage
//! - [`cache`] - Label-aware instrument cache
//! - [`collectors`] - SDC, volume and storage pool collection
//! - [`scheduler`] - Tickers and the collection loop
//! - [`metrics`] - Prometheus meter and instruments
//! - [`server`] - HTTP exposure server
//! - [`config`] - Configuration management
//! - [`error`] - Error types
//!
//! # Quick Start
//!
//! ```no_run
//! use powerflex_exporter::config::Config;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config/Default.toml")?;
//!     config.validate()?;
//!     println!("Collecting from {}", config.powerflex.endpoint);
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod collectors;
pub mod config;
pub mod discovery;
pub mod error;
pub mod leader;
pub mod metrics;
pub mod normalize;
pub mod pipeline;
pub mod powerflex;
pub mod records;
pub mod retriever;
pub mod scheduler;
pub mod server;
pub mod token;
