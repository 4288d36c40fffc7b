use anyhow::Result;
use clap::Parser;
use powerflex_exporter::{
    cache::MetricsWrapper,
    collectors::CollectionContext,
    config::Config,
    discovery::StaticInventory,
    leader::{LeaderElector, StandaloneElector},
    metrics::PrometheusMeter,
    pipeline::WorkerPool,
    powerflex::{GatewayClient, GatewayConnection},
    scheduler::Scheduler,
    token::TokenManager,
};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/Default.toml")]
    config: String,

    /// PowerFlex gateway endpoint (overrides config)
    #[arg(long, env = "POWERFLEX_ENDPOINT")]
    powerflex_endpoint: Option<String>,

    /// PowerFlex gateway user (overrides config)
    #[arg(long, env = "POWERFLEX_USERNAME")]
    powerflex_username: Option<String>,

    /// PowerFlex gateway password (overrides config)
    #[arg(long, env = "POWERFLEX_PASSWORD", hide_env_values = true)]
    powerflex_password: Option<String>,

    /// Port to listen on for metrics
    #[arg(short, long, env = "EXPORTER_PORT")]
    port: Option<u16>,

    /// Address to bind to
    #[arg(short, long, env = "EXPORTER_ADDR")]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into()))
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!(
        "Starting PowerFlex Prometheus Exporter v{}",
        env!("CARGO_PKG_VERSION")
    );

    // Parse CLI arguments
    let args = Args::parse();

    // Load configuration
    let mut config = Config::load(&args.config)?;

    // Override with CLI arguments if provided
    if let Some(endpoint) = args.powerflex_endpoint {
        config.powerflex.endpoint = endpoint;
    }
    if let Some(username) = args.powerflex_username {
        config.powerflex.username = username;
    }
    if let Some(password) = args.powerflex_password {
        config.powerflex.password = secrecy::SecretString::from(password);
    }
    if let Some(port) = args.port {
        config.server.port = port;
    }
    if let Some(addr) = args.addr {
        config.server.addr = addr;
    }

    if let Err(e) = config.validate() {
        error!("{}", e);
        std::process::exit(1);
    }

    info!("Configuration loaded successfully");
    info!("PowerFlex gateway: {}", config.powerflex.endpoint);
    info!(
        "Metrics endpoint: http://{}:{}/metrics",
        config.server.addr, config.server.port
    );

    // Gateway session
    let connection = Arc::new(GatewayConnection::new(Arc::new(config.powerflex.clone()))?);
    let tokens = Arc::new(TokenManager::new(
        connection.clone(),
        config.collection.token_refresh_interval(),
    ));
    let client = Arc::new(GatewayClient::new(
        connection,
        tokens.clone(),
        config.collection.auth_timeout(),
    ));

    let elector: Arc<dyn LeaderElector> = if config.leader_election.enabled {
        Arc::new(StandaloneElector::requiring_endpoint())
    } else {
        Arc::new(StandaloneElector::new())
    };

    let meter = PrometheusMeter::new()?;
    let ctx = CollectionContext {
        client,
        discovery: Arc::new(StaticInventory::new(config.inventory.clone())),
        cache: Arc::new(MetricsWrapper::new(Arc::new(meter.clone()))),
        pool: WorkerPool::new(config.collection.max_concurrent_queries),
        driver_names: config.collection.driver_names.clone(),
    };

    let shutdown = CancellationToken::new();
    let signal = shutdown.clone();
    tokio::spawn(async move {
        match tokio::signal::ctrl_c().await {
            Ok(()) => {
                info!("Received Ctrl-C");
                signal.cancel();
            }
            Err(e) => error!("Failed to listen for Ctrl-C: {}", e),
        }
    });

    let scheduler = Scheduler::new(config, ctx, elector, meter).with_token_manager(tokens);
    if let Err(e) = scheduler.run(shutdown).await {
        error!("Exporter stopped: {:#}", e);
        std::process::exit(1);
    }

    info!("Exporter stopped");
    Ok(())
}
