//! HTTP Exposure Server
//!
//! Axum server that exposes the Prometheus registry for scraping.
//!
//! # Endpoints
//!
//! - `GET /` - HTML landing page with links to metrics and health
//! - `GET /metrics` - Prometheus metrics in text format
//! - `GET /health` - 200 when the gateway session is healthy, 503 otherwise
//!
//! The server is one of the scheduler's bootstrap tasks: failing to bind or
//! serve ends the collection loop.

use crate::config::ServerConfig;
use crate::metrics::PrometheusMeter;
use axum::{
    extract::State,
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use tracing::{error, info};

pub fn router(meter: PrometheusMeter) -> Router {
    Router::new()
        .route("/", get(root_handler))
        .route("/metrics", get(metrics_handler))
        .route("/health", get(health_handler))
        .with_state(meter)
}

/// Bind and serve until the listener fails
pub async fn serve(config: ServerConfig, meter: PrometheusMeter) -> anyhow::Result<()> {
    let addr = format!("{}:{}", config.addr, config.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;

    info!("Metrics server listening on {}", listener.local_addr()?);
    info!("Metrics available at http://{}/metrics", addr);

    axum::serve(listener, router(meter)).await?;

    Ok(())
}

async fn root_handler() -> impl IntoResponse {
    r#"<html>
<head><title>PowerFlex Exporter</title></head>
<body>
<h1>PowerFlex Metrics Exporter</h1>
<p><a href="/metrics">Metrics</a></p>
<p><a href="/health">Health</a></p>
</body>
</html>"#
}

async fn metrics_handler(State(meter): State<PrometheusMeter>) -> Response {
    match meter.render() {
        Ok(metrics) => metrics.into_response(),
        Err(e) => {
            error!("Failed to render metrics: {}", e);
            (
                axum::http::StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error rendering metrics: {}", e),
            )
                .into_response()
        }
    }
}

async fn health_handler(State(meter): State<PrometheusMeter>) -> impl IntoResponse {
    if meter.up.get() > 0.0 {
        (axum::http::StatusCode::OK, "OK")
    } else {
        (
            axum::http::StatusCode::SERVICE_UNAVAILABLE,
            "PowerFlex gateway unreachable",
        )
    }
}
