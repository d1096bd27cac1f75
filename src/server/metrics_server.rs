// src/server/metrics_server.rs

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{Router, http::StatusCode, response::IntoResponse, routing::get};
use tokio::sync::broadcast;
use tracing::{error, info};

use crate::core::metrics::{TABLES_TOTAL, TSERVERS_REGISTERED, gather_metrics};
use crate::core::state::MasterState;

/// Handles HTTP requests to the /metrics endpoint, refreshing the gauges
/// that reflect live catalog size before encoding the Prometheus text
/// format. Grounded on the teacher's own `metrics_handler`
/// (`server/metrics_server.rs`): update gauges, then gather and encode.
async fn metrics_handler(state: Arc<MasterState>) -> impl IntoResponse {
    TABLES_TOTAL.set(state.catalog.lock().tables_by_id.len() as f64);
    TSERVERS_REGISTERED.set(state.tservers.len() as f64);

    let body = gather_metrics();
    (StatusCode::OK, [("content-type", "text/plain; version=0.0.4")], body)
}

/// Runs a simple HTTP server exposing Prometheus metrics on /metrics,
/// separate from the administrative RPC surface (spec.md §6) so scraping
/// never competes with admin traffic for the same listener.
pub async fn run_metrics_server(state: Arc<MasterState>, port: u16, mut shutdown_rx: broadcast::Receiver<()>) {
    let app = Router::new().route("/metrics", get(move || metrics_handler(state.clone())));

    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    info!("Prometheus metrics server listening on http://{}/metrics", addr);

    let listener = match tokio::net::TcpListener::bind(addr).await {
        Ok(l) => l,
        Err(e) => {
            error!("Failed to bind metrics server on port {}: {}", port, e);
            return;
        }
    };

    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            shutdown_rx.recv().await.ok();
            info!("Metrics server shutting down.");
        })
        .await
        .unwrap();
}
