//! Dashboard API — Axum web server.
//!
//! Serves the analysis snapshot as JSON for the polling frontend.
//! CORS enabled for local development. The frontend renders, filters,
//! and auto-refreshes on its own; this layer only exposes data.

pub mod routes;

use anyhow::{Context, Result};
use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post},
    Router,
};
use tower_http::cors::CorsLayer;
use tracing::info;

use routes::AppState;

/// Build the Axum router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin("*".parse::<HeaderValue>().unwrap())
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::CONTENT_TYPE]);

    Router::new()
        .route("/api/analysis", get(routes::get_analysis))
        .route("/api/summary", get(routes::get_summary))
        .route("/api/tickets", get(routes::get_tickets))
        .route("/api/flagged", get(routes::get_flagged))
        .route("/api/witches", get(routes::get_witches))
        .route("/api/cauldrons", get(routes::get_cauldrons))
        .route("/api/refresh", post(routes::post_refresh))
        .route("/api/health", get(routes::health))
        .layer(cors)
        .with_state(state)
}

/// Serve the API in the foreground until the task is cancelled.
pub async fn serve(state: AppState, port: u16) -> Result<()> {
    let app = build_router(state);
    let addr = std::net::SocketAddr::from(([0, 0, 0, 0], port));
    info!(port, "API server starting on http://localhost:{port}");

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind port {port}"))?;

    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received.");
        })
        .await
        .context("API server error")?;

    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
