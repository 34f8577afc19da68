//! Dashboard API route handlers.
//!
//! All endpoints return JSON. State is shared via `Arc<DashboardState>`.
//! Handlers only read the published snapshot (or trigger a refresh) —
//! all analysis logic lives in the engine.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use std::sync::Arc;

use crate::engine::AnalysisEngine;
use crate::error::EngineError;
use crate::types::{AnalysisSnapshot, ClassifiedTicket, Summary, WitchTrustScore};

// ---------------------------------------------------------------------------
// Shared state
// ---------------------------------------------------------------------------

/// Shared state accessible by all route handlers.
pub struct DashboardState {
    pub engine: AnalysisEngine,
}

impl DashboardState {
    pub fn new(engine: AnalysisEngine) -> Self {
        Self { engine }
    }
}

pub type AppState = Arc<DashboardState>;

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Engine errors mapped to HTTP statuses: `Busy` is a retryable 409,
/// everything else that escapes a handler is a 500.
#[derive(Debug)]
pub struct ApiError(EngineError);

impl From<EngineError> for ApiError {
    fn from(e: EngineError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let status = match self.0 {
            EngineError::Busy => StatusCode::CONFLICT,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

// ---------------------------------------------------------------------------
// Route handlers
// ---------------------------------------------------------------------------

/// GET /api/analysis — the full snapshot, computed on first call.
pub async fn get_analysis(
    State(state): State<AppState>,
) -> Result<Json<AnalysisSnapshot>, ApiError> {
    let snapshot = state.engine.get_current().await?;
    Ok(Json((*snapshot).clone()))
}

/// GET /api/summary
pub async fn get_summary(State(state): State<AppState>) -> Result<Json<Summary>, ApiError> {
    let snapshot = state.engine.get_current().await?;
    Ok(Json(snapshot.summary.clone()))
}

/// GET /api/tickets — all classified tickets in batch order.
pub async fn get_tickets(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassifiedTicket>>, ApiError> {
    let snapshot = state.engine.get_current().await?;
    Ok(Json(snapshot.tickets.clone()))
}

/// GET /api/flagged — suspicious and fraudulent tickets only.
pub async fn get_flagged(
    State(state): State<AppState>,
) -> Result<Json<Vec<ClassifiedTicket>>, ApiError> {
    let snapshot = state.engine.get_current().await?;
    let flagged: Vec<ClassifiedTicket> =
        snapshot.flagged_tickets().into_iter().cloned().collect();
    Ok(Json(flagged))
}

/// GET /api/witches — trust scores, worst first.
pub async fn get_witches(
    State(state): State<AppState>,
) -> Result<Json<Vec<WitchTrustScore>>, ApiError> {
    let snapshot = state.engine.get_current().await?;
    Ok(Json(snapshot.witch_trust_scores.clone()))
}

/// GET /api/cauldrons — cauldron info merged with computed fill rates.
pub async fn get_cauldrons(
    State(state): State<AppState>,
) -> Result<Json<Vec<serde_json::Value>>, ApiError> {
    let snapshot = state.engine.get_current().await?;
    let merged = snapshot
        .background
        .cauldrons
        .iter()
        .map(|cauldron| {
            let mut value = serde_json::to_value(cauldron).unwrap_or_default();
            if let Some(obj) = value.as_object_mut() {
                let rate = snapshot
                    .cauldron_fill_rates
                    .get(&cauldron.id)
                    .copied()
                    .unwrap_or(0.0);
                obj.insert("fill_rate".to_string(), json!(rate));
            }
            value
        })
        .collect();
    Ok(Json(merged))
}

/// POST /api/refresh — re-run the pipeline and swap the snapshot.
/// 202 on success, 409 if a refresh is already in flight.
pub async fn post_refresh(State(state): State<AppState>) -> Result<StatusCode, ApiError> {
    state.engine.refresh().await?;
    Ok(StatusCode::ACCEPTED)
}

/// GET /api/health
pub async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "healthy" }))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
