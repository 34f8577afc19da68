//! Upstream data sources.
//!
//! One analysis run consumes a batch of transport tickets plus the
//! cauldron level history. Both can come from local JSON files or from
//! the upstream HTTP API; the engine only sees the `TicketSource` trait.

use async_trait::async_trait;
use serde::Deserialize;
use std::time::Duration;
use tracing::{info, warn};

use crate::error::{EngineError, Result};
use crate::types::{LevelReading, TicketBatch, TransportTicket};

/// Where a refresh gets its tickets and level history.
#[async_trait]
pub trait TicketSource: Send + Sync {
    async fn fetch(&self) -> Result<TicketBatch>;
}

/// The upstream tickets payload wraps the array in an envelope.
#[derive(Debug, Deserialize)]
struct TicketsEnvelope {
    transport_tickets: Vec<TransportTicket>,
}

fn parse_tickets(raw: &str) -> Result<Vec<TransportTicket>> {
    // Accept both the enveloped upstream shape and a bare array.
    if let Ok(envelope) = serde_json::from_str::<TicketsEnvelope>(raw) {
        return Ok(envelope.transport_tickets);
    }
    serde_json::from_str::<Vec<TransportTicket>>(raw)
        .map_err(|e| EngineError::Source(format!("failed to parse tickets: {e}")))
}

// ---------------------------------------------------------------------------
// File source
// ---------------------------------------------------------------------------

/// Reads tickets and level history from local JSON files.
pub struct FileSource {
    tickets_path: String,
    history_path: String,
}

impl FileSource {
    pub fn new(tickets_path: &str, history_path: &str) -> Self {
        Self {
            tickets_path: tickets_path.to_string(),
            history_path: history_path.to_string(),
        }
    }
}

#[async_trait]
impl TicketSource for FileSource {
    async fn fetch(&self) -> Result<TicketBatch> {
        let raw = std::fs::read_to_string(&self.tickets_path).map_err(|e| {
            EngineError::Source(format!("failed to read {}: {e}", self.tickets_path))
        })?;
        let tickets = parse_tickets(&raw)?;

        // Missing history leaves the model on its fallback chain — the
        // batch still classifies.
        let readings = match std::fs::read_to_string(&self.history_path) {
            Ok(raw) => serde_json::from_str::<Vec<LevelReading>>(&raw).map_err(|e| {
                EngineError::Source(format!("failed to parse {}: {e}", self.history_path))
            })?,
            Err(e) => {
                warn!(path = %self.history_path, error = %e, "No level history available");
                Vec::new()
            }
        };

        info!(
            tickets = tickets.len(),
            readings = readings.len(),
            "Loaded batch from files"
        );
        Ok(TicketBatch { tickets, readings })
    }
}

// ---------------------------------------------------------------------------
// HTTP source
// ---------------------------------------------------------------------------

/// Fetches tickets and level history from the upstream API.
pub struct HttpSource {
    client: reqwest::Client,
    base_url: String,
}

impl HttpSource {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .map_err(|e| EngineError::Source(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, path: &str) -> Result<String> {
        let url = format!("{}{path}", self.base_url);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| EngineError::Source(format!("GET {url} failed: {e}")))?;
        if !response.status().is_success() {
            return Err(EngineError::Source(format!(
                "GET {url} returned {}",
                response.status()
            )));
        }
        response
            .text()
            .await
            .map_err(|e| EngineError::Source(format!("GET {url} body read failed: {e}")))
    }
}

#[async_trait]
impl TicketSource for HttpSource {
    async fn fetch(&self) -> Result<TicketBatch> {
        let tickets = parse_tickets(&self.get_text("/api/Tickets").await?)?;

        let raw = self
            .get_text("/api/Data/?start_date=0&end_date=2000000000")
            .await?;
        let readings: Vec<LevelReading> = serde_json::from_str(&raw)
            .map_err(|e| EngineError::Source(format!("failed to parse level history: {e}")))?;

        info!(
            tickets = tickets.len(),
            readings = readings.len(),
            base_url = %self.base_url,
            "Fetched batch from upstream API"
        );
        Ok(TicketBatch { tickets, readings })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
