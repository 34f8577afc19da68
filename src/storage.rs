//! Snapshot cache persistence.
//!
//! Saves the last published snapshot to a JSON file and reloads it at
//! startup so the dashboard serves immediately after a restart. The cache
//! is an optimization, not a source of truth — a refresh always rebuilds
//! from upstream data.

use anyhow::{Context, Result};
use std::path::Path;
use tracing::{debug, info};

use crate::types::AnalysisSnapshot;

/// Save a snapshot to a JSON file.
pub fn save_snapshot(snapshot: &AnalysisSnapshot, path: &str) -> Result<()> {
    let json = serde_json::to_string_pretty(snapshot)
        .context("Failed to serialise snapshot")?;

    std::fs::write(path, &json)
        .context(format!("Failed to write snapshot to {path}"))?;

    debug!(path, tickets = snapshot.tickets.len(), "Snapshot cached");
    Ok(())
}

/// Load a cached snapshot from a JSON file.
/// Returns None if the file doesn't exist (cold start).
pub fn load_snapshot(path: &str) -> Result<Option<AnalysisSnapshot>> {
    if !Path::new(path).exists() {
        info!(path, "No cached snapshot found, starting cold");
        return Ok(None);
    }

    let json = std::fs::read_to_string(path)
        .context(format!("Failed to read snapshot from {path}"))?;

    let snapshot: AnalysisSnapshot = serde_json::from_str(&json)
        .context(format!("Failed to parse snapshot from {path}"))?;

    info!(
        path,
        tickets = snapshot.tickets.len(),
        couriers = snapshot.witch_trust_scores.len(),
        "Cached snapshot loaded"
    );

    Ok(Some(snapshot))
}

/// Delete the cache file (for testing or reset).
pub fn delete_snapshot(path: &str) -> Result<()> {
    if Path::new(path).exists() {
        std::fs::remove_file(path)
            .context(format!("Failed to delete snapshot cache {path}"))?;
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
