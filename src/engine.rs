//! Analysis snapshot builder.
//!
//! Orchestrates registry → expected-volume model → classifier → scorer →
//! summary into one immutable snapshot. Single-writer, many-reader: at
//! most one refresh pipeline runs at a time, readers always see either
//! the previous or the newly published snapshot. The new snapshot is
//! built fully off to the side and published by swapping one `Arc`, so
//! an abandoned build never corrupts what readers hold.

use chrono::Utc;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{error, info};

use crate::classifier::TicketClassifier;
use crate::config::AppConfig;
use crate::error::{EngineError, Result};
use crate::history::LevelHistory;
use crate::model::ExpectedVolumeModel;
use crate::registry::Registry;
use crate::scorer::TrustScorer;
use crate::source::TicketSource;
use crate::storage;
use crate::summary::summarize;
use crate::types::{AnalysisSnapshot, RunMetadata};

pub struct AnalysisEngine {
    registry: Registry,
    source: Box<dyn TicketSource>,
    cfg: AppConfig,
    /// Last published snapshot is mirrored here after each refresh.
    cache_path: Option<String>,
    current: RwLock<Option<Arc<AnalysisSnapshot>>>,
    /// Serializes refreshes. `refresh()` try-locks (Busy on contention);
    /// lazy init queues behind an in-flight refresh instead.
    refresh_gate: Mutex<()>,
}

impl AnalysisEngine {
    pub fn new(registry: Registry, source: Box<dyn TicketSource>, cfg: AppConfig) -> Self {
        let cache_path = Some(cfg.data.cache_file.clone());
        Self {
            registry,
            source,
            cfg,
            cache_path,
            current: RwLock::new(None),
            refresh_gate: Mutex::new(()),
        }
    }

    /// Disable the snapshot cache file (tests, ephemeral deployments).
    pub fn without_cache(mut self) -> Self {
        self.cache_path = None;
        self
    }

    /// Seed the published snapshot from a previously cached one, so the
    /// dashboard serves immediately after a restart.
    pub async fn prime(&self, snapshot: AnalysisSnapshot) {
        *self.current.write().await = Some(Arc::new(snapshot));
    }

    /// The last published snapshot, computing one on first call.
    ///
    /// Never returns a partially built snapshot, and never blocks behind
    /// a refresh once a snapshot has been published.
    pub async fn get_current(&self) -> Result<Arc<AnalysisSnapshot>> {
        if let Some(snapshot) = self.current.read().await.clone() {
            return Ok(snapshot);
        }

        // Cold start: queue behind any in-flight refresh, then re-check
        // in case it published while we waited.
        let _gate = self.refresh_gate.lock().await;
        if let Some(snapshot) = self.current.read().await.clone() {
            return Ok(snapshot);
        }
        let snapshot = self.build().await?;
        Ok(self.publish(snapshot).await)
    }

    /// Re-run the full pipeline and atomically replace the published
    /// snapshot. Returns `Busy` if a refresh is already in flight.
    pub async fn refresh(&self) -> Result<Arc<AnalysisSnapshot>> {
        let _gate = self.refresh_gate.try_lock().map_err(|_| EngineError::Busy)?;
        let snapshot = self.build().await?;
        Ok(self.publish(snapshot).await)
    }

    /// Run the pipeline over a fresh batch. Pure with respect to the
    /// published snapshot — a failure here leaves readers untouched.
    async fn build(&self) -> Result<AnalysisSnapshot> {
        let batch = self.source.fetch().await?;
        info!(
            tickets = batch.tickets.len(),
            readings = batch.readings.len(),
            "Starting analysis run"
        );

        let history = LevelHistory::new(&batch.readings, self.cfg.model.clone());
        let model = ExpectedVolumeModel::new(&self.registry, &history, &self.cfg.model);
        let classifier = TicketClassifier::new(&self.registry, &model, &self.cfg.classifier);

        let (classified, excluded) = classifier.classify_batch(&batch.tickets);
        let witch_trust_scores = TrustScorer::new(&self.cfg.scoring).score_all(&classified);
        let summary = summarize(&classified);

        let mut cauldron_fill_rates = BTreeMap::new();
        for id in self.registry.depot_ids() {
            cauldron_fill_rates.insert(id.to_string(), history.fill_rate(id));
        }

        info!(
            total = summary.total_tickets,
            valid = summary.valid_count,
            suspicious = summary.suspicious_count,
            fraudulent = summary.fraudulent_count,
            excluded = excluded.len(),
            fraud_rate = format!("{:.1}%", summary.fraud_rate),
            "Analysis run complete"
        );

        Ok(AnalysisSnapshot {
            summary,
            tickets: classified,
            witch_trust_scores,
            cauldron_fill_rates,
            background: self.registry.background().clone(),
            metadata: RunMetadata {
                generated_at: Utc::now(),
                excluded_tickets: excluded,
            },
        })
    }

    async fn publish(&self, snapshot: AnalysisSnapshot) -> Arc<AnalysisSnapshot> {
        let snapshot = Arc::new(snapshot);
        *self.current.write().await = Some(snapshot.clone());

        if let Some(path) = &self.cache_path {
            // Cache write failure is not a publish failure.
            if let Err(e) = storage::save_snapshot(&snapshot, path) {
                error!(error = %e, path, "Failed to cache snapshot");
            }
        }
        snapshot
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
