//! Configuration loading from TOML.
//!
//! Reads `config.toml` and deserializes into strongly-typed structs.
//! Every detection constant (thresholds, penalties, model fallbacks) is
//! configuration, not law — the defaults below are documented so a run
//! with no config file is reproducible.

use anyhow::{Context, Result};
use serde::Deserialize;
use std::fs;

/// Top-level application configuration.
#[derive(Debug, Deserialize, Clone, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub data: DataConfig,
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub classifier: ClassifierConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
}

#[derive(Debug, Deserialize, Clone)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

/// Where the engine reads registry data, tickets, and level history.
#[derive(Debug, Deserialize, Clone)]
pub struct DataConfig {
    /// Static reference data (cauldrons, market, network). Always a file.
    #[serde(default = "default_background_file")]
    pub background_file: String,
    /// "file" or "http".
    #[serde(default = "default_source_kind")]
    pub source: String,
    #[serde(default = "default_tickets_file")]
    pub tickets_file: String,
    #[serde(default = "default_history_file")]
    pub history_file: String,
    /// Base URL for the http source (`{base}/api/Tickets`, `{base}/api/Data`).
    #[serde(default)]
    pub base_url: Option<String>,
    /// Last published snapshot is cached here and reloaded on startup.
    #[serde(default = "default_cache_file")]
    pub cache_file: String,
}

/// Expected-volume model constants.
#[derive(Debug, Deserialize, Clone)]
pub struct ModelConfig {
    /// Baseline used when a depot has no usable history or route estimate.
    #[serde(default = "default_expected")]
    pub default_expected: f64,
    /// Drains smaller than this are noise, not collection events.
    #[serde(default = "default_min_drain")]
    pub min_drain_amount: f64,
    /// Plausible fill-rate band in units/minute; deltas outside it are
    /// sensor glitches and excluded from the median.
    #[serde(default = "default_fill_rate_floor")]
    pub fill_rate_floor: f64,
    #[serde(default = "default_fill_rate_ceiling")]
    pub fill_rate_ceiling: f64,
    /// Fill rate assumed for depots with too little history.
    #[serde(default = "default_fill_rate")]
    pub default_fill_rate: f64,
}

/// Classification thresholds on relative deviation.
#[derive(Debug, Deserialize, Clone)]
pub struct ClassifierConfig {
    /// Deviation at or below this is measurement error.
    #[serde(default = "default_valid_threshold")]
    pub valid_threshold: f64,
    /// Deviation above this is fraud; between the two is suspicious.
    #[serde(default = "default_fraud_threshold")]
    pub fraud_threshold: f64,
    /// Guard against division by zero when expected is 0.
    #[serde(default = "default_epsilon")]
    pub epsilon: f64,
}

/// Trust-score penalty constants.
#[derive(Debug, Deserialize, Clone)]
pub struct ScoringConfig {
    #[serde(default = "default_suspicious_penalty")]
    pub suspicious_penalty: f64,
    #[serde(default = "default_fraud_penalty_base")]
    pub fraud_penalty_base: f64,
    /// The fraudulent penalty grows by this much per unit of deviation.
    #[serde(default = "default_fraud_penalty_scale")]
    pub fraud_penalty_scale: f64,
    /// Deviation is capped here for penalty purposes so one absurd ticket
    /// cannot zero a long honest history in a single step.
    #[serde(default = "default_fraud_deviation_cap")]
    pub fraud_deviation_cap: f64,
}

fn default_port() -> u16 {
    5000
}
fn default_background_file() -> String {
    "data/background_data.json".to_string()
}
fn default_source_kind() -> String {
    "file".to_string()
}
fn default_tickets_file() -> String {
    "data/tickets.json".to_string()
}
fn default_history_file() -> String {
    "data/historical_data.json".to_string()
}
fn default_cache_file() -> String {
    "truth_serum_snapshot.json".to_string()
}
fn default_expected() -> f64 {
    50.0
}
fn default_min_drain() -> f64 {
    15.0
}
fn default_fill_rate_floor() -> f64 {
    0.01
}
fn default_fill_rate_ceiling() -> f64 {
    5.0
}
fn default_fill_rate() -> f64 {
    0.1
}
fn default_valid_threshold() -> f64 {
    0.07
}
fn default_fraud_threshold() -> f64 {
    0.15
}
fn default_epsilon() -> f64 {
    1e-9
}
fn default_suspicious_penalty() -> f64 {
    5.0
}
fn default_fraud_penalty_base() -> f64 {
    15.0
}
fn default_fraud_penalty_scale() -> f64 {
    10.0
}
fn default_fraud_deviation_cap() -> f64 {
    3.0
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { port: default_port() }
    }
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            background_file: default_background_file(),
            source: default_source_kind(),
            tickets_file: default_tickets_file(),
            history_file: default_history_file(),
            base_url: None,
            cache_file: default_cache_file(),
        }
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            default_expected: default_expected(),
            min_drain_amount: default_min_drain(),
            fill_rate_floor: default_fill_rate_floor(),
            fill_rate_ceiling: default_fill_rate_ceiling(),
            default_fill_rate: default_fill_rate(),
        }
    }
}

impl Default for ClassifierConfig {
    fn default() -> Self {
        Self {
            valid_threshold: default_valid_threshold(),
            fraud_threshold: default_fraud_threshold(),
            epsilon: default_epsilon(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            suspicious_penalty: default_suspicious_penalty(),
            fraud_penalty_base: default_fraud_penalty_base(),
            fraud_penalty_scale: default_fraud_penalty_scale(),
            fraud_deviation_cap: default_fraud_deviation_cap(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &str) -> Result<Self> {
        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {path}"))?;
        let config: AppConfig = toml::from_str(&contents)
            .with_context(|| format!("Failed to parse config file: {path}"))?;
        Ok(config)
    }

    /// Load `config.toml` if present, otherwise documented defaults.
    pub fn load_or_default(path: &str) -> Result<Self> {
        if std::path::Path::new(path).exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_constants() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.server.port, 5000);
        assert!((cfg.classifier.valid_threshold - 0.07).abs() < 1e-12);
        assert!((cfg.classifier.fraud_threshold - 0.15).abs() < 1e-12);
        assert!((cfg.scoring.suspicious_penalty - 5.0).abs() < 1e-12);
        assert!((cfg.model.default_expected - 50.0).abs() < 1e-12);
        assert_eq!(cfg.data.source, "file");
    }

    #[test]
    fn test_partial_toml_fills_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [classifier]
            valid_threshold = 0.1
            fraud_threshold = 0.4
            "#,
        )
        .unwrap();
        assert!((cfg.classifier.valid_threshold - 0.1).abs() < 1e-12);
        assert!((cfg.classifier.fraud_threshold - 0.4).abs() < 1e-12);
        // Untouched sections still carry defaults.
        assert_eq!(cfg.server.port, 5000);
        assert!((cfg.scoring.fraud_penalty_base - 15.0).abs() < 1e-12);
    }

    #[test]
    fn test_empty_toml_is_all_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert!((cfg.classifier.epsilon - 1e-9).abs() < 1e-21);
        assert_eq!(cfg.data.background_file, "data/background_data.json");
    }

    #[test]
    fn test_load_or_default_missing_file() {
        let cfg = AppConfig::load_or_default("/nonexistent/config.toml").unwrap();
        assert_eq!(cfg.server.port, 5000);
    }
}
