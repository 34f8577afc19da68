//! TRUTH SERUM — Potion-Transport Fraud Detection Engine
//!
//! Entry point. Loads configuration, initialises structured logging,
//! validates the depot/route registry (fail fast), warm-starts from the
//! snapshot cache if one exists, and serves the analysis API until
//! shutdown.

use anyhow::Result;
use std::sync::Arc;
use tracing::{info, warn};

use truth_serum::config::AppConfig;
use truth_serum::dashboard;
use truth_serum::dashboard::routes::DashboardState;
use truth_serum::engine::AnalysisEngine;
use truth_serum::registry::Registry;
use truth_serum::source::{FileSource, HttpSource, TicketSource};
use truth_serum::storage;

const BANNER: &str = r#"
 _____ ____  _   _ _____ _   _   ____  _____ ____  _   _ __  __
|_   _|  _ \| | | |_   _| | | | / ___|| ____|  _ \| | | |  \/  |
  | | | |_) | | | | | | | |_| | \___ \|  _| | |_) | | | | |\/| |
  | | |  _ <| |_| | | | |  _  |  ___) | |___|  _ <| |_| | |  | |
  |_| |_| \_\\___/  |_| |_| |_| |____/|_____|_| \_\\___/|_|  |_|

  Potion-Transport Fraud Detection
  v0.1.0
"#;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (non-fatal if missing)
    let _ = dotenv::dotenv();

    let cfg = AppConfig::load_or_default("config.toml")?;

    init_logging();

    println!("{BANNER}");
    info!(
        port = cfg.server.port,
        source = %cfg.data.source,
        background = %cfg.data.background_file,
        "TRUTH SERUM starting up"
    );

    // -- Registry: fail fast on bad reference data ------------------------

    let registry = Registry::load(&cfg.data.background_file)?;

    // -- Ticket source ----------------------------------------------------

    let source: Box<dyn TicketSource> = match cfg.data.source.as_str() {
        "http" => {
            let base_url = cfg
                .data
                .base_url
                .as_deref()
                .ok_or_else(|| anyhow::anyhow!("data.source = \"http\" requires data.base_url"))?;
            info!(base_url, "Using upstream HTTP ticket source");
            Box::new(HttpSource::new(base_url)?)
        }
        "file" => {
            info!(
                tickets = %cfg.data.tickets_file,
                history = %cfg.data.history_file,
                "Using local file ticket source"
            );
            Box::new(FileSource::new(&cfg.data.tickets_file, &cfg.data.history_file))
        }
        other => {
            warn!(source = other, "Unknown ticket source, defaulting to files");
            Box::new(FileSource::new(&cfg.data.tickets_file, &cfg.data.history_file))
        }
    };

    // -- Engine, warm-started from the snapshot cache ---------------------

    let cache_file = cfg.data.cache_file.clone();
    let engine = AnalysisEngine::new(registry, source, cfg.clone());

    match storage::load_snapshot(&cache_file) {
        Ok(Some(snapshot)) => {
            info!(
                tickets = snapshot.summary.total_tickets,
                "Serving cached snapshot until next refresh"
            );
            engine.prime(snapshot).await;
        }
        Ok(None) => {}
        Err(e) => warn!(error = %e, "Ignoring unreadable snapshot cache"),
    }

    // -- Serve ------------------------------------------------------------

    let state = Arc::new(DashboardState::new(engine));
    dashboard::serve(state, cfg.server.port).await?;

    info!("TRUTH SERUM shut down cleanly.");
    Ok(())
}

/// Initialise the `tracing` subscriber.
fn init_logging() {
    use tracing_subscriber::{fmt, EnvFilter};

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("truth_serum=info"));

    let json_logging = std::env::var("TRUTH_SERUM_LOG_JSON").is_ok();

    if json_logging {
        fmt()
            .json()
            .with_env_filter(env_filter)
            .with_target(true)
            .with_thread_ids(true)
            .init();
    } else {
        fmt().with_env_filter(env_filter).with_target(true).init();
    }
}
