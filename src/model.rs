//! Expected-volume model.
//!
//! Produces the expected collection amount for a (depot, date) pair. The
//! model never reads a ticket's reported amount — an estimator tainted by
//! the value it judges makes the classifier tautological.
//!
//! Estimation chain, most to least informed:
//! 1. Matched drain: `visible_drain + fill_rate × duration` — what left
//!    the cauldron plus what flowed in while it was being emptied.
//! 2. Route estimate: `fill_rate × travel_time(depot → market)` when the
//!    depot has a measured fill rate but no drain event on that date.
//! 3. The registry-configured default baseline.

use chrono::NaiveDate;
use tracing::debug;

use crate::config::ModelConfig;
use crate::history::{DrainEvent, LevelHistory};
use crate::registry::Registry;

/// Where an expected amount came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExpectedBasis {
    /// Matched against an observed drain event.
    Drain,
    /// Fill rate over the route travel time — no drain seen that day.
    RouteEstimate,
    /// No usable history; registry-configured default.
    DefaultBaseline,
}

/// Output of one expectation query.
#[derive(Debug, Clone)]
pub struct ExpectedVolume {
    pub amount: f64,
    pub fill_rate: f64,
    pub matched_drain: Option<DrainEvent>,
    pub basis: ExpectedBasis,
}

pub struct ExpectedVolumeModel<'a> {
    registry: &'a Registry,
    history: &'a LevelHistory,
    cfg: &'a ModelConfig,
}

impl<'a> ExpectedVolumeModel<'a> {
    pub fn new(registry: &'a Registry, history: &'a LevelHistory, cfg: &'a ModelConfig) -> Self {
        Self {
            registry,
            history,
            cfg,
        }
    }

    /// Expected collection for a depot on a date.
    ///
    /// Deterministic for identical inputs — this is what makes a refresh
    /// over an unchanged batch idempotent. Never fails for a single
    /// ticket: an unreachable route falls through to the default baseline
    /// rather than propagating.
    pub fn expected(&self, cauldron_id: &str, date: Option<NaiveDate>) -> ExpectedVolume {
        let fill_rate = self.history.fill_rate(cauldron_id);

        if let Some(date) = date {
            if let Some(drain) = self.history.daily_drain(cauldron_id, date) {
                let amount = drain.drain_amount + fill_rate * drain.duration_minutes;
                return ExpectedVolume {
                    amount,
                    fill_rate,
                    matched_drain: Some(drain),
                    basis: ExpectedBasis::Drain,
                };
            }
        }

        // No drain observed that day. If the depot has a measured fill
        // rate, estimate what accumulates over one run to the market.
        if let Some(measured) = self.history.measured_fill_rate(cauldron_id) {
            match self
                .registry
                .get_edge_time(cauldron_id, self.registry.market_id())
            {
                Ok(travel_minutes) => {
                    return ExpectedVolume {
                        amount: measured * travel_minutes,
                        fill_rate: measured,
                        matched_drain: None,
                        basis: ExpectedBasis::RouteEstimate,
                    };
                }
                Err(_) => {
                    debug!(cauldron_id, "No direct route to market, using default baseline");
                }
            }
        }

        ExpectedVolume {
            amount: self.cfg.default_expected,
            fill_rate,
            matched_drain: None,
            basis: ExpectedBasis::DefaultBaseline,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
