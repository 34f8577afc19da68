//! Shared types for the Truth Serum engine.
//!
//! These types form the data model used across all modules.
//! The serialized field names are a wire contract: the dashboard
//! frontend consumes them verbatim, so renames here are breaking.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use std::fmt;

// ---------------------------------------------------------------------------
// Background / registry data
// ---------------------------------------------------------------------------

/// A potion depot ("cauldron"): a production node with a hard capacity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Cauldron {
    pub id: String,
    pub name: String,
    pub latitude: f64,
    pub longitude: f64,
    /// Capacity ceiling — a reported collection above this is fraud
    /// regardless of any deviation math.
    pub max_volume: f64,
}

/// The single distribution hub all depots route toward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnchantedMarket {
    pub id: String,
    pub name: String,
    pub description: String,
    pub latitude: f64,
    pub longitude: f64,
}

/// One edge of the travel-time graph over depots + market.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEdge {
    pub from: String,
    pub to: String,
    pub travel_time_minutes: f64,
}

/// The travel-time network.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Network {
    pub edges: Vec<RouteEdge>,
}

/// Static reference data loaded once at startup and embedded in every
/// snapshot for the dashboard's map view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackgroundData {
    pub cauldrons: Vec<Cauldron>,
    pub enchanted_market: EnchantedMarket,
    pub network: Network,
}

// ---------------------------------------------------------------------------
// Tickets
// ---------------------------------------------------------------------------

/// A raw transport ticket as reported upstream, before classification.
///
/// `amount_collected` is the courier-supplied figure the engine judges.
/// Ids are opaque keys — the engine never parses their textual shape.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TransportTicket {
    pub ticket_id: String,
    pub cauldron_id: String,
    pub courier_id: String,
    /// ISO date string, passed through to the output unchanged.
    pub date: String,
    pub amount_collected: f64,
}

impl TransportTicket {
    /// Calendar date of the transport, if the `date` field parses.
    /// Accepts both bare dates and full ISO timestamps.
    pub fn calendar_date(&self) -> Option<NaiveDate> {
        let prefix = self.date.get(..10)?;
        NaiveDate::parse_from_str(prefix, "%Y-%m-%d").ok()
    }
}

/// Classification outcome for one ticket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TicketStatus {
    Valid,
    Suspicious,
    Fraudulent,
}

impl TicketStatus {
    /// Numeric severity for monotonicity checks (higher = worse).
    pub fn severity(&self) -> u8 {
        match self {
            TicketStatus::Valid => 0,
            TicketStatus::Suspicious => 1,
            TicketStatus::Fraudulent => 2,
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TicketStatus::Valid => write!(f, "valid"),
            TicketStatus::Suspicious => write!(f, "suspicious"),
            TicketStatus::Fraudulent => write!(f, "fraudulent"),
        }
    }
}

/// The drain event a ticket was matched against, kept for auditability.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DrainSummary {
    pub start_time: String,
    pub end_time: String,
    pub duration_minutes: f64,
    pub visible_drain: f64,
}

/// A fully classified ticket.
///
/// `expected_amount`, `difference`, `percent_error`, and `status` are all
/// derived in the same run — never stored or mutated independently, so a
/// ticket can never carry a stale expected value next to a fresh status.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClassifiedTicket {
    pub ticket_id: String,
    pub cauldron_id: String,
    pub courier_id: String,
    pub date: String,
    pub reported_amount: f64,
    pub expected_amount: f64,
    /// Signed: positive = over-reported, negative = under-reported.
    pub difference: f64,
    /// `|difference| / max(expected, ε) * 100`.
    pub percent_error: f64,
    pub status: TicketStatus,
    pub matched_drain: Option<DrainSummary>,
    pub reason: String,
    pub fill_rate_used: f64,
}

impl ClassifiedTicket {
    /// Deviation as a ratio rather than a percentage.
    pub fn relative_deviation(&self) -> f64 {
        self.percent_error / 100.0
    }
}

impl fmt::Display for ClassifiedTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} @ {}: reported {:.1} vs expected {:.1} → {}",
            self.ticket_id,
            self.courier_id,
            self.cauldron_id,
            self.reported_amount,
            self.expected_amount,
            self.status,
        )
    }
}

// ---------------------------------------------------------------------------
// Aggregates
// ---------------------------------------------------------------------------

/// Per-courier trust record, recomputed from classified tickets each run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WitchTrustScore {
    pub courier_id: String,
    /// 0–100, starts at 100, monotonically decreasing with severity.
    pub trust_score: u32,
    pub accuracy_percent: f64,
    pub total_tickets: usize,
    pub valid_tickets: usize,
    pub suspicious_tickets: usize,
    pub fraudulent_tickets: usize,
    /// Over-reported units on fraudulent tickets only. Under-reporting is
    /// short delivery, a different failure mode, and is not summed here.
    pub total_fraud_amount: f64,
}

/// Fleet-wide counts over one classified batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Summary {
    pub total_tickets: usize,
    pub valid_count: usize,
    pub suspicious_count: usize,
    pub fraudulent_count: usize,
    /// Percentage in [0, 100]; 0 for an empty batch.
    pub fraud_rate: f64,
}

/// A ticket rejected during validation, reported rather than silently dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExcludedTicket {
    pub ticket_id: String,
    pub reason: String,
}

/// Run metadata attached to every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunMetadata {
    pub generated_at: DateTime<Utc>,
    pub excluded_tickets: Vec<ExcludedTicket>,
}

/// One immutable, fully computed analysis result.
///
/// Built entirely off to the side and published by swapping a single
/// reference — readers never observe a torn intermediate state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisSnapshot {
    pub summary: Summary,
    /// Insertion/date order of the source batch; the dashboard filters
    /// client-side and relies on this ordering.
    pub tickets: Vec<ClassifiedTicket>,
    /// Worst-first: trust ascending, then fraudulent count descending,
    /// then courier_id. The dashboard's leaderboard trusts this order.
    pub witch_trust_scores: Vec<WitchTrustScore>,
    pub cauldron_fill_rates: BTreeMap<String, f64>,
    pub background: BackgroundData,
    pub metadata: RunMetadata,
}

impl AnalysisSnapshot {
    /// Suspicious and fraudulent tickets only (the `/api/flagged` view).
    pub fn flagged_tickets(&self) -> Vec<&ClassifiedTicket> {
        self.tickets
            .iter()
            .filter(|t| t.status != TicketStatus::Valid)
            .collect()
    }
}

// ---------------------------------------------------------------------------
// Upstream level history
// ---------------------------------------------------------------------------

/// One timestamped reading of every cauldron's level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LevelReading {
    pub timestamp: DateTime<Utc>,
    pub cauldron_levels: HashMap<String, f64>,
}

/// Everything one analysis run consumes from upstream.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TicketBatch {
    pub tickets: Vec<TransportTicket>,
    pub readings: Vec<LevelReading>,
}

// ---------------------------------------------------------------------------
// Test helpers
// ---------------------------------------------------------------------------

impl TransportTicket {
    /// Build a test ticket with sensible defaults.
    #[cfg(test)]
    pub fn sample(ticket_id: &str, cauldron_id: &str, courier_id: &str, amount: f64) -> Self {
        TransportTicket {
            ticket_id: ticket_id.to_string(),
            cauldron_id: cauldron_id.to_string(),
            courier_id: courier_id.to_string(),
            date: "2025-11-01".to_string(),
            amount_collected: amount,
        }
    }
}

impl BackgroundData {
    /// Two depots linked to the market, for deterministic unit tests.
    #[cfg(test)]
    pub fn sample() -> Self {
        BackgroundData {
            cauldrons: vec![
                Cauldron {
                    id: "cauldron_1".to_string(),
                    name: "Moonlit Brewery".to_string(),
                    latitude: 32.99,
                    longitude: -96.75,
                    max_volume: 100.0,
                },
                Cauldron {
                    id: "cauldron_2".to_string(),
                    name: "Thornwood Vats".to_string(),
                    latitude: 33.02,
                    longitude: -96.70,
                    max_volume: 150.0,
                },
            ],
            enchanted_market: EnchantedMarket {
                id: "market_1".to_string(),
                name: "Enchanted Market".to_string(),
                description: "Central potion exchange".to_string(),
                latitude: 33.00,
                longitude: -96.72,
            },
            network: Network {
                edges: vec![
                    RouteEdge {
                        from: "cauldron_1".to_string(),
                        to: "market_1".to_string(),
                        travel_time_minutes: 45.0,
                    },
                    RouteEdge {
                        from: "cauldron_2".to_string(),
                        to: "market_1".to_string(),
                        travel_time_minutes: 30.0,
                    },
                ],
            },
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
