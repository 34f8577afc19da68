//! Per-courier trust scoring.
//!
//! Aggregates a courier's classified tickets into a 0–100 trust score,
//! accuracy percentage, and fraud-amount total. Output is worst-first:
//! trust ascending, ties broken by fraudulent count descending, then by
//! courier id — the dashboard's leaderboard and "top fraudsters" views
//! rely on this ordering instead of re-sorting.

use std::collections::BTreeMap;
use tracing::debug;

use crate::config::ScoringConfig;
use crate::types::{ClassifiedTicket, TicketStatus, WitchTrustScore};

pub struct TrustScorer<'a> {
    cfg: &'a ScoringConfig,
}

#[derive(Default)]
struct CourierAcc {
    valid: usize,
    suspicious: usize,
    fraudulent: usize,
    penalty: f64,
    fraud_amount: f64,
}

impl<'a> TrustScorer<'a> {
    pub fn new(cfg: &'a ScoringConfig) -> Self {
        Self { cfg }
    }

    /// Score every courier that has at least one classified ticket.
    ///
    /// Every penalty is non-negative, so adding a ticket can never raise
    /// a trust score.
    pub fn score_all(&self, tickets: &[ClassifiedTicket]) -> Vec<WitchTrustScore> {
        let mut couriers: BTreeMap<&str, CourierAcc> = BTreeMap::new();

        for ticket in tickets {
            let acc = couriers.entry(&ticket.courier_id).or_default();
            match ticket.status {
                TicketStatus::Valid => acc.valid += 1,
                TicketStatus::Suspicious => {
                    acc.suspicious += 1;
                    acc.penalty += self.cfg.suspicious_penalty;
                }
                TicketStatus::Fraudulent => {
                    acc.fraudulent += 1;
                    let deviation = ticket
                        .relative_deviation()
                        .min(self.cfg.fraud_deviation_cap);
                    acc.penalty +=
                        self.cfg.fraud_penalty_base + self.cfg.fraud_penalty_scale * deviation;
                    // Only over-reporting counts as stolen volume;
                    // under-reporting is short delivery.
                    if ticket.difference > 0.0 {
                        acc.fraud_amount += ticket.difference;
                    }
                }
            }
        }

        let mut scores: Vec<WitchTrustScore> = couriers
            .into_iter()
            .map(|(courier_id, acc)| {
                let total = acc.valid + acc.suspicious + acc.fraudulent;
                let trust_score = (100.0 - acc.penalty).clamp(0.0, 100.0).round() as u32;
                WitchTrustScore {
                    courier_id: courier_id.to_string(),
                    trust_score,
                    accuracy_percent: acc.valid as f64 / total as f64 * 100.0,
                    total_tickets: total,
                    valid_tickets: acc.valid,
                    suspicious_tickets: acc.suspicious,
                    fraudulent_tickets: acc.fraudulent,
                    total_fraud_amount: acc.fraud_amount,
                }
            })
            .collect();

        scores.sort_by(|a, b| {
            a.trust_score
                .cmp(&b.trust_score)
                .then(b.fraudulent_tickets.cmp(&a.fraudulent_tickets))
                .then(a.courier_id.cmp(&b.courier_id))
        });

        debug!(couriers = scores.len(), "Trust scores computed");
        scores
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(courier_id: &str, status: TicketStatus, difference: f64, percent_error: f64) -> ClassifiedTicket {
        ClassifiedTicket {
            ticket_id: format!("t_{courier_id}_{}", percent_error as i64),
            cauldron_id: "cauldron_1".to_string(),
            courier_id: courier_id.to_string(),
            date: "2025-11-01".to_string(),
            reported_amount: 50.0 + difference,
            expected_amount: 50.0,
            difference,
            percent_error,
            status,
            matched_drain: None,
            reason: String::new(),
            fill_rate_used: 0.1,
        }
    }

    fn cfg() -> ScoringConfig {
        ScoringConfig::default()
    }

    #[test]
    fn test_all_valid_is_full_trust() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let tickets = vec![
            ticket("w1", TicketStatus::Valid, 1.0, 2.0),
            ticket("w1", TicketStatus::Valid, -1.0, 2.0),
        ];
        let scores = scorer.score_all(&tickets);
        assert_eq!(scores.len(), 1);
        assert_eq!(scores[0].trust_score, 100);
        assert!((scores[0].accuracy_percent - 100.0).abs() < 1e-9);
    }

    #[test]
    fn test_counts_sum_to_total() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let tickets = vec![
            ticket("w1", TicketStatus::Valid, 1.0, 2.0),
            ticket("w1", TicketStatus::Suspicious, 5.0, 10.0),
            ticket("w1", TicketStatus::Fraudulent, 20.0, 40.0),
            ticket("w1", TicketStatus::Fraudulent, -20.0, 40.0),
        ];
        let scores = scorer.score_all(&tickets);
        let s = &scores[0];
        assert_eq!(
            s.valid_tickets + s.suspicious_tickets + s.fraudulent_tickets,
            s.total_tickets
        );
        assert_eq!(s.total_tickets, 4);
    }

    #[test]
    fn test_penalties_follow_config() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        // One suspicious (−5), one fraudulent at 40% deviation
        // (−(15 + 10·0.4) = −19) → 100 − 24 = 76.
        let tickets = vec![
            ticket("w1", TicketStatus::Suspicious, 5.0, 10.0),
            ticket("w1", TicketStatus::Fraudulent, 20.0, 40.0),
        ];
        let scores = scorer.score_all(&tickets);
        assert_eq!(scores[0].trust_score, 76);
    }

    #[test]
    fn test_fraud_penalty_scales_with_deviation() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let mild = scorer.score_all(&[ticket("w1", TicketStatus::Fraudulent, 10.0, 20.0)]);
        let severe = scorer.score_all(&[ticket("w1", TicketStatus::Fraudulent, 60.0, 120.0)]);
        assert!(severe[0].trust_score < mild[0].trust_score);
    }

    #[test]
    fn test_deviation_cap_bounds_single_ticket_penalty() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        // 5000% deviation is capped at 3.0 → penalty 15 + 30 = 45.
        let scores = scorer.score_all(&[ticket("w1", TicketStatus::Fraudulent, 2500.0, 5000.0)]);
        assert_eq!(scores[0].trust_score, 55);
    }

    #[test]
    fn test_score_clamped_at_zero() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let tickets: Vec<_> = (0..10)
            .map(|_| ticket("w1", TicketStatus::Fraudulent, 100.0, 200.0))
            .collect();
        let scores = scorer.score_all(&tickets);
        assert_eq!(scores[0].trust_score, 0);
    }

    #[test]
    fn test_monotonic_adding_fraud_never_raises_trust() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let mut tickets = vec![ticket("w1", TicketStatus::Valid, 0.0, 0.0)];
        let mut last = scorer.score_all(&tickets)[0].trust_score;
        for _ in 0..6 {
            tickets.push(ticket("w1", TicketStatus::Fraudulent, 25.0, 50.0));
            let now = scorer.score_all(&tickets)[0].trust_score;
            assert!(now <= last);
            last = now;
        }
    }

    #[test]
    fn test_fraud_amount_only_positive_differences() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let tickets = vec![
            ticket("w1", TicketStatus::Fraudulent, 30.0, 60.0),
            ticket("w1", TicketStatus::Fraudulent, -25.0, 50.0), // short delivery
            ticket("w1", TicketStatus::Suspicious, 6.0, 12.0),   // not fraudulent
        ];
        let scores = scorer.score_all(&tickets);
        assert!((scores[0].total_fraud_amount - 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_worst_first_ordering() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let tickets = vec![
            // w_clean: all valid → 100.
            ticket("w_clean", TicketStatus::Valid, 0.0, 0.0),
            // w_bad: two fraudulent → low score.
            ticket("w_bad", TicketStatus::Fraudulent, 25.0, 50.0),
            ticket("w_bad", TicketStatus::Fraudulent, 25.0, 50.0),
            // w_meh: one suspicious → 95.
            ticket("w_meh", TicketStatus::Suspicious, 5.0, 10.0),
        ];
        let scores = scorer.score_all(&tickets);
        let order: Vec<&str> = scores.iter().map(|s| s.courier_id.as_str()).collect();
        assert_eq!(order, vec!["w_bad", "w_meh", "w_clean"]);
    }

    #[test]
    fn test_tie_breaks_deterministic() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        // w_a and w_b end at the same trust with the same fraud count;
        // courier id breaks the tie.
        let tickets = vec![
            ticket("w_b", TicketStatus::Suspicious, 5.0, 10.0),
            ticket("w_a", TicketStatus::Suspicious, 5.0, 10.0),
        ];
        let scores = scorer.score_all(&tickets);
        assert_eq!(scores[0].courier_id, "w_a");
        assert_eq!(scores[1].courier_id, "w_b");
    }

    #[test]
    fn test_equal_trust_more_fraudulent_first() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        // Both end at trust 55: w_x with one capped-deviation fraud
        // (15 + 10·3 = 45), w_y with three zero-deviation frauds (3·15).
        let tickets = vec![
            ticket("w_x", TicketStatus::Fraudulent, 2500.0, 5000.0),
            ticket("w_y", TicketStatus::Fraudulent, 0.0, 0.0),
            ticket("w_y", TicketStatus::Fraudulent, 0.0, 0.0),
            ticket("w_y", TicketStatus::Fraudulent, 0.0, 0.0),
        ];
        let scores = scorer.score_all(&tickets);
        assert_eq!(scores[0].trust_score, scores[1].trust_score);
        assert_eq!(scores[0].courier_id, "w_y");
    }

    #[test]
    fn test_zero_ticket_couriers_absent() {
        let cfg = cfg();
        let scorer = TrustScorer::new(&cfg);
        let scores = scorer.score_all(&[]);
        assert!(scores.is_empty());
    }
}
