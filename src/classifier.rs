//! Ticket classification.
//!
//! Pure function of (reported, expected): computes the signed difference
//! and relative deviation, buckets the ticket by configurable thresholds,
//! and applies the capacity-violation override. One malformed ticket is
//! excluded and reported — it never aborts the batch.

use tracing::warn;

use crate::config::ClassifierConfig;
use crate::error::{EngineError, Result};
use crate::model::ExpectedVolumeModel;
use crate::registry::Registry;
use crate::types::{ClassifiedTicket, ExcludedTicket, TicketStatus, TransportTicket};

pub struct TicketClassifier<'a> {
    registry: &'a Registry,
    model: &'a ExpectedVolumeModel<'a>,
    cfg: &'a ClassifierConfig,
}

impl<'a> TicketClassifier<'a> {
    pub fn new(
        registry: &'a Registry,
        model: &'a ExpectedVolumeModel<'a>,
        cfg: &'a ClassifierConfig,
    ) -> Self {
        Self {
            registry,
            model,
            cfg,
        }
    }

    /// Classify a whole batch, preserving input order.
    ///
    /// Malformed tickets land in the excluded list with their reason; the
    /// rest of the batch still classifies.
    pub fn classify_batch(
        &self,
        tickets: &[TransportTicket],
    ) -> (Vec<ClassifiedTicket>, Vec<ExcludedTicket>) {
        let mut classified = Vec::with_capacity(tickets.len());
        let mut excluded = Vec::new();

        for ticket in tickets {
            match self.classify(ticket) {
                Ok(result) => classified.push(result),
                Err(EngineError::Validation { ticket_id, reason }) => {
                    warn!(ticket_id = %ticket_id, reason = %reason, "Ticket excluded from batch");
                    excluded.push(ExcludedTicket { ticket_id, reason });
                }
                Err(e) => {
                    // Classification itself never fails for well-formed
                    // tickets; anything else is a validation bug.
                    warn!(ticket_id = %ticket.ticket_id, error = %e, "Unexpected classification error");
                    excluded.push(ExcludedTicket {
                        ticket_id: ticket.ticket_id.clone(),
                        reason: e.to_string(),
                    });
                }
            }
        }

        (classified, excluded)
    }

    /// Classify a single ticket. Terminal in one pass — no retries.
    pub fn classify(&self, ticket: &TransportTicket) -> Result<ClassifiedTicket> {
        let depot = self.validate(ticket)?;

        let reported = ticket.amount_collected;
        let expected = self.model.expected(&ticket.cauldron_id, ticket.calendar_date());
        let difference = reported - expected.amount;
        let relative_deviation = difference.abs() / expected.amount.max(self.cfg.epsilon);
        let percent_error = relative_deviation * 100.0;

        // Capacity violation overrides the deviation rule: an inflated
        // expected baseline must not make an impossible report look small.
        let (status, reason) = if reported > depot.max_volume {
            (
                TicketStatus::Fraudulent,
                format!(
                    "Exceeds cauldron capacity: reported {reported:.1} units (max is {:.1})",
                    depot.max_volume
                ),
            )
        } else {
            self.bucket(difference, relative_deviation, percent_error)
        };

        Ok(ClassifiedTicket {
            ticket_id: ticket.ticket_id.clone(),
            cauldron_id: ticket.cauldron_id.clone(),
            courier_id: ticket.courier_id.clone(),
            date: ticket.date.clone(),
            reported_amount: reported,
            expected_amount: expected.amount,
            difference,
            percent_error,
            status,
            matched_drain: expected.matched_drain.map(|d| d.summary()),
            reason,
            fill_rate_used: expected.fill_rate,
        })
    }

    /// Ties resolve to the lower-severity bucket (inclusive upper bound
    /// on the lower threshold), keeping classification monotonic in the
    /// deviation.
    fn bucket(
        &self,
        difference: f64,
        relative_deviation: f64,
        percent_error: f64,
    ) -> (TicketStatus, String) {
        if relative_deviation <= self.cfg.valid_threshold {
            return (
                TicketStatus::Valid,
                format!("Reported amount matches expected (±{percent_error:.1}%)"),
            );
        }
        if relative_deviation <= self.cfg.fraud_threshold {
            let reason = if difference > 0.0 {
                format!(
                    "Over-reported by {difference:.2} units (+{percent_error:.1}%) - suspicious"
                )
            } else {
                format!(
                    "Under-reported by {:.2} units (-{percent_error:.1}%) - suspicious",
                    difference.abs()
                )
            };
            return (TicketStatus::Suspicious, reason);
        }
        let reason = if difference > 0.0 {
            format!(
                "FRAUD: Over-reported by {difference:.2} units (+{percent_error:.1}%) - likely stealing"
            )
        } else {
            format!(
                "FRAUD: Under-reported by {:.2} units (-{percent_error:.1}%) - likely hoarding",
                difference.abs()
            )
        };
        (TicketStatus::Fraudulent, reason)
    }

    /// Reject tickets the engine cannot judge at all.
    fn validate(&self, ticket: &TransportTicket) -> Result<&crate::types::Cauldron> {
        if !ticket.amount_collected.is_finite() || ticket.amount_collected < 0.0 {
            return Err(EngineError::Validation {
                ticket_id: ticket.ticket_id.clone(),
                reason: format!("invalid reported amount {}", ticket.amount_collected),
            });
        }
        self.registry
            .get_depot(&ticket.cauldron_id)
            .map_err(|_| EngineError::Validation {
                ticket_id: ticket.ticket_id.clone(),
                reason: format!("unknown cauldron {}", ticket.cauldron_id),
            })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
