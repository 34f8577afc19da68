//! Fleet-wide summary aggregation.
//!
//! A pure fold over the classified ticket set. An empty batch reports a
//! fraud rate of 0, never NaN.

use crate::types::{ClassifiedTicket, Summary, TicketStatus};

/// Roll all classified tickets into the fleet summary.
pub fn summarize(tickets: &[ClassifiedTicket]) -> Summary {
    let mut valid_count = 0;
    let mut suspicious_count = 0;
    let mut fraudulent_count = 0;

    for ticket in tickets {
        match ticket.status {
            TicketStatus::Valid => valid_count += 1,
            TicketStatus::Suspicious => suspicious_count += 1,
            TicketStatus::Fraudulent => fraudulent_count += 1,
        }
    }

    let total_tickets = tickets.len();
    let fraud_rate = if total_tickets > 0 {
        fraudulent_count as f64 / total_tickets as f64 * 100.0
    } else {
        0.0
    };

    Summary {
        total_tickets,
        valid_count,
        suspicious_count,
        fraudulent_count,
        fraud_rate,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn ticket(status: TicketStatus) -> ClassifiedTicket {
        ClassifiedTicket {
            ticket_id: "t".to_string(),
            cauldron_id: "cauldron_1".to_string(),
            courier_id: "w1".to_string(),
            date: "2025-11-01".to_string(),
            reported_amount: 50.0,
            expected_amount: 50.0,
            difference: 0.0,
            percent_error: 0.0,
            status,
            matched_drain: None,
            reason: String::new(),
            fill_rate_used: 0.1,
        }
    }

    #[test]
    fn test_counts_sum_to_total() {
        let tickets = vec![
            ticket(TicketStatus::Valid),
            ticket(TicketStatus::Valid),
            ticket(TicketStatus::Suspicious),
            ticket(TicketStatus::Fraudulent),
        ];
        let s = summarize(&tickets);
        assert_eq!(s.total_tickets, 4);
        assert_eq!(s.valid_count + s.suspicious_count + s.fraudulent_count, 4);
    }

    #[test]
    fn test_fraud_rate_exact() {
        let tickets = vec![
            ticket(TicketStatus::Fraudulent),
            ticket(TicketStatus::Valid),
            ticket(TicketStatus::Valid),
            ticket(TicketStatus::Valid),
        ];
        let s = summarize(&tickets);
        assert!((s.fraud_rate - 25.0).abs() < 1e-12);
        assert!(s.fraud_rate >= 0.0 && s.fraud_rate <= 100.0);
    }

    #[test]
    fn test_empty_batch_is_all_zero() {
        let s = summarize(&[]);
        assert_eq!(s.total_tickets, 0);
        assert_eq!(s.valid_count, 0);
        assert_eq!(s.suspicious_count, 0);
        assert_eq!(s.fraudulent_count, 0);
        assert_eq!(s.fraud_rate, 0.0);
        assert!(!s.fraud_rate.is_nan());
    }

    #[test]
    fn test_all_fraudulent_is_hundred_percent() {
        let tickets = vec![ticket(TicketStatus::Fraudulent); 3];
        let s = summarize(&tickets);
        assert!((s.fraud_rate - 100.0).abs() < 1e-12);
    }
}
