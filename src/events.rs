use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::decimal::Money;
use crate::types::{ClientId, CreditScore, LoanId, LoanStatus, PaymentId};

/// events emitted by the ledger after a state change succeeds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Event {
    // client events
    ClientRegistered {
        client_id: ClientId,
        credit_score: CreditScore,
        timestamp: DateTime<Utc>,
    },
    ClientUpdated {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },
    ClientDeleted {
        client_id: ClientId,
        timestamp: DateTime<Utc>,
    },

    // lifecycle events
    LoanApplied {
        loan_id: LoanId,
        client_id: ClientId,
        amount: Money,
        timestamp: DateTime<Utc>,
    },
    LoanApproved {
        loan_id: LoanId,
        monthly_payment: Money,
        timestamp: DateTime<Utc>,
    },
    LoanRejected {
        loan_id: LoanId,
        automatic: bool,
        timestamp: DateTime<Utc>,
    },
    LoanEdited {
        loan_id: LoanId,
        old_status: LoanStatus,
        new_status: LoanStatus,
        timestamp: DateTime<Utc>,
    },
    LoanDeleted {
        loan_id: LoanId,
        timestamp: DateTime<Utc>,
    },

    // payment events
    PaymentRecorded {
        payment_id: PaymentId,
        loan_id: LoanId,
        amount: Money,
        remaining_payable: Money,
        timestamp: DateTime<Utc>,
    },
    LoanSettled {
        loan_id: LoanId,
        total_paid: Money,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn timestamp(&self) -> DateTime<Utc> {
        match self {
            Event::ClientRegistered { timestamp, .. }
            | Event::ClientUpdated { timestamp, .. }
            | Event::ClientDeleted { timestamp, .. }
            | Event::LoanApplied { timestamp, .. }
            | Event::LoanApproved { timestamp, .. }
            | Event::LoanRejected { timestamp, .. }
            | Event::LoanEdited { timestamp, .. }
            | Event::LoanDeleted { timestamp, .. }
            | Event::PaymentRecorded { timestamp, .. }
            | Event::LoanSettled { timestamp, .. } => *timestamp,
        }
    }
}

/// event store for collecting events during a session
#[derive(Debug, Default)]
pub struct EventStore {
    events: Vec<Event>,
}

impl EventStore {
    pub fn new() -> Self {
        Self { events: Vec::new() }
    }

    pub fn emit(&mut self, event: Event) {
        self.events.push(event);
    }

    pub fn take_events(&mut self) -> Vec<Event> {
        std::mem::take(&mut self.events)
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    pub fn clear(&mut self) {
        self.events.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hourglass_rs::{SafeTimeProvider, TimeSource};

    #[test]
    fn test_emit_and_take() {
        let time = SafeTimeProvider::new(TimeSource::Test(
            "2024-05-01T09:00:00Z".parse::<DateTime<Utc>>().unwrap(),
        ));
        let mut store = EventStore::new();
        store.emit(Event::LoanDeleted {
            loan_id: LoanId(3),
            timestamp: time.now(),
        });
        assert_eq!(store.len(), 1);
        assert_eq!(store.events()[0].timestamp(), time.now());

        let taken = store.take_events();
        assert_eq!(taken.len(), 1);
        assert!(store.is_empty());
    }
}
