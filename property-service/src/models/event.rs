//! Ledger event model.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// One signed monetary movement for a property.
///
/// `post_event_balance` is the running balance of the property right after
/// this event was saved. It is computed once at write time and never touched
/// again; events are append-only.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub property_id: String,
    pub amount: Decimal,
    pub post_event_balance: Decimal,
    pub occurred_at: DateTime<Utc>,
}

impl Event {
    pub fn new(
        property_id: impl Into<String>,
        amount: Decimal,
        post_event_balance: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> Self {
        Self {
            property_id: property_id.into(),
            amount,
            post_event_balance,
            occurred_at,
        }
    }

    /// Negative amounts are expenses.
    pub fn is_expense(&self) -> bool {
        self.amount.is_sign_negative() && !self.amount.is_zero()
    }

    /// Positive amounts are income.
    pub fn is_income(&self) -> bool {
        self.amount.is_sign_positive() && !self.amount.is_zero()
    }
}
