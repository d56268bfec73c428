use crate::ledger::MonthlyReport;
use crate::models::Event;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

#[derive(Debug, Deserialize, Validate)]
pub struct SaveEventRequest {
    #[serde(with = "rust_decimal::serde::float")]
    #[validate(custom(function = "non_zero", message = "Amount must not be zero"))]
    pub amount: Decimal,
    /// Defaults to the time of the request. May lie in the past.
    #[serde(default)]
    pub occurred_at: Option<DateTime<Utc>>,
}

fn non_zero(amount: &Decimal) -> Result<(), ValidationError> {
    if amount.is_zero() {
        return Err(ValidationError::new("non_zero"));
    }
    Ok(())
}

#[derive(Debug, Serialize, Deserialize)]
pub struct BalanceResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

#[derive(Debug, Deserialize, Validate)]
pub struct EventListParams {
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    /// `asc` or `desc`; anything else keeps store order.
    pub sort_order: Option<String>,
    /// `expense` or `income`; anything else selects all events.
    pub amount_type: Option<String>,
    pub offset: Option<u64>,
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    pub limit: Option<u64>,
    pub next_token: Option<String>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventResponse {
    pub property_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub event_amount: Decimal,
    pub date: DateTime<Utc>,
}

impl From<Event> for EventResponse {
    fn from(event: Event) -> Self {
        Self {
            property_id: event.property_id,
            event_amount: event.amount,
            date: event.occurred_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct EventListResponse {
    pub events: Vec<EventResponse>,
    /// Empty when there is no further page.
    pub next_token: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct MonthlyReportParams {
    #[validate(range(min = 1, max = 12, message = "Month must be between 1 and 12"))]
    pub month: u32,
    #[validate(range(min = 1970, max = 2030, message = "Year must be between 1970 and 2030"))]
    pub year: i32,
    pub offset: Option<u64>,
    #[validate(range(min = 1, message = "Limit must be at least 1"))]
    pub limit: Option<u64>,
    pub next_token: Option<String>,
}

/// A monthly report line; `balance` is the all-time running balance after
/// the event.
#[derive(Debug, Serialize, Deserialize)]
pub struct MonthlyReportEventResponse {
    pub property_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    pub event_amount: Decimal,
    pub date: DateTime<Utc>,
    #[serde(with = "rust_decimal::serde::float")]
    pub balance: Decimal,
}

impl From<Event> for MonthlyReportEventResponse {
    fn from(event: Event) -> Self {
        Self {
            property_id: event.property_id,
            event_amount: event.amount,
            date: event.occurred_at,
            balance: event.post_event_balance,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MonthlyReportResponse {
    #[serde(with = "rust_decimal::serde::float")]
    pub starting_balance: Decimal,
    pub events: Vec<MonthlyReportEventResponse>,
    pub next_token: String,
}

impl MonthlyReportResponse {
    pub fn new(report: MonthlyReport, next_token: Option<String>) -> Self {
        Self {
            starting_balance: report.starting_balance,
            events: report.events.into_iter().map(Into::into).collect(),
            next_token: next_token.unwrap_or_default(),
        }
    }
}
