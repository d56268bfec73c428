//! Query descriptors for the event store.

use super::Event;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Restricts events by the sign of their amount.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AmountType {
    #[default]
    All,
    /// `amount < 0`
    Expense,
    /// `amount > 0`
    Income,
}

impl AmountType {
    /// Parse a query value. Unknown or missing values select every event.
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            Some("expense") => Self::Expense,
            Some("income") => Self::Income,
            _ => Self::All,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::All => "all",
            Self::Expense => "expense",
            Self::Income => "income",
        }
    }
}

impl std::fmt::Display for AmountType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// In-page ordering over `occurred_at`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SortOrder {
    Ascending,
    Descending,
    /// Leave events in the order the store returned them.
    Unsorted,
}

impl SortOrder {
    /// Parse a query value.
    ///
    /// Missing means newest first. Values other than `asc`/`desc` are not an
    /// error; they fall back to [`SortOrder::Unsorted`].
    pub fn from_query(value: Option<&str>) -> Self {
        match value.map(str::to_ascii_lowercase).as_deref() {
            None => Self::Descending,
            Some("asc") => Self::Ascending,
            Some("desc") => Self::Descending,
            Some(_) => Self::Unsorted,
        }
    }

    /// Stable in-place sort of one page of events.
    pub fn apply(&self, events: &mut [Event]) {
        match self {
            Self::Ascending => events.sort_by(|a, b| a.occurred_at.cmp(&b.occurred_at)),
            Self::Descending => events.sort_by(|a, b| b.occurred_at.cmp(&a.occurred_at)),
            Self::Unsorted => {}
        }
    }
}

/// Predicate over stored events. `after_time` and `before_time` are
/// inclusive; `until_time` is exclusive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventFilter {
    pub property_id: String,
    pub after_time: Option<DateTime<Utc>>,
    pub before_time: Option<DateTime<Utc>>,
    pub until_time: Option<DateTime<Utc>>,
    pub amount_type: AmountType,
}

impl EventFilter {
    /// Filter on identity only.
    pub fn for_property(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            ..Default::default()
        }
    }

    pub fn after(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.after_time = time;
        self
    }

    pub fn before(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.before_time = time;
        self
    }

    /// Only events that occurred strictly before `time`.
    pub fn until(mut self, time: Option<DateTime<Utc>>) -> Self {
        self.until_time = time;
        self
    }

    pub fn with_amount_type(mut self, amount_type: AmountType) -> Self {
        self.amount_type = amount_type;
        self
    }

    /// True when the filter carries no predicate at all. Stores refuse such
    /// filters instead of scanning every ledger.
    pub fn is_empty(&self) -> bool {
        self.property_id.is_empty()
            && self.after_time.is_none()
            && self.before_time.is_none()
            && self.until_time.is_none()
            && self.amount_type == AmountType::All
    }

    pub fn matches(&self, event: &Event) -> bool {
        if !self.property_id.is_empty() && event.property_id != self.property_id {
            return false;
        }
        if let Some(after) = self.after_time {
            if event.occurred_at < after {
                return false;
            }
        }
        if let Some(before) = self.before_time {
            if event.occurred_at > before {
                return false;
            }
        }
        if let Some(until) = self.until_time {
            if event.occurred_at >= until {
                return false;
            }
        }
        match self.amount_type {
            AmountType::All => true,
            AmountType::Expense => event.is_expense(),
            AmountType::Income => event.is_income(),
        }
    }
}
