use super::{EventStore, LedgerError, PropertyLocks, StoreError};
use crate::models::{AmountType, Event, EventFilter, SortOrder};
use chrono::{DateTime, Duration as TimeDelta, TimeZone, Utc};
use metrics::{counter, histogram};
use rust_decimal::Decimal;
use std::future::Future;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, instrument, warn};

/// Earliest year a monthly report may be requested for.
pub const MIN_REPORT_YEAR: i32 = 1970;
/// Latest year a monthly report may be requested for.
pub const MAX_REPORT_YEAR: i32 = 2030;

#[derive(Debug, Clone)]
pub struct LedgerOptions {
    /// Serialise `save_event` per property within this process.
    pub serialize_writes: bool,
    /// Deadline for each individual store call. `None` waits indefinitely.
    pub store_timeout: Option<Duration>,
}

impl Default for LedgerOptions {
    fn default() -> Self {
        Self {
            serialize_writes: true,
            store_timeout: Some(Duration::from_secs(5)),
        }
    }
}

/// Parameters of a history query.
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub property_id: String,
    pub date_from: Option<DateTime<Utc>>,
    pub date_to: Option<DateTime<Utc>>,
    pub sort_order: SortOrder,
    pub amount_type: AmountType,
    pub offset: u64,
    /// `0` returns every remaining event.
    pub limit: u64,
}

impl EventQuery {
    pub fn new(property_id: impl Into<String>) -> Self {
        Self {
            property_id: property_id.into(),
            date_from: None,
            date_to: None,
            sort_order: SortOrder::Descending,
            amount_type: AmountType::All,
            offset: 0,
            limit: 0,
        }
    }
}

/// One calendar month of events plus the balance carried into it.
///
/// Each event keeps its own `post_event_balance`, which is the property's
/// all-time running balance, not one restarted at `starting_balance`.
#[derive(Debug, Clone, PartialEq)]
pub struct MonthlyReport {
    pub events: Vec<Event>,
    pub starting_balance: Decimal,
}

/// Ledger operations over an [`EventStore`].
///
/// Holds no ledger state of its own; the current balance of a property is
/// the `post_event_balance` of its most recently saved event.
pub struct LedgerService {
    store: Arc<dyn EventStore>,
    write_locks: Option<PropertyLocks>,
    store_timeout: Option<Duration>,
}

impl LedgerService {
    pub fn new(store: Arc<dyn EventStore>, options: LedgerOptions) -> Self {
        Self {
            store,
            write_locks: options.serialize_writes.then(PropertyLocks::new),
            store_timeout: options.store_timeout,
        }
    }

    pub fn store(&self) -> &Arc<dyn EventStore> {
        &self.store
    }

    /// Append `amount` to the ledger of `property_id` and return the new
    /// balance.
    ///
    /// A zero amount writes nothing and returns zero, even with an unset
    /// date. A sum that overflows `Decimal` is rejected before anything is
    /// written. Not idempotent: the
    /// same call twice records two events.
    #[instrument(skip(self), fields(service = "property-service"))]
    pub async fn save_event(
        &self,
        property_id: &str,
        amount: Decimal,
        occurred_at: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        require_property_id(property_id)?;
        if amount.is_zero() {
            debug!("Zero amount, nothing recorded");
            return Ok(Decimal::ZERO);
        }
        if occurred_at == DateTime::<Utc>::default() {
            return Err(LedgerError::invalid("invalid date"));
        }

        let _guard = match &self.write_locks {
            Some(locks) => Some(locks.lock(property_id).await),
            None => None,
        };

        let prior = self
            .most_recent_balance(&EventFilter::for_property(property_id), "get balance")
            .await?;

        let balance = prior
            .checked_add(amount)
            .ok_or_else(|| LedgerError::invalid("balance overflow"))?;

        let event = Event::new(property_id, amount, balance, occurred_at);
        self.call("save event", self.store.save_event(&event))
            .await?;

        counter!("property_events_saved_total").increment(1);
        info!(
            post_event_balance = %event.post_event_balance,
            "Event saved"
        );

        Ok(event.post_event_balance)
    }

    /// Current balance: the balance after the most recently saved event,
    /// whatever its `occurred_at`. Zero when the property has no events.
    #[instrument(skip(self), fields(service = "property-service"))]
    pub async fn get_balance(&self, property_id: &str) -> Result<Decimal, LedgerError> {
        require_property_id(property_id)?;
        self.most_recent_balance(&EventFilter::for_property(property_id), "get balance")
            .await
    }

    /// Balance carried into `at_time`: taken from the most recently saved
    /// event that occurred strictly before it. Zero when there is none.
    #[instrument(skip(self), fields(service = "property-service"))]
    pub async fn get_balance_as_of(
        &self,
        property_id: &str,
        at_time: DateTime<Utc>,
    ) -> Result<Decimal, LedgerError> {
        require_property_id(property_id)?;
        let filter = EventFilter::for_property(property_id).until(Some(at_time));
        self.most_recent_balance(&filter, "get balance for date")
            .await
    }

    /// One page of a property's events, sorted in memory.
    ///
    /// Offset and limit go to the store, so ordering holds within the page
    /// only; it does not reorder across pages.
    #[instrument(skip(self), fields(service = "property-service"))]
    pub async fn get_property_events(&self, query: &EventQuery) -> Result<Vec<Event>, LedgerError> {
        require_property_id(&query.property_id)?;
        if let (Some(from), Some(to)) = (query.date_from, query.date_to) {
            if from > to {
                return Err(LedgerError::invalid("date_from must be before date_to"));
            }
        }

        let filter = EventFilter::for_property(query.property_id.as_str())
            .after(query.date_from)
            .before(query.date_to)
            .with_amount_type(query.amount_type);

        let mut events = self
            .call(
                "get events for filter",
                self.store
                    .get_events_for_filter(&filter, query.limit, query.offset),
            )
            .await?;

        query.sort_order.apply(&mut events);
        debug!(count = events.len(), "Events fetched");

        Ok(events)
    }

    /// Events of one UTC calendar month, oldest first, with the balance
    /// carried into the month.
    #[instrument(skip(self), fields(service = "property-service"))]
    pub async fn get_monthly_report(
        &self,
        property_id: &str,
        month: u32,
        year: i32,
        offset: u64,
        limit: u64,
    ) -> Result<MonthlyReport, LedgerError> {
        require_property_id(property_id)?;
        let (start_of_month, end_of_month) = month_bounds(month, year)?;

        let starting_balance = self.get_balance_as_of(property_id, start_of_month).await?;

        let events = self
            .get_property_events(&EventQuery {
                property_id: property_id.to_string(),
                date_from: Some(start_of_month),
                date_to: Some(end_of_month),
                sort_order: SortOrder::Ascending,
                amount_type: AmountType::All,
                offset,
                limit,
            })
            .await?;

        Ok(MonthlyReport {
            events,
            starting_balance,
        })
    }

    async fn most_recent_balance(
        &self,
        filter: &EventFilter,
        operation: &'static str,
    ) -> Result<Decimal, LedgerError> {
        let latest = self
            .call(
                operation,
                self.store.get_most_recent_event_for_filter(filter),
            )
            .await?;

        Ok(latest
            .map(|e| e.post_event_balance)
            .unwrap_or(Decimal::ZERO))
    }

    /// Run one store call under the configured deadline, recording latency
    /// and wrapping failures with the operation name.
    async fn call<T, F>(&self, operation: &'static str, fut: F) -> Result<T, LedgerError>
    where
        F: Future<Output = Result<T, StoreError>>,
    {
        let start = Instant::now();
        let result = match self.store_timeout {
            Some(limit) => tokio::time::timeout(limit, fut)
                .await
                .unwrap_or_else(|_| Err(StoreError::Timeout(limit))),
            None => fut.await,
        };
        histogram!("property_store_duration_seconds", "operation" => operation)
            .record(start.elapsed().as_secs_f64());

        result.map_err(|source| {
            warn!(operation, error = %source, "Event store call failed");
            counter!("property_store_errors_total", "operation" => operation).increment(1);
            LedgerError::Store { operation, source }
        })
    }
}

fn require_property_id(property_id: &str) -> Result<(), LedgerError> {
    if property_id.is_empty() {
        return Err(LedgerError::invalid("empty property ID"));
    }
    Ok(())
}

/// First instant of the month and the last nanosecond before the next one.
fn month_bounds(month: u32, year: i32) -> Result<(DateTime<Utc>, DateTime<Utc>), LedgerError> {
    if !(1..=12).contains(&month) {
        return Err(LedgerError::invalid(format!(
            "month must be between 1 and 12, got {}",
            month
        )));
    }
    if !(MIN_REPORT_YEAR..=MAX_REPORT_YEAR).contains(&year) {
        return Err(LedgerError::invalid(format!(
            "year must be between {} and {}, got {}",
            MIN_REPORT_YEAR, MAX_REPORT_YEAR, year
        )));
    }

    let (next_year, next_month) = if month == 12 {
        (year + 1, 1)
    } else {
        (year, month + 1)
    };

    let start = Utc
        .with_ymd_and_hms(year, month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| LedgerError::invalid("invalid calendar month"))?;
    let next = Utc
        .with_ymd_and_hms(next_year, next_month, 1, 0, 0, 0)
        .single()
        .ok_or_else(|| LedgerError::invalid("invalid calendar month"))?;

    Ok((start, next - TimeDelta::nanoseconds(1)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::InMemoryEventStore;
    use async_trait::async_trait;
    use rust_decimal_macros::dec;

    fn ledger() -> (LedgerService, Arc<InMemoryEventStore>) {
        let store = Arc::new(InMemoryEventStore::new());
        let ledger = LedgerService::new(store.clone(), LedgerOptions::default());
        (ledger, store)
    }

    fn at(year: i32, month: u32, day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(year, month, day, 10, 0, 0).unwrap()
    }

    /// Store that fails every call.
    struct BrokenStore;

    #[async_trait]
    impl EventStore for BrokenStore {
        async fn save_event(&self, _event: &Event) -> Result<(), StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }

        async fn get_events_for_filter(
            &self,
            _filter: &EventFilter,
            _limit: u64,
            _offset: u64,
        ) -> Result<Vec<Event>, StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }

        async fn get_most_recent_event_for_filter(
            &self,
            _filter: &EventFilter,
        ) -> Result<Option<Event>, StoreError> {
            Err(StoreError::Backend("disk on fire".into()))
        }
    }

    /// Store whose reads never complete.
    struct StalledStore;

    #[async_trait]
    impl EventStore for StalledStore {
        async fn save_event(&self, _event: &Event) -> Result<(), StoreError> {
            std::future::pending().await
        }

        async fn get_events_for_filter(
            &self,
            _filter: &EventFilter,
            _limit: u64,
            _offset: u64,
        ) -> Result<Vec<Event>, StoreError> {
            std::future::pending().await
        }

        async fn get_most_recent_event_for_filter(
            &self,
            _filter: &EventFilter,
        ) -> Result<Option<Event>, StoreError> {
            std::future::pending().await
        }
    }

    #[tokio::test]
    async fn save_event_rejects_empty_property_id() {
        let (ledger, store) = ledger();
        let err = ledger
            .save_event("", dec!(100), at(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
        assert_eq!(store.len().await, 0);
    }

    #[tokio::test]
    async fn save_event_rejects_unset_date() {
        let (ledger, _) = ledger();
        let err = ledger
            .save_event("P1", dec!(100), DateTime::<Utc>::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn zero_amount_writes_nothing() {
        let (ledger, store) = ledger();
        ledger.save_event("P1", dec!(50), at(2024, 3, 1)).await.unwrap();

        let balance = ledger.save_event("P1", dec!(0), at(2024, 3, 2)).await.unwrap();

        assert_eq!(balance, Decimal::ZERO);
        assert_eq!(store.len().await, 1);
        assert_eq!(ledger.get_balance("P1").await.unwrap(), dec!(50));
    }

    #[tokio::test]
    async fn save_event_builds_on_prior_balance() {
        let (ledger, _) = ledger();
        assert_eq!(
            ledger.save_event("P1", dec!(100), at(2024, 3, 1)).await.unwrap(),
            dec!(100)
        );
        assert_eq!(
            ledger.save_event("P1", dec!(-40), at(2024, 3, 2)).await.unwrap(),
            dec!(60)
        );
        assert_eq!(
            ledger.save_event("P2", dec!(7.25), at(2024, 3, 2)).await.unwrap(),
            dec!(7.25)
        );
    }

    #[tokio::test]
    async fn save_event_rejects_balance_overflow() {
        let (ledger, store) = ledger();
        let near_max = Decimal::MAX - dec!(1);
        assert_eq!(
            ledger.save_event("P1", near_max, at(2024, 3, 1)).await.unwrap(),
            near_max
        );

        let err = ledger
            .save_event("P1", near_max, at(2024, 3, 2))
            .await
            .unwrap_err();

        assert!(err.is_invalid_argument());
        assert_eq!(store.len().await, 1);
        assert_eq!(ledger.get_balance("P1").await.unwrap(), near_max);
    }

    #[tokio::test]
    async fn zero_amount_is_checked_before_the_date() {
        let (ledger, store) = ledger();

        let balance = ledger
            .save_event("P1", dec!(0), DateTime::<Utc>::default())
            .await
            .unwrap();
        assert_eq!(balance, Decimal::ZERO);
        assert_eq!(store.len().await, 0);

        let err = ledger
            .save_event("", dec!(0), DateTime::<Utc>::default())
            .await
            .unwrap_err();
        assert!(err.is_invalid_argument());
    }

    #[tokio::test]
    async fn balance_follows_save_order_not_occurred_at() {
        let (ledger, _) = ledger();
        ledger.save_event("P1", dec!(100), at(2024, 3, 10)).await.unwrap();
        ledger.save_event("P1", dec!(-40), at(2024, 3, 1)).await.unwrap();

        assert_eq!(ledger.get_balance("P1").await.unwrap(), dec!(60));
    }

    #[tokio::test]
    async fn balance_is_sum_of_saved_amounts() {
        let (ledger, _) = ledger();
        let amounts = [dec!(10), dec!(-3.5), dec!(200), dec!(-0.01), dec!(42)];
        for (i, amount) in amounts.iter().enumerate() {
            // Deliberately shuffled dates.
            let day = [15, 2, 28, 9, 1][i];
            ledger.save_event("P1", *amount, at(2024, 5, day)).await.unwrap();
        }

        let total: Decimal = amounts.iter().sum();
        assert_eq!(ledger.get_balance("P1").await.unwrap(), total);
    }

    #[tokio::test]
    async fn unknown_property_has_zero_balance_and_no_events() {
        let (ledger, _) = ledger();
        assert_eq!(ledger.get_balance("P1").await.unwrap(), Decimal::ZERO);
        assert!(ledger
            .get_property_events(&EventQuery::new("P1"))
            .await
            .unwrap()
            .is_empty());
    }

    #[tokio::test]
    async fn get_balance_rejects_empty_property_id() {
        let (ledger, _) = ledger();
        assert!(ledger.get_balance("").await.unwrap_err().is_invalid_argument());
    }

    #[tokio::test]
    async fn balance_as_of_excludes_events_at_the_boundary() {
        let (ledger, _) = ledger();
        let boundary = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        ledger.save_event("P1", dec!(60), at(2024, 2, 15)).await.unwrap();
        ledger.save_event("P1", dec!(10), boundary).await.unwrap();

        assert_eq!(
            ledger.get_balance_as_of("P1", boundary).await.unwrap(),
            dec!(60)
        );
        assert_eq!(
            ledger
                .get_balance_as_of("P1", at(2024, 1, 1))
                .await
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn balance_as_of_keeps_sub_millisecond_events_before_the_boundary() {
        let (ledger, _) = ledger();
        let march = Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap();
        ledger
            .save_event("P1", dec!(60), march - TimeDelta::days(10))
            .await
            .unwrap();
        ledger
            .save_event("P1", dec!(5), march - TimeDelta::microseconds(500))
            .await
            .unwrap();

        assert_eq!(ledger.get_balance_as_of("P1", march).await.unwrap(), dec!(65));

        let report = ledger.get_monthly_report("P1", 3, 2024, 0, 50).await.unwrap();
        assert_eq!(report.starting_balance, dec!(65));
        assert!(report.events.is_empty());

        let february = ledger.get_monthly_report("P1", 2, 2024, 0, 50).await.unwrap();
        assert_eq!(february.events.len(), 2);
    }

    #[tokio::test]
    async fn balance_as_of_the_earliest_instant_is_zero() {
        let (ledger, _) = ledger();
        ledger.save_event("P1", dec!(60), at(2024, 2, 15)).await.unwrap();

        assert_eq!(
            ledger
                .get_balance_as_of("P1", DateTime::<Utc>::MIN_UTC)
                .await
                .unwrap(),
            Decimal::ZERO
        );
    }

    #[tokio::test]
    async fn events_are_sorted_within_the_page() {
        let (ledger, _) = ledger();
        ledger.save_event("P1", dec!(100), at(2024, 3, 10)).await.unwrap();
        ledger.save_event("P1", dec!(-40), at(2024, 3, 1)).await.unwrap();

        let mut query = EventQuery::new("P1");
        query.sort_order = SortOrder::Ascending;
        query.limit = 10;
        let events = ledger.get_property_events(&query).await.unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].amount, dec!(-40));
        assert_eq!(events[1].amount, dec!(100));

        query.sort_order = SortOrder::Descending;
        let events = ledger.get_property_events(&query).await.unwrap();
        assert_eq!(events[0].amount, dec!(100));

        query.sort_order = SortOrder::Unsorted;
        let events = ledger.get_property_events(&query).await.unwrap();
        assert_eq!(events[0].amount, dec!(100), "store order is save order");
    }

    #[tokio::test]
    async fn events_filter_by_amount_type() {
        let (ledger, _) = ledger();
        ledger.save_event("P1", dec!(100), at(2024, 3, 1)).await.unwrap();
        ledger.save_event("P1", dec!(-40), at(2024, 3, 2)).await.unwrap();
        ledger.save_event("P1", dec!(-5), at(2024, 3, 3)).await.unwrap();

        let mut query = EventQuery::new("P1");
        query.amount_type = AmountType::Expense;
        assert_eq!(ledger.get_property_events(&query).await.unwrap().len(), 2);

        query.amount_type = AmountType::Income;
        assert_eq!(ledger.get_property_events(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn events_reject_inverted_range_but_accept_equal_bounds() {
        let (ledger, _) = ledger();
        let day = at(2024, 3, 5);
        ledger.save_event("P1", dec!(1), day).await.unwrap();

        let mut query = EventQuery::new("P1");
        query.date_from = Some(day + TimeDelta::minutes(2));
        query.date_to = Some(day);
        assert!(ledger
            .get_property_events(&query)
            .await
            .unwrap_err()
            .is_invalid_argument());

        query.date_from = Some(day);
        let events = ledger.get_property_events(&query).await.unwrap();
        assert_eq!(events.len(), 1);
    }

    #[tokio::test]
    async fn events_are_paged_by_the_store() {
        let (ledger, _) = ledger();
        for day in 1..=5 {
            ledger
                .save_event("P1", Decimal::from(day), at(2024, 3, day))
                .await
                .unwrap();
        }

        let mut query = EventQuery::new("P1");
        query.sort_order = SortOrder::Ascending;
        query.limit = 2;
        query.offset = 2;
        let page = ledger.get_property_events(&query).await.unwrap();
        assert_eq!(
            page.iter().map(|e| e.amount).collect::<Vec<_>>(),
            vec![dec!(3), dec!(4)]
        );

        query.offset = 4;
        assert_eq!(ledger.get_property_events(&query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn monthly_report_carries_prior_balance() {
        let (ledger, _) = ledger();
        ledger.save_event("P1", dec!(60), at(2024, 2, 15)).await.unwrap();
        ledger.save_event("P1", dec!(10), at(2024, 3, 5)).await.unwrap();
        ledger.save_event("P1", dec!(5), at(2024, 4, 1)).await.unwrap();

        let report = ledger.get_monthly_report("P1", 3, 2024, 0, 50).await.unwrap();

        assert_eq!(report.starting_balance, dec!(60));
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].amount, dec!(10));
        assert_eq!(report.events[0].post_event_balance, dec!(70));
    }

    #[tokio::test]
    async fn monthly_report_includes_last_instant_of_december() {
        let (ledger, _) = ledger();
        let last = Utc.with_ymd_and_hms(2023, 12, 31, 23, 59, 59).unwrap()
            + TimeDelta::milliseconds(999);
        ledger.save_event("P1", dec!(1), last).await.unwrap();
        ledger
            .save_event("P1", dec!(2), Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
            .await
            .unwrap();

        let report = ledger.get_monthly_report("P1", 12, 2023, 0, 0).await.unwrap();
        assert_eq!(report.events.len(), 1);
        assert_eq!(report.events[0].amount, dec!(1));
    }

    #[tokio::test]
    async fn monthly_report_validates_calendar() {
        let (ledger, _) = ledger();
        for (month, year) in [(0, 2024), (13, 2024), (6, 1969), (6, 2031)] {
            assert!(ledger
                .get_monthly_report("P1", month, year, 0, 10)
                .await
                .unwrap_err()
                .is_invalid_argument());
        }
        assert!(ledger.get_monthly_report("P1", 1, 1970, 0, 10).await.is_ok());
        assert!(ledger.get_monthly_report("P1", 12, 2030, 0, 10).await.is_ok());
        assert!(ledger
            .get_monthly_report("", 3, 2024, 0, 10)
            .await
            .unwrap_err()
            .is_invalid_argument());
    }

    #[tokio::test]
    async fn store_failures_are_wrapped_with_operation() {
        let ledger = LedgerService::new(Arc::new(BrokenStore), LedgerOptions::default());

        let err = ledger.get_balance("P1").await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Store {
                operation: "get balance",
                ..
            }
        ));

        let err = ledger
            .save_event("P1", dec!(1), at(2024, 3, 1))
            .await
            .unwrap_err();
        assert!(matches!(err, LedgerError::Store { .. }));

        let err = ledger
            .get_property_events(&EventQuery::new("P1"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Store {
                operation: "get events for filter",
                ..
            }
        ));
    }

    #[tokio::test]
    async fn store_calls_observe_the_deadline() {
        let ledger = LedgerService::new(
            Arc::new(StalledStore),
            LedgerOptions {
                serialize_writes: true,
                store_timeout: Some(Duration::from_millis(20)),
            },
        );

        let err = ledger.get_balance("P1").await.unwrap_err();
        assert!(matches!(
            err,
            LedgerError::Store {
                source: StoreError::Timeout(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn concurrent_saves_for_one_property_do_not_lose_updates() {
        let (ledger, store) = ledger();
        let ledger = Arc::new(ledger);

        let tasks: Vec<_> = (0..50)
            .map(|i| {
                let ledger = ledger.clone();
                tokio::spawn(async move {
                    ledger
                        .save_event("P1", dec!(1), at(2024, 3, 1 + (i % 28)))
                        .await
                })
            })
            .collect();
        for task in tasks {
            task.await.unwrap().unwrap();
        }

        assert_eq!(ledger.get_balance("P1").await.unwrap(), dec!(50));
        assert_eq!(store.len().await, 50);
    }
}
