use crate::models::{Event, EventFilter};
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("no filter criteria specified")]
    EmptyFilter,

    #[error("store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("database error: {0}")]
    Database(#[from] mongodb::error::Error),

    #[error("{0}")]
    Backend(String),
}

/// Durable, append-only event storage.
///
/// Implementations must reject an empty [`EventFilter`] with
/// [`StoreError::EmptyFilter`]. "Most recent" always means most recently
/// saved, not latest `occurred_at`: events may be backdated.
///
/// Nothing here makes "read latest, then append" atomic. The ledger
/// serialises writes per property inside one process; a store shared by
/// several processes needs its own conditional append to close that gap.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event.
    async fn save_event(&self, event: &Event) -> Result<(), StoreError>;

    /// Matching events in store order, skipping `offset` and returning at
    /// most `limit` of them (`0` means no limit).
    async fn get_events_for_filter(
        &self,
        filter: &EventFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Event>, StoreError>;

    /// The most recently saved matching event, if any.
    async fn get_most_recent_event_for_filter(
        &self,
        filter: &EventFilter,
    ) -> Result<Option<Event>, StoreError>;

    async fn health_check(&self) -> Result<(), StoreError> {
        Ok(())
    }
}
