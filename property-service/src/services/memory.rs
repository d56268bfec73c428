//! Process-local event store.
//!
//! Keeps every event in a vector in save order. Used by the test suites and
//! when the service runs with `store.backend = "memory"`.

use crate::ledger::{EventStore, StoreError};
use crate::models::{Event, EventFilter};
use async_trait::async_trait;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
pub struct InMemoryEventStore {
    events: RwLock<Vec<Event>>,
}

impl InMemoryEventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store, in save order.
    pub fn with_events(events: Vec<Event>) -> Self {
        Self {
            events: RwLock::new(events),
        }
    }

    pub async fn len(&self) -> usize {
        self.events.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.events.read().await.is_empty()
    }
}

#[async_trait]
impl EventStore for InMemoryEventStore {
    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        self.events.write().await.push(event.clone());
        Ok(())
    }

    async fn get_events_for_filter(
        &self,
        filter: &EventFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Event>, StoreError> {
        if filter.is_empty() {
            return Err(StoreError::EmptyFilter);
        }

        let take = if limit == 0 {
            usize::MAX
        } else {
            usize::try_from(limit).unwrap_or(usize::MAX)
        };
        let skip = usize::try_from(offset).unwrap_or(usize::MAX);

        let events = self.events.read().await;
        Ok(events
            .iter()
            .filter(|e| filter.matches(e))
            .skip(skip)
            .take(take)
            .cloned()
            .collect())
    }

    async fn get_most_recent_event_for_filter(
        &self,
        filter: &EventFilter,
    ) -> Result<Option<Event>, StoreError> {
        if filter.is_empty() {
            return Err(StoreError::EmptyFilter);
        }

        let events = self.events.read().await;
        Ok(events.iter().rev().find(|e| filter.matches(e)).cloned())
    }
}
