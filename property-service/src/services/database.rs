//! MongoDB event store for property-service.

use crate::ledger::{EventStore, StoreError};
use crate::models::{AmountType, Event, EventFilter};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::TryStreamExt;
use mongodb::{
    bson::{doc, oid::ObjectId, DateTime as BsonDateTime, Document},
    options::{FindOneOptions, FindOptions, IndexOptions},
    Client as MongoClient, Collection, Database, IndexModel,
};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use service_core::error::AppError;
use tracing::instrument;

/// Stored shape of an [`Event`].
///
/// Amounts are BSON doubles so the sign filters can be evaluated by the
/// server. `_id` is assigned on insert; sorting on it gives save order.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct EventDocument {
    #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
    id: Option<ObjectId>,
    property_id: String,
    #[serde(with = "rust_decimal::serde::float")]
    event_amount: Decimal,
    #[serde(with = "rust_decimal::serde::float")]
    post_event_balance: Decimal,
    #[serde(with = "mongodb::bson::serde_helpers::chrono_datetime_as_bson_datetime")]
    date: DateTime<Utc>,
}

impl From<&Event> for EventDocument {
    fn from(event: &Event) -> Self {
        Self {
            id: Some(ObjectId::new()),
            property_id: event.property_id.clone(),
            event_amount: event.amount,
            post_event_balance: event.post_event_balance,
            date: event.occurred_at,
        }
    }
}

impl From<EventDocument> for Event {
    fn from(doc: EventDocument) -> Self {
        Event {
            property_id: doc.property_id,
            amount: doc.event_amount,
            post_event_balance: doc.post_event_balance,
            occurred_at: doc.date,
        }
    }
}

#[derive(Clone)]
pub struct MongoEventStore {
    client: MongoClient,
    db: Database,
    collection: String,
}

impl MongoEventStore {
    pub async fn connect(uri: &str, database: &str, collection: &str) -> Result<Self, AppError> {
        tracing::info!(database = %database, "Connecting to MongoDB");
        let client = MongoClient::with_uri_str(uri).await.map_err(|e| {
            tracing::error!("Failed to connect to MongoDB: {}", e);
            AppError::from(e)
        })?;
        let db = client.database(database);
        tracing::info!(database = %database, collection = %collection, "Successfully connected to MongoDB database");
        Ok(Self {
            client,
            db,
            collection: collection.to_string(),
        })
    }

    pub async fn initialize_indexes(&self) -> Result<(), AppError> {
        tracing::info!("Creating MongoDB indexes for property-service");

        let events = self.events();

        // History queries: property scoped, ranged on date
        let history_index = IndexModel::builder()
            .keys(doc! { "property_id": 1, "date": 1 })
            .options(
                IndexOptions::builder()
                    .name("property_date_lookup".to_string())
                    .build(),
            )
            .build();

        events.create_index(history_index, None).await.map_err(|e| {
            tracing::error!("Failed to create property_date index on events collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created index on events.(property_id, date)");

        // Latest-event lookups walk _id backwards per property
        let latest_index = IndexModel::builder()
            .keys(doc! { "property_id": 1, "_id": -1 })
            .options(
                IndexOptions::builder()
                    .name("property_latest_lookup".to_string())
                    .build(),
            )
            .build();

        events.create_index(latest_index, None).await.map_err(|e| {
            tracing::error!("Failed to create property_latest index on events collection: {}", e);
            AppError::from(e)
        })?;
        tracing::info!("Created index on events.(property_id, _id)");

        Ok(())
    }

    fn events(&self) -> Collection<EventDocument> {
        self.db.collection(&self.collection)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }
}

/// Translate a filter into a MongoDB query document.
fn build_filter(filter: &EventFilter) -> Result<Document, StoreError> {
    if filter.is_empty() {
        return Err(StoreError::EmptyFilter);
    }

    let mut query = doc! {};
    if !filter.property_id.is_empty() {
        query.insert("property_id", filter.property_id.clone());
    }

    let mut date = doc! {};
    if let Some(after) = filter.after_time {
        date.insert("$gte", BsonDateTime::from_chrono(after));
    }
    if let Some(before) = filter.before_time {
        date.insert("$lte", BsonDateTime::from_chrono(before));
    }
    if let Some(until) = filter.until_time {
        date.insert("$lt", bson_ceil(until));
    }
    if !date.is_empty() {
        query.insert("date", date);
    }

    match filter.amount_type {
        AmountType::All => {}
        AmountType::Expense => {
            query.insert("event_amount", doc! { "$lt": 0.0 });
        }
        AmountType::Income => {
            query.insert("event_amount", doc! { "$gt": 0.0 });
        }
    }

    Ok(query)
}

/// BSON dates hold milliseconds; round an exclusive bound up so stored
/// (truncated) times that were strictly before it still match.
fn bson_ceil(time: DateTime<Utc>) -> BsonDateTime {
    let millis = time.timestamp_millis();
    if time.timestamp_subsec_nanos() % 1_000_000 == 0 {
        BsonDateTime::from_millis(millis)
    } else {
        BsonDateTime::from_millis(millis.saturating_add(1))
    }
}

#[async_trait]
impl EventStore for MongoEventStore {
    #[instrument(skip(self, event), fields(property_id = %event.property_id))]
    async fn save_event(&self, event: &Event) -> Result<(), StoreError> {
        self.events()
            .insert_one(EventDocument::from(event), None)
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_events_for_filter(
        &self,
        filter: &EventFilter,
        limit: u64,
        offset: u64,
    ) -> Result<Vec<Event>, StoreError> {
        let query = build_filter(filter)?;

        let mut find_options = FindOptions::builder()
            .sort(doc! { "_id": 1 })
            .skip(offset)
            .build();
        if limit > 0 {
            find_options.limit = Some(i64::try_from(limit).unwrap_or(i64::MAX));
        }

        let cursor = self.events().find(query, find_options).await?;
        let documents: Vec<EventDocument> = cursor.try_collect().await?;

        Ok(documents.into_iter().map(Event::from).collect())
    }

    #[instrument(skip(self))]
    async fn get_most_recent_event_for_filter(
        &self,
        filter: &EventFilter,
    ) -> Result<Option<Event>, StoreError> {
        let query = build_filter(filter)?;

        let options = FindOneOptions::builder().sort(doc! { "_id": -1 }).build();
        let document = self.events().find_one(query, options).await?;

        Ok(document.map(Event::from))
    }

    async fn health_check(&self) -> Result<(), StoreError> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 }, None)
            .await
            .map_err(|e| {
                tracing::error!("MongoDB health check failed: {}", e);
                StoreError::from(e)
            })?;
        Ok(())
    }
}
