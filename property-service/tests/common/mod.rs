use property_service::config::{PropertyConfig, StoreBackend};
use property_service::ledger::EventStore;
use property_service::services::{init_metrics, InMemoryEventStore};
use property_service::startup::Application;
use reqwest::{Client, Response};
use serde_json::{json, Value};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT: Once = Once::new();

pub struct TestApp {
    pub address: String,
    pub port: u16,
    pub client: Client,
}

impl TestApp {
    /// Spawn the service on a random port over a fresh in-memory store.
    pub async fn spawn() -> Self {
        let store: Arc<dyn EventStore> = Arc::new(InMemoryEventStore::new());
        Self::spawn_with_store(store, PropertyConfig::default()).await
    }

    pub async fn spawn_with_store(store: Arc<dyn EventStore>, mut config: PropertyConfig) -> Self {
        INIT.call_once(|| {
            init_metrics();
        });

        config.common.port = 0;
        config.store.backend = StoreBackend::Memory;

        let app = Application::build_with_store(config, store)
            .await
            .expect("Failed to build test application");

        let port = app.port();
        let address = format!("http://127.0.0.1:{}", port);

        tokio::spawn(async move {
            app.run_until_stopped().await.ok();
        });

        let client = Client::new();
        let health_url = format!("{}/health", address);
        for _ in 0..50 {
            if client.get(&health_url).send().await.is_ok() {
                break;
            }
            tokio::time::sleep(tokio::time::Duration::from_millis(20)).await;
        }

        TestApp {
            address,
            port,
            client,
        }
    }

    pub async fn save_event(&self, property_id: &str, body: Value) -> Response {
        self.client
            .post(format!("{}/property/{}", self.address, property_id))
            .json(&body)
            .send()
            .await
            .expect("Failed to execute request")
    }

    /// Save an event and return the reported balance.
    pub async fn save_amount(&self, property_id: &str, amount: f64, occurred_at: &str) -> f64 {
        let response = self
            .save_event(
                property_id,
                json!({ "amount": amount, "occurred_at": occurred_at }),
            )
            .await;
        assert_eq!(response.status().as_u16(), 201);
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["balance"].as_f64().expect("balance is a number")
    }

    pub async fn balance(&self, property_id: &str) -> f64 {
        let response = self
            .client
            .get(format!("{}/property/{}/balance", self.address, property_id))
            .send()
            .await
            .expect("Failed to execute request");
        assert!(response.status().is_success());
        let body: Value = response.json().await.expect("Failed to parse JSON");
        body["balance"].as_f64().expect("balance is a number")
    }

    pub async fn get(&self, path: &str) -> Response {
        self.get_with_query(path, &[]).await
    }

    pub async fn get_with_query(&self, path: &str, query: &[(&str, &str)]) -> Response {
        self.client
            .get(format!("{}{}", self.address, path))
            .query(query)
            .send()
            .await
            .expect("Failed to execute request")
    }
}

/// A property id no other test uses.
pub fn unique_property() -> String {
    format!("prop-{}", Uuid::new_v4())
}
