use crate::config::{PaginationConfig, PropertyConfig, StoreBackend};
use crate::handlers;
use crate::ledger::{EventStore, LedgerService};
use crate::services::{InMemoryEventStore, MongoEventStore};
use axum::{
    middleware,
    routing::{get, post},
    Router,
};
use service_core::error::AppError;
use service_core::middleware::{metrics_middleware, request_id_middleware};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tower_http::trace::TraceLayer;

#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<LedgerService>,
    pub pagination: PaginationConfig,
}

impl AppState {
    pub fn new(config: &PropertyConfig, store: Arc<dyn EventStore>) -> Self {
        Self {
            ledger: Arc::new(LedgerService::new(store, config.ledger.options())),
            pagination: config.pagination.clone(),
        }
    }
}

/// HTTP routes of the service, without a listener.
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/metrics", get(handlers::metrics_endpoint))
        .route("/property/:property_id", post(handlers::save_event))
        .route("/property/:property_id/balance", get(handlers::get_balance))
        .route(
            "/property/:property_id/events",
            get(handlers::get_property_events),
        )
        .route(
            "/property/:property_id/monthly_report",
            get(handlers::get_monthly_report),
        )
        .route_layer(middleware::from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(middleware::from_fn(request_id_middleware))
        .with_state(state)
}

pub struct Application {
    port: u16,
    server: Box<dyn std::future::Future<Output = std::io::Result<()>> + Send + Unpin>,
    state: AppState,
}

impl Application {
    pub async fn build(config: PropertyConfig) -> Result<Self, AppError> {
        let store: Arc<dyn EventStore> = match config.store.backend {
            StoreBackend::Mongodb => {
                let db = MongoEventStore::connect(
                    &config.mongodb.uri,
                    &config.mongodb.database,
                    &config.mongodb.collection,
                )
                .await
                .map_err(|e| {
                    tracing::error!("Failed to connect to MongoDB: {}", e);
                    e
                })?;
                db.initialize_indexes().await.map_err(|e| {
                    tracing::error!("Failed to initialize database indexes: {}", e);
                    e
                })?;
                Arc::new(db)
            }
            StoreBackend::Memory => {
                tracing::warn!("Using the in-memory event store; events are lost on restart");
                Arc::new(InMemoryEventStore::new())
            }
        };

        Self::build_with_store(config, store).await
    }

    /// Serve over an already constructed store.
    pub async fn build_with_store(
        config: PropertyConfig,
        store: Arc<dyn EventStore>,
    ) -> Result<Self, AppError> {
        let state = AppState::new(&config, store);
        let app = router(state.clone());

        let addr = SocketAddr::from(([0, 0, 0, 0], config.common.port));
        let listener = TcpListener::bind(addr).await.map_err(|e| {
            tracing::error!("Failed to bind TCP listener to {}: {}", addr, e);
            AppError::from(e)
        })?;
        let port = listener.local_addr()?.port();

        tracing::info!("Listening on {}", port);

        let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());

        Ok(Self {
            port,
            server: Box::new(server.into_future()),
            state,
        })
    }

    pub fn ledger(&self) -> &Arc<LedgerService> {
        &self.state.ledger
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub async fn run_until_stopped(self) -> std::io::Result<()> {
        self.server.await
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
