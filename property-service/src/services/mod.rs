pub mod database;
pub mod memory;
pub mod metrics;

pub use database::MongoEventStore;
pub use memory::InMemoryEventStore;
pub use metrics::{get_metrics, init_metrics};
