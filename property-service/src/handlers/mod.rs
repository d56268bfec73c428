pub mod health;
pub mod property;

pub use health::{health_check, metrics_endpoint, readiness_check};
pub use property::{get_balance, get_monthly_report, get_property_events, save_event};
