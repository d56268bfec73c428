//! Domain models for property-service.

mod event;
mod filter;

pub use event::Event;
pub use filter::{AmountType, EventFilter, SortOrder};
