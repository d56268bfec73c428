//! Balance ledger: the rules for writing events and reading balances,
//! filtered history and monthly reports on top of an [`EventStore`].

mod error;
mod locks;
mod service;
mod store;

pub use error::LedgerError;
pub use locks::{PropertyGuard, PropertyLocks};
pub use service::{
    EventQuery, LedgerOptions, LedgerService, MonthlyReport, MAX_REPORT_YEAR, MIN_REPORT_YEAR,
};
pub use store::{EventStore, StoreError};
