//! Property ledger service: per-property running balances over an
//! append-only event store, with filtered history and monthly reports.

pub mod config;
pub mod cursor;
pub mod dtos;
pub mod handlers;
pub mod ledger;
pub mod models;
pub mod services;
pub mod startup;
