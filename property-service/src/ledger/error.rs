use super::StoreError;
use crate::cursor::CursorError;
use service_core::error::AppError;
use thiserror::Error;

/// Failures surfaced by the ledger.
///
/// There is no "not found": a property without history has a zero balance
/// and an empty event list.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// Rejected before any store access.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid cursor: {0}")]
    InvalidCursor(#[from] CursorError),

    /// The event store failed; never retried here.
    #[error("{operation}: {source}")]
    Store {
        operation: &'static str,
        #[source]
        source: StoreError,
    },
}

impl LedgerError {
    pub fn invalid(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn is_invalid_argument(&self) -> bool {
        matches!(self, Self::InvalidArgument(_) | Self::InvalidCursor(_))
    }
}

impl From<LedgerError> for AppError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::InvalidArgument(_) | LedgerError::InvalidCursor(_) => {
                AppError::BadRequest(anyhow::Error::new(err))
            }
            LedgerError::Store {
                source: StoreError::Timeout(_),
                ..
            } => AppError::GatewayTimeout(anyhow::Error::new(err)),
            LedgerError::Store { .. } => AppError::DatabaseError(anyhow::Error::new(err)),
        }
    }
}
