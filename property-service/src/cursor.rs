//! Opaque pagination tokens.
//!
//! A token is base64url (unpadded) over the JSON `{"limit":L,"offset":O}`. It
//! is not signed or tied to a query: a client can craft any offset it likes,
//! which only ever changes which page of its own query it reads.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaginationCursor {
    pub limit: u64,
    pub offset: u64,
}

#[derive(Debug, Error)]
pub enum CursorError {
    #[error("empty cursor")]
    Empty,

    #[error("failed to decode cursor: {0}")]
    Encoding(#[from] base64::DecodeError),

    #[error("malformed cursor: {0}")]
    Shape(#[from] serde_json::Error),
}

impl PaginationCursor {
    pub fn new(limit: u64, offset: u64) -> Self {
        Self { limit, offset }
    }

    pub fn is_zero(&self) -> bool {
        self.limit == 0 && self.offset == 0
    }

    /// Serialize into a token. The zero cursor encodes to `""`.
    pub fn encode(&self) -> String {
        if self.is_zero() {
            return String::new();
        }
        // Two integers always serialize.
        let json = serde_json::to_vec(self).unwrap_or_default();
        URL_SAFE_NO_PAD.encode(json)
    }

    /// Parse a token produced by [`PaginationCursor::encode`].
    ///
    /// Callers check for an absent token first; `""` is rejected.
    pub fn decode(token: &str) -> Result<Self, CursorError> {
        if token.is_empty() {
            return Err(CursorError::Empty);
        }
        let bytes = URL_SAFE_NO_PAD.decode(token)?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

/// Encode `limit`/`offset` into a token; `(0, 0)` yields `""`.
pub fn encode(limit: u64, offset: u64) -> String {
    PaginationCursor::new(limit, offset).encode()
}

/// Decode a token into `(limit, offset)`.
pub fn decode(token: &str) -> Result<(u64, u64), CursorError> {
    PaginationCursor::decode(token).map(|c| (c.limit, c.offset))
}

/// Token for the page after one that returned `returned` events, if any.
///
/// A full page (`returned >= limit`) may have a successor; a short page is
/// the last one. An unbounded query (`limit == 0`) never has a next page.
pub fn next_page_token(limit: u64, offset: u64, returned: usize) -> Option<String> {
    if limit == 0 || (returned as u64) < limit {
        return None;
    }
    Some(encode(limit, offset.saturating_add(limit)))
}
