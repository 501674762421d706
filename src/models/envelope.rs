//! The uniform response wrapper returned by every backend endpoint.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Generic response envelope.
///
/// Every endpoint wraps its payload in this structure. The payload itself is
/// opaque to the transport layer; callers name a concrete type or keep the
/// default `Value`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(bound(deserialize = "T: Deserialize<'de>"))]
pub struct Envelope<T = Value> {
    pub status: String,
    pub status_code: u16,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub payload: Option<T>,
    #[serde(default)]
    pub date: Option<DateTime<Utc>>,
}

impl<T> Envelope<T> {
    /// True when the backend reported the call as successful.
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }
}
