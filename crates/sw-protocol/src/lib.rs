// sw-protocol: wire types shared by the broadcaster and its viewers.
//
// The push channel carries bare JSON arrays of `EventRecord` (no envelope,
// no `kind` tag) so that existing browser dashboards keep
// working unchanged.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// Path the broadcaster upgrades to the push channel.
pub const VIEWER_WS_PATH: &str = "/ws";

/// Default size of the bootstrap / most-recent window.
pub const DEFAULT_BOOTSTRAP_WINDOW: usize = 100;

// ---------------------------------------------------------------------------
// Event records
// ---------------------------------------------------------------------------

/// One "ambulance passed traffic light" event.
///
/// Immutable once fetched. `occurred_at` is the ordering key; `id` breaks
/// ties between events recorded at the same instant.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EventRecord {
    /// Opaque store identifier.
    pub id: i64,
    /// Vehicle identifier (ambulance plate).
    pub entity_id: String,
    /// Sensor / location identifier (traffic light).
    pub checkpoint_id: String,
    /// Serialized as RFC 3339 in UTC.
    pub occurred_at: DateTime<Utc>,
}

impl EventRecord {
    /// Comparator that sorts newest first, breaking ties on `id` descending.
    pub fn newest_first(a: &Self, b: &Self) -> Ordering {
        b.occurred_at
            .cmp(&a.occurred_at)
            .then_with(|| b.id.cmp(&a.id))
    }
}

/// Latest `occurred_at` in a batch, regardless of the batch's order.
pub fn max_occurred_at(events: &[EventRecord]) -> Option<DateTime<Utc>> {
    events.iter().map(|e| e.occurred_at).max()
}

/// Encode a batch as the text payload of one push frame.
pub fn encode_batch(events: &[EventRecord]) -> Result<String, serde_json::Error> {
    serde_json::to_string(events)
}

/// Decode the text payload of one push frame.
pub fn decode_batch(text: &str) -> Result<Vec<EventRecord>, serde_json::Error> {
    serde_json::from_str(text)
}

// ---------------------------------------------------------------------------
// HTTP API response types
// ---------------------------------------------------------------------------

/// Response for `GET /health`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    /// Number of sessions currently in the connection registry.
    pub clients: usize,
}

/// HTTP error envelope used by non-2xx responses that are not event arrays.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HttpErrorEnvelope {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}
