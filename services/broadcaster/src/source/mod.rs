//! Event Source Adapter: the narrow seam between the broadcast engine and
//! whatever store records ambulance events.
//!
//! Implementations return rows newest first (`occurred_at` desc, `id` desc).
//! Two are provided: [`PgEventSource`] for the relational store and
//! [`MemoryEventSource`] for demos and tests.

mod memory;
mod postgres;

pub use memory::MemoryEventSource;
pub use postgres::PgEventSource;

use chrono::{DateTime, Utc};
use futures_util::future::BoxFuture;
use std::time::Duration;
use sw_protocol::EventRecord;

/// Which window of events to fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventQuery {
    /// The `limit` most recent events overall.
    Latest { limit: usize },
    /// Every event strictly newer than `after`.
    Since { after: DateTime<Utc> },
}

#[derive(Debug, thiserror::Error)]
pub enum SourceError {
    #[error("event source not connected")]
    NotConnected,
    #[error("query timed out after {0:?}")]
    Timeout(Duration),
    #[error("query failed: {0}")]
    Query(#[from] sqlx::Error),
    #[error("event source unavailable: {0}")]
    Unavailable(String),
}

pub trait EventSource: Send + Sync {
    fn fetch(&self, query: EventQuery) -> BoxFuture<'_, Result<Vec<EventRecord>, SourceError>>;
}
