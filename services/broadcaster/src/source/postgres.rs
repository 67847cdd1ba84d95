use super::{EventQuery, EventSource, SourceError};
use crate::repo::events::{fetch_events_since, fetch_latest_events};
use futures_util::future::BoxFuture;
use sqlx::PgPool;
use std::sync::{Arc, OnceLock};
use std::time::Duration;
use sw_protocol::EventRecord;

/// Event source backed by the `ambulance_events` table.
///
/// The pool slot starts empty and is filled by the connector task once the
/// store is reachable; until then every fetch fails with
/// [`SourceError::NotConnected`] and the broadcaster runs degraded.
#[derive(Clone)]
pub struct PgEventSource {
    pool: Arc<OnceLock<PgPool>>,
    query_timeout: Duration,
}

impl PgEventSource {
    pub fn new(query_timeout: Duration) -> Self {
        Self {
            pool: Arc::new(OnceLock::new()),
            query_timeout,
        }
    }

    pub fn connected(pool: PgPool, query_timeout: Duration) -> Self {
        let source = Self::new(query_timeout);
        let _ = source.pool.set(pool);
        source
    }

    /// Shared slot the connector task installs the pool into.
    pub fn pool_slot(&self) -> Arc<OnceLock<PgPool>> {
        Arc::clone(&self.pool)
    }

    async fn run(&self, query: EventQuery) -> Result<Vec<EventRecord>, SourceError> {
        let pool = self.pool.get().ok_or(SourceError::NotConnected)?;
        let rows = match query {
            EventQuery::Latest { limit } => {
                let limit = i64::try_from(limit).unwrap_or(i64::MAX);
                tokio::time::timeout(self.query_timeout, fetch_latest_events(pool, limit)).await
            }
            EventQuery::Since { after } => {
                tokio::time::timeout(self.query_timeout, fetch_events_since(pool, after)).await
            }
        }
        .map_err(|_| SourceError::Timeout(self.query_timeout))??;
        Ok(rows.into_iter().map(EventRecord::from).collect())
    }
}

impl EventSource for PgEventSource {
    fn fetch(&self, query: EventQuery) -> BoxFuture<'_, Result<Vec<EventRecord>, SourceError>> {
        Box::pin(self.run(query))
    }
}
