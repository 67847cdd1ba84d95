use super::{EventQuery, EventSource, SourceError};
use futures_util::future::BoxFuture;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use sw_protocol::EventRecord;

/// In-process event store. Cloning shares the same records.
#[derive(Clone, Default)]
pub struct MemoryEventSource {
    inner: Arc<Inner>,
}

#[derive(Default)]
struct Inner {
    records: RwLock<Vec<EventRecord>>,
    failing: AtomicBool,
}

impl MemoryEventSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_records(records: impl IntoIterator<Item = EventRecord>) -> Self {
        let source = Self::new();
        source.extend(records);
        source
    }

    pub fn push(&self, record: EventRecord) {
        self.extend(std::iter::once(record));
    }

    pub fn extend(&self, records: impl IntoIterator<Item = EventRecord>) {
        self.inner
            .records
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .extend(records);
    }

    pub fn len(&self) -> usize {
        self.inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// While set, every fetch fails with [`SourceError::Unavailable`].
    pub fn set_failing(&self, failing: bool) {
        self.inner.failing.store(failing, Ordering::SeqCst);
    }

    fn select(&self, query: EventQuery) -> Result<Vec<EventRecord>, SourceError> {
        if self.inner.failing.load(Ordering::SeqCst) {
            return Err(SourceError::Unavailable("memory source set to fail".to_owned()));
        }
        let records = self
            .inner
            .records
            .read()
            .unwrap_or_else(PoisonError::into_inner);
        let mut selected: Vec<EventRecord> = match query {
            EventQuery::Latest { .. } => records.clone(),
            EventQuery::Since { after } => records
                .iter()
                .filter(|e| e.occurred_at > after)
                .cloned()
                .collect(),
        };
        selected.sort_by(EventRecord::newest_first);
        if let EventQuery::Latest { limit } = query {
            selected.truncate(limit);
        }
        Ok(selected)
    }
}

impl EventSource for MemoryEventSource {
    fn fetch(&self, query: EventQuery) -> BoxFuture<'_, Result<Vec<EventRecord>, SourceError>> {
        Box::pin(std::future::ready(self.select(query)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone, Utc};

    fn record(id: i64, secs: i64) -> EventRecord {
        EventRecord {
            id,
            entity_id: format!("AMB-{}", id % 4),
            checkpoint_id: format!("{}", id % 3),
            occurred_at: Utc.timestamp_opt(1_767_225_600, 0).unwrap() + Duration::seconds(secs),
        }
    }

    #[tokio::test]
    async fn latest_returns_newest_first_and_respects_limit() {
        let source = MemoryEventSource::with_records((1..=10).map(|i| record(i, i)));
        let events = source.fetch(EventQuery::Latest { limit: 3 }).await.unwrap();
        let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![10, 9, 8]);
    }

    #[tokio::test]
    async fn since_is_strictly_greater_than() {
        let source = MemoryEventSource::with_records((1..=5).map(|i| record(i, i)));
        let after = record(3, 3).occurred_at;
        let events = source.fetch(EventQuery::Since { after }).await.unwrap();
        let ids: Vec<i64> = events.iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![5, 4]);
    }

    #[tokio::test]
    async fn failing_source_reports_unavailable() {
        let source = MemoryEventSource::new();
        source.set_failing(true);
        let err = source.fetch(EventQuery::Latest { limit: 1 }).await.unwrap_err();
        assert!(matches!(err, SourceError::Unavailable(_)));

        source.set_failing(false);
        assert!(source.fetch(EventQuery::Latest { limit: 1 }).await.is_ok());
    }
}
