//! Watermark poller.
//!
//! Owns the "last seen" checkpoint: the largest `occurred_at` ever fetched.
//! Before the first successful fetch the watermark is unset and the poller
//! asks for the bootstrap window; afterwards it asks only for events strictly
//! newer than the watermark. The watermark never moves backwards, and a
//! failed or empty fetch leaves it untouched.

use crate::source::{EventQuery, EventSource};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use sw_protocol::{max_occurred_at, EventRecord};
use tracing::{debug, warn};

pub struct WatermarkPoller {
    source: Arc<dyn EventSource>,
    bootstrap_window: usize,
    watermark: Option<DateTime<Utc>>,
}

impl WatermarkPoller {
    pub fn new(source: Arc<dyn EventSource>, bootstrap_window: usize) -> Self {
        Self {
            source,
            bootstrap_window,
            watermark: None,
        }
    }

    pub fn watermark(&self) -> Option<DateTime<Utc>> {
        self.watermark
    }

    /// Fetch events not yet seen, newest first.
    ///
    /// Total: adapter failures are logged and reported as an empty batch.
    pub async fn fetch_new(&mut self) -> Vec<EventRecord> {
        let query = match self.watermark {
            None => EventQuery::Latest {
                limit: self.bootstrap_window,
            },
            Some(after) => EventQuery::Since { after },
        };

        let mut events = match self.source.fetch(query).await {
            Ok(events) => events,
            Err(e) => {
                warn!(
                    error = %e,
                    watermark = ?self.watermark,
                    "event fetch failed; watermark unchanged"
                );
                return Vec::new();
            }
        };

        // Strict greater-than is what keeps an event from being delivered twice.
        if let Some(watermark) = self.watermark {
            events.retain(|e| e.occurred_at > watermark);
        }
        events.sort_by(EventRecord::newest_first);

        if let Some(newest) = max_occurred_at(&events) {
            let advanced = self.watermark.map_or(newest, |w| w.max(newest));
            debug!(events = events.len(), watermark = %advanced, "watermark advanced");
            self.watermark = Some(advanced);
        }
        events
    }
}
