//! Scrolling feed: the bounded list of recently admitted events.

use chrono::{DateTime, Utc};
use std::collections::VecDeque;
use sw_protocol::{EventRecord, max_occurred_at};

pub const FEED_CAPACITY: usize = 50;

/// Viewer-local feed state. Reset on every new connection.
#[derive(Debug, Clone, Default)]
pub struct FeedState {
    last_rendered_at: Option<DateTime<Utc>>,
    feed: VecDeque<EventRecord>,
}

impl FeedState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn last_rendered_at(&self) -> Option<DateTime<Utc>> {
        self.last_rendered_at
    }

    /// Feed entries, head first.
    pub fn entries(&self) -> impl Iterator<Item = &EventRecord> {
        self.feed.iter()
    }

    pub fn len(&self) -> usize {
        self.feed.len()
    }

    pub fn is_empty(&self) -> bool {
        self.feed.is_empty()
    }

    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Admit every record newer than the last one rendered.
    ///
    /// Admitted records go to the head as one block in batch order, then the
    /// tail is trimmed back to [`FEED_CAPACITY`]. Returns how many records
    /// were admitted.
    pub fn admit(&mut self, batch: &[EventRecord]) -> usize {
        let floor = self.last_rendered_at.unwrap_or(DateTime::<Utc>::UNIX_EPOCH);
        let admitted: Vec<EventRecord> = batch
            .iter()
            .filter(|e| e.occurred_at > floor)
            .cloned()
            .collect();
        let Some(newest) = max_occurred_at(&admitted) else {
            return 0;
        };

        for record in admitted.iter().rev() {
            self.feed.push_front(record.clone());
        }
        self.feed.truncate(FEED_CAPACITY);
        self.last_rendered_at = Some(newest);
        admitted.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(1_773_480_000, 0).unwrap() + Duration::seconds(secs)
    }

    fn record(id: i64, secs: i64) -> EventRecord {
        EventRecord {
            id,
            entity_id: format!("AMB-{}", id % 6),
            checkpoint_id: format!("{}", id % 4),
            occurred_at: at(secs),
        }
    }

    fn newest_first(ids: std::ops::RangeInclusive<i64>) -> Vec<EventRecord> {
        ids.rev().map(|i| record(i, i)).collect()
    }

    fn feed_ids(feed: &FeedState) -> Vec<i64> {
        feed.entries().map(|e| e.id).collect()
    }

    #[test]
    fn first_batch_is_admitted_against_epoch_zero() {
        let mut feed = FeedState::new();
        assert_eq!(feed.admit(&newest_first(1..=3)), 3);
        assert_eq!(feed_ids(&feed), vec![3, 2, 1]);
        assert_eq!(feed.last_rendered_at(), Some(at(3)));
    }

    #[test]
    fn admitted_block_goes_ahead_of_older_entries_in_batch_order() {
        let mut feed = FeedState::new();
        feed.admit(&newest_first(1..=3));
        assert_eq!(feed.admit(&newest_first(4..=5)), 2);
        assert_eq!(feed_ids(&feed), vec![5, 4, 3, 2, 1]);
    }

    #[test]
    fn records_at_or_before_last_rendered_are_skipped() {
        let mut feed = FeedState::new();
        feed.admit(&newest_first(1..=3));

        // Same batch again, plus one equal to the last rendered timestamp.
        let mut batch = newest_first(1..=3);
        batch.insert(0, record(99, 3));
        assert_eq!(feed.admit(&batch), 0);
        assert_eq!(feed.len(), 3);
        assert_eq!(feed.last_rendered_at(), Some(at(3)));
    }

    #[test]
    fn feed_keeps_the_fifty_most_recent() {
        let mut feed = FeedState::new();
        feed.admit(&newest_first(1..=40));
        feed.admit(&newest_first(41..=65));

        assert_eq!(feed.len(), FEED_CAPACITY);
        let ids = feed_ids(&feed);
        assert_eq!(ids.first(), Some(&65));
        assert_eq!(ids.last(), Some(&16));
    }

    #[test]
    fn oversized_batch_is_truncated_to_capacity() {
        let mut feed = FeedState::new();
        assert_eq!(feed.admit(&newest_first(1..=100)), 100);
        assert_eq!(feed.len(), FEED_CAPACITY);
        assert_eq!(feed_ids(&feed)[0], 100);
        assert_eq!(feed.last_rendered_at(), Some(at(100)));
    }

    #[test]
    fn last_rendered_is_the_max_even_for_unsorted_batches() {
        let mut feed = FeedState::new();
        feed.admit(&[record(1, 10), record(2, 30), record(3, 20)]);
        assert_eq!(feed.last_rendered_at(), Some(at(30)));
        assert_eq!(feed_ids(&feed), vec![1, 2, 3]);
    }

    #[test]
    fn reset_clears_feed_and_watermark() {
        let mut feed = FeedState::new();
        feed.admit(&newest_first(1..=3));
        feed.reset();
        assert!(feed.is_empty());
        assert_eq!(feed.last_rendered_at(), None);
        assert_eq!(feed.admit(&newest_first(1..=3)), 3);
    }
}
