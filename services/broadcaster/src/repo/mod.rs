pub mod events;

use chrono::{DateTime, Utc};
use sw_protocol::EventRecord;

#[derive(Debug, sqlx::FromRow)]
pub struct EventRow {
    pub id: i64,
    pub entity_id: String,
    pub checkpoint_id: String,
    pub occurred_at: DateTime<Utc>,
}

impl From<EventRow> for EventRecord {
    fn from(row: EventRow) -> Self {
        Self {
            id: row.id,
            entity_id: row.entity_id,
            checkpoint_id: row.checkpoint_id,
            occurred_at: row.occurred_at,
        }
    }
}
