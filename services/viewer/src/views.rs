//! Aggregate views recomputed from each full batch.

use std::collections::HashSet;
use sw_protocol::EventRecord;

/// Traffic light signal shown on a checkpoint tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Signal {
    Red,
    Yellow,
    Green,
}

impl Signal {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Yellow => "yellow",
            Self::Green => "green",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckpointTile {
    pub checkpoint_id: String,
    pub signal: Signal,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DashboardView {
    pub vehicle_count: usize,
    pub checkpoint_count: usize,
    /// Every record in the batch, in batch order.
    pub rows: Vec<EventRecord>,
    /// One tile per distinct checkpoint, in first-seen order.
    pub checkpoints: Vec<CheckpointTile>,
    /// Distinct vehicle ids, in first-seen order.
    pub vehicles: Vec<String>,
}

impl DashboardView {
    pub fn from_batch(batch: &[EventRecord]) -> Self {
        let vehicles = distinct(batch.iter().map(|e| e.entity_id.as_str()));
        // No signal state is carried by events; every light shows red.
        let checkpoints: Vec<CheckpointTile> =
            distinct(batch.iter().map(|e| e.checkpoint_id.as_str()))
                .into_iter()
                .map(|checkpoint_id| CheckpointTile {
                    checkpoint_id,
                    signal: Signal::Red,
                })
                .collect();

        Self {
            vehicle_count: vehicles.len(),
            checkpoint_count: checkpoints.len(),
            rows: batch.to_vec(),
            checkpoints,
            vehicles,
        }
    }
}

fn distinct<'a>(values: impl Iterator<Item = &'a str>) -> Vec<String> {
    let mut seen = HashSet::new();
    values
        .filter(|v| seen.insert(*v))
        .map(str::to_owned)
        .collect()
}
