//! Stage checkpoints: the batch rows serialized to JSON after a stage.
//!
//! Taken after every stage when `checkpoint_stages` is on. A checkpoint
//! holds whichever row set is the most advanced at that point: dedup
//! periods, then the timeline, then enriched periods.

use crate::{
    record::{EnrichedPeriod, SubscriptionPeriod},
    stage::BatchState,
    types::RunId,
};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "rows", rename_all = "snake_case")]
pub enum CheckpointRows {
    Periods(Vec<SubscriptionPeriod>),
    Timeline(Vec<SubscriptionPeriod>),
    Enriched(Vec<EnrichedPeriod>),
}

impl CheckpointRows {
    pub fn len(&self) -> usize {
        match self {
            CheckpointRows::Periods(rows) | CheckpointRows::Timeline(rows) => rows.len(),
            CheckpointRows::Enriched(rows) => rows.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StageCheckpoint {
    pub run_id:   RunId,
    /// Zero-based registration position of the stage.
    pub position: usize,
    pub stage:    String,
    pub rows:     CheckpointRows,
}

impl StageCheckpoint {
    pub fn capture(run_id: &str, position: usize, stage: &str, state: &BatchState) -> Self {
        let rows = if !state.enriched.is_empty() {
            CheckpointRows::Enriched(state.enriched.clone())
        } else if !state.timeline.is_empty() {
            CheckpointRows::Timeline(state.timeline.rows().cloned().collect())
        } else {
            CheckpointRows::Periods(state.periods.clone())
        };
        Self {
            run_id: run_id.to_string(),
            position,
            stage: stage.to_string(),
            rows,
        }
    }
}
