//! Audit events emitted by pipeline stages.
//!
//! RULE: Stages never write to the store themselves.
//! They return events; the engine appends them to the event log.

use crate::{
    month::Month,
    types::{RunId, Status, SubscriberId},
};
use serde::{Deserialize, Serialize};

/// Every event emitted during a run.
/// Variants are added as stages grow, never removed or reordered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PipelineEvent {
    // ── Engine events ──────────────────────────────
    RunInitialized {
        run_id:        RunId,
        records:       usize,
        booking_events: usize,
    },
    StageCompleted {
        stage: String,
        rows:  usize,
    },
    RunCompleted {
        run_id: RunId,
        rows:   usize,
    },

    // ── Dedup ──────────────────────────────────────
    DuplicateGroupCollapsed {
        subscriber_id: SubscriberId,
        month:         Month,
        rows:          usize,
    },
    UnknownStatusFlagged {
        subscriber_id: SubscriberId,
        month:         Month,
        value:         String,
    },

    // ── Gap fill ───────────────────────────────────
    GapMonthInserted {
        subscriber_id: SubscriberId,
        month:         Month,
    },

    // ── Status resolution ──────────────────────────
    StatusResolved {
        subscriber_id: SubscriberId,
        month:         Month,
        status:        Status,
        source:        ResolutionSource,
    },

    // ── Bookings and join ──────────────────────────
    BookingsAggregated {
        events:    usize,
        confirmed: usize,
        groups:    usize,
    },
    RowsJoined {
        rows:                    usize,
        rows_with_bookings:      usize,
        unmatched_booking_groups: usize,
    },
}

/// Where a flagged period's resolved status came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolutionSource {
    /// Latest valid period strictly before the month.
    PriorValid,
    /// Earliest valid period strictly after the month.
    NextValid,
    /// The subscriber has no valid period at all.
    Fallback,
}

/// A persisted event-log row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventLogEntry {
    pub id:         Option<i64>,
    pub run_id:     RunId,
    pub seq:        u64,
    pub stage:      String,
    pub event_type: String,
    pub payload:    String,
}

impl PipelineEvent {
    /// Stable string name for the event_type column in event_log.
    pub fn type_name(&self) -> &'static str {
        match self {
            PipelineEvent::RunInitialized { .. }          => "run_initialized",
            PipelineEvent::StageCompleted { .. }          => "stage_completed",
            PipelineEvent::RunCompleted { .. }            => "run_completed",
            PipelineEvent::DuplicateGroupCollapsed { .. } => "duplicate_group_collapsed",
            PipelineEvent::UnknownStatusFlagged { .. }    => "unknown_status_flagged",
            PipelineEvent::GapMonthInserted { .. }        => "gap_month_inserted",
            PipelineEvent::StatusResolved { .. }          => "status_resolved",
            PipelineEvent::BookingsAggregated { .. }      => "bookings_aggregated",
            PipelineEvent::RowsJoined { .. }              => "rows_joined",
        }
    }
}
