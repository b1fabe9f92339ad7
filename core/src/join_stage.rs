//! Join stage: left-join enriched periods with monthly booking counts.

use crate::{
    error::PipelineResult,
    event::PipelineEvent,
    month::Month,
    record::{EnrichedPeriod, MonthlyBookingCount, OutputRow},
    stage::{BatchState, PipelineStage},
    types::SubscriberId,
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct JoinStats {
    pub rows:                     usize,
    pub rows_with_bookings:       usize,
    /// Booking groups whose (subscriber, month) is not on the timeline.
    pub unmatched_booking_groups: usize,
}

#[derive(Default)]
pub struct JoinStage {
    pub stats: JoinStats,
}

impl JoinStage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Fill `confirmed_bookings` on every period, zero where no count exists.
/// Periods are unique per (subscriber, month), so each count matches at
/// most one period.
pub fn join_bookings(enriched: &mut [EnrichedPeriod], counts: &[MonthlyBookingCount]) -> JoinStats {
    let lookup: HashMap<(SubscriberId, Month), u32> = counts
        .iter()
        .map(|c| ((c.subscriber_id.clone(), c.month), c.confirmed_bookings))
        .collect();

    let mut stats = JoinStats { rows: enriched.len(), ..JoinStats::default() };
    let mut matched = 0;

    for period in enriched.iter_mut() {
        let key = (period.subscriber_id.clone(), period.month);
        match lookup.get(&key) {
            Some(&n) => {
                period.confirmed_bookings = n;
                matched += 1;
                if n > 0 {
                    stats.rows_with_bookings += 1;
                }
            }
            None => period.confirmed_bookings = 0,
        }
    }

    stats.unmatched_booking_groups = lookup.len().saturating_sub(matched);
    stats
}

/// Final output rows ordered by (subscriber, month).
pub fn output_rows(enriched: &[EnrichedPeriod]) -> Vec<OutputRow> {
    let mut rows: Vec<OutputRow> = enriched.iter().cloned().map(OutputRow::from).collect();
    rows.sort_by(|a, b| a.sub_id.cmp(&b.sub_id).then(a.dates.cmp(&b.dates)));
    rows
}

impl PipelineStage for JoinStage {
    fn name(&self) -> &'static str { "join" }

    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>> {
        let stats = join_bookings(&mut state.enriched, &state.booking_counts);

        if stats.unmatched_booking_groups > 0 {
            log::warn!(
                "join: {} booking subscriber-months fall outside any timeline and were dropped",
                stats.unmatched_booking_groups,
            );
        }
        log::info!(
            "join: {} rows, {} with confirmed bookings",
            stats.rows,
            stats.rows_with_bookings,
        );

        state.output = output_rows(&state.enriched);
        let event = PipelineEvent::RowsJoined {
            rows:                     stats.rows,
            rows_with_bookings:       stats.rows_with_bookings,
            unmatched_booking_groups: stats.unmatched_booking_groups,
        };
        self.stats = stats;
        Ok(vec![event])
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
