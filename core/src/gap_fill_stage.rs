//! Gap-fill stage: expand each subscriber to a contiguous monthly grid.
//!
//! For every subscriber the grid runs from its earliest to its latest
//! observed month, inclusive. Observed months keep their row and flag;
//! missing months get a synthetic placeholder with no status.

use crate::{
    error::PipelineResult,
    event::PipelineEvent,
    month::Month,
    record::SubscriptionPeriod,
    stage::{BatchState, PipelineStage},
    timeline::Timeline,
    types::SubscriberId,
};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GapFillStats {
    pub subscribers:     usize,
    pub observed_months: usize,
    pub inserted_months: usize,
}

#[derive(Default)]
pub struct GapFillStage {
    pub stats: GapFillStats,
}

impl GapFillStage {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Expand one subscriber's sorted, de-duplicated history to a full grid.
/// Pushes a `GapMonthInserted` event for every placeholder.
fn fill_history(
    subscriber_id: &SubscriberId,
    history: Vec<SubscriptionPeriod>,
    events: &mut Vec<PipelineEvent>,
) -> Vec<SubscriptionPeriod> {
    let (Some(first), Some(last)) = (history.first(), history.last()) else {
        return history;
    };
    let (min_month, max_month) = (first.month, last.month);

    let mut observed = history.into_iter().peekable();
    let mut filled = Vec::new();
    for month in Month::range_inclusive(min_month, max_month) {
        match observed.next_if(|p| p.month == month) {
            Some(period) => filled.push(period),
            None => {
                events.push(PipelineEvent::GapMonthInserted {
                    subscriber_id: subscriber_id.clone(),
                    month,
                });
                filled.push(SubscriptionPeriod {
                    subscriber_id: subscriber_id.clone(),
                    month,
                    status: None,
                    is_synthetic_or_duplicate: true,
                });
            }
        }
    }
    filled
}

/// Build the contiguous per-subscriber timeline from de-duplicated periods.
pub fn fill_gaps(periods: &[SubscriptionPeriod]) -> (Timeline, Vec<PipelineEvent>) {
    let grouped = Timeline::from_periods(periods.iter().cloned());
    let mut events = Vec::new();
    let mut timeline = Timeline::new();

    for (subscriber_id, history) in grouped.histories() {
        let filled = fill_history(subscriber_id, history.to_vec(), &mut events);
        timeline.insert_history(subscriber_id.clone(), filled);
    }

    (timeline, events)
}

impl PipelineStage for GapFillStage {
    fn name(&self) -> &'static str { "gap_fill" }

    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>> {
        let (timeline, events) = fill_gaps(&state.periods);

        self.stats = GapFillStats {
            subscribers:     timeline.subscriber_count(),
            observed_months: state.periods.len(),
            inserted_months: events.len(),
        };
        log::info!(
            "gap_fill: {} subscribers, {} observed months, {} inserted",
            self.stats.subscribers,
            self.stats.observed_months,
            self.stats.inserted_months,
        );

        state.timeline = timeline;
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
