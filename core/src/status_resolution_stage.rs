//! Status resolution stage: give every flagged period a definite status.
//!
//! For a flagged period at month m:
//!   1. the latest valid period before m, else
//!   2. the earliest valid period after m, else
//!   3. canceled.
//!
//! Only periods that were valid on entry are ever a source. A status
//! resolved here never feeds another resolution, so the result does not
//! depend on the order flagged rows are visited.

use crate::{
    error::PipelineResult,
    event::{PipelineEvent, ResolutionSource},
    month::Month,
    record::SubscriptionPeriod,
    stage::{BatchState, PipelineStage},
    types::Status,
};

/// Status assigned when a subscriber has no valid period at all.
pub const FALLBACK_STATUS: Status = Status::Canceled;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolutionStats {
    pub from_prior:    usize,
    pub from_next:     usize,
    pub from_fallback: usize,
}

impl ResolutionStats {
    pub fn total(&self) -> usize {
        self.from_prior + self.from_next + self.from_fallback
    }

    fn record(&mut self, source: ResolutionSource) {
        match source {
            ResolutionSource::PriorValid => self.from_prior += 1,
            ResolutionSource::NextValid  => self.from_next += 1,
            ResolutionSource::Fallback   => self.from_fallback += 1,
        }
    }
}

#[derive(Default)]
pub struct StatusResolutionStage {
    pub stats: ResolutionStats,
}

impl StatusResolutionStage {
    pub fn new() -> Self {
        Self::default()
    }
}

fn valid_status(period: &SubscriptionPeriod) -> Option<Status> {
    if period.is_valid() { period.status } else { None }
}

/// Resolve the status a flagged period at `month` would receive, looking
/// only at the valid periods of `history`.
pub fn resolve_status(history: &[SubscriptionPeriod], month: Month) -> (Status, ResolutionSource) {
    let prior = history
        .iter()
        .filter(|p| p.month < month)
        .filter_map(|p| valid_status(p).map(|s| (p.month, s)))
        .max_by_key(|(m, _)| *m);
    if let Some((_, status)) = prior {
        return (status, ResolutionSource::PriorValid);
    }

    let next = history
        .iter()
        .filter(|p| p.month > month)
        .filter_map(|p| valid_status(p).map(|s| (p.month, s)))
        .min_by_key(|(m, _)| *m);
    match next {
        Some((_, status)) => (status, ResolutionSource::NextValid),
        None => (FALLBACK_STATUS, ResolutionSource::Fallback),
    }
}

/// Resolve every flagged period of one subscriber's sorted history in place.
/// One forward scan finds the nearest prior valid status, one backward scan
/// the nearest next valid status.
pub fn resolve_history(
    history: &mut [SubscriptionPeriod],
    stats: &mut ResolutionStats,
    events: &mut Vec<PipelineEvent>,
) {
    let mut prior: Vec<Option<Status>> = Vec::with_capacity(history.len());
    let mut last = None;
    for period in history.iter() {
        prior.push(last);
        if let Some(s) = valid_status(period) {
            last = Some(s);
        }
    }

    let mut next: Vec<Option<Status>> = vec![None; history.len()];
    let mut following = None;
    for (i, period) in history.iter().enumerate().rev() {
        next[i] = following;
        if let Some(s) = valid_status(period) {
            following = Some(s);
        }
    }

    for (i, period) in history.iter_mut().enumerate() {
        if period.is_valid() {
            continue;
        }
        let (status, source) = match (prior[i], next[i]) {
            (Some(s), _)    => (s, ResolutionSource::PriorValid),
            (None, Some(s)) => (s, ResolutionSource::NextValid),
            (None, None)    => (FALLBACK_STATUS, ResolutionSource::Fallback),
        };
        period.status = Some(status);
        stats.record(source);

        log::debug!(
            "resolve: {} {} -> {status} ({source:?})",
            period.subscriber_id,
            period.month,
        );
        events.push(PipelineEvent::StatusResolved {
            subscriber_id: period.subscriber_id.clone(),
            month:         period.month,
            status,
            source,
        });
    }
}

impl PipelineStage for StatusResolutionStage {
    fn name(&self) -> &'static str { "status_resolution" }

    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>> {
        let mut stats = ResolutionStats::default();
        let mut events = Vec::new();

        for (_, history) in state.timeline.histories_mut() {
            resolve_history(history, &mut stats, &mut events);
        }

        log::info!(
            "status_resolution: {} resolved ({} prior, {} next, {} fallback)",
            stats.total(),
            stats.from_prior,
            stats.from_next,
            stats.from_fallback,
        );
        self.stats = stats;
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
