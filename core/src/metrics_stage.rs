//! Metrics stage: derived per-period metrics on the resolved timeline.
//!
//! Calculators, in their fixed order:
//!   1. months since first subscription (tenure)
//!   2. active / canceled months to date
//!   3. months since last status change
//!
//! Each calculator exists as a pure query over one subscriber's history.
//! The stage itself computes all three in a single forward scan per
//! subscriber; the scan and the queries must always agree.

use crate::{
    error::{PipelineError, PipelineResult},
    event::PipelineEvent,
    month::Month,
    record::{EnrichedPeriod, SubscriptionPeriod},
    stage::{BatchState, PipelineStage},
    types::Status,
};

fn whole_months(later: Month, earlier: Month) -> u32 {
    later.months_since(earlier).max(0) as u32
}

/// Months from the earliest active period at or before `month` to `month`.
/// None if the subscriber was never active up to then.
pub fn months_since_first_subscription(history: &[SubscriptionPeriod], month: Month) -> Option<u32> {
    history
        .iter()
        .filter(|p| p.month <= month && p.status == Some(Status::Active))
        .map(|p| p.month)
        .min()
        .map(|first| whole_months(month, first))
}

/// (active, canceled) period counts with month <= `month`.
pub fn status_counts_to_date(history: &[SubscriptionPeriod], month: Month) -> (u32, u32) {
    history
        .iter()
        .filter(|p| p.month <= month)
        .fold((0, 0), |(active, canceled), p| match p.status {
            Some(Status::Active)   => (active + 1, canceled),
            Some(Status::Canceled) => (active, canceled + 1),
            None                   => (active, canceled),
        })
}

/// Months since the latest period before `month` whose status differs from
/// `status`. None if there was no such period.
pub fn months_since_status_change(
    history: &[SubscriptionPeriod],
    month: Month,
    status: Status,
) -> Option<u32> {
    history
        .iter()
        .filter(|p| p.month < month)
        .filter(|p| p.status.is_some_and(|s| s != status))
        .map(|p| p.month)
        .max()
        .map(|changed| whole_months(month, changed))
}

/// Enrich one subscriber's sorted, resolved history in a single pass.
pub fn enrich_history(history: &[SubscriptionPeriod]) -> PipelineResult<Vec<EnrichedPeriod>> {
    let mut first_active: Option<Month> = None;
    let mut last_active: Option<Month> = None;
    let mut last_canceled: Option<Month> = None;
    let (mut active, mut canceled) = (0u32, 0u32);
    let mut out = Vec::with_capacity(history.len());

    for period in history {
        let status = period.status.ok_or_else(|| PipelineError::UnresolvedStatus {
            subscriber_id: period.subscriber_id.to_string(),
            month:         period.month.to_string(),
        })?;

        // Tenure
        if status == Status::Active && first_active.is_none() {
            first_active = Some(period.month);
        }
        let tenure = first_active.map(|first| whole_months(period.month, first));

        // Counts to date, current row included
        match status {
            Status::Active   => active += 1,
            Status::Canceled => canceled += 1,
        }

        // Last change: latest earlier month holding the other status
        let other = match status {
            Status::Active   => last_canceled,
            Status::Canceled => last_active,
        };
        let since_change = other.map(|changed| whole_months(period.month, changed));

        match status {
            Status::Active   => last_active = Some(period.month),
            Status::Canceled => last_canceled = Some(period.month),
        }

        out.push(EnrichedPeriod {
            subscriber_id:                   period.subscriber_id.clone(),
            month:                           period.month,
            status,
            is_synthetic_or_duplicate:       period.is_synthetic_or_duplicate,
            months_since_first_subscription: tenure,
            active_months_to_date:           active,
            canceled_months_to_date:         canceled,
            months_since_status_change:      since_change,
            confirmed_bookings:              0,
        });
    }

    Ok(out)
}

#[derive(Default)]
pub struct MetricsStage;

impl MetricsStage {
    pub fn new() -> Self {
        Self
    }
}

impl PipelineStage for MetricsStage {
    fn name(&self) -> &'static str { "metrics" }

    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>> {
        let mut enriched = Vec::with_capacity(state.timeline.row_count());
        for (_, history) in state.timeline.histories() {
            enriched.extend(enrich_history(history)?);
        }

        let never_active = enriched
            .iter()
            .filter(|p| p.months_since_first_subscription.is_none())
            .count();
        log::info!(
            "metrics: {} periods enriched ({never_active} before any active month)",
            enriched.len(),
        );

        state.enriched = enriched;
        Ok(Vec::new())
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
