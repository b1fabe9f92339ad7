//! Dedup stage: raw subscription rows to one period per (subscriber, month).
//!
//! Every row that takes part in a (subscriber, month) collision is flagged,
//! including the first one seen. The first-seen row of each group is the
//! one retained; its status does not matter because the status resolver
//! overwrites every flagged row.
//!
//! Status text is parsed here. Unrecognised values are either flagged for
//! resolution or rejected, per `UnknownStatusPolicy`.

use crate::{
    config::UnknownStatusPolicy,
    error::{PipelineError, PipelineResult},
    event::PipelineEvent,
    month::Month,
    record::{SubscriptionPeriod, SubscriptionRecord},
    stage::{BatchState, PipelineStage},
    types::{Status, SubscriberId},
};
use std::collections::HashMap;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DedupStats {
    pub input_rows:       usize,
    pub output_rows:      usize,
    pub duplicate_groups: usize,
    pub unknown_statuses: usize,
}

pub struct DedupStage {
    policy:    UnknownStatusPolicy,
    pub stats: DedupStats,
}

impl DedupStage {
    pub fn new(policy: UnknownStatusPolicy) -> Self {
        Self { policy, stats: DedupStats::default() }
    }
}

/// Collapse raw rows to one period per (subscriber, month), in first-seen
/// order. Events come out ordered by (subscriber, month), unknown statuses
/// first, so input row order never changes them.
pub fn deduplicate(
    records: &[SubscriptionRecord],
    policy: UnknownStatusPolicy,
) -> PipelineResult<(Vec<SubscriptionPeriod>, Vec<PipelineEvent>)> {
    let mut periods: Vec<SubscriptionPeriod> = Vec::with_capacity(records.len());
    let mut group_sizes: Vec<usize> = Vec::with_capacity(records.len());
    let mut index: HashMap<(SubscriberId, Month), usize> = HashMap::with_capacity(records.len());
    let mut unknown: Vec<(SubscriberId, Month, String)> = Vec::new();

    for record in records {
        let month = Month::from_date(record.date);
        let status = Status::parse(&record.status);

        if status.is_none() {
            if policy == UnknownStatusPolicy::Reject {
                return Err(PipelineError::UnknownStatus {
                    subscriber_id: record.subscriber_id.to_string(),
                    month:         month.to_string(),
                    value:         record.status.clone(),
                });
            }
            log::warn!(
                "dedup: unknown status '{}' for {} in {month}; resolving from neighbours",
                record.status,
                record.subscriber_id,
            );
            unknown.push((record.subscriber_id.clone(), month, record.status.clone()));
        }

        let key = (record.subscriber_id.clone(), month);
        match index.get(&key) {
            Some(&i) => {
                periods[i].is_synthetic_or_duplicate = true;
                group_sizes[i] += 1;
            }
            None => {
                index.insert(key, periods.len());
                periods.push(SubscriptionPeriod {
                    subscriber_id: record.subscriber_id.clone(),
                    month,
                    status,
                    is_synthetic_or_duplicate: status.is_none(),
                });
                group_sizes.push(1);
            }
        }
    }

    unknown.sort();
    let mut groups: Vec<(&SubscriptionPeriod, usize)> = periods
        .iter()
        .zip(group_sizes)
        .filter(|(_, rows)| *rows > 1)
        .collect();
    groups.sort_by(|(a, _), (b, _)| a.subscriber_id.cmp(&b.subscriber_id).then(a.month.cmp(&b.month)));

    let mut events: Vec<PipelineEvent> = unknown
        .into_iter()
        .map(|(subscriber_id, month, value)| PipelineEvent::UnknownStatusFlagged {
            subscriber_id,
            month,
            value,
        })
        .collect();
    events.extend(groups.into_iter().map(|(period, rows)| PipelineEvent::DuplicateGroupCollapsed {
        subscriber_id: period.subscriber_id.clone(),
        month:         period.month,
        rows,
    }));

    Ok((periods, events))
}

impl PipelineStage for DedupStage {
    fn name(&self) -> &'static str { "dedup" }

    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>> {
        let (periods, events) = deduplicate(&state.records, self.policy)?;

        self.stats = DedupStats {
            input_rows:       state.records.len(),
            output_rows:      periods.len(),
            duplicate_groups: events
                .iter()
                .filter(|e| matches!(e, PipelineEvent::DuplicateGroupCollapsed { .. }))
                .count(),
            unknown_statuses: events
                .iter()
                .filter(|e| matches!(e, PipelineEvent::UnknownStatusFlagged { .. }))
                .count(),
        };
        log::info!(
            "dedup: {} rows -> {} periods ({} duplicate groups, {} unknown statuses)",
            self.stats.input_rows,
            self.stats.output_rows,
            self.stats.duplicate_groups,
            self.stats.unknown_statuses,
        );

        state.periods = periods;
        Ok(events)
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
