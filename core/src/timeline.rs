//! Per-subscriber grouped timeline.
//!
//! Built once by the gap-fill stage. Every later stage walks one
//! subscriber's sorted history at a time; nothing crosses subscriber
//! boundaries.

use crate::{record::SubscriptionPeriod, types::SubscriberId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Timeline {
    histories: BTreeMap<SubscriberId, Vec<SubscriptionPeriod>>,
}

impl Timeline {
    pub fn new() -> Self {
        Self::default()
    }

    /// Group periods by subscriber and sort each history by month.
    pub fn from_periods(periods: impl IntoIterator<Item = SubscriptionPeriod>) -> Self {
        let mut histories: BTreeMap<SubscriberId, Vec<SubscriptionPeriod>> = BTreeMap::new();
        for period in periods {
            histories
                .entry(period.subscriber_id.clone())
                .or_default()
                .push(period);
        }
        for history in histories.values_mut() {
            // Stable: equal months keep input order.
            history.sort_by_key(|p| p.month);
        }
        Self { histories }
    }

    pub fn insert_history(&mut self, subscriber_id: SubscriberId, history: Vec<SubscriptionPeriod>) {
        self.histories.insert(subscriber_id, history);
    }

    pub fn history(&self, subscriber_id: &SubscriberId) -> Option<&[SubscriptionPeriod]> {
        self.histories.get(subscriber_id).map(Vec::as_slice)
    }

    /// Histories in subscriber order.
    pub fn histories(&self) -> impl Iterator<Item = (&SubscriberId, &[SubscriptionPeriod])> {
        self.histories.iter().map(|(id, h)| (id, h.as_slice()))
    }

    pub fn histories_mut(&mut self) -> impl Iterator<Item = (&SubscriberId, &mut Vec<SubscriptionPeriod>)> {
        self.histories.iter_mut()
    }

    /// All rows ordered by (subscriber, month).
    pub fn rows(&self) -> impl Iterator<Item = &SubscriptionPeriod> {
        self.histories.values().flatten()
    }

    pub fn subscriber_count(&self) -> usize {
        self.histories.len()
    }

    pub fn row_count(&self) -> usize {
        self.histories.values().map(Vec::len).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.histories.is_empty()
    }
}
