//! Booking stage: confirmed bookings per (subscriber, month).
//!
//! Groups with no confirmed booking produce no row; the join stage
//! reads absence as zero.

use crate::{
    error::PipelineResult,
    event::PipelineEvent,
    month::Month,
    record::{BookingEvent, MonthlyBookingCount},
    stage::{BatchState, PipelineStage},
    types::SubscriberId,
};
use std::collections::BTreeMap;

pub struct BookingStage {
    confirmed_status: String,
}

impl BookingStage {
    pub fn new(confirmed_status: impl Into<String>) -> Self {
        Self { confirmed_status: confirmed_status.into() }
    }
}

/// Count bookings whose status equals `confirmed_status` per subscriber and
/// calendar month. Output is ordered by (subscriber, month).
pub fn aggregate_bookings(bookings: &[BookingEvent], confirmed_status: &str) -> Vec<MonthlyBookingCount> {
    let mut counts: BTreeMap<(SubscriberId, Month), u32> = BTreeMap::new();
    for booking in bookings.iter().filter(|b| b.booking_status == confirmed_status) {
        let month = Month::from_date(booking.booked_on);
        *counts.entry((booking.subscriber_id.clone(), month)).or_insert(0) += 1;
    }

    counts
        .into_iter()
        .map(|((subscriber_id, month), confirmed_bookings)| MonthlyBookingCount {
            subscriber_id,
            month,
            confirmed_bookings,
        })
        .collect()
}

impl PipelineStage for BookingStage {
    fn name(&self) -> &'static str { "bookings" }

    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>> {
        let counts = aggregate_bookings(&state.bookings, &self.confirmed_status);
        let confirmed: usize = counts.iter().map(|c| c.confirmed_bookings as usize).sum();

        log::info!(
            "bookings: {} events, {confirmed} '{}', {} subscriber-months",
            state.bookings.len(),
            self.confirmed_status,
            counts.len(),
        );

        let event = PipelineEvent::BookingsAggregated {
            events: state.bookings.len(),
            confirmed,
            groups: counts.len(),
        };
        state.booking_counts = counts;
        Ok(vec![event])
    }

    fn as_any(&self) -> &dyn std::any::Any { self }
}
