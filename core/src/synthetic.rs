//! Deterministic synthetic input: irregular subscription histories and
//! booking events with duplicates, gaps and garbled statuses.
//!
//! Same config and seed always produce identical rows.

use crate::{
    config::SyntheticConfig,
    error::{PipelineError, PipelineResult},
    month::{parse_date, Month},
    record::{BookingEvent, SubscriptionRecord},
    rng::{RngBank, StreamRng, StreamSlot},
    types::{Status, SubscriberId},
};

/// Status text emitted in place of a real status.
const GARBLED_STATUSES: &[&str] = &["actve", "cancelled", "paused", ""];

/// Non-confirmed booking statuses.
const OTHER_BOOKING_STATUSES: &[&str] = &["Cancelled", "Pending", "Rejected"];

#[derive(Debug, Clone, Default)]
pub struct SyntheticBatch {
    pub records:  Vec<SubscriptionRecord>,
    pub bookings: Vec<BookingEvent>,
}

fn flip(status: Status) -> Status {
    match status {
        Status::Active   => Status::Canceled,
        Status::Canceled => Status::Active,
    }
}

fn pick<'a>(rng: &mut StreamRng, items: &[&'a str]) -> &'a str {
    items[rng.next_u64_below(items.len() as u64) as usize]
}

fn day_in(rng: &mut StreamRng, month: Month) -> chrono::NaiveDate {
    let day = rng.between(1, 28) as u64;
    month.first_day() + chrono::Days::new(day - 1)
}

pub fn generate(config: &SyntheticConfig, seed: u64) -> PipelineResult<SyntheticBatch> {
    config.validate()?;
    let earliest = parse_date(&config.earliest_start)
        .map(Month::from_date)
        .ok_or_else(|| {
            PipelineError::Other(anyhow::anyhow!(
                "synthetic.earliest_start '{}' is not a date",
                config.earliest_start
            ))
        })?;

    let bank = RngBank::new(seed);
    let mut subs_rng = bank.for_stream(StreamSlot::Subscriptions);
    let mut booking_rng = bank.for_stream(StreamSlot::Bookings);
    let mut batch = SyntheticBatch::default();

    for i in 0..config.subscribers {
        let subscriber_id = SubscriberId::new((1000 + i).to_string());
        let offset = subs_rng.between(0, config.start_spread_months);
        let length = subs_rng.between(config.min_history_months, config.max_history_months);
        let mut status = if subs_rng.chance(0.8) { Status::Active } else { Status::Canceled };

        for k in 0..length {
            let Some(month) = offset.checked_add(k).and_then(|n| earliest.add_months(n)) else { break };
            if k > 0 && subs_rng.chance(config.status_flip_rate) {
                status = flip(status);
            }

            // Bookings follow the subscriber even through unreported months.
            for _ in 0..booking_rng.between(0, config.max_bookings_per_month) {
                let booking_status = if booking_rng.chance(config.confirmed_share) {
                    "Confirmed"
                } else {
                    pick(&mut booking_rng, OTHER_BOOKING_STATUSES)
                };
                batch.bookings.push(BookingEvent {
                    subscriber_id:  subscriber_id.clone(),
                    booked_on:      day_in(&mut booking_rng, month),
                    booking_status: booking_status.to_string(),
                });
            }

            let interior = k > 0 && k + 1 < length;
            if interior && subs_rng.chance(config.gap_rate) {
                continue;
            }

            let status_text = if subs_rng.chance(config.unknown_status_rate) {
                pick(&mut subs_rng, GARBLED_STATUSES)
            } else {
                status.as_str()
            };
            batch.records.push(SubscriptionRecord {
                subscriber_id: subscriber_id.clone(),
                status:        status_text.to_string(),
                date:          day_in(&mut subs_rng, month),
            });

            if subs_rng.chance(config.duplicate_rate) {
                batch.records.push(SubscriptionRecord {
                    subscriber_id: subscriber_id.clone(),
                    status:        flip(status).as_str().to_string(),
                    date:          day_in(&mut subs_rng, month),
                });
            }
        }
    }

    log::debug!(
        "synthetic: seed={seed} {} subscription rows, {} booking events",
        batch.records.len(),
        batch.bookings.len(),
    );
    Ok(batch)
}
