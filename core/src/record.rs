//! Row types flowing through the pipeline, from raw input to output.

use crate::{
    month::Month,
    types::{Status, SubscriberId},
};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One raw row of the subscriptions source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionRecord {
    pub subscriber_id: SubscriberId,
    /// Free text as read; parsed by the dedup stage.
    pub status:        String,
    pub date:          NaiveDate,
}

impl SubscriptionRecord {
    pub fn new(subscriber_id: &str, status: &str, date: NaiveDate) -> Self {
        Self {
            subscriber_id: SubscriberId::new(subscriber_id),
            status:        status.to_string(),
            date,
        }
    }
}

/// One raw row of the bookings source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookingEvent {
    pub subscriber_id:  SubscriberId,
    pub booked_on:      NaiveDate,
    pub booking_status: String,
}

impl BookingEvent {
    pub fn new(subscriber_id: &str, booked_on: NaiveDate, booking_status: &str) -> Self {
        Self {
            subscriber_id:  SubscriberId::new(subscriber_id),
            booked_on,
            booking_status: booking_status.to_string(),
        }
    }
}

/// A subscriber-month on the timeline.
///
/// `status` is None for gap-filled placeholders and unrecognised input
/// statuses until the status resolver runs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubscriptionPeriod {
    pub subscriber_id:            SubscriberId,
    pub month:                    Month,
    pub status:                   Option<Status>,
    pub is_synthetic_or_duplicate: bool,
}

impl SubscriptionPeriod {
    /// A valid period is neither a duplicate nor synthetic.
    pub fn is_valid(&self) -> bool {
        !self.is_synthetic_or_duplicate
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonthlyBookingCount {
    pub subscriber_id:      SubscriberId,
    pub month:              Month,
    pub confirmed_bookings: u32,
}

/// A resolved period with its derived metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichedPeriod {
    pub subscriber_id:                   SubscriberId,
    pub month:                           Month,
    pub status:                          Status,
    pub is_synthetic_or_duplicate:       bool,
    pub months_since_first_subscription: Option<u32>,
    pub active_months_to_date:           u32,
    pub canceled_months_to_date:         u32,
    pub months_since_status_change:      Option<u32>,
    pub confirmed_bookings:              u32,
}

/// Final output row. Same as `EnrichedPeriod` minus the bookkeeping flag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutputRow {
    pub sub_id:                          SubscriberId,
    pub status:                          Status,
    pub dates:                           Month,
    pub months_since_first_subscription: Option<u32>,
    pub active_months:                   u32,
    pub canceled_months:                 u32,
    pub months_since_status_change:      Option<u32>,
    pub confirmed_bookings:              u32,
}

impl From<EnrichedPeriod> for OutputRow {
    fn from(p: EnrichedPeriod) -> Self {
        Self {
            sub_id:                          p.subscriber_id,
            status:                          p.status,
            dates:                           p.month,
            months_since_first_subscription: p.months_since_first_subscription,
            active_months:                   p.active_months_to_date,
            canceled_months:                 p.canceled_months_to_date,
            months_since_status_change:      p.months_since_status_change,
            confirmed_bookings:              p.confirmed_bookings,
        }
    }
}

impl OutputRow {
    /// Feed an output row back in as a raw subscription record.
    pub fn to_record(&self) -> SubscriptionRecord {
        SubscriptionRecord {
            subscriber_id: self.sub_id.clone(),
            status:        self.status.as_str().to_string(),
            date:          self.dates.first_day(),
        }
    }
}
