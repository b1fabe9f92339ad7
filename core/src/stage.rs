//! Stage trait and shared batch state.
//!
//! RULE: Every pipeline step implements PipelineStage.
//! The engine calls run() on each registered stage once per batch,
//! in registration order. The order is fixed and documented in engine.rs.

use crate::{
    error::PipelineResult,
    event::PipelineEvent,
    record::{
        BookingEvent, EnrichedPeriod, MonthlyBookingCount, OutputRow, SubscriptionPeriod,
        SubscriptionRecord,
    },
    timeline::Timeline,
};
use std::any::Any;

/// Everything one batch run carries between stages.
/// Each stage reads its predecessor's field and fills its own.
#[derive(Debug, Clone, Default)]
pub struct BatchState {
    /// Raw subscription rows, in ingestion order.
    pub records:        Vec<SubscriptionRecord>,
    /// Raw booking rows, in ingestion order.
    pub bookings:       Vec<BookingEvent>,
    /// One row per (subscriber, month), after dedup.
    pub periods:        Vec<SubscriptionPeriod>,
    /// Contiguous per-subscriber timeline, after gap fill.
    pub timeline:       Timeline,
    pub enriched:       Vec<EnrichedPeriod>,
    pub booking_counts: Vec<MonthlyBookingCount>,
    pub output:         Vec<OutputRow>,
}

impl BatchState {
    pub fn new(records: Vec<SubscriptionRecord>, bookings: Vec<BookingEvent>) -> Self {
        Self {
            records,
            bookings,
            ..Self::default()
        }
    }
}

/// The contract every stage must fulfill.
pub trait PipelineStage: Send {
    /// Unique stable name for this stage.
    fn name(&self) -> &'static str;

    /// Called once per batch by the engine.
    ///
    /// Returns the audit events produced by this stage.
    fn run(&mut self, state: &mut BatchState) -> PipelineResult<Vec<PipelineEvent>>;

    /// For downcasting in tests and tooling only.
    fn as_any(&self) -> &dyn Any;
}
