//! The pipeline engine: one batch run from raw rows to enriched timeline.
//!
//! EXECUTION ORDER (fixed, documented, never reordered):
//!   1. Dedup               one period per (subscriber, month)
//!   2. Gap fill            contiguous monthly grid per subscriber
//!   3. Status resolution   definite status for flagged periods
//!   4. Metrics             tenure, counts to date, months since change
//!   5. Bookings            confirmed bookings per subscriber-month
//!   6. Join                left join, zero fill, final ordering
//!
//! RULES:
//!   - Each stage consumes the complete output of the one before it.
//!   - No stage calls another stage's functions directly.
//!   - Stages never touch the store; the engine logs their events.
//!   - Any stage error aborts the run before output is persisted.

use crate::{
    booking_stage::BookingStage,
    checkpoint::StageCheckpoint,
    config::PipelineConfig,
    dedup_stage::DedupStage,
    error::{PipelineError, PipelineResult},
    event::{EventLogEntry, PipelineEvent},
    gap_fill_stage::GapFillStage,
    join_stage::JoinStage,
    metrics_stage::MetricsStage,
    record::{BookingEvent, OutputRow, SubscriptionRecord},
    stage::{BatchState, PipelineStage},
    status_resolution_stage::StatusResolutionStage,
    store::RecordStore,
    types::RunId,
};

/// The stages of a run, in execution order.
pub fn default_stages(config: &PipelineConfig) -> Vec<Box<dyn PipelineStage>> {
    vec![
        Box::new(DedupStage::new(config.unknown_status_policy)),
        Box::new(GapFillStage::new()),
        Box::new(StatusResolutionStage::new()),
        Box::new(MetricsStage::new()),
        Box::new(BookingStage::new(config.confirmed_booking_status.clone())),
        Box::new(JoinStage::new()),
    ]
}

/// Run the full stage sequence over in-memory rows, without a store.
pub fn reconcile(
    records: Vec<SubscriptionRecord>,
    bookings: Vec<BookingEvent>,
    config: &PipelineConfig,
) -> PipelineResult<Vec<OutputRow>> {
    let mut state = BatchState::new(records, bookings);
    for mut stage in default_stages(config) {
        stage.run(&mut state)?;
    }
    Ok(state.output)
}

/// Rows carried forward after a stage, for the stage_completed event.
fn carried_rows(state: &BatchState) -> usize {
    if !state.output.is_empty() {
        state.output.len()
    } else if !state.enriched.is_empty() {
        state.enriched.len()
    } else if !state.timeline.is_empty() {
        state.timeline.row_count()
    } else {
        state.periods.len()
    }
}

fn append_event(
    store: &RecordStore,
    run_id: &str,
    seq: &mut u64,
    stage: &str,
    event: &PipelineEvent,
) -> PipelineResult<()> {
    let entry = EventLogEntry {
        id:         None,
        run_id:     run_id.to_string(),
        seq:        *seq,
        stage:      stage.to_string(),
        event_type: event.type_name().to_string(),
        payload:    serde_json::to_string(event)?,
    };
    store.append_event(&entry)?;
    *seq += 1;
    Ok(())
}

pub struct PipelineEngine {
    pub run_id: RunId,
    pub config: PipelineConfig,
    pub store:  RecordStore,
    stages:     Vec<Box<dyn PipelineStage>>,
    event_seq:  u64,
}

impl PipelineEngine {
    pub fn new(run_id: RunId, config: PipelineConfig, store: RecordStore) -> Self {
        Self {
            run_id,
            config,
            store,
            stages: Vec::new(),
            event_seq: 0,
        }
    }

    /// Build a fully wired engine with all stages registered.
    /// Call this instead of new() + manual register() calls.
    pub fn build(run_id: RunId, config: PipelineConfig, store: RecordStore) -> Self {
        let stages = default_stages(&config);
        let mut engine = PipelineEngine::new(run_id, config, store);
        for stage in stages {
            engine.register(stage);
        }
        engine
    }

    /// In-memory store, migrated, with the run and its input rows inserted.
    /// Uses `PipelineConfig::default_test()`.
    pub fn build_test(
        run_id: RunId,
        records: &[SubscriptionRecord],
        bookings: &[BookingEvent],
    ) -> PipelineResult<Self> {
        Self::build_test_with(run_id, PipelineConfig::default_test(), records, bookings)
    }

    pub fn build_test_with(
        run_id: RunId,
        config: PipelineConfig,
        records: &[SubscriptionRecord],
        bookings: &[BookingEvent],
    ) -> PipelineResult<Self> {
        let store = RecordStore::in_memory()?;
        store.migrate()?;
        store.insert_run(&run_id, "test")?;
        store.insert_subscription_records(&run_id, records)?;
        store.insert_booking_events(&run_id, bookings)?;
        Ok(Self::build(run_id, config, store))
    }

    /// Register a stage. Call in the documented execution order.
    pub fn register(&mut self, stage: Box<dyn PipelineStage>) {
        self.stages.push(stage);
    }

    pub fn stage_names(&self) -> Vec<&'static str> {
        self.stages.iter().map(|s| s.name()).collect()
    }

    /// Borrow a registered stage by concrete type.
    /// Used by the runner to print per-stage summaries.
    pub fn stage<T: 'static>(&self) -> Option<&T> {
        self.stages
            .iter()
            .find_map(|s| s.as_any().downcast_ref::<T>())
    }

    /// Run every stage over the rows stored for this run, log their events,
    /// persist the output and return it.
    pub fn run(&mut self) -> PipelineResult<Vec<OutputRow>> {
        if !self.store.run_exists(&self.run_id)? {
            return Err(PipelineError::RunNotInitialized);
        }

        let records = self.store.subscription_records(&self.run_id)?;
        let bookings = self.store.booking_events(&self.run_id)?;
        log::info!(
            "run {}: {} subscription rows, {} booking events",
            self.run_id,
            records.len(),
            bookings.len(),
        );

        let init = PipelineEvent::RunInitialized {
            run_id:         self.run_id.clone(),
            records:        records.len(),
            booking_events: bookings.len(),
        };
        append_event(&self.store, &self.run_id, &mut self.event_seq, "engine", &init)?;

        let mut state = BatchState::new(records, bookings);

        // Execute each stage in registration order.
        for (position, stage) in self.stages.iter_mut().enumerate() {
            let events = stage.run(&mut state)?;

            for event in &events {
                append_event(&self.store, &self.run_id, &mut self.event_seq, stage.name(), event)?;
            }
            let done = PipelineEvent::StageCompleted {
                stage: stage.name().to_string(),
                rows:  carried_rows(&state),
            };
            append_event(&self.store, &self.run_id, &mut self.event_seq, stage.name(), &done)?;

            if self.config.checkpoint_stages {
                let checkpoint = StageCheckpoint::capture(&self.run_id, position, stage.name(), &state);
                self.store.save_checkpoint(&checkpoint)?;
                log::debug!("checkpoint saved after stage {}", stage.name());
            }
        }

        self.store.save_output_rows(&self.run_id, &state.output)?;
        let done = PipelineEvent::RunCompleted {
            run_id: self.run_id.clone(),
            rows:   state.output.len(),
        };
        append_event(&self.store, &self.run_id, &mut self.event_seq, "engine", &done)?;
        self.store.finish_run(&self.run_id)?;

        log::info!("run {} complete: {} output rows", self.run_id, state.output.len());
        Ok(state.output)
    }

    /// Stored checkpoint for a registered stage, if one was taken.
    pub fn checkpoint(&self, stage_name: &str) -> PipelineResult<Option<StageCheckpoint>> {
        if !self.stages.iter().any(|s| s.name() == stage_name) {
            return Err(PipelineError::StageNotFound { name: stage_name.to_string() });
        }
        self.store.checkpoint_for_stage(&self.run_id, stage_name)
    }

    /// Logged events for this run, in order.
    pub fn events(&self) -> PipelineResult<Vec<EventLogEntry>> {
        self.store.events_for_run(&self.run_id)
    }
}
