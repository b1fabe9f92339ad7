//! Subscription timeline reconciliation.
//!
//! Turns an irregular monthly subscription-status feed (duplicates, gaps,
//! garbled statuses) into one complete, de-duplicated timeline per
//! subscriber, enriched with tenure and booking metrics.
//! See engine.rs for the stage order.

pub mod booking_stage;
pub mod checkpoint;
pub mod config;
pub mod dedup_stage;
pub mod engine;
pub mod error;
pub mod event;
pub mod export;
pub mod gap_fill_stage;
pub mod ingest;
pub mod join_stage;
pub mod metrics_stage;
pub mod month;
pub mod record;
pub mod rng;
pub mod stage;
pub mod status_resolution_stage;
pub mod store;
pub mod synthetic;
pub mod timeline;
pub mod types;
