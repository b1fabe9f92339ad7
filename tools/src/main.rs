//! timeline-runner: headless batch runner for subscription timeline reconciliation.
//!
//! Usage:
//!   timeline-runner --subscriptions Subscription.csv --bookings Bookings.csv --out results.csv
//!   timeline-runner --synthetic 200 --seed 7 --db run.db --summary-json

use anyhow::{bail, Result};
use std::env;
use std::path::Path;
use subtimeline_core::{
    config::PipelineConfig,
    dedup_stage::DedupStage,
    engine::PipelineEngine,
    export,
    gap_fill_stage::GapFillStage,
    ingest,
    join_stage::JoinStage,
    record::{BookingEvent, OutputRow, SubscriptionRecord},
    status_resolution_stage::StatusResolutionStage,
    store::RecordStore,
    synthetic,
    types::new_run_id,
};

#[derive(serde::Serialize)]
struct RunSummary {
    run_id:               String,
    started_at:           String,
    subscription_rows:    usize,
    booking_events:       usize,
    subscribers:          usize,
    output_rows:          usize,
    duplicate_groups:     usize,
    unknown_statuses:     usize,
    gap_months:           usize,
    resolved_from_prior:  usize,
    resolved_from_next:   usize,
    resolved_by_fallback: usize,
    confirmed_bookings:   u64,
    unmatched_booking_groups: usize,
}

fn main() -> Result<()> {
    env_logger::init();

    let args: Vec<String> = env::args().collect();
    let subscriptions = string_arg(&args, "--subscriptions");
    let bookings = string_arg(&args, "--bookings");
    let synthetic_count = string_arg(&args, "--synthetic").and_then(|v| v.parse::<usize>().ok());
    let seed = parse_arg(&args, "--seed", 42u64);
    let out = string_arg(&args, "--out").unwrap_or("subscription_timeline.csv");
    let db = string_arg(&args, "--db").unwrap_or(":memory:");
    let summary_json = args.iter().any(|a| a == "--summary-json");

    let mut config = match string_arg(&args, "--config") {
        Some(path) => PipelineConfig::load(path)?,
        None => PipelineConfig::default(),
    };
    log::info!(
        "config: unknown_status_policy={:?} confirmed_booking_status={} checkpoints={}",
        config.unknown_status_policy,
        config.confirmed_booking_status,
        config.checkpoint_stages,
    );

    let (records, booking_events) = match (subscriptions, bookings, synthetic_count) {
        (Some(s), Some(b), None) => (
            ingest::read_subscriptions(Path::new(s))?,
            ingest::read_bookings(Path::new(b))?,
        ),
        (None, None, Some(n)) => {
            config.synthetic.subscribers = n;
            let batch = synthetic::generate(&config.synthetic, seed)?;
            (batch.records, batch.bookings)
        }
        _ => bail!(
            "usage: timeline-runner (--subscriptions PATH --bookings PATH | --synthetic N [--seed S]) \
             [--out PATH] [--db PATH] [--config PATH] [--summary-json]"
        ),
    };

    let started_at = chrono::Utc::now().to_rfc3339();
    let run_id = new_run_id();

    let store = if db == ":memory:" {
        RecordStore::in_memory()?
    } else {
        RecordStore::open(db)?
    };
    store.migrate()?;
    store.insert_run(&run_id, env!("CARGO_PKG_VERSION"))?;
    store.insert_subscription_records(&run_id, &records)?;
    store.insert_booking_events(&run_id, &booking_events)?;

    if !summary_json {
        println!("Subscription timeline runner");
        println!("  run_id:        {run_id}");
        println!("  subscriptions: {}", subscriptions.unwrap_or("(synthetic)"));
        println!("  bookings:      {}", bookings.unwrap_or("(synthetic)"));
        println!("  out:           {out}");
        println!("  db:            {db}");
        println!();
    }

    let mut engine = PipelineEngine::build(run_id.clone(), config, store);
    let rows = engine.run()?;
    export::write_csv(Path::new(out), &rows)?;

    let summary = build_summary(&engine, &run_id, started_at, &records, &booking_events, &rows);
    if summary_json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }
    Ok(())
}

fn build_summary(
    engine: &PipelineEngine,
    run_id: &str,
    started_at: String,
    records: &[SubscriptionRecord],
    bookings: &[BookingEvent],
    rows: &[OutputRow],
) -> RunSummary {
    let dedup = engine.stage::<DedupStage>().map(|s| s.stats.clone()).unwrap_or_default();
    let gaps = engine.stage::<GapFillStage>().map(|s| s.stats.clone()).unwrap_or_default();
    let resolved = engine
        .stage::<StatusResolutionStage>()
        .map(|s| s.stats.clone())
        .unwrap_or_default();
    let joined = engine.stage::<JoinStage>().map(|s| s.stats.clone()).unwrap_or_default();

    RunSummary {
        run_id:                   run_id.to_string(),
        started_at,
        subscription_rows:        records.len(),
        booking_events:           bookings.len(),
        subscribers:              gaps.subscribers,
        output_rows:              rows.len(),
        duplicate_groups:         dedup.duplicate_groups,
        unknown_statuses:         dedup.unknown_statuses,
        gap_months:               gaps.inserted_months,
        resolved_from_prior:      resolved.from_prior,
        resolved_from_next:       resolved.from_next,
        resolved_by_fallback:     resolved.from_fallback,
        confirmed_bookings:       rows.iter().map(|r| r.confirmed_bookings as u64).sum(),
        unmatched_booking_groups: joined.unmatched_booking_groups,
    }
}

fn print_summary(s: &RunSummary) {
    println!("=== RUN SUMMARY ===");
    println!("  run_id:             {}", s.run_id);
    println!("  started:            {}", s.started_at);
    println!("  input rows:         {}", s.subscription_rows);
    println!("  booking events:     {}", s.booking_events);
    println!("  subscribers:        {}", s.subscribers);
    println!("  output rows:        {}", s.output_rows);
    println!("  duplicate groups:   {}", s.duplicate_groups);
    println!("  unknown statuses:   {}", s.unknown_statuses);
    println!("  gap months:         {}", s.gap_months);
    println!(
        "  resolved:           {} prior / {} next / {} fallback",
        s.resolved_from_prior, s.resolved_from_next, s.resolved_by_fallback
    );
    println!("  confirmed bookings: {}", s.confirmed_bookings);
    if s.unmatched_booking_groups > 0 {
        println!("  dropped booking subscriber-months: {}", s.unmatched_booking_groups);
    }
}

fn string_arg<'a>(args: &'a [String], flag: &str) -> Option<&'a str> {
    args.windows(2)
        .find(|w| w[0] == flag)
        .map(|w| w[1].as_str())
}

fn parse_arg<T: std::str::FromStr + Copy>(args: &[String], flag: &str, default: T) -> T {
    args.windows(2)
        .find(|w| w[0] == flag)
        .and_then(|w| w[1].parse().ok())
        .unwrap_or(default)
}
