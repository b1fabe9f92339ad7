//! Dedup stage: collision flagging, first-seen retention, month truncation
//! and the unknown-status policy.

use chrono::NaiveDate;
use subtimeline_core::{
    config::UnknownStatusPolicy,
    dedup_stage::{deduplicate, DedupStage},
    error::PipelineError,
    event::PipelineEvent,
    month::Month,
    record::SubscriptionRecord,
    stage::{BatchState, PipelineStage},
    types::Status,
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rec(id: &str, status: &str, y: i32, m: u32, d: u32) -> SubscriptionRecord {
    SubscriptionRecord::new(id, status, NaiveDate::from_ymd_opt(y, m, d).unwrap())
}

fn month(y: i32, m: u32) -> Month {
    Month::new(y, m).unwrap()
}

// ── Tests ────────────────────────────────────────────────────────────────────

#[test]
fn distinct_rows_pass_through_unflagged() {
    let records = vec![
        rec("1", "active", 2021, 1, 1),
        rec("1", "canceled", 2021, 2, 1),
        rec("2", "active", 2021, 1, 1),
    ];

    let (periods, events) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods.len(), 3);
    assert!(events.is_empty(), "no duplicates, no events; got {events:?}");
    assert!(periods.iter().all(|p| p.is_valid()));
    assert_eq!(periods[1].status, Some(Status::Canceled));
}

/// Every row of a collision is flagged, including the first one seen,
/// and exactly one row survives.
#[test]
fn collision_flags_whole_group_and_keeps_first_seen() {
    let records = vec![
        rec("A", "active", 2021, 1, 1),
        rec("A", "canceled", 2021, 3, 1),
        rec("A", "canceled", 2021, 1, 20),
    ];

    let (periods, events) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods.len(), 2);
    let jan = &periods[0];
    assert_eq!(jan.month, month(2021, 1));
    assert!(jan.is_synthetic_or_duplicate, "first-seen duplicate must be flagged too");
    assert_eq!(jan.status, Some(Status::Active), "first-seen row is the one retained");

    let mar = &periods[1];
    assert!(mar.is_valid());

    assert_eq!(
        events,
        vec![PipelineEvent::DuplicateGroupCollapsed {
            subscriber_id: "A".into(),
            month:         month(2021, 1),
            rows:          2,
        }]
    );
}

#[test]
fn triple_collision_reports_group_size() {
    let records = vec![
        rec("7", "active", 2022, 5, 1),
        rec("7", "active", 2022, 5, 2),
        rec("7", "canceled", 2022, 5, 3),
    ];

    let (periods, events) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods.len(), 1);
    assert!(matches!(
        events.as_slice(),
        [PipelineEvent::DuplicateGroupCollapsed { rows: 3, .. }]
    ));
}

#[test]
fn dates_truncate_to_first_of_month() {
    let records = vec![rec("1", "active", 2021, 1, 31)];

    let (periods, _) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods[0].month.first_day(), NaiveDate::from_ymd_opt(2021, 1, 1).unwrap());
}

#[test]
fn same_month_for_different_subscribers_is_not_a_duplicate() {
    let records = vec![rec("1", "active", 2021, 1, 1), rec("2", "active", 2021, 1, 1)];

    let (periods, events) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods.len(), 2);
    assert!(events.is_empty());
    assert!(periods.iter().all(|p| p.is_valid()));
}

#[test]
fn status_text_is_trimmed_and_case_insensitive() {
    let records = vec![rec("1", " Active ", 2021, 1, 1), rec("1", "CANCELED", 2021, 2, 1)];

    let (periods, _) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods[0].status, Some(Status::Active));
    assert_eq!(periods[1].status, Some(Status::Canceled));
    assert!(periods.iter().all(|p| p.is_valid()));
}

/// Under the default policy an unknown status becomes an invalid row with
/// no status, left for the status resolver.
#[test]
fn unknown_status_is_flagged_under_resolve_policy() {
    let records = vec![rec("1", "actve", 2021, 1, 1)];

    let (periods, events) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();

    assert_eq!(periods.len(), 1);
    assert!(periods[0].is_synthetic_or_duplicate);
    assert_eq!(periods[0].status, None);
    assert_eq!(
        events,
        vec![PipelineEvent::UnknownStatusFlagged {
            subscriber_id: "1".into(),
            month:         month(2021, 1),
            value:         "actve".into(),
        }]
    );
}

#[test]
fn unknown_status_aborts_under_reject_policy() {
    let records = vec![rec("1", "active", 2021, 1, 1), rec("1", "paused", 2021, 2, 1)];

    let err = deduplicate(&records, UnknownStatusPolicy::Reject).unwrap_err();

    match err {
        PipelineError::UnknownStatus { subscriber_id, month, value } => {
            assert_eq!(subscriber_id, "1");
            assert_eq!(month, "2021-02-01");
            assert_eq!(value, "paused");
        }
        other => panic!("expected UnknownStatus, got {other:?}"),
    }
}

#[test]
fn empty_input_yields_empty_output() {
    let (periods, events) = deduplicate(&[], UnknownStatusPolicy::Resolve).unwrap();
    assert!(periods.is_empty());
    assert!(events.is_empty());
}

#[test]
fn stage_records_stats_and_fills_state() {
    let mut state = BatchState::new(
        vec![
            rec("1", "active", 2021, 1, 1),
            rec("1", "active", 2021, 1, 9),
            rec("1", "???", 2021, 2, 1),
        ],
        Vec::new(),
    );
    let mut stage = DedupStage::new(UnknownStatusPolicy::Resolve);

    let events = stage.run(&mut state).unwrap();

    assert_eq!(state.periods.len(), 2);
    assert_eq!(events.len(), 2);
    assert_eq!(stage.stats.input_rows, 3);
    assert_eq!(stage.stats.output_rows, 2);
    assert_eq!(stage.stats.duplicate_groups, 1);
    assert_eq!(stage.stats.unknown_statuses, 1);
}
