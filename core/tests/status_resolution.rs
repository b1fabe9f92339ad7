//! Status resolution: nearest prior valid, then nearest next valid, then
//! canceled. Only originally valid periods are ever a source.

use chrono::NaiveDate;
use subtimeline_core::{
    config::UnknownStatusPolicy,
    dedup_stage::deduplicate,
    event::{PipelineEvent, ResolutionSource},
    gap_fill_stage::fill_gaps,
    month::Month,
    record::{SubscriptionPeriod, SubscriptionRecord},
    stage::{BatchState, PipelineStage},
    status_resolution_stage::{resolve_history, resolve_status, ResolutionStats, StatusResolutionStage},
    timeline::Timeline,
    types::{Status, SubscriberId},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn rec(id: &str, status: &str, y: i32, m: u32) -> SubscriptionRecord {
    SubscriptionRecord::new(id, status, NaiveDate::from_ymd_opt(y, m, 1).unwrap())
}

fn month(y: i32, m: u32) -> Month {
    Month::new(y, m).unwrap()
}

/// Dedup + gap fill + resolution, as the engine runs them.
fn resolved(records: Vec<SubscriptionRecord>) -> (Timeline, StatusResolutionStage, Vec<PipelineEvent>) {
    let (periods, _) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();
    let (timeline, _) = fill_gaps(&periods);
    let mut state = BatchState { timeline, ..BatchState::default() };
    let mut stage = StatusResolutionStage::new();
    let events = stage.run(&mut state).unwrap();
    (state.timeline, stage, events)
}

fn statuses(timeline: &Timeline, id: &str) -> Vec<Status> {
    timeline
        .history(&SubscriberId::new(id))
        .unwrap()
        .iter()
        .map(|p| p.status.expect("every period resolved"))
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// Valid at months 1 (active) and 5 (canceled); 2..4 are gaps.
/// Every gap has month 1 as its nearest prior valid period.
#[test]
fn gaps_take_nearest_prior_valid_status() {
    let (timeline, stage, events) = resolved(vec![
        rec("Y", "active", 2021, 1),
        rec("Y", "canceled", 2021, 5),
    ]);

    assert_eq!(
        statuses(&timeline, "Y"),
        vec![
            Status::Active,
            Status::Active,
            Status::Active,
            Status::Active,
            Status::Canceled,
        ]
    );
    assert_eq!(stage.stats.from_prior, 3);
    assert_eq!(events.len(), 3);
    assert!(events.iter().all(|e| matches!(
        e,
        PipelineEvent::StatusResolved { source: ResolutionSource::PriorValid, .. }
    )));
}

/// Only valid row is month 10; month 8 is a duplicate and 9 a gap.
/// Neither has a prior valid period, so both take month 10's status.
#[test]
fn leading_invalid_months_take_next_valid_status() {
    let (timeline, stage, _) = resolved(vec![
        rec("Z", "active", 2021, 8),
        rec("Z", "canceled", 2021, 10),
        rec("Z", "active", 2021, 8),
    ]);

    assert_eq!(
        statuses(&timeline, "Z"),
        vec![Status::Canceled, Status::Canceled, Status::Canceled]
    );
    assert_eq!(stage.stats.from_next, 2);
    assert_eq!(stage.stats.from_prior, 0);
}

#[test]
fn subscriber_without_valid_rows_falls_back_to_canceled() {
    let (timeline, stage, _) = resolved(vec![
        rec("N", "active", 2021, 1),
        rec("N", "active", 2021, 1),
        rec("N", "bogus", 2021, 3),
    ]);

    assert_eq!(
        statuses(&timeline, "N"),
        vec![Status::Canceled, Status::Canceled, Status::Canceled]
    );
    assert_eq!(stage.stats.from_fallback, 3);
    assert_eq!(stage.stats.total(), 3);
}

#[test]
fn valid_rows_keep_their_status() {
    let (timeline, stage, _) = resolved(vec![
        rec("V", "active", 2021, 1),
        rec("V", "canceled", 2021, 2),
        rec("V", "active", 2021, 3),
    ]);

    assert_eq!(
        statuses(&timeline, "V"),
        vec![Status::Active, Status::Canceled, Status::Active]
    );
    assert_eq!(stage.stats.total(), 0);
}

/// Two conflicting rows for the same month resolve the same way whichever
/// comes first in the input.
#[test]
fn duplicate_resolution_is_independent_of_row_order() {
    let base = vec![rec("X", "active", 2021, 1), rec("X", "canceled", 2021, 4)];

    let mut forward = base.clone();
    forward.push(rec("X", "active", 2021, 2));
    forward.push(rec("X", "canceled", 2021, 2));

    let mut backward = base;
    backward.insert(0, rec("X", "canceled", 2021, 2));
    backward.insert(0, rec("X", "active", 2021, 2));
    backward.reverse();

    let (a, _, _) = resolved(forward);
    let (b, _, _) = resolved(backward);

    assert_eq!(statuses(&a, "X"), statuses(&b, "X"));
    assert_eq!(statuses(&a, "X")[1], Status::Active, "prior valid month 1 is active");
}

/// A flagged month between a flagged month and a valid one looks past its
/// flagged neighbour: resolved statuses never act as a source.
#[test]
fn resolved_statuses_are_never_a_source() {
    let history = vec![
        SubscriptionPeriod {
            subscriber_id:            "R".into(),
            month:                    month(2021, 1),
            status:                   Some(Status::Active),
            is_synthetic_or_duplicate: true,
        },
        SubscriptionPeriod {
            subscriber_id:            "R".into(),
            month:                    month(2021, 2),
            status:                   None,
            is_synthetic_or_duplicate: true,
        },
        SubscriptionPeriod {
            subscriber_id:            "R".into(),
            month:                    month(2021, 3),
            status:                   Some(Status::Canceled),
            is_synthetic_or_duplicate: false,
        },
    ];

    // Month 1 carries a stale "active" but is flagged, so month 2 must not
    // see it as a prior valid period.
    assert_eq!(
        resolve_status(&history, month(2021, 2)),
        (Status::Canceled, ResolutionSource::NextValid)
    );

    let mut scanned = history.clone();
    let mut stats = ResolutionStats::default();
    let mut events = Vec::new();
    resolve_history(&mut scanned, &mut stats, &mut events);

    assert_eq!(scanned[0].status, Some(Status::Canceled));
    assert_eq!(scanned[1].status, Some(Status::Canceled));
    assert_eq!(stats.from_next, 2);
}

/// The O(n) scans and the per-month query give the same answer for every
/// flagged month.
#[test]
fn scan_agrees_with_point_query() {
    let records = vec![
        rec("Q", "canceled", 2020, 10),
        rec("Q", "active", 2020, 10),
        rec("Q", "active", 2021, 1),
        rec("Q", "?", 2021, 3),
        rec("Q", "canceled", 2021, 6),
        rec("Q", "active", 2021, 9),
        rec("Q", "active", 2021, 9),
    ];
    let (periods, _) = deduplicate(&records, UnknownStatusPolicy::Resolve).unwrap();
    let (timeline, _) = fill_gaps(&periods);
    let original = timeline.history(&SubscriberId::new("Q")).unwrap().to_vec();

    let mut scanned = original.clone();
    resolve_history(&mut scanned, &mut ResolutionStats::default(), &mut Vec::new());

    for (before, after) in original.iter().zip(&scanned) {
        if before.is_valid() {
            assert_eq!(before.status, after.status);
        } else {
            let (expected, _) = resolve_status(&original, before.month);
            assert_eq!(after.status, Some(expected), "month {}", before.month);
        }
    }
}
