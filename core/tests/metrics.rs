//! Metric calculators: tenure, counts to date, months since status change.

use subtimeline_core::{
    error::PipelineError,
    metrics_stage::{
        enrich_history, months_since_first_subscription, months_since_status_change,
        status_counts_to_date, MetricsStage,
    },
    month::Month,
    record::SubscriptionPeriod,
    stage::{BatchState, PipelineStage},
    timeline::Timeline,
    types::Status::{self, Active as A, Canceled as C},
};

// ── Helpers ──────────────────────────────────────────────────────────────────

fn month(y: i32, m: u32) -> Month {
    Month::new(y, m).unwrap()
}

/// Contiguous resolved history starting at `start`, one status per month.
fn history(id: &str, start: Month, statuses: &[Status]) -> Vec<SubscriptionPeriod> {
    statuses
        .iter()
        .enumerate()
        .map(|(i, &status)| SubscriptionPeriod {
            subscriber_id:            id.into(),
            month:                    start.add_months(i as u32).unwrap(),
            status:                   Some(status),
            is_synthetic_or_duplicate: false,
        })
        .collect()
}

// ── Tests ────────────────────────────────────────────────────────────────────

/// C, C, A, C, A over Jan..May 2021.
#[test]
fn mixed_history_metrics() {
    let h = history("1", month(2021, 1), &[C, C, A, C, A]);

    let enriched = enrich_history(&h).unwrap();

    let tenure: Vec<_> = enriched.iter().map(|p| p.months_since_first_subscription).collect();
    let active: Vec<_> = enriched.iter().map(|p| p.active_months_to_date).collect();
    let canceled: Vec<_> = enriched.iter().map(|p| p.canceled_months_to_date).collect();
    let change: Vec<_> = enriched.iter().map(|p| p.months_since_status_change).collect();

    assert_eq!(tenure, vec![None, None, Some(0), Some(1), Some(2)]);
    assert_eq!(active, vec![0, 0, 1, 1, 2]);
    assert_eq!(canceled, vec![1, 2, 2, 3, 3]);
    assert_eq!(change, vec![None, None, Some(1), Some(1), Some(1)]);
}

/// A long unchanged run keeps counting from the last month with the other status.
#[test]
fn status_change_counts_from_last_differing_month() {
    let h = history("1", month(2021, 1), &[A, C, C, C, C]);

    let enriched = enrich_history(&h).unwrap();
    let change: Vec<_> = enriched.iter().map(|p| p.months_since_status_change).collect();

    assert_eq!(change, vec![None, Some(1), Some(2), Some(3), Some(4)]);
}

#[test]
fn tenure_uses_calendar_months_across_year_boundary() {
    let h = history("1", month(2020, 11), &[A, A, A, A]);

    let enriched = enrich_history(&h).unwrap();

    assert_eq!(enriched[3].month, month(2021, 2));
    assert_eq!(enriched[3].months_since_first_subscription, Some(3));
    assert_eq!(
        months_since_first_subscription(&h, month(2021, 2)),
        Some(3),
        "Nov 2020 to Feb 2021"
    );
}

/// Tenure counts from the first active month even after a cancellation.
#[test]
fn tenure_survives_cancellation() {
    let h = history("1", month(2021, 1), &[A, C, C, A]);

    let enriched = enrich_history(&h).unwrap();

    assert_eq!(enriched[2].months_since_first_subscription, Some(2));
    assert_eq!(enriched[3].months_since_first_subscription, Some(3));
}

#[test]
fn counts_to_date_sum_to_position() {
    let h = history("1", month(2021, 1), &[A, C, A, A, C, C, A]);

    let enriched = enrich_history(&h).unwrap();

    for (i, p) in enriched.iter().enumerate() {
        assert_eq!(
            p.active_months_to_date + p.canceled_months_to_date,
            i as u32 + 1,
            "month {}",
            p.month
        );
    }
}

/// The single-pass scan and the per-month queries always agree.
#[test]
fn scan_agrees_with_pure_calculators() {
    let h = history("1", month(2020, 6), &[C, A, A, C, A, C, C, A, A, A, C]);

    let enriched = enrich_history(&h).unwrap();

    for p in &enriched {
        assert_eq!(
            p.months_since_first_subscription,
            months_since_first_subscription(&h, p.month)
        );
        assert_eq!(
            (p.active_months_to_date, p.canceled_months_to_date),
            status_counts_to_date(&h, p.month)
        );
        assert_eq!(
            p.months_since_status_change,
            months_since_status_change(&h, p.month, p.status)
        );
    }
}

#[test]
fn unresolved_period_is_an_error() {
    let mut h = history("9", month(2021, 1), &[A, A]);
    h[1].status = None;

    match enrich_history(&h).unwrap_err() {
        PipelineError::UnresolvedStatus { subscriber_id, month } => {
            assert_eq!(subscriber_id, "9");
            assert_eq!(month, "2021-02-01");
        }
        other => panic!("expected UnresolvedStatus, got {other:?}"),
    }
}

#[test]
fn stage_enriches_every_timeline_row() {
    let mut periods = history("1", month(2021, 1), &[A, A, C]);
    periods.extend(history("2", month(2021, 3), &[C, A]));
    let mut state = BatchState {
        timeline: Timeline::from_periods(periods),
        ..BatchState::default()
    };

    let events = MetricsStage::new().run(&mut state).unwrap();

    assert!(events.is_empty());
    assert_eq!(state.enriched.len(), 5);
    assert!(state.enriched.iter().all(|p| p.confirmed_bookings == 0));
}
