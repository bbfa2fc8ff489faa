//! Per-report process latencies and the open-report bottleneck ranking.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::models::{Bottleneck, CustomerIssueReport, Stage, YesNo};

const MILLIS_PER_DAY: f64 = 86_400_000.0;

pub fn days_between(start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
    (end - start).num_milliseconds() as f64 / MILLIS_PER_DAY
}

pub fn round_to(value: f64, decimals: i32) -> f64 {
    let factor = 10f64.powi(decimals);
    (value * factor).round() / factor
}

/// Report date to dispatch. Open dispatches run to `now`; a legacy "yes" without a
/// timestamp counts as dispatched on the report date.
pub fn dispatch_latency(report: &CustomerIssueReport, now: DateTime<Utc>) -> Option<f64> {
    let start = report.reported_at();
    let end = match (report.dispatched_at, report.dispatched) {
        (Some(at), _) => at,
        (None, Some(YesNo::No)) => now,
        (None, Some(YesNo::Yes)) => start,
        (None, None) => return None,
    };
    forward_span(start, end)
}

/// Dispatch to field resolution; only once a dispatch has happened.
pub fn resolution_latency(report: &CustomerIssueReport, now: DateTime<Utc>) -> Option<f64> {
    let start = match (report.dispatched_at, report.dispatched) {
        (Some(at), _) => at,
        (None, Some(YesNo::Yes)) => report.reported_at(),
        _ => return None,
    };
    let end = resolution_end(report.resolve_date, report.solved, now)?;
    forward_span(start, end)
}

/// Report date to closure.
pub fn lifecycle_latency(report: &CustomerIssueReport, now: DateTime<Utc>) -> Option<f64> {
    let end = resolution_end(report.closed_at, report.solved, now)?;
    forward_span(report.reported_at(), end)
}

fn resolution_end(
    recorded: Option<DateTime<Utc>>,
    solved: Option<YesNo>,
    now: DateTime<Utc>,
) -> Option<DateTime<Utc>> {
    match (recorded, solved) {
        (Some(at), _) => Some(at),
        (None, Some(YesNo::No)) => Some(now),
        _ => None,
    }
}

fn forward_span(start: DateTime<Utc>, end: DateTime<Utc>) -> Option<f64> {
    (end >= start).then(|| days_between(start, end))
}

#[derive(Debug, Clone, Copy, Default)]
struct Mean {
    total: f64,
    count: u64,
}

impl Mean {
    fn push(&mut self, sample: Option<f64>) {
        if let Some(days) = sample {
            self.total += days;
            self.count += 1;
        }
    }

    fn value(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            round_to(self.total / self.count as f64, 1)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProcessEfficiency {
    pub avg_resolution_time: f64,
    pub avg_dispatch_time: f64,
    pub avg_lifecycle_time: f64,
    pub oldest_pending: Vec<Bottleneck>,
    pub count_resolution: u64,
    pub count_closure: u64,
    pub count_lifecycle: u64,
}

/// Accumulates latencies and open reports for every (task, report) pair.
#[derive(Debug, Clone)]
pub struct ProcessTimeline {
    now: DateTime<Utc>,
    dispatch: Mean,
    resolution: Mean,
    lifecycle: Mean,
    pending: Vec<Bottleneck>,
}

impl ProcessTimeline {
    pub fn new(now: DateTime<Utc>) -> Self {
        Self {
            now,
            dispatch: Mean::default(),
            resolution: Mean::default(),
            lifecycle: Mean::default(),
            pending: Vec::new(),
        }
    }

    pub fn record(&mut self, report: &CustomerIssueReport) {
        self.dispatch.push(dispatch_latency(report, self.now));
        self.resolution.push(resolution_latency(report, self.now));
        self.lifecycle.push(lifecycle_latency(report, self.now));

        if let Some(bottleneck) = bottleneck(report, self.now) {
            self.pending.push(bottleneck);
        }
    }

    pub fn finish(self) -> ProcessEfficiency {
        ProcessEfficiency {
            avg_resolution_time: self.resolution.value(),
            avg_dispatch_time: self.dispatch.value(),
            avg_lifecycle_time: self.lifecycle.value(),
            oldest_pending: rank_bottlenecks(self.pending),
            count_resolution: self.resolution.count,
            count_closure: self.dispatch.count,
            count_lifecycle: self.lifecycle.count,
        }
    }
}

/// An open report annotated with age and stage; solved or unknown reports yield nothing.
pub fn bottleneck(report: &CustomerIssueReport, now: DateTime<Utc>) -> Option<Bottleneck> {
    if !report.is_open() {
        return None;
    }
    let stage = if report.dispatched == Some(YesNo::No) {
        Stage::AwaitingDispatch
    } else {
        Stage::FieldWork
    };
    Some(Bottleneck {
        report: report.clone(),
        age: round_to(days_between(report.reported_at(), now), 1),
        stage,
    })
}

/// Oldest first.
pub fn rank_bottlenecks(mut pending: Vec<Bottleneck>) -> Vec<Bottleneck> {
    pending.sort_by(|a, b| b.age.total_cmp(&a.age));
    pending
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::{at, report};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        at(2025, 4, 1)
    }

    #[test]
    fn resolution_counts_from_dispatch_to_resolve() {
        let mut r = report("S1", &["QoS Issue"]);
        let d0 = at(2025, 3, 2);
        r.dispatched = Some(YesNo::Yes);
        r.dispatched_at = Some(d0);
        r.resolve_date = Some(d0 + Duration::days(2));
        r.solved = Some(YesNo::Yes);

        assert_eq!(resolution_latency(&r, now()), Some(2.0));
        assert_eq!(dispatch_latency(&r, now()), Some(1.0));

        let mut timeline = ProcessTimeline::new(now());
        timeline.record(&r);
        let efficiency = timeline.finish();
        assert_eq!(efficiency.avg_resolution_time, 2.0);
        assert_eq!(efficiency.count_resolution, 1);
        assert!(efficiency.oldest_pending.is_empty());
    }

    #[test]
    fn undispatched_report_runs_to_now() {
        let mut r = report("S3", &[]);
        r.date = Some(now() - Duration::days(10));
        r.dispatched = Some(YesNo::No);
        r.solved = Some(YesNo::No);

        assert_eq!(dispatch_latency(&r, now()), Some(10.0));
        assert_eq!(resolution_latency(&r, now()), None);
        assert_eq!(lifecycle_latency(&r, now()), Some(10.0));

        let pending = bottleneck(&r, now()).expect("open report");
        assert_eq!(pending.stage, Stage::AwaitingDispatch);
        assert_eq!(pending.age, 10.0);
    }

    #[test]
    fn legacy_dispatch_flag_without_timestamp() {
        let mut r = report("S1", &[]);
        r.dispatched = Some(YesNo::Yes);
        r.solved = Some(YesNo::No);

        assert_eq!(dispatch_latency(&r, now()), Some(0.0));
        let expected = days_between(r.reported_at(), now());
        assert_eq!(resolution_latency(&r, now()), Some(expected));
        assert_eq!(
            bottleneck(&r, now()).map(|b| b.stage),
            Some(Stage::FieldWork)
        );
    }

    #[test]
    fn end_before_start_is_not_counted() {
        let mut r = report("S1", &[]);
        r.dispatched_at = Some(r.reported_at() - Duration::days(1));
        r.closed_at = Some(r.reported_at() - Duration::hours(3));
        assert_eq!(dispatch_latency(&r, now()), None);
        assert_eq!(lifecycle_latency(&r, now()), None);

        let mut timeline = ProcessTimeline::new(now());
        timeline.record(&r);
        let efficiency = timeline.finish();
        assert_eq!(efficiency.avg_dispatch_time, 0.0);
        assert_eq!(efficiency.count_closure, 0);
    }

    #[test]
    fn resolution_before_dispatch_is_not_counted() {
        let mut r = report("S1", &[]);
        r.dispatched = Some(YesNo::Yes);
        r.dispatched_at = Some(r.reported_at() + Duration::days(2));
        r.solved = Some(YesNo::Yes);
        r.resolve_date = Some(r.reported_at() + Duration::days(1));
        assert_eq!(resolution_latency(&r, now()), None);

        let mut timeline = ProcessTimeline::new(now());
        timeline.record(&r);
        let efficiency = timeline.finish();
        assert_eq!(efficiency.count_resolution, 0);
        assert_eq!(efficiency.avg_resolution_time, 0.0);
        assert_eq!(efficiency.count_closure, 1);
    }

    #[test]
    fn solved_without_dates_contributes_nothing_after_dispatch() {
        let mut r = report("S1", &[]);
        r.dispatched = Some(YesNo::Yes);
        r.solved = Some(YesNo::Yes);
        assert_eq!(resolution_latency(&r, now()), None);
        assert_eq!(lifecycle_latency(&r, now()), None);
        assert!(bottleneck(&r, now()).is_none());
    }

    #[test]
    fn bottlenecks_sorted_oldest_first() {
        let mut timeline = ProcessTimeline::new(now());
        for days in [3, 12, 7] {
            let mut r = report("S1", &[]);
            r.date = Some(now() - Duration::days(days));
            r.solved = Some(YesNo::No);
            timeline.record(&r);
        }
        let ages: Vec<f64> = timeline
            .finish()
            .oldest_pending
            .iter()
            .map(|b| b.age)
            .collect();
        assert_eq!(ages, vec![12.0, 7.0, 3.0]);
    }

    #[test]
    fn averages_round_to_one_decimal() {
        let mut timeline = ProcessTimeline::new(now());
        for hours in [10, 20] {
            let mut r = report("S1", &[]);
            r.dispatched_at = Some(r.reported_at() + Duration::hours(hours));
            timeline.record(&r);
        }
        // (10h + 20h) / 2 = 15h = 0.625 days
        assert_eq!(timeline.finish().avg_dispatch_time, 0.6);
    }
}
