//! Prevention statistics: could an earlier customer report have prevented the failed audit?

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::debug;

use crate::correlate::{correlate, prevention_rate};
use crate::matcher::{
    compare, ConfusionMatrix, DiagnosisAccuracy, DiagnosisTally, FaultMatcher, ReporterComparison,
};
use crate::models::{CustomerIssueReport, Overlap, QualityTask};
use crate::selector::select_critical;
use crate::tally::{NestedTally, Tally};
use crate::timeline::{round_to, ProcessEfficiency, ProcessTimeline};
use crate::window::DateWindow;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreventionStats {
    pub total_critical_tasks: usize,
    pub reported_overlap_count: usize,
    pub overlap_main_breakdown: Tally,
    pub overlap_sub_breakdown: Tally,
    pub source_breakdown: Tally,
    pub reporter_stats: Tally,
    pub global_category_reason_matrix: NestedTally,
    pub trend_data: Tally,
    pub reason_stats: Tally,
    pub company_stats: Tally,
    pub reporter_comparison_stats: Vec<ReporterComparison>,
    pub diagnosis_accuracy: DiagnosisAccuracy,
    pub qos_matrix: ConfusionMatrix,
    pub installation_matrix: ConfusionMatrix,
    pub process_efficiency: ProcessEfficiency,
    pub overlaps: Vec<Overlap>,
    pub prevention_rate: String,
}

/// Month label used for the trend series, e.g. "March 2025".
pub fn trend_label(instant: DateTime<Utc>) -> String {
    instant.format("%B %Y").to_string()
}

/// Builds the full prevention report from one snapshot of both record sets.
///
/// `reports` is everything fetched for the critical tasks' sites; the source and reporter
/// breakdowns count all of them, everything else works from the overlaps.
pub fn prevention_stats(
    tasks: &[QualityTask],
    reports: &[CustomerIssueReport],
    window: Option<&DateWindow>,
    matcher: &dyn FaultMatcher,
    now: DateTime<Utc>,
) -> PreventionStats {
    let critical = select_critical(tasks, window);
    let overlaps = correlate(&critical, reports);

    let source_breakdown: Tally = reports.iter().map(|r| r.source_label()).collect();
    let reporter_stats: Tally = reports.iter().map(|r| r.reporter_label()).collect();

    let mut overlap_main_breakdown = Tally::new();
    let mut overlap_sub_breakdown = Tally::new();
    let mut trend_data = Tally::new();
    let mut reason_stats = Tally::new();
    let mut company_stats = Tally::new();
    let mut diagnosis = DiagnosisTally::new();
    let mut timeline = ProcessTimeline::new(now);

    for overlap in &overlaps {
        let task = &overlap.task;
        if let Some(first) = overlap.reports.first() {
            overlap_main_breakdown.add(first.source_label());
            overlap_sub_breakdown.add(first.sub_source_label());
        }
        if let Some(interviewed) = task.interview_date {
            trend_data.add(&trend_label(interviewed));
        }
        reason_stats.add(task.reason_label());
        company_stats.add(task.company_label());

        for report in &overlap.reports {
            diagnosis.record(&compare(matcher, task, report));
            timeline.record(report);
        }
    }

    let diagnosis = diagnosis.finish();
    let rate = prevention_rate(overlaps.len(), critical.len());
    debug!(
        critical = critical.len(),
        reports = reports.len(),
        overlaps = overlaps.len(),
        comparisons = diagnosis.accuracy.total_comparisons,
        "prevention stats computed"
    );

    PreventionStats {
        total_critical_tasks: critical.len(),
        reported_overlap_count: overlaps.len(),
        overlap_main_breakdown,
        overlap_sub_breakdown,
        source_breakdown,
        reporter_stats,
        global_category_reason_matrix: diagnosis.category_reason_matrix,
        trend_data,
        reason_stats,
        company_stats,
        reporter_comparison_stats: diagnosis.reporter_comparisons,
        diagnosis_accuracy: diagnosis.accuracy,
        qos_matrix: diagnosis.qos_matrix,
        installation_matrix: diagnosis.installation_matrix,
        process_efficiency: timeline.finish(),
        overlaps,
        prevention_rate: format!("{:.2}", round_to(rate, 2)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matcher::SubstringMatcher;
    use crate::models::fixtures::{at, report, task};
    use crate::models::{Stage, YesNo};
    use chrono::Duration;

    fn now() -> DateTime<Utc> {
        at(2025, 4, 1)
    }

    fn scenario() -> (Vec<QualityTask>, Vec<CustomerIssueReport>) {
        let tasks = vec![
            task("S1", 5, Some("QoS Degradation")),
            task("S2", 6, Some("Installation Fault")),
            task("S3", 7, Some("Splice Loss")),
            task("S4", 3, Some("QoS Degradation")),
            task("S5", 10, Some("Installation Fault")),
        ];

        let d0 = at(2025, 3, 2);
        let mut confirmed = report("S1", &["QoS Issue"]);
        confirmed.dispatched = Some(YesNo::Yes);
        confirmed.dispatched_at = Some(d0);
        confirmed.resolve_date = Some(d0 + Duration::days(2));
        confirmed.solved = Some(YesNo::Yes);

        let mut missed = report("S2", &["Billing"]);
        missed.from_main = Some("Web".to_string());
        missed.reporter = Some("Lee".to_string());

        let mut open = report("S3", &[]);
        open.date = Some(now() - Duration::days(10));
        open.dispatched = Some(YesNo::No);
        open.solved = Some(YesNo::No);

        let passing_site = report("S5", &["Installation"]);

        (tasks, vec![confirmed, missed, open, passing_site])
    }

    #[test]
    fn confirmed_missed_and_open_scenarios() {
        let (tasks, reports) = scenario();
        let stats = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());

        assert_eq!(stats.total_critical_tasks, 4);
        assert_eq!(stats.reported_overlap_count, 3);
        assert_eq!(stats.prevention_rate, "75.00");

        assert_eq!(stats.qos_matrix.confirmed, 1);
        assert_eq!(stats.installation_matrix.missed, 1);
        assert_eq!(stats.diagnosis_accuracy.total_comparisons, 3);
        assert_eq!(stats.diagnosis_accuracy.total_matches, 0);
        assert_eq!(stats.diagnosis_accuracy.rate, "0.0");

        let efficiency = &stats.process_efficiency;
        assert_eq!(efficiency.count_resolution, 1);
        assert_eq!(efficiency.avg_resolution_time, 2.0);
        assert_eq!(efficiency.oldest_pending.len(), 1);
        assert_eq!(efficiency.oldest_pending[0].stage, Stage::AwaitingDispatch);
        assert_eq!(efficiency.oldest_pending[0].age, 10.0);
    }

    #[test]
    fn overlaps_respect_band_and_site_identity() {
        let (tasks, reports) = scenario();
        let stats = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());
        for overlap in &stats.overlaps {
            assert!((1..=8).contains(&overlap.task.evaluation_score));
            assert!(overlap.reports.iter().all(|r| r.slid == overlap.task.slid));
        }
        for matrix in [stats.qos_matrix, stats.installation_matrix] {
            assert!(matrix.total() <= stats.diagnosis_accuracy.total_comparisons);
        }
    }

    #[test]
    fn breakdowns_follow_the_overlaps() {
        let (tasks, reports) = scenario();
        let stats = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());

        assert_eq!(stats.source_breakdown.get("Call Center"), 3);
        assert_eq!(stats.source_breakdown.get("Web"), 1);
        assert_eq!(stats.reporter_stats.get("Dana"), 3);
        assert_eq!(stats.overlap_main_breakdown.get("Call Center"), 2);
        assert_eq!(stats.overlap_sub_breakdown.get("Inbound"), 3);
        assert_eq!(stats.trend_data.get("March 2025"), 3);
        assert_eq!(stats.reason_stats.get("QoS Degradation"), 1);
        assert_eq!(stats.company_stats.get("FiberLink"), 3);
        assert_eq!(
            stats
                .global_category_reason_matrix
                .get("No Category", "Splice Loss"),
            1
        );
    }

    #[test]
    fn trend_skips_tasks_without_interview() {
        let mut t = task("S1", 4, Some("QoS"));
        t.interview_date = None;
        let stats = prevention_stats(&[t], &[report("S1", &[])], None, &SubstringMatcher, now());
        assert_eq!(stats.reported_overlap_count, 1);
        assert!(stats.trend_data.is_empty());
    }

    #[test]
    fn empty_inputs_produce_zeroes() {
        let stats = prevention_stats(&[], &[], None, &SubstringMatcher, now());
        assert_eq!(stats.total_critical_tasks, 0);
        assert_eq!(stats.prevention_rate, "0.00");
        assert_eq!(stats.diagnosis_accuracy.rate, "0.0");
        assert_eq!(stats.process_efficiency.avg_lifecycle_time, 0.0);
        assert!(stats.overlaps.is_empty());
    }

    #[test]
    fn prevention_rate_rounds_half_up() {
        let tasks: Vec<_> = (0..32).map(|i| task(&format!("S{i}"), 4, None)).collect();
        let reports = [report("S1", &[])];
        let stats = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());
        assert_eq!(stats.total_critical_tasks, 32);
        assert_eq!(stats.reported_overlap_count, 1);
        assert_eq!(stats.prevention_rate, "3.13");
    }

    #[test]
    fn identical_snapshots_give_identical_json() {
        let (tasks, reports) = scenario();
        let first = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());
        let second = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());
        assert_eq!(
            serde_json::to_string(&first).expect("serializes"),
            serde_json::to_string(&second).expect("serializes")
        );
    }

    #[test]
    fn response_uses_camel_case_fields() {
        let (tasks, reports) = scenario();
        let stats = prevention_stats(&tasks, &reports, None, &SubstringMatcher, now());
        let json = serde_json::to_value(&stats).expect("serializes");
        assert_eq!(json["reportedOverlapCount"], 3);
        assert_eq!(json["qosMatrix"]["falseAlarm"], 0);
        assert_eq!(json["processEfficiency"]["oldestPending"][0]["stage"], "Awaiting Dispatch");
        assert_eq!(json["processEfficiency"]["oldestPending"][0]["slid"], "S3");
        assert_eq!(json["preventionRate"], "75.00");
    }
}
