//! Joins critical tasks to customer reports filed on the same site.

use std::collections::{HashMap, HashSet};

use crate::models::{CustomerIssueReport, Overlap, QualityTask};

/// Distinct site identifiers, in first-seen order, for the report store lookup.
pub fn site_ids(tasks: &[QualityTask]) -> Vec<String> {
    let mut seen = HashSet::new();
    tasks
        .iter()
        .filter(|task| seen.insert(task.slid.as_str()))
        .map(|task| task.slid.clone())
        .collect()
}

/// One overlap per task that has at least one report on its site, ordered newest task first.
///
/// The join is on site identity alone: a report filed after the audit still counts.
pub fn correlate(tasks: &[QualityTask], reports: &[CustomerIssueReport]) -> Vec<Overlap> {
    let mut by_site: HashMap<&str, Vec<&CustomerIssueReport>> = HashMap::new();
    for report in reports {
        by_site.entry(report.slid.as_str()).or_default().push(report);
    }

    let mut overlaps: Vec<Overlap> = tasks
        .iter()
        .filter_map(|task| {
            let matching = by_site.get(task.slid.as_str())?;
            Some(Overlap {
                task: task.clone(),
                reports: matching.iter().map(|report| (*report).clone()).collect(),
            })
        })
        .collect();

    overlaps.sort_by(|a, b| b.task.created_at.cmp(&a.task.created_at));
    overlaps
}

/// Share of critical tasks with a report on file, as a percentage.
pub fn prevention_rate(overlap_count: usize, total_critical_tasks: usize) -> f64 {
    if total_critical_tasks == 0 {
        return 0.0;
    }
    overlap_count as f64 / total_critical_tasks as f64 * 100.0
}
