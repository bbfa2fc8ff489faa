//! Score distribution and checkpoint follow-through for the critical task set.

use serde::Serialize;
use tracing::debug;

use crate::models::QualityTask;
use crate::selector::{select_critical, CRITICAL_SCORES};
use crate::tally::{NameValue, Tally};
use crate::window::DateWindow;

pub const TOP_BREAKDOWN_LIMIT: usize = 10;
pub const RECENT_TASK_LIMIT: usize = 50;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DeepDive {
    pub total_tasks: usize,
    pub score_distribution: Vec<NameValue>,
    pub action_taken_stats: Vec<NameValue>,
    pub justification_stats: Vec<NameValue>,
    pub reason_stats: Vec<NameValue>,
    pub company_stats: Vec<NameValue>,
    pub recent_tasks: Vec<QualityTask>,
}

pub fn deep_dive(tasks: &[QualityTask], window: Option<&DateWindow>) -> DeepDive {
    let mut critical = select_critical(tasks, window);

    let (low, high) = (*CRITICAL_SCORES.start(), *CRITICAL_SCORES.end());
    let mut histogram = vec![0u64; (high - low + 1) as usize];
    let mut reasons = Tally::new();
    let mut companies = Tally::new();
    let mut actions = Tally::new();
    let mut justifications = Tally::new();

    for task in &critical {
        let bucket = task.evaluation_score.clamp(low, high) - low;
        histogram[bucket as usize] += 1;
        reasons.add(task.reason_label());
        companies.add(task.company_label());

        let records = task
            .sub_tasks
            .iter()
            .flat_map(|sub_task| &sub_task.checkpoints)
            .flat_map(|checkpoint| checkpoint.action_records());
        for record in records {
            if let Some(code) = record.action_code() {
                actions.add(code);
            }
            if let Some(code) = record.justification_code() {
                justifications.add(code);
            }
        }
    }

    let score_distribution = histogram
        .iter()
        .zip(low..)
        .map(|(count, score)| NameValue {
            name: format!("Score {score}"),
            value: *count,
        })
        .collect();

    debug!(
        tasks = critical.len(),
        actions = actions.total(),
        justifications = justifications.total(),
        "deep dive computed"
    );

    let total_tasks = critical.len();
    critical.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    critical.truncate(RECENT_TASK_LIMIT);

    DeepDive {
        total_tasks,
        score_distribution,
        action_taken_stats: actions.ranked(),
        justification_stats: justifications.ranked(),
        reason_stats: reasons.top(TOP_BREAKDOWN_LIMIT),
        company_stats: companies.top(TOP_BREAKDOWN_LIMIT),
        recent_tasks: critical,
    }
}
