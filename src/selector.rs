use std::ops::RangeInclusive;

use crate::models::QualityTask;
use crate::window::{retain_within, DateWindow};

/// Scores in this band are failing or marginal evaluations; anything else passed.
pub const CRITICAL_SCORES: RangeInclusive<i32> = 1..=8;

pub fn is_critical(task: &QualityTask) -> bool {
    CRITICAL_SCORES.contains(&task.evaluation_score)
}

/// Critical tasks created inside the window (or at any time, with no window).
pub fn select_critical(tasks: &[QualityTask], window: Option<&DateWindow>) -> Vec<QualityTask> {
    let mut selected: Vec<QualityTask> = tasks.iter().filter(|t| is_critical(t)).cloned().collect();
    retain_within(window, &mut selected, |task| task.created_at);
    selected
}
