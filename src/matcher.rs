//! Category-to-reason matching and the fault-class confusion matrices.
//!
//! The match test is heuristic text containment. It sits behind [`FaultMatcher`]
//! so a lookup table or classifier can replace it without touching the tallies.

use std::collections::HashMap;

use serde::Serialize;

use crate::models::{CustomerIssueReport, QualityTask};
use crate::tally::NestedTally;
use crate::timeline::round_to;

pub const REPORTER_COMPARISON_LIMIT: usize = 10;

pub trait FaultMatcher: Send + Sync {
    /// Whether the reported categories describe the same fault as the task's root cause.
    fn matches_fault_category(&self, reported_categories: &[String], task_reason: &str) -> bool;
}

/// Case-insensitive containment in either direction.
#[derive(Debug, Clone, Copy, Default)]
pub struct SubstringMatcher;

impl FaultMatcher for SubstringMatcher {
    fn matches_fault_category(&self, reported_categories: &[String], task_reason: &str) -> bool {
        let reason = task_reason.to_lowercase();
        reported_categories.iter().any(|category| {
            let category = category.to_lowercase();
            reason.contains(&category) || category.contains(&reason)
        })
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FaultClass {
    Qos,
    Installation,
}

impl FaultClass {
    fn needle(self) -> &'static str {
        match self {
            FaultClass::Qos => "qos",
            FaultClass::Installation => "install",
        }
    }

    pub fn reported_in(self, categories: &[String]) -> bool {
        categories
            .iter()
            .any(|category| category.to_lowercase().contains(self.needle()))
    }

    pub fn present_in(self, task_reason: &str) -> bool {
        task_reason.to_lowercase().contains(self.needle())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfusionMatrix {
    pub confirmed: u64,
    pub false_alarm: u64,
    pub missed: u64,
}

impl ConfusionMatrix {
    /// Neither reported nor actual is not a tracked quadrant.
    pub fn record(&mut self, reported: bool, actual: bool) {
        match (reported, actual) {
            (true, true) => self.confirmed += 1,
            (true, false) => self.false_alarm += 1,
            (false, true) => self.missed += 1,
            (false, false) => {}
        }
    }

    pub fn total(&self) -> u64 {
        self.confirmed + self.false_alarm + self.missed
    }
}

/// Outcome of comparing one report against one task.
#[derive(Debug, Clone, PartialEq)]
pub struct PairComparison {
    pub reporter: String,
    pub categories: Vec<String>,
    pub task_reason: String,
    pub matched: bool,
    pub qos: (bool, bool),
    pub installation: (bool, bool),
}

pub fn compare(
    matcher: &dyn FaultMatcher,
    task: &QualityTask,
    report: &CustomerIssueReport,
) -> PairComparison {
    let categories = report.categories();
    let task_reason = task.reason_or_default().to_string();
    let matched = matcher.matches_fault_category(&categories, &task_reason);
    let signals = |class: FaultClass| {
        (
            class.reported_in(&categories),
            class.present_in(&task_reason),
        )
    };

    PairComparison {
        reporter: report.reporter_label().to_string(),
        qos: signals(FaultClass::Qos),
        installation: signals(FaultClass::Installation),
        categories,
        task_reason,
        matched,
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosisAccuracy {
    pub rate: String,
    pub total_matches: u64,
    pub total_comparisons: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterComparison {
    pub reporter: String,
    pub total: u64,
    /// Joined reported categories -> task reason -> count.
    pub breakdown: NestedTally,
}

/// Running totals over every (task, report) pair.
#[derive(Debug, Clone, Default)]
pub struct DiagnosisTally {
    total_matches: u64,
    total_comparisons: u64,
    qos: ConfusionMatrix,
    installation: ConfusionMatrix,
    category_reason: NestedTally,
    reporters: Vec<ReporterComparison>,
    reporter_index: HashMap<String, usize>,
}

impl DiagnosisTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&mut self, pair: &PairComparison) {
        self.total_comparisons += 1;
        if pair.matched {
            self.total_matches += 1;
        }

        self.qos.record(pair.qos.0, pair.qos.1);
        self.installation
            .record(pair.installation.0, pair.installation.1);

        for category in &pair.categories {
            self.category_reason.add(category, &pair.task_reason);
        }

        let slot = match self.reporter_index.get(&pair.reporter) {
            Some(&slot) => slot,
            None => {
                self.reporter_index
                    .insert(pair.reporter.clone(), self.reporters.len());
                self.reporters.push(ReporterComparison {
                    reporter: pair.reporter.clone(),
                    total: 0,
                    breakdown: NestedTally::new(),
                });
                self.reporters.len() - 1
            }
        };
        let entry = &mut self.reporters[slot];
        entry.total += 1;
        entry
            .breakdown
            .add(&pair.categories.join(", "), &pair.task_reason);
    }

    pub fn finish(self) -> DiagnosisSummary {
        let rate = if self.total_comparisons == 0 {
            "0.0".to_string()
        } else {
            let rate = self.total_matches as f64 / self.total_comparisons as f64 * 100.0;
            format!("{:.1}", round_to(rate, 1))
        };

        let mut reporters = self.reporters;
        reporters.sort_by(|a, b| b.total.cmp(&a.total));
        reporters.truncate(REPORTER_COMPARISON_LIMIT);

        DiagnosisSummary {
            accuracy: DiagnosisAccuracy {
                rate,
                total_matches: self.total_matches,
                total_comparisons: self.total_comparisons,
            },
            qos_matrix: self.qos,
            installation_matrix: self.installation,
            category_reason_matrix: self.category_reason,
            reporter_comparisons: reporters,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct DiagnosisSummary {
    pub accuracy: DiagnosisAccuracy,
    pub qos_matrix: ConfusionMatrix,
    pub installation_matrix: ConfusionMatrix,
    pub category_reason_matrix: NestedTally,
    pub reporter_comparisons: Vec<ReporterComparison>,
}
