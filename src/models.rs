use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, Serializer};
use uuid::Uuid;

pub const UNKNOWN: &str = "Unknown";
pub const UNKNOWN_TASK_REASON: &str = "Unknown Task Reason";
pub const NO_CATEGORY: &str = "No Category";
pub const NO_ACTION: &str = "no_action";

/// A quality-audit evaluation of a completed installation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QualityTask {
    pub id: Uuid,
    pub slid: String,
    pub evaluation_score: i32,
    pub reason: Option<String>,
    pub team_name: Option<String>,
    pub team_company: Option<String>,
    pub assigned_to: Option<String>,
    pub created_at: DateTime<Utc>,
    pub interview_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub sub_tasks: Vec<SubTask>,
}

impl QualityTask {
    pub fn reason_or_default(&self) -> &str {
        non_blank(self.reason.as_deref()).unwrap_or(UNKNOWN_TASK_REASON)
    }

    pub fn reason_label(&self) -> &str {
        non_blank(self.reason.as_deref()).unwrap_or(UNKNOWN)
    }

    pub fn company_label(&self) -> &str {
        non_blank(self.team_company.as_deref()).unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubTask {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub checkpoints: Vec<Checkpoint>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Checkpoint {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub options: CheckpointOptions,
}

impl Checkpoint {
    /// The direct action record followed by the follow-up question's one, when present.
    pub fn action_records(&self) -> impl Iterator<Item = &ActionRecord> {
        let follow_up = self
            .options
            .follow_up_question
            .as_ref()
            .and_then(|question| question.action_taken.as_ref());
        self.options.action_taken.iter().chain(follow_up)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckpointOptions {
    #[serde(default)]
    pub action_taken: Option<ActionRecord>,
    #[serde(default)]
    pub follow_up_question: Option<FollowUpQuestion>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FollowUpQuestion {
    #[serde(default)]
    pub action_taken: Option<ActionRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
    #[serde(default)]
    pub selected: Option<String>,
    #[serde(default)]
    pub justification: Option<Justification>,
}

impl ActionRecord {
    pub fn action_code(&self) -> Option<&str> {
        non_blank(self.selected.as_deref())
    }

    /// Justification code, only meaningful when no action was taken.
    pub fn justification_code(&self) -> Option<&str> {
        if self.action_code() != Some(NO_ACTION) {
            return None;
        }
        self.justification
            .as_ref()
            .and_then(|justification| non_blank(justification.selected.as_deref()))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Justification {
    #[serde(default)]
    pub selected: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum YesNo {
    Yes,
    No,
}

impl YesNo {
    /// Lenient parse of a stored flag; anything other than yes/no is treated as absent.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "yes" => Some(YesNo::Yes),
            "no" => Some(YesNo::No),
            _ => None,
        }
    }

    pub fn parse_opt(value: Option<&str>) -> Option<Self> {
        value.and_then(Self::parse)
    }
}

/// A customer-reported service issue on a site.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomerIssueReport {
    pub id: Uuid,
    pub slid: String,
    pub from_main: Option<String>,
    pub from_sub: Option<String>,
    pub reporter: Option<String>,
    pub date: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub issues: Vec<Issue>,
    pub dispatched: Option<YesNo>,
    pub dispatched_at: Option<DateTime<Utc>>,
    pub solved: Option<YesNo>,
    pub resolve_date: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub closed_by: Option<String>,
    pub assigned_to: Option<String>,
}

impl CustomerIssueReport {
    /// When the customer reported the issue; the explicit report date wins over the row timestamp.
    pub fn reported_at(&self) -> DateTime<Utc> {
        self.date.unwrap_or(self.created_at)
    }

    pub fn categories(&self) -> Vec<String> {
        let categories: Vec<String> = self
            .issues
            .iter()
            .filter_map(|issue| non_blank(issue.category.as_deref()))
            .map(str::to_string)
            .collect();

        if categories.is_empty() {
            vec![NO_CATEGORY.to_string()]
        } else {
            categories
        }
    }

    pub fn is_open(&self) -> bool {
        self.solved == Some(YesNo::No)
    }

    pub fn source_label(&self) -> &str {
        non_blank(self.from_main.as_deref()).unwrap_or(UNKNOWN)
    }

    pub fn sub_source_label(&self) -> &str {
        non_blank(self.from_sub.as_deref()).unwrap_or(UNKNOWN)
    }

    pub fn reporter_label(&self) -> &str {
        non_blank(self.reporter.as_deref()).unwrap_or(UNKNOWN)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    #[serde(default)]
    pub category: Option<String>,
}

/// A critical task together with every report filed on the same site.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Overlap {
    pub task: QualityTask,
    pub reports: Vec<CustomerIssueReport>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    AwaitingDispatch,
    FieldWork,
}

impl Stage {
    pub fn label(self) -> &'static str {
        match self {
            Stage::AwaitingDispatch => "Awaiting Dispatch",
            Stage::FieldWork => "Field Work",
        }
    }
}

impl Serialize for Stage {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.label())
    }
}

/// A still-open report with its age in days.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Bottleneck {
    #[serde(flatten)]
    pub report: CustomerIssueReport,
    pub age: f64,
    pub stage: Stage,
}

pub(crate) fn non_blank(value: Option<&str>) -> Option<&str> {
    value.filter(|value| !value.trim().is_empty())
}
