use std::path::Path;

use chrono::{DateTime, TimeZone, Utc};
use serde::Deserialize;
use sqlx::postgres::PgRow;
use sqlx::types::Json;
use sqlx::{PgPool, Row};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::Result;
use crate::models::{
    ActionRecord, Checkpoint, CheckpointOptions, CustomerIssueReport, FollowUpQuestion, Issue,
    Justification, QualityTask, SubTask, YesNo, NO_ACTION,
};
use crate::selector::CRITICAL_SCORES;
use crate::window::DateWindow;

pub async fn init_db(pool: &PgPool) -> Result<()> {
    sqlx::migrate!("./migrations").run(pool).await?;
    Ok(())
}

/// Critical-band tasks, optionally restricted to a creation window, newest first.
pub async fn fetch_critical_tasks(
    pool: &PgPool,
    window: Option<&DateWindow>,
) -> Result<Vec<QualityTask>> {
    let rows = sqlx::query(
        r#"
        SELECT id, slid, evaluation_score, reason, team_name, team_company, assigned_to,
               created_at, interview_date, sub_tasks
        FROM field_quality.quality_tasks
        WHERE evaluation_score BETWEEN $1 AND $2
          AND ($3::timestamptz IS NULL OR created_at >= $3)
          AND ($4::timestamptz IS NULL OR created_at <= $4)
        ORDER BY created_at DESC
        "#,
    )
    .bind(*CRITICAL_SCORES.start())
    .bind(*CRITICAL_SCORES.end())
    .bind(window.map(|w| w.start))
    .bind(window.map(|w| w.end))
    .fetch_all(pool)
    .await?;

    let tasks = rows.iter().map(task_from_row).collect::<Result<Vec<_>>>()?;
    debug!(count = tasks.len(), windowed = window.is_some(), "fetched critical tasks");
    Ok(tasks)
}

/// Every report filed on any of the given sites.
pub async fn fetch_reports_for_sites(
    pool: &PgPool,
    slids: &[String],
) -> Result<Vec<CustomerIssueReport>> {
    if slids.is_empty() {
        return Ok(Vec::new());
    }

    let rows = sqlx::query(
        r#"
        SELECT id, slid, from_main, from_sub, reporter, date, created_at, issues,
               dispatched, dispatched_at, solved, resolve_date, closed_at, closed_by, assigned_to
        FROM field_quality.issue_reports
        WHERE slid = ANY($1)
        ORDER BY created_at
        "#,
    )
    .bind(slids)
    .fetch_all(pool)
    .await?;

    let reports = rows.iter().map(report_from_row).collect::<Result<Vec<_>>>()?;
    debug!(sites = slids.len(), count = reports.len(), "fetched issue reports");
    Ok(reports)
}

fn task_from_row(row: &PgRow) -> Result<QualityTask> {
    let sub_tasks: Json<Vec<SubTask>> = row.try_get("sub_tasks")?;
    Ok(QualityTask {
        id: row.try_get("id")?,
        slid: row.try_get("slid")?,
        evaluation_score: row.try_get("evaluation_score")?,
        reason: row.try_get("reason")?,
        team_name: row.try_get("team_name")?,
        team_company: row.try_get("team_company")?,
        assigned_to: row.try_get("assigned_to")?,
        created_at: row.try_get("created_at")?,
        interview_date: row.try_get("interview_date")?,
        sub_tasks: sub_tasks.0,
    })
}

fn report_from_row(row: &PgRow) -> Result<CustomerIssueReport> {
    let issues: Json<Vec<Issue>> = row.try_get("issues")?;
    let dispatched: Option<String> = row.try_get("dispatched")?;
    let solved: Option<String> = row.try_get("solved")?;
    Ok(CustomerIssueReport {
        id: row.try_get("id")?,
        slid: row.try_get("slid")?,
        from_main: row.try_get("from_main")?,
        from_sub: row.try_get("from_sub")?,
        reporter: row.try_get("reporter")?,
        date: row.try_get("date")?,
        created_at: row.try_get("created_at")?,
        issues: issues.0,
        dispatched: YesNo::parse_opt(dispatched.as_deref()),
        dispatched_at: row.try_get("dispatched_at")?,
        solved: YesNo::parse_opt(solved.as_deref()),
        resolve_date: row.try_get("resolve_date")?,
        closed_at: row.try_get("closed_at")?,
        closed_by: row.try_get("closed_by")?,
        assigned_to: row.try_get("assigned_to")?,
    })
}

fn flag_text(flag: Option<YesNo>) -> Option<&'static str> {
    flag.map(|flag| match flag {
        YesNo::Yes => "yes",
        YesNo::No => "no",
    })
}

/// Inserts unless `source_key` was already imported. Returns whether a row was written.
pub async fn insert_task(pool: &PgPool, task: &QualityTask, source_key: &str) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO field_quality.quality_tasks
        (id, slid, evaluation_score, reason, team_name, team_company, assigned_to,
         created_at, interview_date, sub_tasks, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(task.id)
    .bind(&task.slid)
    .bind(task.evaluation_score)
    .bind(&task.reason)
    .bind(&task.team_name)
    .bind(&task.team_company)
    .bind(&task.assigned_to)
    .bind(task.created_at)
    .bind(task.interview_date)
    .bind(Json(&task.sub_tasks))
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

pub async fn insert_report(
    pool: &PgPool,
    report: &CustomerIssueReport,
    source_key: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
        INSERT INTO field_quality.issue_reports
        (id, slid, from_main, from_sub, reporter, date, created_at, issues, dispatched,
         dispatched_at, solved, resolve_date, closed_at, closed_by, assigned_to, source_key)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16)
        ON CONFLICT (source_key) DO NOTHING
        "#,
    )
    .bind(report.id)
    .bind(&report.slid)
    .bind(&report.from_main)
    .bind(&report.from_sub)
    .bind(&report.reporter)
    .bind(report.date)
    .bind(report.created_at)
    .bind(Json(&report.issues))
    .bind(flag_text(report.dispatched))
    .bind(report.dispatched_at)
    .bind(flag_text(report.solved))
    .bind(report.resolve_date)
    .bind(report.closed_at)
    .bind(&report.closed_by)
    .bind(&report.assigned_to)
    .bind(source_key)
    .execute(pool)
    .await?;

    Ok(result.rows_affected() > 0)
}

#[derive(Debug, Deserialize)]
pub struct TaskCsvRow {
    slid: String,
    evaluation_score: i32,
    reason: Option<String>,
    team_name: Option<String>,
    team_company: Option<String>,
    assigned_to: Option<String>,
    created_at: DateTime<Utc>,
    interview_date: Option<DateTime<Utc>>,
    /// JSON array in the same shape the API returns.
    sub_tasks: Option<String>,
    source_key: Option<String>,
}

impl TaskCsvRow {
    pub fn into_task(self) -> Result<(QualityTask, String)> {
        let sub_tasks = match self.sub_tasks.as_deref().map(str::trim) {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw)?,
            _ => Vec::new(),
        };
        let source_key = self
            .source_key
            .unwrap_or_else(|| format!("import-task-{}", Uuid::new_v4()));
        let task = QualityTask {
            id: Uuid::new_v4(),
            slid: self.slid,
            evaluation_score: self.evaluation_score,
            reason: self.reason,
            team_name: self.team_name,
            team_company: self.team_company,
            assigned_to: self.assigned_to,
            created_at: self.created_at,
            interview_date: self.interview_date,
            sub_tasks,
        };
        Ok((task, source_key))
    }
}

#[derive(Debug, Deserialize)]
pub struct ReportCsvRow {
    slid: String,
    from_main: Option<String>,
    from_sub: Option<String>,
    reporter: Option<String>,
    date: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    /// Semicolon-separated issue categories.
    categories: Option<String>,
    dispatched: Option<String>,
    dispatched_at: Option<DateTime<Utc>>,
    solved: Option<String>,
    resolve_date: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    closed_by: Option<String>,
    assigned_to: Option<String>,
    source_key: Option<String>,
}

impl ReportCsvRow {
    pub fn into_report(self) -> (CustomerIssueReport, String) {
        let issues = self
            .categories
            .as_deref()
            .unwrap_or_default()
            .split(';')
            .map(str::trim)
            .filter(|category| !category.is_empty())
            .map(|category| Issue {
                category: Some(category.to_string()),
            })
            .collect();
        let source_key = self
            .source_key
            .unwrap_or_else(|| format!("import-report-{}", Uuid::new_v4()));
        let report = CustomerIssueReport {
            id: Uuid::new_v4(),
            slid: self.slid,
            from_main: self.from_main,
            from_sub: self.from_sub,
            reporter: self.reporter,
            date: self.date,
            created_at: self.created_at,
            issues,
            dispatched: YesNo::parse_opt(self.dispatched.as_deref()),
            dispatched_at: self.dispatched_at,
            solved: YesNo::parse_opt(self.solved.as_deref()),
            resolve_date: self.resolve_date,
            closed_at: self.closed_at,
            closed_by: self.closed_by,
            assigned_to: self.assigned_to,
        };
        (report, source_key)
    }
}

pub fn read_task_csv(csv_path: &Path) -> Result<Vec<(QualityTask, String)>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut tasks = Vec::new();
    for result in reader.deserialize::<TaskCsvRow>() {
        tasks.push(result?.into_task()?);
    }
    Ok(tasks)
}

pub fn read_report_csv(csv_path: &Path) -> Result<Vec<(CustomerIssueReport, String)>> {
    let mut reader = csv::Reader::from_path(csv_path)?;
    let mut reports = Vec::new();
    for result in reader.deserialize::<ReportCsvRow>() {
        reports.push(result?.into_report());
    }
    Ok(reports)
}

pub async fn import_tasks_csv(pool: &PgPool, csv_path: &Path) -> Result<usize> {
    let mut inserted = 0usize;
    for (task, source_key) in read_task_csv(csv_path)? {
        if insert_task(pool, &task, &source_key).await? {
            inserted += 1;
        }
    }
    info!(inserted, path = %csv_path.display(), "imported quality tasks");
    Ok(inserted)
}

pub async fn import_reports_csv(pool: &PgPool, csv_path: &Path) -> Result<usize> {
    let mut inserted = 0usize;
    for (report, source_key) in read_report_csv(csv_path)? {
        if insert_report(pool, &report, &source_key).await? {
            inserted += 1;
        }
    }
    info!(inserted, path = %csv_path.display(), "imported issue reports");
    Ok(inserted)
}

fn seed_date(year: i32, month: u32, day: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(year, month, day, 9, 0, 0)
        .single()
        .unwrap_or_default()
}

fn seed_checkpoint(name: &str, action: &str, justification: Option<&str>) -> Checkpoint {
    Checkpoint {
        name: Some(name.to_string()),
        options: CheckpointOptions {
            action_taken: Some(ActionRecord {
                selected: Some(action.to_string()),
                justification: justification.map(|code| Justification {
                    selected: Some(code.to_string()),
                }),
            }),
            follow_up_question: Some(FollowUpQuestion { action_taken: None }),
        },
    }
}

/// Fixture rows covering a confirmed QoS report, a missed installation fault,
/// an undispatched open report and a passing audit.
pub async fn seed(pool: &PgPool) -> Result<()> {
    let tasks = vec![
        (
            "seed-task-001",
            "SL-10421",
            5,
            "QoS Degradation",
            "Harbor Fiber",
            seed_date(2026, 1, 12),
        ),
        (
            "seed-task-002",
            "SL-10588",
            6,
            "Installation Fault",
            "Northline Networks",
            seed_date(2026, 1, 19),
        ),
        (
            "seed-task-003",
            "SL-10733",
            7,
            "Splice Loss",
            "Harbor Fiber",
            seed_date(2026, 2, 3),
        ),
        (
            "seed-task-004",
            "SL-10990",
            9,
            "Installation Fault",
            "Northline Networks",
            seed_date(2026, 2, 9),
        ),
    ];

    for (source_key, slid, score, reason, company, created_at) in tasks {
        let task = QualityTask {
            id: Uuid::new_v4(),
            slid: slid.to_string(),
            evaluation_score: score,
            reason: Some(reason.to_string()),
            team_name: Some(format!("{company} Crew A")),
            team_company: Some(company.to_string()),
            assigned_to: Some("qa.lead@fieldquality.example".to_string()),
            created_at,
            interview_date: Some(created_at - chrono::Duration::days(2)),
            sub_tasks: vec![SubTask {
                title: Some("Outdoor installation".to_string()),
                checkpoints: vec![
                    seed_checkpoint("Drop cable routing", "re_routed", None),
                    seed_checkpoint("Signal level", NO_ACTION, Some("customer_unavailable")),
                ],
            }],
        };
        insert_task(pool, &task, source_key).await?;
    }

    let reports = vec![
        (
            "seed-report-001",
            "SL-10421",
            "Call Center",
            "QoS Issue",
            "Mira Haddad",
            seed_date(2026, 1, 5),
            Some(YesNo::Yes),
            Some(seed_date(2026, 1, 6)),
            Some(YesNo::Yes),
            Some(seed_date(2026, 1, 8)),
            Some(seed_date(2026, 1, 9)),
        ),
        (
            "seed-report-002",
            "SL-10588",
            "Web Portal",
            "Billing",
            "Omar Reyes",
            seed_date(2026, 1, 14),
            Some(YesNo::Yes),
            Some(seed_date(2026, 1, 15)),
            Some(YesNo::Yes),
            Some(seed_date(2026, 1, 16)),
            Some(seed_date(2026, 1, 16)),
        ),
        (
            "seed-report-003",
            "SL-10733",
            "Call Center",
            "Slow Speed",
            "Mira Haddad",
            seed_date(2026, 1, 28),
            Some(YesNo::No),
            None,
            Some(YesNo::No),
            None,
            None,
        ),
    ];

    for (
        source_key,
        slid,
        from_main,
        category,
        reporter,
        date,
        dispatched,
        dispatched_at,
        solved,
        resolve_date,
        closed_at,
    ) in reports
    {
        let report = CustomerIssueReport {
            id: Uuid::new_v4(),
            slid: slid.to_string(),
            from_main: Some(from_main.to_string()),
            from_sub: Some("Inbound".to_string()),
            reporter: Some(reporter.to_string()),
            date: Some(date),
            created_at: date,
            issues: vec![Issue {
                category: Some(category.to_string()),
            }],
            dispatched,
            dispatched_at,
            solved,
            resolve_date,
            closed_at,
            closed_by: closed_at.map(|_| "dispatch.supervisor".to_string()),
            assigned_to: Some("field.tech@fieldquality.example".to_string()),
        };
        insert_report(pool, &report, source_key).await?;
    }

    Ok(())
}
