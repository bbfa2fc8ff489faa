//! The two upstream record stores, behind one trait so the engine can run on Postgres
//! or on an in-memory snapshot.

use std::collections::HashSet;
use std::future::Future;
use std::path::Path;

use sqlx::PgPool;

use crate::db;
use crate::error::Result;
use crate::models::{CustomerIssueReport, QualityTask};
use crate::selector::select_critical;
use crate::window::DateWindow;

pub trait RecordSource: Send + Sync + 'static {
    /// Critical-band tasks created inside the window.
    fn critical_tasks(
        &self,
        window: Option<&DateWindow>,
    ) -> impl Future<Output = Result<Vec<QualityTask>>> + Send;

    /// Reports filed on any of the given sites.
    fn reports_for_sites(
        &self,
        slids: &[String],
    ) -> impl Future<Output = Result<Vec<CustomerIssueReport>>> + Send;
}

#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

impl RecordSource for PgStore {
    async fn critical_tasks(&self, window: Option<&DateWindow>) -> Result<Vec<QualityTask>> {
        db::fetch_critical_tasks(&self.pool, window).await
    }

    async fn reports_for_sites(&self, slids: &[String]) -> Result<Vec<CustomerIssueReport>> {
        db::fetch_reports_for_sites(&self.pool, slids).await
    }
}

/// A fixed snapshot of both record sets.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    tasks: Vec<QualityTask>,
    reports: Vec<CustomerIssueReport>,
}

impl MemoryStore {
    pub fn new(tasks: Vec<QualityTask>, reports: Vec<CustomerIssueReport>) -> Self {
        Self { tasks, reports }
    }

    /// Loads both sets from the same CSV layouts `import-tasks` / `import-reports` accept.
    pub fn from_csv(tasks_csv: &Path, reports_csv: &Path) -> Result<Self> {
        let tasks = db::read_task_csv(tasks_csv)?
            .into_iter()
            .map(|(task, _)| task)
            .collect();
        let reports = db::read_report_csv(reports_csv)?
            .into_iter()
            .map(|(report, _)| report)
            .collect();
        Ok(Self::new(tasks, reports))
    }
}

impl RecordSource for MemoryStore {
    async fn critical_tasks(&self, window: Option<&DateWindow>) -> Result<Vec<QualityTask>> {
        Ok(select_critical(&self.tasks, window))
    }

    async fn reports_for_sites(&self, slids: &[String]) -> Result<Vec<CustomerIssueReport>> {
        let wanted: HashSet<&str> = slids.iter().map(String::as_str).collect();
        Ok(self
            .reports
            .iter()
            .filter(|report| wanted.contains(report.slid.as_str()))
            .cloned()
            .collect())
    }
}
