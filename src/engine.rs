use std::sync::Arc;

use tracing::info;

use crate::clock::Clock;
use crate::correlate::site_ids;
use crate::deep_dive::{deep_dive, DeepDive};
use crate::error::Result;
use crate::matcher::FaultMatcher;
use crate::prevention::{prevention_stats, PreventionStats};
use crate::store::RecordSource;
use crate::window::WindowQuery;

/// Fetches a snapshot from the record source and runs the pure analyses over it.
pub struct Analytics<S> {
    source: S,
    matcher: Arc<dyn FaultMatcher>,
    clock: Arc<dyn Clock>,
}

impl<S: RecordSource> Analytics<S> {
    pub fn new(source: S, matcher: Arc<dyn FaultMatcher>, clock: Arc<dyn Clock>) -> Self {
        Self {
            source,
            matcher,
            clock,
        }
    }

    pub async fn prevention_stats(&self, query: &WindowQuery) -> Result<PreventionStats> {
        let window = query.resolve()?;
        let tasks = self.source.critical_tasks(window.as_ref()).await?;
        let reports = self.source.reports_for_sites(&site_ids(&tasks)).await?;

        let stats = prevention_stats(
            &tasks,
            &reports,
            window.as_ref(),
            self.matcher.as_ref(),
            self.clock.now(),
        );
        info!(
            critical = stats.total_critical_tasks,
            overlaps = stats.reported_overlap_count,
            prevention_rate = %stats.prevention_rate,
            "prevention stats ready"
        );
        Ok(stats)
    }

    pub async fn deep_dive(&self, query: &WindowQuery) -> Result<DeepDive> {
        let window = query.resolve()?;
        let tasks = self.source.critical_tasks(window.as_ref()).await?;
        let report = deep_dive(&tasks, window.as_ref());
        info!(tasks = report.total_tasks, "deep dive ready");
        Ok(report)
    }
}
