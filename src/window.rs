//! Optional `[startDate, endDate]` creation-time window shared by both endpoints.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};
use serde::Deserialize;

use crate::error::{AnalyticsError, Result};

/// Raw bounds as they arrive on a query string or the command line.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WindowQuery {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl WindowQuery {
    pub fn new(start_date: Option<String>, end_date: Option<String>) -> Self {
        Self {
            start_date,
            end_date,
        }
    }

    pub fn resolve(&self) -> Result<Option<DateWindow>> {
        DateWindow::from_bounds(self.start_date.as_deref(), self.end_date.as_deref())
    }
}

/// Inclusive creation-time window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl DateWindow {
    /// Both bounds are validated, but the window only applies when both are present.
    pub fn from_bounds(start: Option<&str>, end: Option<&str>) -> Result<Option<Self>> {
        let start = start
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_bound(value, "startDate", Bound::Start))
            .transpose()?;
        let end = end
            .filter(|value| !value.trim().is_empty())
            .map(|value| parse_bound(value, "endDate", Bound::End))
            .transpose()?;

        Ok(match (start, end) {
            (Some(start), Some(end)) => Some(DateWindow { start, end }),
            _ => None,
        })
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        self.start <= instant && instant <= self.end
    }
}

/// Keeps the records whose timestamp falls inside the window; no window keeps everything.
pub fn retain_within<T, F>(window: Option<&DateWindow>, records: &mut Vec<T>, timestamp: F)
where
    F: Fn(&T) -> DateTime<Utc>,
{
    if let Some(window) = window {
        records.retain(|record| window.contains(timestamp(record)));
    }
}

#[derive(Clone, Copy)]
enum Bound {
    Start,
    End,
}

fn parse_bound(value: &str, field: &'static str, bound: Bound) -> Result<DateTime<Utc>> {
    let value = value.trim();
    if let Ok(instant) = DateTime::parse_from_rfc3339(value) {
        return Ok(instant.with_timezone(&Utc));
    }

    let date = NaiveDate::parse_from_str(value, "%Y-%m-%d").map_err(|_| {
        AnalyticsError::InvalidDate {
            field,
            value: value.to_string(),
        }
    })?;

    let time = match bound {
        Bound::Start => NaiveTime::MIN,
        Bound::End => NaiveTime::from_hms_milli_opt(23, 59, 59, 999).unwrap_or(NaiveTime::MIN),
    };
    Ok(date.and_time(time).and_utc())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::fixtures::at;
    use chrono::Duration;

    #[test]
    fn date_only_bounds_cover_whole_days() {
        let window = DateWindow::from_bounds(Some("2025-03-01"), Some("2025-03-31"))
            .expect("valid bounds")
            .expect("both bounds present");
        assert!(window.contains(at(2025, 3, 1)));
        assert!(window.contains(at(2025, 3, 31) + Duration::hours(23)));
        assert!(!window.contains(at(2025, 4, 1)));
        assert!(!window.contains(at(2025, 2, 28)));
    }

    #[test]
    fn rfc3339_bounds_are_exact() {
        let window = DateWindow::from_bounds(
            Some("2025-03-01T12:00:00Z"),
            Some("2025-03-02T00:00:00+00:00"),
        )
        .expect("valid bounds")
        .expect("both bounds present");
        assert!(!window.contains(at(2025, 3, 1)));
        assert!(window.contains(at(2025, 3, 2)));
    }

    #[test]
    fn single_bound_means_all_time() {
        assert!(DateWindow::from_bounds(Some("2025-03-01"), None)
            .expect("valid")
            .is_none());
        assert!(DateWindow::from_bounds(None, Some(""))
            .expect("valid")
            .is_none());
    }

    #[test]
    fn garbage_bound_is_rejected() {
        let err = DateWindow::from_bounds(Some("last week"), Some("2025-03-01"))
            .expect_err("should reject");
        assert!(err.is_client_error());
        assert!(err.to_string().contains("startDate"));
    }

    #[test]
    fn retain_within_filters_only_with_window() {
        let mut dates = vec![at(2025, 1, 5), at(2025, 3, 5), at(2025, 6, 5)];
        retain_within(None, &mut dates, |d| *d);
        assert_eq!(dates.len(), 3);

        let window = WindowQuery::new(Some("2025-03-01".into()), Some("2025-03-31".into()))
            .resolve()
            .expect("valid")
            .expect("window");
        retain_within(Some(&window), &mut dates, |d| *d);
        assert_eq!(dates, vec![at(2025, 3, 5)]);
    }
}
