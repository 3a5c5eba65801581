use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use crate::ticket::Ticket;

/// Half-open interval `[start, end)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct TimeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TimeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Self {
        Self { start, end }
    }

    /// Zero-length and inverted windows contain nothing.
    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, instant: DateTime<Utc>) -> bool {
        instant >= self.start && instant < self.end
    }
}

/// Opened / Closed / Backlog cohorts for one window. A ticket may sit in
/// more than one cohort.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Cohorts<'a> {
    pub opened: Vec<&'a Ticket>,
    pub closed: Vec<&'a Ticket>,
    /// Snapshot as of the window end.
    pub backlog: Vec<&'a Ticket>,
}

/// Distribution of business-hours resolution times. `None` means no closed
/// ticket contributed a duration.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct ResolutionStats {
    pub median: Option<f64>,
    pub p90: Option<f64>,
}

/// One row of the `weekly_metrics` table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct WeeklyMetricRow {
    /// Monday of the week, local calendar date.
    pub week_start: NaiveDate,
    pub category: String,
    pub owner_id: String,
    pub opened_count: u64,
    pub closed_count: u64,
    pub backlog_end_count: u64,
    pub median_bh_close_hours: Option<f64>,
    pub p90_bh_close_hours: Option<f64>,
}

/// Per-category cohort sizes for a period.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CategoryRow {
    pub category: String,
    pub opened: u64,
    pub closed: u64,
    pub backlog: u64,
}

/// Per-agent activity for a period.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AgentRow {
    pub owner_name: String,
    pub closed: u64,
    /// Rounded to one decimal place.
    pub median_resolution_bh: Option<f64>,
    /// Rounded to one decimal place.
    pub p90_resolution_bh: Option<f64>,
    pub assigned_backlog: u64,
}

/// Ad hoc metrics for a single custom window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodReport {
    pub period_key: String,
    pub window: TimeWindow,
    pub opened: u64,
    pub closed: u64,
    pub backlog: u64,
    pub resolution: ResolutionStats,
    pub categories: Vec<CategoryRow>,
    pub agents: Vec<AgentRow>,
}

/// One week of the trend built from stored weekly rows.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrendPoint {
    pub week_start: NaiveDate,
    pub opened: u64,
    pub closed: u64,
    pub backlog: u64,
    /// Median of the per-group medians.
    pub median_bh: Option<f64>,
    /// Median of the per-group P90 values.
    pub p90_bh: Option<f64>,
}
