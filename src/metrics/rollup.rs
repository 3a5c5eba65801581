use std::collections::BTreeMap;

use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::config::{check_weeks_back, EngineConfig};
use crate::date_util::{local_midnight, start_of_week};
use crate::error::{Error, Result};
use crate::metrics::classify::classify;
use crate::metrics::stats::resolution_stats;
use crate::metrics::types::{TimeWindow, WeeklyMetricRow};
use crate::ticket::Ticket;

/// One week of the rollup: its Monday and the instants bounding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WeekWindow {
    pub week_start: NaiveDate,
    pub window: TimeWindow,
}

/// The `weeks_back` complete weeks before the week containing `now`,
/// oldest first. Boundaries are local midnight on Mondays.
pub fn weekly_windows(
    now: DateTime<Utc>,
    weeks_back: u32,
    config: &EngineConfig,
) -> Result<Vec<WeekWindow>> {
    check_weeks_back(weeks_back)?;
    let tz = config.timezone;
    let end = start_of_week(now, tz);
    let start = end
        .checked_sub_days(Days::new(7 * weeks_back as u64))
        .ok_or_else(|| Error::Config(format!("{weeks_back} weeks before {end} is out of range")))?;

    Ok((0..weeks_back as u64)
        .map(|i| {
            let monday = start + Days::new(7 * i);
            WeekWindow {
                week_start: monday,
                window: TimeWindow::new(
                    local_midnight(monday, tz),
                    local_midnight(monday + Days::new(7), tz),
                ),
            }
        })
        .collect())
}

#[derive(Default)]
struct GroupCounts<'a> {
    opened: u64,
    closed: Vec<&'a Ticket>,
    backlog: u64,
}

/// Build the weekly metrics table from a ticket snapshot.
///
/// Rows come out ordered by week, then `(category, owner_id)`. A group
/// appears in a week only if at least one of its cohorts is non-empty.
pub fn build_weekly(
    tickets: &[Ticket],
    now: DateTime<Utc>,
    weeks_back: u32,
    config: &EngineConfig,
) -> Result<Vec<WeeklyMetricRow>> {
    let calendar = config.calendar();
    let mut rows = Vec::new();

    for week in weekly_windows(now, weeks_back, config)? {
        let cohorts = classify(tickets, &week.window);

        let mut groups: BTreeMap<(&str, &str), GroupCounts> = BTreeMap::new();
        for t in cohorts.opened.iter().copied() {
            groups.entry(group_key(t)).or_default().opened += 1;
        }
        for t in cohorts.closed.iter().copied() {
            groups.entry(group_key(t)).or_default().closed.push(t);
        }
        for t in cohorts.backlog.iter().copied() {
            groups.entry(group_key(t)).or_default().backlog += 1;
        }

        log::debug!(
            "week {}: opened={} closed={} backlog={} groups={}",
            week.week_start,
            cohorts.opened.len(),
            cohorts.closed.len(),
            cohorts.backlog.len(),
            groups.len()
        );

        for ((category, owner_id), counts) in groups {
            let stats = resolution_stats(&counts.closed, &calendar);
            rows.push(WeeklyMetricRow {
                week_start: week.week_start,
                category: category.to_string(),
                owner_id: owner_id.to_string(),
                opened_count: counts.opened,
                closed_count: counts.closed.len() as u64,
                backlog_end_count: counts.backlog,
                median_bh_close_hours: stats.median,
                p90_bh_close_hours: stats.p90,
            });
        }
    }

    Ok(rows)
}

fn group_key(t: &Ticket) -> (&str, &str) {
    (t.category.as_str(), t.owner_id.as_str())
}
