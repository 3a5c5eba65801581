use std::collections::{BTreeMap, HashMap};

use crate::calendar::BusinessCalendar;
use crate::metrics::classify::classify;
use crate::metrics::stats::{quantile, resolution_hours, resolution_stats, stats_from_hours};
use crate::metrics::types::{
    AgentRow, CategoryRow, PeriodReport, TimeWindow, TrendPoint, WeeklyMetricRow,
};
use crate::ticket::{Owner, Ticket, UNASSIGNED};

/// Narrow a report to one category and/or one agent (by display name).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    pub category: Option<String>,
    pub agent: Option<String>,
}

impl TicketFilter {
    pub fn new(category: Option<String>, agent: Option<String>) -> Self {
        Self { category, agent }
    }
}

/// Resolves owner ids to display names; unknown owners show as "Unassigned".
pub struct OwnerNames<'a> {
    names: HashMap<&'a str, &'a str>,
}

impl<'a> OwnerNames<'a> {
    pub fn new(owners: &'a [Owner]) -> Self {
        Self {
            names: owners
                .iter()
                .map(|o| (o.owner_id.as_str(), o.full_name.as_str()))
                .collect(),
        }
    }

    pub fn name_of(&self, owner_id: &str) -> &'a str {
        self.names.get(owner_id).copied().unwrap_or(UNASSIGNED)
    }
}

/// Apply a [`TicketFilter`] to the ticket table.
pub fn filter_tickets(tickets: &[Ticket], owners: &OwnerNames<'_>, filter: &TicketFilter) -> Vec<Ticket> {
    tickets
        .iter()
        .filter(|t| filter.category.as_deref().is_none_or(|c| t.category == c))
        .filter(|t| {
            filter
                .agent
                .as_deref()
                .is_none_or(|a| owners.name_of(&t.owner_id) == a)
        })
        .cloned()
        .collect()
}

/// Headline numbers plus category and agent tables for one window.
pub fn period_report(
    tickets: &[Ticket],
    owners: &[Owner],
    window: TimeWindow,
    period_key: &str,
    filter: &TicketFilter,
    calendar: &BusinessCalendar,
) -> PeriodReport {
    let names = OwnerNames::new(owners);
    let tickets = filter_tickets(tickets, &names, filter);
    let cohorts = classify(&tickets, &window);

    PeriodReport {
        period_key: period_key.to_string(),
        window,
        opened: cohorts.opened.len() as u64,
        closed: cohorts.closed.len() as u64,
        backlog: cohorts.backlog.len() as u64,
        resolution: resolution_stats(&cohorts.closed, calendar),
        categories: category_table(&cohorts.opened, &cohorts.closed, &cohorts.backlog),
        agents: agent_table(&cohorts.closed, &cohorts.backlog, &names, calendar),
    }
}

fn category_table(opened: &[&Ticket], closed: &[&Ticket], backlog: &[&Ticket]) -> Vec<CategoryRow> {
    let mut by_category: BTreeMap<&str, CategoryRow> = BTreeMap::new();
    for t in opened {
        category_entry(&mut by_category, &t.category).opened += 1;
    }
    for t in closed {
        category_entry(&mut by_category, &t.category).closed += 1;
    }
    for t in backlog {
        category_entry(&mut by_category, &t.category).backlog += 1;
    }

    let mut rows: Vec<CategoryRow> = by_category.into_values().collect();
    rows.sort_by(|a, b| {
        b.backlog
            .cmp(&a.backlog)
            .then(b.opened.cmp(&a.opened))
            .then_with(|| a.category.cmp(&b.category))
    });
    rows
}

fn category_entry<'m, 't>(
    map: &'m mut BTreeMap<&'t str, CategoryRow>,
    category: &'t str,
) -> &'m mut CategoryRow {
    map.entry(category).or_insert_with(|| CategoryRow {
        category: category.to_string(),
        opened: 0,
        closed: 0,
        backlog: 0,
    })
}

fn agent_table(
    closed: &[&Ticket],
    backlog: &[&Ticket],
    names: &OwnerNames<'_>,
    calendar: &BusinessCalendar,
) -> Vec<AgentRow> {
    let mut closed_by_agent: BTreeMap<&str, Vec<&Ticket>> = BTreeMap::new();
    for t in closed.iter().copied() {
        closed_by_agent
            .entry(names.name_of(&t.owner_id))
            .or_default()
            .push(t);
    }
    let mut backlog_by_agent: BTreeMap<&str, u64> = BTreeMap::new();
    for t in backlog {
        *backlog_by_agent.entry(names.name_of(&t.owner_id)).or_default() += 1;
    }

    let mut agents: Vec<&str> = closed_by_agent
        .keys()
        .chain(backlog_by_agent.keys())
        .copied()
        .collect();
    agents.sort_unstable();
    agents.dedup();

    let mut rows: Vec<AgentRow> = agents
        .into_iter()
        .map(|agent| {
            let tickets = closed_by_agent.get(agent).map(Vec::as_slice).unwrap_or(&[]);
            let stats = stats_from_hours(resolution_hours(tickets, calendar));
            AgentRow {
                owner_name: agent.to_string(),
                closed: tickets.len() as u64,
                median_resolution_bh: stats.median.map(round1),
                p90_resolution_bh: stats.p90.map(round1),
                assigned_backlog: backlog_by_agent.get(agent).copied().unwrap_or(0),
            }
        })
        .collect();

    rows.sort_by(|a, b| {
        b.assigned_backlog
            .cmp(&a.assigned_backlog)
            .then(b.closed.cmp(&a.closed))
            .then_with(|| a.owner_name.cmp(&b.owner_name))
    });
    rows
}

/// Weekly trend over stored rollup rows, narrowed by `filter`.
///
/// Counts are summed across groups; resolution figures are the median of
/// the per-group values that are present. Agents are matched by display
/// name, as in [`filter_tickets`].
pub fn weekly_trend(rows: &[WeeklyMetricRow], owners: &[Owner], filter: &TicketFilter) -> Vec<TrendPoint> {
    let names = OwnerNames::new(owners);

    let mut weeks: BTreeMap<_, (TrendPoint, Vec<f64>, Vec<f64>)> = BTreeMap::new();
    for row in rows {
        if filter.category.as_deref().is_some_and(|c| row.category != c) {
            continue;
        }
        if filter
            .agent
            .as_deref()
            .is_some_and(|a| names.name_of(&row.owner_id) != a)
        {
            continue;
        }

        let (point, medians, p90s) = weeks.entry(row.week_start).or_insert_with(|| {
            (
                TrendPoint {
                    week_start: row.week_start,
                    opened: 0,
                    closed: 0,
                    backlog: 0,
                    median_bh: None,
                    p90_bh: None,
                },
                Vec::new(),
                Vec::new(),
            )
        });
        point.opened += row.opened_count;
        point.closed += row.closed_count;
        point.backlog += row.backlog_end_count;
        medians.extend(row.median_bh_close_hours);
        p90s.extend(row.p90_bh_close_hours);
    }

    weeks
        .into_values()
        .map(|(mut point, medians, p90s)| {
            point.median_bh = median_of(medians);
            point.p90_bh = median_of(p90s);
            point
        })
        .collect()
}

fn median_of(mut values: Vec<f64>) -> Option<f64> {
    values.retain(|v| v.is_finite());
    values.sort_by(f64::total_cmp);
    quantile(&values, 0.5)
}

fn round1(v: f64) -> f64 {
    (v * 10.0).round() / 10.0
}
