use crate::metrics::types::{Cohorts, TimeWindow};
use crate::ticket::Ticket;

/// Split a ticket table into the Opened, Closed and Backlog cohorts of
/// `window`.
///
/// Tickets without a creation time are left out of every cohort. Backlog is
/// evaluated at `window.end` and keeps any ticket whose current
/// state is open, even one carrying a `closed_at` from an earlier close.
pub fn classify<'a>(tickets: &'a [Ticket], window: &TimeWindow) -> Cohorts<'a> {
    let mut cohorts = Cohorts::default();
    if window.is_empty() {
        return cohorts;
    }

    for ticket in tickets {
        let Some(created_at) = ticket.created_at else {
            continue;
        };
        let close_at = ticket.effective_close_at();

        if window.contains(created_at) {
            cohorts.opened.push(ticket);
        }

        if ticket.is_closed && close_at.is_some_and(|at| window.contains(at)) {
            cohorts.closed.push(ticket);
        }

        let open_at_end = !ticket.is_closed || close_at.is_none_or(|at| at >= window.end);
        if created_at < window.end && open_at_end {
            cohorts.backlog.push(ticket);
        }
    }

    cohorts
}

/// Number of tickets lacking a creation time; reported as a data-quality
/// signal by callers.
pub fn count_missing_created(tickets: &[Ticket]) -> usize {
    tickets.iter().filter(|t| t.created_at.is_none()).count()
}
