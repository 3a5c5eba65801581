use crate::calendar::BusinessCalendar;
use crate::metrics::types::ResolutionStats;
use crate::ticket::Ticket;

/// Business-hours resolution time of each closed ticket, in cohort order.
pub fn resolution_hours(closed: &[&Ticket], calendar: &BusinessCalendar) -> Vec<f64> {
    closed
        .iter()
        .map(|t| calendar.duration(t.created_at, t.effective_close_at()))
        .filter(|h| h.is_finite())
        .collect()
}

/// Median and P90 of business-hours resolution time over a Closed cohort.
pub fn resolution_stats(closed: &[&Ticket], calendar: &BusinessCalendar) -> ResolutionStats {
    stats_from_hours(resolution_hours(closed, calendar))
}

/// Median and P90 of an arbitrary series. Non-finite values are ignored.
pub fn stats_from_hours(mut hours: Vec<f64>) -> ResolutionStats {
    hours.retain(|h| h.is_finite());
    hours.sort_by(f64::total_cmp);
    ResolutionStats {
        median: quantile(&hours, 0.5),
        p90: quantile(&hours, 0.9),
    }
}

/// Linear-interpolation quantile of an ascending series.
///
/// The position is `q * (n - 1)`; values between two ranks are interpolated.
/// Returns `None` for an empty series.
pub fn quantile(sorted: &[f64], q: f64) -> Option<f64> {
    if sorted.is_empty() {
        return None;
    }
    let q = q.clamp(0.0, 1.0);
    let pos = q * (sorted.len() - 1) as f64;
    let lo = pos.floor() as usize;
    let hi = pos.ceil() as usize;
    let frac = pos - lo as f64;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * frac)
}
