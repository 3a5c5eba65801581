use std::sync::LazyLock;

use chrono::{DateTime, Datelike, Days, Duration, NaiveDate, Utc, Weekday};
use chrono_tz::Tz;
use regex::Regex;

use crate::date_util::{first_of_previous_month, local_date, local_midnight, monday_of};
use crate::error::{Error, Result};
use crate::metrics::TimeWindow;

static RE_WEEK: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-W(\d{1,2})$").unwrap());
static RE_MONTH: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^(\d{4})-(\d{2})$").unwrap());
static RE_CUSTOM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(\d{4}-\d{2}-\d{2})\.\.(\d{4}-\d{2}-\d{2})$").unwrap());

/// A reporting window, resolved against `now` in the configured zone.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Period {
    LastWeek,
    ThisWeek,
    LastMonth,
    Week(i32, u8),
    Month(i32, u8),
    Rolling(u32),
    /// Start date inclusive, end date exclusive; both at local midnight.
    Custom(NaiveDate, NaiveDate),
}

impl Period {
    /// Parse a period string.
    ///
    /// Supported formats:
    /// - `last-week`: the previous Monday-to-Monday week
    /// - `this-week`: Monday of this week until now
    /// - `last-month`: the previous calendar month
    /// - `2025-W05`: ISO week
    /// - `2025-01`: month
    /// - `30d`: the last N days up to now
    /// - `2025-01-01..2025-02-01`: custom, end date exclusive
    pub fn parse(s: &str) -> Result<Self> {
        let s = s.trim();

        match s.to_lowercase().as_str() {
            "last-week" | "lw" => return Ok(Period::LastWeek),
            "this-week" | "wtd" => return Ok(Period::ThisWeek),
            "last-month" | "lm" => return Ok(Period::LastMonth),
            _ => {}
        }

        // Rolling: "30d", "7d", etc.
        if let Some(n) = s.strip_suffix(['d', 'D']) {
            if let Ok(n) = n.parse::<u32>() {
                return Ok(Period::Rolling(n));
            }
        }

        // Week: "2025-W05"
        if let Some(caps) = RE_WEEK.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let week: u8 = caps[2].parse().unwrap();
            if NaiveDate::from_isoywd_opt(year, week as u32, Weekday::Mon).is_some() {
                return Ok(Period::Week(year, week));
            }
        }

        // Month: "2025-01"
        if let Some(caps) = RE_MONTH.captures(s) {
            let year: i32 = caps[1].parse().unwrap();
            let month: u8 = caps[2].parse().unwrap();
            if (1..=12).contains(&month) {
                return Ok(Period::Month(year, month));
            }
        }

        // Custom: "2025-01-01..2025-02-01"
        if let Some(caps) = RE_CUSTOM.captures(s) {
            let start = parse_date(&caps[1])?;
            let end = parse_date(&caps[2])?;
            return Ok(Period::Custom(start, end));
        }

        Err(Error::PeriodParse(format!("unrecognized period: {s}")))
    }

    /// Convert to a canonical key string for display.
    pub fn to_key(&self) -> String {
        match self {
            Period::LastWeek => "last-week".to_string(),
            Period::ThisWeek => "this-week".to_string(),
            Period::LastMonth => "last-month".to_string(),
            Period::Week(y, w) => format!("{y}-W{w:02}"),
            Period::Month(y, m) => format!("{y}-{m:02}"),
            Period::Rolling(n) => format!("{n}d"),
            Period::Custom(s, e) => format!("{s}..{e}"),
        }
    }

    /// The half-open window this period covers.
    ///
    /// Calendar-aligned periods start and end at local midnight in `tz`;
    /// to-date periods end at `now`.
    pub fn window(&self, now: DateTime<Utc>, tz: Tz) -> Result<TimeWindow> {
        let today = local_date(now, tz);
        let midnight = |d: NaiveDate| local_midnight(d, tz);
        let window = match self {
            Period::LastWeek => {
                let this_monday = monday_of(today);
                TimeWindow::new(midnight(this_monday - Duration::weeks(1)), midnight(this_monday))
            }
            Period::ThisWeek => TimeWindow::new(midnight(monday_of(today)), now),
            Period::LastMonth => {
                let first_this_month = today.with_day(1).unwrap_or(today);
                TimeWindow::new(
                    midnight(first_of_previous_month(today)),
                    midnight(first_this_month),
                )
            }
            Period::Week(y, w) => {
                let start = NaiveDate::from_isoywd_opt(*y, *w as u32, Weekday::Mon);
                let end = start.and_then(|d| d.checked_add_days(Days::new(7)));
                match (start, end) {
                    (Some(start), Some(end)) => TimeWindow::new(midnight(start), midnight(end)),
                    _ => return Err(Error::PeriodParse(format!("invalid week: {self}"))),
                }
            }
            Period::Month(y, m) => {
                let start = NaiveDate::from_ymd_opt(*y, *m as u32, 1);
                let end = start.and_then(|d| d.checked_add_months(chrono::Months::new(1)));
                match (start, end) {
                    (Some(start), Some(end)) => TimeWindow::new(midnight(start), midnight(end)),
                    _ => return Err(Error::PeriodParse(format!("invalid month: {self}"))),
                }
            }
            Period::Rolling(n) => {
                let start = now.checked_sub_days(Days::new(*n as u64)).ok_or_else(|| {
                    Error::PeriodParse(format!("{n}d reaches before the earliest supported date"))
                })?;
                TimeWindow::new(start, now)
            }
            Period::Custom(start, end) => TimeWindow::new(midnight(*start), midnight(*end)),
        };
        Ok(window)
    }
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|_| Error::PeriodParse(format!("invalid date: {s}")))
}

impl std::fmt::Display for Period {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.to_key())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono_tz::Europe::Dublin;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    // Thursday 2025-03-13 14:00 in Dublin (GMT)
    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 13, 14, 0, 0).unwrap()
    }

    #[test]
    fn test_parse_named() {
        assert_eq!(Period::parse("last-week").unwrap(), Period::LastWeek);
        assert_eq!(Period::parse("LAST-MONTH").unwrap(), Period::LastMonth);
        assert_eq!(Period::parse("this-week").unwrap(), Period::ThisWeek);
    }

    #[test]
    fn test_parse_week() {
        assert_eq!(Period::parse("2025-W05").unwrap(), Period::Week(2025, 5));
        assert_eq!(Period::parse("2025-W1").unwrap(), Period::Week(2025, 1));
    }

    #[test]
    fn test_parse_month() {
        assert_eq!(Period::parse("2025-01").unwrap(), Period::Month(2025, 1));
        assert_eq!(Period::parse("2025-12").unwrap(), Period::Month(2025, 12));
    }

    #[test]
    fn test_parse_rolling() {
        assert_eq!(Period::parse("30d").unwrap(), Period::Rolling(30));
        assert_eq!(Period::parse("7D").unwrap(), Period::Rolling(7));
    }

    #[test]
    fn test_parse_custom() {
        assert_eq!(
            Period::parse("2025-01-01..2025-02-01").unwrap(),
            Period::Custom(date(2025, 1, 1), date(2025, 2, 1))
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(Period::parse("garbage").is_err());
        assert!(Period::parse("2025-13").is_err());
        assert!(Period::parse("2025-W60").is_err());
        assert!(Period::parse("2025-02-30..2025-03-01").is_err());
    }

    #[test]
    fn test_to_key_round_trips() {
        for key in ["last-week", "this-week", "last-month", "2025-W05", "2025-01", "30d", "2025-01-01..2025-02-01"] {
            assert_eq!(Period::parse(key).unwrap().to_key(), key);
        }
    }

    #[test]
    fn test_last_week_window() {
        let w = Period::LastWeek.window(now(), Dublin).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 3, 3, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_this_week_window_ends_now() {
        let w = Period::ThisWeek.window(now(), Dublin).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 3, 10, 0, 0, 0).unwrap());
        assert_eq!(w.end, now());
    }

    #[test]
    fn test_last_month_window() {
        let w = Period::LastMonth.window(now(), Dublin).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 2, 1, 0, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2025, 3, 1, 0, 0, 0).unwrap());
    }

    #[test]
    fn test_month_window_in_summer_time() {
        let w = Period::Month(2025, 7).window(now(), Dublin).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 6, 30, 23, 0, 0).unwrap());
        assert_eq!(w.end, Utc.with_ymd_and_hms(2025, 7, 31, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_custom_window_end_exclusive() {
        let p = Period::Custom(date(2025, 1, 6), date(2025, 1, 6));
        assert!(p.window(now(), Dublin).unwrap().is_empty());
    }

    #[test]
    fn test_rolling_window() {
        let w = Period::Rolling(7).window(now(), Dublin).unwrap();
        assert_eq!(w.start, Utc.with_ymd_and_hms(2025, 3, 6, 14, 0, 0).unwrap());
        assert_eq!(w.end, now());
    }

    #[test]
    fn test_rolling_window_out_of_range_is_an_error() {
        let p = Period::parse("4000000000d").unwrap();
        let err = p.window(now(), Dublin).unwrap_err();
        assert!(matches!(err, Error::PeriodParse(_)));
        assert!(Period::Month(2025, 13).window(now(), Dublin).is_err());
    }
}
