use chrono::{DateTime, Datelike, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;

const MICROS_PER_HOUR: f64 = 3_600_000_000.0;

/// A fixed weekly working schedule in a single IANA zone.
///
/// Monday to Friday between `work_start` and `work_end` local wall-clock time.
/// No lunch deduction and no public holidays.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BusinessCalendar {
    pub timezone: Tz,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
}

impl BusinessCalendar {
    /// Business hours elapsed between two instants.
    ///
    /// Returns 0 when either instant is unknown or `end <= start`. Hours are
    /// counted on the local wall clock, so a day containing a DST change still
    /// offers its full nominal window.
    pub fn duration(&self, start: Option<DateTime<Utc>>, end: Option<DateTime<Utc>>) -> f64 {
        match (start, end) {
            (Some(start), Some(end)) => self.hours_between(start, end),
            _ => 0.0,
        }
    }

    pub fn hours_between(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> f64 {
        if end <= start {
            return 0.0;
        }

        let start = start.with_timezone(&self.timezone).naive_local();
        let end = end.with_timezone(&self.timezone).naive_local();

        let mut total_micros: i64 = 0;
        let mut day = start.date();
        while day <= end.date() {
            if !is_weekend(day.weekday()) {
                let window_start = day.and_time(self.work_start).max(start);
                let window_end = day.and_time(self.work_end).min(end);
                if window_end > window_start {
                    total_micros += (window_end - window_start)
                        .num_microseconds()
                        .unwrap_or(i64::MAX);
                }
            }
            match day.succ_opt() {
                Some(next) => day = next,
                None => break,
            }
        }

        total_micros as f64 / MICROS_PER_HOUR
    }
}

fn is_weekend(day: Weekday) -> bool {
    matches!(day, Weekday::Sat | Weekday::Sun)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use chrono::TimeZone;
    use chrono_tz::Europe::Dublin;

    fn dublin(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Dublin
            .with_ymd_and_hms(y, m, d, h, min, 0)
            .single()
            .unwrap()
            .with_timezone(&Utc)
    }

    fn calendar() -> BusinessCalendar {
        EngineConfig::default().calendar()
    }

    #[test]
    fn test_within_single_business_day_is_exact() {
        // 2025-01-06 is a Monday
        let a = dublin(2025, 1, 6, 9, 15);
        let b = dublin(2025, 1, 6, 16, 45);
        assert_eq!(calendar().hours_between(a, b), 7.5);

        let b = dublin(2025, 1, 6, 9, 35);
        let expected = (b - a).num_seconds() as f64 / 3600.0;
        assert_eq!(calendar().hours_between(a, b), expected);
    }

    #[test]
    fn test_inverted_or_empty_is_zero() {
        let a = dublin(2025, 1, 6, 10, 0);
        let b = dublin(2025, 1, 6, 12, 0);
        assert_eq!(calendar().hours_between(b, a), 0.0);
        assert_eq!(calendar().hours_between(a, a), 0.0);
    }

    #[test]
    fn test_unknown_instant_is_zero() {
        let a = dublin(2025, 1, 6, 10, 0);
        assert_eq!(calendar().duration(None, Some(a)), 0.0);
        assert_eq!(calendar().duration(Some(a), None), 0.0);
        assert_eq!(calendar().duration(None, None), 0.0);
    }

    #[test]
    fn test_clips_to_working_window() {
        // Monday 08:00 -> Monday 18:00 counts only 09:00-17:00
        let a = dublin(2025, 1, 6, 8, 0);
        let b = dublin(2025, 1, 6, 18, 0);
        assert_eq!(calendar().hours_between(a, b), 8.0);
    }

    #[test]
    fn test_friday_to_monday_skips_weekend() {
        let a = dublin(2025, 1, 10, 16, 0);
        let b = dublin(2025, 1, 13, 10, 0);
        assert_eq!(calendar().hours_between(a, b), 2.0);
    }

    #[test]
    fn test_after_hours_friday_to_monday_morning() {
        let a = dublin(2025, 1, 10, 17, 30);
        let b = dublin(2025, 1, 13, 9, 30);
        assert_eq!(calendar().hours_between(a, b), 0.5);
    }

    #[test]
    fn test_weekend_only_is_zero() {
        let a = dublin(2025, 1, 11, 0, 0);
        let b = dublin(2025, 1, 12, 23, 59);
        assert_eq!(calendar().hours_between(a, b), 0.0);
    }

    #[test]
    fn test_full_week() {
        let a = dublin(2025, 1, 6, 0, 0);
        let b = dublin(2025, 1, 13, 0, 0);
        assert_eq!(calendar().hours_between(a, b), 40.0);
    }

    #[test]
    fn test_summer_time_uses_local_wall_clock() {
        // 09:00 IST is 08:00 UTC
        let a = Utc.with_ymd_and_hms(2025, 6, 16, 8, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2025, 6, 16, 9, 0, 0).unwrap();
        assert_eq!(calendar().hours_between(a, b), 1.0);
    }

    #[test]
    fn test_dst_day_keeps_nominal_window() {
        // Cairo springs forward at midnight on Friday 2024-04-26 (00:00 -> 01:00).
        let cal = BusinessCalendar {
            timezone: chrono_tz::Africa::Cairo,
            work_start: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
            work_end: NaiveTime::from_hms_opt(8, 0, 0).unwrap(),
        };
        // Thursday 23:00 local (UTC+2) to Friday 08:00 local (UTC+3): 7h elapsed
        let a = Utc.with_ymd_and_hms(2024, 4, 25, 21, 0, 0).unwrap();
        let b = Utc.with_ymd_and_hms(2024, 4, 26, 5, 0, 0).unwrap();
        assert_eq!(cal.hours_between(a, b), 8.0);
    }
}
