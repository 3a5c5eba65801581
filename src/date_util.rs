use chrono::{
    DateTime, Datelike, Duration, LocalResult, NaiveDate, NaiveDateTime, NaiveTime, TimeZone, Utc,
};
use chrono_tz::Tz;

/// First day of the month preceding the month containing `d`.
pub fn first_of_previous_month(d: NaiveDate) -> NaiveDate {
    let (y, m) = if d.month() == 1 {
        (d.year() - 1, 12)
    } else {
        (d.year(), d.month() - 1)
    };
    NaiveDate::from_ymd_opt(y, m, 1).unwrap_or(NaiveDate::MIN)
}

/// Monday of the week containing `d`.
pub fn monday_of(d: NaiveDate) -> NaiveDate {
    d - Duration::days(d.weekday().num_days_from_monday() as i64)
}

/// The local calendar date of an instant in `tz`.
pub fn local_date(instant: DateTime<Utc>, tz: Tz) -> NaiveDate {
    instant.with_timezone(&tz).date_naive()
}

/// Most recent Monday (local date) at or before `now` in `tz`.
pub fn start_of_week(now: DateTime<Utc>, tz: Tz) -> NaiveDate {
    monday_of(local_date(now, tz))
}

/// Resolve a local wall-clock time in `tz` to an instant.
///
/// Ambiguous times (DST fall-back) take the earliest mapping. Times inside a
/// DST gap move forward to the first valid wall-clock minute after the gap.
pub fn resolve_local(naive: NaiveDateTime, tz: Tz) -> DateTime<Utc> {
    let mut candidate = naive;
    // Real-world gaps are at most a couple of hours.
    for _ in 0..(24 * 4) {
        match tz.from_local_datetime(&candidate) {
            LocalResult::Single(dt) => return dt.with_timezone(&Utc),
            LocalResult::Ambiguous(earliest, _) => return earliest.with_timezone(&Utc),
            LocalResult::None => candidate += Duration::minutes(15),
        }
    }
    tz.from_utc_datetime(&naive).with_timezone(&Utc)
}

/// Local midnight of `date` in `tz`, as an instant.
pub fn local_midnight(date: NaiveDate, tz: Tz) -> DateTime<Utc> {
    resolve_local(date.and_time(NaiveTime::MIN), tz)
}

/// Parse a timestamp as exported by the ticketing system.
///
/// Accepts RFC 3339 strings, `YYYY-MM-DD HH:MM:SS` (taken as UTC) and epoch
/// milliseconds. Anything else is coerced to `None`.
pub fn parse_instant(s: &str) -> Option<DateTime<Utc>> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f") {
        return Some(naive.and_utc());
    }
    if s.bytes().all(|b| b.is_ascii_digit()) {
        return s
            .parse::<i64>()
            .ok()
            .and_then(DateTime::<Utc>::from_timestamp_millis);
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Timelike, Weekday};
    use chrono_tz::Europe::Dublin;

    #[test]
    fn test_first_of_previous_month() {
        assert_eq!(
            first_of_previous_month(NaiveDate::from_ymd_opt(2025, 1, 15).unwrap()),
            NaiveDate::from_ymd_opt(2024, 12, 1).unwrap()
        );
        assert_eq!(
            first_of_previous_month(NaiveDate::from_ymd_opt(2025, 7, 1).unwrap()),
            NaiveDate::from_ymd_opt(2025, 6, 1).unwrap()
        );
    }

    #[test]
    fn test_start_of_week_is_monday() {
        // Sunday evening UTC is still Sunday in Dublin (winter, UTC+0)
        let now = Utc.with_ymd_and_hms(2025, 1, 12, 22, 0, 0).unwrap();
        let monday = start_of_week(now, Dublin);
        assert_eq!(monday, NaiveDate::from_ymd_opt(2025, 1, 6).unwrap());
        assert_eq!(monday.weekday(), Weekday::Mon);

        // Sunday 23:30 UTC in summer is already Monday 00:30 in Dublin
        let now = Utc.with_ymd_and_hms(2025, 6, 15, 23, 30, 0).unwrap();
        assert_eq!(
            start_of_week(now, Dublin),
            NaiveDate::from_ymd_opt(2025, 6, 16).unwrap()
        );
    }

    #[test]
    fn test_local_midnight_summer_offset() {
        let d = NaiveDate::from_ymd_opt(2025, 6, 16).unwrap();
        let instant = local_midnight(d, Dublin);
        // IST is UTC+1
        assert_eq!(instant, Utc.with_ymd_and_hms(2025, 6, 15, 23, 0, 0).unwrap());
    }

    #[test]
    fn test_resolve_local_inside_gap_moves_forward() {
        // Dublin springs forward 01:00 -> 02:00 on 2025-03-30
        let naive = NaiveDate::from_ymd_opt(2025, 3, 30)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = resolve_local(naive, Dublin).with_timezone(&Dublin);
        assert_eq!(resolved.hour(), 2);
        assert_eq!(resolved.minute(), 0);
    }

    #[test]
    fn test_resolve_local_ambiguous_takes_earliest() {
        // Dublin falls back 02:00 -> 01:00 on 2025-10-26
        let naive = NaiveDate::from_ymd_opt(2025, 10, 26)
            .unwrap()
            .and_hms_opt(1, 30, 0)
            .unwrap();
        let resolved = resolve_local(naive, Dublin);
        assert_eq!(resolved, Utc.with_ymd_and_hms(2025, 10, 26, 0, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_instant_formats() {
        let expected = Utc.with_ymd_and_hms(2025, 1, 6, 9, 30, 0).unwrap();
        assert_eq!(parse_instant("2025-01-06T09:30:00.000Z"), Some(expected));
        assert_eq!(parse_instant("2025-01-06T10:30:00+01:00"), Some(expected));
        assert_eq!(parse_instant("2025-01-06 09:30:00"), Some(expected));
        assert_eq!(parse_instant("1736155800000"), Some(expected));
    }

    #[test]
    fn test_parse_instant_coerces_garbage() {
        assert_eq!(parse_instant(""), None);
        assert_eq!(parse_instant("   "), None);
        assert_eq!(parse_instant("not a date"), None);
        assert_eq!(parse_instant("2025-13-45T00:00:00Z"), None);
    }
}
