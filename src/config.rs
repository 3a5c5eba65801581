use chrono::NaiveTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::calendar::BusinessCalendar;
use crate::error::{Error, Result};

pub const DEFAULT_WEEKS_BACK: u32 = 26;
/// Twenty years of weekly rows.
pub const MAX_WEEKS_BACK: u32 = 1040;

/// Keys in `app_config` that feed [`EngineConfig`].
pub const KEY_TIMEZONE: &str = "timezone";
pub const KEY_WORK_START: &str = "work_start";
pub const KEY_WORK_END: &str = "work_end";
pub const KEY_WEEKS_BACK: &str = "weeks_back";

/// Calendar and lookback settings threaded into every engine entry point.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineConfig {
    #[serde(serialize_with = "serialize_tz")]
    pub timezone: Tz,
    pub work_start: NaiveTime,
    pub work_end: NaiveTime,
    pub weeks_back: u32,
}

fn serialize_tz<S: serde::Serializer>(tz: &Tz, s: S) -> std::result::Result<S::Ok, S::Error> {
    s.serialize_str(tz.name())
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timezone: chrono_tz::Europe::Dublin,
            work_start: NaiveTime::from_hms_opt(9, 0, 0).unwrap_or(NaiveTime::MIN),
            work_end: NaiveTime::from_hms_opt(17, 0, 0).unwrap_or(NaiveTime::MIN),
            weeks_back: DEFAULT_WEEKS_BACK,
        }
    }
}

impl EngineConfig {
    /// Build a config from `app_config` key/value pairs, falling back to the
    /// defaults for any key that is not set. Unknown keys are ignored.
    pub fn from_entries<'a, I>(entries: I) -> Result<Self>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        let mut config = Self::default();
        for (key, value) in entries {
            match key {
                KEY_TIMEZONE => config.timezone = parse_timezone(value)?,
                KEY_WORK_START => config.work_start = parse_time(key, value)?,
                KEY_WORK_END => config.work_end = parse_time(key, value)?,
                KEY_WEEKS_BACK => {
                    config.weeks_back = value.trim().parse().map_err(|_| {
                        Error::Config(format!("weeks_back must be a whole number, got {value:?}"))
                    })?
                }
                _ => {}
            }
        }
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.work_start >= self.work_end {
            return Err(Error::Config(format!(
                "work_start ({}) must be before work_end ({})",
                self.work_start, self.work_end
            )));
        }
        check_weeks_back(self.weeks_back)
    }

    pub fn calendar(&self) -> BusinessCalendar {
        BusinessCalendar {
            timezone: self.timezone,
            work_start: self.work_start,
            work_end: self.work_end,
        }
    }
}

/// Reject lookbacks longer than [`MAX_WEEKS_BACK`].
pub fn check_weeks_back(weeks_back: u32) -> Result<()> {
    if weeks_back > MAX_WEEKS_BACK {
        return Err(Error::Config(format!(
            "weeks_back must be at most {MAX_WEEKS_BACK}, got {weeks_back}"
        )));
    }
    Ok(())
}

fn parse_timezone(value: &str) -> Result<Tz> {
    value
        .trim()
        .parse::<Tz>()
        .map_err(|_| Error::Config(format!("unknown IANA timezone: {value}")))
}

fn parse_time(key: &str, value: &str) -> Result<NaiveTime> {
    let value = value.trim();
    NaiveTime::parse_from_str(value, "%H:%M")
        .or_else(|_| NaiveTime::parse_from_str(value, "%H:%M:%S"))
        .map_err(|_| Error::Config(format!("{key} must be HH:MM, got {value:?}")))
}
