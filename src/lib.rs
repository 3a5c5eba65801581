pub mod calendar;
pub mod config;
pub mod date_util;
pub mod error;
pub mod ingest;
pub mod metrics;
pub mod query;
pub mod storage;
pub mod ticket;

pub use calendar::BusinessCalendar;
pub use config::EngineConfig;
pub use error::{Error, Result};
pub use ingest::{ImportOptions, ImportReport};
pub use metrics::{PeriodReport, TicketFilter, TrendPoint, WeeklyMetricRow};
pub use query::period::Period;
pub use storage::Database;
pub use ticket::{Owner, Ticket};

use chrono::{DateTime, NaiveDate, Utc};
use serde::Serialize;

use metrics::classify::count_missing_created;
use storage::repository;

const JOB_IMPORT: &str = "import";
const JOB_WEEKLY: &str = "weekly";

/// Summary of one weekly rollup run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RollupReport {
    pub job_id: i64,
    pub as_of: DateTime<Utc>,
    pub weeks_back: u32,
    pub first_week: Option<NaiveDate>,
    pub tickets: u64,
    pub tickets_missing_created: u64,
    pub rows_written: u64,
}

/// Row counts and last job times for `ticketdw status`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct WarehouseStatus {
    pub tickets: u64,
    pub owners: u64,
    pub weekly_rows: u64,
    pub last_import: Option<String>,
    pub last_rollup: Option<String>,
}

/// Main entry point for the ticket metrics warehouse.
pub struct TicketDW {
    db: Database,
}

impl TicketDW {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    /// Effective engine configuration: defaults overlaid with `app_config`.
    pub async fn engine_config(&self) -> Result<EngineConfig> {
        let entries = self.config_list().await?;
        EngineConfig::from_entries(entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))
    }

    // ── Import ─────────────────────────────────────────────────────

    pub async fn import(&self, options: &ImportOptions) -> Result<ImportReport> {
        let job_id = self
            .db
            .writer()
            .call(|conn| repository::insert_job(conn, JOB_IMPORT, None, None))
            .await?;

        let result = ingest::import_snapshot(&self.db, options).await;
        let (status, rows, error) = match &result {
            Ok(report) => ("completed", report.tickets_loaded, None),
            Err(e) => ("failed", 0, Some(e.to_string())),
        };
        self.db
            .writer()
            .call(move |conn| repository::update_job(conn, job_id, status, rows, error.as_deref()))
            .await?;
        result
    }

    // ── Rollup ─────────────────────────────────────────────────────

    /// Rebuild `weekly_metrics` from the stored snapshot as of `now`.
    ///
    /// `weeks_back` overrides the configured lookback. Each run is logged in
    /// `jobs`; a failed write leaves the previous table in place.
    pub async fn run_rollup(&self, now: DateTime<Utc>, weeks_back: Option<u32>) -> Result<RollupReport> {
        let config = self.engine_config().await?;
        let weeks_back = weeks_back.unwrap_or(config.weeks_back);
        config::check_weeks_back(weeks_back)?;

        let job_id = self
            .db
            .writer()
            .call(move |conn| repository::insert_job(conn, JOB_WEEKLY, Some(now), Some(weeks_back)))
            .await?;

        let tickets = self.db.reader().call(|conn| repository::load_tickets(conn)).await?;
        let missing = count_missing_created(&tickets);
        if missing > 0 {
            log::warn!("{missing} tickets have no created timestamp and are never counted as opened");
        }

        let rows = metrics::build_weekly(&tickets, now, weeks_back, &config)?;
        let first_week = rows.first().map(|r| r.week_start);
        let written = self
            .db
            .writer()
            .call(move |conn| repository::replace_weekly_metrics(conn, &rows))
            .await;

        let (status, rows_written, error) = match &written {
            Ok(n) => ("completed", *n as u64, None),
            Err(e) => ("failed", 0, Some(e.to_string())),
        };
        self.db
            .writer()
            .call(move |conn| {
                repository::update_job(conn, job_id, status, rows_written, error.as_deref())
            })
            .await?;
        written?;

        log::info!(
            "Rollup as of {now}: {} tickets over {weeks_back} weeks, {rows_written} rows written",
            tickets.len()
        );
        Ok(RollupReport {
            job_id,
            as_of: now,
            weeks_back,
            first_week,
            tickets: tickets.len() as u64,
            tickets_missing_created: missing as u64,
            rows_written,
        })
    }

    // ── Reports ────────────────────────────────────────────────────

    /// Ad hoc report for `period`, computed from the live snapshot.
    pub async fn period_report(
        &self,
        period: &Period,
        filter: &TicketFilter,
        now: DateTime<Utc>,
    ) -> Result<PeriodReport> {
        let config = self.engine_config().await?;
        let (tickets, owners) = self.snapshot().await?;
        let window = period.window(now, config.timezone)?;
        Ok(metrics::period_report(
            &tickets,
            &owners,
            window,
            &period.to_key(),
            filter,
            &config.calendar(),
        ))
    }

    /// Week-by-week trend from the stored rollup.
    pub async fn weekly_trend(&self, filter: &TicketFilter) -> Result<Vec<TrendPoint>> {
        let (rows, owners) = self
            .db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>((
                    repository::load_weekly_metrics(conn)?,
                    repository::load_owners(conn)?,
                ))
            })
            .await?;
        Ok(metrics::weekly_trend(&rows, &owners, filter))
    }

    /// Business hours between two instants under the configured calendar.
    pub async fn business_hours(&self, start: DateTime<Utc>, end: DateTime<Utc>) -> Result<f64> {
        Ok(self.engine_config().await?.calendar().hours_between(start, end))
    }

    async fn snapshot(&self) -> Result<(Vec<Ticket>, Vec<Owner>)> {
        self.db
            .reader()
            .call(|conn| {
                Ok::<_, rusqlite::Error>((repository::load_tickets(conn)?, repository::load_owners(conn)?))
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn status(&self) -> Result<WarehouseStatus> {
        self.db
            .reader()
            .call(|conn| {
                let count = |table: &str| -> std::result::Result<u64, rusqlite::Error> {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get::<_, i64>(0)
                    })
                    .map(|n| n as u64)
                };
                Ok::<_, rusqlite::Error>(WarehouseStatus {
                    tickets: count("tickets_snapshot")?,
                    owners: count("owners")?,
                    weekly_rows: count("weekly_metrics")?,
                    last_import: repository::last_completed_job(conn, JOB_IMPORT)?,
                    last_rollup: repository::last_completed_job(conn, JOB_WEEKLY)?,
                })
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    // ── Config commands ────────────────────────────────────────────

    pub async fn config_get(&self, key: &str) -> Result<Option<String>> {
        self.db
            .reader()
            .call({
                let key = key.to_string();
                move |conn| repository::get_config(conn, &key)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    /// Store a config value. Engine keys are checked against the rest of
    /// the stored configuration before anything is written.
    pub async fn config_set(&self, key: &str, value: &str) -> Result<()> {
        let mut entries = self.config_list().await?;
        entries.retain(|(k, _)| k != key);
        entries.push((key.to_string(), value.to_string()));
        EngineConfig::from_entries(entries.iter().map(|(k, v)| (k.as_str(), v.as_str())))?;

        self.db
            .writer()
            .call({
                let key = key.to_string();
                let value = value.to_string();
                move |conn| repository::set_config(conn, &key, &value)
            })
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }

    pub async fn config_list(&self) -> Result<Vec<(String, String)>> {
        self.db
            .reader()
            .call(|conn| repository::list_config(conn))
            .await
            .map_err(|e| Error::Database(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn at(y: i32, m: u32, d: u32, h: u32, min: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, h, min, 0).unwrap()
    }

    async fn seeded() -> TicketDW {
        let db = Database::open_memory().await.unwrap();
        let tickets = vec![
            Ticket::new("1", Some(at(2025, 1, 6, 9, 0)))
                .with_category(Some("Billing"))
                .with_owner(Some("42"))
                .closed(Some(at(2025, 1, 6, 13, 0))),
            Ticket::new("2", Some(at(2025, 1, 7, 10, 0)))
                .with_category(Some("Access"))
                .with_owner(Some("42")),
            Ticket::new("3", Some(at(2025, 1, 14, 10, 0))).with_category(Some("Billing")),
        ];
        let owners = vec![Owner {
            owner_id: "42".into(),
            full_name: "Ada Byrne".into(),
            email: None,
        }];
        db.writer()
            .call(move |conn| {
                repository::replace_tickets(conn, &tickets)?;
                repository::replace_owners(conn, &owners)?;
                Ok::<(), rusqlite::Error>(())
            })
            .await
            .unwrap();
        TicketDW::new(db)
    }

    #[tokio::test]
    async fn test_engine_config_defaults_and_overrides() {
        let dw = TicketDW::new(Database::open_memory().await.unwrap());
        assert_eq!(dw.engine_config().await.unwrap(), EngineConfig::default());

        dw.config_set("weeks_back", "4").await.unwrap();
        dw.config_set("timezone", "America/New_York").await.unwrap();
        let config = dw.engine_config().await.unwrap();
        assert_eq!(config.weeks_back, 4);
        assert_eq!(config.timezone, chrono_tz::America::New_York);
    }

    #[tokio::test]
    async fn test_config_set_rejects_invalid_values() {
        let dw = TicketDW::new(Database::open_memory().await.unwrap());
        assert!(dw.config_set("timezone", "Mars/Olympus").await.is_err());
        assert!(dw.config_set("work_start", "18:00").await.is_err());
        assert_eq!(dw.config_get("work_start").await.unwrap(), None);

        // Widening the day in the right order is accepted.
        dw.config_set("work_end", "20:00").await.unwrap();
        dw.config_set("work_start", "18:00").await.unwrap();
    }

    #[tokio::test]
    async fn test_run_rollup_writes_rows_and_logs_job() {
        let dw = seeded().await;
        // Wednesday 2025-01-22; four weeks back starts Monday 2024-12-23.
        let report = dw.run_rollup(at(2025, 1, 22, 12, 0), Some(4)).await.unwrap();
        assert_eq!(report.weeks_back, 4);
        assert_eq!(report.tickets, 3);
        assert!(report.rows_written > 0);

        let status = dw.status().await.unwrap();
        assert_eq!(status.weekly_rows, report.rows_written);
        assert!(status.last_rollup.is_some());
        assert_eq!(status.last_import, None);

        let rerun = dw.run_rollup(at(2025, 1, 22, 12, 0), Some(4)).await.unwrap();
        assert_eq!(rerun.rows_written, report.rows_written);
        assert_eq!(dw.status().await.unwrap().weekly_rows, report.rows_written);
    }

    #[tokio::test]
    async fn test_rollup_rejects_out_of_range_weeks_back() {
        let dw = seeded().await;
        let err = dw.run_rollup(at(2025, 1, 22, 12, 0), Some(100_000_000)).await.unwrap_err();
        assert!(matches!(err, Error::Config(_)));
        assert!(dw.config_set("weeks_back", "100000000").await.is_err());

        let running: i64 = dw
            .db
            .reader()
            .call(|conn| conn.query_row("SELECT COUNT(*) FROM jobs", [], |r| r.get(0)))
            .await
            .unwrap();
        assert_eq!(running, 0);
    }

    #[tokio::test]
    async fn test_period_report_out_of_range_window() {
        let dw = seeded().await;
        let period = Period::parse("4000000000d").unwrap();
        let result = dw
            .period_report(&period, &TicketFilter::default(), at(2025, 1, 22, 12, 0))
            .await;
        assert!(matches!(result, Err(Error::PeriodParse(_))));
    }

    #[tokio::test]
    async fn test_rollup_uses_configured_weeks_back() {
        let dw = seeded().await;
        dw.config_set("weeks_back", "2").await.unwrap();
        let report = dw.run_rollup(at(2025, 1, 22, 12, 0), None).await.unwrap();
        assert_eq!(report.weeks_back, 2);
        assert_eq!(report.first_week, NaiveDate::from_ymd_opt(2025, 1, 6));
    }

    #[tokio::test]
    async fn test_period_report_from_snapshot() {
        let dw = seeded().await;
        let report = dw
            .period_report(
                &Period::Week(2025, 2),
                &TicketFilter::default(),
                at(2025, 1, 22, 12, 0),
            )
            .await
            .unwrap();
        assert_eq!(report.period_key, "2025-W02");
        assert_eq!(report.opened, 2);
        assert_eq!(report.closed, 1);
        assert_eq!(report.backlog, 1);
        assert_eq!(report.resolution.median, Some(4.0));
        assert_eq!(report.agents[0].owner_name, "Ada Byrne");
    }

    #[tokio::test]
    async fn test_weekly_trend_after_rollup() {
        let dw = seeded().await;
        dw.run_rollup(at(2025, 1, 22, 12, 0), Some(3)).await.unwrap();

        let trend = dw.weekly_trend(&TicketFilter::default()).await.unwrap();
        let opened: u64 = trend.iter().map(|p| p.opened).sum();
        assert_eq!(opened, 3);

        let filtered = dw
            .weekly_trend(&TicketFilter::new(Some("Access".into()), None))
            .await
            .unwrap();
        assert_eq!(filtered.iter().map(|p| p.opened).sum::<u64>(), 1);
    }

    #[tokio::test]
    async fn test_business_hours_uses_configured_day() {
        let dw = TicketDW::new(Database::open_memory().await.unwrap());
        let hours = dw
            .business_hours(at(2025, 1, 6, 8, 0), at(2025, 1, 6, 18, 0))
            .await
            .unwrap();
        assert_eq!(hours, 8.0);

        dw.config_set("work_end", "18:00").await.unwrap();
        let hours = dw
            .business_hours(at(2025, 1, 6, 8, 0), at(2025, 1, 6, 18, 0))
            .await
            .unwrap();
        assert_eq!(hours, 9.0);
    }

    #[tokio::test]
    async fn test_import_is_logged_for_status() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tickets.json");
        std::fs::write(&path, r#"{"results": [{"id": "9", "properties": {}}]}"#).unwrap();

        let dw = TicketDW::new(Database::open_memory().await.unwrap());
        let report = dw.import(&ImportOptions::new(&path)).await.unwrap();
        assert_eq!(report.tickets_loaded, 1);
        assert_eq!(report.tickets_missing_created, 1);

        let status = dw.status().await.unwrap();
        assert_eq!(status.tickets, 1);
        assert!(status.last_import.is_some());
    }
}
