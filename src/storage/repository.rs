use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::date_util::parse_instant;
use crate::metrics::WeeklyMetricRow;
use crate::ticket::{category_or_default, owner_or_default, Owner, Ticket};

// ── Tickets ────────────────────────────────────────────────────────

/// Replace the whole ticket snapshot in one transaction. A duplicate ticket
/// id fails the insert and leaves the previous snapshot in place.
pub fn replace_tickets(conn: &mut Connection, tickets: &[Ticket]) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    insert_tickets(&tx, tickets)?;
    tx.commit()?;
    Ok(tickets.len())
}

/// Replace tickets and, when given, owners in a single transaction, so a
/// failed owner insert also keeps the previous tickets.
pub fn replace_snapshot(
    conn: &mut Connection,
    tickets: &[Ticket],
    owners: Option<&[Owner]>,
) -> Result<(), rusqlite::Error> {
    let tx = conn.transaction()?;
    insert_tickets(&tx, tickets)?;
    if let Some(owners) = owners {
        insert_owners(&tx, owners)?;
    }
    tx.commit()
}

fn insert_tickets(conn: &Connection, tickets: &[Ticket]) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM tickets_snapshot", [])?;
    let mut stmt = conn.prepare(
        "INSERT INTO tickets_snapshot (
            ticket_id, subject, created_at, closed_at, updated_at,
            pipeline_id, stage_id, is_closed, category, owner_id
        ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
    )?;
    for t in tickets {
        stmt.execute(params![
            t.ticket_id,
            t.subject,
            t.created_at.map(instant_to_sql),
            t.closed_at.map(instant_to_sql),
            t.updated_at.map(instant_to_sql),
            t.pipeline_id,
            t.stage_id,
            t.is_closed,
            t.category,
            t.owner_id,
        ])?;
    }
    Ok(())
}

/// Load the full ticket snapshot. Unparseable timestamps load as unknown;
/// missing labels load as the sentinel values.
pub fn load_tickets(conn: &Connection) -> Result<Vec<Ticket>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT ticket_id, subject, created_at, closed_at, updated_at,
                pipeline_id, stage_id, is_closed, category, owner_id
         FROM tickets_snapshot ORDER BY ticket_id",
    )?;
    let rows = stmt.query_map([], ticket_from_row)?;
    rows.collect()
}

fn ticket_from_row(row: &Row<'_>) -> Result<Ticket, rusqlite::Error> {
    let category: Option<String> = row.get(8)?;
    let owner_id: Option<String> = row.get(9)?;
    Ok(Ticket {
        ticket_id: row.get(0)?,
        subject: row.get(1)?,
        created_at: instant_from_sql(row.get(2)?),
        closed_at: instant_from_sql(row.get(3)?),
        updated_at: instant_from_sql(row.get(4)?),
        pipeline_id: row.get(5)?,
        stage_id: row.get(6)?,
        is_closed: row.get(7)?,
        category: category_or_default(category.as_deref()),
        owner_id: owner_or_default(owner_id.as_deref()),
    })
}

// ── Owners ─────────────────────────────────────────────────────────

pub fn replace_owners(conn: &mut Connection, owners: &[Owner]) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    insert_owners(&tx, owners)?;
    tx.commit()?;
    Ok(owners.len())
}

fn insert_owners(conn: &Connection, owners: &[Owner]) -> Result<(), rusqlite::Error> {
    conn.execute("DELETE FROM owners", [])?;
    let mut stmt = conn.prepare("INSERT INTO owners (owner_id, full_name, email) VALUES (?1, ?2, ?3)")?;
    for o in owners {
        stmt.execute(params![o.owner_id, o.full_name, o.email])?;
    }
    Ok(())
}

pub fn load_owners(conn: &Connection) -> Result<Vec<Owner>, rusqlite::Error> {
    let mut stmt =
        conn.prepare("SELECT owner_id, full_name, email FROM owners ORDER BY full_name, owner_id")?;
    let rows = stmt.query_map([], |row| {
        Ok(Owner {
            owner_id: row.get(0)?,
            full_name: row.get(1)?,
            email: row.get(2)?,
        })
    })?;
    rows.collect()
}

// ── Weekly metrics ─────────────────────────────────────────────────

/// Truncate `weekly_metrics` and insert `rows`, all in one transaction so
/// readers never observe a partially rebuilt table.
pub fn replace_weekly_metrics(
    conn: &mut Connection,
    rows: &[WeeklyMetricRow],
) -> Result<usize, rusqlite::Error> {
    let tx = conn.transaction()?;
    tx.execute("DELETE FROM weekly_metrics", [])?;
    {
        let mut stmt = tx.prepare(
            "INSERT INTO weekly_metrics (
                week_start, category, owner_id,
                opened_count, closed_count, backlog_end_count,
                median_bh_close_hours, p90_bh_close_hours
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )?;
        for r in rows {
            stmt.execute(params![
                r.week_start.format("%Y-%m-%d").to_string(),
                r.category,
                r.owner_id,
                r.opened_count as i64,
                r.closed_count as i64,
                r.backlog_end_count as i64,
                r.median_bh_close_hours,
                r.p90_bh_close_hours,
            ])?;
        }
    }
    tx.commit()?;
    Ok(rows.len())
}

pub fn load_weekly_metrics(conn: &Connection) -> Result<Vec<WeeklyMetricRow>, rusqlite::Error> {
    let mut stmt = conn.prepare(
        "SELECT week_start, category, owner_id,
                opened_count, closed_count, backlog_end_count,
                median_bh_close_hours, p90_bh_close_hours
         FROM weekly_metrics
         ORDER BY week_start, category, owner_id",
    )?;
    let rows = stmt.query_map([], |row| {
        let week_start: String = row.get(0)?;
        let week_start = NaiveDate::parse_from_str(&week_start, "%Y-%m-%d")
            .map_err(|e| rusqlite::Error::FromSqlConversionFailure(0, Type::Text, Box::new(e)))?;
        Ok(WeeklyMetricRow {
            week_start,
            category: row.get(1)?,
            owner_id: row.get(2)?,
            opened_count: row.get::<_, i64>(3)? as u64,
            closed_count: row.get::<_, i64>(4)? as u64,
            backlog_end_count: row.get::<_, i64>(5)? as u64,
            median_bh_close_hours: row.get(6)?,
            p90_bh_close_hours: row.get(7)?,
        })
    })?;
    rows.collect()
}

// ── Config ─────────────────────────────────────────────────────────

pub fn get_config(conn: &Connection, key: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT value FROM app_config WHERE key = ?1",
        params![key],
        |row| row.get(0),
    )
    .optional()
}

pub fn set_config(conn: &Connection, key: &str, value: &str) -> Result<(), rusqlite::Error> {
    conn.execute(
        "INSERT OR REPLACE INTO app_config (key, value, updated_at)
         VALUES (?1, ?2, datetime('now'))",
        params![key, value],
    )?;
    Ok(())
}

pub fn list_config(conn: &Connection) -> Result<Vec<(String, String)>, rusqlite::Error> {
    let mut stmt = conn.prepare("SELECT key, value FROM app_config ORDER BY key")?;
    let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
    rows.collect()
}

// ── Rollup Jobs ────────────────────────────────────────────────────

pub fn insert_job(
    conn: &Connection,
    job_type: &str,
    as_of: Option<DateTime<Utc>>,
    weeks_back: Option<u32>,
) -> Result<i64, rusqlite::Error> {
    conn.execute(
        "INSERT INTO jobs (job_type, status, started_at, as_of, weeks_back)
         VALUES (?1, 'running', datetime('now'), ?2, ?3)",
        params![job_type, as_of.map(instant_to_sql), weeks_back],
    )?;
    Ok(conn.last_insert_rowid())
}

pub fn update_job(
    conn: &Connection,
    job_id: i64,
    status: &str,
    rows_written: u64,
    error_message: Option<&str>,
) -> Result<(), rusqlite::Error> {
    conn.execute(
        "UPDATE jobs SET
            status = ?2, completed_at = datetime('now'),
            rows_written = ?3, error_message = ?4
         WHERE id = ?1",
        params![job_id, status, rows_written as i64, error_message],
    )?;
    Ok(())
}

/// Completion time of the most recent successful job of `job_type`.
pub fn last_completed_job(conn: &Connection, job_type: &str) -> Result<Option<String>, rusqlite::Error> {
    conn.query_row(
        "SELECT MAX(completed_at) FROM jobs WHERE job_type = ?1 AND status = 'completed'",
        params![job_type],
        |row| row.get(0),
    )
}

// ── Helpers ────────────────────────────────────────────────────────

fn instant_to_sql(instant: DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn instant_from_sql(value: Option<String>) -> Option<DateTime<Utc>> {
    value.as_deref().and_then(parse_instant)
}
