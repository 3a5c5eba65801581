pub mod hubspot;

use std::collections::HashSet;
use std::path::{Path, PathBuf};

use serde::Serialize;

use crate::error::{Error, Result};
use crate::metrics::classify::count_missing_created;
use crate::storage::repository;
use crate::storage::Database;
use crate::ticket::{Owner, Ticket};

/// Export files for one snapshot import.
#[derive(Debug, Clone)]
pub struct ImportOptions {
    pub tickets_path: PathBuf,
    pub pipelines_path: Option<PathBuf>,
    pub owners_path: Option<PathBuf>,
    pub category_property: String,
}

impl ImportOptions {
    pub fn new(tickets_path: impl Into<PathBuf>) -> Self {
        Self {
            tickets_path: tickets_path.into(),
            pipelines_path: None,
            owners_path: None,
            category_property: hubspot::DEFAULT_CATEGORY_PROP.to_string(),
        }
    }
}

/// Report returned after an import completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ImportReport {
    pub tickets_loaded: u64,
    pub tickets_closed: u64,
    pub tickets_missing_created: u64,
    pub owners_loaded: Option<u64>,
    pub closed_stages: u64,
}

impl ImportReport {
    fn from_snapshot(tickets: &[Ticket], owners: Option<&[Owner]>, closed_stages: usize) -> Self {
        Self {
            tickets_loaded: tickets.len() as u64,
            tickets_closed: tickets.iter().filter(|t| t.is_closed).count() as u64,
            tickets_missing_created: count_missing_created(tickets) as u64,
            owners_loaded: owners.map(|o| o.len() as u64),
            closed_stages: closed_stages as u64,
        }
    }
}

fn read_source(path: &Path) -> Result<String> {
    std::fs::read_to_string(path).map_err(|e| Error::Import {
        source_name: path.display().to_string(),
        message: e.to_string(),
    })
}

/// Parse the export files and replace the stored snapshot.
///
/// Tickets are always replaced, in the same transaction as the owners. Owners are replaced only when an owners file
/// is given; otherwise the stored owner table is left as it was. Without a
/// pipelines file no stage counts as closed.
pub async fn import_snapshot(db: &Database, options: &ImportOptions) -> Result<ImportReport> {
    let closed_stages = match &options.pipelines_path {
        Some(path) => hubspot::parse_closed_stages(&read_source(path)?)?,
        None => {
            log::warn!("No pipelines export given; every ticket will be treated as open");
            HashSet::new()
        }
    };

    let tickets = hubspot::parse_tickets(
        &read_source(&options.tickets_path)?,
        &closed_stages,
        &options.category_property,
    )?;
    let owners = match &options.owners_path {
        Some(path) => Some(hubspot::parse_owners(&read_source(path)?)?),
        None => None,
    };

    let report = ImportReport::from_snapshot(&tickets, owners.as_deref(), closed_stages.len());
    if report.tickets_missing_created > 0 {
        log::warn!(
            "{} of {} tickets have no created timestamp and will not count as opened",
            report.tickets_missing_created,
            report.tickets_loaded
        );
    }

    db.writer()
        .call(move |conn| repository::replace_snapshot(conn, &tickets, owners.as_deref()))
        .await?;

    log::info!(
        "Imported {} tickets ({} closed), {} owners",
        report.tickets_loaded,
        report.tickets_closed,
        report
            .owners_loaded
            .map_or_else(|| "unchanged".to_string(), |n| n.to_string())
    );
    Ok(report)
}
