use chrono::{DateTime, Utc};
use serde::Serialize;

pub const UNCATEGORISED: &str = "Uncategorised";
pub const UNASSIGNED: &str = "Unassigned";

/// One support ticket as captured in the latest snapshot.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Ticket {
    pub ticket_id: String,
    pub subject: Option<String>,
    /// Unknown creation time excludes the ticket from every cohort.
    pub created_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub pipeline_id: Option<String>,
    pub stage_id: Option<String>,
    /// Current lifecycle state, independent of whether `closed_at` is set.
    pub is_closed: bool,
    pub category: String,
    pub owner_id: String,
}

impl Ticket {
    /// A ticket with only the fields the engine reads.
    pub fn new(ticket_id: impl Into<String>, created_at: Option<DateTime<Utc>>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            subject: None,
            created_at,
            closed_at: None,
            updated_at: None,
            pipeline_id: None,
            stage_id: None,
            is_closed: false,
            category: UNCATEGORISED.to_string(),
            owner_id: UNASSIGNED.to_string(),
        }
    }

    pub fn with_category(mut self, category: Option<&str>) -> Self {
        self.category = category_or_default(category);
        self
    }

    pub fn with_owner(mut self, owner_id: Option<&str>) -> Self {
        self.owner_id = owner_or_default(owner_id);
        self
    }

    pub fn closed(mut self, closed_at: Option<DateTime<Utc>>) -> Self {
        self.is_closed = true;
        self.closed_at = closed_at;
        self
    }

    pub fn with_updated_at(mut self, updated_at: Option<DateTime<Utc>>) -> Self {
        self.updated_at = updated_at;
        self
    }

    /// The close time used for classification.
    ///
    /// `closed_at` when recorded, otherwise `updated_at` as a proxy. Only a
    /// currently closed ticket has one: a reopened ticket with a stale
    /// `closed_at` returns `None`.
    pub fn effective_close_at(&self) -> Option<DateTime<Utc>> {
        if !self.is_closed {
            return None;
        }
        self.closed_at.or(self.updated_at)
    }
}

/// An agent who can own tickets.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Owner {
    pub owner_id: String,
    pub full_name: String,
    pub email: Option<String>,
}

pub fn category_or_default(category: Option<&str>) -> String {
    non_blank(category).unwrap_or(UNCATEGORISED).to_string()
}

pub fn owner_or_default(owner_id: Option<&str>) -> String {
    non_blank(owner_id).unwrap_or(UNASSIGNED).to_string()
}

fn non_blank(s: Option<&str>) -> Option<&str> {
    s.map(str::trim).filter(|s| !s.is_empty())
}
