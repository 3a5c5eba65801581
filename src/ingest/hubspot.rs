//! Mapping of HubSpot CRM export JSON onto the ticket model.
//!
//! Exports may be a single page (`{"results": [...]}`), a bare array of
//! records, or an array of pages as written by a paginating fetcher. Any
//! other shape is an import error, never an empty export.

use std::collections::{HashMap, HashSet};

use serde::Deserialize;
use serde_json::Value;

use crate::date_util::parse_instant;
use crate::error::{Error, Result};
use crate::ticket::{category_or_default, owner_or_default, Owner, Ticket};

pub const PROP_SUBJECT: &str = "subject";
pub const PROP_CREATED: &str = "createdate";
pub const PROP_CLOSED: &str = "closedate";
pub const PROP_PIPELINE: &str = "hs_pipeline";
pub const PROP_STAGE: &str = "hs_pipeline_stage";
pub const PROP_OWNER: &str = "hubspot_owner_id";
pub const PROP_UPDATED: &str = "hs_lastmodifieddate";
pub const DEFAULT_CATEGORY_PROP: &str = "hs_ticket_category";

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawId {
    Text(String),
    Number(i64),
}

impl RawId {
    fn into_string(self) -> String {
        match self {
            RawId::Text(s) => s,
            RawId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Page<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum Export<T> {
    Page(Page<T>),
    // Before `List`: a page must not be mistaken for a record.
    Pages(Vec<Page<T>>),
    List(Vec<T>),
}

impl<T> Export<T> {
    fn into_records(self) -> Vec<T> {
        match self {
            Export::Page(p) => p.results,
            Export::Pages(pages) => pages.into_iter().flat_map(|p| p.results).collect(),
            Export::List(v) => v,
        }
    }
}

#[derive(Debug, Deserialize)]
struct TicketRecord {
    id: RawId,
    #[serde(default)]
    properties: HashMap<String, Value>,
}

impl TicketRecord {
    fn prop(&self, name: &str) -> Option<String> {
        match self.properties.get(name)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }
}

#[derive(Debug, Deserialize)]
struct Pipeline {
    stages: Vec<Stage>,
}

#[derive(Debug, Deserialize)]
struct Stage {
    id: RawId,
    #[serde(default)]
    metadata: Option<HashMap<String, Value>>,
}

impl Stage {
    fn is_closed(&self) -> bool {
        match self.metadata.as_ref().and_then(|m| m.get("isClosed")) {
            Some(Value::Bool(b)) => *b,
            Some(Value::String(s)) => s.eq_ignore_ascii_case("true"),
            _ => false,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct OwnerRecord {
    id: RawId,
    #[serde(default)]
    first_name: Option<String>,
    #[serde(default)]
    last_name: Option<String>,
    #[serde(default)]
    email: Option<String>,
}

fn parse_export<T: serde::de::DeserializeOwned>(source_name: &str, json: &str) -> Result<Vec<T>> {
    serde_json::from_str::<Export<T>>(json)
        .map(Export::into_records)
        .map_err(|e| Error::Import {
            source_name: source_name.to_string(),
            message: e.to_string(),
        })
}

/// Ids of every pipeline stage flagged as closed.
pub fn parse_closed_stages(json: &str) -> Result<HashSet<String>> {
    let pipelines: Vec<Pipeline> = parse_export("pipelines", json)?;
    Ok(pipelines
        .into_iter()
        .flat_map(|p| p.stages)
        .filter(Stage::is_closed)
        .map(|s| s.id.into_string())
        .collect())
}

/// Map exported ticket records onto [`Ticket`]s.
///
/// A ticket is closed when its stage is one of `closed_stages`. Timestamps
/// that do not parse become unknown; absent owner and category become the
/// sentinel labels.
pub fn parse_tickets(
    json: &str,
    closed_stages: &HashSet<String>,
    category_property: &str,
) -> Result<Vec<Ticket>> {
    let records: Vec<TicketRecord> = parse_export("tickets", json)?;
    Ok(records
        .into_iter()
        .map(|r| {
            let stage_id = r.prop(PROP_STAGE);
            let is_closed = stage_id.as_ref().is_some_and(|s| closed_stages.contains(s));
            Ticket {
                subject: r.prop(PROP_SUBJECT),
                created_at: r.prop(PROP_CREATED).as_deref().and_then(parse_instant),
                closed_at: r.prop(PROP_CLOSED).as_deref().and_then(parse_instant),
                updated_at: r.prop(PROP_UPDATED).as_deref().and_then(parse_instant),
                pipeline_id: r.prop(PROP_PIPELINE),
                is_closed,
                category: category_or_default(r.prop(category_property).as_deref()),
                owner_id: owner_or_default(r.prop(PROP_OWNER).as_deref()),
                stage_id,
                ticket_id: r.id.into_string(),
            }
        })
        .collect())
}

pub fn parse_owners(json: &str) -> Result<Vec<Owner>> {
    let records: Vec<OwnerRecord> = parse_export("owners", json)?;
    Ok(records
        .into_iter()
        .map(|o| {
            let full_name = format!(
                "{} {}",
                o.first_name.unwrap_or_default(),
                o.last_name.unwrap_or_default()
            )
            .trim()
            .to_string();
            Owner {
                owner_id: o.id.into_string(),
                full_name,
                email: o.email,
            }
        })
        .collect())
}
