//! On-disk shape of a checkpoint document
//!
//! ```json
//! {
//!   "graph_data": { "<title>": { "name": "...", "links_to": [], "linked_by": [] } },
//!   "metadata": { "visited": [], "to_visit": [], "dead_letter": [],
//!                 "last_save": "...", "total_pages": 0, "config_hash": "..." }
//! }
//! ```
//!
//! A document without a `graph_data` key is read as a bare title-to-record
//! map, which is how graph-only checkpoints were written.

use crate::graph::{GraphStore, PageRecord};
use crate::state::CrawlState;
use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

const GRAPH_KEY: &str = "graph_data";
const METADATA_KEY: &str = "metadata";

#[derive(Debug, Serialize)]
pub(crate) struct DocumentRef<'a> {
    graph_data: &'a BTreeMap<String, PageRecord>,
    metadata: Metadata,
}

#[derive(Debug, Default, Serialize, Deserialize)]
pub(crate) struct Metadata {
    #[serde(default)]
    visited: Vec<String>,
    #[serde(default)]
    to_visit: Vec<String>,
    #[serde(default)]
    dead_letter: Vec<String>,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    last_save: Option<DateTime<Utc>>,
    #[serde(default)]
    total_pages: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    config_hash: Option<String>,
}

impl<'a> DocumentRef<'a> {
    pub(crate) fn new(graph: &'a GraphStore, state: &CrawlState, saved_at: DateTime<Utc>) -> Self {
        Self {
            graph_data: graph.pages(),
            metadata: Metadata {
                visited: state.visited.iter().cloned().collect(),
                to_visit: state.to_visit.clone(),
                dead_letter: state.dead_letter.clone(),
                last_save: Some(saved_at),
                total_pages: graph.size(),
                config_hash: state.config_hash.clone(),
            },
        }
    }
}

/// Decodes a checkpoint document into a graph and crawl state
///
/// The result is not reconciled; callers decide when to restore invariants.
pub(crate) fn decode(bytes: &[u8]) -> serde_json::Result<(GraphStore, CrawlState)> {
    let mut value: Value = serde_json::from_slice(bytes)?;

    let sections = value
        .as_object_mut()
        .and_then(|object| object.remove(GRAPH_KEY).map(|graph| (graph, object.remove(METADATA_KEY))));

    let (pages, metadata): (BTreeMap<String, PageRecord>, Metadata) = match sections {
        Some((graph, metadata)) => {
            let pages = serde_json::from_value(graph)?;
            let metadata = match metadata {
                Some(metadata) => serde_json::from_value(metadata)?,
                None => Metadata::default(),
            };
            (pages, metadata)
        }
        None => (serde_json::from_value(value)?, Metadata::default()),
    };

    let state = CrawlState {
        visited: metadata.visited.into_iter().collect(),
        to_visit: metadata.to_visit,
        dead_letter: metadata.dead_letter,
        last_save: metadata.last_save,
        config_hash: metadata.config_hash,
    };

    Ok((GraphStore::from_pages(pages), state))
}

/// Accepts RFC 3339 strings or unix seconds; anything else reads as unset
fn lenient_timestamp<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::String(text)) => DateTime::parse_from_rfc3339(&text)
            .ok()
            .map(|dt| dt.with_timezone(&Utc)),
        Some(Value::Number(number)) => number
            .as_f64()
            .and_then(|secs| Utc.timestamp_opt(secs.trunc() as i64, 0).single()),
        _ => None,
    })
}
