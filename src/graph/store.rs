use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// A single wiki page in the link graph
///
/// Field names on the wire match the checkpoint document consumed by the
/// vault converter and graph renderer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageRecord {
    /// Page title, identical to the key the record is stored under
    #[serde(default)]
    pub name: String,

    /// Titles this page links to, as returned by the last fetch
    #[serde(rename = "links_to", default)]
    pub outbound_links: Vec<String>,

    /// Titles known to link to this page
    #[serde(rename = "linked_by", default)]
    pub inbound_links: BTreeSet<String>,
}

impl PageRecord {
    /// Creates an empty record for `title`
    pub fn new(title: &str) -> Self {
        Self {
            name: title.to_string(),
            outbound_links: Vec::new(),
            inbound_links: BTreeSet::new(),
        }
    }
}

/// In-memory mapping of page title to [`PageRecord`]
///
/// Records are created lazily and never removed. Every update through
/// [`GraphStore::set_outbound_links`] keeps the inbound side consistent:
/// if `B` is in `A.outbound_links` then `A` is in `B.inbound_links`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GraphStore {
    pages: BTreeMap<String, PageRecord>,
}

impl GraphStore {
    /// Creates an empty graph
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a store from decoded records
    ///
    /// Records with a missing `name` take their key. Inbound edges implied by
    /// outbound lists but absent from the decoded data (a document cut short
    /// by recovery, for example) are restored so the store starts consistent.
    pub fn from_pages(pages: BTreeMap<String, PageRecord>) -> Self {
        let mut store = Self { pages };

        for (title, record) in store.pages.iter_mut() {
            if record.name.is_empty() {
                record.name = title.clone();
            }
        }

        let edges: Vec<(String, String)> = store
            .pages
            .iter()
            .flat_map(|(title, record)| {
                record
                    .outbound_links
                    .iter()
                    .map(move |link| (title.clone(), link.clone()))
            })
            .collect();

        for (from, to) in edges {
            store.add_inbound(&to, &from);
        }

        store
    }

    /// Creates an empty record for `title` if none exists
    pub fn ensure(&mut self, title: &str) {
        if !self.pages.contains_key(title) {
            self.pages.insert(title.to_string(), PageRecord::new(title));
        }
    }

    /// Replaces the outbound links of `title` and records the reverse edges
    ///
    /// Inbound edges from earlier fetches are never removed, so a link that
    /// disappears on a re-crawl leaves a stale `linked_by` entry behind.
    pub fn set_outbound_links(&mut self, title: &str, links: Vec<String>) {
        for link in &links {
            self.add_inbound(link, title);
        }

        self.ensure(title);
        if let Some(record) = self.pages.get_mut(title) {
            record.outbound_links = links;
        }
    }

    fn add_inbound(&mut self, target: &str, source: &str) {
        self.ensure(target);
        if let Some(record) = self.pages.get_mut(target) {
            record.inbound_links.insert(source.to_string());
        }
    }

    /// Number of records in the graph
    pub fn size(&self) -> usize {
        self.pages.len()
    }

    /// Returns true if the graph has no records
    pub fn is_empty(&self) -> bool {
        self.pages.is_empty()
    }

    /// Returns true if a record exists for `title`
    pub fn contains(&self, title: &str) -> bool {
        self.pages.contains_key(title)
    }

    /// Gets the record for `title`
    pub fn get(&self, title: &str) -> Option<&PageRecord> {
        self.pages.get(title)
    }

    /// Total number of outbound edges across all records
    pub fn edge_count(&self) -> usize {
        self.pages.values().map(|r| r.outbound_links.len()).sum()
    }

    /// All records in title order (for persistence)
    pub fn pages(&self) -> &BTreeMap<String, PageRecord> {
        &self.pages
    }
}
