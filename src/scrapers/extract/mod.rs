//! Page-level parsing shared by both engines: tables, pagination, download
//! links, data endpoints, script-rendering heuristics and exported files.

pub mod downloads;
pub mod endpoints;
pub mod files;
pub mod heuristics;
pub mod pagination;
pub mod tables;

pub use downloads::download_links;
pub use endpoints::{discover_endpoints, parse_json_rows};
pub use files::{parse_delimited, parse_export, parse_xlsx};
pub use heuristics::{page_has_data, requires_script};
pub use pagination::next_page_links;
pub use tables::{parse_best_table, parse_preferred_table};

use std::collections::HashSet;

use url::Url;

use crate::models::RawRow;

/// Headers and positional cells of one extracted table or file.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl ParsedTable {
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Pair every row with the headers. Blank rows are dropped.
    pub fn into_raw_rows(self) -> Vec<RawRow> {
        self.rows
            .iter()
            .map(|cells| RawRow::from_columns(&self.headers, cells))
            .filter(|row| !row.is_empty() && !row.is_blank())
            .collect()
    }
}

/// Rows accumulated across pages. A row already seen on an earlier page is
/// dropped; identical rows within one page are all kept.
#[derive(Debug, Default)]
pub struct RowSet {
    seen: HashSet<RawRow>,
    rows: Vec<RawRow>,
}

impl RowSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a page's rows; returns how many were not on an earlier page.
    pub fn absorb(&mut self, table: ParsedTable) -> usize {
        let fresh: Vec<RawRow> = table
            .into_raw_rows()
            .into_iter()
            .filter(|row| !self.seen.contains(row))
            .collect();
        self.seen.extend(fresh.iter().cloned());
        self.rows.extend_from_slice(&fresh);
        fresh.len()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn into_rows(self) -> Vec<RawRow> {
        self.rows
    }
}

/// Resolve `href` against the page it appeared on. Fragments, `javascript:`
/// and `mailto:` links resolve to nothing.
pub fn resolve_link(page_url: &str, href: &str) -> Option<String> {
    let href = href.trim();
    let lower = href.to_ascii_lowercase();
    if href.is_empty()
        || href.starts_with('#')
        || lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
    {
        return None;
    }
    let base = Url::parse(page_url).ok()?;
    let mut joined = base.join(href).ok()?;
    joined.set_fragment(None);
    Some(joined.to_string())
}

/// Drop repeated items, keeping first-seen order.
pub fn dedupe<T: Clone + Eq + std::hash::Hash>(items: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    items
        .into_iter()
        .filter(|item| seen.insert(item.clone()))
        .collect()
}
