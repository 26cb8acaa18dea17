//! Recency-based deduplication of the unified endpoint table and the derived report views.

mod summary;

pub use summary::{failure_subset, summarize, FAILURE_MARKERS};

use std::cmp::Ordering;
use std::collections::HashSet;
use tracing::debug;
use unify_core::columns::{
    ENDPOINT_ALIAS, ENDPOINT_NAME, ENDPOINT_STATUS, OPERATING_SYSTEM, RECENCY,
};
use unify_core::{Cell, Table};

pub const SHEET_BASE: &str = "Base_Limpa";
pub const SHEET_STATUS: &str = "Resumo_Status";
pub const SHEET_OS: &str = "Resumo_OS";
pub const SHEET_FAILURES: &str = "Falhas_Upgrade";

/// Identity columns for deduplication, cleaned of blanks and repeats.
///
/// Names are not checked against any table here: a key list that does not fit the table
/// makes [`deduplicate`] fall back to whole-row comparison instead of failing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DedupKeys(Vec<String>);

impl DedupKeys {
    pub fn new<S: AsRef<str>>(names: impl IntoIterator<Item = S>) -> Self {
        let mut out: Vec<String> = Vec::new();
        for name in names {
            let n = name.as_ref().trim();
            if !n.is_empty() && !out.iter().any(|o| o == n) {
                out.push(n.to_string());
            }
        }
        DedupKeys(out)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Column positions of every key, or `None` when any key is missing.
    fn positions(&self, table: &Table) -> Option<Vec<usize>> {
        if self.0.is_empty() {
            return None;
        }
        self.0.iter().map(|k| table.position(k)).collect()
    }
}

impl Default for DedupKeys {
    fn default() -> Self {
        DedupKeys::new([ENDPOINT_NAME, ENDPOINT_ALIAS])
    }
}

/// Rows ordered newest first by `last_seen`, then `last_upgrade_status_time`. Rows without
/// a timestamp go after rows with one; equal rows keep their relative order.
pub fn sort_by_recency(table: &Table) -> Table {
    let cols: Vec<usize> = RECENCY.iter().filter_map(|c| table.position(c)).collect();
    if cols.is_empty() {
        return table.clone();
    }
    let rows = table.rows();
    let mut order: Vec<usize> = (0..rows.len()).collect();
    order.sort_by(|&a, &b| recency_cmp(&rows[a], &rows[b], &cols));
    table.select_rows(&order)
}

fn recency_cmp(a: &[Cell], b: &[Cell], cols: &[usize]) -> Ordering {
    for &c in cols {
        let ord = match (a[c].as_datetime(), b[c].as_datetime()) {
            (Some(x), Some(y)) => y.cmp(&x),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        };
        if ord != Ordering::Equal {
            return ord;
        }
    }
    Ordering::Equal
}

/// Keep one row per identity, the most recent one. When the key columns are not all
/// present, only exact duplicate rows are removed.
pub fn deduplicate(table: &Table, keys: &DedupKeys) -> Table {
    match keys.positions(table) {
        Some(key_cols) => {
            let sorted = sort_by_recency(table);
            let mut seen: HashSet<Vec<Cell>> = HashSet::new();
            let keep: Vec<usize> = sorted
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| seen.insert(key_cols.iter().map(|&c| row[c].clone()).collect()))
                .map(|(i, _)| i)
                .collect();
            debug!(keys = ?keys.as_slice(), before = table.height(), after = keep.len(), "deduplicated by key");
            sorted.select_rows(&keep)
        }
        None => {
            let mut seen: HashSet<&[Cell]> = HashSet::new();
            let keep: Vec<usize> = table
                .rows()
                .iter()
                .enumerate()
                .filter(|(_, row)| seen.insert(row.as_slice()))
                .map(|(i, _)| i)
                .collect();
            debug!(keys = ?keys.as_slice(), before = table.height(), after = keep.len(), "key columns missing; deduplicated whole rows");
            table.select_rows(&keep)
        }
    }
}

/// Output of one unify run: the clean base plus whichever views its columns allow.
#[derive(Debug, Clone, PartialEq)]
pub struct Curated {
    pub base_clean: Table,
    pub status_summary: Option<Table>,
    pub os_summary: Option<Table>,
    pub failures: Option<Table>,
}

impl Curated {
    /// Sheets in report order. Optional views are left out when they hold no rows.
    pub fn into_sheets(self) -> Vec<(String, Table)> {
        let mut sheets = vec![(SHEET_BASE.to_string(), self.base_clean)];
        let optional = [
            (SHEET_STATUS, self.status_summary),
            (SHEET_OS, self.os_summary),
            (SHEET_FAILURES, self.failures),
        ];
        for (name, table) in optional {
            if let Some(t) = table.filter(|t| !t.is_empty()) {
                sheets.push((name.to_string(), t));
            }
        }
        sheets
    }
}

/// Deduplicate `table` and derive the status, OS and upgrade-failure views.
pub fn unify(table: &Table, keys: &DedupKeys) -> Curated {
    let base_clean = deduplicate(table, keys);
    let status_summary = summarize(&base_clean, ENDPOINT_STATUS);
    let os_summary = summarize(&base_clean, OPERATING_SYSTEM);
    let failures = Some(failure_subset(&base_clean)).filter(|t| t.height() > 0);
    Curated { base_clean, status_summary, os_summary, failures }
}
