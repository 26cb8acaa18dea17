//! One processing run: ingest every upload, merge, deduplicate, summarize, export.
//!
//! Each stage hands the next an owned snapshot (`Ingested`, `Unified`, then `Curated`), so a
//! later stage can be re-run with different settings without touching earlier results.

use anyhow::{bail, Context, Result};
use dedup::{Curated, DedupKeys};
use ingest::{merge_tables, parse_source, SourceFile};
use report_xlsx::ExportOptions;
use serde::Serialize;
use std::collections::HashMap;
use std::io::Write;
use time::format_description::well_known::Rfc3339;
use time::OffsetDateTime;
use tracing::{debug, info, warn};
use unify_core::Table;

/// Fingerprint and parse result for one upload.
#[derive(Debug, Clone, Serialize)]
pub struct SourceSummary {
    pub file: String,
    pub sha256: String,
    pub mime: Option<String>,
    pub size: usize,
    pub header_row: usize,
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Every upload parsed, one table per file in upload order.
#[derive(Debug, Clone)]
pub struct Ingested {
    pub sources: Vec<SourceSummary>,
    pub tables: Vec<Table>,
}

/// All uploads merged into one table.
#[derive(Debug, Clone)]
pub struct Unified {
    pub combined: Table,
}

pub fn ingest(files: &[SourceFile]) -> Result<Ingested> {
    if files.is_empty() {
        bail!("no input files: provide at least one .xlsx export");
    }
    let mut seen: HashMap<&str, &str> = HashMap::new();
    for f in files {
        if let Some(first) = seen.insert(f.sha256.as_str(), f.name.as_str()) {
            warn!(file = %f.name, same_as = first, sha256 = %f.sha256, "duplicate upload; rows will be merged twice");
        }
    }

    let mut sources = Vec::with_capacity(files.len());
    let mut tables = Vec::with_capacity(files.len());
    for f in files {
        let parsed = parse_source(f).with_context(|| format!("processing {}", f.name))?;
        sources.push(SourceSummary {
            file: f.name.clone(),
            sha256: f.sha256.clone(),
            mime: f.mime.clone(),
            size: f.size(),
            header_row: parsed.header_row,
            columns: parsed.table.column_names(),
            rows: parsed.table.height(),
        });
        tables.push(parsed.table);
    }
    Ok(Ingested { sources, tables })
}

pub fn merge(ingested: &Ingested) -> Unified {
    let combined = merge_tables(ingested.tables.clone());
    debug!(files = ingested.tables.len(), rows = combined.height(), columns = combined.width(), "merged uploads");
    Unified { combined }
}

pub fn curate(unified: &Unified, keys: &DedupKeys) -> Curated {
    dedup::unify(&unified.combined, keys)
}

#[derive(Debug, Clone, Serialize)]
pub struct SheetSummary {
    pub name: String,
    pub rows: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub files: usize,
    pub combined_rows: usize,
    pub header_rows: Vec<usize>,
    pub rows_after_dedup: usize,
    pub sheets: Vec<SheetSummary>,
    pub generated_at: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub csv: Option<String>,
}

impl RunSummary {
    pub fn to_text(&self) -> String {
        let mut out = format!(
            "files read: {} · combined rows: {} · headers detected: {:?}\n",
            self.files,
            report_xlsx::group_int(self.combined_rows as i64),
            self.header_rows
        );
        out.push_str(&format!("rows after dedup: {}\n", report_xlsx::group_int(self.rows_after_dedup as i64)));
        for s in &self.sheets {
            out.push_str(&format!("  {}: {} rows\n", s.name, s.rows));
        }
        if let Some(path) = &self.output {
            out.push_str(&format!("workbook: {path}\n"));
        }
        if let Some(path) = &self.csv {
            out.push_str(&format!("csv: {path}\n"));
        }
        out.push_str(&format!("generated at {}", self.generated_at));
        out
    }
}

/// Everything a finished run produced, still in memory.
pub struct RunOutput {
    pub workbook: Vec<u8>,
    pub base_clean: Table,
    pub summary: RunSummary,
}

pub fn run(
    files: &[SourceFile],
    keys: &DedupKeys,
    opts: &ExportOptions,
    generated_at: OffsetDateTime,
) -> Result<RunOutput> {
    let ingested = ingest(files)?;
    let unified = merge(&ingested);
    let curated = curate(&unified, keys);
    let base_clean = curated.base_clean.clone();
    let sheets = curated.into_sheets();
    let workbook = report_xlsx::export_workbook(&sheets, opts).context("writing workbook")?;

    let summary = RunSummary {
        files: files.len(),
        combined_rows: unified.combined.height(),
        header_rows: ingested.sources.iter().map(|s| s.header_row).collect(),
        rows_after_dedup: base_clean.height(),
        sheets: sheets
            .iter()
            .map(|(name, t)| SheetSummary { name: name.clone(), rows: t.height() })
            .collect(),
        generated_at: generated_at.format(&Rfc3339).unwrap_or_default(),
        output: None,
        csv: None,
    };
    info!(
        files = summary.files,
        combined_rows = summary.combined_rows,
        rows_after_dedup = summary.rows_after_dedup,
        sheets = summary.sheets.len(),
        "run complete"
    );
    Ok(RunOutput { workbook, base_clean, summary })
}

/// Write `table` as CSV with a header row; absent values are empty fields.
pub fn write_csv<W: Write>(table: &Table, writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(table.column_names())?;
    for row in table.rows() {
        wtr.write_record(row.iter().map(|c| c.to_string()))?;
    }
    wtr.flush()?;
    Ok(())
}
