//! Ingestion of endpoint inventory exports: read the first worksheet, find the header
//! row, normalize the records and merge several uploads into one table.

pub mod dates;
mod error;
pub mod locate;
pub mod merge;
pub mod parse;
pub mod source;

pub use error::IngestError;
pub use locate::{find_header, locate_header, FALLBACK_HEADER_ROW, MARKER_COLUMNS};
pub use merge::merge_tables;
pub use parse::{first_ipv4, first_ipv6, parse_records, title_case};
pub use source::{read_first_sheet, RawTable, SourceFile};

use tracing::info;
use unify_core::Table;

/// One upload after parsing.
#[derive(Debug, Clone)]
pub struct ParsedSource {
    pub name: String,
    pub sha256: String,
    pub header_row: usize,
    pub table: Table,
}

/// Read, locate and parse one source file.
pub fn parse_source(source: &SourceFile) -> Result<ParsedSource, IngestError> {
    let raw = read_first_sheet(source)?;
    let header_row = locate_header(&raw);
    let table = parse_records(&raw, header_row)?;
    info!(
        file = %source.name,
        header_row,
        rows = table.height(),
        columns = table.width(),
        "parsed export"
    );
    Ok(ParsedSource {
        name: source.name.clone(),
        sha256: source.sha256.clone(),
        header_row,
        table,
    })
}
