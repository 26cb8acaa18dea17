//! Uploaded files: fingerprinting, content sniffing and reading the first worksheet into
//! a raw, headerless grid.

use crate::{dates, IngestError};
use calamine::{open_workbook_auto_from_rs, Data, Range, Reader};
use sha2::{Digest, Sha256};
use std::io::Cursor;
use std::path::Path;
use unify_core::Cell;

/// Cell text that reads as a missing value, as spreadsheet exports commonly write it.
const NA_TOKENS: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

const MAX_EXACT_INT: f64 = 9_007_199_254_740_992.0;

/// One uploaded workbook held in memory.
#[derive(Debug, Clone)]
pub struct SourceFile {
    pub name: String,
    pub bytes: Vec<u8>,
    pub sha256: String,
    pub mime: Option<String>,
}

impl SourceFile {
    pub fn from_bytes(name: impl Into<String>, bytes: Vec<u8>) -> Self {
        let sha256 = hex::encode(Sha256::digest(&bytes));
        let mime = infer::get(&bytes).map(|t| t.mime_type().to_string());
        SourceFile { name: name.into(), bytes, sha256, mime }
    }

    pub fn read(path: &Path) -> Result<Self, IngestError> {
        let name = path.to_string_lossy().to_string();
        let bytes = std::fs::read(path).map_err(|source| IngestError::Io { file: name.clone(), source })?;
        Ok(SourceFile::from_bytes(name, bytes))
    }

    pub fn size(&self) -> usize {
        self.bytes.len()
    }

    /// Reject content that is not a ZIP/OOXML container before handing it to the reader.
    pub fn ensure_workbook(&self) -> Result<(), IngestError> {
        match self.mime.as_deref() {
            Some(m) if m == "application/zip" || m.ends_with("spreadsheetml.sheet") => Ok(()),
            other => Err(IngestError::UnsupportedContent {
                file: self.name.clone(),
                detected: other.unwrap_or("unknown").to_string(),
            }),
        }
    }
}

/// Headerless grid read straight from a worksheet. Row 0 is the first worksheet row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    rows: Vec<Vec<Cell>>,
    width: usize,
}

impl RawTable {
    /// Build from possibly ragged rows; short rows are padded with empty cells.
    pub fn new(rows: Vec<Vec<Cell>>) -> Self {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0);
        let rows = rows
            .into_iter()
            .map(|mut r| {
                r.resize(width, Cell::Empty);
                r
            })
            .collect();
        RawTable { rows, width }
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn row(&self, index: usize) -> Option<&[Cell]> {
        self.rows.get(index).map(Vec::as_slice)
    }
}

/// Read the first worksheet of `source`.
pub fn read_first_sheet(source: &SourceFile) -> Result<RawTable, IngestError> {
    source.ensure_workbook()?;
    let mut wb = open_workbook_auto_from_rs(Cursor::new(source.bytes.as_slice()))
        .map_err(|e| IngestError::Open { file: source.name.clone(), source: e })?;
    let range = wb
        .worksheet_range_at(0)
        .ok_or_else(|| IngestError::NoWorksheet(source.name.clone()))?
        .map_err(|e| IngestError::Open { file: source.name.clone(), source: e })?;
    Ok(range_to_raw(&range))
}

// calamine ranges start at the first used cell; pad back to A1 so row offsets match the
// worksheet.
fn range_to_raw(range: &Range<Data>) -> RawTable {
    let (row0, col0) = range
        .start()
        .map(|(r, c)| (r as usize, c as usize))
        .unwrap_or((0, 0));
    let width = col0 + range.width();
    let mut rows: Vec<Vec<Cell>> = vec![vec![Cell::Empty; width]; row0];
    for data_row in range.rows() {
        let mut row = vec![Cell::Empty; col0];
        row.extend(data_row.iter().map(cell_from_data));
        rows.push(row);
    }
    RawTable::new(rows)
}

pub(crate) fn cell_from_data(d: &Data) -> Cell {
    match d {
        Data::Empty | Data::Error(_) => Cell::Empty,
        Data::String(s) if NA_TOKENS.contains(&s.as_str()) => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        Data::Float(f) if f.fract() == 0.0 && f.abs() <= MAX_EXACT_INT => Cell::Int(*f as i64),
        Data::Float(f) => Cell::Float(*f),
        Data::Int(i) => Cell::Int(*i),
        Data::Bool(b) => Cell::Bool(*b),
        Data::DateTime(dt) if dt.is_datetime() => dates::from_excel_serial(dt.as_f64())
            .map(Cell::DateTime)
            .unwrap_or(Cell::Float(dt.as_f64())),
        Data::DateTime(dt) => Cell::Float(dt.as_f64()),
        Data::DateTimeIso(s) => dates::parse_timestamp(s)
            .map(Cell::DateTime)
            .unwrap_or_else(|| Cell::Text(s.clone())),
        Data::DurationIso(s) => Cell::Text(s.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sniffs_non_workbooks() {
        let src = SourceFile::from_bytes("notes.txt", b"just some text".to_vec());
        assert!(matches!(src.ensure_workbook(), Err(IngestError::UnsupportedContent { .. })));
        assert_eq!(src.sha256.len(), 64);
    }

    #[test]
    fn identical_bytes_share_a_digest() {
        let a = SourceFile::from_bytes("a.xlsx", vec![1, 2, 3]);
        let b = SourceFile::from_bytes("b.xlsx", vec![1, 2, 3]);
        assert_eq!(a.sha256, b.sha256);
    }

    #[test]
    fn raw_table_pads_ragged_rows() {
        let raw = RawTable::new(vec![vec![Cell::Int(1)], vec![Cell::Int(1), Cell::Int(2)]]);
        assert_eq!(raw.width(), 2);
        assert_eq!(raw.row(0).unwrap(), &[Cell::Int(1), Cell::Empty]);
    }

    #[test]
    fn converts_calamine_values() {
        assert_eq!(cell_from_data(&Data::Float(3.0)), Cell::Int(3));
        assert_eq!(cell_from_data(&Data::Float(2.5)), Cell::Float(2.5));
        assert_eq!(cell_from_data(&Data::String("N/A".into())), Cell::Empty);
        assert_eq!(cell_from_data(&Data::String(" ".into())), Cell::Text(" ".into()));
        assert!(matches!(
            cell_from_data(&Data::DateTimeIso("2024-06-01T10:00:00".into())),
            Cell::DateTime(_)
        ));
    }
}
