//! In-memory `.xlsx` report writer.
//!
//! Sheets are prepared once (names cut to the format limit, hierarchical headers flattened,
//! row indexes moved into the data) and handed to a [`SheetWriter`]. The formatting backend
//! runs first; if it is missing from the build or fails, the plain backend writes the same
//! sheets without number formats.

mod error;
mod prepare;
mod umya;
#[cfg(feature = "xlsxwriter")]
mod xlsxwriter;

pub use error::ExportError;
pub use prepare::{
    fit_width, group_int, group_thousands, sheet_name, unique_sheet_name, PreparedSheet,
    MAX_COLUMN_WIDTH, MAX_SHEET_NAME,
};
pub use umya::UmyaBackend;
#[cfg(feature = "xlsxwriter")]
pub use xlsxwriter::XlsxWriterBackend;

use std::collections::HashSet;
use time::OffsetDateTime;
use tracing::{debug, warn};
use unify_core::Table;

pub const XLSX_MIME: &str = "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportOptions {
    /// Rows per sheet looked at when sizing columns.
    pub sample_for_width: usize,
    pub float_format: String,
    pub int_format: String,
    pub datetime_format: String,
}

impl Default for ExportOptions {
    fn default() -> Self {
        ExportOptions {
            sample_for_width: 1000,
            float_format: "#,##0.00".to_string(),
            int_format: "#,##0".to_string(),
            datetime_format: "yyyy-mm-dd hh:mm:ss".to_string(),
        }
    }
}

/// One way of turning prepared sheets into workbook bytes.
pub trait SheetWriter {
    fn name(&self) -> &'static str;
    fn write(&self, sheets: &[PreparedSheet], opts: &ExportOptions) -> Result<Vec<u8>, ExportError>;
}

#[cfg(not(feature = "xlsxwriter"))]
struct Unavailable(&'static str);

#[cfg(not(feature = "xlsxwriter"))]
impl SheetWriter for Unavailable {
    fn name(&self) -> &'static str {
        self.0
    }

    fn write(&self, _: &[PreparedSheet], _: &ExportOptions) -> Result<Vec<u8>, ExportError> {
        Err(ExportError::Unavailable(self.0))
    }
}

/// The formatting backend when compiled in, otherwise a stand-in that always reports
/// itself unavailable.
pub fn primary_backend() -> Box<dyn SheetWriter> {
    #[cfg(feature = "xlsxwriter")]
    {
        Box::new(XlsxWriterBackend)
    }
    #[cfg(not(feature = "xlsxwriter"))]
    {
        Box::new(Unavailable("rust_xlsxwriter"))
    }
}

/// Prepare every sheet. Names that clash once cut to length get a ` (N)` suffix.
pub fn prepare_sheets(sheets: &[(String, Table)]) -> Vec<PreparedSheet> {
    let mut taken = HashSet::with_capacity(sheets.len());
    sheets
        .iter()
        .map(|(name, table)| {
            let mut sheet = PreparedSheet::new(name, table);
            let unique = unique_sheet_name(&sheet.name, &taken);
            if unique != sheet.name {
                warn!(requested = %name, written = %unique, "duplicate sheet name renamed");
                sheet.name = unique;
            }
            taken.insert(sheet.name.to_lowercase());
            sheet
        })
        .collect()
}

/// Write `sheets` in order into one workbook.
pub fn export_workbook(sheets: &[(String, Table)], opts: &ExportOptions) -> Result<Vec<u8>, ExportError> {
    let primary = primary_backend();
    export_with(primary.as_ref(), &UmyaBackend, sheets, opts)
}

/// Try `primary`, then `fallback` on any primary error.
pub fn export_with(
    primary: &dyn SheetWriter,
    fallback: &dyn SheetWriter,
    sheets: &[(String, Table)],
    opts: &ExportOptions,
) -> Result<Vec<u8>, ExportError> {
    let prepared = prepare_sheets(sheets);
    match primary.write(&prepared, opts) {
        Ok(bytes) => {
            debug!(backend = primary.name(), sheets = prepared.len(), bytes = bytes.len(), "workbook written");
            Ok(bytes)
        }
        Err(primary_err) => {
            warn!(
                backend = primary.name(),
                fallback = fallback.name(),
                error = %primary_err,
                "export backend failed, retrying with fallback"
            );
            let bytes = fallback.write(&prepared, opts).map_err(|fallback_err| {
                ExportError::AllBackendsFailed {
                    primary: Box::new(primary_err),
                    fallback: Box::new(fallback_err),
                }
            })?;
            debug!(backend = fallback.name(), sheets = prepared.len(), bytes = bytes.len(), "workbook written");
            Ok(bytes)
        }
    }
}

/// `cortex_unificado_YYYYMMDD_HHMMSS.xlsx` for the given moment.
pub fn suggested_file_name(at: OffsetDateTime) -> String {
    format!(
        "cortex_unificado_{:04}{:02}{:02}_{:02}{:02}{:02}.xlsx",
        at.year(),
        u8::from(at.month()),
        at.day(),
        at.hour(),
        at.minute(),
        at.second()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use calamine::{open_workbook_auto_from_rs, Data, Reader};
    use std::collections::BTreeMap;
    use std::io::{Cursor, Read};
    use time::macros::{datetime, offset};
    use unify_core::Cell;

    struct Failing;

    impl SheetWriter for Failing {
        fn name(&self) -> &'static str {
            "failing"
        }

        fn write(&self, _: &[PreparedSheet], _: &ExportOptions) -> Result<Vec<u8>, ExportError> {
            Err(ExportError::Backend { backend: "failing", message: "boom".into() })
        }
    }

    fn read_back(bytes: Vec<u8>) -> Vec<(String, Vec<Vec<Data>>)> {
        let mut wb = open_workbook_auto_from_rs(Cursor::new(bytes)).unwrap();
        let names = wb.sheet_names().to_vec();
        names
            .into_iter()
            .map(|n| {
                let range = wb.worksheet_range(&n).unwrap();
                let rows = range.rows().map(|r| r.to_vec()).collect();
                (n, rows)
            })
            .collect()
    }

    // Every XML part of the package, by path.
    fn parts(bytes: &[u8]) -> BTreeMap<String, String> {
        let mut archive = zip::ZipArchive::new(Cursor::new(bytes)).unwrap();
        let mut out = BTreeMap::new();
        for i in 0..archive.len() {
            let mut file = archive.by_index(i).unwrap();
            let name = file.name().to_string();
            if !name.ends_with(".xml") {
                continue;
            }
            let mut xml = String::new();
            file.read_to_string(&mut xml).unwrap();
            out.insert(name, xml);
        }
        out
    }

    fn worksheets(parts: &BTreeMap<String, String>) -> Vec<&str> {
        parts
            .iter()
            .filter(|(name, _)| name.starts_with("xl/worksheets/sheet"))
            .map(|(_, xml)| xml.as_str())
            .collect()
    }

    fn attr(tag: &str, key: &str) -> Option<String> {
        let needle = format!(" {key}=\"");
        let start = tag.find(&needle)? + needle.len();
        let len = tag[start..].find('"')?;
        Some(tag[start..start + len].to_string())
    }

    struct Col {
        min: usize,
        max: usize,
        width: f64,
        style: Option<String>,
    }

    fn cols(sheet_xml: &str) -> Vec<Col> {
        sheet_xml
            .split("<col ")
            .skip(1)
            .map(|rest| {
                let tag = format!(" {}", &rest[..rest.find('>').unwrap()]);
                Col {
                    min: attr(&tag, "min").unwrap().parse().unwrap(),
                    max: attr(&tag, "max").unwrap().parse().unwrap(),
                    width: attr(&tag, "width").unwrap().parse().unwrap(),
                    style: attr(&tag, "style"),
                }
            })
            .collect()
    }

    // 1-based column, as in the xml.
    fn col(sheet_xml: &str, n: usize) -> Col {
        cols(sheet_xml)
            .into_iter()
            .find(|c| c.min <= n && n <= c.max)
            .unwrap_or_else(|| panic!("no <col> entry for column {n}"))
    }

    fn assert_frozen_header(parts: &BTreeMap<String, String>) {
        let sheets = worksheets(parts);
        assert_eq!(sheets.len(), 2);
        for xml in sheets {
            assert!(xml.contains(r#"ySplit="1""#), "{xml}");
            assert!(xml.contains(r#"topLeftCell="A2""#), "{xml}");
            assert!(xml.contains(r#"state="frozen""#), "{xml}");
        }
    }

    // Base_Limpa: header length against the widest sampled value, as displayed.
    fn assert_base_widths(sheet_xml: &str) {
        let expected = [
            fit_width("endpoint_name".len(), "h1".len()),
            fit_width("agent_version".len(), "8".len()),
            fit_width("score".len(), "2.25".len()),
            fit_width("last_seen".len(), "2024-06-01 10:00:00".len()),
        ];
        for (i, want) in expected.into_iter().enumerate() {
            let got = col(sheet_xml, i + 1).width;
            // writers may add a sub-character padding allowance on top of the width
            assert!(got >= want as f64 && got < want as f64 + 1.0, "column {}: {got} vs {want}", i + 1);
        }
    }

    fn header(rows: &[Vec<Data>]) -> Vec<String> {
        rows[0].iter().map(|d| d.to_string()).collect()
    }

    fn report() -> Vec<(String, Table)> {
        let base = Table::from_rows(
            ["endpoint_name", "agent_version", "score", "last_seen"],
            vec![
                vec!["h1".into(), Cell::Int(8), Cell::Float(1.5), Cell::DateTime(datetime!(2024-06-01 10:00:00))],
                vec!["h2".into(), Cell::Int(7), Cell::Empty, Cell::Empty],
                vec!["h3".into(), Cell::Int(8), Cell::Float(2.25), Cell::DateTime(datetime!(2024-01-01 00:00:00))],
            ],
        )
        .unwrap();
        let summary = Table::from_rows(
            ["endpoint_status", "qtd"],
            vec![vec!["Connected".into(), Cell::Int(3)]],
        )
        .unwrap();
        vec![
            ("Base_Limpa".to_string(), base),
            ("A sheet name that is much too long for xlsx".to_string(), summary),
        ]
    }

    fn assert_round_trip(bytes: Vec<u8>) {
        let sheets = read_back(bytes);
        assert_eq!(sheets.len(), 2);
        assert_eq!(sheets[0].0, "Base_Limpa");
        assert_eq!(sheets[0].1.len(), 4);
        assert_eq!(header(&sheets[0].1), vec!["endpoint_name", "agent_version", "score", "last_seen"]);
        assert_eq!(sheets[1].0, "A sheet name that is much too l");
        assert_eq!(header(&sheets[1].1), vec!["endpoint_status", "qtd"]);
        assert_eq!(sheets[1].1.len(), 2);
    }

    #[cfg(feature = "xlsxwriter")]
    #[test]
    fn primary_round_trip() {
        let bytes = XlsxWriterBackend
            .write(&prepare_sheets(&report()), &ExportOptions::default())
            .unwrap();
        assert_round_trip(bytes);
    }

    #[cfg(feature = "xlsxwriter")]
    #[test]
    fn primary_freezes_header_and_formats_numbers() {
        let bytes = XlsxWriterBackend
            .write(&prepare_sheets(&report()), &ExportOptions::default())
            .unwrap();
        let parts = parts(&bytes);
        assert_frozen_header(&parts);

        let styles = &parts["xl/styles.xml"];
        assert!(styles.contains(r##"formatCode="#,##0.00""##), "{styles}");
        assert!(styles.contains(r##"formatCode="#,##0""##), "{styles}");
        assert!(styles.contains(r#"formatCode="yyyy-mm-dd hh:mm:ss""#), "{styles}");

        let base = worksheets(&parts)[0];
        assert!(col(base, 1).style.is_none());
        assert!(col(base, 2).style.is_some());
        assert!(col(base, 3).style.is_some());
        assert_ne!(col(base, 2).style, col(base, 3).style);
        assert_base_widths(base);
    }

    #[test]
    fn fallback_freezes_header_without_number_formats() {
        let bytes = UmyaBackend
            .write(&prepare_sheets(&report()), &ExportOptions::default())
            .unwrap();
        let parts = parts(&bytes);
        assert_frozen_header(&parts);

        let styles = &parts["xl/styles.xml"];
        assert!(!styles.contains("#,##0"), "{styles}");
        assert!(!styles.contains("yyyy-mm-dd"), "{styles}");
        assert_base_widths(worksheets(&parts)[0]);
    }

    #[cfg(not(feature = "xlsxwriter"))]
    #[test]
    fn without_the_formatting_backend_umya_writes_the_report() {
        let err = primary_backend()
            .write(&prepare_sheets(&report()), &ExportOptions::default())
            .unwrap_err();
        assert!(matches!(err, ExportError::Unavailable("rust_xlsxwriter")));

        let bytes = export_workbook(&report(), &ExportOptions::default()).unwrap();
        let styles = parts(&bytes)["xl/styles.xml"].clone();
        assert!(!styles.contains("#,##0"));
        assert_round_trip(bytes);
    }

    #[test]
    fn names_equal_after_truncation_are_made_unique() {
        let t = Table::from_rows(["k"], vec![vec![Cell::Int(1)]]).unwrap();
        let sheets = vec![
            ("A sheet name that is much too long for xlsx".to_string(), t.clone()),
            ("A sheet name that is much too long, again".to_string(), t.clone()),
            ("a sheet name that is much too l".to_string(), t),
        ];
        let want = [
            "A sheet name that is much too l",
            "A sheet name that is much t (2)",
            "a sheet name that is much t (3)",
        ];
        let names: Vec<String> = prepare_sheets(&sheets).into_iter().map(|s| s.name).collect();
        assert_eq!(names, want);

        let opts = ExportOptions::default();
        for bytes in [
            export_workbook(&sheets, &opts).unwrap(),
            export_with(&Failing, &UmyaBackend, &sheets, &opts).unwrap(),
        ] {
            let read: Vec<String> = read_back(bytes).into_iter().map(|(n, _)| n).collect();
            assert_eq!(read, want);
        }
    }

    #[test]
    fn fallback_round_trip() {
        let bytes = UmyaBackend
            .write(&prepare_sheets(&report()), &ExportOptions::default())
            .unwrap();
        assert_round_trip(bytes);
    }

    #[test]
    fn export_workbook_writes_every_sheet() {
        let bytes = export_workbook(&report(), &ExportOptions::default()).unwrap();
        assert_round_trip(bytes);
    }

    #[test]
    fn failing_primary_falls_back_silently() {
        let bytes = export_with(&Failing, &UmyaBackend, &report(), &ExportOptions::default()).unwrap();
        assert_round_trip(bytes);
    }

    #[test]
    fn both_backends_failing_is_fatal() {
        let err = export_with(&Failing, &Failing, &report(), &ExportOptions::default()).unwrap_err();
        assert!(matches!(err, ExportError::AllBackendsFailed { .. }));
    }

    #[test]
    fn flattened_headers_survive_export() {
        let t = Table::with_levels(
            vec![vec!["Metric".into(), "Status".into()], vec!["Metric".into(), "Count".into()]],
            vec![vec!["ok".into(), Cell::Int(1)], vec!["lost".into(), Cell::Int(2)]],
        )
        .unwrap();
        let bytes = export_workbook(&[("".to_string(), t)], &ExportOptions::default()).unwrap();
        let sheets = read_back(bytes);
        assert_eq!(sheets[0].0, "Sheet1");
        assert_eq!(header(&sheets[0].1), vec!["Metric - Status", "Metric - Count"]);
        assert_eq!(sheets[0].1.len(), 3);
    }

    #[test]
    fn file_name_embeds_timestamp() {
        let at = datetime!(2024-03-05 07:08:09).assume_offset(offset!(-3));
        assert_eq!(suggested_file_name(at), "cortex_unificado_20240305_070809.xlsx");
    }
}
