use rust_xlsxwriter::{ExcelDateTime, Format, FormatBorder, Workbook, Worksheet, XlsxError};
use time::PrimitiveDateTime;
use unify_core::{Cell, ColumnKind};

use crate::{ExportError, ExportOptions, PreparedSheet, SheetWriter};

const BACKEND: &str = "rust_xlsxwriter";

/// Formatting backend: bold header, frozen first row, number and date formats per column.
#[derive(Debug, Default, Clone, Copy)]
pub struct XlsxWriterBackend;

impl SheetWriter for XlsxWriterBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn write(&self, sheets: &[PreparedSheet], opts: &ExportOptions) -> Result<Vec<u8>, ExportError> {
        build(sheets, opts).map_err(|e| ExportError::backend(BACKEND, e))
    }
}

struct Formats {
    header: Format,
    float: Format,
    int: Format,
    datetime: Format,
}

impl Formats {
    fn new(opts: &ExportOptions) -> Self {
        Formats {
            header: Format::new().set_bold().set_border(FormatBorder::Thin),
            float: Format::new().set_num_format(opts.float_format.as_str()),
            int: Format::new().set_num_format(opts.int_format.as_str()),
            datetime: Format::new().set_num_format(opts.datetime_format.as_str()),
        }
    }
}

fn build(sheets: &[PreparedSheet], opts: &ExportOptions) -> Result<Vec<u8>, XlsxError> {
    let formats = Formats::new(opts);
    let mut workbook = Workbook::new();
    for sheet in sheets {
        let ws = workbook.add_worksheet();
        ws.set_name(sheet.name.as_str())?;
        write_sheet(ws, sheet, &formats, opts.sample_for_width)?;
    }
    workbook.save_to_buffer()
}

fn write_sheet(
    ws: &mut Worksheet,
    sheet: &PreparedSheet,
    formats: &Formats,
    sample: usize,
) -> Result<(), XlsxError> {
    for (c, name) in sheet.table.column_names().iter().enumerate() {
        ws.write_string_with_format(0, c as u16, name.as_str(), &formats.header)?;
    }
    let kinds = sheet.kinds();
    for (r, row) in sheet.table.rows().iter().enumerate() {
        for (c, cell) in row.iter().enumerate() {
            write_cell(ws, r as u32 + 1, c as u16, cell, kinds[c], formats)?;
        }
    }
    ws.set_freeze_panes(1, 0)?;
    for (c, width) in sheet.formatted_widths(sample).into_iter().enumerate() {
        let col = c as u16;
        match kinds[c] {
            ColumnKind::Float => {
                ws.set_column_format(col, &formats.float)?;
            }
            ColumnKind::Integer => {
                ws.set_column_format(col, &formats.int)?;
            }
            _ => {}
        }
        ws.set_column_width(col, width)?;
    }
    Ok(())
}

fn write_cell(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    cell: &Cell,
    kind: ColumnKind,
    formats: &Formats,
) -> Result<(), XlsxError> {
    let number_format = match kind {
        ColumnKind::Float => Some(&formats.float),
        ColumnKind::Integer => Some(&formats.int),
        _ => None,
    };
    match cell {
        Cell::Empty => {}
        Cell::Text(s) => {
            ws.write_string(row, col, s.as_str())?;
        }
        Cell::Int(i) => write_number(ws, row, col, *i as f64, number_format)?,
        Cell::Float(f) => write_number(ws, row, col, *f, number_format)?,
        Cell::Bool(b) => {
            ws.write_boolean(row, col, *b)?;
        }
        Cell::DateTime(dt) => match excel_datetime(dt) {
            Some(value) => {
                ws.write_datetime_with_format(row, col, &value, &formats.datetime)?;
            }
            // before 1900, outside what an Excel serial can hold
            None => {
                ws.write_string(row, col, &cell.to_string())?;
            }
        },
    }
    Ok(())
}

fn write_number(
    ws: &mut Worksheet,
    row: u32,
    col: u16,
    value: f64,
    format: Option<&Format>,
) -> Result<(), XlsxError> {
    match format {
        Some(f) => ws.write_number_with_format(row, col, value, f)?,
        None => ws.write_number(row, col, value)?,
    };
    Ok(())
}

fn excel_datetime(dt: &PrimitiveDateTime) -> Option<ExcelDateTime> {
    let year = u16::try_from(dt.year()).ok()?;
    ExcelDateTime::from_ymd(year, u8::from(dt.month()), dt.day())
        .ok()?
        .and_hms(u16::from(dt.hour()), dt.minute(), dt.second())
        .ok()
}
