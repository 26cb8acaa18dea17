use std::io::Cursor;

use umya_spreadsheet::{Pane, PaneStateValues, PaneValues, SheetView, Worksheet};
use unify_core::Cell;

use crate::{ExportError, ExportOptions, PreparedSheet, SheetWriter};

const BACKEND: &str = "umya-spreadsheet";

/// Plain backend: frozen header and best-effort widths, no number formats. Timestamps are
/// written as `YYYY-MM-DD HH:MM:SS` text.
#[derive(Debug, Default, Clone, Copy)]
pub struct UmyaBackend;

impl SheetWriter for UmyaBackend {
    fn name(&self) -> &'static str {
        BACKEND
    }

    fn write(&self, sheets: &[PreparedSheet], opts: &ExportOptions) -> Result<Vec<u8>, ExportError> {
        let mut book = umya_spreadsheet::new_file_empty_worksheet();
        for sheet in sheets {
            let ws = book
                .new_sheet(sheet.name.as_str())
                .map_err(|e| ExportError::backend(BACKEND, e))?;
            fill_sheet(ws, sheet, opts.sample_for_width);
        }
        let mut out = Cursor::new(Vec::new());
        umya_spreadsheet::writer::xlsx::write_writer(&book, &mut out)
            .map_err(|e| ExportError::backend(BACKEND, e))?;
        Ok(out.into_inner())
    }
}

fn fill_sheet(ws: &mut Worksheet, sheet: &PreparedSheet, sample: usize) {
    for (c, name) in sheet.table.column_names().into_iter().enumerate() {
        ws.get_cell_mut((c as u32 + 1, 1)).set_value_string(name);
    }
    for (r, row) in sheet.table.rows().iter().enumerate() {
        for (c, value) in row.iter().enumerate() {
            let cell = ws.get_cell_mut((c as u32 + 1, r as u32 + 2));
            match value {
                Cell::Empty => {}
                Cell::Text(s) => {
                    cell.set_value_string(s.as_str());
                }
                Cell::Int(i) => {
                    cell.set_value_number(*i as f64);
                }
                Cell::Float(f) => {
                    cell.set_value_number(*f);
                }
                Cell::Bool(b) => {
                    cell.set_value_bool(*b);
                }
                Cell::DateTime(_) => {
                    cell.set_value_string(value.to_string());
                }
            }
        }
    }
    freeze_header(ws);
    for (c, width) in sheet.plain_widths(sample).into_iter().enumerate() {
        ws.get_column_dimension_mut(&column_letter(c as u32 + 1)).set_width(width);
    }
}

fn freeze_header(ws: &mut Worksheet) {
    let mut pane = Pane::default();
    pane.set_vertical_split(1.0);
    pane.get_top_left_cell_mut().set_coordinate("A2");
    pane.set_active_pane(PaneValues::BottomLeft);
    pane.set_state(PaneStateValues::Frozen);

    let views = ws.get_sheet_views_mut();
    if views.get_sheet_view_list().is_empty() {
        views.add_sheet_view_list_mut(SheetView::default());
    }
    if let Some(view) = views.get_sheet_view_list_mut().first_mut() {
        view.set_pane(pane);
    }
}

/// 1-based column number to its letter name: 1 -> "A", 27 -> "AA".
fn column_letter(mut col: u32) -> String {
    let mut out = Vec::new();
    while col > 0 {
        let rem = (col - 1) % 26;
        out.push(b'A' + rem as u8);
        col = (col - 1) / 26;
    }
    out.reverse();
    String::from_utf8_lossy(&out).into_owned()
}
