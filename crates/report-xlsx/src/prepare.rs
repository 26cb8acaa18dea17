use std::collections::HashSet;
use unify_core::{Cell, ColumnKind, Table};

/// Longest sheet name the xlsx format accepts.
pub const MAX_SHEET_NAME: usize = 31;
pub const MAX_COLUMN_WIDTH: usize = 60;
const WIDTH_PADDING: usize = 2;
const DEFAULT_SHEET_NAME: &str = "Sheet1";

/// A sheet ready for any backend: final name, flat headers, index moved into the data.
#[derive(Debug, Clone)]
pub struct PreparedSheet {
    pub name: String,
    pub table: Table,
    kinds: Vec<ColumnKind>,
}

impl PreparedSheet {
    pub fn new(name: &str, table: &Table) -> Self {
        let table = table.clone().flatten_columns().reset_index();
        let kinds = (0..table.width()).map(|c| table.column_kind(c)).collect();
        PreparedSheet { name: sheet_name(name), table, kinds }
    }

    pub fn kinds(&self) -> &[ColumnKind] {
        &self.kinds
    }

    /// Widths with numbers measured the way the number formats display them.
    pub fn formatted_widths(&self, sample: usize) -> Vec<f64> {
        self.widths(sample, |cell, kind| match (kind, cell) {
            (_, Cell::Empty) => 0,
            (ColumnKind::Float, Cell::Int(i)) => group_thousands(*i as f64, 2).chars().count(),
            (ColumnKind::Float, Cell::Float(f)) => group_thousands(*f, 2).chars().count(),
            (ColumnKind::Integer, Cell::Int(i)) => group_int(*i).chars().count(),
            _ => cell.to_string().chars().count(),
        })
    }

    /// Widths with every value measured as its plain string form.
    pub fn plain_widths(&self, sample: usize) -> Vec<f64> {
        self.widths(sample, |cell, _| cell.to_string().chars().count())
    }

    fn widths<F>(&self, sample: usize, measure: F) -> Vec<f64>
    where
        F: Fn(&Cell, ColumnKind) -> usize,
    {
        let rows = &self.table.rows()[..self.table.height().min(sample)];
        self.table
            .column_names()
            .iter()
            .enumerate()
            .map(|(c, header)| {
                let data = rows
                    .iter()
                    .map(|row| measure(&row[c], self.kinds[c]))
                    .max()
                    .unwrap_or(0);
                fit_width(header.chars().count(), data) as f64
            })
            .collect()
    }
}

/// Sheet name as written: blank names become "Sheet1", long ones are cut to 31 chars.
pub fn sheet_name(name: &str) -> String {
    if name.is_empty() {
        return DEFAULT_SHEET_NAME.to_string();
    }
    name.chars().take(MAX_SHEET_NAME).collect()
}

/// `name` when no sheet in `taken` already has it, otherwise the first free `name (N)` from
/// N = 2, with `name` cut so the result stays within 31 chars. `taken` holds lowercase
/// names; xlsx sheet names are case-insensitive.
pub fn unique_sheet_name(name: &str, taken: &HashSet<String>) -> String {
    if !taken.contains(&name.to_lowercase()) {
        return name.to_string();
    }
    let mut n = 2usize;
    loop {
        let suffix = format!(" ({n})");
        let keep = MAX_SHEET_NAME.saturating_sub(suffix.chars().count());
        let candidate: String = name.chars().take(keep).chain(suffix.chars()).collect();
        if !taken.contains(&candidate.to_lowercase()) {
            return candidate;
        }
        n += 1;
    }
}

pub fn fit_width(header_len: usize, data_len: usize) -> usize {
    (header_len.max(data_len) + WIDTH_PADDING).min(MAX_COLUMN_WIDTH)
}

/// `1234.5` with 2 decimals -> `"1,234.50"`.
pub fn group_thousands(value: f64, decimals: usize) -> String {
    if !value.is_finite() {
        return value.to_string();
    }
    let raw = format!("{:.*}", decimals, value.abs());
    let (int_part, frac) = match raw.split_once('.') {
        Some((i, f)) => (i, Some(f)),
        None => (raw.as_str(), None),
    };
    let mut out = String::new();
    if value < 0.0 {
        out.push('-');
    }
    out.push_str(&group_digits(int_part));
    if let Some(f) = frac {
        out.push('.');
        out.push_str(f);
    }
    out
}

pub fn group_int(value: i64) -> String {
    let digits = group_digits(&value.unsigned_abs().to_string());
    if value < 0 {
        format!("-{digits}")
    } else {
        digits
    }
}

fn group_digits(digits: &str) -> String {
    let len = digits.len();
    let mut out = String::with_capacity(len + len / 3);
    for (i, ch) in digits.chars().enumerate() {
        if i > 0 && (len - i) % 3 == 0 {
            out.push(',');
        }
        out.push(ch);
    }
    out
}
