use std::cmp::Ordering;
use std::collections::HashMap;
use unify_core::columns::{LAST_UPGRADE_FAILURE_REASON, LAST_UPGRADE_STATUS};
use unify_core::{Cell, Table};

/// Substrings (lowercase) that mark an upgrade outcome as a failure.
pub const FAILURE_MARKERS: [&str; 5] = ["fail", "timed out", "faulty", "lost", "error"];

/// Count rows per value of `column` into a `[column, "qtd"]` table, largest group first.
/// Absent values form their own group. `None` when the column does not exist.
pub fn summarize(table: &Table, column: &str) -> Option<Table> {
    let idx = table.position(column)?;
    let mut counts: HashMap<&Cell, i64> = HashMap::new();
    for row in table.rows() {
        *counts.entry(&row[idx]).or_insert(0) += 1;
    }
    let mut groups: Vec<(&Cell, i64)> = counts.into_iter().collect();
    groups.sort_by(|a, b| value_cmp(a.0, b.0));
    groups.sort_by(|a, b| b.1.cmp(&a.1));

    let rows = groups
        .into_iter()
        .map(|(value, n)| vec![value.clone(), Cell::Int(n)])
        .collect();
    Some(Table::from_rows([column, "qtd"], rows).expect("summary rows have two cells"))
}

// Group order before ranking: numbers, then text, then other values, absent last.
fn value_cmp(a: &Cell, b: &Cell) -> Ordering {
    fn rank(c: &Cell) -> u8 {
        match c {
            Cell::Int(_) | Cell::Float(_) => 0,
            Cell::Text(_) => 1,
            Cell::DateTime(_) => 2,
            Cell::Bool(_) => 3,
            Cell::Empty => 4,
        }
    }
    match (a, b) {
        (Cell::Text(x), Cell::Text(y)) => x.cmp(y),
        (Cell::DateTime(x), Cell::DateTime(y)) => x.cmp(y),
        (Cell::Bool(x), Cell::Bool(y)) => x.cmp(y),
        (x, y) if x.is_numeric() && y.is_numeric() => {
            let fx = numeric(x);
            let fy = numeric(y);
            fx.partial_cmp(&fy).unwrap_or(Ordering::Equal)
        }
        _ => rank(a).cmp(&rank(b)),
    }
}

fn numeric(c: &Cell) -> f64 {
    match c {
        Cell::Int(i) => *i as f64,
        Cell::Float(f) => *f,
        _ => f64::NAN,
    }
}

/// Rows whose upgrade status or failure reason mentions a failure marker.
pub fn failure_subset(table: &Table) -> Table {
    let cols: Vec<usize> = [LAST_UPGRADE_STATUS, LAST_UPGRADE_FAILURE_REASON]
        .iter()
        .filter_map(|c| table.position(c))
        .collect();
    let keep: Vec<usize> = table
        .rows()
        .iter()
        .enumerate()
        .filter(|(_, row)| cols.iter().any(|&c| is_failure(&row[c])))
        .map(|(i, _)| i)
        .collect();
    table.select_rows(&keep)
}

fn is_failure(cell: &Cell) -> bool {
    if cell.is_empty() {
        return false;
    }
    let text = cell.to_string().to_lowercase();
    FAILURE_MARKERS.iter().any(|m| text.contains(m))
}
