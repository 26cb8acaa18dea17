use std::collections::HashMap;
use unify_core::{Cell, Table};

/// Concatenate tables row-wise in the given order. The result has the union of all
/// columns in order of first appearance; cells a table does not have stay absent.
///
/// A name repeated inside one table maps to the same repeat in the union, so no values
/// collapse onto each other.
pub fn merge_tables(tables: Vec<Table>) -> Table {
    let mut tables = tables;
    if tables.len() == 1 {
        return tables.remove(0);
    }

    let mut union: Vec<String> = Vec::new();
    let mut layouts: Vec<Vec<usize>> = Vec::with_capacity(tables.len());
    for table in &tables {
        let mut seen: HashMap<String, usize> = HashMap::new();
        let mut layout = Vec::with_capacity(table.width());
        for name in table.column_names() {
            let nth = seen.entry(name.clone()).or_insert(0);
            let pos = union
                .iter()
                .enumerate()
                .filter(|(_, u)| **u == name)
                .nth(*nth)
                .map(|(i, _)| i);
            *nth += 1;
            let pos = match pos {
                Some(p) => p,
                None => {
                    union.push(name);
                    union.len() - 1
                }
            };
            layout.push(pos);
        }
        layouts.push(layout);
    }

    let mut rows = Vec::with_capacity(tables.iter().map(Table::height).sum());
    for (table, layout) in tables.into_iter().zip(layouts) {
        for row in table.into_rows() {
            let mut out = vec![Cell::Empty; union.len()];
            for (value, &pos) in row.into_iter().zip(&layout) {
                out[pos] = value;
            }
            rows.push(out);
        }
    }

    Table::from_rows(union, rows).expect("every merged row has the union width")
}
