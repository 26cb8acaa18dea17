use crate::Cell;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TableError {
    #[error("row {row} has {found} cells, expected {expected}")]
    RaggedRow { row: usize, expected: usize, found: usize },

    #[error("column `{name}` has {found} values, expected {expected}")]
    ColumnLength { name: String, expected: usize, found: usize },

    #[error("row index has {found} entries, expected {expected}")]
    IndexLength { expected: usize, found: usize },
}

/// A column header: a plain name, or the levels of a hierarchical header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ColumnKey {
    Name(String),
    Levels(Vec<String>),
}

impl ColumnKey {
    /// Flat display name; levels are joined with `" - "`.
    pub fn flat_name(&self) -> String {
        match self {
            ColumnKey::Name(n) => n.clone(),
            ColumnKey::Levels(levels) => levels.join(" - ").trim().to_string(),
        }
    }
}

impl From<&str> for ColumnKey {
    fn from(s: &str) -> Self {
        ColumnKey::Name(s.to_string())
    }
}

impl From<String> for ColumnKey {
    fn from(s: String) -> Self {
        ColumnKey::Name(s)
    }
}

/// Named row labels kept beside the data rows (one value per level per row).
#[derive(Debug, Clone, PartialEq)]
pub struct RowIndex {
    pub names: Vec<String>,
    pub values: Vec<Vec<Cell>>,
}

/// Value shape of a column, used to pick display formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnKind {
    Integer,
    Float,
    DateTime,
    Other,
}

/// Rectangular table of cells. Transformations consume or borrow `self` and return a new
/// table; nothing mutates a table that another stage can still see.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct Table {
    columns: Vec<ColumnKey>,
    rows: Vec<Vec<Cell>>,
    index: Option<RowIndex>,
}

impl Table {
    pub fn new<C: Into<ColumnKey>>(columns: impl IntoIterator<Item = C>) -> Self {
        Table {
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
            index: None,
        }
    }

    pub fn from_rows<C: Into<ColumnKey>>(
        columns: impl IntoIterator<Item = C>,
        rows: Vec<Vec<Cell>>,
    ) -> Result<Self, TableError> {
        let mut table = Table::new(columns);
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Table with a hierarchical header, one `Vec` of levels per column.
    pub fn with_levels(levels: Vec<Vec<String>>, rows: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        Table::from_rows(levels.into_iter().map(ColumnKey::Levels), rows)
    }

    /// Attach a named row index; `values` holds one entry per row.
    pub fn with_index(mut self, names: Vec<String>, values: Vec<Vec<Cell>>) -> Result<Self, TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::IndexLength { expected: self.rows.len(), found: values.len() });
        }
        for (row, v) in values.iter().enumerate() {
            if v.len() != names.len() {
                return Err(TableError::RaggedRow { row, expected: names.len(), found: v.len() });
            }
        }
        self.index = Some(RowIndex { names, values });
        Ok(self)
    }

    pub fn push_row(&mut self, row: Vec<Cell>) -> Result<(), TableError> {
        if row.len() != self.columns.len() {
            return Err(TableError::RaggedRow {
                row: self.rows.len(),
                expected: self.columns.len(),
                found: row.len(),
            });
        }
        self.rows.push(row);
        Ok(())
    }

    pub fn columns(&self) -> &[ColumnKey] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<String> {
        self.columns.iter().map(ColumnKey::flat_name).collect()
    }

    pub fn rows(&self) -> &[Vec<Cell>] {
        &self.rows
    }

    pub fn into_rows(self) -> Vec<Vec<Cell>> {
        self.rows
    }

    pub fn index(&self) -> Option<&RowIndex> {
        self.index.as_ref()
    }

    pub fn height(&self) -> usize {
        self.rows.len()
    }

    pub fn width(&self) -> usize {
        self.columns.len()
    }

    /// True when the table has no rows or no columns.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() || self.columns.is_empty()
    }

    pub fn has_levels(&self) -> bool {
        self.columns.iter().any(|c| matches!(c, ColumnKey::Levels(_)))
    }

    /// Position of the first column whose flat name equals `name`.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| match c {
            ColumnKey::Name(n) => n == name,
            levels => levels.flat_name() == name,
        })
    }

    pub fn column(&self, name: &str) -> Option<impl Iterator<Item = &Cell> + '_> {
        let idx = self.position(name)?;
        Some(self.rows.iter().map(move |r| &r[idx]))
    }

    pub fn cell(&self, row: usize, col: usize) -> Option<&Cell> {
        self.rows.get(row).and_then(|r| r.get(col))
    }

    /// Replace the column `name` in place, or append it when it does not exist yet.
    pub fn with_column(mut self, name: &str, values: Vec<Cell>) -> Result<Self, TableError> {
        if values.len() != self.rows.len() {
            return Err(TableError::ColumnLength {
                name: name.to_string(),
                expected: self.rows.len(),
                found: values.len(),
            });
        }
        match self.position(name) {
            Some(idx) => {
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row[idx] = v;
                }
            }
            None => {
                self.columns.push(ColumnKey::Name(name.to_string()));
                for (row, v) in self.rows.iter_mut().zip(values) {
                    row.push(v);
                }
            }
        }
        Ok(self)
    }

    /// Apply `f` to every cell of column `name`; a missing column leaves the table as is.
    pub fn map_column<F>(mut self, name: &str, mut f: F) -> Self
    where
        F: FnMut(Cell) -> Cell,
    {
        if let Some(idx) = self.position(name) {
            for row in &mut self.rows {
                let v = std::mem::take(&mut row[idx]);
                row[idx] = f(v);
            }
        }
        self
    }

    pub fn rename_columns<F>(mut self, mut f: F) -> Self
    where
        F: FnMut(&ColumnKey) -> String,
    {
        self.columns = self.columns.iter().map(|c| ColumnKey::Name(f(c))).collect();
        self
    }

    /// New table with the same header holding the rows at `indices`, in that order.
    pub fn select_rows(&self, indices: &[usize]) -> Self {
        Table {
            columns: self.columns.clone(),
            rows: indices.iter().filter_map(|&i| self.rows.get(i).cloned()).collect(),
            index: self.index.as_ref().map(|ix| RowIndex {
                names: ix.names.clone(),
                values: indices.iter().filter_map(|&i| ix.values.get(i).cloned()).collect(),
            }),
        }
    }

    /// Turn every hierarchical header into a plain one.
    pub fn flatten_columns(mut self) -> Self {
        self.columns = self
            .columns
            .iter()
            .map(|c| ColumnKey::Name(c.flat_name()))
            .collect();
        self
    }

    /// Move the named row index, if any, in front of the data as ordinary columns.
    pub fn reset_index(mut self) -> Self {
        let Some(index) = self.index.take() else {
            return self;
        };
        let mut columns: Vec<ColumnKey> = index.names.into_iter().map(ColumnKey::Name).collect();
        columns.append(&mut self.columns);
        self.columns = columns;
        self.rows = index
            .values
            .into_iter()
            .zip(self.rows)
            .map(|(mut labels, mut row)| {
                labels.append(&mut row);
                labels
            })
            .collect();
        self
    }

    /// Shape of column `col`: integer when every value is an integer, float when every
    /// present value is numeric with at least one float or gap, datetime when every
    /// present value is a timestamp.
    pub fn column_kind(&self, col: usize) -> ColumnKind {
        let mut present = 0usize;
        let mut gaps = false;
        let (mut ints, mut floats, mut dates) = (0usize, 0usize, 0usize);
        for row in &self.rows {
            match &row[col] {
                Cell::Empty => gaps = true,
                Cell::Int(_) => {
                    present += 1;
                    ints += 1;
                }
                Cell::Float(_) => {
                    present += 1;
                    floats += 1;
                }
                Cell::DateTime(_) => {
                    present += 1;
                    dates += 1;
                }
                _ => return ColumnKind::Other,
            }
        }
        if present == 0 {
            ColumnKind::Other
        } else if ints == present && !gaps {
            ColumnKind::Integer
        } else if ints + floats == present {
            ColumnKind::Float
        } else if dates == present {
            ColumnKind::DateTime
        } else {
            ColumnKind::Other
        }
    }
}
