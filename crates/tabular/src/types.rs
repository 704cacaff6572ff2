use semtable_common::{Result, SemtableError};
use serde::{Deserialize, Serialize};

/// An ordered set of rows sharing one runtime-discovered column schema.
///
/// The schema is data, not a compiled type: columns are enumerated through
/// [`RecordSet::columns`] and every row holds its values in schema order.
/// Row index is the only identity a row has; embedding matrices derived from
/// a record set are aligned to it positionally.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecordSet {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl RecordSet {
    /// Create an empty record set with the given column schema
    pub fn new(columns: Vec<String>) -> Result<Self> {
        if columns.is_empty() {
            return Err(SemtableError::parse("record set needs at least one column"));
        }
        for (i, col) in columns.iter().enumerate() {
            if columns[..i].contains(col) {
                return Err(SemtableError::parse(format!(
                    "duplicate column name '{}'",
                    col
                )));
            }
        }
        Ok(Self {
            columns,
            rows: Vec::new(),
        })
    }

    /// Column names in schema order
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Whether the record set has no rows
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// All rows, each in schema order
    pub fn rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// A single row by index
    pub fn row(&self, index: usize) -> Option<&[String]> {
        self.rows.get(index).map(|r| r.as_slice())
    }

    /// Row as (column, value) pairs in schema order
    pub fn row_mapping(&self, index: usize) -> Option<Vec<(String, String)>> {
        self.rows.get(index).map(|row| {
            self.columns
                .iter()
                .cloned()
                .zip(row.iter().cloned())
                .collect()
        })
    }

    /// Append a row; its length must match the schema
    pub fn push_row(&mut self, row: Vec<String>) -> Result<()> {
        if row.len() != self.columns.len() {
            return Err(SemtableError::invariant(format!(
                "row has {} values, schema has {} columns",
                row.len(),
                self.columns.len()
            )));
        }
        self.rows.push(row);
        Ok(())
    }

    /// Index of a column by name
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    /// All values of one column, top to bottom
    pub fn column_values(&self, name: &str) -> Result<Vec<String>> {
        let idx = self
            .column_index(name)
            .ok_or_else(|| SemtableError::missing_column(name.to_string()))?;
        Ok(self.rows.iter().map(|row| row[idx].clone()).collect())
    }

    /// Whether `other` has the same column names, ignoring order
    pub fn same_column_set(&self, other: &RecordSet) -> bool {
        self.columns.len() == other.columns.len()
            && self.columns.iter().all(|c| other.columns.contains(c))
    }

    /// Copy of this record set with columns rearranged into `target` order.
    ///
    /// Fails with `SchemaMismatch` unless `target` is a permutation of this
    /// record set's columns.
    pub fn reordered(&self, target: &[String]) -> Result<RecordSet> {
        if target.len() != self.columns.len()
            || !target.iter().all(|c| self.columns.contains(c))
        {
            return Err(SemtableError::schema_mismatch(format!(
                "columns [{}] cannot be reordered to [{}]",
                self.columns.join(", "),
                target.join(", ")
            )));
        }
        if target == self.columns {
            return Ok(self.clone());
        }

        let mut indices = Vec::with_capacity(target.len());
        for column in target {
            indices.push(self.column_index(column).ok_or_else(|| {
                SemtableError::schema_mismatch(format!("unknown column '{}'", column))
            })?);
        }
        let mut out = RecordSet::new(target.to_vec())?;
        for row in &self.rows {
            out.push_row(indices.iter().map(|&i| row[i].clone()).collect())?;
        }
        Ok(out)
    }
}
