//! Core table types for representing delimiter-separated data
//!
//! `Table` and `Row` are plain owned values. `Clone` is a deep copy: every
//! field is its own `String`, so a cloned table shares no storage with its
//! source and can be mutated independently.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// A row of text fields
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Row {
    fields: Vec<String>,
}

impl Row {
    /// Create a new row
    pub fn new(fields: Vec<String>) -> Self {
        Self { fields }
    }

    /// Number of fields
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Get a field by column index
    pub fn get(&self, index: usize) -> Option<&str> {
        self.fields.get(index).map(String::as_str)
    }

    pub fn fields(&self) -> &[String] {
        &self.fields
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.fields.iter().map(String::as_str)
    }

    pub fn into_fields(self) -> Vec<String> {
        self.fields
    }

    /// Mutable access to one field. The row's width cannot change through this.
    pub fn get_mut(&mut self, index: usize) -> Option<&mut String> {
        self.fields.get_mut(index)
    }
}

impl From<Vec<String>> for Row {
    fn from(fields: Vec<String>) -> Self {
        Self { fields }
    }
}

impl From<Vec<&str>> for Row {
    fn from(fields: Vec<&str>) -> Self {
        fields.into_iter().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for Row {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            fields: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// An in-memory table.
///
/// Every row has exactly `column_count` fields. When `has_header` is set,
/// row 0 is the header: it is still stored (and addressed) as a row, but
/// [`Table::data_rows`] skips it.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TableData")]
pub struct Table {
    rows: Vec<Row>,
    column_count: usize,
    has_header: bool,
}

impl Table {
    /// Create a new empty table with no columns
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a table from rows, all of which must have the same width
    pub fn from_rows(rows: Vec<Row>, has_header: bool) -> Result<Self> {
        let mut table = Table {
            rows: Vec::with_capacity(rows.len()),
            column_count: 0,
            has_header,
        };
        for row in rows {
            table.push_row(row)?;
        }
        Ok(table)
    }

    /// Build a table from rows the codec has already normalised
    pub(crate) fn from_parts(rows: Vec<Row>, column_count: usize, has_header: bool) -> Self {
        debug_assert!(rows.iter().all(|r| r.len() == column_count));
        Self {
            rows,
            column_count,
            has_header,
        }
    }

    /// Get the number of columns
    pub fn column_count(&self) -> usize {
        self.column_count
    }

    /// Get the number of stored rows, header included
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Get the number of data rows, header excluded
    pub fn data_row_count(&self) -> usize {
        self.rows.len() - self.data_offset()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn has_header(&self) -> bool {
        self.has_header
    }

    /// Mark or unmark the first row as the header
    pub fn set_has_header(&mut self, has_header: bool) {
        self.has_header = has_header;
    }

    /// The header row, if the table has one and it is not empty
    pub fn header(&self) -> Option<&Row> {
        if self.has_header {
            self.rows.first()
        } else {
            None
        }
    }

    /// All stored rows, header included
    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    /// Rows after the header
    pub fn data_rows(&self) -> &[Row] {
        &self.rows[self.data_offset()..]
    }

    /// Storage index of the first data row
    pub fn data_offset(&self) -> usize {
        usize::from(self.has_header && !self.rows.is_empty())
    }

    /// Get a row by storage index
    pub fn get_row(&self, index: usize) -> Result<&Row> {
        self.rows
            .get(index)
            .ok_or_else(|| Error::row_index(index, self.rows.len()))
    }

    /// Get a single field
    pub fn get_field(&self, row: usize, col: usize) -> Result<&str> {
        let r = self.get_row(row)?;
        r.get(col)
            .ok_or_else(|| Error::column_index(col, self.column_count))
    }

    /// Replace a single field
    pub fn set_field(&mut self, row: usize, col: usize, value: impl Into<String>) -> Result<()> {
        let (len, columns) = (self.rows.len(), self.column_count);
        let r = self
            .rows
            .get_mut(row)
            .ok_or_else(|| Error::row_index(row, len))?;
        let field = r
            .get_mut(col)
            .ok_or_else(|| Error::column_index(col, columns))?;
        *field = value.into();
        Ok(())
    }

    /// Append a row
    pub fn push_row(&mut self, row: impl Into<Row>) -> Result<()> {
        let at = self.rows.len();
        self.insert_row(at, row)
    }

    /// Insert a row at a storage index (`index == row_count()` appends).
    ///
    /// A table with neither rows nor columns adopts the first row's width,
    /// which must not be zero. Any other width mismatch is a shape error.
    pub fn insert_row(&mut self, index: usize, row: impl Into<Row>) -> Result<()> {
        let row = row.into();
        if index > self.rows.len() {
            return Err(Error::row_index(index, self.rows.len()));
        }
        if self.rows.is_empty() && self.column_count == 0 {
            if row.is_empty() {
                return Err(Error::EmptyRow);
            }
            self.column_count = row.len();
        } else if row.len() != self.column_count {
            return Err(Error::Shape {
                expected: self.column_count,
                found: row.len(),
            });
        }
        self.rows.insert(index, row);
        Ok(())
    }

    /// Remove and return a row by storage index.
    ///
    /// Removing the header row of a header table clears `has_header`.
    pub fn remove_row(&mut self, index: usize) -> Result<Row> {
        if index >= self.rows.len() {
            return Err(Error::row_index(index, self.rows.len()));
        }
        if index == 0 && self.has_header {
            self.has_header = false;
        }
        Ok(self.rows.remove(index))
    }

    /// Insert a column at `index`, padding every row.
    ///
    /// The header row (if any) receives `header`, every other row `fill`.
    pub fn insert_column(&mut self, index: usize, header: &str, fill: &str) -> Result<()> {
        if index > self.column_count {
            return Err(Error::column_index(index, self.column_count));
        }
        let offset = self.data_offset();
        for (i, row) in self.rows.iter_mut().enumerate() {
            let value = if i < offset { header } else { fill };
            row.fields.insert(index, value.to_string());
        }
        self.column_count += 1;
        Ok(())
    }

    /// Remove a column, returning its values top to bottom
    pub fn remove_column(&mut self, index: usize) -> Result<Vec<String>> {
        if index >= self.column_count {
            return Err(Error::column_index(index, self.column_count));
        }
        if self.column_count == 1 && !self.rows.is_empty() {
            return Err(Error::LastColumn);
        }
        let removed = self
            .rows
            .iter_mut()
            .map(|row| row.fields.remove(index))
            .collect();
        self.column_count -= 1;
        Ok(removed)
    }

    /// Find a column index by header name
    pub fn find_column(&self, name: &str) -> Option<usize> {
        self.header()?.iter().position(|h| h == name)
    }

    /// Values of one column across the data rows
    pub fn column_values(&self, col: usize) -> Result<Vec<&str>> {
        if col >= self.column_count {
            return Err(Error::column_index(col, self.column_count));
        }
        Ok(self
            .data_rows()
            .iter()
            .filter_map(|row| row.get(col))
            .collect())
    }

    /// Keep only the data rows for which `keep` returns true. The header is untouched.
    pub fn retain_data_rows<F: FnMut(&Row) -> bool>(&mut self, mut keep: F) {
        let offset = self.data_offset();
        let mut index = 0;
        self.rows.retain(|row| {
            let is_header = index < offset;
            index += 1;
            is_header || keep(row)
        });
    }

    /// Mutable access to the data rows, for reordering or bulk field updates
    pub fn data_rows_mut(&mut self) -> &mut [Row] {
        let offset = self.data_offset();
        &mut self.rows[offset..]
    }
}

/// Untrusted serialized form, validated through [`Table::from_rows`]
#[derive(Deserialize)]
struct TableData {
    rows: Vec<Row>,
    #[serde(default)]
    column_count: usize,
    #[serde(default)]
    has_header: bool,
}

impl TryFrom<TableData> for Table {
    type Error = Error;

    fn try_from(data: TableData) -> Result<Self> {
        // Columns without rows only survive through the stored width
        if data.rows.is_empty() {
            return Ok(Table {
                rows: Vec::new(),
                column_count: data.column_count,
                has_header: data.has_header,
            });
        }
        let table = Table::from_rows(data.rows, data.has_header)?;
        if data.column_count != 0 && data.column_count != table.column_count {
            return Err(Error::Shape {
                expected: data.column_count,
                found: table.column_count,
            });
        }
        Ok(table)
    }
}
