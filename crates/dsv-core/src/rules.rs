//! Built-in rules and the JSON rule file format
//!
//! A rule file names a list of [`RuleSpec`] steps:
//!
//! ```json
//! {
//!   "name": "cleanup",
//!   "rules": [
//!     { "op": "trim" },
//!     { "op": "uppercase", "column": "code" },
//!     { "op": "filter_rows", "column": 2, "equals": "active" }
//!   ]
//! }
//! ```
//!
//! Columns are addressed by header name or zero-based index. Rows are
//! addressed by data-row index, so the header is never row 0.

use crate::error::{Error, Result};
use crate::pipeline::{Pipeline, Rule};
use crate::table::Table;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs;
use std::path::Path;

/// A column addressed by header name or index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ColumnRef {
    Index(usize),
    Name(String),
}

impl ColumnRef {
    fn resolve(&self, table: &Table, rule: &str) -> Result<usize> {
        match self {
            ColumnRef::Index(i) if *i < table.column_count() => Ok(*i),
            ColumnRef::Index(i) => Err(Error::rule(
                rule,
                format!("column {} out of range ({} columns)", i, table.column_count()),
            )),
            ColumnRef::Name(name) => table.find_column(name).ok_or_else(|| {
                let reason = if table.has_header() {
                    format!("column '{}' not found", name)
                } else {
                    format!("column '{}' cannot be found by name without a header", name)
                };
                Error::rule(rule, reason)
            }),
        }
    }
}

impl fmt::Display for ColumnRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ColumnRef::Index(i) => write!(f, "#{}", i),
            ColumnRef::Name(n) => write!(f, "'{}'", n),
        }
    }
}

impl From<usize> for ColumnRef {
    fn from(index: usize) -> Self {
        ColumnRef::Index(index)
    }
}

impl From<&str> for ColumnRef {
    fn from(name: &str) -> Self {
        ColumnRef::Name(name.to_string())
    }
}

/// A built-in transformation step
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum RuleSpec {
    /// Set one field of one data row
    SetField {
        row: usize,
        column: ColumnRef,
        value: String,
    },
    /// Replace every occurrence of `find` within a column
    Replace {
        column: ColumnRef,
        find: String,
        replace: String,
    },
    Uppercase {
        column: ColumnRef,
    },
    Lowercase {
        column: ColumnRef,
    },
    /// Trim surrounding whitespace in one column, or in every column
    Trim {
        #[serde(default)]
        column: Option<ColumnRef>,
    },
    InsertColumn {
        index: usize,
        #[serde(default)]
        header: String,
        #[serde(default)]
        fill: String,
    },
    RemoveColumn {
        column: ColumnRef,
    },
    /// Rename a header cell
    RenameColumn {
        column: ColumnRef,
        to: String,
    },
    /// Keep only data rows whose column equals `equals`
    FilterRows {
        column: ColumnRef,
        equals: String,
    },
    RemoveRow {
        row: usize,
    },
    /// Stable sort of the data rows by one column's text
    SortBy {
        column: ColumnRef,
        #[serde(default)]
        descending: bool,
    },
}

impl RuleSpec {
    fn op(&self) -> &'static str {
        match self {
            RuleSpec::SetField { .. } => "set_field",
            RuleSpec::Replace { .. } => "replace",
            RuleSpec::Uppercase { .. } => "uppercase",
            RuleSpec::Lowercase { .. } => "lowercase",
            RuleSpec::Trim { .. } => "trim",
            RuleSpec::InsertColumn { .. } => "insert_column",
            RuleSpec::RemoveColumn { .. } => "remove_column",
            RuleSpec::RenameColumn { .. } => "rename_column",
            RuleSpec::FilterRows { .. } => "filter_rows",
            RuleSpec::RemoveRow { .. } => "remove_row",
            RuleSpec::SortBy { .. } => "sort_by",
        }
    }

    fn data_row(&self, table: &Table, row: usize) -> Result<usize> {
        if row >= table.data_row_count() {
            return Err(Error::rule(
                self.op(),
                format!("data row {} out of range ({} rows)", row, table.data_row_count()),
            ));
        }
        Ok(row + table.data_offset())
    }
}

/// Apply `f` to every data field of column `col`
fn map_column<F: Fn(&str) -> String>(table: &mut Table, col: usize, f: F) {
    for row in table.data_rows_mut() {
        if let Some(field) = row.get_mut(col) {
            let updated = f(field.as_str());
            *field = updated;
        }
    }
}

impl Rule for RuleSpec {
    fn name(&self) -> &str {
        self.op()
    }

    fn apply(&self, table: &Table) -> Result<Table> {
        let op = self.op();
        let mut next = table.clone();

        match self {
            RuleSpec::SetField { row, column, value } => {
                let col = column.resolve(&next, op)?;
                let row = self.data_row(&next, *row)?;
                next.set_field(row, col, value.as_str())?;
            }
            RuleSpec::Replace {
                column,
                find,
                replace,
            } => {
                if find.is_empty() {
                    return Err(Error::rule(op, "search text must not be empty"));
                }
                let col = column.resolve(&next, op)?;
                map_column(&mut next, col, |s| s.replace(find.as_str(), replace));
            }
            RuleSpec::Uppercase { column } => {
                let col = column.resolve(&next, op)?;
                map_column(&mut next, col, str::to_uppercase);
            }
            RuleSpec::Lowercase { column } => {
                let col = column.resolve(&next, op)?;
                map_column(&mut next, col, str::to_lowercase);
            }
            RuleSpec::Trim { column } => {
                let columns = match column {
                    Some(c) => vec![c.resolve(&next, op)?],
                    None => (0..next.column_count()).collect(),
                };
                for col in columns {
                    map_column(&mut next, col, |s| s.trim().to_string());
                }
            }
            RuleSpec::InsertColumn {
                index,
                header,
                fill,
            } => {
                next.insert_column(*index, header, fill)
                    .map_err(|e| Error::rule(op, e.to_string()))?;
            }
            RuleSpec::RemoveColumn { column } => {
                let col = column.resolve(&next, op)?;
                next.remove_column(col)
                    .map_err(|e| Error::rule(op, e.to_string()))?;
            }
            RuleSpec::RenameColumn { column, to } => {
                if !next.has_header() || next.is_empty() {
                    return Err(Error::rule(op, "table has no header row"));
                }
                let col = column.resolve(&next, op)?;
                next.set_field(0, col, to.as_str())?;
            }
            RuleSpec::FilterRows { column, equals } => {
                let col = column.resolve(&next, op)?;
                next.retain_data_rows(|row| row.get(col) == Some(equals.as_str()));
            }
            RuleSpec::RemoveRow { row } => {
                let row = self.data_row(&next, *row)?;
                next.remove_row(row)?;
            }
            RuleSpec::SortBy { column, descending } => {
                let col = column.resolve(&next, op)?;
                let descending = *descending;
                next.data_rows_mut().sort_by(|a, b| {
                    let order = a.get(col).cmp(&b.get(col));
                    if descending {
                        order.reverse()
                    } else {
                        order
                    }
                });
            }
        }

        Ok(next)
    }
}

/// A named list of rules stored as JSON
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RuleFile {
    /// Name used to label batch history entries
    #[serde(default)]
    pub name: String,
    /// Rules in application order
    pub rules: Vec<RuleSpec>,
}

impl RuleFile {
    /// Create a new empty rule file
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
        }
    }

    /// Add a rule to the end of the list
    pub fn add_rule(&mut self, rule: RuleSpec) {
        self.rules.push(rule);
    }

    /// Load a rule file from JSON
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = fs::read_to_string(path.as_ref()).map_err(|e| Error::FileRead {
            path: path.as_ref().to_path_buf(),
            source: e,
        })?;
        serde_json::from_str(&content).map_err(Error::Json)
    }

    /// Save the rule file to JSON
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = serde_json::to_string_pretty(self)?;
        fs::write(path.as_ref(), content).map_err(|e| Error::FileWrite {
            path: path.as_ref().to_path_buf(),
            source: e,
        })
    }

    /// Build a pipeline over copies of these rules
    pub fn pipeline(&self) -> Pipeline {
        self.rules
            .iter()
            .cloned()
            .map(|r| Box::new(r) as Box<dyn Rule>)
            .collect()
    }
}
