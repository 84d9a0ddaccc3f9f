//! Domain models for the reestr pipeline.
//!
//! - [`Table`] - Ordered columns and string rows parsed from an upload
//! - [`Row`] - Borrowed view of one row, addressed by column name
//! - [`Selection`] - The ID and phone columns picked by the user
//! - [`Target`] - Which selected column an operation applies to

use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use crate::error::{TableError, TransformError};

/// Output label of the identifier column.
pub const OUTPUT_ID_COLUMN: &str = "ZSIM_ID";

/// Output label of the phone column.
pub const OUTPUT_PHONE_COLUMN: &str = "ZSIM_PHNR";

// =============================================================================
// Table
// =============================================================================

/// A rectangular table of strings with uniquely named columns.
///
/// Column order and row order are preserved by every operation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Table {
    columns: Vec<String>,
    rows: Vec<Vec<String>>,
}

impl Table {
    /// Build a table, checking column names are unique and every row has
    /// one value per column.
    pub fn new(columns: Vec<String>, rows: Vec<Vec<String>>) -> Result<Self, TableError> {
        let mut seen = HashSet::with_capacity(columns.len());
        for name in &columns {
            if !seen.insert(name.as_str()) {
                return Err(TableError::DuplicateColumn(name.clone()));
            }
        }

        for (i, row) in rows.iter().enumerate() {
            if row.len() != columns.len() {
                return Err(TableError::RaggedRow {
                    row: i,
                    expected: columns.len(),
                    found: row.len(),
                });
            }
        }

        Ok(Self { columns, rows })
    }

    /// Column names in order.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Number of rows.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Position of a column.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn has_column(&self, name: &str) -> bool {
        self.column_index(name).is_some()
    }

    /// All values of one column, in row order.
    pub fn column_values(&self, name: &str) -> Option<Vec<&str>> {
        let idx = self.column_index(name)?;
        Some(self.rows.iter().map(|r| r[idx].as_str()).collect())
    }

    /// Iterate rows as name-addressable views.
    pub fn rows(&self) -> impl Iterator<Item = Row<'_>> {
        self.rows.iter().map(move |values| Row {
            columns: &self.columns,
            values,
        })
    }

    /// Raw row values.
    pub fn raw_rows(&self) -> &[Vec<String>] {
        &self.rows
    }

    /// First `n` rows.
    pub fn head(&self, n: usize) -> Table {
        Table {
            columns: self.columns.clone(),
            rows: self.rows.iter().take(n).cloned().collect(),
        }
    }

    /// Projection onto `names`, in the given order.
    pub fn select(&self, names: &[&str]) -> Result<Table, TableError> {
        let indices = names
            .iter()
            .map(|n| {
                self.column_index(n)
                    .ok_or_else(|| TableError::UnknownColumn(n.to_string()))
            })
            .collect::<Result<Vec<_>, _>>()?;

        let columns = names.iter().map(|n| n.to_string()).collect();
        let rows = self
            .rows
            .iter()
            .map(|r| indices.iter().map(|&i| r[i].clone()).collect())
            .collect();

        Table::new(columns, rows)
    }

    /// Rename one column, keeping its position.
    pub fn rename_column(&mut self, from: &str, to: &str) -> Result<(), TableError> {
        let idx = self
            .column_index(from)
            .ok_or_else(|| TableError::UnknownColumn(from.to_string()))?;
        if from != to && self.has_column(to) {
            return Err(TableError::DuplicateColumn(to.to_string()));
        }
        self.columns[idx] = to.to_string();
        Ok(())
    }

    /// Replace every value of a column with the output of `f`.
    ///
    /// All-or-nothing: if `f` fails on any row the table is left untouched
    /// and the error carries that row's index.
    pub fn try_map_column<E, F>(&mut self, name: &str, mut f: F) -> Result<(), E>
    where
        F: FnMut(usize, &str) -> Result<String, E>,
        E: From<TransformError>,
    {
        let idx = self
            .column_index(name)
            .ok_or_else(|| TransformError::UnknownColumn(name.to_string()))?;

        let new_values = self
            .rows
            .iter()
            .enumerate()
            .map(|(i, r)| f(i, &r[idx]))
            .collect::<Result<Vec<_>, E>>()?;

        for (row, value) in self.rows.iter_mut().zip(new_values) {
            row[idx] = value;
        }
        Ok(())
    }
}

/// One row of a [`Table`].
#[derive(Debug, Clone, Copy)]
pub struct Row<'a> {
    columns: &'a [String],
    values: &'a [String],
}

impl<'a> Row<'a> {
    /// Value under a column name.
    pub fn get(&self, column: &str) -> Option<&'a str> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| self.values[i].as_str())
    }

    pub fn values(&self) -> &'a [String] {
        self.values
    }

    /// `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.columns
            .iter()
            .zip(self.values.iter())
            .map(|(c, v)| (c.as_str(), v.as_str()))
    }
}

// =============================================================================
// Selection
// =============================================================================

/// The two columns an editing session works on.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Selection {
    pub id_column: String,
    pub phone_column: String,
}

impl Selection {
    pub fn new(id_column: impl Into<String>, phone_column: impl Into<String>) -> Self {
        Self {
            id_column: id_column.into(),
            phone_column: phone_column.into(),
        }
    }

    /// Column name a target resolves to.
    pub fn column(&self, target: Target) -> &str {
        match target {
            Target::Id => &self.id_column,
            Target::Phone => &self.phone_column,
        }
    }
}

// =============================================================================
// Target
// =============================================================================

/// Which of the selected columns an operation rewrites.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Target {
    Id,
    Phone,
}

impl Target {
    pub fn as_str(&self) -> &'static str {
        match self {
            Target::Id => "id",
            Target::Phone => "phone",
        }
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Target {
    type Err = TransformError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "id" => Ok(Target::Id),
            "phone" => Ok(Target::Phone),
            _ => Err(TransformError::UnknownTarget(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn strings(values: &[&str]) -> Vec<String> {
        values.iter().map(|s| s.to_string()).collect()
    }

    fn sample() -> Table {
        Table::new(
            strings(&["Name", "ICCID", "Phone"]),
            vec![
                strings(&["a", "8970101", "9161234567"]),
                strings(&["b", "8970102", "9167654321"]),
                strings(&["c", "8970103", "9160000000"]),
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_duplicate_columns_rejected() {
        let err = Table::new(strings(&["A", "A"]), vec![]).unwrap_err();
        assert_eq!(err, TableError::DuplicateColumn("A".into()));
    }

    #[test]
    fn test_ragged_rows_rejected() {
        let err = Table::new(strings(&["A", "B"]), vec![strings(&["1"])]).unwrap_err();
        assert_eq!(
            err,
            TableError::RaggedRow {
                row: 0,
                expected: 2,
                found: 1
            }
        );
    }

    #[test]
    fn test_select_reorders_columns() {
        let table = sample().select(&["ICCID", "Phone"]).unwrap();
        assert_eq!(table.columns(), &["ICCID", "Phone"]);
        assert_eq!(table.len(), 3);
        assert_eq!(table.raw_rows()[1], strings(&["8970102", "9167654321"]));
    }

    #[test]
    fn test_select_unknown_column() {
        let err = sample().select(&["ICCID", "Missing"]).unwrap_err();
        assert_eq!(err, TableError::UnknownColumn("Missing".into()));
    }

    #[test]
    fn test_row_view() {
        let table = sample();
        let row = table.rows().nth(2).unwrap();
        assert_eq!(row.get("Phone"), Some("9160000000"));
        assert_eq!(row.get("Nope"), None);
        assert_eq!(row.iter().next(), Some(("Name", "c")));
    }

    #[test]
    fn test_head() {
        let table = sample();
        assert_eq!(table.head(2).len(), 2);
        assert_eq!(table.head(10).len(), 3);
    }

    #[test]
    fn test_rename_column() {
        let mut table = sample();
        table.rename_column("ICCID", OUTPUT_ID_COLUMN).unwrap();
        assert_eq!(table.columns(), &["Name", "ZSIM_ID", "Phone"]);
        assert!(table.rename_column("Name", "Phone").is_err());
    }

    #[test]
    fn test_try_map_column_is_all_or_nothing() {
        let mut table = sample();
        let before = table.clone();
        let result: Result<(), TransformError> = table.try_map_column("ICCID", |i, v| {
            if i == 2 {
                Err(TransformError::UnknownOperation("boom".into()))
            } else {
                Ok(format!("{}0", v))
            }
        });
        assert!(result.is_err());
        assert_eq!(table, before);
    }

    #[test]
    fn test_target_parsing() {
        assert_eq!("ID".parse::<Target>().unwrap(), Target::Id);
        assert_eq!(" phone ".parse::<Target>().unwrap(), Target::Phone);
        assert!("email".parse::<Target>().is_err());
    }

    #[test]
    fn test_selection_column() {
        let sel = Selection::new("ICCID", "Phone");
        assert_eq!(sel.column(Target::Id), "ICCID");
        assert_eq!(sel.column(Target::Phone), "Phone");
    }
}
