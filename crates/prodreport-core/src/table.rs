//! The production overview as a header plus data rows

use std::collections::HashMap;

use crate::cell::CellValue;
use crate::grid::SheetGrid;

/// A tabular source: labelled columns and rows of mixed values.
///
/// Built once from the overview file and never mutated. Every data row has
/// exactly as many cells as there are columns.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceTable {
    columns: Vec<CellValue>,
    rows: Vec<Vec<CellValue>>,
}

impl SourceTable {
    /// Build a table, padding or truncating each row to the header width.
    ///
    /// Blank labels become `Unnamed: <index>`; a repeated label gets a
    /// `.1`, `.2`, ... suffix so every column name is unique.
    pub fn new(columns: Vec<CellValue>, rows: Vec<Vec<CellValue>>) -> Self {
        let width = columns.len();
        let mut seen: HashMap<String, usize> = HashMap::new();
        let columns = columns
            .into_iter()
            .enumerate()
            .map(|(idx, label)| {
                let label = if label.is_blank() {
                    CellValue::String(format!("Unnamed: {}", idx))
                } else {
                    label
                };
                let mut name = label.to_display_string();
                let mut count = seen.get(&name).copied().unwrap_or(0);
                if count == 0 {
                    seen.insert(name, 1);
                    return label;
                }
                while count > 0 {
                    seen.insert(name.clone(), count + 1);
                    name = format!("{}.{}", name, count);
                    count = seen.get(&name).copied().unwrap_or(0);
                }
                seen.insert(name.clone(), 1);
                CellValue::String(name)
            })
            .collect();
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { columns, rows }
    }

    /// Interpret a sheet as a table: the first populated row is the header,
    /// every row below it down to the last populated one is data
    pub fn from_grid(grid: &SheetGrid) -> Self {
        let Some(header_row) = grid.min_row() else {
            return Self::new(Vec::new(), Vec::new());
        };
        let width = grid.max_col();
        let columns = grid.row_values(header_row, 1, width);
        let rows = (header_row + 1..=grid.max_row())
            .map(|row| grid.row_values(row, 1, width))
            .collect();
        Self::new(columns, rows)
    }

    /// Column labels as written to the header row
    pub fn columns(&self) -> &[CellValue] {
        &self.columns
    }

    /// Column labels as text
    pub fn column_labels(&self) -> Vec<String> {
        self.columns.iter().map(CellValue::to_display_string).collect()
    }

    /// Data rows in source order
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Number of data rows (header excluded)
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    /// Header followed by data rows, the exact sheet image of the table
    pub fn to_sheet_rows(&self) -> Vec<Vec<CellValue>> {
        std::iter::once(self.columns.clone())
            .chain(self.rows.iter().cloned())
            .collect()
    }
}
