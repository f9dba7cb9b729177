//! Read-only snapshot of one sheet's values

use std::collections::BTreeMap;

use crate::cell::{CellRange, CellValue};

static EMPTY: CellValue = CellValue::Empty;

/// A sparse grid of last calculated cell values, addressed 1-based.
///
/// Readers fill it once; the pipeline only reads from it. Empty cells are
/// not stored.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SheetGrid {
    name: String,
    cells: BTreeMap<(u32, u32), CellValue>,
    max_row: u32,
    max_col: u32,
}

impl SheetGrid {
    /// Create an empty grid for the named sheet
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Sheet name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Store a value; storing `Empty` removes the cell
    pub fn set(&mut self, row: u32, col: u32, value: impl Into<CellValue>) {
        let value = value.into();
        if value.is_empty() {
            self.cells.remove(&(row, col));
            return;
        }
        self.max_row = self.max_row.max(row);
        self.max_col = self.max_col.max(col);
        self.cells.insert((row, col), value);
    }

    /// Value at (row, col), `Empty` when nothing is stored there
    pub fn get(&self, row: u32, col: u32) -> &CellValue {
        self.cells.get(&(row, col)).unwrap_or(&EMPTY)
    }

    /// Highest row holding a value (0 for an empty grid)
    pub fn max_row(&self) -> u32 {
        self.max_row
    }

    /// Highest column holding a value (0 for an empty grid)
    pub fn max_col(&self) -> u32 {
        self.max_col
    }

    /// Lowest row holding a value, if any
    pub fn min_row(&self) -> Option<u32> {
        self.cells.keys().next().map(|(row, _)| *row)
    }

    /// Number of non-empty cells
    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Last row with a value in the given column (0 when the column is empty)
    pub fn last_row_in_col(&self, col: u32) -> u32 {
        self.cells
            .keys()
            .filter(|(_, c)| *c == col)
            .map(|(r, _)| *r)
            .max()
            .unwrap_or(0)
    }

    /// Values of one row between two columns, inclusive
    pub fn row_values(&self, row: u32, first_col: u32, last_col: u32) -> Vec<CellValue> {
        (first_col..=last_col)
            .map(|col| self.get(row, col).clone())
            .collect()
    }

    /// Values of a rectangular range, row-major
    pub fn range_values(&self, range: &CellRange) -> Vec<Vec<CellValue>> {
        (range.start.row..=range.end.row)
            .map(|row| self.row_values(row, range.start.col, range.end.col))
            .collect()
    }

    /// Iterate non-empty cells in row-major order
    pub fn iter(&self) -> impl Iterator<Item = (u32, u32, &CellValue)> {
        self.cells.iter().map(|((r, c), v)| (*r, *c, v))
    }
}
