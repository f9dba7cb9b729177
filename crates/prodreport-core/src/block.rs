//! Fixed-shape value block moved from the plan into the report

use crate::cell::{CellAddress, CellRange, CellValue};
use crate::error::{Error, Result};
use crate::grid::SheetGrid;
use crate::MAX_COLS;

/// A rectangular block of evaluated values.
///
/// Every row has exactly `width` cells. Built once by [`copy_block`] and
/// consumed by the paste step.
#[derive(Debug, Clone, PartialEq)]
pub struct CopiedBlock {
    width: usize,
    rows: Vec<Vec<CellValue>>,
}

impl CopiedBlock {
    /// Build a block from rows, padding or truncating each to `width`
    pub fn from_rows(width: usize, rows: Vec<Vec<CellValue>>) -> Self {
        let rows = rows
            .into_iter()
            .map(|mut row| {
                row.resize(width, CellValue::Empty);
                row
            })
            .collect();
        Self { width, rows }
    }

    /// Number of rows
    pub fn height(&self) -> usize {
        self.rows.len()
    }

    /// Number of columns
    pub fn width(&self) -> usize {
        self.width
    }

    /// Rows in source order
    pub fn rows(&self) -> &[Vec<CellValue>] {
        &self.rows
    }

    /// Take the rows out
    pub fn into_rows(self) -> Vec<Vec<CellValue>> {
        self.rows
    }
}

/// Copy rows `first_row..=last_row` of `width` columns starting at `first_col`
pub fn copy_block(
    grid: &SheetGrid,
    first_row: u32,
    last_row: u32,
    first_col: u32,
    width: u32,
) -> CopiedBlock {
    let last_col = first_col + width.saturating_sub(1);
    let rows = (first_row..=last_row)
        .map(|row| grid.row_values(row, first_col, last_col))
        .collect();
    CopiedBlock::from_rows(width as usize, rows)
}

/// Column the block is pasted at, relative to a located date column
pub fn paste_origin(date_col: u32, shift: i32) -> Result<u32> {
    let col = i64::from(date_col) + i64::from(shift);
    if col < 1 || col > i64::from(MAX_COLS) {
        return Err(Error::InvalidLayout(format!(
            "paste column {} (date column {} shifted by {}) is outside the sheet",
            col, date_col, shift
        )));
    }
    Ok(col as u32)
}

/// The cells a paste touches.
///
/// The clear area is at least as tall as the configured block, so a shorter
/// block never leaves rows of an earlier paste behind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PasteFootprint {
    pub origin: CellAddress,
    pub clear: CellRange,
}

impl PasteFootprint {
    /// Footprint for `block` pasted at `origin`, clearing at least `min_rows`
    pub fn new(origin: CellAddress, block: &CopiedBlock, min_rows: u32) -> Self {
        let rows = (block.height() as u32).max(min_rows).max(1);
        let cols = (block.width() as u32).max(1);
        let clear = CellRange::from_bounds(
            origin.row,
            origin.col,
            origin.row + rows - 1,
            origin.col + cols - 1,
        );
        Self { origin, clear }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn plan_grid() -> SheetGrid {
        let mut grid = SheetGrid::new("plan");
        for row in 1..=50 {
            for col in 1..=12 {
                grid.set(row, col, CellValue::Number(f64::from(row * 100 + col)));
            }
        }
        grid
    }

    #[test]
    fn test_copy_39_by_3() {
        let grid = plan_grid();
        let block = copy_block(&grid, 6, 44, 7, 3);

        assert_eq!(block.height(), 39);
        assert!(block.rows().iter().all(|row| row.len() == 3));
        assert_eq!(
            block.rows()[0],
            vec![
                CellValue::Number(607.0),
                CellValue::Number(608.0),
                CellValue::Number(609.0)
            ]
        );
        assert_eq!(
            block.rows()[38],
            vec![
                CellValue::Number(4407.0),
                CellValue::Number(4408.0),
                CellValue::Number(4409.0)
            ]
        );
        for (i, row) in block.rows().iter().enumerate() {
            let expected_row = 6 + i as u32;
            assert_eq!(row[0], CellValue::Number(f64::from(expected_row * 100 + 7)));
        }
    }

    #[test]
    fn test_copy_keeps_blanks() {
        let mut grid = SheetGrid::new("plan");
        grid.set(6, 2, "x");
        let block = copy_block(&grid, 6, 7, 1, 3);
        assert_eq!(
            block.into_rows(),
            vec![
                vec![CellValue::Empty, CellValue::string("x"), CellValue::Empty],
                vec![CellValue::Empty, CellValue::Empty, CellValue::Empty],
            ]
        );
    }

    #[test]
    fn test_paste_origin() {
        assert_eq!(paste_origin(8, -1).unwrap(), 7);
        assert!(paste_origin(1, -1).is_err());
    }

    #[test]
    fn test_footprint_covers_configured_height() {
        let block = CopiedBlock::from_rows(3, vec![vec![CellValue::Number(1.0)]; 5]);
        let fp = PasteFootprint::new(CellAddress::new(4, 7), &block, 39);
        assert_eq!(fp.clear.to_string(), "G4:I42");

        let tall = CopiedBlock::from_rows(3, vec![Vec::new(); 50]);
        let fp = PasteFootprint::new(CellAddress::new(4, 7), &tall, 39);
        assert_eq!(fp.clear.row_count(), 50);
    }
}
