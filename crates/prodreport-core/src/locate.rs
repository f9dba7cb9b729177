//! Locate a calendar day in a header row

use chrono::NaiveDate;

use crate::calendar::coerce_date;
use crate::cell::CellAddress;
use crate::error::{Error, Result};
use crate::grid::SheetGrid;

/// What to look for and where
#[derive(Debug, Clone, PartialEq)]
pub struct DateColumnQuery {
    pub header_row: u32,
    pub target: NaiveDate,
    /// Required text directly below the matched date cell
    pub locked_marker: Option<String>,
}

impl DateColumnQuery {
    /// Query without a locked-marker requirement
    pub fn new(header_row: u32, target: NaiveDate) -> Self {
        Self {
            header_row,
            target,
            locked_marker: None,
        }
    }

    /// Require the given marker text one row below the match
    pub fn with_locked_marker(mut self, marker: impl Into<String>) -> Self {
        self.locked_marker = Some(marker.into());
        self
    }
}

/// Scan the header row left to right and return the first column whose
/// cell falls on the target day.
///
/// Cells that are not dates (numbers, unparseable text, blanks) are skipped.
/// When the query carries a locked marker, the cell below the match must hold
/// exactly that text.
pub fn find_date_column(grid: &SheetGrid, query: &DateColumnQuery) -> Result<u32> {
    let matched = (1..=grid.max_col()).find(|&col| {
        coerce_date(grid.get(query.header_row, col)) == Some(query.target)
    });

    let Some(col) = matched else {
        return Err(Error::DateNotFound {
            date: query.target,
            sheet: grid.name().to_string(),
            row: query.header_row,
        });
    };

    if let Some(marker) = &query.locked_marker {
        let marker_row = query.header_row + 1;
        let found = grid.get(marker_row, col);
        if found.as_str() != Some(marker.as_str()) {
            return Err(Error::PlanNotFinalized {
                date: query.target,
                cell: CellAddress::new(marker_row, col).to_a1_string(),
                expected: marker.clone(),
                found: found.to_display_string(),
            });
        }
    }

    Ok(col)
}
