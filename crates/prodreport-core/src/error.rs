//! Error types for prodreport-core

use chrono::NaiveDate;
use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in prodreport-core
#[derive(Debug, Error)]
pub enum Error {
    /// Invalid cell address format
    #[error("Invalid cell address: {0}")]
    InvalidAddress(String),

    /// Invalid cell range format
    #[error("Invalid cell range: {0}")]
    InvalidRange(String),

    /// Row index out of bounds
    #[error("Row index {0} out of bounds (valid: 1..={1})")]
    RowOutOfBounds(u32, u32),

    /// Column index out of bounds
    #[error("Column index {0} out of bounds (valid: 1..={1})")]
    ColumnOutOfBounds(u32, u32),

    /// The target date does not appear in the header row
    #[error("Target date {date} not found in row {row} of sheet '{sheet}'")]
    DateNotFound {
        date: NaiveDate,
        sheet: String,
        row: u32,
    },

    /// The locked marker below the matched date is missing or different
    #[error("Plan is not fixed yet: expected '{expected}' at {cell} for {date}, found '{found}'")]
    PlanNotFinalized {
        date: NaiveDate,
        cell: String,
        expected: String,
        found: String,
    },

    /// A layout value violates its bounds
    #[error("Invalid layout: {0}")]
    InvalidLayout(String),
}
