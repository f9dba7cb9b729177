//! # prodreport-core
//!
//! Core data structures and decision logic for the daily production report.
//!
//! Everything in this crate is pure: it works on in-memory snapshots of
//! sheets and never touches files or the office application.
//!
//! - [`CellValue`], [`CellAddress`], [`CellRange`] - cell model (1-based, like the sheets)
//! - [`SheetGrid`] - read-only snapshot of a sheet's last calculated values
//! - [`SourceTable`] - the production overview as read from disk
//! - [`TargetDateRule`] - weekday-dependent look-back rules
//! - [`find_date_column`] - locate a calendar day in a header row
//! - [`CopiedBlock`] - fixed-shape value block moved from the plan to the report
//! - [`scan_qualifying_labels`] - threshold scan over the calculation sheet
//! - [`OfficeAutomation`] - the seam to the live spreadsheet application
//!
//! ## Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use prodreport_core::{find_date_column, CellValue, DateColumnQuery, SheetGrid, TargetDateRule};
//!
//! let mut grid = SheetGrid::new("plan");
//! grid.set(4, 3, CellValue::string("2025-03-14"));
//!
//! // Monday looks back to Friday
//! let today = NaiveDate::from_ymd_opt(2025, 3, 17).unwrap();
//! let target = TargetDateRule::PreviousWorkday.target_date(today);
//!
//! let col = find_date_column(&grid, &DateColumnQuery::new(4, target)).unwrap();
//! assert_eq!(col, 3);
//! ```

pub mod automation;
pub mod block;
pub mod calendar;
pub mod cell;
pub mod error;
pub mod filter;
pub mod grid;
pub mod layout;
pub mod locate;
pub mod scan;
pub mod table;

pub use automation::{AutomationError, AutomationResult, OfficeAutomation, PastedImage, WorkbookId};
pub use block::{copy_block, paste_origin, CopiedBlock, PasteFootprint};
pub use calendar::{coerce_date, parse_date_text, TargetDateRule};
pub use cell::{CellAddress, CellRange, CellValue};
pub use error::{Error, Result};
pub use filter::{filter_lookup_rows, picture_last_row};
pub use grid::SheetGrid;
pub use layout::{Layout, PasteLayout, PlanLayout, RenderLayout, ScanLayout, SourceLayout};
pub use locate::{find_date_column, DateColumnQuery};
pub use scan::{parse_amount, scan_qualifying_labels};
pub use table::SourceTable;

/// Maximum number of rows in a worksheet (Excel limit)
pub const MAX_ROWS: u32 = 1_048_576;

/// Maximum number of columns in a worksheet (Excel limit, XFD)
pub const MAX_COLS: u32 = 16_384;
