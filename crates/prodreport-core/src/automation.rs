//! The seam to the live spreadsheet application.
//!
//! Recalculation, macros and pictures need a running office application.
//! Everything the pipeline asks of it goes through [`OfficeAutomation`], so a
//! recording mock can stand in for it in tests.

use std::path::Path;

use crate::cell::{CellAddress, CellRange, CellValue};

/// Handle to a workbook opened by the office application
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct WorkbookId(pub u64);

/// A picture placed on a sheet
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PastedImage {
    /// Height in points
    pub height: f64,
}

/// Errors raised by an automation back end
#[derive(Debug, thiserror::Error)]
pub enum AutomationError {
    #[error("Office application is not running")]
    NotRunning,

    #[error("Failed to launch office application: {0}")]
    Launch(String),

    #[error("{operation} failed: {message}")]
    Command { operation: String, message: String },

    #[error("Unexpected response to {0}")]
    UnexpectedResponse(String),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl AutomationError {
    /// Failure of a named operation
    pub fn command(operation: impl Into<String>, message: impl Into<String>) -> Self {
        AutomationError::Command {
            operation: operation.into(),
            message: message.into(),
        }
    }
}

/// Result type alias using [`AutomationError`]
pub type AutomationResult<T> = std::result::Result<T, AutomationError>;

/// Operations the pipeline needs from a running office application.
///
/// Sheets are addressed by name, cells 1-based. Implementations talk to a
/// single application instance; `launch` starts it and `quit` ends it.
pub trait OfficeAutomation {
    /// Start the application (no-op when already running)
    fn launch(&mut self) -> AutomationResult<()>;

    /// Whether `launch` succeeded and `quit` has not been called since
    fn is_running(&self) -> bool;

    fn open_workbook(&mut self, path: &Path) -> AutomationResult<WorkbookId>;

    /// Full recalculation of every open workbook
    fn recalculate(&mut self) -> AutomationResult<()>;

    /// Values of a range, row-major, `range.row_count()` rows of
    /// `range.col_count()` cells
    fn read_range(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<Vec<Vec<CellValue>>>;

    /// Write rows of values with `origin` as the top-left cell
    fn write_range(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        origin: CellAddress,
        rows: &[Vec<CellValue>],
    ) -> AutomationResult<()>;

    /// Clear values (not formatting) of a range
    fn clear_contents(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()>;

    /// Last row holding a value in `col`, scanning up from the bottom of
    /// the sheet. An empty column gives 0 or 1 depending on the back end.
    fn last_used_row(&mut self, workbook: WorkbookId, sheet: &str, col: u32)
        -> AutomationResult<u32>;

    fn run_macro(&mut self, workbook: WorkbookId, name: &str) -> AutomationResult<()>;

    /// Copy a range to the clipboard as a picture
    fn render_range_as_image(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()>;

    /// Paste the clipboard picture with its top-left corner at `anchor`
    fn paste_image(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        anchor: CellAddress,
    ) -> AutomationResult<PastedImage>;

    /// Delete every picture whose top-left anchor lies inside `zone`,
    /// returning how many were removed
    fn delete_images_in(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        zone: &CellRange,
    ) -> AutomationResult<usize>;

    /// Top-left anchor rows of every picture on the sheet
    fn image_anchor_rows(&mut self, workbook: WorkbookId, sheet: &str)
        -> AutomationResult<Vec<u32>>;

    /// Row height in points
    fn set_row_height(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> AutomationResult<()>;

    /// Save in place, keeping the file format
    fn save_workbook(&mut self, workbook: WorkbookId) -> AutomationResult<()>;

    /// Close without saving
    fn close_workbook(&mut self, workbook: WorkbookId) -> AutomationResult<()>;

    /// Close everything and stop the application
    fn quit(&mut self) -> AutomationResult<()>;
}

impl<T: OfficeAutomation + ?Sized> OfficeAutomation for &mut T {
    fn launch(&mut self) -> AutomationResult<()> {
        (**self).launch()
    }

    fn is_running(&self) -> bool {
        (**self).is_running()
    }

    fn open_workbook(&mut self, path: &Path) -> AutomationResult<WorkbookId> {
        (**self).open_workbook(path)
    }

    fn recalculate(&mut self) -> AutomationResult<()> {
        (**self).recalculate()
    }

    fn read_range(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<Vec<Vec<CellValue>>> {
        (**self).read_range(workbook, sheet, range)
    }

    fn write_range(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        origin: CellAddress,
        rows: &[Vec<CellValue>],
    ) -> AutomationResult<()> {
        (**self).write_range(workbook, sheet, origin, rows)
    }

    fn clear_contents(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()> {
        (**self).clear_contents(workbook, sheet, range)
    }

    fn last_used_row(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        col: u32,
    ) -> AutomationResult<u32> {
        (**self).last_used_row(workbook, sheet, col)
    }

    fn run_macro(&mut self, workbook: WorkbookId, name: &str) -> AutomationResult<()> {
        (**self).run_macro(workbook, name)
    }

    fn render_range_as_image(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()> {
        (**self).render_range_as_image(workbook, sheet, range)
    }

    fn paste_image(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        anchor: CellAddress,
    ) -> AutomationResult<PastedImage> {
        (**self).paste_image(workbook, sheet, anchor)
    }

    fn delete_images_in(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        zone: &CellRange,
    ) -> AutomationResult<usize> {
        (**self).delete_images_in(workbook, sheet, zone)
    }

    fn image_anchor_rows(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
    ) -> AutomationResult<Vec<u32>> {
        (**self).image_anchor_rows(workbook, sheet)
    }

    fn set_row_height(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> AutomationResult<()> {
        (**self).set_row_height(workbook, sheet, row, height)
    }

    fn save_workbook(&mut self, workbook: WorkbookId) -> AutomationResult<()> {
        (**self).save_workbook(workbook)
    }

    fn close_workbook(&mut self, workbook: WorkbookId) -> AutomationResult<()> {
        (**self).close_workbook(workbook)
    }

    fn quit(&mut self) -> AutomationResult<()> {
        (**self).quit()
    }
}
