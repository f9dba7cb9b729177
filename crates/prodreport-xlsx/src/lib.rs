//! # prodreport-xlsx
//!
//! File access for the production report.
//!
//! - [`reader`] reads last calculated values of a sheet (`.xls`, `.xlsx`,
//!   `.xlsm`) into a [`SheetGrid`](prodreport_core::SheetGrid).
//! - [`package`] edits sheet data of an existing OOXML package in place,
//!   copying every untouched part (VBA project included) byte for byte.

pub mod error;
pub mod package;
pub mod reader;

mod escape;
mod formula;

pub use error::{XlsxError, XlsxResult};
pub use package::WorkbookPackage;
pub use reader::{read_sheet_grid, read_source_table};
