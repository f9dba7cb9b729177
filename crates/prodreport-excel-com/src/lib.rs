//! Excel automation for prodreport through a COM bridge process.
//!
//! The bridge (`excel-com-bridge.exe`) drives `Excel.Application` through
//! COM and talks JSON-over-stdio. On Windows it is started directly; on
//! other hosts it runs under WINE.
//!
//! # Architecture
//!
//! ```text
//! prodreport pipeline
//!     └── ExcelAutomation (OfficeAutomation)
//!           └── ExcelBridge (this crate)
//!                 └── spawns: [wine] excel-com-bridge.exe
//!                       └── COM: Excel.Application
//! ```
//!
//! # Example
//!
//! ```rust,no_run
//! use prodreport_core::OfficeAutomation;
//! use prodreport_excel_com::{ExcelAutomation, ExcelBridgeConfig};
//!
//! fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let mut excel = ExcelAutomation::new(ExcelBridgeConfig::default());
//!     excel.launch()?;
//!     let wb = excel.open_workbook("report.xlsm".as_ref())?;
//!     excel.recalculate()?;
//!     excel.save_workbook(wb)?;
//!     excel.close_workbook(wb)?;
//!     excel.quit()?;
//!     Ok(())
//! }
//! ```

mod automation;
mod bridge;
mod convert;

pub use automation::ExcelAutomation;
pub use bridge::{host_path, linux_to_wine_path, BridgeError, ExcelBridge, ExcelBridgeConfig};
