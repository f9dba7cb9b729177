//! # prodreport
//!
//! The daily production report, as one linear run over three workbooks:
//!
//! 1. read the production overview (`43.xls`)
//! 2. land it on the report's landing sheet
//! 3. locate yesterday's column in the plan and check it is fixed
//! 4. copy the plan block under it
//! 5. paste the block next to the matching date on the calculation sheet
//! 6. recalculate the report in Excel (retried)
//! 7. scan the calculation sheet for qualifying labels
//! 8. render a filtered, sorted picture under each label
//!
//! Steps 1 to 5 and 7 edit and read the files directly; 6 and 8 go through
//! an [`OfficeAutomation`](prodreport_core::OfficeAutomation) back end.
//!
//! ## Example
//!
//! ```no_run
//! use std::path::Path;
//!
//! use prodreport::{Config, Pipeline, SystemProcesses};
//! use prodreport_excel_com::ExcelAutomation;
//!
//! # fn main() -> prodreport::Result<()> {
//! let config = Config::default();
//! let files = config.resolve_files(Path::new("."))?;
//! let excel = ExcelAutomation::new(config.bridge.to_bridge_config(Path::new(".")));
//! let processes = SystemProcesses::from_config(&config.processes);
//!
//! let summary = Pipeline::new(config, files, excel, processes).run()?;
//! println!("{} labels rendered", summary.labels.len());
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod error;
pub mod guard;
pub mod pipeline;
pub mod recalc;
pub mod render;

pub use config::{BridgeConfig, Config, FilesConfig, ProcessConfig, RecalcConfig, ResolvedFiles};
pub use error::{PipelineError, Result};
pub use guard::{ProcessLockGuard, ProcessTerminator, SystemProcesses};
pub use pipeline::{Pipeline, RunSummary};
pub use recalc::{recalculate_report, RecalcDriver, RecalcOutcome, RecalcState};
pub use render::{render_labels, RenderSummary};
