//! Error type for the pipeline

use std::path::PathBuf;

use prodreport_core::AutomationError;
use prodreport_xlsx::XlsxError;
use thiserror::Error;

/// Result type alias using [`PipelineError`]
pub type Result<T> = std::result::Result<T, PipelineError>;

/// Errors that stop a pipeline run
#[derive(Debug, Error)]
pub enum PipelineError {
    /// One of the three input files is not where the configuration says
    #[error("Required file is missing: {}", .0.display())]
    MissingFile(PathBuf),

    /// The configuration file could not be read or is invalid
    #[error("Invalid configuration: {0}")]
    Config(String),

    /// Layout, locator and plan checks
    #[error(transparent)]
    Core(#[from] prodreport_core::Error),

    /// Reading or editing a workbook file
    #[error(transparent)]
    Xlsx(#[from] XlsxError),

    /// The office application refused or failed an operation
    #[error(transparent)]
    Automation(#[from] AutomationError),

    /// Every recalculation attempt failed
    #[error("Recalculation failed after {attempts} attempt(s): {last}")]
    RecalculationFailed {
        attempts: u32,
        last: AutomationError,
    },
}
