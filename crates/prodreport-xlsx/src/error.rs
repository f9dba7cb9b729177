//! Error types for reading and editing workbook files

use std::path::PathBuf;

use thiserror::Error;

/// Result type for workbook file operations
pub type XlsxResult<T> = std::result::Result<T, XlsxError>;

/// Errors that can occur while reading or editing workbook files
#[derive(Debug, Error)]
pub enum XlsxError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// ZIP error
    #[error("ZIP error: {0}")]
    Zip(#[from] zip::result::ZipError),

    /// XML error
    #[error("XML error: {0}")]
    Xml(#[from] quick_xml::Error),

    /// Error from the value reader
    #[error("Read error: {0}")]
    Read(#[from] calamine::Error),

    /// No reader could open the file
    #[error("Cannot read {path}: {message}")]
    SourceRead { path: PathBuf, message: String },

    /// Requested sheet does not exist
    #[error("Sheet '{sheet}' not found in {path}")]
    SheetNotFound { sheet: String, path: PathBuf },

    /// Invalid file format
    #[error("Invalid XLSX format: {0}")]
    InvalidFormat(String),

    /// Missing required part
    #[error("Missing required part: {0}")]
    MissingPart(String),

    /// Parse error
    #[error("Parse error: {0}")]
    Parse(String),
}
