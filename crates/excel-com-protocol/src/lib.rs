//! Shared protocol types for communication between the prodreport client and
//! the Windows COM bridge process (run directly on Windows, under WINE elsewhere).
//!
//! The protocol is JSON-over-stdio: one JSON object per line in each direction.
//! Rows and columns are 1-based, as in the sheets.

use serde::{Deserialize, Serialize};

/// A command sent from the client to the bridge process.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Request {
    /// Monotonically increasing request ID for correlating responses.
    pub id: u64,
    /// The command to execute.
    #[serde(flatten)]
    pub command: Command,
}

/// Commands the client can send to the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "cmd", content = "params")]
pub enum Command {
    /// Initialize COM and create the Excel.Application instance.
    Init,

    /// Open an existing workbook from a file path (Windows path).
    OpenWorkbook { path: String },

    /// Force a full recalculation of all open workbooks.
    Recalculate,

    /// Values of a rectangular range, row-major.
    GetRangeValues {
        workbook: u64,
        sheet: String,
        range: String,
    },

    /// Write values with `cell` as the top-left corner.
    SetRangeValues {
        workbook: u64,
        sheet: String,
        cell: String,
        rows: Vec<Vec<CellValue>>,
    },

    /// Clear values of a range, keeping formats.
    ClearContents {
        workbook: u64,
        sheet: String,
        range: String,
    },

    /// Last non-empty row of a column (`End(xlUp)` from the last sheet row).
    LastUsedRow {
        workbook: u64,
        sheet: String,
        column: u32,
    },

    /// Run a VBA macro by name in the context of a workbook.
    RunMacro { workbook: u64, name: String },

    /// Copy a range to the clipboard as a screen picture.
    CopyRangeAsPicture {
        workbook: u64,
        sheet: String,
        range: String,
    },

    /// Paste the clipboard picture with its top-left corner at `cell`.
    PastePicture {
        workbook: u64,
        sheet: String,
        cell: String,
    },

    /// Delete shapes whose top-left cell lies inside a range.
    DeleteShapesInRange {
        workbook: u64,
        sheet: String,
        range: String,
    },

    /// Top-left rows of every shape on a sheet.
    ShapeAnchorRows { workbook: u64, sheet: String },

    /// Set a row height in points.
    SetRowHeight {
        workbook: u64,
        sheet: String,
        row: u32,
        height: f64,
    },

    /// Save the workbook. Without a path it is saved in place, keeping its format.
    SaveWorkbook {
        workbook: u64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<String>,
    },

    /// Close a workbook without saving.
    CloseWorkbook { workbook: u64 },

    /// Shut down the bridge: close all workbooks, quit Excel, uninitialize COM.
    Shutdown,
}

impl Command {
    /// Command name as it appears on the wire
    pub fn name(&self) -> &'static str {
        match self {
            Command::Init => "Init",
            Command::OpenWorkbook { .. } => "OpenWorkbook",
            Command::Recalculate => "Recalculate",
            Command::GetRangeValues { .. } => "GetRangeValues",
            Command::SetRangeValues { .. } => "SetRangeValues",
            Command::ClearContents { .. } => "ClearContents",
            Command::LastUsedRow { .. } => "LastUsedRow",
            Command::RunMacro { .. } => "RunMacro",
            Command::CopyRangeAsPicture { .. } => "CopyRangeAsPicture",
            Command::PastePicture { .. } => "PastePicture",
            Command::DeleteShapesInRange { .. } => "DeleteShapesInRange",
            Command::ShapeAnchorRows { .. } => "ShapeAnchorRows",
            Command::SetRowHeight { .. } => "SetRowHeight",
            Command::SaveWorkbook { .. } => "SaveWorkbook",
            Command::CloseWorkbook { .. } => "CloseWorkbook",
            Command::Shutdown => "Shutdown",
        }
    }
}

/// A cell value that can be sent to/from Excel.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CellValue {
    Null,
    Bool(bool),
    Number(f64),
    String(String),
    Date(CellDate),
    Error(CellError),
}

/// A date as an Excel serial number (1900 date system).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellDate {
    pub serial: f64,
}

/// Excel error values.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellError {
    pub code: String,
}

/// A response sent from the bridge back to the client.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Response {
    /// The request ID this response corresponds to.
    pub id: u64,
    /// The result of the command.
    #[serde(flatten)]
    pub result: ResponseResult,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status")]
pub enum ResponseResult {
    #[serde(rename = "ok")]
    Ok {
        #[serde(skip_serializing_if = "Option::is_none")]
        data: Option<ResponseData>,
    },
    #[serde(rename = "error")]
    Error { message: String },
}

/// Data returned in successful responses.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResponseData {
    /// Handle to a newly opened workbook.
    WorkbookHandle { workbook: u64 },
    /// Range values, row-major.
    Values { rows: Vec<Vec<CellValue>> },
    /// A row number.
    Row { row: u32 },
    /// Rows of shape anchors.
    Rows { rows_list: Vec<u32> },
    /// Number of items affected.
    Count { count: usize },
    /// A pasted picture.
    Picture { height: f64 },
}

impl CellValue {
    pub fn is_null(&self) -> bool {
        matches!(self, CellValue::Null)
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            CellValue::Number(n) => Some(*n),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            CellValue::String(s) => Some(s),
            _ => None,
        }
    }
}

impl From<&str> for CellValue {
    fn from(s: &str) -> Self {
        CellValue::String(s.to_string())
    }
}

impl From<f64> for CellValue {
    fn from(n: f64) -> Self {
        CellValue::Number(n)
    }
}

impl From<bool> for CellValue {
    fn from(b: bool) -> Self {
        CellValue::Bool(b)
    }
}

impl std::fmt::Display for CellValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CellValue::Null => write!(f, "<empty>"),
            CellValue::Bool(b) => write!(f, "{}", if *b { "TRUE" } else { "FALSE" }),
            CellValue::Number(n) => write!(f, "{n}"),
            CellValue::String(s) => write!(f, "{s}"),
            CellValue::Date(d) => write!(f, "<date {}>", d.serial),
            CellValue::Error(e) => write!(f, "{}", e.code),
        }
    }
}
