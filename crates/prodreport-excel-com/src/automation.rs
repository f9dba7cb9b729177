//! [`OfficeAutomation`] backed by the COM bridge.

use std::path::Path;

use excel_com_protocol::{Command, ResponseData};
use prodreport_core::{
    AutomationError, AutomationResult, CellAddress, CellRange, CellValue, OfficeAutomation,
    PastedImage, WorkbookId,
};
use tracing::{debug, info, warn};

use crate::bridge::{host_path, BridgeError, ExcelBridge, ExcelBridgeConfig};
use crate::convert::{from_wire, to_wire};

impl From<BridgeError> for AutomationError {
    fn from(err: BridgeError) -> Self {
        match err {
            BridgeError::NotRunning => AutomationError::NotRunning,
            BridgeError::Command { command, message } => AutomationError::Command {
                operation: command,
                message,
            },
            BridgeError::UnexpectedResponse(command) => AutomationError::UnexpectedResponse(command),
            e @ (BridgeError::SpawnFailed(_)
            | BridgeError::WineNotFound
            | BridgeError::BridgeExeNotFound(_)) => AutomationError::Launch(e.to_string()),
            other => AutomationError::Transport(other.to_string()),
        }
    }
}

/// Excel driven through the bridge process.
///
/// The bridge is started by [`launch`](OfficeAutomation::launch) and
/// stopped by [`quit`](OfficeAutomation::quit); dropping the value kills
/// a bridge that is still running.
pub struct ExcelAutomation {
    config: ExcelBridgeConfig,
    bridge: Option<ExcelBridge>,
}

impl ExcelAutomation {
    pub fn new(config: ExcelBridgeConfig) -> Self {
        Self {
            config,
            bridge: None,
        }
    }

    fn bridge(&self) -> AutomationResult<&ExcelBridge> {
        self.bridge.as_ref().ok_or(AutomationError::NotRunning)
    }

    fn send(&self, command: Command) -> AutomationResult<Option<ResponseData>> {
        Ok(self.bridge()?.send_command(command)?)
    }

    fn send_unit(&self, command: Command) -> AutomationResult<()> {
        self.send(command).map(|_| ())
    }
}

fn unexpected(operation: &str) -> AutomationError {
    AutomationError::UnexpectedResponse(operation.to_string())
}

impl OfficeAutomation for ExcelAutomation {
    fn launch(&mut self) -> AutomationResult<()> {
        if self.bridge.is_some() {
            return Ok(());
        }
        info!("starting Excel bridge");
        self.bridge = Some(ExcelBridge::start(&self.config)?);
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.bridge.is_some()
    }

    fn open_workbook(&mut self, path: &Path) -> AutomationResult<WorkbookId> {
        let bridge = self.bridge()?;
        let host = host_path(path, bridge.uses_wine());
        debug!(path = %host, "opening workbook");
        match bridge.send_command(Command::OpenWorkbook { path: host })? {
            Some(ResponseData::WorkbookHandle { workbook }) => Ok(WorkbookId(workbook)),
            _ => Err(unexpected("OpenWorkbook")),
        }
    }

    fn recalculate(&mut self) -> AutomationResult<()> {
        self.send_unit(Command::Recalculate)
    }

    fn read_range(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<Vec<Vec<CellValue>>> {
        let data = self.send(Command::GetRangeValues {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            range: range.to_a1_string(),
        })?;
        match data {
            Some(ResponseData::Values { rows }) => Ok(rows
                .into_iter()
                .map(|row| row.into_iter().map(from_wire).collect())
                .collect()),
            _ => Err(unexpected("GetRangeValues")),
        }
    }

    fn write_range(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        origin: CellAddress,
        rows: &[Vec<CellValue>],
    ) -> AutomationResult<()> {
        if rows.is_empty() {
            return Ok(());
        }
        self.send_unit(Command::SetRangeValues {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            cell: origin.to_a1_string(),
            rows: rows
                .iter()
                .map(|row| row.iter().map(to_wire).collect())
                .collect(),
        })
    }

    fn clear_contents(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()> {
        self.send_unit(Command::ClearContents {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            range: range.to_a1_string(),
        })
    }

    fn last_used_row(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        col: u32,
    ) -> AutomationResult<u32> {
        match self.send(Command::LastUsedRow {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            column: col,
        })? {
            Some(ResponseData::Row { row }) => Ok(row),
            _ => Err(unexpected("LastUsedRow")),
        }
    }

    fn run_macro(&mut self, workbook: WorkbookId, name: &str) -> AutomationResult<()> {
        debug!(name, "running macro");
        self.send_unit(Command::RunMacro {
            workbook: workbook.0,
            name: name.to_string(),
        })
    }

    fn render_range_as_image(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()> {
        self.send_unit(Command::CopyRangeAsPicture {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            range: range.to_a1_string(),
        })
    }

    fn paste_image(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        anchor: CellAddress,
    ) -> AutomationResult<PastedImage> {
        match self.send(Command::PastePicture {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            cell: anchor.to_a1_string(),
        })? {
            Some(ResponseData::Picture { height }) => Ok(PastedImage { height }),
            _ => Err(unexpected("PastePicture")),
        }
    }

    fn delete_images_in(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        zone: &CellRange,
    ) -> AutomationResult<usize> {
        match self.send(Command::DeleteShapesInRange {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            range: zone.to_a1_string(),
        })? {
            Some(ResponseData::Count { count }) => Ok(count),
            _ => Err(unexpected("DeleteShapesInRange")),
        }
    }

    fn image_anchor_rows(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
    ) -> AutomationResult<Vec<u32>> {
        match self.send(Command::ShapeAnchorRows {
            workbook: workbook.0,
            sheet: sheet.to_string(),
        })? {
            Some(ResponseData::Rows { rows_list }) => Ok(rows_list),
            _ => Err(unexpected("ShapeAnchorRows")),
        }
    }

    fn set_row_height(
        &mut self,
        workbook: WorkbookId,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> AutomationResult<()> {
        self.send_unit(Command::SetRowHeight {
            workbook: workbook.0,
            sheet: sheet.to_string(),
            row,
            height,
        })
    }

    fn save_workbook(&mut self, workbook: WorkbookId) -> AutomationResult<()> {
        self.send_unit(Command::SaveWorkbook {
            workbook: workbook.0,
            path: None,
        })
    }

    fn close_workbook(&mut self, workbook: WorkbookId) -> AutomationResult<()> {
        self.send_unit(Command::CloseWorkbook {
            workbook: workbook.0,
        })
    }

    fn quit(&mut self) -> AutomationResult<()> {
        let Some(bridge) = self.bridge.take() else {
            return Ok(());
        };
        info!("stopping Excel bridge");
        bridge.shutdown().map_err(|e| {
            warn!(error = %e, "bridge shutdown was not clean");
            AutomationError::from(e)
        })
    }
}
