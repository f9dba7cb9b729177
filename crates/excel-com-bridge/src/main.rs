//! Excel COM bridge: a Windows process that drives Excel through COM for
//! the report pipeline, controlled by JSON commands over stdin/stdout.
//!
//! Runs natively on Windows, or cross-compiled from Linux and run under WINE.
//!
//! Protocol: one JSON object per line (newline-delimited JSON).
//! - Reads `Request` objects from stdin
//! - Writes `Response` objects to stdout
//! - Diagnostic/log messages go to stderr (never stdout)

#[cfg(windows)]
mod dispatch;
#[cfg(windows)]
mod excel;

#[cfg(not(windows))]
fn main() {
    eprintln!("excel-com-bridge must be compiled for Windows (--target x86_64-pc-windows-gnu)");
    eprintln!("and run under WINE on Linux.");
    std::process::exit(1);
}

#[cfg(windows)]
fn main() {
    use std::io::{self, BufRead, Write};

    use excel_com_protocol::*;

    // Use stderr for all diagnostic output so stdout stays clean for protocol
    eprintln!("[excel-com-bridge] Starting up...");

    let stdin = io::stdin();
    let stdout = io::stdout();
    let mut out = stdout.lock();

    let mut excel: Option<excel::ExcelApp> = None;

    for line in stdin.lock().lines() {
        let line = match line {
            Ok(l) => l,
            Err(e) => {
                eprintln!("[excel-com-bridge] stdin read error: {e}");
                break;
            }
        };

        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        let request: Request = match serde_json::from_str(line) {
            Ok(r) => r,
            Err(e) => {
                eprintln!("[excel-com-bridge] JSON parse error: {e}");
                eprintln!("[excel-com-bridge] Line was: {line}");
                // Send an error response with id=0 since we couldn't parse the request
                let resp = Response {
                    id: 0,
                    result: ResponseResult::Error {
                        message: format!("JSON parse error: {e}"),
                    },
                };
                if let Ok(json) = serde_json::to_string(&resp) {
                    let _ = writeln!(out, "{json}");
                }
                let _ = out.flush();
                continue;
            }
        };

        let response = handle_command(&mut excel, &request);
        match serde_json::to_string(&response) {
            Ok(json) => {
                let _ = writeln!(out, "{json}");
            }
            Err(e) => eprintln!("[excel-com-bridge] could not encode response {id}: {e}", id = request.id),
        }
        let _ = out.flush();

        // If it was a shutdown command and it succeeded, exit
        if matches!(request.command, Command::Shutdown) {
            if matches!(response.result, ResponseResult::Ok { .. }) {
                eprintln!("[excel-com-bridge] Shutdown complete, exiting.");
                break;
            }
        }
    }

    // If Excel is still running when stdin closes, try to clean up
    if let Some(app) = excel {
        eprintln!("[excel-com-bridge] stdin closed, shutting down Excel...");
        let _ = app.shutdown();
    }

    eprintln!("[excel-com-bridge] Process exiting.");
}

#[cfg(windows)]
fn handle_command(
    excel: &mut Option<excel::ExcelApp>,
    request: &excel_com_protocol::Request,
) -> excel_com_protocol::Response {
    use excel_com_protocol::*;

    let id = request.id;

    let result = match &request.command {
        Command::Init => init_com_and_excel(excel),
        Command::OpenWorkbook { path } => with_excel(excel, |app| {
            let handle = app.open_workbook(path)?;
            Ok(Some(ResponseData::WorkbookHandle { workbook: handle }))
        }),
        Command::Recalculate => with_excel(excel, |app| {
            app.recalculate()?;
            Ok(None)
        }),
        Command::GetRangeValues {
            workbook,
            sheet,
            range,
        } => with_excel(excel, |app| {
            let rows = app.get_range_values(*workbook, sheet, range)?;
            Ok(Some(ResponseData::Values { rows }))
        }),
        Command::SetRangeValues {
            workbook,
            sheet,
            cell,
            rows,
        } => with_excel(excel, |app| {
            app.set_range_values(*workbook, sheet, cell, rows)?;
            Ok(None)
        }),
        Command::ClearContents {
            workbook,
            sheet,
            range,
        } => with_excel(excel, |app| {
            app.clear_contents(*workbook, sheet, range)?;
            Ok(None)
        }),
        Command::LastUsedRow {
            workbook,
            sheet,
            column,
        } => with_excel(excel, |app| {
            let row = app.last_used_row(*workbook, sheet, *column)?;
            Ok(Some(ResponseData::Row { row }))
        }),
        Command::RunMacro { workbook, name } => with_excel(excel, |app| {
            app.run_macro(*workbook, name)?;
            Ok(None)
        }),
        Command::CopyRangeAsPicture {
            workbook,
            sheet,
            range,
        } => with_excel(excel, |app| {
            app.copy_range_as_picture(*workbook, sheet, range)?;
            Ok(None)
        }),
        Command::PastePicture {
            workbook,
            sheet,
            cell,
        } => with_excel(excel, |app| {
            let height = app.paste_picture(*workbook, sheet, cell)?;
            Ok(Some(ResponseData::Picture { height }))
        }),
        Command::DeleteShapesInRange {
            workbook,
            sheet,
            range,
        } => with_excel(excel, |app| {
            let count = app.delete_shapes_in_range(*workbook, sheet, range)?;
            Ok(Some(ResponseData::Count { count }))
        }),
        Command::ShapeAnchorRows { workbook, sheet } => with_excel(excel, |app| {
            let rows_list = app.shape_anchor_rows(*workbook, sheet)?;
            Ok(Some(ResponseData::Rows { rows_list }))
        }),
        Command::SetRowHeight {
            workbook,
            sheet,
            row,
            height,
        } => with_excel(excel, |app| {
            app.set_row_height(*workbook, sheet, *row, *height)?;
            Ok(None)
        }),
        Command::SaveWorkbook { workbook, path } => with_excel(excel, |app| {
            app.save_workbook(*workbook, path.as_deref())?;
            Ok(None)
        }),
        Command::CloseWorkbook { workbook } => with_excel(excel, |app| {
            app.close_workbook(*workbook)?;
            Ok(None)
        }),
        Command::Shutdown => match excel.take() {
            Some(app) => match app.shutdown() {
                Ok(()) => {
                    uninit_com();
                    ResponseResult::Ok { data: None }
                }
                Err(e) => ResponseResult::Error {
                    message: format!("Shutdown failed: {e}"),
                },
            },
            None => ResponseResult::Ok { data: None },
        },
    };

    Response { id, result }
}

#[cfg(windows)]
fn init_com_and_excel(excel: &mut Option<excel::ExcelApp>) -> excel_com_protocol::ResponseResult {
    use excel_com_protocol::ResponseResult;
    use windows::Win32::System::Com::{CoInitializeEx, COINIT_APARTMENTTHREADED};

    if excel.is_some() {
        return ResponseResult::Ok { data: None }; // Already initialized
    }

    // Initialize COM in Single-Threaded Apartment mode (required by Excel)
    unsafe {
        let hr = CoInitializeEx(None, COINIT_APARTMENTTHREADED);
        if let Err(e) = hr.ok() {
            return ResponseResult::Error {
                message: format!("CoInitializeEx failed: {e}"),
            };
        }
    }

    eprintln!("[excel-com-bridge] COM initialized (STA)");

    match excel::ExcelApp::new() {
        Ok(app) => {
            eprintln!("[excel-com-bridge] Excel.Application created successfully");
            *excel = Some(app);
            ResponseResult::Ok { data: None }
        }
        Err(e) => ResponseResult::Error {
            message: format!("Failed to create Excel.Application: {e}"),
        },
    }
}

#[cfg(windows)]
fn uninit_com() {
    unsafe {
        windows::Win32::System::Com::CoUninitialize();
    }
    eprintln!("[excel-com-bridge] COM uninitialized");
}

#[cfg(windows)]
fn with_excel(
    excel: &mut Option<excel::ExcelApp>,
    f: impl FnOnce(
        &mut excel::ExcelApp,
    ) -> Result<Option<excel_com_protocol::ResponseData>, String>,
) -> excel_com_protocol::ResponseResult {
    match excel.as_mut() {
        Some(app) => match f(app) {
            Ok(data) => excel_com_protocol::ResponseResult::Ok { data },
            Err(e) => excel_com_protocol::ResponseResult::Error { message: e },
        },
        None => excel_com_protocol::ResponseResult::Error {
            message: "Excel not initialized. Send 'Init' command first.".to_string(),
        },
    }
}
