//! Value readers for `.xls`, `.xlsx` and `.xlsm` files
//!
//! Formula cells come back as their last calculated value, exactly as the
//! office application saved them.

use std::fs::File;
use std::io::{BufReader, Read, Seek};
use std::path::Path;

use calamine::{open_workbook, open_workbook_auto, Data, Range, Reader, Sheets, Xls, Xlsx};
use prodreport_core::cell::serial::from_excel_serial;
use prodreport_core::{parse_date_text, CellValue, SheetGrid, SourceTable};

use crate::error::{XlsxError, XlsxResult};

/// Read the last calculated values of one sheet.
///
/// The file format is chosen from the extension.
pub fn read_sheet_grid(path: &Path, sheet: &str) -> XlsxResult<SheetGrid> {
    let mut workbook = open_workbook_auto(path)?;
    grid_from_workbook(&mut workbook, path, sheet)
}

/// Read the production overview table.
///
/// The legacy BIFF reader is tried first; when it cannot open the file the
/// OOXML reader gets a go, since exported "`.xls`" files are regularly
/// OOXML in disguise.
pub fn read_source_table(path: &Path, sheet: &str) -> XlsxResult<SourceTable> {
    let mut workbook = open_source(path)?;
    let grid = grid_from_workbook(&mut workbook, path, sheet)?;
    let table = SourceTable::from_grid(&grid);
    log::debug!(
        "Read {} rows x {} columns from {}",
        table.row_count(),
        table.column_count(),
        path.display()
    );
    Ok(table)
}

fn open_source(path: &Path) -> XlsxResult<Sheets<BufReader<File>>> {
    match open_workbook::<Xls<_>, _>(path) {
        Ok(workbook) => Ok(Sheets::Xls(workbook)),
        Err(xls_err) => {
            log::warn!(
                "Legacy reader failed on {} ({}), retrying as OOXML",
                path.display(),
                xls_err
            );
            let workbook: Xlsx<_> = open_workbook(path).map_err(|xlsx_err| XlsxError::SourceRead {
                path: path.to_path_buf(),
                message: format!("legacy reader: {}; OOXML reader: {}", xls_err, xlsx_err),
            })?;
            Ok(Sheets::Xlsx(workbook))
        }
    }
}

fn grid_from_workbook<RS: Read + Seek>(
    workbook: &mut Sheets<RS>,
    path: &Path,
    sheet: &str,
) -> XlsxResult<SheetGrid> {
    if !workbook.sheet_names().iter().any(|name| name == sheet) {
        return Err(XlsxError::SheetNotFound {
            sheet: sheet.to_string(),
            path: path.to_path_buf(),
        });
    }

    let range = workbook.worksheet_range(sheet)?;
    Ok(grid_from_range(sheet, &range))
}

/// Copy a value range into a grid at its absolute position
pub(crate) fn grid_from_range(sheet: &str, range: &Range<Data>) -> SheetGrid {
    let mut grid = SheetGrid::new(sheet);
    let Some((row_offset, col_offset)) = range.start() else {
        return grid;
    };

    for (row, col, data) in range.used_cells() {
        let value = convert_data(data);
        if value.is_empty() {
            continue;
        }
        grid.set(row_offset + row as u32 + 1, col_offset + col as u32 + 1, value);
    }
    grid
}

fn convert_data(data: &Data) -> CellValue {
    match data {
        Data::Empty => CellValue::Empty,
        Data::String(s) => CellValue::String(s.clone()),
        Data::Float(f) => CellValue::Number(*f),
        Data::Int(i) => CellValue::Number(*i as f64),
        Data::Bool(b) => CellValue::Boolean(*b),
        Data::Error(e) => CellValue::Error(e.to_string()),
        Data::DateTime(dt) => {
            let serial = dt.as_f64();
            match from_excel_serial(serial) {
                Some(value) if !dt.is_duration() => CellValue::DateTime(value),
                _ => CellValue::Number(serial),
            }
        }
        Data::DateTimeIso(s) => match parse_date_text(s) {
            Some(date) => CellValue::date(date),
            None => CellValue::String(s.clone()),
        },
        Data::DurationIso(s) => CellValue::String(s.clone()),
    }
}
