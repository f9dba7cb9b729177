//! Excel-specific COM automation layer built on top of the generic IDispatch wrapper.

#![cfg(windows)]

use std::collections::HashMap;

use windows::Win32::System::Variant::VARIANT;

use excel_com_protocol::{CellDate, CellError, CellValue};

use crate::dispatch::{
    variant_bool, variant_date, variant_empty, variant_f64, variant_get_bool, variant_get_date,
    variant_get_error, variant_get_f64, variant_get_string, variant_i32, variant_is_empty,
    variant_str, DispatchObject,
};

/// `XlDirection.xlUp`
const XL_UP: i32 = -4162;
/// `XlPictureAppearance.xlScreen`
const XL_SCREEN: i32 = 1;
/// `XlCopyPictureFormat.xlBitmap`
const XL_BITMAP: i32 = 2;

/// Manages an Excel.Application COM instance and its open workbooks.
pub struct ExcelApp {
    app: DispatchObject,
    workbooks_collection: DispatchObject,
    /// Map from our handle IDs to workbook dispatch objects.
    workbooks: HashMap<u64, DispatchObject>,
    next_handle: u64,
}

impl ExcelApp {
    /// Create a new Excel.Application instance via COM.
    pub fn new() -> Result<Self, String> {
        let app = DispatchObject::create_from_progid("Excel.Application")?;

        app.set_property("Visible", variant_bool(false))?;
        app.set_property("DisplayAlerts", variant_bool(false))?;

        let workbooks_collection = app.get_child("Workbooks")?;

        Ok(Self {
            app,
            workbooks_collection,
            workbooks: HashMap::new(),
            next_handle: 1,
        })
    }

    /// Open a workbook from a file path. Returns the handle ID.
    pub fn open_workbook(&mut self, path: &str) -> Result<u64, String> {
        let wb = self
            .workbooks_collection
            .invoke_child("Open", &[variant_str(path)])?;
        let handle = self.next_handle;
        self.next_handle += 1;
        self.workbooks.insert(handle, wb);
        Ok(handle)
    }

    fn workbook(&self, wb_handle: u64) -> Result<&DispatchObject, String> {
        self.workbooks
            .get(&wb_handle)
            .ok_or_else(|| format!("Unknown workbook handle: {wb_handle}"))
    }

    /// Get a worksheet by name.
    fn get_sheet(&self, wb_handle: u64, sheet: &str) -> Result<DispatchObject, String> {
        self.workbook(wb_handle)?
            .get_child("Worksheets")?
            .get_indexed("Item", &variant_str(sheet))
    }

    fn get_range(&self, wb_handle: u64, sheet: &str, range: &str) -> Result<DispatchObject, String> {
        self.get_sheet(wb_handle, sheet)?
            .get_indexed("Range", &variant_str(range))
    }

    /// Force a full recalculation.
    pub fn recalculate(&self) -> Result<(), String> {
        self.app.invoke_method("CalculateFull", &[])?;
        Ok(())
    }

    /// Values of a range, row-major. Reads cell by cell so no SAFEARRAY
    /// handling is needed.
    pub fn get_range_values(
        &self,
        wb_handle: u64,
        sheet: &str,
        range: &str,
    ) -> Result<Vec<Vec<CellValue>>, String> {
        let range = self.get_range(wb_handle, sheet, range)?;
        let rows = count_of(&range, "Rows")?;
        let cols = count_of(&range, "Columns")?;
        let cells = range.get_child("Cells")?;

        let mut out = Vec::with_capacity(rows as usize);
        for r in 1..=rows {
            let mut row = Vec::with_capacity(cols as usize);
            for c in 1..=cols {
                let cell = cells.get_indexed_args("Item", &[variant_i32(r), variant_i32(c)])?;
                row.push(variant_to_cell_value(&cell.get_property("Value")?));
            }
            out.push(row);
        }
        Ok(out)
    }

    /// Write values with `cell` as the top-left corner.
    pub fn set_range_values(
        &self,
        wb_handle: u64,
        sheet: &str,
        cell: &str,
        rows: &[Vec<CellValue>],
    ) -> Result<(), String> {
        let origin = self.get_range(wb_handle, sheet, cell)?;
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                let target = origin
                    .get_indexed_args("Offset", &[variant_i32(r as i32), variant_i32(c as i32)])?;
                target.set_property("Value", cell_value_to_variant(value))?;
            }
        }
        Ok(())
    }

    pub fn clear_contents(&self, wb_handle: u64, sheet: &str, range: &str) -> Result<(), String> {
        self.get_range(wb_handle, sheet, range)?
            .invoke_method("ClearContents", &[])?;
        Ok(())
    }

    /// `Cells(Rows.Count, column).End(xlUp).Row`
    pub fn last_used_row(&self, wb_handle: u64, sheet: &str, column: u32) -> Result<u32, String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let last_sheet_row = count_of(&ws, "Rows")?;
        let bottom = ws
            .get_child("Cells")?
            .get_indexed_args("Item", &[variant_i32(last_sheet_row), variant_i32(column as i32)])?;
        let top = bottom.get_indexed("End", &variant_i32(XL_UP))?;
        int_property(&top, "Row")
    }

    /// Run a macro with the workbook active.
    pub fn run_macro(&self, wb_handle: u64, name: &str) -> Result<(), String> {
        self.workbook(wb_handle)?.invoke_method("Activate", &[])?;
        self.app.invoke_method("Run", &[variant_str(name)])?;
        Ok(())
    }

    /// Copy a range to the clipboard as a bitmap of its on-screen appearance.
    pub fn copy_range_as_picture(
        &self,
        wb_handle: u64,
        sheet: &str,
        range: &str,
    ) -> Result<(), String> {
        self.get_range(wb_handle, sheet, range)?
            .invoke_method("CopyPicture", &[variant_i32(XL_SCREEN), variant_i32(XL_BITMAP)])?;
        Ok(())
    }

    /// Paste the clipboard at `cell` and report the pasted shape's height.
    /// Clears the copy mode afterwards.
    pub fn paste_picture(&self, wb_handle: u64, sheet: &str, cell: &str) -> Result<f64, String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let destination = ws.get_indexed("Range", &variant_str(cell))?;
        ws.invoke_method("Paste", &[destination.to_variant(), variant_bool(false)])?;

        let shapes = ws.get_child("Shapes")?;
        let count = int_property(&shapes, "Count")?;
        if count == 0 {
            return Err("Paste produced no shape".to_string());
        }
        let pasted = shapes.get_indexed("Item", &variant_i32(count as i32))?;
        let height = variant_get_f64(&pasted.get_property("Height")?)
            .ok_or_else(|| "Shape height is not a number".to_string())?;

        self.app.set_property("CutCopyMode", variant_bool(false))?;
        Ok(height)
    }

    /// Delete shapes whose top-left cell lies inside `range`. Returns how many went.
    pub fn delete_shapes_in_range(
        &self,
        wb_handle: u64,
        sheet: &str,
        range: &str,
    ) -> Result<usize, String> {
        let ws = self.get_sheet(wb_handle, sheet)?;
        let zone = ws.get_indexed("Range", &variant_str(range))?;
        let first_row = int_property(&zone, "Row")?;
        let first_col = int_property(&zone, "Column")?;
        let last_row = first_row + count_of(&zone, "Rows")? as u32 - 1;
        let last_col = first_col + count_of(&zone, "Columns")? as u32 - 1;

        let shapes = ws.get_child("Shapes")?;
        let count = int_property(&shapes, "Count")?;
        let mut deleted = 0;
        // backwards, deleting shifts the indexes above
        for index in (1..=count).rev() {
            let shape = shapes.get_indexed("Item", &variant_i32(index as i32))?;
            let anchor = shape.get_child("TopLeftCell")?;
            let row = int_property(&anchor, "Row")?;
            let col = int_property(&anchor, "Column")?;
            if (first_row..=last_row).contains(&row) && (first_col..=last_col).contains(&col) {
                shape.invoke_method("Delete", &[])?;
                deleted += 1;
            }
        }
        Ok(deleted)
    }

    /// Top-left rows of every shape on the sheet.
    pub fn shape_anchor_rows(&self, wb_handle: u64, sheet: &str) -> Result<Vec<u32>, String> {
        let shapes = self.get_sheet(wb_handle, sheet)?.get_child("Shapes")?;
        let count = int_property(&shapes, "Count")?;
        let mut rows = Vec::with_capacity(count as usize);
        for index in 1..=count {
            let shape = shapes.get_indexed("Item", &variant_i32(index as i32))?;
            rows.push(int_property(&shape.get_child("TopLeftCell")?, "Row")?);
        }
        Ok(rows)
    }

    pub fn set_row_height(
        &self,
        wb_handle: u64,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> Result<(), String> {
        self.get_sheet(wb_handle, sheet)?
            .get_child("Rows")?
            .get_indexed("Item", &variant_i32(row as i32))?
            .set_property("RowHeight", variant_f64(height))
    }

    /// Save a workbook in place, or to a new path with the format chosen
    /// from its extension.
    pub fn save_workbook(&self, wb_handle: u64, path: Option<&str>) -> Result<(), String> {
        let wb = self.workbook(wb_handle)?;
        let Some(path) = path else {
            wb.invoke_method("Save", &[])?;
            return Ok(());
        };

        // xlOpenXMLWorkbookMacroEnabled = 52, xlOpenXMLWorkbook = 51, xlWorkbookNormal = -4143
        let lower = path.to_ascii_lowercase();
        let format: i32 = if lower.ends_with(".xlsm") {
            52
        } else if lower.ends_with(".xls") {
            -4143
        } else {
            51
        };

        wb.invoke_method("SaveAs", &[variant_str(path), variant_i32(format)])?;
        Ok(())
    }

    /// Close a workbook without saving.
    pub fn close_workbook(&mut self, wb_handle: u64) -> Result<(), String> {
        let wb = self
            .workbooks
            .remove(&wb_handle)
            .ok_or_else(|| format!("Unknown workbook handle: {wb_handle}"))?;
        wb.invoke_method("Close", &[variant_bool(false)])?;
        Ok(())
    }

    /// Shut down: close all workbooks and quit Excel.
    pub fn shutdown(mut self) -> Result<(), String> {
        let handles: Vec<u64> = self.workbooks.keys().copied().collect();
        for h in handles {
            let _ = self.close_workbook(h);
        }
        self.app.invoke_method("Quit", &[])?;
        Ok(())
    }
}

fn int_property(object: &DispatchObject, name: &str) -> Result<u32, String> {
    let value = object.get_property(name)?;
    variant_get_f64(&value)
        .filter(|n| *n >= 0.0)
        .map(|n| n as u32)
        .ok_or_else(|| format!("{name} is not a count"))
}

/// `object.<collection>.Count`
fn count_of(object: &DispatchObject, collection: &str) -> Result<i32, String> {
    Ok(int_property(&object.get_child(collection)?, "Count")? as i32)
}

/// Convert our protocol CellValue to a COM VARIANT.
fn cell_value_to_variant(value: &CellValue) -> VARIANT {
    match value {
        CellValue::Null => variant_empty(),
        CellValue::Bool(b) => variant_bool(*b),
        CellValue::Number(n) => variant_f64(*n),
        CellValue::String(s) => variant_str(s),
        CellValue::Date(d) => variant_date(d.serial),
        CellValue::Error(_) => variant_empty(), // Can't set error values
    }
}

/// Convert a COM VARIANT to our protocol CellValue.
fn variant_to_cell_value(variant: &VARIANT) -> CellValue {
    if variant_is_empty(variant) {
        CellValue::Null
    } else if let Some(b) = variant_get_bool(variant) {
        CellValue::Bool(b)
    } else if let Some(serial) = variant_get_date(variant) {
        CellValue::Date(CellDate { serial })
    } else if let Some(n) = variant_get_f64(variant) {
        CellValue::Number(n)
    } else if let Some(s) = variant_get_string(variant) {
        CellValue::String(s)
    } else if let Some(scode) = variant_get_error(variant) {
        CellValue::Error(CellError {
            code: error_code(scode).to_string(),
        })
    } else {
        CellValue::Null
    }
}

/// Worksheet error text for a CVErr SCODE.
fn error_code(scode: i32) -> &'static str {
    match scode & 0xFFFF {
        2000 => "#NULL!",
        2007 => "#DIV/0!",
        2015 => "#VALUE!",
        2023 => "#REF!",
        2029 => "#NAME?",
        2036 => "#NUM!",
        2042 => "#N/A",
        _ => "#ERR!",
    }
}
