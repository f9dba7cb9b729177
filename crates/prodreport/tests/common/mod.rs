//! Fixtures shared by the pipeline tests: workbook packages built in
//! memory, a recording office back end and a counting process terminator.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap};
use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use prodreport::{ProcessTerminator, ResolvedFiles};
use prodreport_core::{
    AutomationError, AutomationResult, CellAddress, CellRange, CellValue, OfficeAutomation,
    PastedImage, SheetGrid, WorkbookId,
};

pub const VBA_BYTES: &[u8] = b"\xd0\xcf\x11\xe0\xa1\xb1\x1a\xe1report-macros";

/// Style index of the short date format in [`Book`] packages
pub const DATE_STYLE: u32 = 1;

// ---------------------------------------------------------------------------
// Workbook packages
// ---------------------------------------------------------------------------

enum Cell {
    Number(f64, Option<u32>),
    Text(String),
}

/// One worksheet, filled cell by cell
#[derive(Default)]
pub struct Sheet {
    name: String,
    cells: BTreeMap<(u32, u32), Cell>,
}

impl Sheet {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            cells: BTreeMap::new(),
        }
    }

    pub fn number(mut self, row: u32, col: u32, value: f64) -> Self {
        self.cells.insert((row, col), Cell::Number(value, None));
        self
    }

    /// A date cell: serial number with the date style
    pub fn date(mut self, row: u32, col: u32, serial: f64) -> Self {
        self.cells
            .insert((row, col), Cell::Number(serial, Some(DATE_STYLE)));
        self
    }

    pub fn text(mut self, row: u32, col: u32, value: &str) -> Self {
        self.cells.insert((row, col), Cell::Text(value.to_string()));
        self
    }

    /// `count` rows of numbers valued `row * 100 + col`
    pub fn numbers(mut self, first_row: u32, count: u32, first_col: u32, width: u32) -> Self {
        for row in first_row..first_row + count {
            for col in first_col..first_col + width {
                self = self.number(row, col, f64::from(row * 100 + col));
            }
        }
        self
    }

    fn xml(&self) -> String {
        let mut out = String::new();
        let mut current = 0;
        for ((row, col), cell) in &self.cells {
            if *row != current {
                if current != 0 {
                    out.push_str("</row>");
                }
                out.push_str(&format!("<row r=\"{}\">", row));
                current = *row;
            }
            let reference = CellAddress::new(*row, *col).to_a1_string();
            match cell {
                Cell::Number(n, Some(style)) => {
                    out.push_str(&format!("<c r=\"{reference}\" s=\"{style}\"><v>{n}</v></c>"))
                }
                Cell::Number(n, None) => {
                    out.push_str(&format!("<c r=\"{reference}\"><v>{n}</v></c>"))
                }
                Cell::Text(s) => out.push_str(&format!(
                    "<c r=\"{reference}\" t=\"inlineStr\"><is><t>{s}</t></is></c>"
                )),
            }
        }
        if current != 0 {
            out.push_str("</row>");
        }
        out
    }
}

/// A workbook package; macro-enabled books also carry a VBA project
pub struct Book {
    sheets: Vec<Sheet>,
    macros: bool,
}

impl Book {
    pub fn new(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets,
            macros: false,
        }
    }

    pub fn with_macros(mut self) -> Self {
        self.macros = true;
        self
    }

    pub fn write(&self, path: &Path) {
        std::fs::write(path, self.to_bytes()).unwrap();
    }

    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::new();
        let mut zip = zip::ZipWriter::new(Cursor::new(&mut buf));
        let options = zip::write::SimpleFileOptions::default();
        let mut put = |name: &str, data: &[u8]| {
            zip.start_file(name, options).unwrap();
            zip.write_all(data).unwrap();
        };

        let main_type = if self.macros {
            "application/vnd.ms-excel.sheet.macroEnabled.main+xml"
        } else {
            "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet.main+xml"
        };
        let mut types = format!(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types"><Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/><Default Extension="xml" ContentType="application/xml"/><Default Extension="bin" ContentType="application/vnd.ms-office.vbaProject"/><Override PartName="/xl/workbook.xml" ContentType="{main_type}"/><Override PartName="/xl/styles.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.styles+xml"/>"#
        );
        let mut workbook = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><workbook xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships"><sheets>"#,
        );
        let mut rels = String::from(
            r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#,
        );
        for (i, sheet) in self.sheets.iter().enumerate() {
            let n = i + 1;
            types.push_str(&format!(
                r#"<Override PartName="/xl/worksheets/sheet{n}.xml" ContentType="application/vnd.openxmlformats-officedocument.spreadsheetml.worksheet+xml"/>"#
            ));
            workbook.push_str(&format!(
                r#"<sheet name="{}" sheetId="{n}" r:id="rId{n}"/>"#,
                sheet.name
            ));
            rels.push_str(&format!(
                r#"<Relationship Id="rId{n}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/worksheet" Target="worksheets/sheet{n}.xml"/>"#
            ));
        }
        types.push_str("</Types>");
        workbook.push_str("</sheets></workbook>");
        let styles_id = self.sheets.len() + 1;
        rels.push_str(&format!(
            r#"<Relationship Id="rId{styles_id}" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/styles" Target="styles.xml"/>"#
        ));
        if self.macros {
            rels.push_str(&format!(
                r#"<Relationship Id="rId{}" Type="http://schemas.microsoft.com/office/2006/relationships/vbaProject" Target="vbaProject.bin"/>"#,
                styles_id + 1
            ));
        }
        rels.push_str("</Relationships>");

        put("[Content_Types].xml", types.as_bytes());
        put("_rels/.rels", br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships"><Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="xl/workbook.xml"/></Relationships>"#);
        put("xl/workbook.xml", workbook.as_bytes());
        put("xl/_rels/workbook.xml.rels", rels.as_bytes());
        put("xl/styles.xml", br#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><styleSheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><fonts count="1"><font><sz val="11"/><name val="Calibri"/></font></fonts><fills count="1"><fill><patternFill patternType="none"/></fill></fills><borders count="1"><border/></borders><cellStyleXfs count="1"><xf numFmtId="0" fontId="0" fillId="0" borderId="0"/></cellStyleXfs><cellXfs count="2"><xf numFmtId="0" fontId="0" fillId="0" borderId="0" xfId="0"/><xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs></styleSheet>"#);
        for (i, sheet) in self.sheets.iter().enumerate() {
            put(
                &format!("xl/worksheets/sheet{}.xml", i + 1),
                format!(
                    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?><worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><sheetData>{}</sheetData></worksheet>"#,
                    sheet.xml()
                )
                .as_bytes(),
            );
        }
        if self.macros {
            put("xl/vbaProject.bin", VBA_BYTES);
        }

        zip.finish().unwrap();
        buf
    }
}

/// Read one part of a package on disk
pub fn part(path: &Path, name: &str) -> Option<Vec<u8>> {
    use std::io::Read;
    let file = std::fs::File::open(path).unwrap();
    let mut archive = zip::ZipArchive::new(file).unwrap();
    let mut entry = archive.by_name(name).ok()?;
    let mut data = Vec::new();
    entry.read_to_end(&mut data).unwrap();
    Some(data)
}

// ---------------------------------------------------------------------------
// The three workbooks of a working day
// ---------------------------------------------------------------------------

pub const LANDING: &str = "prilepi gosoft";
pub const CALC: &str = "brizganje izračun";
pub const LOOKUP: &str = "izbor";
pub const STAGING: &str = "List2";

/// 2025-03-13 .. 2025-03-17 as serials
pub const THU_13: f64 = 45729.0;
pub const FRI_14: f64 = 45730.0;
pub const SAT_15: f64 = 45731.0;
pub const SUN_16: f64 = 45732.0;

/// Overview export: a header and ten machine rows
pub fn overview() -> Book {
    let mut sheet = Sheet::new("Sheet1")
        .text(1, 1, "Stroj")
        .text(1, 2, "Artikel")
        .text(1, 3, "Kos")
        .text(1, 4, "Izmet");
    for row in 2..=11 {
        sheet = sheet
            .text(row, 1, &format!("BR-{:02}", row - 1))
            .text(row, 2, &format!("A{}", 1000 + row))
            .number(row, 3, f64::from(row * 10))
            .number(row, 4, f64::from(row));
    }
    Book::new(vec![sheet])
}

/// Plan with the day of 2025-03-17 in column D, as text, and fixed
pub fn plan(marker: &str) -> Book {
    Book::new(vec![Sheet::new("plan")
        .date(4, 2, SUN_16)
        .text(4, 3, "16.3.2025")
        .text(4, 4, "17.3.2025")
        .text(4, 5, "18.3.2025")
        .text(5, 4, marker)
        .numbers(6, 39, 2, 6)])
}

/// Report: stale landing data, a calculation sheet dated in row 4 with
/// labels in A, markers in L and amounts in M
pub fn report() -> Book {
    let calc = Sheet::new(CALC)
        .date(4, 6, THU_13)
        .date(4, 8, FRI_14)
        .date(4, 10, SAT_15)
        .text(20, 7, "staro")
        .text(10, 1, "Linija 1")
        .text(10, 12, "x")
        .text(10, 13, "55,20 €")
        .text(11, 1, "Linija 2")
        .text(11, 12, "x")
        .number(11, 13, 50.0)
        .text(12, 1, "Linija 3")
        .text(12, 12, "x")
        .number(12, 13, 75.5)
        .text(13, 12, "x")
        .number(13, 13, 99.0)
        .text(14, 1, "Linija 5")
        .number(14, 13, 80.0);
    Book::new(vec![
        Sheet::new(LANDING).numbers(1, 30, 1, 8),
        calc,
        Sheet::new(LOOKUP).text(1, 6, "Stroj"),
        Sheet::new(STAGING),
    ])
    .with_macros()
}

/// Write the three workbooks into `dir`
pub fn working_day(dir: &Path, plan_marker: &str) -> ResolvedFiles {
    let files = ResolvedFiles {
        overview: dir.join("43.xls"),
        report: dir.join("poročanje proizvodnje2025.xlsm"),
        plan: dir.join("plan brizganja 2025 mesečni.xlsx"),
    };
    overview().write(&files.overview);
    report().write(&files.report);
    plan(plan_marker).write(&files.plan);
    files
}

// ---------------------------------------------------------------------------
// Office back end
// ---------------------------------------------------------------------------

/// In-memory office application that records every call.
///
/// Sheets are plain grids; pictures are remembered by anchor and get a
/// height of 15 points per photographed row.
#[derive(Default)]
pub struct RecordingOffice {
    pub sheets: HashMap<String, SheetGrid>,
    pub calls: Vec<String>,
    pub images: Vec<(String, CellAddress)>,
    pub row_heights: BTreeMap<(String, u32), f64>,
    pub launch_failures: u32,
    pub recalc_failures: u32,
    pub known_macros: Vec<String>,
    running: bool,
    open: Option<PathBuf>,
    clipboard: Option<CellRange>,
}

impl RecordingOffice {
    pub fn new() -> Self {
        Self {
            known_macros: vec!["sortiraj".into()],
            ..Default::default()
        }
    }

    pub fn with_sheet(mut self, grid: SheetGrid) -> Self {
        self.sheets.insert(grid.name().to_string(), grid);
        self
    }

    pub fn with_image(mut self, sheet: &str, anchor: CellAddress) -> Self {
        self.images.push((sheet.to_string(), anchor));
        self
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.calls.iter().filter(|c| c.starts_with(prefix)).count()
    }

    pub fn sheet(&self, name: &str) -> &SheetGrid {
        &self.sheets[name]
    }

    fn grid(&mut self, sheet: &str) -> AutomationResult<&mut SheetGrid> {
        self.sheets
            .get_mut(sheet)
            .ok_or_else(|| AutomationError::command("sheet", format!("no sheet '{}'", sheet)))
    }

    fn check_open(&self, operation: &str) -> AutomationResult<()> {
        if !self.running {
            return Err(AutomationError::NotRunning);
        }
        if self.open.is_none() {
            return Err(AutomationError::command(operation, "no workbook open"));
        }
        Ok(())
    }
}

impl OfficeAutomation for RecordingOffice {
    fn launch(&mut self) -> AutomationResult<()> {
        self.calls.push("launch".into());
        if self.launch_failures > 0 {
            self.launch_failures -= 1;
            return Err(AutomationError::Launch("no licence".into()));
        }
        self.running = true;
        Ok(())
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn open_workbook(&mut self, path: &Path) -> AutomationResult<WorkbookId> {
        if !self.running {
            return Err(AutomationError::NotRunning);
        }
        let name = path.file_name().unwrap().to_string_lossy().to_string();
        self.calls.push(format!("open {}", name));
        self.open = Some(path.to_path_buf());
        Ok(WorkbookId(1))
    }

    fn recalculate(&mut self) -> AutomationResult<()> {
        self.check_open("recalculate")?;
        self.calls.push("recalculate".into());
        if self.recalc_failures > 0 {
            self.recalc_failures -= 1;
            return Err(AutomationError::command("Recalculate", "Excel is busy"));
        }
        Ok(())
    }

    fn read_range(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<Vec<Vec<CellValue>>> {
        self.check_open("read")?;
        Ok(self.grid(sheet)?.range_values(range))
    }

    fn write_range(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        origin: CellAddress,
        rows: &[Vec<CellValue>],
    ) -> AutomationResult<()> {
        self.check_open("write")?;
        self.calls.push(format!("write {}!{} {}", sheet, origin, rows.len()));
        let grid = self.grid(sheet)?;
        for (r, row) in rows.iter().enumerate() {
            for (c, value) in row.iter().enumerate() {
                grid.set(origin.row + r as u32, origin.col + c as u32, value.clone());
            }
        }
        Ok(())
    }

    fn clear_contents(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()> {
        self.check_open("clear")?;
        self.calls.push(format!("clear {}!{}", sheet, range));
        let grid = self.grid(sheet)?;
        for row in range.start.row..=range.end.row {
            for col in range.start.col..=range.end.col {
                grid.set(row, col, CellValue::Empty);
            }
        }
        Ok(())
    }

    fn last_used_row(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        col: u32,
    ) -> AutomationResult<u32> {
        self.check_open("last row")?;
        Ok(self.grid(sheet)?.last_row_in_col(col))
    }

    fn run_macro(&mut self, _workbook: WorkbookId, name: &str) -> AutomationResult<()> {
        self.check_open("macro")?;
        self.calls.push(format!("macro {}", name));
        if !self.known_macros.iter().any(|m| m == name) {
            return Err(AutomationError::command("RunMacro", format!("macro '{}' not found", name)));
        }
        Ok(())
    }

    fn render_range_as_image(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        range: &CellRange,
    ) -> AutomationResult<()> {
        self.check_open("picture")?;
        self.calls.push(format!("picture {}!{}", sheet, range));
        self.clipboard = Some(*range);
        Ok(())
    }

    fn paste_image(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        anchor: CellAddress,
    ) -> AutomationResult<PastedImage> {
        self.check_open("paste")?;
        let range = self
            .clipboard
            .take()
            .ok_or_else(|| AutomationError::command("PastePicture", "clipboard is empty"))?;
        self.calls.push(format!("paste {}!{}", sheet, anchor));
        self.images.push((sheet.to_string(), anchor));
        Ok(PastedImage {
            height: 15.0 * f64::from(range.row_count()),
        })
    }

    fn delete_images_in(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        zone: &CellRange,
    ) -> AutomationResult<usize> {
        self.check_open("delete images")?;
        let before = self.images.len();
        self.images
            .retain(|(s, at)| !(s == sheet && zone.contains(at.row, at.col)));
        Ok(before - self.images.len())
    }

    fn image_anchor_rows(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
    ) -> AutomationResult<Vec<u32>> {
        self.check_open("anchors")?;
        Ok(self
            .images
            .iter()
            .filter(|(s, _)| s == sheet)
            .map(|(_, at)| at.row)
            .collect())
    }

    fn set_row_height(
        &mut self,
        _workbook: WorkbookId,
        sheet: &str,
        row: u32,
        height: f64,
    ) -> AutomationResult<()> {
        self.check_open("row height")?;
        self.row_heights.insert((sheet.to_string(), row), height);
        Ok(())
    }

    fn save_workbook(&mut self, _workbook: WorkbookId) -> AutomationResult<()> {
        self.check_open("save")?;
        self.calls.push("save".into());
        Ok(())
    }

    fn close_workbook(&mut self, _workbook: WorkbookId) -> AutomationResult<()> {
        self.check_open("close")?;
        self.calls.push("close".into());
        self.open = None;
        Ok(())
    }

    fn quit(&mut self) -> AutomationResult<()> {
        self.calls.push("quit".into());
        self.running = false;
        self.open = None;
        Ok(())
    }
}

/// Counts sweeps; reports `running` processes stopped on the next sweep
#[derive(Default)]
pub struct CountingTerminator {
    pub sweeps: usize,
    pub running: usize,
}

impl ProcessTerminator for CountingTerminator {
    fn terminate_matching(&mut self, _names: &[String]) -> usize {
        self.sweeps += 1;
        std::mem::take(&mut self.running)
    }
}

/// Process settings without pauses
pub fn quick_processes() -> prodreport::ProcessConfig {
    prodreport::ProcessConfig {
        grace_ms: 0,
        kill_timeout_ms: 0,
        ..Default::default()
    }
}
