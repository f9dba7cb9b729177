//! In-place editing of an OOXML workbook package.
//!
//! Only the `<sheetData>` of edited worksheets is regenerated. Every other
//! part, including `xl/vbaProject.bin`, drawings and the other sheets, is
//! written back byte for byte, so a macro-enabled workbook keeps its macros.
//!
//! Cells are written without formulas. A shared formula whose defining
//! cell is overwritten is written out in full into the cells that still use
//! it, and an array formula that overlaps an edit is reduced to its values.
//! Once any sheet has been edited the calculation chain (`xl/calcChain.xml`)
//! is dropped and unlinked, since it may list formula cells that no longer
//! exist; the office application rebuilds it on the next full recalculation.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::io::{BufReader, Cursor, Read, Seek, Write};
use std::path::{Path, PathBuf};

use prodreport_core::cell::serial::to_excel_serial;
use prodreport_core::{CellAddress, CellRange, CellValue};
use quick_xml::escape::unescape;
use quick_xml::events::{BytesStart, Event};
use quick_xml::name::QName;
use quick_xml::reader::Reader;
use regex::Regex;

use crate::error::{XlsxError, XlsxResult};
use crate::escape::escape_xml;
use crate::formula::shift_references;

const CALC_CHAIN_PART: &str = "xl/calcChain.xml";
const STYLES_PART: &str = "xl/styles.xml";
const WORKBOOK_PART: &str = "xl/workbook.xml";
const WORKBOOK_RELS_PART: &str = "xl/_rels/workbook.xml.rels";
const CONTENT_TYPES_PART: &str = "[Content_Types].xml";

/// Built-in number format `m/d/yyyy`, shown in the user's short date form
const DATE_NUM_FMT_ID: u32 = 14;

/// One entry of the zip container
#[derive(Debug, Clone)]
struct Part {
    name: String,
    data: Vec<u8>,
    stored: bool,
    is_dir: bool,
}

/// An opened workbook package with pending sheet edits
pub struct WorkbookPackage {
    path: Option<PathBuf>,
    parts: Vec<Part>,
    /// Sheet name to worksheet part name, in workbook order
    sheets: Vec<(String, String)>,
    /// Parsed sheet data of edited worksheets, by part name
    edited: HashMap<String, SheetXml>,
    date_style: Option<u32>,
}

impl WorkbookPackage {
    /// Open a package from disk
    pub fn open(path: &Path) -> XlsxResult<Self> {
        let file = File::open(path)?;
        let mut package = Self::from_reader(BufReader::new(file))?;
        package.path = Some(path.to_path_buf());
        Ok(package)
    }

    /// Read a package from any seekable source
    pub fn from_reader<R: Read + Seek>(reader: R) -> XlsxResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut parts = Vec::with_capacity(archive.len());

        for index in 0..archive.len() {
            let mut entry = archive.by_index(index)?;
            let mut data = Vec::with_capacity(entry.size() as usize);
            entry.read_to_end(&mut data)?;
            parts.push(Part {
                name: entry.name().to_string(),
                stored: entry.compression() == zip::CompressionMethod::Stored,
                is_dir: entry.is_dir(),
                data,
            });
        }

        let mut package = Self {
            path: None,
            parts,
            sheets: Vec::new(),
            edited: HashMap::new(),
            date_style: None,
        };

        if package.part(CONTENT_TYPES_PART).is_none() {
            return Err(XlsxError::InvalidFormat(
                "Missing [Content_Types].xml".into(),
            ));
        }
        package.sheets = package.read_sheet_parts()?;
        Ok(package)
    }

    /// Sheet names in workbook order
    pub fn sheet_names(&self) -> Vec<&str> {
        self.sheets.iter().map(|(name, _)| name.as_str()).collect()
    }

    /// Whether the package carries a VBA project
    pub fn has_vba_project(&self) -> bool {
        self.parts.iter().any(|p| p.name.ends_with("vbaProject.bin"))
    }

    /// Raw bytes of a package part
    pub fn part_bytes(&self, name: &str) -> Option<&[u8]> {
        self.part(name).map(|p| p.data.as_slice())
    }

    /// Replace the whole contents of a sheet with `rows`, starting at A1.
    ///
    /// Existing rows, cells and their formatting are removed; nothing of
    /// the previous contents survives below or right of the new data.
    pub fn replace_sheet_rows(&mut self, sheet: &str, rows: &[Vec<CellValue>]) -> XlsxResult<()> {
        let date_style = self.date_style_if_needed(rows)?;
        let data = self.sheet_xml_mut(sheet)?;
        data.rows.clear();
        data.write(CellAddress::new(1, 1), rows, date_style)?;
        log::debug!("Replaced '{}' with {} rows", sheet, rows.len());
        Ok(())
    }

    /// Clear the values of a range, keeping each cell's style
    pub fn clear_range(&mut self, sheet: &str, range: &CellRange) -> XlsxResult<()> {
        let data = self.sheet_xml_mut(sheet)?;
        let cleared = data.clear(range)?;
        log::debug!("Cleared {} cells of {}!{}", cleared, sheet, range);
        Ok(())
    }

    /// Write rows of values with `origin` as the top-left cell.
    ///
    /// Overwritten cells keep their style; dates get the short date format.
    pub fn write_cells(
        &mut self,
        sheet: &str,
        origin: CellAddress,
        rows: &[Vec<CellValue>],
    ) -> XlsxResult<()> {
        let date_style = self.date_style_if_needed(rows)?;
        let data = self.sheet_xml_mut(sheet)?;
        data.write(origin, rows, date_style)?;
        log::debug!("Wrote {} rows to {}!{}", rows.len(), sheet, origin);
        Ok(())
    }

    /// Save back to the file the package was opened from
    pub fn save(&mut self) -> XlsxResult<()> {
        let path = self
            .path
            .clone()
            .ok_or_else(|| XlsxError::InvalidFormat("package was not opened from a file".into()))?;
        self.save_as(&path)
    }

    /// Save to `path`, replacing it atomically
    pub fn save_as(&mut self, path: &Path) -> XlsxResult<()> {
        let dir = match path.parent() {
            Some(dir) if !dir.as_os_str().is_empty() => dir.to_path_buf(),
            _ => PathBuf::from("."),
        };
        let mut temp = tempfile::NamedTempFile::new_in(&dir)?;
        self.write_to(temp.as_file_mut())?;
        temp.as_file_mut().flush()?;
        temp.persist(path).map_err(|e| XlsxError::Io(e.error))?;
        log::info!("Saved {}", path.display());
        Ok(())
    }

    /// Serialize the package, applying pending edits
    pub fn write_to<W: Write + Seek>(&mut self, writer: W) -> XlsxResult<()> {
        self.apply_edits()?;

        let mut zip = zip::ZipWriter::new(writer);
        for part in &self.parts {
            let method = if part.stored {
                zip::CompressionMethod::Stored
            } else {
                zip::CompressionMethod::Deflated
            };
            let options = zip::write::SimpleFileOptions::default().compression_method(method);
            if part.is_dir {
                zip.add_directory(part.name.as_str(), options)?;
                continue;
            }
            zip.start_file(part.name.as_str(), options)?;
            zip.write_all(&part.data)?;
        }
        zip.finish()?;
        Ok(())
    }

    /// Serialize into memory
    pub fn to_bytes(&mut self) -> XlsxResult<Vec<u8>> {
        let mut cursor = Cursor::new(Vec::new());
        self.write_to(&mut cursor)?;
        Ok(cursor.into_inner())
    }

    fn part(&self, name: &str) -> Option<&Part> {
        self.parts.iter().find(|p| p.name == name)
    }

    fn part_mut(&mut self, name: &str) -> Option<&mut Part> {
        self.parts.iter_mut().find(|p| p.name == name)
    }

    fn part_text(&self, name: &str) -> XlsxResult<String> {
        let part = self
            .part(name)
            .ok_or_else(|| XlsxError::MissingPart(name.to_string()))?;
        String::from_utf8(part.data.clone())
            .map_err(|_| XlsxError::InvalidFormat(format!("{} is not UTF-8", name)))
    }

    fn set_part_text(&mut self, name: &str, text: String) {
        if let Some(part) = self.part_mut(name) {
            part.data = text.into_bytes();
        }
    }

    /// Map sheet names to worksheet part names
    fn read_sheet_parts(&self) -> XlsxResult<Vec<(String, String)>> {
        let workbook = self.part_text(WORKBOOK_PART)?;
        let rels = self.part_text(WORKBOOK_RELS_PART)?;

        let mut sheets = Vec::new();
        let mut targets = HashMap::new();

        let mut reader = Reader::from_str(&rels);
        reader.trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e))
                    if e.local_name().as_ref() == b"Relationship" =>
                {
                    let (id, target) = (attr(&e, b"Id"), attr(&e, b"Target"));
                    if let (Some(id), Some(target)) = (id, target) {
                        let full_path = match target.strip_prefix('/') {
                            Some(absolute) => absolute.to_string(),
                            None => format!("xl/{}", target),
                        };
                        targets.insert(id, full_path);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
        }

        let mut reader = Reader::from_str(&workbook);
        reader.trim_text(true);
        loop {
            match reader.read_event() {
                Ok(Event::Empty(e)) | Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheet" => {
                    let name = attr(&e, b"name");
                    let r_id = attr(&e, b"r:id");
                    if let (Some(name), Some(r_id)) = (name, r_id) {
                        if let Some(path) = targets.get(&r_id) {
                            sheets.push((name, path.clone()));
                        }
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
        }

        Ok(sheets)
    }

    fn sheet_part_name(&self, sheet: &str) -> XlsxResult<String> {
        self.sheets
            .iter()
            .find(|(name, _)| name == sheet)
            .map(|(_, part)| part.clone())
            .ok_or_else(|| XlsxError::SheetNotFound {
                sheet: sheet.to_string(),
                path: self.path.clone().unwrap_or_default(),
            })
    }

    fn sheet_xml_mut(&mut self, sheet: &str) -> XlsxResult<&mut SheetXml> {
        let part_name = self.sheet_part_name(sheet)?;
        if !self.edited.contains_key(&part_name) {
            let text = self.part_text(&part_name)?;
            let parsed = SheetXml::parse(&text)?;
            self.edited.insert(part_name.clone(), parsed);
        }
        self.edited
            .get_mut(&part_name)
            .ok_or_else(|| XlsxError::MissingPart(part_name))
    }

    fn date_style_if_needed(&mut self, rows: &[Vec<CellValue>]) -> XlsxResult<Option<u32>> {
        let has_dates = rows
            .iter()
            .flatten()
            .any(|v| matches!(v, CellValue::DateTime(_)));
        if !has_dates {
            return Ok(None);
        }
        if let Some(id) = self.date_style {
            return Ok(Some(id));
        }
        let styles = self.part_text(STYLES_PART)?;
        let (updated, id) = add_date_xf(&styles)?;
        self.set_part_text(STYLES_PART, updated);
        self.date_style = Some(id);
        Ok(Some(id))
    }

    fn apply_edits(&mut self) -> XlsxResult<()> {
        if self.edited.is_empty() {
            return Ok(());
        }
        let edited = std::mem::take(&mut self.edited);
        for (part_name, sheet) in edited {
            self.set_part_text(&part_name, sheet.to_xml());
        }
        self.drop_calc_chain()
    }

    fn drop_calc_chain(&mut self) -> XlsxResult<()> {
        if self.part(CALC_CHAIN_PART).is_none() {
            return Ok(());
        }
        self.parts.retain(|p| p.name != CALC_CHAIN_PART);

        let rel = Regex::new(r#"<Relationship\b[^>]*calcChain[^>]*/>"#)
            .map_err(|e| XlsxError::Parse(e.to_string()))?;
        let rels = self.part_text(WORKBOOK_RELS_PART)?;
        self.set_part_text(WORKBOOK_RELS_PART, rel.replace_all(&rels, "").into_owned());

        let override_ = Regex::new(r#"<Override\b[^>]*/xl/calcChain\.xml[^>]*/>"#)
            .map_err(|e| XlsxError::Parse(e.to_string()))?;
        let types = self.part_text(CONTENT_TYPES_PART)?;
        self.set_part_text(
            CONTENT_TYPES_PART,
            override_.replace_all(&types, "").into_owned(),
        );

        log::debug!("Dropped {}", CALC_CHAIN_PART);
        Ok(())
    }
}

fn attr(e: &BytesStart<'_>, key: &[u8]) -> Option<String> {
    let a = e.attributes().flatten().find(|a| a.key.as_ref() == key)?;
    let raw = String::from_utf8_lossy(&a.value);
    let value = unescape(&raw).ok()?.into_owned();
    Some(value)
}

/// Append a short-date cell format to `styles.xml`, returning the new text
/// and the index of the added format
fn add_date_xf(styles: &str) -> XlsxResult<(String, u32)> {
    let open_at = styles
        .find("<cellXfs")
        .ok_or_else(|| XlsxError::InvalidFormat("styles.xml has no cellXfs".into()))?;
    let close_at = styles[open_at..]
        .find("</cellXfs>")
        .map(|i| open_at + i)
        .ok_or_else(|| XlsxError::InvalidFormat("cellXfs is empty or unterminated".into()))?;

    let xf = Regex::new(r"<xf[\s/>]").map_err(|e| XlsxError::Parse(e.to_string()))?;
    let index = xf.find_iter(&styles[open_at..close_at]).count() as u32;

    let entry = format!(
        r#"<xf numFmtId="{}" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/>"#,
        DATE_NUM_FMT_ID
    );
    let mut out = String::with_capacity(styles.len() + entry.len());
    out.push_str(&styles[..close_at]);
    out.push_str(&entry);
    out.push_str(&styles[close_at..]);

    let count = Regex::new(r#"(<cellXfs\b[^>]*?\bcount=")\d+(")"#)
        .map_err(|e| XlsxError::Parse(e.to_string()))?;
    let out = count
        .replace(&out, format!("${{1}}{}${{2}}", index + 1).as_str())
        .into_owned();
    Ok((out, index))
}

/// A cell inside an edited sheet
#[derive(Debug, Clone, PartialEq)]
enum CellXml {
    /// Untouched, original markup
    Raw { markup: String, style: Option<String> },
    /// Written by this package
    Value { value: CellValue, style: Option<String> },
}

impl CellXml {
    fn style(&self) -> Option<&String> {
        match self {
            CellXml::Raw { style, .. } | CellXml::Value { style, .. } => style.as_ref(),
        }
    }
}

/// The `<f>` element of a stored cell
#[derive(Debug, Clone, PartialEq)]
struct FormulaXml {
    /// `t`: `shared`, `array`, `dataTable`, or none for a plain formula
    kind: Option<String>,
    /// `ref`: cells an array formula spans, or the first cell of a shared group
    reference: Option<String>,
    /// `si`: shared group index
    group: Option<String>,
    /// Formula text, unescaped; empty in cells that only join a shared group
    text: String,
    /// Byte range of the element within the cell markup
    span: (usize, usize),
}

impl FormulaXml {
    fn find(markup: &str) -> XlsxResult<Option<Self>> {
        let mut reader = Reader::from_str(markup);
        loop {
            let before = reader.buffer_position();
            let (e, text) = match reader.read_event()? {
                Event::Start(e) if e.local_name().as_ref() == b"f" => {
                    let end_name = e.name().as_ref().to_vec();
                    let raw = reader.read_text(QName(&end_name))?;
                    let text = unescape(&raw)
                        .map_err(|err| XlsxError::Parse(err.to_string()))?
                        .into_owned();
                    (e, text)
                }
                Event::Empty(e) if e.local_name().as_ref() == b"f" => (e, String::new()),
                Event::Eof => return Ok(None),
                _ => continue,
            };
            return Ok(Some(Self {
                kind: attr(&e, b"t"),
                reference: attr(&e, b"ref"),
                group: attr(&e, b"si"),
                text,
                span: (before, reader.buffer_position()),
            }));
        }
    }

    fn is_shared(&self) -> bool {
        self.kind.as_deref() == Some("shared")
    }

    fn is_array(&self) -> bool {
        matches!(self.kind.as_deref(), Some("array") | Some("dataTable"))
    }

    /// `markup` with this element replaced by `element`
    fn replace_in(&self, markup: &str, element: &str) -> String {
        format!("{}{}{}", &markup[..self.span.0], element, &markup[self.span.1..])
    }
}

fn overlaps(a: &CellRange, b: &CellRange) -> bool {
    a.start.row <= b.end.row
        && b.start.row <= a.end.row
        && a.start.col <= b.end.col
        && b.start.col <= a.end.col
}

#[derive(Debug, Clone, Default, PartialEq)]
struct RowXml {
    /// Attributes other than `r` and `spans`, raw (still escaped)
    attrs: Vec<(String, String)>,
    cells: BTreeMap<u32, CellXml>,
}

/// A worksheet split around its `<sheetData>` element
#[derive(Debug, Clone, PartialEq)]
struct SheetXml {
    head: String,
    rows: BTreeMap<u32, RowXml>,
    tail: String,
}

impl SheetXml {
    fn parse(text: &str) -> XlsxResult<Self> {
        let mut reader = Reader::from_str(text);
        let mut rows = BTreeMap::new();

        loop {
            let before = reader.buffer_position();
            match reader.read_event() {
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"sheetData" => {
                    let after = reader.buffer_position();
                    return Ok(Self {
                        head: format!("{}<sheetData>", &text[..before]),
                        rows,
                        tail: format!("</sheetData>{}", &text[after..]),
                    });
                }
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"sheetData" => {
                    let head = text[..reader.buffer_position()].to_string();
                    let tail_at = Self::parse_rows(&mut reader, text, &mut rows)?;
                    return Ok(Self {
                        head,
                        rows,
                        tail: text[tail_at..].to_string(),
                    });
                }
                Ok(Event::Eof) => {
                    return Err(XlsxError::InvalidFormat("worksheet has no sheetData".into()))
                }
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
        }
    }

    /// Parse rows up to `</sheetData>`, returning the offset of that end tag
    fn parse_rows(
        reader: &mut Reader<&[u8]>,
        text: &str,
        rows: &mut BTreeMap<u32, RowXml>,
    ) -> XlsxResult<usize> {
        let mut current: Option<(u32, RowXml)> = None;
        let mut last_row = 0u32;
        let mut last_col = 0u32;

        loop {
            let before = reader.buffer_position();
            match reader.read_event() {
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"row" => {
                    let (row, data) = Self::row_start(&e, last_row)?;
                    last_row = row;
                    last_col = 0;
                    current = Some((row, data));
                }
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"row" => {
                    let (row, data) = Self::row_start(&e, last_row)?;
                    last_row = row;
                    rows.insert(row, data);
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == b"row" => {
                    if let Some((row, data)) = current.take() {
                        rows.insert(row, data);
                    }
                }
                Ok(Event::Start(e)) if e.local_name().as_ref() == b"c" => {
                    let end_name = e.name().as_ref().to_vec();
                    let (col, style) = Self::cell_start(&e, last_col)?;
                    reader.read_to_end(QName(&end_name))?;
                    let markup = text[before..reader.buffer_position()].trim().to_string();
                    last_col = col;
                    if let Some((_, data)) = current.as_mut() {
                        data.cells.insert(col, CellXml::Raw { markup, style });
                    }
                }
                Ok(Event::Empty(e)) if e.local_name().as_ref() == b"c" => {
                    let (col, style) = Self::cell_start(&e, last_col)?;
                    let markup = text[before..reader.buffer_position()].trim().to_string();
                    last_col = col;
                    if let Some((_, data)) = current.as_mut() {
                        data.cells.insert(col, CellXml::Raw { markup, style });
                    }
                }
                Ok(Event::End(e)) if e.local_name().as_ref() == b"sheetData" => {
                    return Ok(before);
                }
                Ok(Event::Eof) => {
                    return Err(XlsxError::InvalidFormat("unterminated sheetData".into()))
                }
                Err(e) => return Err(XlsxError::Xml(e)),
                _ => {}
            }
        }
    }

    fn row_start(e: &BytesStart<'_>, last_row: u32) -> XlsxResult<(u32, RowXml)> {
        let mut row = last_row + 1;
        let mut attrs = Vec::new();
        for a in e.attributes().flatten() {
            let key = String::from_utf8_lossy(a.key.as_ref()).into_owned();
            let value = String::from_utf8_lossy(&a.value).into_owned();
            match key.as_str() {
                "r" => {
                    row = value
                        .parse()
                        .map_err(|_| XlsxError::Parse(format!("invalid row number '{}'", value)))?;
                }
                "spans" => {}
                _ => attrs.push((key, value)),
            }
        }
        Ok((
            row,
            RowXml {
                attrs,
                cells: BTreeMap::new(),
            },
        ))
    }

    fn cell_start(e: &BytesStart<'_>, last_col: u32) -> XlsxResult<(u32, Option<String>)> {
        let mut col = last_col + 1;
        let mut style = None;
        for a in e.attributes().flatten() {
            match a.key.as_ref() {
                b"r" => {
                    let reference = String::from_utf8_lossy(&a.value).into_owned();
                    col = CellAddress::parse(&reference)
                        .map_err(|e| XlsxError::Parse(e.to_string()))?
                        .col;
                }
                b"s" => style = Some(String::from_utf8_lossy(&a.value).into_owned()),
                _ => {}
            }
        }
        Ok((col, style))
    }

    /// Stored cells that carry a formula, in row-major order
    fn formula_cells(&self) -> XlsxResult<Vec<(CellAddress, FormulaXml)>> {
        let mut found = Vec::new();
        for (row, data) in &self.rows {
            for (col, cell) in &data.cells {
                let CellXml::Raw { markup, .. } = cell else { continue };
                if markup.contains("<f") {
                    if let Some(formula) = FormulaXml::find(markup)? {
                        found.push((CellAddress::new(*row, *col), formula));
                    }
                }
            }
        }
        Ok(found)
    }

    /// Keep formulas outside `range` intact before its cells are replaced.
    ///
    /// Cells of a shared group only carry the group index; the formula text
    /// lives in the group's first cell. When that cell is inside `range`,
    /// each member outside it gets the formula written out in full, moved to
    /// its own position. An array formula cannot be partly replaced, so one
    /// that overlaps `range` is dropped and its cells keep their last values.
    fn release_formulas(&mut self, range: &CellRange) -> XlsxResult<()> {
        let formulas = self.formula_cells()?;
        let mut updates: Vec<(CellAddress, String)> = Vec::new();

        for (at, formula) in &formulas {
            if formula.is_array() {
                let spans = formula
                    .reference
                    .as_deref()
                    .and_then(|r| CellRange::parse(r).ok())
                    .unwrap_or_else(|| CellRange::new(*at, *at));
                if overlaps(&spans, range) {
                    updates.push((*at, String::new()));
                }
                continue;
            }
            let is_head = formula.is_shared() && formula.reference.is_some();
            if !is_head || !range.contains(at.row, at.col) {
                continue;
            }
            let members = formulas.iter().filter(|(member, f)| {
                f.is_shared()
                    && f.reference.is_none()
                    && f.group == formula.group
                    && !range.contains(member.row, member.col)
            });
            for (member, _) in members {
                let text = shift_references(
                    &formula.text,
                    i64::from(member.row) - i64::from(at.row),
                    i64::from(member.col) - i64::from(at.col),
                )?;
                updates.push((*member, format!("<f>{}</f>", escape_xml(&text))));
            }
            log::debug!("Shared formula of {} written out into its other cells", at);
        }

        let by_cell: HashMap<CellAddress, &FormulaXml> =
            formulas.iter().map(|(at, f)| (*at, f)).collect();
        for (at, element) in updates {
            let Some(formula) = by_cell.get(&at) else { continue };
            let Some(CellXml::Raw { markup, .. }) = self
                .rows
                .get_mut(&at.row)
                .and_then(|row| row.cells.get_mut(&at.col))
            else {
                continue;
            };
            *markup = formula.replace_in(markup, &element);
        }
        Ok(())
    }

    /// Clear a range, returning how many stored cells were touched
    fn clear(&mut self, range: &CellRange) -> XlsxResult<usize> {
        self.release_formulas(range)?;
        let mut touched = 0;
        for (_, row) in self.rows.range_mut(range.start.row..=range.end.row) {
            let cols: Vec<u32> = row
                .cells
                .range(range.start.col..=range.end.col)
                .map(|(col, _)| *col)
                .collect();
            for col in cols {
                touched += 1;
                Self::clear_cell(row, col);
            }
        }
        self.rows
            .retain(|_, row| !(row.cells.is_empty() && row.attrs.is_empty()));
        Ok(touched)
    }

    fn clear_cell(row: &mut RowXml, col: u32) {
        match row.cells.get(&col).and_then(|c| c.style().cloned()) {
            Some(style) => {
                row.cells.insert(
                    col,
                    CellXml::Value {
                        value: CellValue::Empty,
                        style: Some(style),
                    },
                );
            }
            None => {
                row.cells.remove(&col);
            }
        }
    }

    fn write(
        &mut self,
        origin: CellAddress,
        rows: &[Vec<CellValue>],
        date_style: Option<u32>,
    ) -> XlsxResult<()> {
        let width = rows.iter().map(Vec::len).max().unwrap_or(0) as u32;
        if rows.is_empty() || width == 0 {
            return Ok(());
        }
        self.release_formulas(&CellRange::from_bounds(
            origin.row,
            origin.col,
            origin.row + rows.len() as u32 - 1,
            origin.col + width - 1,
        ))?;

        for (i, values) in rows.iter().enumerate() {
            let row_number = origin.row + i as u32;
            let row = self.rows.entry(row_number).or_default();
            for (j, value) in values.iter().enumerate() {
                let col = origin.col + j as u32;
                if value.is_empty() {
                    Self::clear_cell(row, col);
                    continue;
                }
                let style = match value {
                    CellValue::DateTime(_) => date_style.map(|s| s.to_string()),
                    _ => row.cells.get(&col).and_then(|c| c.style().cloned()),
                };
                row.cells.insert(
                    col,
                    CellXml::Value {
                        value: value.clone(),
                        style,
                    },
                );
            }
        }
        self.rows
            .retain(|_, row| !(row.cells.is_empty() && row.attrs.is_empty()));
        Ok(())
    }

    fn dimension(&self) -> String {
        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (row, data) in &self.rows {
            for col in data.cells.keys() {
                bounds = Some(match bounds {
                    None => (*row, *col, *row, *col),
                    Some((r0, c0, r1, c1)) => (r0.min(*row), c0.min(*col), r1.max(*row), c1.max(*col)),
                });
            }
        }
        match bounds {
            None => "A1".to_string(),
            Some((r0, c0, r1, c1)) if (r0, c0) == (r1, c1) => CellAddress::new(r0, c0).to_a1_string(),
            Some((r0, c0, r1, c1)) => CellRange::from_bounds(r0, c0, r1, c1).to_a1_string(),
        }
    }

    fn to_xml(&self) -> String {
        let dimension = Regex::new(r#"(<dimension\b[^>]*?\bref=")[^"]*(")"#)
            .map(|re| {
                re.replace(&self.head, format!("${{1}}{}${{2}}", self.dimension()).as_str())
                    .into_owned()
            })
            .unwrap_or_else(|_| self.head.clone());

        let mut out = dimension;
        for (number, row) in &self.rows {
            out.push_str(&format!("<row r=\"{}\"", number));
            for (key, value) in &row.attrs {
                out.push_str(&format!(" {}=\"{}\"", key, value));
            }
            if row.cells.is_empty() {
                out.push_str("/>");
                continue;
            }
            out.push('>');
            for (col, cell) in &row.cells {
                match cell {
                    CellXml::Raw { markup, .. } => out.push_str(markup),
                    CellXml::Value { value, style } => {
                        let reference = CellAddress::new(*number, *col).to_a1_string();
                        out.push_str(&cell_markup(&reference, value, style.as_deref()));
                    }
                }
            }
            out.push_str("</row>");
        }
        out.push_str(&self.tail);
        out
    }
}

fn cell_markup(reference: &str, value: &CellValue, style: Option<&str>) -> String {
    let style_attr = style
        .filter(|s| *s != "0")
        .map(|s| format!(" s=\"{}\"", s))
        .unwrap_or_default();

    match value {
        CellValue::Empty => format!("<c r=\"{}\"{}/>", reference, style_attr),
        CellValue::Number(n) if n.is_finite() => {
            format!("<c r=\"{}\"{}><v>{}</v></c>", reference, style_attr, n)
        }
        CellValue::Number(_) => {
            format!("<c r=\"{}\"{} t=\"e\"><v>#NUM!</v></c>", reference, style_attr)
        }
        CellValue::String(s) => {
            let space = if s.trim() != s {
                " xml:space=\"preserve\""
            } else {
                ""
            };
            format!(
                "<c r=\"{}\"{} t=\"inlineStr\"><is><t{}>{}</t></is></c>",
                reference,
                style_attr,
                space,
                escape_xml(s)
            )
        }
        CellValue::Boolean(b) => format!(
            "<c r=\"{}\"{} t=\"b\"><v>{}</v></c>",
            reference,
            style_attr,
            if *b { 1 } else { 0 }
        ),
        CellValue::DateTime(dt) => format!(
            "<c r=\"{}\"{}><v>{}</v></c>",
            reference,
            style_attr,
            to_excel_serial(*dt)
        ),
        CellValue::Error(e) => format!(
            "<c r=\"{}\"{} t=\"e\"><v>{}</v></c>",
            reference,
            style_attr,
            escape_xml(e)
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    const SHEET: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<worksheet xmlns="http://schemas.openxmlformats.org/spreadsheetml/2006/main"><dimension ref="A1:C2"/><sheetData><row r="1" spans="1:3"><c r="A1" s="2"><v>1</v></c><c r="B1"><f>A1*2</f><v>2</v></c></row><row r="2" ht="30" customHeight="1"><c r="C2" t="s"><v>0</v></c></row></sheetData><mergeCells count="1"><mergeCell ref="A5:B5"/></mergeCells></worksheet>"#;

    #[test]
    fn test_parse_splits_around_sheet_data() {
        let sheet = SheetXml::parse(SHEET).unwrap();
        assert!(sheet.head.ends_with("<sheetData>"));
        assert!(sheet.tail.starts_with("</sheetData><mergeCells"));
        assert_eq!(sheet.rows.len(), 2);
        assert_eq!(sheet.rows[&1].cells.len(), 2);
        assert_eq!(
            sheet.rows[&2].attrs,
            vec![
                ("ht".to_string(), "30".to_string()),
                ("customHeight".to_string(), "1".to_string())
            ]
        );
    }

    #[test]
    fn test_untouched_cells_keep_markup() {
        let sheet = SheetXml::parse(SHEET).unwrap();
        let xml = sheet.to_xml();
        assert!(xml.contains(r#"<c r="B1"><f>A1*2</f><v>2</v></c>"#));
        assert!(xml.contains(r#"<c r="C2" t="s"><v>0</v></c>"#));
        assert!(xml.contains(r#"<row r="2" ht="30" customHeight="1">"#));
        assert!(xml.contains(r#"<dimension ref="A1:C2"/>"#));
    }

    #[test]
    fn test_write_keeps_style_and_drops_formula() {
        let mut sheet = SheetXml::parse(SHEET).unwrap();
        sheet.write(
            CellAddress::new(1, 1),
            &[vec![CellValue::string("x"), CellValue::Number(7.0)]],
            None,
        )
        .unwrap();
        let xml = sheet.to_xml();
        assert!(xml.contains(r#"<c r="A1" s="2" t="inlineStr"><is><t>x</t></is></c>"#));
        assert!(xml.contains(r#"<c r="B1"><v>7</v></c>"#));
        assert!(!xml.contains("<f>"));
    }

    #[test]
    fn test_clear_keeps_styled_cells_only() {
        let mut sheet = SheetXml::parse(SHEET).unwrap();
        let touched = sheet.clear(&CellRange::parse("A1:C1").unwrap()).unwrap();
        assert_eq!(touched, 2);
        let xml = sheet.to_xml();
        assert!(xml.contains(r#"<row r="1"><c r="A1" s="2"/></row>"#));
        assert!(!xml.contains("B1"));
    }

    #[test]
    fn test_empty_sheet_data_element() {
        let text = r#"<worksheet><dimension ref="A1"/><sheetData/></worksheet>"#;
        let mut sheet = SheetXml::parse(text).unwrap();
        sheet
            .write(CellAddress::new(2, 2), &[vec![CellValue::Boolean(true)]], None)
            .unwrap();
        assert_eq!(
            sheet.to_xml(),
            r#"<worksheet><dimension ref="B2"/><sheetData><row r="2"><c r="B2" t="b"><v>1</v></c></row></sheetData></worksheet>"#
        );
    }

    const SHARED: &str = r#"<worksheet><dimension ref="C4:F4"/><sheetData><row r="4"><c r="C4"><v>1</v></c><c r="D4" s="3"><f t="shared" ref="D4:F4" si="0">C4+1</f><v>2</v></c><c r="E4" s="3"><f t="shared" si="0"/><v>3</v></c><c r="F4" s="3"><f t="shared" si="0"/><v>4</v></c></row></sheetData></worksheet>"#;

    #[test]
    fn test_find_formula_element() {
        let markup = r#"<c r="D4" s="3"><f t="shared" ref="D4:F4" si="0">C4&gt;1</f><v>2</v></c>"#;
        let formula = FormulaXml::find(markup).unwrap().unwrap();
        assert!(formula.is_shared());
        assert_eq!(formula.reference.as_deref(), Some("D4:F4"));
        assert_eq!(formula.group.as_deref(), Some("0"));
        assert_eq!(formula.text, "C4>1");
        assert_eq!(
            formula.replace_in(markup, "<f>x</f>"),
            r#"<c r="D4" s="3"><f>x</f><v>2</v></c>"#
        );
        assert_eq!(FormulaXml::find(r#"<c r="A1"><v>1</v></c>"#).unwrap(), None);
    }

    #[test]
    fn test_clearing_shared_formula_head_writes_out_members() {
        let mut sheet = SheetXml::parse(SHARED).unwrap();
        sheet.clear(&CellRange::parse("B4:D42").unwrap()).unwrap();
        let xml = sheet.to_xml();
        assert!(xml.contains(r#"<c r="D4" s="3"/>"#));
        assert!(xml.contains(r#"<c r="E4" s="3"><f>D4+1</f><v>3</v></c>"#));
        assert!(xml.contains(r#"<c r="F4" s="3"><f>E4+1</f><v>4</v></c>"#));
    }

    #[test]
    fn test_overwriting_a_member_leaves_the_group() {
        let mut sheet = SheetXml::parse(SHARED).unwrap();
        sheet
            .write(CellAddress::new(4, 6), &[vec![CellValue::Number(0.0)]], None)
            .unwrap();
        let xml = sheet.to_xml();
        assert!(xml.contains(r#"<f t="shared" ref="D4:F4" si="0">C4+1</f>"#));
        assert!(xml.contains(r#"<c r="E4" s="3"><f t="shared" si="0"/><v>3</v></c>"#));
        assert!(xml.contains(r#"<c r="F4" s="3"><v>0</v></c>"#));
    }

    #[test]
    fn test_array_formula_dropped_when_overlapped() {
        let text = r#"<worksheet><sheetData><row r="1"><c r="A1"><f t="array" ref="A1:A2">TRANSPOSE(C1:D1)</f><v>5</v></c></row><row r="2"><c r="A2"><v>6</v></c></row></sheetData></worksheet>"#;
        let mut sheet = SheetXml::parse(text).unwrap();
        sheet.clear(&CellRange::parse("A2:B2").unwrap()).unwrap();
        assert_eq!(
            sheet.to_xml(),
            r#"<worksheet><sheetData><row r="1"><c r="A1"><v>5</v></c></row></sheetData></worksheet>"#
        );
    }

    #[test]
    fn test_attribute_values_unescaped() {
        let text = r#"<sheet name="Plan &amp; realizacija" r:id="rId1"/>"#;
        let mut reader = Reader::from_str(text);
        let Ok(Event::Empty(e)) = reader.read_event() else {
            panic!("expected an empty element");
        };
        assert_eq!(attr(&e, b"name").as_deref(), Some("Plan & realizacija"));
        assert_eq!(attr(&e, b"r:id").as_deref(), Some("rId1"));
        assert_eq!(attr(&e, b"missing"), None);
    }

    #[test]
    fn test_add_date_xf() {
        let styles = r#"<styleSheet><cellXfs count="2"><xf numFmtId="0" fontId="0"/><xf numFmtId="4" fontId="0"></xf></cellXfs></styleSheet>"#;
        let (out, index) = add_date_xf(styles).unwrap();
        assert_eq!(index, 2);
        assert!(out.contains(r#"<cellXfs count="3">"#));
        assert!(out.contains(r#"<xf numFmtId="14" fontId="0" fillId="0" borderId="0" xfId="0" applyNumberFormat="1"/></cellXfs>"#));
    }

    #[test]
    fn test_cell_markup_values() {
        let date = chrono::NaiveDate::from_ymd_opt(2025, 3, 14).unwrap();
        assert_eq!(
            cell_markup("A1", &CellValue::date(date), Some("5")),
            r#"<c r="A1" s="5"><v>45730</v></c>"#
        );
        assert_eq!(
            cell_markup("A1", &CellValue::string(" a "), None),
            r#"<c r="A1" t="inlineStr"><is><t xml:space="preserve"> a </t></is></c>"#
        );
        assert_eq!(
            cell_markup("A1", &CellValue::Error("#N/A".into()), None),
            r#"<c r="A1" t="e"><v>#N/A</v></c>"#
        );
    }
}
