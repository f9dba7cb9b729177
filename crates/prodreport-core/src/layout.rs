//! Sheet layout: where each step reads and writes.
//!
//! All coordinates are 1-based sheet rows/columns. The defaults describe the
//! production workbooks; a config file can override any field.

use serde::{Deserialize, Serialize};

use crate::calendar::TargetDateRule;
use crate::cell::{CellAddress, CellRange};
use crate::error::{Error, Result};
use crate::{MAX_COLS, MAX_ROWS};

/// Complete layout of the three workbooks
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Layout {
    pub source_sheet: SourceLayout,
    pub plan: PlanLayout,
    pub paste: PasteLayout,
    pub scan: ScanLayout,
    pub render: RenderLayout,
}

/// Production overview sheet and its landing place in the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SourceLayout {
    /// Sheet read from the overview file
    pub sheet: String,
    /// Sheet of the reporting workbook that receives the whole table
    pub landing_sheet: String,
}

impl Default for SourceLayout {
    fn default() -> Self {
        Self {
            sheet: "Sheet1".into(),
            landing_sheet: "prilepi gosoft".into(),
        }
    }
}

/// Planning workbook: date header and the block copied from under it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PlanLayout {
    pub sheet: String,
    pub date_rule: TargetDateRule,
    pub header_row: u32,
    /// Text that must sit directly below the matched date; `None` skips the check
    pub locked_marker: Option<String>,
    pub block_first_row: u32,
    pub block_last_row: u32,
    pub block_width: u32,
}

impl Default for PlanLayout {
    fn default() -> Self {
        Self {
            sheet: "plan".into(),
            date_rule: TargetDateRule::PreviousWorkday,
            header_row: 4,
            locked_marker: Some("Fiksno".into()),
            block_first_row: 6,
            block_last_row: 44,
            block_width: 3,
        }
    }
}

impl PlanLayout {
    /// Rows in the copied block
    pub fn block_rows(&self) -> u32 {
        self.block_last_row - self.block_first_row + 1
    }

    /// Row holding the locked marker
    pub fn marker_row(&self) -> u32 {
        self.header_row + 1
    }
}

/// Calculation sheet of the reporting workbook, paste side
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PasteLayout {
    pub sheet: String,
    pub date_rule: TargetDateRule,
    pub header_row: u32,
    /// First row written by the paste
    pub first_row: u32,
    /// Paste column relative to the located date column
    pub column_shift: i32,
}

impl Default for PasteLayout {
    fn default() -> Self {
        Self {
            sheet: "brizganje izračun".into(),
            date_rule: TargetDateRule::TwoWorkdaysBack,
            header_row: 4,
            first_row: 4,
            column_shift: -1,
        }
    }
}

/// Analysis window of the calculation sheet
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScanLayout {
    pub sheet: String,
    pub first_row: u32,
    pub last_row: u32,
    pub label_col: u32,
    pub marker_col: u32,
    pub amount_col: u32,
    /// Amounts strictly above this value qualify
    pub threshold: f64,
    pub currency_symbol: String,
}

impl Default for ScanLayout {
    fn default() -> Self {
        Self {
            sheet: "brizganje izračun".into(),
            first_row: 7,
            last_row: 46,
            label_col: 1,
            marker_col: 12,
            amount_col: 13,
            threshold: 50.0,
            currency_symbol: "€".into(),
        }
    }
}

/// Filter, stage and picture placement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RenderLayout {
    /// Run the render loop at all
    pub enabled: bool,
    /// Large lookup sheet filtered per label
    pub lookup_sheet: String,
    /// Column whose last used row bounds the lookup rows (F)
    pub lookup_extent_col: u32,
    /// Copied columns, F..=M
    pub lookup_first_col: u32,
    pub lookup_last_col: u32,
    /// Tag column compared against the label (AA)
    pub tag_col: u32,

    /// Staging sheet the filtered rows are written to
    pub staging_sheet: String,
    /// Top-left of the staged rows (T1)
    pub staging_first_col: u32,
    pub staging_first_row: u32,
    /// Stale staging contents are cleared from this row down (T2:AA..)
    pub staging_clear_first_row: u32,
    pub staging_clear_last_col: u32,
    /// Macro run on the staged rows
    pub macro_name: String,

    /// Picture range columns on the staging sheet (B..=L)
    pub picture_first_col: u32,
    pub picture_last_col: u32,
    /// Default last picture row when no probe row is filled
    pub picture_min_last_row: u32,
    /// Column probed to extend the picture (C), rows 9..=27
    pub picture_probe_col: u32,
    pub picture_probe_first_row: u32,
    pub picture_probe_last_row: u32,

    /// Sheet receiving the pictures
    pub target_sheet: String,
    pub target_label_col: u32,
    /// Pictures anchored in this zone are stale and removed first (A7:M44)
    pub image_zone_first_row: u32,
    pub image_zone_last_row: u32,
    pub image_zone_first_col: u32,
    pub image_zone_last_col: u32,
    /// Height restored on rows of the zone without a picture
    pub default_row_height: f64,
}

impl Default for RenderLayout {
    fn default() -> Self {
        Self {
            enabled: true,
            lookup_sheet: "izbor".into(),
            lookup_extent_col: 6,
            lookup_first_col: 6,
            lookup_last_col: 13,
            tag_col: 27,
            staging_sheet: "List2".into(),
            staging_first_col: 20,
            staging_first_row: 1,
            staging_clear_first_row: 2,
            staging_clear_last_col: 27,
            macro_name: "sortiraj".into(),
            picture_first_col: 2,
            picture_last_col: 12,
            picture_min_last_row: 8,
            picture_probe_col: 3,
            picture_probe_first_row: 9,
            picture_probe_last_row: 27,
            target_sheet: "brizganje izračun".into(),
            target_label_col: 1,
            image_zone_first_row: 7,
            image_zone_last_row: 44,
            image_zone_first_col: 1,
            image_zone_last_col: 13,
            default_row_height: 16.5,
        }
    }
}

impl RenderLayout {
    /// Zone whose pictures are removed before rendering
    pub fn image_zone(&self) -> CellRange {
        CellRange::from_bounds(
            self.image_zone_first_row,
            self.image_zone_first_col,
            self.image_zone_last_row,
            self.image_zone_last_col,
        )
    }

    /// Lookup range for a given extent, including the tag column
    pub fn lookup_range(&self, last_row: u32) -> CellRange {
        CellRange::from_bounds(
            1,
            self.lookup_first_col,
            last_row.max(1),
            self.tag_col.max(self.lookup_last_col),
        )
    }

    /// Number of value columns copied per lookup row
    pub fn lookup_width(&self) -> usize {
        (self.lookup_last_col - self.lookup_first_col + 1) as usize
    }

    /// Offset of the tag column inside a lookup range row
    pub fn tag_offset(&self) -> usize {
        (self.tag_col - self.lookup_first_col) as usize
    }

    /// Top-left cell of the staged rows
    pub fn staging_origin(&self) -> CellAddress {
        CellAddress::new(self.staging_first_row, self.staging_first_col)
    }
}

fn check_row(field: &str, row: u32) -> Result<()> {
    if row == 0 || row > MAX_ROWS {
        return Err(Error::InvalidLayout(format!(
            "{} = {} is outside 1..={}",
            field, row, MAX_ROWS
        )));
    }
    Ok(())
}

fn check_col(field: &str, col: u32) -> Result<()> {
    if col == 0 || col > MAX_COLS {
        return Err(Error::InvalidLayout(format!(
            "{} = {} is outside 1..={}",
            field, col, MAX_COLS
        )));
    }
    Ok(())
}

fn check_window(field: &str, first: u32, last: u32) -> Result<()> {
    if first > last {
        return Err(Error::InvalidLayout(format!(
            "{}: first ({}) is after last ({})",
            field, first, last
        )));
    }
    Ok(())
}

fn check_name(field: &str, name: &str) -> Result<()> {
    if name.trim().is_empty() {
        return Err(Error::InvalidLayout(format!("{} must not be empty", field)));
    }
    Ok(())
}

impl Layout {
    /// Check every coordinate and name against its bounds
    pub fn validate(&self) -> Result<()> {
        let s = &self.source_sheet;
        check_name("source_sheet.sheet", &s.sheet)?;
        check_name("source_sheet.landing_sheet", &s.landing_sheet)?;

        let p = &self.plan;
        check_name("plan.sheet", &p.sheet)?;
        check_row("plan.header_row", p.header_row)?;
        check_row("plan.block_first_row", p.block_first_row)?;
        check_row("plan.block_last_row", p.block_last_row)?;
        check_window("plan.block rows", p.block_first_row, p.block_last_row)?;
        if p.block_width == 0 || p.block_width > MAX_COLS {
            return Err(Error::InvalidLayout(format!(
                "plan.block_width = {} is outside 1..={}",
                p.block_width, MAX_COLS
            )));
        }
        if let Some(marker) = &p.locked_marker {
            check_name("plan.locked_marker", marker)?;
        }

        let v = &self.paste;
        check_name("paste.sheet", &v.sheet)?;
        check_row("paste.header_row", v.header_row)?;
        check_row("paste.first_row", v.first_row)?;
        let paste_end = u64::from(v.first_row) + u64::from(p.block_rows()) - 1;
        if paste_end > u64::from(MAX_ROWS) {
            return Err(Error::InvalidLayout(format!(
                "paste block ending at row {} does not fit the sheet",
                paste_end
            )));
        }

        let c = &self.scan;
        check_name("scan.sheet", &c.sheet)?;
        check_row("scan.first_row", c.first_row)?;
        check_row("scan.last_row", c.last_row)?;
        check_window("scan rows", c.first_row, c.last_row)?;
        check_col("scan.label_col", c.label_col)?;
        check_col("scan.marker_col", c.marker_col)?;
        check_col("scan.amount_col", c.amount_col)?;
        if !c.threshold.is_finite() {
            return Err(Error::InvalidLayout("scan.threshold must be finite".into()));
        }

        let r = &self.render;
        check_name("render.lookup_sheet", &r.lookup_sheet)?;
        check_name("render.staging_sheet", &r.staging_sheet)?;
        check_name("render.target_sheet", &r.target_sheet)?;
        check_name("render.macro_name", &r.macro_name)?;
        check_col("render.lookup_extent_col", r.lookup_extent_col)?;
        check_col("render.lookup_first_col", r.lookup_first_col)?;
        check_col("render.lookup_last_col", r.lookup_last_col)?;
        check_window("render lookup columns", r.lookup_first_col, r.lookup_last_col)?;
        check_col("render.tag_col", r.tag_col)?;
        if r.tag_col < r.lookup_first_col {
            return Err(Error::InvalidLayout(format!(
                "render.tag_col ({}) must not be left of render.lookup_first_col ({})",
                r.tag_col, r.lookup_first_col
            )));
        }
        check_col("render.staging_first_col", r.staging_first_col)?;
        check_row("render.staging_first_row", r.staging_first_row)?;
        check_row("render.staging_clear_first_row", r.staging_clear_first_row)?;
        check_col("render.staging_clear_last_col", r.staging_clear_last_col)?;
        check_window(
            "render staging columns",
            r.staging_first_col,
            r.staging_clear_last_col,
        )?;
        let staged_last_col = u64::from(r.staging_first_col) + r.lookup_width() as u64 - 1;
        if staged_last_col > u64::from(MAX_COLS) {
            return Err(Error::InvalidLayout(format!(
                "staged rows ending at column {} do not fit the sheet",
                staged_last_col
            )));
        }
        check_col("render.picture_first_col", r.picture_first_col)?;
        check_col("render.picture_last_col", r.picture_last_col)?;
        check_window("render picture columns", r.picture_first_col, r.picture_last_col)?;
        check_row("render.picture_min_last_row", r.picture_min_last_row)?;
        check_col("render.picture_probe_col", r.picture_probe_col)?;
        check_row("render.picture_probe_first_row", r.picture_probe_first_row)?;
        check_row("render.picture_probe_last_row", r.picture_probe_last_row)?;
        check_window(
            "render picture probe rows",
            r.picture_probe_first_row,
            r.picture_probe_last_row,
        )?;
        check_col("render.target_label_col", r.target_label_col)?;
        check_row("render.image_zone_first_row", r.image_zone_first_row)?;
        check_row("render.image_zone_last_row", r.image_zone_last_row)?;
        check_window(
            "render image zone rows",
            r.image_zone_first_row,
            r.image_zone_last_row,
        )?;
        check_col("render.image_zone_first_col", r.image_zone_first_col)?;
        check_col("render.image_zone_last_col", r.image_zone_last_col)?;
        check_window(
            "render image zone columns",
            r.image_zone_first_col,
            r.image_zone_last_col,
        )?;
        if !(r.default_row_height > 0.0 && r.default_row_height <= 409.0) {
            return Err(Error::InvalidLayout(format!(
                "render.default_row_height = {} is outside (0, 409]",
                r.default_row_height
            )));
        }

        Ok(())
    }
}
