//! Per-label pictures on the calculation sheet.
//!
//! For each qualifying label the lookup sheet is filtered down to the
//! label's rows, staged, sorted by a workbook macro and photographed. The
//! picture goes one row below the label's row on the calculation sheet.

use std::path::Path;

use prodreport_core::{
    filter_lookup_rows, picture_last_row, AutomationResult, CellAddress, CellRange,
    OfficeAutomation, RenderLayout, WorkbookId,
};
use tracing::{debug, error, info, warn};

use crate::error::Result;

/// What the render loop did
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RenderSummary {
    /// Stale pictures removed before rendering
    pub removed: usize,
    /// Labels that got a picture, with the row it was anchored at
    pub placed: Vec<(String, u32)>,
    /// Labels without a matching row on the calculation sheet
    pub skipped: Vec<String>,
}

/// Open the report, render every label, save and close.
///
/// The application is quit on every path. A label without a row on the
/// calculation sheet is logged and skipped; any other failure aborts the
/// loop without saving.
pub fn render_labels<A: OfficeAutomation>(
    automation: &mut A,
    report: &Path,
    labels: &[String],
    layout: &RenderLayout,
) -> Result<RenderSummary> {
    let result = render_session(automation, report, labels, layout);
    if automation.is_running() {
        if let Err(e) = automation.quit() {
            warn!(error = %e, "office application did not quit cleanly");
        }
    }
    result
}

fn render_session<A: OfficeAutomation>(
    automation: &mut A,
    report: &Path,
    labels: &[String],
    layout: &RenderLayout,
) -> Result<RenderSummary> {
    automation.launch()?;
    let workbook = automation.open_workbook(report)?;

    match render_all(automation, workbook, labels, layout) {
        Ok(summary) => {
            automation.save_workbook(workbook)?;
            automation.close_workbook(workbook)?;
            info!(
                placed = summary.placed.len(),
                skipped = summary.skipped.len(),
                "render loop finished"
            );
            Ok(summary)
        }
        Err(e) => {
            error!(error = %e, "render loop failed, report left unsaved");
            if let Err(close) = automation.close_workbook(workbook) {
                warn!(error = %close, "could not close report");
            }
            Err(e.into())
        }
    }
}

fn render_all<A: OfficeAutomation>(
    automation: &mut A,
    workbook: WorkbookId,
    labels: &[String],
    layout: &RenderLayout,
) -> AutomationResult<RenderSummary> {
    let zone = layout.image_zone();
    let mut summary = RenderSummary {
        removed: automation.delete_images_in(workbook, &layout.target_sheet, &zone)?,
        ..Default::default()
    };
    debug!(removed = summary.removed, zone = %zone, "removed stale pictures");

    for label in labels {
        match render_label(automation, workbook, label, layout)? {
            Some(row) => summary.placed.push((label.clone(), row)),
            None => summary.skipped.push(label.clone()),
        }
    }

    let anchored = automation.image_anchor_rows(workbook, &layout.target_sheet)?;
    for row in layout.image_zone_first_row..=layout.image_zone_last_row {
        if !anchored.contains(&row) {
            automation.set_row_height(
                workbook,
                &layout.target_sheet,
                row,
                layout.default_row_height,
            )?;
        }
    }

    Ok(summary)
}

/// Stage, sort and photograph one label. Returns the anchor row of the
/// pasted picture, or `None` when the label has no row to go under.
fn render_label<A: OfficeAutomation>(
    automation: &mut A,
    workbook: WorkbookId,
    label: &str,
    layout: &RenderLayout,
) -> AutomationResult<Option<u32>> {
    info!(label, "rendering label");

    let extent = automation.last_used_row(workbook, &layout.lookup_sheet, layout.lookup_extent_col)?;
    let lookup = automation.read_range(workbook, &layout.lookup_sheet, &layout.lookup_range(extent))?;
    let staged = filter_lookup_rows(&lookup, layout.tag_offset(), label, layout.lookup_width());
    debug!(label, rows = staged.len().saturating_sub(1), "filtered lookup rows");

    let staged_last =
        automation.last_used_row(workbook, &layout.staging_sheet, layout.staging_first_col)?;
    if staged_last >= layout.staging_clear_first_row {
        let stale = CellRange::from_bounds(
            layout.staging_clear_first_row,
            layout.staging_first_col,
            staged_last,
            layout.staging_clear_last_col,
        );
        automation.clear_contents(workbook, &layout.staging_sheet, &stale)?;
    }
    automation.write_range(workbook, &layout.staging_sheet, layout.staging_origin(), &staged)?;
    automation.run_macro(workbook, &layout.macro_name)?;

    let probe_range = CellRange::from_bounds(
        layout.picture_probe_first_row,
        layout.picture_probe_col,
        layout.picture_probe_last_row,
        layout.picture_probe_col,
    );
    let probe: Vec<_> = automation
        .read_range(workbook, &layout.staging_sheet, &probe_range)?
        .into_iter()
        .map(|row| row.into_iter().next().unwrap_or_default())
        .collect();
    let last_row = picture_last_row(&probe, layout.picture_probe_first_row, layout.picture_min_last_row);
    let picture = CellRange::from_bounds(1, layout.picture_first_col, last_row, layout.picture_last_col);
    debug!(label, range = %picture, "photographing staged rows");
    automation.render_range_as_image(workbook, &layout.staging_sheet, &picture)?;

    let Some(label_row) = find_label_row(automation, workbook, label, layout)? else {
        warn!(label, sheet = %layout.target_sheet, "label has no row, picture skipped");
        return Ok(None);
    };
    let anchor = CellAddress::new(label_row + 1, layout.target_label_col);
    let image = automation.paste_image(workbook, &layout.target_sheet, anchor)?;
    automation.set_row_height(workbook, &layout.target_sheet, anchor.row, image.height)?;
    debug!(label, anchor = %anchor, height = image.height, "picture placed");

    Ok(Some(anchor.row))
}

/// First row of the label column carrying `label`
fn find_label_row<A: OfficeAutomation>(
    automation: &mut A,
    workbook: WorkbookId,
    label: &str,
    layout: &RenderLayout,
) -> AutomationResult<Option<u32>> {
    let last = automation.last_used_row(workbook, &layout.target_sheet, layout.target_label_col)?;
    if last == 0 {
        return Ok(None);
    }
    let column = CellRange::from_bounds(1, layout.target_label_col, last, layout.target_label_col);
    let values = automation.read_range(workbook, &layout.target_sheet, &column)?;
    Ok(values
        .iter()
        .position(|row| row.first().is_some_and(|cell| cell.matches_label(label)))
        .map(|idx| idx as u32 + 1))
}
