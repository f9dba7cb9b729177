//! The daily run, start to finish

use std::path::Path;

use chrono::{Local, NaiveDate};
use prodreport_core::{
    copy_block, find_date_column, paste_origin, scan_qualifying_labels, CellAddress, CopiedBlock,
    DateColumnQuery, OfficeAutomation, PasteFootprint, SourceTable,
};
use prodreport_xlsx::{read_sheet_grid, read_source_table, WorkbookPackage};
use tracing::{error, info};

use crate::config::{Config, ResolvedFiles};
use crate::error::Result;
use crate::guard::{ProcessLockGuard, ProcessTerminator};
use crate::recalc::{recalculate_report, RecalcOutcome};
use crate::render::{render_labels, RenderSummary};

/// What a run did
#[derive(Debug, Clone, PartialEq)]
pub struct RunSummary {
    /// Data rows copied from the overview
    pub source_rows: usize,
    /// Plan column the block was copied from
    pub plan_column: u32,
    /// Calculation sheet column the block was pasted at
    pub paste_column: u32,
    pub recalc: RecalcOutcome,
    /// Qualifying labels in scan order
    pub labels: Vec<String>,
    /// `None` when rendering is disabled
    pub render: Option<RenderSummary>,
}

/// One configured run over the three workbooks.
///
/// `A` drives the office application and `T` stops stray office
/// processes; both are replaced by mocks in tests.
pub struct Pipeline<A, T> {
    config: Config,
    files: ResolvedFiles,
    automation: A,
    terminator: T,
    today: NaiveDate,
}

impl<A: OfficeAutomation, T: ProcessTerminator> Pipeline<A, T> {
    pub fn new(config: Config, files: ResolvedFiles, automation: A, terminator: T) -> Self {
        Self {
            config,
            files,
            automation,
            terminator,
            today: Local::now().date_naive(),
        }
    }

    /// Run as if today were `today`
    pub fn with_today(mut self, today: NaiveDate) -> Self {
        self.today = today;
        self
    }

    pub fn automation(&self) -> &A {
        &self.automation
    }

    pub fn terminator(&self) -> &T {
        &self.terminator
    }

    /// Run every step once. Stray office processes are stopped before the
    /// first step and after the last one, whatever the outcome.
    pub fn run(&mut self) -> Result<RunSummary> {
        info!(today = %self.today, "starting production report run");
        let Self {
            config,
            files,
            automation,
            terminator,
            today,
        } = self;

        let mut guard = ProcessLockGuard::acquire(&mut *terminator, &config.processes);
        let mut steps = Steps {
            config,
            files,
            automation,
            terminator: guard.terminator(),
            today: *today,
        };
        let result = steps.run();
        guard.release();

        match &result {
            Ok(summary) => info!(
                labels = summary.labels.len(),
                recalculated = summary.recalc.succeeded,
                "production report run finished"
            ),
            Err(e) => error!(error = %e, "production report run failed"),
        }
        result
    }
}

struct Steps<'a, A, T> {
    config: &'a Config,
    files: &'a ResolvedFiles,
    automation: &'a mut A,
    terminator: &'a mut T,
    today: NaiveDate,
}

impl<A: OfficeAutomation, T: ProcessTerminator> Steps<'_, A, T> {
    fn run(&mut self) -> Result<RunSummary> {
        let table = logged("read overview", self.read_overview())?;
        logged("land overview", self.land_overview(&table))?;
        let (plan_column, block) = logged("copy plan block", self.copy_plan_block())?;
        let paste_column = logged("paste plan block", self.paste_plan_block(&block))?;
        let recalc = logged("recalculate", self.recalculate())?;
        let labels = logged("scan calculation sheet", self.scan())?;
        let render = logged("render labels", self.render(&labels))?;

        Ok(RunSummary {
            source_rows: table.row_count(),
            plan_column,
            paste_column,
            recalc,
            labels,
            render,
        })
    }

    /// Step 1
    fn read_overview(&self) -> Result<SourceTable> {
        let sheet = &self.config.layout.source_sheet.sheet;
        info!(path = %self.files.overview.display(), sheet = %sheet, "reading production overview");
        let table = read_source_table(&self.files.overview, sheet)?;
        info!(
            rows = table.row_count(),
            columns = table.column_count(),
            "production overview read"
        );
        Ok(table)
    }

    /// Step 2
    fn land_overview(&self, table: &SourceTable) -> Result<()> {
        let landing = &self.config.layout.source_sheet.landing_sheet;
        info!(sheet = %landing, "replacing landing sheet");
        let mut package = WorkbookPackage::open(&self.files.report)?;
        package.replace_sheet_rows(landing, &table.to_sheet_rows())?;
        package.save()?;
        Ok(())
    }

    /// Steps 3 and 4
    fn copy_plan_block(&self) -> Result<(u32, CopiedBlock)> {
        let plan = &self.config.layout.plan;
        let target = plan.date_rule.target_date(self.today);
        info!(%target, sheet = %plan.sheet, "locating plan column");

        let grid = read_sheet_grid(&self.files.plan, &plan.sheet)?;
        let mut query = DateColumnQuery::new(plan.header_row, target);
        if let Some(marker) = &plan.locked_marker {
            query = query.with_locked_marker(marker.clone());
        }
        let column = find_date_column(&grid, &query)?;

        let block = copy_block(
            &grid,
            plan.block_first_row,
            plan.block_last_row,
            column,
            plan.block_width,
        );
        info!(
            column,
            rows = block.height(),
            width = block.width(),
            "copied plan block"
        );
        Ok((column, block))
    }

    /// Step 5
    fn paste_plan_block(&mut self, block: &CopiedBlock) -> Result<u32> {
        let guard = ProcessLockGuard::acquire(&mut *self.terminator, &self.config.processes);
        let result = paste_block(self.config, &self.files.report, self.today, block);
        guard.release();
        result
    }

    /// Step 6
    fn recalculate(&mut self) -> Result<RecalcOutcome> {
        recalculate_report(
            &mut *self.automation,
            &mut *self.terminator,
            &self.files.report,
            &self.config.recalc,
            &self.config.processes,
        )
    }

    /// Step 7
    fn scan(&self) -> Result<Vec<String>> {
        let scan = &self.config.layout.scan;
        let grid = read_sheet_grid(&self.files.report, &scan.sheet)?;
        let labels = scan_qualifying_labels(&grid, scan);
        info!(count = labels.len(), ?labels, "qualifying labels");
        Ok(labels)
    }

    /// Step 8
    fn render(&mut self, labels: &[String]) -> Result<Option<RenderSummary>> {
        let layout = &self.config.layout.render;
        if !layout.enabled {
            info!("rendering disabled");
            return Ok(None);
        }
        let guard = ProcessLockGuard::acquire(&mut *self.terminator, &self.config.processes);
        let result = render_labels(&mut *self.automation, &self.files.report, labels, layout);
        guard.release();
        result.map(Some)
    }
}

fn paste_block(
    config: &Config,
    report: &Path,
    today: NaiveDate,
    block: &CopiedBlock,
) -> Result<u32> {
    let paste = &config.layout.paste;
    let target = paste.date_rule.target_date(today);
    info!(%target, sheet = %paste.sheet, "locating paste column");

    let grid = read_sheet_grid(report, &paste.sheet)?;
    let date_column = find_date_column(&grid, &DateColumnQuery::new(paste.header_row, target))?;
    let column = paste_origin(date_column, paste.column_shift)?;

    let footprint = PasteFootprint::new(
        CellAddress::new(paste.first_row, column),
        block,
        config.layout.plan.block_rows(),
    );
    info!(at = %footprint.origin, clear = %footprint.clear, "pasting plan block");

    let mut package = WorkbookPackage::open(report)?;
    package.clear_range(&paste.sheet, &footprint.clear)?;
    package.write_cells(&paste.sheet, footprint.origin, block.rows())?;
    package.save()?;
    Ok(column)
}

/// Log a failed step before it propagates
fn logged<R>(step: &str, result: Result<R>) -> Result<R> {
    if let Err(e) = &result {
        error!(step, error = %e, "step failed");
    }
    result
}
