//! Recalculation of the report through the office application.
//!
//! Formulas of the calculation sheet only pick up the pasted block after a
//! full recalculation, and the scan reads cached values, so the workbook is
//! opened, recalculated and saved by the real application in between.

use std::path::Path;
use std::thread;

use prodreport_core::{AutomationError, AutomationResult, OfficeAutomation, WorkbookId};
use tracing::{error, info, warn};

use crate::config::{ProcessConfig, RecalcConfig};
use crate::error::{PipelineError, Result};
use crate::guard::{ProcessLockGuard, ProcessTerminator};

/// Where an attempt stands. Transitions only move forward, in declaration
/// order, or to `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecalcState {
    NotStarted,
    Launched,
    Opened(WorkbookId),
    Recalculated(WorkbookId),
    Saved(WorkbookId),
    Closed,
    Failed,
}

/// Drives one recalculation attempt step by step
pub struct RecalcDriver<'a, A: OfficeAutomation> {
    automation: &'a mut A,
    state: RecalcState,
}

impl<'a, A: OfficeAutomation> RecalcDriver<'a, A> {
    pub fn new(automation: &'a mut A) -> Self {
        Self {
            automation,
            state: RecalcState::NotStarted,
        }
    }

    pub fn state(&self) -> RecalcState {
        self.state
    }

    fn out_of_order(&mut self, operation: &str) -> AutomationError {
        let err = AutomationError::command(
            operation,
            format!("not allowed in state {:?}", self.state),
        );
        self.state = RecalcState::Failed;
        err
    }

    fn track<T>(&mut self, result: AutomationResult<T>) -> AutomationResult<T> {
        if result.is_err() {
            self.state = RecalcState::Failed;
        }
        result
    }

    pub fn launch(&mut self) -> AutomationResult<()> {
        if self.state != RecalcState::NotStarted {
            return Err(self.out_of_order("launch"));
        }
        let result = self.automation.launch();
        self.track(result)?;
        self.state = RecalcState::Launched;
        Ok(())
    }

    pub fn open(&mut self, path: &Path) -> AutomationResult<()> {
        if self.state != RecalcState::Launched {
            return Err(self.out_of_order("open"));
        }
        let result = self.automation.open_workbook(path);
        let workbook = self.track(result)?;
        self.state = RecalcState::Opened(workbook);
        Ok(())
    }

    pub fn recalculate(&mut self) -> AutomationResult<()> {
        let RecalcState::Opened(workbook) = self.state else {
            return Err(self.out_of_order("recalculate"));
        };
        let result = self.automation.recalculate();
        self.track(result)?;
        self.state = RecalcState::Recalculated(workbook);
        Ok(())
    }

    pub fn save(&mut self) -> AutomationResult<()> {
        let RecalcState::Recalculated(workbook) = self.state else {
            return Err(self.out_of_order("save"));
        };
        let result = self.automation.save_workbook(workbook);
        self.track(result)?;
        self.state = RecalcState::Saved(workbook);
        Ok(())
    }

    pub fn close(&mut self) -> AutomationResult<()> {
        let RecalcState::Saved(workbook) = self.state else {
            return Err(self.out_of_order("close"));
        };
        let result = self.automation.close_workbook(workbook);
        self.track(result)?;
        self.state = RecalcState::Closed;
        Ok(())
    }

    /// Launch, open, recalculate, save and close in order
    pub fn run(&mut self, path: &Path) -> AutomationResult<()> {
        info!("launching office application");
        self.launch()?;
        info!(path = %path.display(), "opening report");
        self.open(path)?;
        info!("recalculating");
        self.recalculate()?;
        info!("saving report");
        self.save()?;
        self.close()
    }

    /// Quit the application whatever state the attempt ended in
    pub fn quit(&mut self) {
        if !self.automation.is_running() {
            return;
        }
        if let Err(e) = self.automation.quit() {
            warn!(error = %e, "office application did not quit cleanly");
        }
    }
}

/// Outcome of the retried recalculation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecalcOutcome {
    pub attempts: u32,
    pub succeeded: bool,
}

/// Recalculate the report, retrying a bounded number of times.
///
/// Every attempt runs under its own process guard and ends with the
/// application quit. Exhausting the attempts is fatal unless the policy
/// says to continue.
pub fn recalculate_report<A, T>(
    automation: &mut A,
    terminator: &mut T,
    report: &Path,
    policy: &RecalcConfig,
    processes: &ProcessConfig,
) -> Result<RecalcOutcome>
where
    A: OfficeAutomation,
    T: ProcessTerminator,
{
    let attempts = policy.attempts.max(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        info!(attempt, attempts, "recalculating report");
        let guard = ProcessLockGuard::acquire(&mut *terminator, processes);
        let mut driver = RecalcDriver::new(&mut *automation);
        let result = driver.run(report);
        driver.quit();
        guard.release();

        match result {
            Ok(()) => {
                info!(attempt, "recalculation completed");
                return Ok(RecalcOutcome {
                    attempts: attempt,
                    succeeded: true,
                });
            }
            Err(e) => {
                error!(attempt, error = %e, "recalculation attempt failed");
                last_error = Some(e);
                if attempt < attempts {
                    info!(delay_ms = policy.retry_delay_ms, "retrying recalculation");
                    thread::sleep(policy.retry_delay());
                }
            }
        }
    }

    let last = last_error.unwrap_or(AutomationError::NotRunning);
    if policy.continue_on_failure {
        warn!(attempts, error = %last, "recalculation failed, continuing with cached values");
        return Ok(RecalcOutcome {
            attempts,
            succeeded: false,
        });
    }
    error!(attempts, "giving up on recalculation");
    Err(PipelineError::RecalculationFailed { attempts, last })
}
