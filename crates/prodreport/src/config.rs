//! Run configuration.
//!
//! Loaded from TOML. Every field has a default matching the production
//! workbooks, so an empty file (or no file at all) is a valid configuration:
//!
//! ```toml
//! [files]
//! report = "poročanje proizvodnje2025.xlsm"
//!
//! [scan]
//! threshold = 75.0
//!
//! [render]
//! enabled = false
//!
//! [recalc]
//! attempts = 5
//! continue_on_failure = true
//! ```
//!
//! Sheet layout sections (`[source_sheet]`, `[plan]`, `[paste]`, `[scan]`,
//! `[render]`) are the fields of [`Layout`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use prodreport_core::Layout;
use prodreport_excel_com::ExcelBridgeConfig;
use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, Result};

/// Complete configuration of one run
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub files: FilesConfig,
    #[serde(flatten)]
    pub layout: Layout,
    pub recalc: RecalcConfig,
    pub processes: ProcessConfig,
    pub bridge: BridgeConfig,
}

/// The three workbooks, relative to the working directory unless absolute
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FilesConfig {
    /// Production overview exported by the MES
    pub overview: PathBuf,
    /// Macro-enabled reporting workbook, edited in place
    pub report: PathBuf,
    /// Monthly planning workbook, read only
    pub plan: PathBuf,
}

impl Default for FilesConfig {
    fn default() -> Self {
        Self {
            overview: PathBuf::from("43.xls"),
            report: PathBuf::from("poročanje proizvodnje2025.xlsm"),
            plan: PathBuf::from("plan brizganja 2025 mesečni.xlsx"),
        }
    }
}

/// Recalculation retry policy
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecalcConfig {
    pub attempts: u32,
    pub retry_delay_ms: u64,
    /// Log and carry on when every attempt failed
    pub continue_on_failure: bool,
}

impl Default for RecalcConfig {
    fn default() -> Self {
        Self {
            attempts: 3,
            retry_delay_ms: 5_000,
            continue_on_failure: false,
        }
    }
}

impl RecalcConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

/// Stray office processes killed around every mutation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProcessConfig {
    /// Executable names, compared case-insensitively
    pub names: Vec<String>,
    /// Pause after something was terminated
    pub grace_ms: u64,
    /// Time a process gets to exit before it is force-killed
    pub kill_timeout_ms: u64,
}

impl Default for ProcessConfig {
    fn default() -> Self {
        Self {
            names: vec!["excel.exe".into(), "xlview.exe".into()],
            grace_ms: 2_000,
            kill_timeout_ms: 3_000,
        }
    }
}

impl ProcessConfig {
    pub fn grace(&self) -> Duration {
        Duration::from_millis(self.grace_ms)
    }

    pub fn kill_timeout(&self) -> Duration {
        Duration::from_millis(self.kill_timeout_ms)
    }
}

/// How the Excel bridge process is started
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BridgeConfig {
    /// `excel-com-bridge.exe`; searched next to the binary when unset
    pub exe: Option<PathBuf>,
    /// Run through WINE; defaults to everywhere but Windows
    pub use_wine: Option<bool>,
    pub wine: PathBuf,
    pub wine_prefix: Option<PathBuf>,
    pub timeout_secs: u64,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            exe: None,
            use_wine: None,
            wine: PathBuf::from("wine"),
            wine_prefix: None,
            timeout_secs: 120,
        }
    }
}

impl BridgeConfig {
    /// Bridge settings with relative paths resolved against `base`
    pub fn to_bridge_config(&self, base: &Path) -> ExcelBridgeConfig {
        let defaults = ExcelBridgeConfig::default();
        ExcelBridgeConfig {
            bridge_exe_path: self.exe.as_ref().map(|exe| base.join(exe)),
            use_wine: self.use_wine.unwrap_or(defaults.use_wine),
            wine_path: self.wine.clone(),
            wine_prefix: self.wine_prefix.as_ref().map(|prefix| base.join(prefix)),
            timeout: Duration::from_secs(self.timeout_secs),
        }
    }
}

/// Absolute, existing paths of the three workbooks
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedFiles {
    pub overview: PathBuf,
    pub report: PathBuf,
    pub plan: PathBuf,
}

impl Config {
    /// Parse a TOML document
    pub fn from_toml_str(text: &str) -> Result<Self> {
        let config: Config =
            toml::from_str(text).map_err(|e| PipelineError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Read and parse a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path).map_err(|e| {
            PipelineError::Config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_toml_str(&text)
    }

    /// Check bounds of every layout field and of the retry policy
    pub fn validate(&self) -> Result<()> {
        self.layout.validate()?;
        if self.recalc.attempts == 0 {
            return Err(PipelineError::Config(
                "recalc.attempts must be at least 1".into(),
            ));
        }
        if self.processes.names.iter().any(|name| name.trim().is_empty()) {
            return Err(PipelineError::Config(
                "processes.names must not contain empty names".into(),
            ));
        }
        if self.bridge.timeout_secs == 0 {
            return Err(PipelineError::Config(
                "bridge.timeout_secs must be at least 1".into(),
            ));
        }
        Ok(())
    }

    /// Resolve the workbook paths against `workdir` and check they exist
    pub fn resolve_files(&self, workdir: &Path) -> Result<ResolvedFiles> {
        let resolve = |path: &Path| -> Result<PathBuf> {
            let joined = workdir.join(path);
            if !joined.is_file() {
                return Err(PipelineError::MissingFile(joined));
            }
            Ok(std::path::absolute(&joined).unwrap_or(joined))
        };
        Ok(ResolvedFiles {
            overview: resolve(&self.files.overview)?,
            report: resolve(&self.files.report)?,
            plan: resolve(&self.files.plan)?,
        })
    }
}
