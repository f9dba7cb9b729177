//! prodreport - daily production report

use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result};
use clap::Parser;
use prodreport::{Config, Pipeline, SystemProcesses};
use prodreport_excel_com::ExcelAutomation;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

/// Looked up in the working directory when `--config` is not given
const DEFAULT_CONFIG: &str = "prodreport.toml";

#[derive(Parser)]
#[command(name = "prodreport")]
#[command(
    author,
    version,
    about = "Build the daily production report from the overview export and the monthly plan"
)]
struct Cli {
    /// TOML configuration (default: prodreport.toml in the working directory, if present)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory the workbook paths are relative to (default: current directory)
    #[arg(short, long)]
    workdir: Option<PathBuf>,

    /// Skip the per-label pictures
    #[arg(long)]
    skip_render: bool,

    /// Log per-step detail
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{:#}", e);
            ExitCode::FAILURE
        }
    }
}

fn init_logging(verbose: bool) {
    let default_level = if verbose { "debug" } else { "info" };
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}

fn run(cli: &Cli) -> Result<()> {
    let workdir = match &cli.workdir {
        Some(dir) => dir.clone(),
        None => std::env::current_dir().context("Failed to determine the working directory")?,
    };

    let mut config = load_config(cli.config.as_deref(), &workdir)?;
    if cli.skip_render {
        config.layout.render.enabled = false;
    }

    let files = config
        .resolve_files(&workdir)
        .context("Input files are not in place")?;
    info!(
        overview = %files.overview.display(),
        report = %files.report.display(),
        plan = %files.plan.display(),
        "input files"
    );

    let excel = ExcelAutomation::new(config.bridge.to_bridge_config(&workdir));
    let processes = SystemProcesses::from_config(&config.processes);
    let summary = Pipeline::new(config, files, excel, processes)
        .run()
        .context("Production report run failed")?;

    info!(
        source_rows = summary.source_rows,
        plan_column = summary.plan_column,
        paste_column = summary.paste_column,
        recalculated = summary.recalc.succeeded,
        labels = summary.labels.len(),
        pictures = summary.render.as_ref().map_or(0, |r| r.placed.len()),
        "report ready"
    );
    Ok(())
}

fn load_config(explicit: Option<&Path>, workdir: &Path) -> Result<Config> {
    if let Some(path) = explicit {
        return Config::load(path)
            .with_context(|| format!("Failed to load configuration '{}'", path.display()));
    }

    let default = workdir.join(DEFAULT_CONFIG);
    if default.is_file() {
        Config::load(&default)
            .with_context(|| format!("Failed to load configuration '{}'", default.display()))
    } else {
        Ok(Config::default())
    }
}
