// oppsift - main.rs
//
// Command-line entry point. Handles:
// 1. CLI argument parsing
// 2. config.toml loading and logging initialisation (debug mode support)
// 3. One pipeline run over the given spreadsheet
// 4. Writing both downloads and printing a short summary

use clap::Parser;
use oppsift::app::classifier::{Classifier, PlanFileClassifier, UnavailableClassifier};
use oppsift::app::pipeline::{self, PipelineOptions, PipelineOutcome, PipelineRequest, PlanSource};
use oppsift::core::dates;
use oppsift::platform::config::{self, AppConfig, PlatformPaths};
use oppsift::platform::fs;
use oppsift::util;
use oppsift::util::error::{OppsiftError, Result};
use std::path::{Path, PathBuf};

/// oppsift - Normalise, filter and export federal contracting opportunities.
///
/// Loads a CSV or Excel export of opportunities, normalises set-aside and
/// opportunity type, applies the classifier's filter plan and writes
/// Filtered_Results.xlsx and Filtered_Results.csv.
#[derive(Parser, Debug)]
#[command(name = "oppsift", version, about)]
struct Cli {
    /// Spreadsheet to process (.csv, .xlsx or .xls).
    input: PathBuf,

    /// Free-text instruction passed to the classifier.
    #[arg(short = 'i', long = "instruction", default_value = "")]
    instruction: String,

    /// Recorded classifier response (JSON plan) to use.
    #[arg(short = 'p', long = "plan")]
    plan: Option<PathBuf>,

    /// Directory the downloads are written to.
    #[arg(short = 'o', long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Worksheet name of the workbook export.
    #[arg(long = "sheet-name")]
    sheet_name: Option<String>,

    /// Keep rows without a qualifying set-aside.
    #[arg(long = "keep-unqualified")]
    keep_unqualified: bool,

    /// Write the classifier request payload to this file.
    #[arg(long = "dump-request")]
    dump_request: Option<PathBuf>,

    /// Use this config file instead of the platform default.
    #[arg(short = 'c', long = "config")]
    config: Option<PathBuf>,

    /// Enable debug logging (equivalent to RUST_LOG=debug).
    #[arg(short = 'd', long = "debug")]
    debug: bool,
}

fn main() {
    let cli = Cli::parse();
    let platform_paths = PlatformPaths::resolve();

    // Logging is not up yet, so config errors go straight to stderr.
    let (app_config, config_warnings) = match cli.config.as_deref() {
        Some(path) => match config::load_config_file(path).map_err(OppsiftError::from) {
            Ok(loaded) => loaded,
            Err(e) => {
                eprintln!("Error: {e}");
                std::process::exit(1);
            }
        },
        None => config::load_config(&platform_paths.config_dir),
    };

    util::logging::init(
        cli.debug,
        app_config.log_level.as_deref(),
        app_config.log_file.as_deref(),
    );

    tracing::info!(
        version = util::constants::APP_VERSION,
        debug = cli.debug,
        "oppsift starting"
    );
    for warning in &config_warnings {
        tracing::warn!("{}", warning);
    }

    if let Err(e) = run(&cli, &app_config, &platform_paths) {
        tracing::error!(error = %e, "Run failed");
        eprintln!("Error: {e}");
        std::process::exit(1);
    }
}

fn run(cli: &Cli, app_config: &AppConfig, platform_paths: &PlatformPaths) -> Result<()> {
    let options = PipelineOptions {
        drop_unqualified: app_config.drop_unqualified && !cli.keep_unqualified,
        sheet_name: cli
            .sheet_name
            .clone()
            .unwrap_or_else(|| app_config.sheet_name.clone()),
    };
    let out_dir = cli
        .out_dir
        .clone()
        .or_else(|| app_config.output_dir.clone())
        .unwrap_or_else(|| platform_paths.data_dir.clone());

    let classifier: Box<dyn Classifier> = match &cli.plan {
        Some(path) => Box::new(PlanFileClassifier::new(path)),
        None => Box::new(UnavailableClassifier::new("no --plan given")),
    };

    let bytes = fs::read_file(&cli.input, "read input")?;
    let file_name = cli
        .input
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    let today = dates::reference_today();
    tracing::info!(
        today = %today,
        timezone = util::constants::REFERENCE_TIMEZONE_NAME,
        "Reference date"
    );

    let outcome = pipeline::run(
        PipelineRequest {
            file_name: &file_name,
            bytes: &bytes,
            instruction: &cli.instruction,
        },
        &options,
        &*classifier,
        today,
    )?;

    if let (Some(dump_path), Some(json)) = (&cli.dump_request, &outcome.request_json) {
        let (dir, name) = split_path(dump_path);
        fs::write_atomic(&dir, &name, json.as_bytes())?;
    }

    let mut written = Vec::with_capacity(outcome.downloads.len());
    for download in &outcome.downloads {
        written.push(fs::write_atomic(
            &out_dir,
            download.file_name,
            &download.bytes,
        )?);
    }

    print_summary(&outcome, &written);
    Ok(())
}

/// Directory and file name of a user-supplied output path.
fn split_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "request.json".to_string());
    (dir, name)
}

fn print_summary(outcome: &PipelineOutcome, written: &[PathBuf]) {
    println!(
        "Rows: {} loaded, {} after set-aside screening, {} after filters",
        outcome.rows_loaded,
        outcome.rows_before_filters,
        outcome.filters.table.row_count()
    );

    match &outcome.plan_source {
        PlanSource::Classifier { name } => println!("Plan: from {name}"),
        PlanSource::Fallback { .. } => println!("Plan: fallback (AI planning step failed)"),
    }
    if !outcome.plan.plan_explanation.is_empty() {
        println!("  {}", outcome.plan.plan_explanation);
    }

    for applied in &outcome.filters.applied {
        println!(
            "Filter {}: {} ({} -> {} rows)",
            applied.index + 1,
            applied.description,
            applied.rows_before,
            applied.rows_after
        );
    }
    for skipped in &outcome.filters.skipped {
        println!(
            "Filter {} skipped: {} {} ({})",
            skipped.index + 1,
            skipped.predicate.column,
            skipped.predicate.operator,
            skipped.error
        );
    }

    for path in written {
        println!("Wrote {}", path.display());
    }
}
