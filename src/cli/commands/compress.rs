//! Compress command implementation
//!
//! Reads every input, submits all of them to one worker pool at once and
//! writes each result as it is collected.

use crate::cli::Output;
use crate::config::PressConfig;
use crate::pool::{CompressOutcome, GzipEngine, PoolError, WorkerPool};
use crate::shared::document::{compression_ratio, format_bytes, is_pdf, output_name};
use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tokio::task::JoinSet;

#[derive(Args)]
pub struct CompressArgs {
    /// Documents to compress
    #[arg(required = true, value_name = "FILES")]
    pub files: Vec<PathBuf>,

    /// Number of worker units (overrides pool.size)
    #[arg(short, long)]
    pub workers: Option<usize>,

    /// Directory for compressed outputs (overrides output.dir)
    #[arg(short, long, value_name = "DIR")]
    pub output_dir: Option<PathBuf>,

    /// gzip level 0-9 (overrides engine.level)
    #[arg(short, long, value_parser = clap::value_parser!(u32).range(0..=9))]
    pub level: Option<u32>,

    /// Report format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    Text,
    Json,
}

/// An input that passed the boundary check, with the output path it claimed
struct Accepted {
    path: PathBuf,
    name: String,
    bytes: Vec<u8>,
    target: PathBuf,
}

/// Result of reading and checking the inputs
struct Intake {
    accepted: Vec<Accepted>,
    skipped: Vec<String>,
    /// Inputs whose output path was already claimed by an earlier input
    conflicts: Vec<FileReport>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FileReport {
    input: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    output: Option<String>,
    success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    original_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    compressed_size: Option<usize>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ratio: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

#[derive(Debug, Serialize)]
struct BatchReport {
    processed: usize,
    total: usize,
    workers: usize,
    skipped: Vec<String>,
    files: Vec<FileReport>,
}

pub async fn execute(args: CompressArgs, custom_config: Option<&str>, output: &Output) -> Result<()> {
    let mut config = PressConfig::load_unvalidated(custom_config)?;
    if let Some(workers) = args.workers {
        config.pool.size = workers;
    }
    if let Some(level) = args.level {
        config.engine.level = level;
    }
    if let Some(dir) = &args.output_dir {
        config.output.dir = dir.to_string_lossy().into_owned();
    }
    config.validate()?;

    let Intake {
        accepted,
        skipped,
        conflicts,
    } = collect_inputs(&args.files, &config, output);
    if accepted.is_empty() {
        anyhow::bail!("No acceptable input files (expected PDF documents)");
    }

    let workers = config.resolve_pool_size().min(accepted.len());
    let pool = WorkerPool::new(workers, GzipEngine::factory(config.engine.level))?;
    output.verbose(&format!(
        "Compressing {} file(s) on {} worker unit(s)",
        accepted.len(),
        workers
    ));

    let progress = if args.format == ReportFormat::Text {
        output.progress_bar(accepted.len() as u64, "compressing")
    } else {
        indicatif::ProgressBar::hidden()
    };

    let mut sources = Vec::with_capacity(accepted.len());
    let mut running = JoinSet::new();
    for (index, input) in accepted.into_iter().enumerate() {
        let handle = pool.submit(input.bytes, input.name.clone());
        tracing::debug!("Submitted {} as task {}", input.name, handle.id());
        running.spawn(async move { (index, handle.await) });
        sources.push((input.path, input.target));
    }

    // Collected in completion order, reported in submission order
    let mut settled: Vec<Option<Result<CompressOutcome, PoolError>>> =
        (0..sources.len()).map(|_| None).collect();
    while let Some(joined) = running.join_next().await {
        let (index, settlement) = joined.context("Result collector panicked")?;
        progress.inc(1);
        settled[index] = Some(settlement);
    }
    progress.finish_and_clear();

    tokio::task::spawn_blocking(move || pool.shutdown())
        .await
        .context("Failed to shut down worker pool")?;

    let mut files = Vec::with_capacity(sources.len());
    for ((path, target), settlement) in sources.iter().zip(settled) {
        let settlement = settlement.unwrap_or(Err(PoolError::ShutDown));
        let report = match settlement {
            Ok(outcome) => match write_output(target, &outcome) {
                Ok(()) => FileReport {
                    input: path.display().to_string(),
                    output: Some(target.display().to_string()),
                    success: true,
                    original_size: Some(outcome.original_size),
                    compressed_size: Some(outcome.compressed_size),
                    ratio: Some(compression_ratio(outcome.original_size, outcome.compressed_size)),
                    error: None,
                },
                Err(e) => failed(path, format!("{:#}", e)),
            },
            Err(e) => failed(path, e.to_string()),
        };
        files.push(report);
    }
    files.extend(conflicts);

    let processed = files.iter().filter(|f| f.success).count();
    let total = files.len();
    let report = BatchReport {
        processed,
        total,
        workers,
        skipped,
        files,
    };

    match args.format {
        ReportFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("Failed to render report")?
            );
        }
        ReportFormat::Text => print_text_report(&report, output),
    }

    if processed == 0 {
        anyhow::bail!("No files were compressed successfully");
    }
    Ok(())
}

/// Read every path, apply the boundary check and claim an output path for
/// each accepted input. Two inputs mapping to the same output are not both
/// compressed; the later one is reported as failed.
fn collect_inputs(paths: &[PathBuf], config: &PressConfig, output: &Output) -> Intake {
    let mut intake = Intake {
        accepted: Vec::new(),
        skipped: Vec::new(),
        conflicts: Vec::new(),
    };
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();

    for path in paths {
        let bytes = match fs::read(path) {
            Ok(bytes) => bytes,
            Err(e) => {
                output.warning(&format!("Skipping {}: {}", path.display(), e));
                intake.skipped.push(path.display().to_string());
                continue;
            }
        };

        if config.input.pdf_only && !is_pdf(path, &bytes) {
            output.warning(&format!("Skipping {}: not a PDF document", path.display()));
            intake.skipped.push(path.display().to_string());
            continue;
        }

        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        let target = config
            .output_dir_for(path)
            .join(output_name(&config.output.prefix, &name, GzipEngine::EXTENSION));

        if let Some(owner) = claimed.get(&target) {
            let message = format!(
                "output {} is already claimed by {}",
                target.display(),
                owner.display()
            );
            output.warning(&format!("Not compressing {}: {}", path.display(), message));
            intake.conflicts.push(failed(path, message));
            continue;
        }
        claimed.insert(target.clone(), path.clone());

        intake.accepted.push(Accepted {
            path: path.clone(),
            name,
            bytes,
            target,
        });
    }

    intake
}

fn write_output(target: &Path, outcome: &CompressOutcome) -> Result<()> {
    if let Some(dir) = target.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create output directory {}", dir.display()))?;
    }

    fs::write(target, &outcome.data)
        .with_context(|| format!("Failed to write {}", target.display()))?;
    tracing::info!(
        "Wrote {} ({} -> {}) from unit {}",
        target.display(),
        outcome.original_size,
        outcome.compressed_size,
        outcome.slot
    );
    Ok(())
}

fn failed(path: &Path, error: String) -> FileReport {
    FileReport {
        input: path.display().to_string(),
        output: None,
        success: false,
        original_size: None,
        compressed_size: None,
        ratio: None,
        error: Some(error),
    }
}

fn print_text_report(report: &BatchReport, output: &Output) {
    for file in &report.files {
        match (&file.error, file.original_size, file.compressed_size) {
            (None, Some(original), Some(compressed)) => {
                let detail = format!(
                    "{} -> {} ({}% smaller)",
                    format_bytes(original),
                    format_bytes(compressed),
                    file.ratio.as_deref().unwrap_or("0.00")
                );
                output.file_result(&file.input, &detail, true);
            }
            (error, _, _) => {
                output.file_result(&file.input, error.as_deref().unwrap_or("failed"), false);
            }
        }
    }

    output.blank_line();
    let summary = format!(
        "Completed! {}/{} files processed successfully.",
        report.processed, report.total
    );
    if report.processed == 0 {
        output.error(&summary);
    } else {
        output.success(&summary);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_collect_inputs_applies_boundary_check() {
        let temp_dir = TempDir::new().unwrap();
        let pdf = temp_dir.path().join("report.pdf");
        let sniffed = temp_dir.path().join("scan.bin");
        let text = temp_dir.path().join("notes.txt");
        fs::write(&pdf, b"%PDF-1.4 body").unwrap();
        fs::write(&sniffed, b"%PDF-1.7 body").unwrap();
        fs::write(&text, b"plain text").unwrap();
        let missing = temp_dir.path().join("missing.pdf");

        let output = Output::new(false, true);
        let mut config = PressConfig::default();
        let paths = vec![pdf, sniffed, text.clone(), missing];
        let intake = collect_inputs(&paths, &config, &output);

        let names: Vec<_> = intake.accepted.iter().map(|a| a.name.as_str()).collect();
        assert_eq!(names, vec!["report.pdf", "scan.bin"]);
        assert_eq!(intake.skipped.len(), 2);
        assert!(intake.skipped.contains(&text.display().to_string()));
        assert_eq!(
            intake.accepted[0].target,
            temp_dir.path().join("compressed_report.pdf.gz")
        );

        config.input.pdf_only = false;
        let intake = collect_inputs(&paths, &config, &output);
        assert_eq!(intake.accepted.len(), 3);
    }

    #[test]
    fn test_same_name_into_one_directory_is_a_conflict() {
        let temp_dir = TempDir::new().unwrap();
        for sub in ["a", "b"] {
            fs::create_dir(temp_dir.path().join(sub)).unwrap();
            fs::write(temp_dir.path().join(sub).join("x.pdf"), b"%PDF-1.4").unwrap();
        }
        let paths = vec![temp_dir.path().join("a/x.pdf"), temp_dir.path().join("b/x.pdf")];
        let output = Output::new(false, true);

        // Next to their inputs the outputs differ
        let mut config = PressConfig::default();
        let intake = collect_inputs(&paths, &config, &output);
        assert_eq!(intake.accepted.len(), 2);
        assert!(intake.conflicts.is_empty());

        config.output.dir = temp_dir.path().join("out").display().to_string();
        let intake = collect_inputs(&paths, &config, &output);
        assert_eq!(intake.accepted.len(), 1);
        assert_eq!(intake.accepted[0].path, paths[0]);
        assert_eq!(intake.conflicts.len(), 1);
        assert!(!intake.conflicts[0].success);
        assert!(intake.conflicts[0].error.as_deref().unwrap().contains("already claimed"));
    }

    #[test]
    fn test_write_output_creates_directory() {
        let temp_dir = TempDir::new().unwrap();
        let target = temp_dir.path().join("out/compressed_a.pdf.gz");

        let outcome = CompressOutcome {
            original_size: 10,
            compressed_size: 3,
            data: vec![1, 2, 3],
            slot: 0,
        };
        write_output(&target, &outcome).unwrap();

        assert_eq!(fs::read(target).unwrap(), vec![1, 2, 3]);
    }
}
