//! Catalog alignment CLI
//!
//! Runs a preview pass over uploaded photos or a job sheet, then delivers the
//! cached session into a tar.gz archive or an output directory.

use super::config::CliConfigBuilder;
use crate::{
    backends::CommandExtractor,
    config::{DeploymentProfile, PipelineConfig, ProductCategory},
    processor::CatalogProcessor,
    services::{import_file, ArchiveWriter, ChromiumRenderer, DirectoryArchive, TarGzArchive},
    tracing_config::{events, init_cli_tracing, spans, TracingGuard},
    types::{BatchPreview, ProcessingJob},
};
use anyhow::{Context, Result};
use clap::Parser;
use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;

const IMAGE_EXTENSIONS: [&str; 7] = ["jpg", "jpeg", "png", "webp", "bmp", "tiff", "tif"];
const DEFAULT_OUTPUT_DIR: &str = "catalog-output";

/// Product photo normalization tool
#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
#[command(name = "catalog-aligner")]
#[allow(clippy::struct_excessive_bools)]
pub struct Cli {
    /// Input images, directories or glob patterns
    #[arg(value_name = "INPUT")]
    pub input: Vec<String>,

    /// CSV job sheet with `sku` and `image_url` columns
    #[arg(long, value_name = "CSV")]
    pub sheet: Option<PathBuf>,

    /// Product category (footwear, catalog, coming-soon, pharma) [default: catalog]
    #[arg(short, long)]
    pub category: Option<ProductCategory>,

    /// Deployment profile (standard, constrained) [default: $CATALOG_ALIGNER_DEPLOYMENT or standard]
    #[arg(long)]
    pub deployment: Option<DeploymentProfile>,

    /// JSON pipeline configuration; flags override its values
    #[arg(long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Cut out the product before alignment
    #[arg(long)]
    pub remove_background: bool,

    /// Default destination background image
    #[arg(long, value_name = "PATH")]
    pub background: Option<PathBuf>,

    /// Directory of `{brand}.png` logos
    #[arg(long, value_name = "DIR")]
    pub logos: Option<PathBuf>,

    /// Font file for date labels
    #[arg(long, value_name = "PATH")]
    pub font: Option<PathBuf>,

    /// Background removal executable [default: imgly-bgremove]
    #[arg(long, value_name = "PATH")]
    pub extractor: Option<PathBuf>,

    /// Headless Chromium executable used to render date labels
    #[arg(long, value_name = "PATH")]
    pub chromium: Option<PathBuf>,

    /// Write a tar.gz archive instead of a directory
    #[arg(long, value_name = "FILE")]
    pub archive: Option<PathBuf>,

    /// Output directory [default: catalog-output]
    #[arg(short, long, value_name = "DIR")]
    pub output: Option<PathBuf>,

    /// Print the preview response as JSON and skip delivery
    #[arg(long)]
    pub preview_only: bool,

    /// Process directories recursively
    #[arg(short, long)]
    pub recursive: bool,

    /// File name pattern for directory inputs (e.g., "*.jpg")
    #[arg(long)]
    pub pattern: Option<String>,

    /// Enable verbose logging (-v: DEBUG, -vv: TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,
}

pub async fn main() -> Result<()> {
    let cli = Cli::parse();

    let _guard: TracingGuard = init_cli_tracing(cli.verbose).context("Failed to initialize tracing")?;

    CliConfigBuilder::validate_cli(&cli).context("Invalid CLI arguments")?;
    let config = CliConfigBuilder::from_cli(&cli).context("Failed to build configuration")?;

    info!(
        "Category: {}, deployment: {}, batch size: {}",
        config.profile.category, config.deployment, config.scheduler.batch_size
    );

    let jobs = spans::discovery(cli.input.len()).in_scope(|| collect_jobs(&cli))?;
    if jobs.is_empty() {
        warn!("No supported images found in the provided inputs");
        return Ok(());
    }
    info!("Found {} job(s) to process", jobs.len());

    let run_span = spans::run(
        &config.profile.category.to_string(),
        &config.deployment.to_string(),
        jobs.len(),
    );
    let processor = build_processor(&cli, config)?;
    run(&cli, &processor, &jobs).instrument(run_span).await
}

fn build_processor(cli: &Cli, config: PipelineConfig) -> Result<CatalogProcessor> {
    let mut builder = CatalogProcessor::builder(config);
    if let Some(extractor) = &cli.extractor {
        builder = builder.extractor(Arc::new(CommandExtractor::new(extractor)));
    }
    if let Some(chromium) = &cli.chromium {
        builder = builder.renderer(Arc::new(ChromiumRenderer::new(chromium)));
    }
    builder.build().context("Failed to create processor")
}

async fn run(cli: &Cli, processor: &CatalogProcessor, jobs: &[ProcessingJob]) -> Result<()> {
    let started = Instant::now();

    let progress_bar = ProgressBar::new(jobs.len() as u64);
    progress_bar.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .context("Invalid progress bar template")?
            .progress_chars("#>-"),
    );
    progress_bar.set_message("aligning");
    let bar = progress_bar.clone();
    let on_batch = move |processed: usize, total: usize| {
        bar.set_length(total as u64);
        bar.set_position(processed as u64);
    };

    let preview = processor
        .run_batch(jobs, &on_batch)
        .await
        .context("Batch processing failed")?;
    progress_bar.finish_and_clear();

    report_preview(&preview);

    if cli.preview_only {
        println!("{}", serde_json::to_string_pretty(&preview)?);
        return Ok(());
    }

    let (mut archive, destination): (Box<dyn ArchiveWriter>, PathBuf) = match &cli.archive {
        Some(path) => (
            Box::new(
                TarGzArchive::create(path)
                    .with_context(|| format!("Failed to create archive: {}", path.display()))?,
            ),
            path.clone(),
        ),
        None => {
            let dir = cli
                .output
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT_DIR));
            (Box::new(DirectoryArchive::new(&dir)), dir)
        },
    };

    let summary = processor
        .download(&preview.session_id, jobs, archive.as_mut())
        .instrument(spans::session(&preview.session_id, &destination))
        .await
        .context("Delivery failed")?;

    events::progress(&format!(
        "Wrote {} image(s) to {}",
        summary.assets_written,
        destination.display()
    ));
    if summary.recomputed {
        events::warning_with_recommendation(
            "Session expired before delivery; results were recomputed",
            "Increase session_ttl_secs for long review pauses",
        );
    }
    if summary.manifest_written {
        info!("Manifest written alongside the images");
    }

    events::run_summary(
        jobs.len(),
        summary.assets_written,
        summary.errors.len(),
        started.elapsed().as_millis() as u64,
    );
    Ok(())
}

fn report_preview(preview: &BatchPreview) {
    info!(
        "Session {}: {} preview(s), {} error(s) out of {}",
        preview.session_id,
        preview.previews.len(),
        preview.errors.len(),
        preview.total
    );
    for error in &preview.errors {
        warn!("{}: {}", error.identifier, error.message);
    }
}

/// Build jobs from the sheet or from file inputs
///
/// Uploads whose identifier was already seen are skipped, since their asset
/// names would collide.
fn collect_jobs(cli: &Cli) -> Result<Vec<ProcessingJob>> {
    let mut jobs = Vec::new();

    if let Some(sheet) = &cli.sheet {
        let import = import_file(sheet, cli.remove_background)
            .with_context(|| format!("Failed to import sheet: {}", sheet.display()))?;
        if import.skipped > 0 {
            warn!("Skipped {} incomplete sheet row(s)", import.skipped);
        }
        for rejected in &import.rejected {
            warn!("Sheet row for SKU {} not processed: {}", rejected.identifier, rejected.message);
        }
        jobs.extend(import.jobs);
    }

    let mut files = Vec::new();
    for input in &cli.input {
        files.extend(resolve_input(input, cli.recursive, cli.pattern.as_deref())?);
    }
    // Alphanumeric order keeps batch composition stable between runs
    files.sort();

    let mut seen: HashSet<String> = jobs.iter().map(|job| job.identifier().to_string()).collect();
    for file in files {
        let name = file
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_default();
        let bytes = std::fs::read(&file)
            .with_context(|| format!("Failed to read input file: {}", file.display()))?;
        let job = ProcessingJob::upload(name, bytes)
            .with_context(|| format!("Invalid input file: {}", file.display()))?
            .with_background_removal(cli.remove_background);

        if !seen.insert(job.identifier().to_string()) {
            warn!(
                "Skipping {}: identifier '{}' already used by another input",
                file.display(),
                job.identifier()
            );
            continue;
        }
        jobs.push(job);
    }

    Ok(jobs)
}

/// Expand one positional input into image files
fn resolve_input(input: &str, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let path = PathBuf::from(input);

    if path.is_file() {
        if is_image_file(&path) {
            return Ok(vec![path]);
        }
        warn!("Skipping unsupported file: {}", path.display());
        return Ok(Vec::new());
    }
    if path.is_dir() {
        return find_image_files(&path, recursive, pattern);
    }
    if input.contains(['*', '?', '[']) {
        let mut files = Vec::new();
        for entry in glob::glob(input).with_context(|| format!("Invalid glob pattern: {}", input))? {
            let entry = entry?;
            if entry.is_file() && is_image_file(&entry) {
                files.push(entry);
            }
        }
        return Ok(files);
    }

    anyhow::bail!("Input path does not exist or is not accessible: {}", path.display())
}

/// Find all image files in a directory
fn find_image_files(dir: &Path, recursive: bool, pattern: Option<&str>) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    let max_depth = if recursive { usize::MAX } else { 1 };

    for entry in walkdir::WalkDir::new(dir).max_depth(max_depth) {
        let entry = entry?;
        if entry.file_type().is_file() {
            let path = entry.path();
            if is_image_file(path) && matches_pattern(path, pattern) {
                files.push(path.to_path_buf());
            }
        }
    }

    Ok(files)
}

fn is_image_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| IMAGE_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
}

fn matches_pattern(path: &Path, pattern: Option<&str>) -> bool {
    match pattern {
        Some(pat) => path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|filename| {
                glob::Pattern::new(pat)
                    .map(|p| p.matches(filename))
                    .unwrap_or(false)
            }),
        None => true,
    }
}
