#![allow(clippy::too_many_lines)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::unused_async)]

//! # Catalog Aligner
//!
//! Batch normalization of product photographs into consistent catalog images.
//!
//! Each photo is optionally cut out by an external background-removal engine,
//! its product located with a pixel classifier, then cropped, scaled and
//! placed on a fixed 800x800 canvas so that every product in a catalog shares
//! the same baseline and centerline. Branded backgrounds, logos and date
//! labels are composited on top and the result is encoded as JPEG.
//!
//! ## Features
//!
//! - **Alignment**: three-rule background classifier, padded bounding boxes,
//!   width-first or height-first fitting with a fixed baseline inset
//! - **Background Removal**: any `imgly-bgremove`-compatible engine, with a
//!   temp-file fallback and synthesized contact shadows
//! - **Batch Scheduling**: sequential batches, staggered starts, bounded
//!   concurrency and per-batch deadlines; failed items degrade to the
//!   re-encoded original instead of aborting the run
//! - **Sessions**: a preview pass caches its results for one later download
//! - **Delivery**: tar.gz or directory output with an error report and an
//!   optional CSV manifest
//! - **CLI Integration**: optional command-line interface (enable with `cli` feature)
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use catalog_aligner::{
//!     CatalogProcessor, MemoryArchive, NoOpProgressReporter, PipelineConfig, ProcessingJob,
//!     ProductCategory,
//! };
//!
//! # async fn example(upload: Vec<u8>) -> anyhow::Result<()> {
//! let config = PipelineConfig::builder()
//!     .category(ProductCategory::Catalog)
//!     .build()?;
//! let processor = CatalogProcessor::builder(config).build()?;
//!
//! let jobs = vec![ProcessingJob::upload("FZ5808.jpg", upload)?.with_background_removal(true)];
//! let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;
//!
//! let mut archive = MemoryArchive::new();
//! processor.download(&preview.session_id, &jobs, &mut archive).await?;
//! # Ok(())
//! # }
//! ```
//!
//! ### Feature Flags
//!
//! - `cli` (default): command-line interface, progress bars and tracing setup
//! - `webp-support` (default): WebP input decoding
//! - `tracing-json`, `tracing-files`: structured and file log output for the CLI

pub mod alignment;
pub mod backends;
#[cfg(feature = "cli")]
pub mod cli;
pub mod compositor;
pub mod config;
pub mod download;
pub mod error;
pub mod inference;
pub mod processor;
pub mod removal;
pub mod scheduler;
pub mod services;
pub mod session_cache;
#[cfg(feature = "cli")]
pub mod tracing_config;
pub mod types;
pub mod utils;

use std::sync::Arc;

// Public API exports
pub use alignment::{extract_bounds, BackgroundClassifier, BoundingBox, CompositionPlan, ProductBounds};
pub use backends::CommandExtractor;
pub use compositor::{AlignedProduct, CanvasCompositor};
pub use config::{
    CategoryProfile, ClassifierThresholds, DeploymentProfile, FitPolicy, PipelineConfig,
    PipelineConfigBuilder, ProductCategory, RemovalProfile, SchedulerConfig, CANVAS_SIZE,
    WORKING_CANVAS_SIZE,
};
pub use download::{FetchRetrier, HttpFetcher, RetryPolicy, SourceFetcher};
pub use error::{CatalogError, Result};
pub use inference::{ExtractionOptions, ForegroundExtractor};
pub use processor::{CatalogProcessor, CatalogProcessorBuilder, DownloadSummary};
pub use removal::{BackgroundRemover, ShadowBackdrop};
pub use scheduler::{BatchScheduler, ItemFailure, ItemProcessor};
pub use services::{
    ArchiveWriter, BatchProgress, ChromiumRenderer, ConsoleProgressReporter, DirectoryArchive,
    ErrorReport, ImageCodec, LabelRenderer, LogoLibrary, MemoryArchive, NoOpProgressReporter,
    SheetImport, TarGzArchive,
};
pub use session_cache::{CachedRun, SessionCache, SessionCacheStats, SessionId};
pub use types::{
    BatchPreview, BatchReport, DateLabel, ItemError, ItemOutcome, JobSource, Preview,
    ProcessedAsset, ProcessingJob,
};

#[cfg(feature = "cli")]
pub use tracing_config::{events, init_cli_tracing, spans, TracingConfig, TracingFormat};

/// Normalize a single photo outside of any batch or session
///
/// Runs the full per-item pipeline for one upload using the category and
/// decorations of `config`. Useful for servers that process one image per
/// request and deliver it directly.
///
/// # Arguments
///
/// * `filename` - Upload name; its stem becomes the asset identifier
/// * `bytes` - Encoded source image (JPEG, PNG, WebP, TIFF)
/// * `config` - Pipeline configuration
/// * `extractor` - Engine used when `remove_background` is set
///
/// # Examples
///
/// ```rust,no_run
/// use catalog_aligner::{normalize_photo, CommandExtractor, PipelineConfig};
/// use std::sync::Arc;
///
/// # async fn example(bytes: Vec<u8>) -> anyhow::Result<()> {
/// let asset = normalize_photo(
///     "sneaker.jpg",
///     &bytes,
///     &PipelineConfig::default(),
///     Arc::new(CommandExtractor::default()),
///     true,
/// )
/// .await?;
/// std::fs::write(&asset.filename, &asset.bytes)?;
/// # Ok(())
/// # }
/// ```
pub async fn normalize_photo(
    filename: &str,
    bytes: &[u8],
    config: &PipelineConfig,
    extractor: Arc<dyn ForegroundExtractor>,
    remove_background: bool,
) -> Result<ProcessedAsset> {
    config.validate()?;
    let job = ProcessingJob::upload(filename, bytes.to_vec())?.with_background_removal(remove_background);

    let remover = BackgroundRemover::new(extractor, config.removal_profile);
    let mut compositor = CanvasCompositor::new(config.profile.clone(), remover);
    if let Some(dir) = &config.logo_dir {
        compositor = compositor.with_logos(LogoLibrary::new(dir));
    }
    if let Some(background) = &config.background {
        compositor = compositor.with_default_background(background);
    }
    if let Some(font) = &config.font_path {
        compositor = compositor.with_font(font);
    }

    compositor.compose(&job, bytes).await
}
