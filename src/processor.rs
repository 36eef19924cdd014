//! Unified catalog processor
//!
//! `CatalogProcessor` is the entry point frontends use. A preview pass runs
//! the whole job list through the scheduler, caches the results under a
//! session id and returns thumbnails; a download pass consumes that session
//! (or recomputes it when it has expired) and streams everything into an
//! archive.

use crate::{
    backends::CommandExtractor,
    compositor::CanvasCompositor,
    config::PipelineConfig,
    download::{FetchRetrier, HttpFetcher, RetryPolicy, SourceFetcher},
    error::{CatalogError, Result},
    inference::ForegroundExtractor,
    removal::BackgroundRemover,
    scheduler::{BatchScheduler, ItemFailure, ItemProcessor},
    services::{
        archive::{render_manifest, ArchiveWriter, ErrorReport, ERROR_REPORT_NAME, MANIFEST_NAME},
        branding::LogoLibrary,
        codec::ImageCodec,
        progress::BatchProgress,
        render::LabelRenderer,
    },
    session_cache::{CachedRun, SessionCache, SessionId},
    types::{BatchPreview, ItemError, JobSource, Preview, ProcessedAsset, ProcessingJob},
    utils::run_blocking,
};
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, instrument, warn};

/// What a download wrote
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadSummary {
    pub assets_written: usize,
    pub errors: Vec<ItemError>,
    /// The session was gone and the jobs were processed again
    pub recomputed: bool,
    pub manifest_written: bool,
}

/// Batch normalization pipeline with a preview/download session lifecycle
pub struct CatalogProcessor {
    config: PipelineConfig,
    compositor: CanvasCompositor,
    scheduler: BatchScheduler,
    fetcher: FetchRetrier<Arc<dyn SourceFetcher>>,
    sessions: Arc<SessionCache>,
}

impl std::fmt::Debug for CatalogProcessor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CatalogProcessor")
            .field("config", &self.config)
            .field("compositor", &self.compositor)
            .field("scheduler", &self.scheduler)
            .field("retry_policy", self.fetcher.policy())
            .finish()
    }
}

impl CatalogProcessor {
    /// Create a new processor builder
    #[must_use]
    pub fn builder(config: PipelineConfig) -> CatalogProcessorBuilder {
        CatalogProcessorBuilder::new(config)
    }

    #[must_use]
    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    /// Session cache shared with other processors built from the same handle
    #[must_use]
    pub fn sessions(&self) -> &Arc<SessionCache> {
        &self.sessions
    }

    /// Process every job and cache the results for a later download
    ///
    /// # Errors
    /// - `Validation` for an empty job list or duplicate identifiers; no job runs
    #[instrument(skip_all, fields(jobs = jobs.len(), category = %self.config.profile.category))]
    pub async fn run_batch(
        &self,
        jobs: &[ProcessingJob],
        progress: &dyn BatchProgress,
    ) -> Result<BatchPreview> {
        validate_jobs(jobs)?;
        self.sessions.sweep_expired();

        let run = self.process_all(jobs, progress).await;
        let previews = self.previews(&run.assets).await;
        let errors = run.errors.clone();
        let total = run.total;
        let session_id = self.sessions.store(run);

        info!(
            session = %session_id,
            previews = previews.len(),
            errors = errors.len(),
            "Preview run cached"
        );
        Ok(BatchPreview {
            session_id: session_id.to_string(),
            previews,
            errors,
            total,
        })
    }

    /// Take the cached assets of a preview run, once
    ///
    /// # Errors
    /// - `SessionExpired` when unknown, consumed or older than the TTL
    pub fn consume_session(&self, session_id: &str) -> Result<Vec<ProcessedAsset>> {
        Ok(self.sessions.consume(&SessionId::from(session_id))?.assets)
    }

    /// Write a session's results into `archive`, recomputing when it expired
    ///
    /// Assets go in first, then `ERROR_REPORT.txt` if anything failed, then
    /// the manifest for categories that emit one. The manifest lists every
    /// job, including ones that failed. `jobs` must be the list the
    /// preview ran; it is only processed when the session is gone.
    ///
    /// # Errors
    /// - `SessionExpired` when the session is gone and `jobs` is empty
    /// - `Validation` for an invalid recompute job list
    /// - Archive write failures
    #[instrument(skip_all, fields(session = session_id))]
    pub async fn download(
        &self,
        session_id: &str,
        jobs: &[ProcessingJob],
        archive: &mut dyn ArchiveWriter,
    ) -> Result<DownloadSummary> {
        let (run, recomputed) = match self.sessions.consume(&SessionId::from(session_id)) {
            Ok(run) => (run, false),
            Err(CatalogError::SessionExpired(id)) if !jobs.is_empty() => {
                warn!(session = %id, "Session expired, reprocessing {} jobs", jobs.len());
                validate_jobs(jobs)?;
                let run = self
                    .process_all(jobs, &crate::services::progress::NoOpProgressReporter)
                    .await;
                (run, true)
            },
            Err(e) => return Err(e),
        };

        for asset in &run.assets {
            archive.append(&asset.filename, &asset.bytes).await?;
        }

        if !run.errors.is_empty() {
            let report = ErrorReport::new(run.total, run.errors.clone());
            archive
                .append(ERROR_REPORT_NAME, report.render().as_bytes())
                .await?;
        }

        let profile = &self.config.profile;
        let manifest_written = profile.write_manifest && !jobs.is_empty();
        if manifest_written {
            let manifest = render_manifest(jobs, &profile.asset_prefix)?;
            archive.append(MANIFEST_NAME, &manifest).await?;
        }

        archive.finalize().await?;
        info!(
            assets = run.assets.len(),
            errors = run.errors.len(),
            recomputed,
            "Download written"
        );
        Ok(DownloadSummary {
            assets_written: run.assets.len(),
            errors: run.errors,
            recomputed,
            manifest_written,
        })
    }

    async fn process_all(&self, jobs: &[ProcessingJob], progress: &dyn BatchProgress) -> CachedRun {
        let report = self.scheduler.run(jobs, self, progress).await;
        let total = report.total();
        let (assets, errors) = report.into_parts();
        CachedRun::new(assets, errors, total)
    }

    async fn previews(&self, assets: &[ProcessedAsset]) -> Vec<Preview> {
        let max = self.config.preview_max_dimension;
        let mut previews = Vec::with_capacity(assets.len());
        for asset in assets {
            let bytes = asset.bytes.clone();
            match run_blocking("preview", move || ImageCodec::thumbnail_data_uri(&bytes, max)).await {
                Ok((data_uri, width, height)) => previews.push(Preview {
                    filename: asset.filename.clone(),
                    data_uri,
                    width,
                    height,
                }),
                Err(e) => warn!(file = %asset.filename, error = %e, "Preview failed"),
            }
        }
        previews
    }
}

#[async_trait]
impl ItemProcessor for CatalogProcessor {
    async fn process(&self, job: &ProcessingJob) -> std::result::Result<ProcessedAsset, ItemFailure> {
        let source: Arc<[u8]> = match job.source() {
            JobSource::Upload { bytes, .. } => bytes.clone(),
            JobSource::Remote { url } => Arc::from(self.fetcher.fetch(url).await?),
        };
        self.compositor
            .compose(job, &source)
            .await
            .map_err(|error| ItemFailure::new(error, Some(source.clone())))
    }
}

/// Reject run-level problems before anything is processed
fn validate_jobs(jobs: &[ProcessingJob]) -> Result<()> {
    if jobs.is_empty() {
        return Err(CatalogError::validation("No jobs to process"));
    }
    let mut seen = HashSet::new();
    for job in jobs {
        if !seen.insert(job.identifier()) {
            return Err(CatalogError::validation(format!(
                "Duplicate job identifier '{}'",
                job.identifier()
            )));
        }
    }
    Ok(())
}

/// Builder for `CatalogProcessor`
///
/// Every collaborator has a production default: the command-line extractor,
/// reqwest fetching and a fresh session cache. Label rendering is off unless
/// a renderer is supplied.
pub struct CatalogProcessorBuilder {
    config: PipelineConfig,
    extractor: Option<Arc<dyn ForegroundExtractor>>,
    renderer: Option<Arc<dyn LabelRenderer>>,
    fetcher: Option<Arc<dyn SourceFetcher>>,
    sessions: Option<Arc<SessionCache>>,
}

impl CatalogProcessorBuilder {
    #[must_use]
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            extractor: None,
            renderer: None,
            fetcher: None,
            sessions: None,
        }
    }

    #[must_use]
    pub fn extractor(mut self, extractor: Arc<dyn ForegroundExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    #[must_use]
    pub fn renderer(mut self, renderer: Arc<dyn LabelRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[must_use]
    pub fn fetcher(mut self, fetcher: Arc<dyn SourceFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    /// Share a session cache between processors
    #[must_use]
    pub fn sessions(mut self, sessions: Arc<SessionCache>) -> Self {
        self.sessions = Some(sessions);
        self
    }

    /// Validate the configuration and assemble the processor
    ///
    /// # Errors
    /// - Invalid configuration values
    /// - HTTP client creation failure
    pub fn build(self) -> Result<CatalogProcessor> {
        let config = self.config;
        config.validate()?;

        let extractor = self
            .extractor
            .unwrap_or_else(|| Arc::new(CommandExtractor::default()));
        let remover = BackgroundRemover::new(extractor, config.removal_profile);

        let mut compositor = CanvasCompositor::new(config.profile.clone(), remover);
        if let Some(renderer) = self.renderer {
            compositor = compositor.with_renderer(renderer);
        }
        if let Some(dir) = &config.logo_dir {
            compositor = compositor.with_logos(LogoLibrary::new(dir));
        }
        if let Some(background) = &config.background {
            compositor = compositor.with_default_background(background);
        }
        if let Some(font) = &config.font_path {
            compositor = compositor.with_font(font);
        }

        let fetcher: Arc<dyn SourceFetcher> = match self.fetcher {
            Some(fetcher) => fetcher,
            None => Arc::new(HttpFetcher::new(Duration::from_secs(
                config.fetch.request_timeout_secs,
            ))?),
        };

        let profile = &config.profile;
        let scheduler = BatchScheduler::new(config.scheduler.clone())?.with_fallback(
            profile.asset_prefix.clone(),
            profile.delivery_quality,
            profile.auto_orient,
        );
        let sessions = self
            .sessions
            .unwrap_or_else(|| Arc::new(SessionCache::new(config.session_ttl())));

        Ok(CatalogProcessor {
            fetcher: FetchRetrier::new(fetcher, RetryPolicy::from(&config.fetch)),
            compositor,
            scheduler,
            sessions,
            config,
        })
    }
}
