//! Batch scheduler
//!
//! Runs a job list as sequential batches. Within a batch items start on a
//! stagger, run with bounded concurrency and race a single batch deadline.
//! Item failures never abort the run: each becomes a degraded fallback (the
//! original re-encoded) or, when no source bytes exist, a failed entry.

use crate::config::SchedulerConfig;
use crate::error::{CatalogError, Result};
use crate::services::codec::ImageCodec;
use crate::services::progress::BatchProgress;
use crate::types::{BatchReport, ItemOutcome, ProcessedAsset, ProcessingJob};
use crate::utils::run_blocking;
use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn, Instrument};

/// Failure of one item, with whatever source bytes were obtained
#[derive(Debug)]
pub struct ItemFailure {
    pub error: CatalogError,
    /// Original bytes for the fallback asset, if the source was reached
    pub source_bytes: Option<Arc<[u8]>>,
}

impl ItemFailure {
    #[must_use]
    pub fn new(error: CatalogError, source_bytes: Option<Arc<[u8]>>) -> Self {
        Self {
            error,
            source_bytes,
        }
    }
}

impl From<CatalogError> for ItemFailure {
    fn from(error: CatalogError) -> Self {
        Self::new(error, None)
    }
}

/// The per-item pipeline the scheduler drives
#[async_trait]
pub trait ItemProcessor: Send + Sync {
    /// Produce the delivered asset for one job
    async fn process(&self, job: &ProcessingJob) -> std::result::Result<ProcessedAsset, ItemFailure>;
}

/// Sequential batch runner with bounded in-batch concurrency
#[derive(Debug, Clone)]
pub struct BatchScheduler {
    config: SchedulerConfig,
    asset_prefix: String,
    fallback_quality: u8,
    auto_orient: bool,
}

impl BatchScheduler {
    /// Create a scheduler from validated limits
    ///
    /// # Errors
    /// - Zero batch size, in-flight limit or timeout
    pub fn new(config: SchedulerConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            asset_prefix: String::new(),
            fallback_quality: 90,
            auto_orient: false,
        })
    }

    /// Name fallback assets with `prefix` and encode them at `quality`
    #[must_use]
    pub fn with_fallback<S: Into<String>>(mut self, prefix: S, quality: u8, auto_orient: bool) -> Self {
        self.asset_prefix = prefix.into();
        self.fallback_quality = quality;
        self.auto_orient = auto_orient;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SchedulerConfig {
        &self.config
    }

    /// Number of batches a run over `jobs` items performs
    #[must_use]
    pub fn batch_count(&self, jobs: usize) -> usize {
        jobs.div_ceil(self.config.batch_size)
    }

    /// Run every job; the report holds exactly one outcome per job
    #[instrument(skip_all, fields(total = jobs.len(), batch_size = self.config.batch_size))]
    pub async fn run<P>(
        &self,
        jobs: &[ProcessingJob],
        processor: &P,
        progress: &dyn BatchProgress,
    ) -> BatchReport
    where
        P: ItemProcessor + ?Sized,
    {
        let total = jobs.len();
        let mut report = BatchReport::default();

        for (index, batch) in jobs.chunks(self.config.batch_size).enumerate() {
            let span = tracing::info_span!("batch", index, size = batch.len());
            let outcomes = self
                .run_batch(index, batch, processor, &mut report)
                .instrument(span)
                .await;
            report.outcomes.extend(outcomes);
            report.batches_run += 1;
            progress.on_batch_complete(report.outcomes.len(), total);
        }

        info!(
            processed = report.processed_count(),
            degraded = report.degraded_count(),
            failed = report.failed_count(),
            timed_out_batches = report.timed_out_batches,
            "Run complete"
        );
        report
    }

    async fn run_batch<P>(
        &self,
        index: usize,
        batch: &[ProcessingJob],
        processor: &P,
        report: &mut BatchReport,
    ) -> Vec<ItemOutcome>
    where
        P: ItemProcessor + ?Sized,
    {
        let stagger = self.config.stagger_interval();
        let attempts = stream::iter(batch.iter().enumerate())
            .map(|(position, job)| async move {
                let delay = stagger.saturating_mul(position as u32);
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                let result = processor
                    .process(job)
                    .instrument(tracing::debug_span!("item", id = job.identifier()))
                    .await;
                (job, result)
            })
            .buffered(self.config.max_in_flight)
            .collect::<Vec<_>>();

        match tokio::time::timeout(self.config.batch_timeout(), attempts).await {
            Ok(results) => {
                let mut outcomes = Vec::with_capacity(results.len());
                for (job, result) in results {
                    outcomes.push(match result {
                        Ok(asset) => ItemOutcome::Processed(asset),
                        Err(failure) => {
                            warn!(id = job.identifier(), error = %failure.error, "Item failed");
                            self.degrade(job, failure.error, failure.source_bytes).await
                        },
                    });
                }
                outcomes
            },
            Err(_) => {
                let timeout = self.config.batch_timeout();
                warn!(batch = index, ?timeout, "Batch timed out, abandoning its results");
                report.timed_out_batches += 1;
                let mut outcomes = Vec::with_capacity(batch.len());
                for job in batch {
                    let error = CatalogError::BatchTimeout {
                        batch: index,
                        timeout,
                    };
                    outcomes.push(self.degrade(job, error, job.upload_bytes().cloned()).await);
                }
                outcomes
            },
        }
    }

    /// Re-encode the original as the delivered asset, or fail without one
    async fn degrade(
        &self,
        job: &ProcessingJob,
        error: CatalogError,
        source_bytes: Option<Arc<[u8]>>,
    ) -> ItemOutcome {
        let identifier = job.identifier().to_string();
        let Some(bytes) = source_bytes else {
            return ItemOutcome::Failed { identifier, error };
        };

        let (quality, auto_orient) = (self.fallback_quality, self.auto_orient);
        match run_blocking("fallback encode", move || {
            ImageCodec::reencode_jpeg(&bytes, auto_orient, quality)
        })
        .await
        {
            Ok(encoded) => {
                debug!(id = %identifier, "Delivering re-encoded original");
                ItemOutcome::Degraded {
                    asset: ProcessedAsset::new(job.asset_filename(&self.asset_prefix), encoded),
                    identifier,
                    error,
                }
            },
            Err(e) => {
                warn!(id = %identifier, error = %e, "Fallback encode failed");
                ItemOutcome::Failed { identifier, error }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};
    use std::io::Cursor;
    use std::sync::Mutex;
    use std::time::Duration;

    fn jpeg_bytes() -> Arc<[u8]> {
        let img = RgbImage::from_pixel(16, 16, Rgb([120, 80, 40]));
        let mut out = Cursor::new(Vec::new());
        img.write_to(&mut out, image::ImageFormat::Jpeg).unwrap();
        out.into_inner().into()
    }

    fn upload_jobs(n: usize) -> Vec<ProcessingJob> {
        (0..n)
            .map(|i| ProcessingJob::upload(format!("sku{i}.jpg"), jpeg_bytes()).unwrap())
            .collect()
    }

    fn config(batch_size: usize, timeout_secs: u64) -> SchedulerConfig {
        SchedulerConfig {
            batch_size,
            max_in_flight: batch_size,
            stagger_interval_ms: 200,
            batch_timeout_secs: timeout_secs,
        }
    }

    /// Succeeds unless the identifier is listed; optionally sleeps first
    struct ScriptedProcessor {
        failing: Vec<String>,
        sleep: Duration,
        started: Mutex<Vec<(String, tokio::time::Instant)>>,
    }

    impl ScriptedProcessor {
        fn new(failing: &[&str], sleep: Duration) -> Self {
            Self {
                failing: failing.iter().map(|s| s.to_string()).collect(),
                sleep,
                started: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl ItemProcessor for ScriptedProcessor {
        async fn process(
            &self,
            job: &ProcessingJob,
        ) -> std::result::Result<ProcessedAsset, ItemFailure> {
            self.started
                .lock()
                .unwrap()
                .push((job.identifier().to_string(), tokio::time::Instant::now()));
            tokio::time::sleep(self.sleep).await;
            if self.failing.iter().any(|f| f == job.identifier()) {
                return Err(ItemFailure::new(
                    CatalogError::composition("boom"),
                    job.upload_bytes().cloned(),
                ));
            }
            Ok(ProcessedAsset::new(job.asset_filename(""), vec![1, 2, 3]))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_count_and_outcome_count() {
        let scheduler = BatchScheduler::new(config(5, 120)).unwrap();
        let processor = ScriptedProcessor::new(&[], Duration::ZERO);
        let progress_calls = Mutex::new(Vec::new());
        let progress = |processed: usize, total: usize| {
            progress_calls.lock().unwrap().push((processed, total));
        };

        let jobs = upload_jobs(12);
        let report = scheduler.run(&jobs, &processor, &progress).await;

        assert_eq!(report.batches_run, 3);
        assert_eq!(scheduler.batch_count(12), 3);
        assert_eq!(report.total(), 12);
        assert_eq!(report.processed_count(), 12);
        assert_eq!(
            *progress_calls.lock().unwrap(),
            vec![(5, 12), (10, 12), (12, 12)]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_item_error_becomes_degraded_fallback() {
        let scheduler = BatchScheduler::new(config(2, 120))
            .unwrap()
            .with_fallback("coming-soon-image/", 95, false);
        let processor = ScriptedProcessor::new(&["sku1"], Duration::ZERO);

        let jobs = upload_jobs(3);
        let report = scheduler
            .run(&jobs, &processor, &crate::services::progress::NoOpProgressReporter)
            .await;

        assert_eq!(report.total(), 3);
        assert_eq!(report.degraded_count(), 1);
        let degraded = report
            .outcomes
            .iter()
            .find(|o| matches!(o, ItemOutcome::Degraded { .. }))
            .unwrap();
        let asset = degraded.asset().unwrap();
        assert_eq!(asset.filename, "coming-soon-image/sku1.jpg");
        assert_eq!(&asset.bytes[..2], &[0xFF, 0xD8]);
        assert_eq!(report.errors()[0].identifier, "sku1");
    }

    #[tokio::test(start_paused = true)]
    async fn test_failure_without_source_bytes_is_failed() {
        struct Unreachable;
        #[async_trait]
        impl ItemProcessor for Unreachable {
            async fn process(
                &self,
                job: &ProcessingJob,
            ) -> std::result::Result<ProcessedAsset, ItemFailure> {
                Err(CatalogError::fetch(job.identifier(), 2, "HTTP 404").into())
            }
        }

        let scheduler = BatchScheduler::new(config(5, 120)).unwrap();
        let jobs = vec![ProcessingJob::remote("A1", "https://cdn.example.com/a1.jpg").unwrap()];
        let report = scheduler
            .run(&jobs, &Unreachable, &crate::services::progress::NoOpProgressReporter)
            .await;
        assert_eq!(report.failed_count(), 1);
        assert!(report.outcomes[0].asset().is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_batch_timeout_degrades_batch_and_continues() {
        // Every item sleeps past the deadline in the first batch only.
        struct SlowFirstBatch;
        #[async_trait]
        impl ItemProcessor for SlowFirstBatch {
            async fn process(
                &self,
                job: &ProcessingJob,
            ) -> std::result::Result<ProcessedAsset, ItemFailure> {
                if matches!(job.identifier(), "sku0" | "sku1") {
                    tokio::time::sleep(Duration::from_secs(600)).await;
                }
                Ok(ProcessedAsset::new(job.asset_filename(""), vec![9]))
            }
        }

        let scheduler = BatchScheduler::new(config(2, 50)).unwrap();
        let jobs = upload_jobs(3);
        let report = scheduler
            .run(&jobs, &SlowFirstBatch, &crate::services::progress::NoOpProgressReporter)
            .await;

        assert_eq!(report.batches_run, 2);
        assert_eq!(report.timed_out_batches, 1);
        assert_eq!(report.total(), 3);
        assert_eq!(report.degraded_count(), 2);
        assert_eq!(report.processed_count(), 1);
        assert!(report
            .errors()
            .iter()
            .all(|e| e.message.contains("time budget")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_items_start_on_stagger() {
        let scheduler = BatchScheduler::new(config(3, 120)).unwrap();
        let processor = ScriptedProcessor::new(&[], Duration::ZERO);
        let origin = tokio::time::Instant::now();

        let jobs = upload_jobs(3);
        scheduler
            .run(&jobs, &processor, &crate::services::progress::NoOpProgressReporter)
            .await;

        let mut offsets: Vec<(String, Duration)> = processor
            .started
            .lock()
            .unwrap()
            .iter()
            .map(|(id, at)| (id.clone(), at.duration_since(origin)))
            .collect();
        offsets.sort();
        assert_eq!(offsets[0].1, Duration::ZERO);
        assert_eq!(offsets[1].1, Duration::from_millis(200));
        assert_eq!(offsets[2].1, Duration::from_millis(400));
    }

    #[test]
    fn test_rejects_zero_batch_size() {
        assert!(BatchScheduler::new(config(0, 120)).is_err());
    }
}
