//! Error handling and edge case testing
//!
//! Run-level problems must be rejected before any work starts; item-level
//! problems must never abort a run.

mod common;

use catalog_aligner::{
    error::{CatalogError, Result},
    services::{ArchiveWriter, ERROR_REPORT_NAME},
    CatalogProcessor, DateLabel, MemoryArchive, NoOpProgressReporter, PipelineConfig,
    ProcessingJob, ProductCategory, SessionCache, CANVAS_SIZE,
};
use common::{decode, product_photo, MockExtractor, MockFetcher, MockRenderer};
use image::{ImageFormat, Rgba, RgbaImage};
use std::sync::Arc;
use std::time::Duration;

fn build(config: PipelineConfig, extractor: MockExtractor) -> CatalogProcessor {
    CatalogProcessor::builder(config)
        .extractor(Arc::new(extractor))
        .fetcher(Arc::new(MockFetcher::default()))
        .build()
        .unwrap()
}

fn footwear() -> PipelineConfig {
    PipelineConfig::builder()
        .category(ProductCategory::Footwear)
        .stagger_interval(Duration::from_millis(1))
        .build()
        .unwrap()
}

fn photo_job(name: &str) -> ProcessingJob {
    ProcessingJob::upload(name, product_photo(400, 400, (100, 100, 300, 300), ImageFormat::Png))
        .unwrap()
}

#[test]
fn test_config_validation_edge_cases() {
    let err = PipelineConfig::builder().batch_size(0).build().unwrap_err();
    assert!(matches!(err, CatalogError::InvalidConfig(_)));
    assert!(err.to_string().contains("batch"));

    let err = PipelineConfig::builder()
        .session_ttl(Duration::from_millis(10))
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("session TTL"));

    let err = PipelineConfig::builder()
        .preview_max_dimension(2000)
        .build()
        .unwrap_err();
    assert!(err.to_string().contains("16-800"));
}

#[test]
fn test_job_construction_edge_cases() {
    assert!(matches!(
        ProcessingJob::upload("empty.jpg", Vec::new()),
        Err(CatalogError::Validation(_))
    ));
    assert!(matches!(
        ProcessingJob::remote("sku-1", "not a url"),
        Err(CatalogError::Validation(_))
    ));
    assert!(ProcessingJob::remote("../etc", "https://cdn.example.com/a.jpg").is_err());
    assert!(ProcessingJob::remote("a/b", "https://cdn.example.com/a.jpg").is_err());
    assert!(ProcessingJob::remote("", "https://cdn.example.com/a.jpg").is_err());

    // Directory components of an upload name do not leak into the identifier
    let job = ProcessingJob::upload("nested/dir/FZ5808.jpeg", vec![1, 2, 3]).unwrap();
    assert_eq!(job.identifier(), "FZ5808");
}

#[test]
fn test_date_label_edge_cases() {
    for bad in ["13/01", "00/10", "02/32", "0210", "", "aa/bb"] {
        assert!(
            matches!(DateLabel::parse(bad), Err(CatalogError::Validation(_))),
            "accepted {bad:?}"
        );
    }
    let label = DateLabel::parse("12/1").unwrap();
    assert_eq!(label.day_text(), "01");
    assert_eq!(label.month_text(), "DEC");
}

#[tokio::test]
async fn test_run_level_validation() {
    let processor = build(footwear(), MockExtractor::new());

    let err = processor.run_batch(&[], &NoOpProgressReporter).await.unwrap_err();
    assert!(matches!(err, CatalogError::Validation(_)));

    let jobs = vec![photo_job("dup.jpg"), photo_job("dup.png")];
    let err = processor.run_batch(&jobs, &NoOpProgressReporter).await.unwrap_err();
    assert!(err.to_string().contains("dup"));
    assert_eq!(processor.sessions().len(), 0);
}

#[tokio::test]
async fn test_session_is_single_use() -> Result<()> {
    let processor = build(footwear(), MockExtractor::new());
    let jobs = vec![photo_job("once.png")];
    let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;

    let mut first = MemoryArchive::new();
    processor.download(&preview.session_id, &[], &mut first).await?;
    assert_eq!(first.names(), vec!["once.jpg"]);

    let mut second = MemoryArchive::new();
    let err = processor
        .download(&preview.session_id, &[], &mut second)
        .await
        .unwrap_err();
    assert!(matches!(err, CatalogError::SessionExpired(_)));
    assert!(second.names().is_empty());
    Ok(())
}

#[tokio::test]
async fn test_expired_session_recomputes_with_jobs() -> Result<()> {
    let extractor = MockExtractor::new();
    let processor = CatalogProcessor::builder(footwear())
        .extractor(Arc::new(extractor.clone()))
        .fetcher(Arc::new(MockFetcher::default()))
        .sessions(Arc::new(SessionCache::new(Duration::from_secs(60))))
        .build()?;

    let jobs = vec![photo_job("late.png").with_background_removal(true)];
    let mut archive = MemoryArchive::new();
    let summary = processor
        .download("never-issued", &jobs, &mut archive)
        .await?;

    assert!(summary.recomputed);
    assert_eq!(archive.names(), vec!["late.jpg"]);
    assert!(archive.is_finalized());
    assert_eq!(extractor.get_call_history(), vec!["buffer"]);
    Ok(())
}

#[tokio::test]
async fn test_undecodable_upload_is_reported_without_asset() -> Result<()> {
    let processor = build(footwear(), MockExtractor::new());
    let jobs = vec![
        photo_job("fine.png"),
        ProcessingJob::upload("corrupt.jpg", b"definitely not an image".to_vec())?,
    ];

    let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;
    assert_eq!(preview.total, 2);
    assert_eq!(preview.previews.len(), 1);
    assert_eq!(preview.errors.len(), 1);
    assert_eq!(preview.errors[0].identifier, "corrupt");

    let mut archive = MemoryArchive::new();
    let summary = processor.download(&preview.session_id, &jobs, &mut archive).await?;
    assert_eq!(summary.assets_written, 1);
    assert_eq!(archive.names(), vec!["fine.jpg", ERROR_REPORT_NAME]);
    Ok(())
}

#[tokio::test]
async fn test_extractor_outage_keeps_originals() -> Result<()> {
    let extractor = MockExtractor::failing();
    let processor = build(footwear(), extractor.clone());
    let jobs = vec![photo_job("x1.png").with_background_removal(true)];

    let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;
    assert!(preview.errors.is_empty());
    assert_eq!(preview.previews.len(), 1);
    // Buffer attempt, then the temp-file fallback
    assert_eq!(extractor.get_call_history(), vec!["buffer", "path"]);
    Ok(())
}

#[tokio::test]
async fn test_label_render_failure_degrades_item() -> Result<()> {
    let config = PipelineConfig::builder()
        .category(ProductCategory::ComingSoon)
        .stagger_interval(Duration::from_millis(1))
        .build()?;
    let processor = CatalogProcessor::builder(config)
        .extractor(Arc::new(MockExtractor::new()))
        .renderer(Arc::new(MockRenderer::failing()))
        .fetcher(Arc::new(MockFetcher::default()))
        .build()?;

    let jobs = vec![photo_job("cs2.png").with_date_label(DateLabel::parse("11/30")?)];
    let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;

    assert_eq!(preview.errors.len(), 1);
    assert!(preview.errors[0].message.contains("date label"));
    // Degraded items still deliver the re-encoded original
    assert_eq!(preview.previews.len(), 1);
    assert_eq!(preview.previews[0].filename, "coming-soon-image/cs2.jpg");
    Ok(())
}

#[tokio::test]
async fn test_batch_timeout_degrades_uploads() -> Result<()> {
    let config = PipelineConfig::builder()
        .category(ProductCategory::Footwear)
        .stagger_interval(Duration::from_millis(1))
        .batch_timeout(Duration::from_secs(1))
        .build()?;
    let processor = build(config, MockExtractor::slow(Duration::from_secs(5)));

    let jobs = vec![photo_job("slow.png").with_background_removal(true)];
    let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;

    assert_eq!(preview.errors.len(), 1);
    assert!(preview.errors[0].message.contains("time budget"));
    assert_eq!(preview.previews.len(), 1);
    assert_eq!(preview.previews[0].filename, "slow.jpg");
    Ok(())
}

#[tokio::test]
async fn test_blank_and_tiny_images_still_fill_the_canvas() -> Result<()> {
    let processor = build(footwear(), MockExtractor::new());

    let blank = common::encode(
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(640, 480, Rgba([255, 255, 255, 255]))),
        ImageFormat::Png,
    );
    let tiny = common::encode(
        image::DynamicImage::ImageRgba8(RgbaImage::from_pixel(1, 1, Rgba([10, 10, 10, 255]))),
        ImageFormat::Png,
    );
    let jobs = vec![
        ProcessingJob::upload("blank.png", blank)?,
        ProcessingJob::upload("tiny.png", tiny)?,
    ];

    let preview = processor.run_batch(&jobs, &NoOpProgressReporter).await?;
    assert!(preview.errors.is_empty(), "errors: {:?}", preview.errors);

    let mut archive = MemoryArchive::new();
    processor.download(&preview.session_id, &jobs, &mut archive).await?;
    for name in ["blank.jpg", "tiny.jpg"] {
        let canvas = decode(archive.entry(name).unwrap());
        assert_eq!(canvas.dimensions(), (CANVAS_SIZE, CANVAS_SIZE));
    }
    Ok(())
}

#[tokio::test]
async fn test_archive_rejects_escaping_entry_names() {
    let mut archive = MemoryArchive::new();
    assert!(archive.append("../outside.jpg", b"x").await.is_err());
    assert!(archive.append("/abs.jpg", b"x").await.is_err());
    assert!(archive.append("coming-soon-image/ok.jpg", b"x").await.is_ok());
}
