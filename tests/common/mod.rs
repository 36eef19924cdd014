//! Shared fixtures and mock collaborators for integration tests
//!
//! Mocks record their calls so tests can assert how the pipeline drove them.

#![allow(dead_code)]

use async_trait::async_trait;
use catalog_aligner::{
    error::{CatalogError, Result},
    inference::{ExtractionOptions, ForegroundExtractor},
    services::{ImageCodec, LabelRenderer},
    SourceFetcher,
};
use image::{DynamicImage, ImageFormat, Rgba, RgbaImage};
use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const WHITE: Rgba<u8> = Rgba([255, 255, 255, 255]);
pub const INK: Rgba<u8> = Rgba([30, 30, 120, 255]);

/// White photo with one solid product rectangle, inclusive corners
pub fn product_photo(width: u32, height: u32, rect: (u32, u32, u32, u32), format: ImageFormat) -> Vec<u8> {
    let mut image = RgbaImage::from_pixel(width, height, WHITE);
    for y in rect.1..=rect.3 {
        for x in rect.0..=rect.2 {
            image.put_pixel(x, y, INK);
        }
    }
    encode(DynamicImage::ImageRgba8(image), format)
}

pub fn encode(image: DynamicImage, format: ImageFormat) -> Vec<u8> {
    let image = match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        _ => image,
    };
    let mut buffer = Vec::new();
    image
        .write_to(&mut std::io::Cursor::new(&mut buffer), format)
        .unwrap();
    buffer
}

pub fn decode(bytes: &[u8]) -> RgbaImage {
    image::load_from_memory(bytes).unwrap().to_rgba8()
}

pub fn is_ink(pixel: &Rgba<u8>) -> bool {
    pixel.0[0] < 110 && pixel.0[1] < 110
}

/// Inclusive extent of ink pixels as `(min_x, min_y, max_x, max_y)`
pub fn ink_extent(image: &RgbaImage) -> Option<(u32, u32, u32, u32)> {
    let mut extent: Option<(u32, u32, u32, u32)> = None;
    for (x, y, pixel) in image.enumerate_pixels() {
        if is_ink(pixel) {
            extent = Some(match extent {
                None => (x, y, x, y),
                Some((a, b, c, d)) => (a.min(x), b.min(y), c.max(x), d.max(y)),
            });
        }
    }
    extent
}

/// Extractor keying out near-white pixels
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
    delay: Option<Duration>,
}

impl MockExtractor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    /// Succeeds after sleeping, for deadline tests
    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    async fn extract(&self, kind: &str, bytes: &[u8]) -> Result<Vec<u8>> {
        self.call_history.lock().unwrap().push(kind.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        if self.should_fail {
            return Err(CatalogError::background_removal("mock engine unavailable"));
        }
        let mut image = ImageCodec::decode(bytes, false)?.to_rgba8();
        for pixel in image.pixels_mut() {
            if pixel.0[..3].iter().all(|&c| c > 235) {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
        ImageCodec::encode_png(&image)
    }
}

#[async_trait]
impl ForegroundExtractor for MockExtractor {
    async fn extract_from_buffer(&self, input: &[u8], _options: &ExtractionOptions) -> Result<Vec<u8>> {
        self.extract("buffer", input).await
    }

    async fn extract_from_path(&self, path: &Path, _options: &ExtractionOptions) -> Result<Vec<u8>> {
        let bytes = tokio::fs::read(path)
            .await
            .map_err(|e| CatalogError::file_io_error("read extractor input", path, &e))?;
        self.extract("path", &bytes).await
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// Renderer drawing a solid red badge in the top-right corner
#[derive(Debug, Clone, Default)]
pub struct MockRenderer {
    call_history: Arc<Mutex<Vec<String>>>,
    should_fail: bool,
}

impl MockRenderer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl LabelRenderer for MockRenderer {
    async fn render(&self, html: &str, viewport: (u32, u32)) -> Result<RgbaImage> {
        self.call_history.lock().unwrap().push(html.to_string());
        if self.should_fail {
            return Err(CatalogError::render("mock browser crashed"));
        }
        let (width, height) = viewport;
        let mut label = RgbaImage::from_pixel(width, height, Rgba([0, 0, 0, 0]));
        for y in 0..40.min(height) {
            for x in width.saturating_sub(120)..width {
                label.put_pixel(x, y, Rgba([220, 0, 0, 255]));
            }
        }
        Ok(label)
    }

    fn name(&self) -> &str {
        "mock"
    }
}

/// In-memory URL table; the first `failures` calls fail
#[derive(Debug, Clone, Default)]
pub struct MockFetcher {
    responses: Arc<HashMap<String, Vec<u8>>>,
    call_history: Arc<Mutex<Vec<String>>>,
    failures: Arc<Mutex<u32>>,
}

impl MockFetcher {
    pub fn new(responses: HashMap<String, Vec<u8>>) -> Self {
        Self {
            responses: Arc::new(responses),
            ..Self::default()
        }
    }

    pub fn with_failures(self, failures: u32) -> Self {
        *self.failures.lock().unwrap() = failures;
        self
    }

    pub fn get_call_history(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }
}

#[async_trait]
impl SourceFetcher for MockFetcher {
    async fn fetch_once(&self, url: &str) -> Result<Vec<u8>> {
        self.call_history.lock().unwrap().push(url.to_string());
        {
            let mut failures = self.failures.lock().unwrap();
            if *failures > 0 {
                *failures -= 1;
                return Err(CatalogError::fetch(url, 1, "HTTP 503 Service Unavailable"));
            }
        }
        self.responses
            .get(url)
            .cloned()
            .ok_or_else(|| CatalogError::fetch(url, 1, "HTTP 404 Not Found"))
    }
}
