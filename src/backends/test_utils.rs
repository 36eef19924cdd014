//! Test utilities and mock extractors
//!
//! Mock implementations of [`ForegroundExtractor`] so removal and compositor
//! logic can be exercised without an external engine.

use crate::{
    error::{CatalogError, Result},
    inference::{ExtractionOptions, ForegroundExtractor},
    services::codec::ImageCodec,
};
use async_trait::async_trait;
use image::Rgba;
use std::path::Path;
use std::sync::{Arc, Mutex};

/// Mock extractor that keys out near-white pixels
#[derive(Debug, Clone, Default)]
pub struct MockExtractor {
    /// Call history for verification in tests
    call_history: Arc<Mutex<Vec<String>>>,
    /// Whether the in-memory entry point fails
    should_fail_buffer: bool,
    /// Whether the file entry point fails
    should_fail_path: bool,
}

impl MockExtractor {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Buffer calls fail, file calls succeed
    #[must_use]
    pub fn new_failing_buffer() -> Self {
        Self {
            should_fail_buffer: true,
            ..Self::default()
        }
    }

    /// Every call fails
    #[must_use]
    pub fn new_failing() -> Self {
        Self {
            should_fail_buffer: true,
            should_fail_path: true,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn calls(&self) -> Vec<String> {
        self.call_history.lock().unwrap().clone()
    }

    fn key_out_white(bytes: &[u8]) -> Result<Vec<u8>> {
        let mut image = ImageCodec::decode(bytes, false)?.to_rgba8();
        for pixel in image.pixels_mut() {
            let [r, g, b, _] = pixel.0;
            if r > 230 && g > 230 && b > 230 {
                *pixel = Rgba([0, 0, 0, 0]);
            }
        }
        ImageCodec::encode_png(&image)
    }
}

#[async_trait]
impl ForegroundExtractor for MockExtractor {
    async fn extract_from_buffer(
        &self,
        input: &[u8],
        _options: &ExtractionOptions,
    ) -> Result<Vec<u8>> {
        self.call_history.lock().unwrap().push("buffer".to_string());
        if self.should_fail_buffer {
            return Err(CatalogError::background_removal("mock buffer failure"));
        }
        Self::key_out_white(input)
    }

    async fn extract_from_path(&self, path: &Path, _options: &ExtractionOptions) -> Result<Vec<u8>> {
        self.call_history
            .lock()
            .unwrap()
            .push(format!("path:{}", path.display()));
        if self.should_fail_path {
            return Err(CatalogError::background_removal("mock path failure"));
        }
        let bytes = tokio::fs::read(path).await?;
        Self::key_out_white(&bytes)
    }

    fn name(&self) -> &str {
        "mock"
    }
}
