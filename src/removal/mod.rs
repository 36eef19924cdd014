//! Background-removal adapter
//!
//! Wraps a [`ForegroundExtractor`] with input canonicalization, a file-based
//! fallback for engines whose buffer path misbehaves, and optional shadow
//! synthesis.

pub mod shadow;

use crate::{
    config::RemovalProfile,
    error::{CatalogError, Result},
    inference::{ExtractionOptions, ForegroundExtractor},
    services::codec::ImageCodec,
    utils::run_blocking,
};
use image::RgbaImage;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

pub use shadow::{synthesize_shadow, ShadowBackdrop, ShadowGeometry};

/// Adapter turning an opaque raster into a cut-out with transparency
#[derive(Clone)]
pub struct BackgroundRemover {
    extractor: Arc<dyn ForegroundExtractor>,
    profile: RemovalProfile,
    options: ExtractionOptions,
}

impl std::fmt::Debug for BackgroundRemover {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BackgroundRemover")
            .field("extractor", &self.extractor.name())
            .field("profile", &self.profile)
            .field("options", &self.options)
            .finish()
    }
}

impl BackgroundRemover {
    #[must_use]
    pub fn new(extractor: Arc<dyn ForegroundExtractor>, profile: RemovalProfile) -> Self {
        Self {
            extractor,
            profile,
            options: ExtractionOptions {
                model: None,
                variant: profile.model_variant().map(str::to_string),
            },
        }
    }

    /// Override the engine model
    #[must_use]
    pub fn with_model<S: Into<String>>(mut self, model: S) -> Self {
        self.options.model = Some(model.into());
        self
    }

    #[must_use]
    pub fn profile(&self) -> RemovalProfile {
        self.profile
    }

    /// Remove the background from a raster
    ///
    /// The raster is re-encoded as JPEG at the profile's quality before it
    /// reaches the engine.
    #[instrument(skip_all, fields(extractor = %self.extractor.name(), width = image.width(), height = image.height()))]
    pub async fn remove(&self, image: &RgbaImage) -> Result<RgbaImage> {
        let quality = self.profile.encode_quality();
        let source = image.clone();
        let encoded =
            run_blocking("removal encode", move || ImageCodec::encode_jpeg(&source, quality))
                .await?;

        let output = self.extract(&encoded).await?;
        run_blocking("removal decode", move || {
            Ok(ImageCodec::decode(&output, false)
                .map_err(|e| {
                    CatalogError::background_removal(format!("Unreadable extractor output: {}", e))
                })?
                .to_rgba8())
        })
        .await
    }

    /// Buffer first, then a scoped temp file; both failing is `BackgroundRemoval`
    async fn extract(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let buffer_error = match self.extractor.extract_from_buffer(encoded, &self.options).await {
            Ok(output) => return Ok(output),
            Err(e) => e,
        };
        warn!(error = %buffer_error, "Buffer extraction failed, retrying through a temp file");

        match self.extract_via_temp_file(encoded).await {
            Ok(output) => Ok(output),
            Err(file_error) => Err(CatalogError::background_removal(format!(
                "buffer attempt: {}; file attempt: {}",
                buffer_error, file_error
            ))),
        }
    }

    async fn extract_via_temp_file(&self, encoded: &[u8]) -> Result<Vec<u8>> {
        let prefix = format!("input_{}_", chrono::Utc::now().timestamp_millis());
        let temp = tempfile::Builder::new()
            .prefix(&prefix)
            .suffix(".jpg")
            .tempfile()?;
        tokio::fs::write(temp.path(), encoded)
            .await
            .map_err(|e| CatalogError::file_io_error("write extractor input", temp.path(), &e))?;
        debug!(path = %temp.path().display(), "Invoking extractor with file input");

        let result = self.extractor.extract_from_path(temp.path(), &self.options).await;

        // The file is removed on drop as well; closing surfaces deletion errors.
        if let Err(e) = temp.close() {
            warn!(error = %e, "Failed to delete extractor temp file");
        }
        result
    }

    /// Remove the background, then add a shadow; shadow failures keep the cut-out
    pub async fn remove_with_shadow(
        &self,
        image: &RgbaImage,
        backdrop: ShadowBackdrop,
    ) -> Result<RgbaImage> {
        let cutout = self.remove(image).await?;
        Ok(apply_shadow(cutout, backdrop).await)
    }
}

/// Shadow synthesis that never fails; on error the input is returned unchanged
pub async fn apply_shadow(cutout: RgbaImage, backdrop: ShadowBackdrop) -> RgbaImage {
    let fallback = cutout.clone();
    match run_blocking("shadow", move || synthesize_shadow(&cutout, backdrop)).await {
        Ok(shadowed) => shadowed,
        Err(e) => {
            warn!(error = %e, "Shadow synthesis failed, keeping unshadowed image");
            fallback
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::test_utils::MockExtractor;
    use image::Rgba;
    use std::path::Path;

    fn product_on_white() -> RgbaImage {
        let mut img = RgbaImage::from_pixel(300, 200, Rgba([255, 255, 255, 255]));
        for y in 40..160 {
            for x in 60..240 {
                img.put_pixel(x, y, Rgba([30, 60, 200, 255]));
            }
        }
        img
    }

    #[tokio::test]
    async fn test_buffer_path_used_first() {
        let mock = MockExtractor::new();
        let remover = BackgroundRemover::new(Arc::new(mock.clone()), RemovalProfile::Batch);

        let cutout = remover.remove(&product_on_white()).await.unwrap();
        assert_eq!(cutout.get_pixel(5, 5).0[3], 0);
        assert_eq!(cutout.get_pixel(150, 100).0[3], 255);
        assert_eq!(mock.calls(), vec!["buffer".to_string()]);
    }

    #[tokio::test]
    async fn test_falls_back_to_temp_file_and_cleans_up() {
        let mock = MockExtractor::new_failing_buffer();
        let remover = BackgroundRemover::new(Arc::new(mock.clone()), RemovalProfile::Interactive);

        let cutout = remover.remove(&product_on_white()).await.unwrap();
        assert_eq!(cutout.dimensions(), (300, 200));

        let calls = mock.calls();
        assert_eq!(calls.len(), 2);
        let path = calls[1].strip_prefix("path:").unwrap();
        let name = Path::new(path).file_name().unwrap().to_string_lossy();
        assert!(name.starts_with("input_") && name.ends_with(".jpg"));
        assert!(!Path::new(path).exists());
    }

    #[tokio::test]
    async fn test_both_strategies_failing_is_recoverable_error() {
        let mock = MockExtractor::new_failing();
        let remover = BackgroundRemover::new(Arc::new(mock.clone()), RemovalProfile::Batch);

        let err = remover.remove(&product_on_white()).await.unwrap_err();
        assert!(matches!(err, CatalogError::BackgroundRemoval(_)));
        assert!(err.is_recoverable());

        let calls = mock.calls();
        let path = calls[1].strip_prefix("path:").unwrap();
        assert!(!Path::new(path).exists());
    }

    #[tokio::test]
    async fn test_remove_with_shadow_on_white() {
        let remover = BackgroundRemover::new(Arc::new(MockExtractor::new()), RemovalProfile::Batch);
        let result = remover
            .remove_with_shadow(&product_on_white(), ShadowBackdrop::White)
            .await
            .unwrap();
        assert_eq!(result.get_pixel(2, 2), &Rgba([255, 255, 255, 255]));
        // The ellipse is wider than the product, so its ends show at the sides.
        let shaded_beside_product = (150..160)
            .flat_map(|y| (40..60).map(move |x| (x, y)))
            .any(|(x, y)| result.get_pixel(x, y).0[0] < 255);
        assert!(shaded_beside_product);
    }

    #[tokio::test]
    async fn test_apply_shadow_keeps_input_on_failure() {
        let empty = RgbaImage::from_pixel(20, 20, Rgba([0, 0, 0, 0]));
        let result = apply_shadow(empty.clone(), ShadowBackdrop::White).await;
        assert_eq!(result, empty);
    }

    #[test]
    fn test_profile_variant_hint() {
        let remover = BackgroundRemover::new(Arc::new(MockExtractor::new()), RemovalProfile::Interactive);
        assert_eq!(remover.options.variant.as_deref(), Some("fp16"));
        let remover = remover.with_model("isnet-general");
        assert_eq!(remover.options.model.as_deref(), Some("isnet-general"));
    }
}
