//! Canvas compositor
//!
//! Turns one job's source bytes into the delivered 800x800 JPEG:
//!
//! 1. normalize (decode, orient, flatten onto white)
//! 2. optional background removal, with a white-backdrop shadow for
//!    single-pass categories
//! 3. downscale into the 2000x2000 working canvas and center it there
//! 4. find the product, plan scale and placement
//! 5. crop, resize, and for double-pass categories remove again and shadow
//! 6. lay the product over the destination background, then logo and date
//! 7. encode at the category's delivery quality

use crate::alignment::{extract_bounds, BackgroundClassifier, CompositionPlan, ProductBounds};
use crate::config::{CategoryProfile, CANVAS_SIZE, WORKING_CANVAS_SIZE};
use crate::error::{CatalogError, Result};
use crate::removal::{apply_shadow, BackgroundRemover, ShadowBackdrop};
use crate::services::branding::LogoLibrary;
use crate::services::codec::ImageCodec;
use crate::services::render::{date_label_html, LabelRenderer};
use crate::types::{ProcessedAsset, ProcessingJob};
use crate::utils::run_blocking;
use image::{imageops, DynamicImage, Rgba, RgbaImage};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Product raster aligned for the delivered canvas
#[derive(Debug, Clone)]
pub struct AlignedProduct {
    /// Crop resized to the plan's dimensions
    pub image: RgbaImage,
    pub bounds: ProductBounds,
    pub plan: CompositionPlan,
}

/// Per-category compositor sharing one remover, renderer and logo library
#[derive(Clone)]
pub struct CanvasCompositor {
    profile: CategoryProfile,
    classifier: BackgroundClassifier,
    remover: BackgroundRemover,
    renderer: Option<Arc<dyn LabelRenderer>>,
    logos: Option<LogoLibrary>,
    default_background: Option<PathBuf>,
    font_path: Option<PathBuf>,
}

impl std::fmt::Debug for CanvasCompositor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CanvasCompositor")
            .field("category", &self.profile.category)
            .field("remover", &self.remover)
            .field("renderer", &self.renderer.as_ref().map(|r| r.name().to_string()))
            .field("logos", &self.logos)
            .field("default_background", &self.default_background)
            .finish()
    }
}

impl CanvasCompositor {
    #[must_use]
    pub fn new(profile: CategoryProfile, remover: BackgroundRemover) -> Self {
        Self {
            classifier: BackgroundClassifier::new(profile.thresholds),
            profile,
            remover,
            renderer: None,
            logos: None,
            default_background: None,
            font_path: None,
        }
    }

    #[must_use]
    pub fn with_renderer(mut self, renderer: Arc<dyn LabelRenderer>) -> Self {
        self.renderer = Some(renderer);
        self
    }

    #[must_use]
    pub fn with_logos(mut self, logos: LogoLibrary) -> Self {
        self.logos = Some(logos);
        self
    }

    /// Background used by jobs that do not name their own
    #[must_use]
    pub fn with_default_background<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.default_background = Some(path.into());
        self
    }

    #[must_use]
    pub fn with_font<P: Into<PathBuf>>(mut self, path: P) -> Self {
        self.font_path = Some(path.into());
        self
    }

    #[must_use]
    pub fn profile(&self) -> &CategoryProfile {
        &self.profile
    }

    /// Produce the delivered asset for one job
    ///
    /// # Errors
    /// - Undecodable source
    /// - Date label rendering failure
    /// - Final encode failure
    #[instrument(skip_all, fields(id = job.identifier(), category = %self.profile.category))]
    pub async fn compose(&self, job: &ProcessingJob, source: &[u8]) -> Result<ProcessedAsset> {
        let id = job.identifier().to_string();
        let stage_error = |stage: &'static str| {
            let id = id.clone();
            move |e: CatalogError| CatalogError::composition_stage_error(stage, &id, &e.to_string())
        };

        let auto_orient = self.profile.auto_orient;
        let bytes = source.to_vec();
        let mut raster = run_blocking("normalize", move || ImageCodec::normalize(&bytes, auto_orient))
            .await
            .map_err(stage_error("normalize"))?;

        if job.remove_background() {
            raster = self.first_removal(raster).await;
        }

        let aligned = self.align(raster).await.map_err(stage_error("align"))?;
        debug!(
            scale = aligned.plan.scale_factor,
            placement_x = aligned.plan.placement_x,
            placement_y = aligned.plan.placement_y,
            "Planned composition"
        );

        let mut product = aligned.image;
        if job.remove_background() && self.profile.double_removal {
            product = self.second_removal(product).await;
        }

        let mut canvas = self.destination(job).await;
        imageops::overlay(
            &mut canvas,
            &product,
            aligned.plan.placement_x,
            aligned.plan.placement_y,
        );

        self.overlay_logo(job, &mut canvas).await;
        self.overlay_date_label(job, &mut canvas)
            .await
            .map_err(stage_error("date label"))?;

        let quality = self.profile.delivery_quality;
        let encoded = run_blocking("encode", move || ImageCodec::encode_jpeg(&canvas, quality))
            .await
            .map_err(stage_error("encode"))?;

        Ok(ProcessedAsset::new(
            job.asset_filename(&self.profile.asset_prefix),
            encoded,
        ))
    }

    /// Fit the raster into the working canvas, locate the product and resize its crop
    pub async fn align(&self, raster: RgbaImage) -> Result<AlignedProduct> {
        let classifier = self.classifier;
        let fit = self.profile.fit;
        let inset = self.profile.baseline_inset;

        run_blocking("align", move || {
            let fitted = ImageCodec::fit_within(raster, WORKING_CANVAS_SIZE);
            let working = ImageCodec::place_centered(&fitted, WORKING_CANVAS_SIZE);

            let bounds = extract_bounds(&working, &classifier);
            let plan = CompositionPlan::compute(&bounds, fit, inset);

            let crop = imageops::crop_imm(
                &working,
                bounds.crop.min_x,
                bounds.crop.min_y,
                bounds.crop.width(),
                bounds.crop.height(),
            )
            .to_image();
            let image = ImageCodec::resize_exact(&crop, plan.resized_width, plan.resized_height);
            Ok(AlignedProduct {
                image,
                bounds,
                plan,
            })
        })
        .await
    }

    /// Removal on the normalized raster; failures keep the original
    async fn first_removal(&self, raster: RgbaImage) -> RgbaImage {
        let cutout = match self.remover.remove(&raster).await {
            Ok(cutout) => cutout,
            Err(e) => {
                warn!(error = %e, "Background removal failed, keeping original");
                return raster;
            },
        };

        if self.profile.shadow && !self.profile.double_removal {
            let shadowed = apply_shadow(cutout, ShadowBackdrop::White).await;
            return ImageCodec::flatten_onto_white(&DynamicImage::ImageRgba8(shadowed));
        }
        cutout
    }

    /// Removal on the aligned crop; failures keep the crop
    async fn second_removal(&self, product: RgbaImage) -> RgbaImage {
        match self.remover.remove(&product).await {
            Ok(cutout) if self.profile.shadow => {
                apply_shadow(cutout, ShadowBackdrop::Transparent).await
            },
            Ok(cutout) => cutout,
            Err(e) => {
                warn!(error = %e, "Second background removal failed, keeping aligned crop");
                product
            },
        }
    }

    /// White canvas, covered by the job's or default background when one decodes
    async fn destination(&self, job: &ProcessingJob) -> RgbaImage {
        let mut canvas = RgbaImage::from_pixel(CANVAS_SIZE, CANVAS_SIZE, Rgba([255, 255, 255, 255]));
        let path = job
            .decorations()
            .background
            .as_deref()
            .or(self.default_background.as_deref());

        if let Some(path) = path {
            match load_cover(path).await {
                Ok(background) => imageops::overlay(&mut canvas, &background, 0, 0),
                Err(e) => warn!(path = %path.display(), error = %e, "Background unusable, using white"),
            }
        }
        canvas
    }

    async fn overlay_logo(&self, job: &ProcessingJob, canvas: &mut RgbaImage) {
        let decorations = job.decorations();
        let path = decorations.logo.clone().or_else(|| {
            let name = decorations.product_name.as_deref()?;
            self.logos.as_ref()?.path_for(name)
        });
        let Some(path) = path else {
            return;
        };

        match LogoLibrary::load(&path).await {
            Ok(logo) => imageops::overlay(canvas, &logo, 0, 0),
            Err(e) => warn!(path = %path.display(), error = %e, "Logo unavailable, skipping"),
        }
    }

    async fn overlay_date_label(&self, job: &ProcessingJob, canvas: &mut RgbaImage) -> Result<()> {
        let Some(label) = job.decorations().date_label else {
            return Ok(());
        };
        let Some(renderer) = &self.renderer else {
            warn!(label = %label, "No label renderer configured, skipping date label");
            return Ok(());
        };

        let html = date_label_html(&label, self.font_path.as_deref());
        let rendered = renderer.render(&html, (CANVAS_SIZE, CANVAS_SIZE)).await?;
        imageops::overlay(canvas, &rendered, 0, 0);
        Ok(())
    }
}

async fn load_cover(path: &Path) -> Result<RgbaImage> {
    let bytes = tokio::fs::read(path)
        .await
        .map_err(|e| CatalogError::file_io_error("read background", path, &e))?;
    run_blocking("background", move || {
        let image = ImageCodec::decode(&bytes, true)?;
        Ok(ImageCodec::cover(&image, CANVAS_SIZE, CANVAS_SIZE))
    })
    .await
}
