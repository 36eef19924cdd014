//! Bounding-box extraction on the working canvas

use super::classifier::BackgroundClassifier;
use image::RgbaImage;
use serde::{Deserialize, Serialize};

/// Fraction of the tight box size added as crop padding on the left, top and bottom
pub const CROP_MARGIN_RATIO: f64 = 0.1;

/// Inclusive pixel rectangle with `min <= max` on both axes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub min_x: u32,
    pub min_y: u32,
    pub max_x: u32,
    pub max_y: u32,
}

impl BoundingBox {
    /// Create a box, swapping coordinates if given out of order
    #[must_use]
    pub fn new(min_x: u32, min_y: u32, max_x: u32, max_y: u32) -> Self {
        Self {
            min_x: min_x.min(max_x),
            min_y: min_y.min(max_y),
            max_x: min_x.max(max_x),
            max_y: min_y.max(max_y),
        }
    }

    /// The whole raster
    #[must_use]
    pub fn full_frame(width: u32, height: u32) -> Self {
        Self::new(0, 0, width.saturating_sub(1), height.saturating_sub(1))
    }

    #[must_use]
    pub fn width(&self) -> u32 {
        self.max_x - self.min_x + 1
    }

    #[must_use]
    pub fn height(&self) -> u32 {
        self.max_y - self.min_y + 1
    }

    #[must_use]
    pub fn contains(&self, x: u32, y: u32) -> bool {
        (self.min_x..=self.max_x).contains(&x) && (self.min_y..=self.max_y).contains(&y)
    }

    /// Pad the left, top and bottom edges, clamped to a `width` x `height` raster
    ///
    /// The right edge stays on the product so the crop width is the tight
    /// width plus a single horizontal margin.
    #[must_use]
    pub fn expand(&self, margin_x: u32, margin_y: u32, width: u32, height: u32) -> Self {
        let limit_x = width.saturating_sub(1);
        let limit_y = height.saturating_sub(1);
        Self::new(
            self.min_x.saturating_sub(margin_x),
            self.min_y.saturating_sub(margin_y),
            self.max_x.min(limit_x),
            self.max_y.saturating_add(margin_y).min(limit_y),
        )
    }
}

/// Product extent on the working canvas with its alignment anchors
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ProductBounds {
    /// Padded crop rectangle
    pub crop: BoundingBox,
    /// Tightest box around foreground pixels, `None` when nothing was detected
    pub tight: Option<BoundingBox>,
    /// Product baseline, measured from the top of the crop
    pub bottom_offset: u32,
    /// Product centerline, measured from the left of the crop
    pub center_x: f64,
}

impl ProductBounds {
    #[must_use]
    pub fn is_degenerate(&self) -> bool {
        self.tight.is_none()
    }
}

/// Tightest box around every foreground pixel
#[must_use]
pub fn find_tight_box(image: &RgbaImage, classifier: &BackgroundClassifier) -> Option<BoundingBox> {
    let mut found: Option<BoundingBox> = None;

    for (x, y, pixel) in image.enumerate_pixels() {
        if classifier.is_background_rgba(pixel) {
            continue;
        }
        found = Some(match found {
            None => BoundingBox::new(x, y, x, y),
            Some(b) => BoundingBox {
                min_x: b.min_x.min(x),
                min_y: b.min_y.min(y),
                max_x: b.max_x.max(x),
                max_y: b.max_y.max(y),
            },
        });
    }

    found
}

/// Locate the product and compute its crop and anchors
///
/// An all-background raster yields the full frame with the baseline on the
/// last row and the centerline in the middle.
#[must_use]
pub fn extract_bounds(image: &RgbaImage, classifier: &BackgroundClassifier) -> ProductBounds {
    let (width, height) = image.dimensions();
    let tight = find_tight_box(image, classifier);
    let reference = tight.unwrap_or_else(|| BoundingBox::full_frame(width, height));

    let margin_x = (f64::from(reference.max_x - reference.min_x) * CROP_MARGIN_RATIO).round() as u32;
    let margin_y = (f64::from(reference.max_y - reference.min_y) * CROP_MARGIN_RATIO).round() as u32;
    let crop = reference.expand(margin_x, margin_y, width, height);

    let bottom_offset = reference.max_y - crop.min_y;
    let center_x = f64::from(reference.min_x + reference.max_x) / 2.0 - f64::from(crop.min_x);

    log::debug!(
        "Product bounds: tight={:?} crop={:?} bottom_offset={} center_x={:.1}",
        tight,
        crop,
        bottom_offset,
        center_x
    );

    ProductBounds {
        crop,
        tight,
        bottom_offset,
        center_x,
    }
}
