//! Background classifier

use crate::config::ClassifierThresholds;
use image::Rgba;

/// Decides whether a single pixel belongs to the background
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BackgroundClassifier {
    thresholds: ClassifierThresholds,
}

impl BackgroundClassifier {
    #[must_use]
    pub fn new(thresholds: ClassifierThresholds) -> Self {
        Self { thresholds }
    }

    #[must_use]
    pub fn thresholds(&self) -> &ClassifierThresholds {
        &self.thresholds
    }

    /// Classify a pixel; `alpha` is `None` for rasters without an alpha channel
    #[must_use]
    pub fn is_background(&self, r: u8, g: u8, b: u8, alpha: Option<u8>) -> bool {
        let t = &self.thresholds;

        if alpha.is_some_and(|a| a < t.transparency_threshold) {
            return true;
        }

        if r >= t.white_threshold && g >= t.white_threshold && b >= t.white_threshold {
            return true;
        }

        let max = r.max(g).max(b);
        let min = r.min(g).min(b);
        max - min <= t.grey_tolerance && min >= t.near_white_floor
    }

    /// Classify an RGBA pixel
    #[must_use]
    pub fn is_background_rgba(&self, pixel: &Rgba<u8>) -> bool {
        let [r, g, b, a] = pixel.0;
        self.is_background(r, g, b, Some(a))
    }
}
