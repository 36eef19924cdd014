//! Synthetic contact shadow under a cut-out product

use crate::error::{CatalogError, Result};
use image::{Rgba, RgbaImage};

/// Alpha above which a pixel counts as part of the product
pub const VISIBLE_ALPHA_THRESHOLD: u8 = 50;

/// Narrowest product width the shadow is sized for
const MIN_PRODUCT_WIDTH: u32 = 100;

/// Shadow width relative to the product width
const WIDTH_RATIO: f64 = 1.1;

/// Shadow height relative to the shadow width
const HEIGHT_RATIO: f64 = 0.04;

/// Share of the shadow height that sits above the product's lowest row
const OVERLAP_RATIO: f64 = 0.8;

/// Radial gradient stops as (offset, opacity)
const GRADIENT: [(f64, f64); 3] = [(0.0, 0.45), (0.6, 0.2), (1.0, 0.0)];

/// What sits behind the product and its shadow
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShadowBackdrop {
    Transparent,
    White,
}

impl ShadowBackdrop {
    fn pixel(self) -> Rgba<u8> {
        match self {
            Self::Transparent => Rgba([0, 0, 0, 0]),
            Self::White => Rgba([255, 255, 255, 255]),
        }
    }
}

/// Ellipse placement derived from the product's visible extent
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShadowGeometry {
    pub x: i64,
    pub y: i64,
    pub width: u32,
    pub height: u32,
}

impl ShadowGeometry {
    /// Measure the product and size the shadow, `None` if nothing is visible
    #[must_use]
    pub fn measure(product: &RgbaImage) -> Option<Self> {
        let mut extent: Option<(u32, u32, u32)> = None;
        for (x, y, pixel) in product.enumerate_pixels() {
            if pixel.0[3] <= VISIBLE_ALPHA_THRESHOLD {
                continue;
            }
            extent = Some(match extent {
                None => (x, x, y),
                Some((min_x, max_x, max_y)) => (min_x.min(x), max_x.max(x), max_y.max(y)),
            });
        }
        let (min_x, max_x, max_y) = extent?;

        let product_width = (max_x - min_x).max(MIN_PRODUCT_WIDTH);
        let center_x = f64::from(min_x + max_x) / 2.0;
        let width = (f64::from(product_width) * WIDTH_RATIO).floor() as u32;
        let height = (f64::from(width) * HEIGHT_RATIO).floor() as u32;

        Some(Self {
            x: (center_x - f64::from(width) / 2.0).floor() as i64,
            y: (f64::from(max_y) - f64::from(height) * OVERLAP_RATIO).floor() as i64,
            width,
            height,
        })
    }
}

fn gradient_opacity(distance: f64) -> f64 {
    let mut previous = GRADIENT[0];
    for stop in GRADIENT {
        if distance <= stop.0 {
            let span = stop.0 - previous.0;
            if span <= f64::EPSILON {
                return stop.1;
            }
            let t = (distance - previous.0) / span;
            return previous.1 + (stop.1 - previous.1) * t;
        }
        previous = stop;
    }
    0.0
}

/// Darken `pixel` with black at `opacity` using source-over compositing
fn blend_black(pixel: &mut Rgba<u8>, opacity: f64) {
    let [r, g, b, a] = pixel.0;
    let dst_a = f64::from(a) / 255.0;
    let out_a = opacity + dst_a * (1.0 - opacity);
    if out_a <= 0.0 {
        return;
    }
    let channel = |c: u8| -> u8 {
        let value = f64::from(c) * dst_a * (1.0 - opacity) / out_a;
        value.round().clamp(0.0, 255.0) as u8
    };
    *pixel = Rgba([
        channel(r),
        channel(g),
        channel(b),
        (out_a * 255.0).round().clamp(0.0, 255.0) as u8,
    ]);
}

/// Composite an elliptical shadow then the product onto a fresh canvas
///
/// Fails only when the product has no visible pixels; callers treat any
/// failure as "keep the unshadowed image".
pub fn synthesize_shadow(product: &RgbaImage, backdrop: ShadowBackdrop) -> Result<RgbaImage> {
    let geometry = ShadowGeometry::measure(product)
        .ok_or_else(|| CatalogError::composition("No visible product pixels for shadow"))?;
    let (canvas_w, canvas_h) = product.dimensions();
    let mut canvas = RgbaImage::from_pixel(canvas_w, canvas_h, backdrop.pixel());

    let radius_x = f64::from(geometry.width) / 2.0;
    let radius_y = (f64::from(geometry.height) / 2.0).max(0.5);
    let center_x = geometry.x as f64 + radius_x;
    let center_y = geometry.y as f64 + radius_y;

    let x_range = geometry.x.max(0)..(geometry.x + i64::from(geometry.width)).min(i64::from(canvas_w));
    let y_range = geometry.y.max(0)..(geometry.y + i64::from(geometry.height)).min(i64::from(canvas_h));

    for py in y_range {
        for px in x_range.clone() {
            let dx = (px as f64 + 0.5 - center_x) / radius_x;
            let dy = (py as f64 + 0.5 - center_y) / radius_y;
            let opacity = gradient_opacity((dx * dx + dy * dy).sqrt());
            if opacity > 0.0 {
                blend_black(canvas.get_pixel_mut(px as u32, py as u32), opacity);
            }
        }
    }

    image::imageops::overlay(&mut canvas, product, 0, 0);
    Ok(canvas)
}
