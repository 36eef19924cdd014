//! Composition planning: scale factor and placement on the delivered canvas

use super::bounds::ProductBounds;
use crate::config::{FitPolicy, CANVAS_SIZE};
use serde::{Deserialize, Serialize};

/// How to resize a crop and where to place it on the canvas
///
/// Placement may be negative; overlaying clips whatever falls outside the
/// canvas.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CompositionPlan {
    pub scale_factor: f64,
    pub resized_width: u32,
    pub resized_height: u32,
    pub placement_x: i64,
    pub placement_y: i64,
    pub canvas_width: u32,
    pub canvas_height: u32,
    /// Product centerline within the resized crop
    pub scaled_center_x: f64,
    /// Product baseline within the resized crop
    pub scaled_bottom: u32,
}

impl CompositionPlan {
    /// Plan for the standard 800x800 canvas
    #[must_use]
    pub fn compute(bounds: &ProductBounds, fit: FitPolicy, baseline_inset: u32) -> Self {
        Self::compute_for_canvas(bounds, fit, baseline_inset, CANVAS_SIZE, CANVAS_SIZE)
    }

    /// Plan for an arbitrary canvas size
    #[must_use]
    pub fn compute_for_canvas(
        bounds: &ProductBounds,
        fit: FitPolicy,
        baseline_inset: u32,
        canvas_width: u32,
        canvas_height: u32,
    ) -> Self {
        let canvas_width = canvas_width.max(1);
        let canvas_height = canvas_height.max(1);
        let crop_w = f64::from(bounds.crop.width());
        let crop_h = f64::from(bounds.crop.height());

        let scale_factor = match fit {
            FitPolicy::WidthFirst {
                target_width,
                max_height,
            } => {
                let target = f64::from(target_width.clamp(1, canvas_width));
                let cap = f64::from(max_height.clamp(1, canvas_height));
                let scale = target / crop_w;
                if (crop_h * scale).round() > cap {
                    cap / crop_h
                } else {
                    scale
                }
            },
            FitPolicy::HeightFirst {
                target_height,
                max_width,
            } => {
                let target = f64::from(target_height.clamp(1, canvas_height));
                let cap = f64::from(max_width.clamp(1, canvas_width));
                let scale = target / crop_h;
                if (crop_w * scale).round() > cap {
                    cap / crop_w
                } else {
                    scale
                }
            },
        };

        let resized_width = scale_to_pixels(crop_w, scale_factor, canvas_width);
        let resized_height = scale_to_pixels(crop_h, scale_factor, canvas_height);

        let scaled_center_x =
            (bounds.center_x * scale_factor).clamp(0.0, f64::from(resized_width));
        let scaled_bottom = ((f64::from(bounds.bottom_offset) * scale_factor).round() as u32)
            .min(resized_height);

        let inset = baseline_inset.min(canvas_height);
        let placement_x = (f64::from(canvas_width) / 2.0 - scaled_center_x).floor() as i64;
        let placement_y =
            i64::from(canvas_height) - i64::from(inset) - i64::from(scaled_bottom);

        Self {
            scale_factor,
            resized_width,
            resized_height,
            placement_x,
            placement_y,
            canvas_width,
            canvas_height,
            scaled_center_x,
            scaled_bottom,
        }
    }

    /// Canvas row the product baseline lands on
    #[must_use]
    pub fn baseline_y(&self) -> i64 {
        self.placement_y + i64::from(self.scaled_bottom)
    }

    /// Canvas column the product centerline lands on
    #[must_use]
    pub fn centerline_x(&self) -> f64 {
        self.placement_x as f64 + self.scaled_center_x
    }
}

fn scale_to_pixels(length: f64, scale: f64, limit: u32) -> u32 {
    ((length * scale).round() as u32).clamp(1, limit)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alignment::bounds::BoundingBox;

    fn bounds(w: u32, h: u32) -> ProductBounds {
        let crop = BoundingBox::new(100, 100, 100 + w - 1, 100 + h - 1);
        ProductBounds {
            crop,
            tight: Some(crop),
            bottom_offset: h - 1,
            center_x: f64::from(w - 1) / 2.0,
        }
    }

    const WIDTH_700: FitPolicy = FitPolicy::WidthFirst {
        target_width: 700,
        max_height: 800,
    };

    #[test]
    fn test_width_first_scaling() {
        let plan = CompositionPlan::compute(&bounds(1400, 700), WIDTH_700, 212);
        assert!((plan.scale_factor - 0.5).abs() < 1e-9);
        assert_eq!(plan.resized_width, 700);
        assert_eq!(plan.resized_height, 350);
        // Center lands on the canvas midpoint
        assert!((plan.centerline_x() - 400.0).abs() <= 1.0);
        // Baseline lands `inset` above the canvas bottom
        assert_eq!(plan.baseline_y(), 800 - 212);
    }

    #[test]
    fn test_height_fallback_for_tall_crops() {
        let plan = CompositionPlan::compute(&bounds(500, 1500), WIDTH_700, 212);
        assert_eq!(plan.resized_height, 800);
        assert!((plan.scale_factor - 800.0 / 1500.0).abs() < 1e-9);
        assert_eq!(plan.resized_width, 267);
    }

    #[test]
    fn test_height_first_policy() {
        let fit = FitPolicy::HeightFirst {
            target_height: 700,
            max_width: 800,
        };
        let plan = CompositionPlan::compute(&bounds(300, 1400), fit, 110);
        assert_eq!(plan.resized_height, 700);
        assert_eq!(plan.resized_width, 150);
        assert_eq!(plan.baseline_y(), 800 - 110);

        let wide = CompositionPlan::compute(&bounds(1800, 600), fit, 110);
        assert_eq!(wide.resized_width, 800);
        assert_eq!(wide.resized_height, 267);
    }

    #[test]
    fn test_resized_never_exceeds_canvas_and_keeps_aspect() {
        let crops = [(1, 1), (3, 2000), (2000, 3), (640, 480), (1999, 1999), (70, 900)];
        for (w, h) in crops {
            let plan = CompositionPlan::compute(&bounds(w, h), WIDTH_700, 212);
            assert!(plan.resized_width <= 800 && plan.resized_height <= 800);
            assert!(plan.resized_width >= 1 && plan.resized_height >= 1);

            let expected = f64::from(w) / f64::from(h);
            let actual = f64::from(plan.resized_width) / f64::from(plan.resized_height);
            let tolerance = expected * (1.0 / f64::from(plan.resized_height.min(plan.resized_width)));
            assert!(
                (expected - actual).abs() <= tolerance.max(0.01),
                "{w}x{h}: {expected} vs {actual}"
            );
        }
    }

    #[test]
    fn test_anchors_clamp_for_degenerate_inputs() {
        let mut b = bounds(100, 100);
        b.center_x = 10_000.0;
        b.bottom_offset = 10_000;
        let plan = CompositionPlan::compute(&b, WIDTH_700, 5000);
        assert!(plan.scaled_center_x >= 0.0 && plan.scaled_center_x <= 800.0);
        assert!(plan.scaled_bottom <= 800);
        assert_eq!(plan.placement_y, -i64::from(plan.scaled_bottom));

        b.center_x = -50.0;
        let plan = CompositionPlan::compute(&b, WIDTH_700, 212);
        assert!(plan.scaled_center_x.abs() < f64::EPSILON);
        assert_eq!(plan.placement_x, 400);
    }
}
