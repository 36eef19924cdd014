//! Product alignment: foreground detection, bounding boxes and placement geometry
//!
//! The three stages are pure functions over decoded rasters:
//! - [`classifier`]: per-pixel background predicate
//! - [`bounds`]: product extent and anchors on the working canvas
//! - [`plan`]: scale factor and placement on the delivered canvas

pub mod bounds;
pub mod classifier;
pub mod plan;

pub use bounds::{extract_bounds, BoundingBox, ProductBounds};
pub use classifier::BackgroundClassifier;
pub use plan::CompositionPlan;
