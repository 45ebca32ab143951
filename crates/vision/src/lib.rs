//! Vision-compatible screenshot processing
//!
//! A vision model only accepts a handful of canvas sizes, so raw device
//! screenshots are scaled to fit a fixed aspect-ratio bucket and padded
//! with a uniform background. Pointer targets the model reports are then
//! expressed in canvas space; this crate owns the transform in both
//! directions.
//!
//! ```text
//! screenshot bytes → VisionPipeline::resize_to_bucket → padded canvas
//! model (x, y)     → VisionPipeline::adjust_coords    → device (x, y)
//! ```
//!
//! The pipeline never crops: padding preserves the full frame, and the
//! recorded canvas/content dimensions make the coordinate mapping an
//! exact inverse of the resize.

pub mod error;
pub mod pipeline;
pub mod types;

pub use error::{Result, VisionError};
pub use pipeline::{VisionPipeline, PADDING_BACKGROUND, TRIM_LUMA_TOLERANCE};
pub use types::{AspectRatioBucket, DeviceViewport, ImageDimension, ScreenshotRecord};
