//! Error types for the vision pipeline
//!
//! Simple, flat error hierarchy. No over-engineering.

use thiserror::Error;

pub type Result<T> = std::result::Result<T, VisionError>;

#[derive(Debug, Error)]
pub enum VisionError {
    #[error("Image decode failed: {0}")]
    Decode(image::ImageError),

    #[error("Image encode failed: {0}")]
    Encode(image::ImageError),

    #[error("No screenshot has been processed yet; coordinates cannot be adjusted")]
    NoScreenshot,

    #[error("Unknown aspect ratio bucket: {0}")]
    UnknownBucket(String),
}
