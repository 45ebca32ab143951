//! Core type definitions for vision-compatible screenshots
//!
//! A vision model accepts only a small, fixed set of canvas sizes. Every
//! screenshot is scaled to fit one of those canvases and padded with a
//! uniform background; the types here describe the canvases and the
//! device viewport the pixels came from.

use crate::error::VisionError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Pixel size of an image or canvas.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageDimension {
    pub width: u32,
    pub height: u32,
}

impl ImageDimension {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl fmt::Display for ImageDimension {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

/// Physical size of the device viewport a screenshot was captured from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceViewport {
    pub width: u32,
    pub height: u32,
}

impl DeviceViewport {
    pub fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

/// Aspect-ratio buckets accepted by the vision model.
///
/// The canvas sizes are fixed by the model integration; they are not
/// derived from anything in this crate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AspectRatioBucket {
    Square,
    ThreeByFour,
    TwoByThree,
    NineBySixteen,
    OneByTwo,
}

impl AspectRatioBucket {
    pub const ALL: [AspectRatioBucket; 5] = [
        AspectRatioBucket::Square,
        AspectRatioBucket::ThreeByFour,
        AspectRatioBucket::TwoByThree,
        AspectRatioBucket::NineBySixteen,
        AspectRatioBucket::OneByTwo,
    ];

    /// Canvas pixel dimensions for this bucket.
    pub fn dimensions(self) -> ImageDimension {
        match self {
            AspectRatioBucket::Square => ImageDimension::new(1092, 1092),
            AspectRatioBucket::ThreeByFour => ImageDimension::new(951, 1268),
            AspectRatioBucket::TwoByThree => ImageDimension::new(896, 1344),
            AspectRatioBucket::NineBySixteen => ImageDimension::new(819, 1456),
            AspectRatioBucket::OneByTwo => ImageDimension::new(784, 1568),
        }
    }

    /// Ratio label as the model integration spells it.
    pub fn label(self) -> &'static str {
        match self {
            AspectRatioBucket::Square => "1:1",
            AspectRatioBucket::ThreeByFour => "3:4",
            AspectRatioBucket::TwoByThree => "2:3",
            AspectRatioBucket::NineBySixteen => "9:16",
            AspectRatioBucket::OneByTwo => "1:2",
        }
    }
}

impl fmt::Display for AspectRatioBucket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for AspectRatioBucket {
    type Err = VisionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|bucket| bucket.label() == s)
            .ok_or_else(|| VisionError::UnknownBucket(s.to_string()))
    }
}

/// What the pipeline remembers about the most recent padded screenshot:
/// the canvas it was padded onto and the size of the real content region
/// inside it. Both are needed to map canvas coordinates back to device
/// coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotRecord {
    pub canvas: ImageDimension,
    pub content: ImageDimension,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bucket_table_matches_model_contract() {
        let expected = [
            (AspectRatioBucket::Square, "1:1", 1092, 1092),
            (AspectRatioBucket::ThreeByFour, "3:4", 951, 1268),
            (AspectRatioBucket::TwoByThree, "2:3", 896, 1344),
            (AspectRatioBucket::NineBySixteen, "9:16", 819, 1456),
            (AspectRatioBucket::OneByTwo, "1:2", 784, 1568),
        ];

        for (bucket, label, width, height) in expected {
            assert_eq!(bucket.label(), label);
            assert_eq!(bucket.dimensions(), ImageDimension::new(width, height));
        }
    }

    #[test]
    fn test_bucket_parses_from_label() {
        for bucket in AspectRatioBucket::ALL {
            assert_eq!(bucket.label().parse::<AspectRatioBucket>().unwrap(), bucket);
        }
    }

    #[test]
    fn test_unknown_bucket_label_is_rejected() {
        let err = "16:9".parse::<AspectRatioBucket>().unwrap_err();
        assert!(err.to_string().contains("16:9"));
    }
}
