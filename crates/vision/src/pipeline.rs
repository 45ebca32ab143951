//! Screenshot normalization for vision-model consumption
//!
//! The model reports pointer targets in the coordinate space of the padded
//! canvas it was shown, not in device pixels. The pipeline owns both halves
//! of that contract:
//!
//! ```text
//! device screenshot → scale to fit bucket canvas → center + pad → model
//! model (x, y) on canvas → subtract padding → rescale → device (x, y)
//! ```
//!
//! The image is never cropped or distorted: scaling always fits the whole
//! frame inside the canvas and the remainder is padded with the uniform
//! background color.

use crate::error::{Result, VisionError};
use crate::types::{AspectRatioBucket, DeviceViewport, ImageDimension, ScreenshotRecord};
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageFormat, Rgba, RgbaImage};
use std::io::Cursor;
use std::sync::{PoisonError, RwLock};

/// Padding color used for the canvas remainder. Trimming assumes the same
/// color when recovering the content region.
pub const PADDING_BACKGROUND: Rgba<u8> = Rgba([0, 0, 0, 255]);

/// Luma values at or below this are treated as padding when trimming.
/// Lossy-compressed sources do not keep the padding at exactly zero.
pub const TRIM_LUMA_TOLERANCE: u8 = 8;

/// Stateful image pipeline. Each browser owns one instance; the record of
/// the most recent padded screenshot lives here, never in module state, so
/// independent browsers (and tests) cannot interfere with each other.
pub struct VisionPipeline {
    latest: RwLock<Option<ScreenshotRecord>>,
}

impl VisionPipeline {
    pub fn new() -> Self {
        Self {
            latest: RwLock::new(None),
        }
    }

    /// Bucket the model should be shown for the given viewport.
    ///
    /// Always returns the 9:16 bucket for now. A real selector would pick
    /// the bucket closest to the viewport's aspect ratio; until the model
    /// integration needs that, a single portrait canvas is enough.
    pub fn select_bucket(&self, _viewport: DeviceViewport) -> AspectRatioBucket {
        AspectRatioBucket::NineBySixteen
    }

    /// Scale `image_bytes` to fit the bucket's canvas, pad the remainder
    /// with [`PADDING_BACKGROUND`], and return the canvas as PNG bytes.
    ///
    /// The produced canvas becomes the "latest screenshot": subsequent
    /// [`adjust_coords`](Self::adjust_coords) calls resolve against its
    /// recorded canvas and content dimensions.
    pub fn resize_to_bucket(
        &self,
        image_bytes: &[u8],
        bucket: AspectRatioBucket,
    ) -> Result<Vec<u8>> {
        let target = bucket.dimensions();
        let source = image::load_from_memory(image_bytes).map_err(VisionError::Decode)?;

        // resize() fits within the bounds while preserving aspect ratio,
        // upscaling when the source is smaller than the canvas.
        let fitted = source.resize(target.width, target.height, FilterType::Lanczos3);
        let (fitted_w, fitted_h) = fitted.dimensions();

        let mut canvas = RgbaImage::from_pixel(target.width, target.height, PADDING_BACKGROUND);
        let offset_x = ((target.width - fitted_w) / 2) as i64;
        let offset_y = ((target.height - fitted_h) / 2) as i64;
        image::imageops::overlay(&mut canvas, &fitted.to_rgba8(), offset_x, offset_y);

        let mut out = Vec::new();
        DynamicImage::ImageRgba8(canvas)
            .write_to(&mut Cursor::new(&mut out), ImageFormat::Png)
            .map_err(VisionError::Encode)?;

        self.record(ScreenshotRecord {
            canvas: target,
            content: ImageDimension::new(fitted_w, fitted_h),
        });

        Ok(out)
    }

    /// Pixel size of the non-padding region of `image_bytes`.
    ///
    /// Scans inward from each edge for the first pixel brighter than the
    /// padding tolerance. An image with no such pixel reports its full
    /// size (there is nothing to trim away from a uniform frame).
    pub fn content_dimensions(&self, image_bytes: &[u8]) -> Result<ImageDimension> {
        let luma = image::load_from_memory(image_bytes)
            .map_err(VisionError::Decode)?
            .to_luma8();
        let (width, height) = luma.dimensions();

        let mut bounds: Option<(u32, u32, u32, u32)> = None;
        for (x, y, pixel) in luma.enumerate_pixels() {
            if pixel[0] > TRIM_LUMA_TOLERANCE {
                bounds = Some(match bounds {
                    None => (x, x, y, y),
                    Some((min_x, max_x, min_y, max_y)) => {
                        (min_x.min(x), max_x.max(x), min_y.min(y), max_y.max(y))
                    }
                });
            }
        }

        Ok(match bounds {
            Some((min_x, max_x, min_y, max_y)) => {
                ImageDimension::new(max_x - min_x + 1, max_y - min_y + 1)
            }
            None => ImageDimension::new(width, height),
        })
    }

    /// Map a canvas-space point reported by the model to device pixels.
    ///
    /// With canvas (Tw, Th) and content (Cw, Ch) from the latest
    /// screenshot and device viewport (W, H):
    /// `padX = (Tw - Cw) / 2`, `x = round((xCanvas - padX) * W / Cw)`,
    /// and symmetrically for y. This is the exact inverse of the
    /// scale-and-center transform applied by
    /// [`resize_to_bucket`](Self::resize_to_bucket).
    pub fn adjust_coords(
        &self,
        x_canvas: f64,
        y_canvas: f64,
        viewport: DeviceViewport,
    ) -> Result<(i32, i32)> {
        let record = self.latest().ok_or(VisionError::NoScreenshot)?;
        let (pad_x, pad_y) = padding_of(record);

        let x_device =
            ((x_canvas - pad_x) * viewport.width as f64 / record.content.width as f64).round();
        let y_device =
            ((y_canvas - pad_y) * viewport.height as f64 / record.content.height as f64).round();

        Ok((x_device as i32, y_device as i32))
    }

    /// Forward mapping: device pixels to canvas space. Composes with
    /// [`adjust_coords`](Self::adjust_coords) to the identity within one
    /// pixel of rounding.
    pub fn project_coords(
        &self,
        x_device: f64,
        y_device: f64,
        viewport: DeviceViewport,
    ) -> Result<(f64, f64)> {
        let record = self.latest().ok_or(VisionError::NoScreenshot)?;
        let (pad_x, pad_y) = padding_of(record);

        let x_canvas = x_device * record.content.width as f64 / viewport.width as f64 + pad_x;
        let y_canvas = y_device * record.content.height as f64 / viewport.height as f64 + pad_y;

        Ok((x_canvas, y_canvas))
    }

    /// Record of the most recent padded screenshot, if any.
    pub fn latest(&self) -> Option<ScreenshotRecord> {
        *self
            .latest
            .read()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, record: ScreenshotRecord) {
        *self
            .latest
            .write()
            .unwrap_or_else(PoisonError::into_inner) = Some(record);
    }
}

impl Default for VisionPipeline {
    fn default() -> Self {
        Self::new()
    }
}

fn padding_of(record: ScreenshotRecord) -> (f64, f64) {
    (
        (record.canvas.width as f64 - record.content.width as f64) / 2.0,
        (record.canvas.height as f64 - record.content.height as f64) / 2.0,
    )
}
