//! Per-pixel selection between an original image and its bent version.

use std::path::Path;

use anyhow::Context as _;
use image::{DynamicImage, GenericImageView, GrayImage, Luma};

use crate::foundation::error::{BendError, BendResult};

/// A read-only selector image.
///
/// The selector is the mask's alpha channel when it has one, else its luma. A selector value of
/// 255 takes the transformed pixel; anything lower keeps the original.
#[derive(Clone, Debug)]
pub struct Mask {
    selector: GrayImage,
}

impl Mask {
    /// Load a mask from any raster file.
    pub fn open(path: &Path) -> BendResult<Self> {
        let img = image::open(path).with_context(|| format!("open mask '{}'", path.display()))?;
        Ok(Self::from_image(&img))
    }

    /// Build a mask from a decoded image.
    pub fn from_image(img: &DynamicImage) -> Self {
        let selector = if img.color().has_alpha() {
            let rgba = img.to_rgba8();
            GrayImage::from_fn(rgba.width(), rgba.height(), |x, y| {
                Luma([rgba.get_pixel(x, y)[3]])
            })
        } else {
            img.to_luma8()
        };
        Self { selector }
    }

    /// `(width, height)` of the selector.
    pub fn dimensions(&self) -> (u32, u32) {
        self.selector.dimensions()
    }

    /// Whether pixel `(x, y)` takes the transformed value.
    pub fn selects_transformed(&self, x: u32, y: u32) -> bool {
        self.selector.get_pixel(x, y)[0] == u8::MAX
    }

    /// Merge `original` and `transformed` under this mask.
    ///
    /// The result keeps the colour layout of `original`.
    pub fn composite(
        &self,
        original: &DynamicImage,
        transformed: &DynamicImage,
    ) -> BendResult<DynamicImage> {
        let dims = self.dimensions();
        for (what, img) in [("original", original), ("transformed", transformed)] {
            if img.dimensions() != dims {
                return Err(BendError::validation(format!(
                    "mask is {}x{} but the {what} image is {}x{}",
                    dims.0,
                    dims.1,
                    img.width(),
                    img.height()
                )));
            }
        }

        if original.color().has_alpha() {
            let mut out = original.to_rgba8();
            let bent = transformed.to_rgba8();
            for (x, y, px) in out.enumerate_pixels_mut() {
                if self.selects_transformed(x, y) {
                    *px = *bent.get_pixel(x, y);
                }
            }
            Ok(DynamicImage::ImageRgba8(out))
        } else {
            let mut out = original.to_rgb8();
            let bent = transformed.to_rgb8();
            for (x, y, px) in out.enumerate_pixels_mut() {
                if self.selects_transformed(x, y) {
                    *px = *bent.get_pixel(x, y);
                }
            }
            Ok(DynamicImage::ImageRgb8(out))
        }
    }
}

#[cfg(test)]
#[path = "../../tests/unit/session/mask.rs"]
mod tests;
