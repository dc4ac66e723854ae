//! Raster conversion between arbitrary image formats and the native BMP container.

use std::{io::Cursor, path::Path};

use anyhow::Context as _;
use image::{DynamicImage, ImageFormat};

use crate::foundation::error::{BendError, BendResult};

/// Converts images to and from the native container the separator understands.
pub trait ImageCodec: Send + Sync {
    /// Read any supported raster file and re-encode it as a native BMP.
    fn decode_to_native(&self, path: &Path) -> BendResult<Vec<u8>>;

    /// Re-encode a native BMP buffer as `format`.
    fn encode_from_native(&self, bytes: &[u8], format: ImageFormat) -> BendResult<Vec<u8>>;

    /// Decode any supported raster buffer.
    fn decode(&self, bytes: &[u8]) -> BendResult<DynamicImage>;

    /// Encode `image` as `format`.
    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> BendResult<Vec<u8>>;
}

/// [`ImageCodec`] backed by the `image` crate.
///
/// Native BMPs are RGB8, or RGBA8 when the source carries alpha.
#[derive(Clone, Copy, Debug, Default)]
pub struct RasterCodec;

impl ImageCodec for RasterCodec {
    fn decode_to_native(&self, path: &Path) -> BendResult<Vec<u8>> {
        let bytes =
            std::fs::read(path).with_context(|| format!("read image '{}'", path.display()))?;
        let img = self.decode(&bytes)?;
        self.encode(&img, ImageFormat::Bmp)
    }

    fn encode_from_native(&self, bytes: &[u8], format: ImageFormat) -> BendResult<Vec<u8>> {
        if format == ImageFormat::Bmp {
            return Ok(bytes.to_vec());
        }
        let img = self.decode(bytes)?;
        self.encode(&img, format)
    }

    fn decode(&self, bytes: &[u8]) -> BendResult<DynamicImage> {
        Ok(image::load_from_memory(bytes).context("decode image from memory")?)
    }

    fn encode(&self, image: &DynamicImage, format: ImageFormat) -> BendResult<Vec<u8>> {
        let prepared = prepare_for(image, format);
        let mut buf = Vec::new();
        prepared
            .write_to(&mut Cursor::new(&mut buf), format)
            .with_context(|| format!("encode image as {format:?}"))?;
        Ok(buf)
    }
}

/// Narrow `image` to a colour layout every encoder we target accepts.
fn prepare_for(image: &DynamicImage, format: ImageFormat) -> DynamicImage {
    let alpha = image.color().has_alpha();
    match format {
        ImageFormat::Jpeg => DynamicImage::ImageRgb8(image.to_rgb8()),
        ImageFormat::Png | ImageFormat::Tiff => image.clone(),
        _ if alpha => DynamicImage::ImageRgba8(image.to_rgba8()),
        _ => DynamicImage::ImageRgb8(image.to_rgb8()),
    }
}

/// Image format for a file extension (`"png"`, `"JPG"`, ...).
pub fn format_from_extension(ext: &str) -> BendResult<ImageFormat> {
    ImageFormat::from_extension(ext.to_ascii_lowercase())
        .ok_or_else(|| BendError::validation(format!("unsupported image extension '{ext}'")))
}

/// Preferred file extension for `format`.
pub fn extension_for(format: ImageFormat) -> &'static str {
    format.extensions_str().first().copied().unwrap_or("bin")
}

#[cfg(test)]
#[path = "../../tests/unit/codec/image.rs"]
mod tests;
