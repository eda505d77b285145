//! Pure Rust image processing backend.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Identify | `image::image_dimensions` (header only) |
//! | Decode (JPEG, PNG) | `image::ImageReader` with [`decode_limits`] |
//! | Resize | `DynamicImage::resize_exact` with `Lanczos3` |
//! | Placeholder blur | `image::imageops::blur` |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless) |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` with quality |
//! | Encode → PNG | `image::codecs::png::PngEncoder` |
//! | Verbatim copy | `std::fs::copy` |
//!
//! Every write lands on a `.{name}.partial` sibling first and is renamed
//! into place on success.

use super::backend::{BackendError, Dimensions, ImageBackend};
use super::calculations::CODEC_CEILING;
use super::params::{OutputFormat, ResizeParams};
use crate::fsutil;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::webp::WebPEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, ImageReader, Limits};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Source extensions the pipeline picks up from the input directory.
const SOURCE_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png"];

/// Returns the set of source image extensions (lowercase).
pub fn supported_input_extensions() -> &'static [&'static str] {
    SOURCE_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

/// Largest source, in pixels, the decoder will take on.
///
/// The codec ceiling squared. One axis may be far past the ceiling as long
/// as the area fits.
pub const MAX_INPUT_PIXELS: u64 = CODEC_CEILING as u64 * CODEC_CEILING as u64;

/// Decoder limits sized for [`MAX_INPUT_PIXELS`] at 16-bit RGBA.
///
/// The `image` default of 512 MiB rejects ordinary panoramas (20000×8000 RGBA
/// is 640 MB) before the ceiling clamp ever runs.
pub fn decode_limits() -> Limits {
    let mut limits = Limits::default();
    limits.max_alloc = Some(MAX_INPUT_PIXELS * 8);
    limits
}

/// Load and decode an image from disk under `limits`.
fn load_image(path: &Path, limits: Limits) -> Result<DynamicImage, BackendError> {
    let mut reader = ImageReader::open(path)?.with_guessed_format()?;
    reader.limits(limits);
    reader.decode().map_err(|e| {
        BackendError::ProcessingFailed(format!("Failed to decode {}: {}", path.display(), e))
    })
}

/// Encode `img` to `path` in the requested format.
///
/// The bytes go to a sibling partial file that is renamed into place only
/// once the encoder and the final flush succeed, so a failed encode never
/// leaves a truncated artifact behind.
fn save_image(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    fsutil::write_atomically(path, |partial| encode_to(img, partial, format, quality))
}

fn encode_to(
    img: &DynamicImage,
    path: &Path,
    format: OutputFormat,
    quality: u32,
) -> Result<(), BackendError> {
    let mut writer = BufWriter::new(File::create(path)?);
    let result = match format {
        OutputFormat::WebP => {
            // The WebP encoder only takes 8-bit RGB(A).
            let img = if img.color().has_alpha() {
                DynamicImage::ImageRgba8(img.to_rgba8())
            } else {
                DynamicImage::ImageRgb8(img.to_rgb8())
            };
            img.write_with_encoder(WebPEncoder::new_lossless(&mut writer))
        }
        OutputFormat::Jpeg => {
            // JPEG has no alpha channel.
            let img = DynamicImage::ImageRgb8(img.to_rgb8());
            img.write_with_encoder(JpegEncoder::new_with_quality(&mut writer, quality as u8))
        }
        OutputFormat::Png => img.write_with_encoder(PngEncoder::new(&mut writer)),
    };
    result.map_err(|e| {
        BackendError::ProcessingFailed(format!("{} encode failed: {}", format.label(), e))
    })?;
    writer.flush()?;
    Ok(())
}

impl ImageBackend for RustBackend {
    fn identify(&self, path: &Path) -> Result<Dimensions, BackendError> {
        let (width, height) = image::image_dimensions(path).map_err(|e| {
            BackendError::ProcessingFailed(format!("Failed to read dimensions: {}", e))
        })?;
        Ok(Dimensions { width, height })
    }

    fn resize(&self, params: &ResizeParams) -> Result<(), BackendError> {
        let img = load_image(&params.source, decode_limits())?;
        let resized = img.resize_exact(params.width, params.height, FilterType::Lanczos3);
        let final_img = match params.blur_sigma {
            Some(sigma) if sigma > 0.0 => {
                DynamicImage::from(image::imageops::blur(&resized, sigma))
            }
            _ => resized,
        };
        save_image(
            &final_img,
            &params.output,
            params.format,
            params.quality.value(),
        )
    }

    fn copy(&self, source: &Path, output: &Path) -> Result<(), BackendError> {
        fsutil::write_atomically(output, |partial| {
            fsutil::copy_file(source, partial).map(|_| ())
        })?;
        Ok(())
    }
}
