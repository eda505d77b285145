//! Shared test utilities: synthetic source images and input-dir setup.
//!
//! # Usage
//!
//! ```rust
//! use crate::test_helpers::*;
//!
//! let tmp = input_dir(&[("a.jpg", 800, 600), ("b.png", 64, 32)]);
//! let sources = scan(tmp.path()).unwrap();
//! ```

use image::{ImageEncoder, RgbImage, RgbaImage};
use std::path::Path;
use tempfile::TempDir;

// =========================================================================
// Synthetic images
// =========================================================================

/// Write a gradient JPEG of the given size.
pub fn create_test_jpeg(path: &Path, width: u32, height: u32) {
    let img = RgbImage::from_fn(width, height, |x, y| {
        image::Rgb([(x % 256) as u8, (y % 256) as u8, 128])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::jpeg::JpegEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgb8)
        .unwrap();
}

/// Write a gradient PNG with a varying alpha channel.
pub fn create_test_png(path: &Path, width: u32, height: u32) {
    let img = RgbaImage::from_fn(width, height, |x, y| {
        image::Rgba([(x % 256) as u8, 64, (y % 256) as u8, ((x + y) % 256) as u8])
    });
    let file = std::fs::File::create(path).unwrap();
    let writer = std::io::BufWriter::new(file);
    image::codecs::png::PngEncoder::new(writer)
        .write_image(img.as_raw(), width, height, image::ExtendedColorType::Rgba8)
        .unwrap();
}

// =========================================================================
// Fixture setup
// =========================================================================

/// Temp directory holding one synthetic image per `(file name, w, h)` entry.
///
/// The encoder is picked from the extension: `.png` gets a PNG, anything
/// else a JPEG.
pub fn input_dir(images: &[(&str, u32, u32)]) -> TempDir {
    let tmp = TempDir::new().unwrap();
    for &(name, width, height) in images {
        let path = tmp.path().join(name);
        if name.to_ascii_lowercase().ends_with(".png") {
            create_test_png(&path, width, height);
        } else {
            create_test_jpeg(&path, width, height);
        }
    }
    tmp
}
