//! Parameter types for image operations.
//!
//! These structs describe *what* to produce, not *how*. They are the interface
//! between the [`plan`](crate::plan) builder (which decides which artifacts a
//! source fans out into) and the [`backend`](super::backend) (which does the
//! pixel work). Keeping them plain data lets tests swap in a mock backend.
//!
//! ## Types
//!
//! - [`Quality`]: Lossy encoding quality (1–100, default 82). Clamped on construction.
//! - [`OutputFormat`]: WebP, JPEG or PNG, resolved from a file extension.
//! - [`ResizeParams`]: Full specification for one resize + encode: source,
//!   output path, exact target dimensions, format, quality, optional blur.

use std::path::PathBuf;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Quality(pub u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(82)
    }
}

/// Encoded output format of an artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    WebP,
    Jpeg,
    Png,
}

impl OutputFormat {
    /// Resolve a format from a file extension, case-insensitively.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_ascii_lowercase().as_str() {
            "webp" => Some(Self::WebP),
            "jpg" | "jpeg" => Some(Self::Jpeg),
            "png" => Some(Self::Png),
            _ => None,
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            Self::WebP => "webp",
            Self::Jpeg => "jpeg",
            Self::Png => "png",
        }
    }
}

/// Parameters for a resize + encode operation.
///
/// `width` and `height` are exact output dimensions: the builder has already
/// preserved the aspect ratio and applied the codec ceiling.
#[derive(Debug, Clone, PartialEq)]
pub struct ResizeParams {
    pub source: PathBuf,
    pub output: PathBuf,
    pub width: u32,
    pub height: u32,
    pub format: OutputFormat,
    pub quality: Quality,
    /// Gaussian blur sigma applied after resizing (placeholders only).
    pub blur_sigma: Option<f32>,
}
