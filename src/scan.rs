//! Source image discovery.
//!
//! Lists the input directory (flat, not recursive) and returns every
//! `.jpg`/`.jpeg`/`.png` file, matched case-insensitively, sorted by file
//! name so each run sees the same order.
//!
//! ```text
//! src/assets/images/
//! ├── dragon.png        → SourceImage { base_name: "dragon", extension: "png" }
//! ├── Lantern.JPG       → SourceImage { base_name: "Lantern", extension: "JPG" }
//! ├── notes.txt         (ignored: not an image)
//! ├── .hero.jpg         (ignored: hidden)
//! ├── caf\xe9.jpg       (skipped with a warning: name is not UTF-8)
//! └── old/              (ignored: subdirectory)
//! ```
//!
//! A missing input directory and an empty one are both errors: the caller
//! has to decide whether "nothing to do" is acceptable.

use crate::imaging::{Dimensions, OutputFormat, supported_input_extensions};
use serde::Serialize;
use std::path::{Path, PathBuf};
use thiserror::Error;
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("Input directory not found: {0}")]
    NotFound(PathBuf),
    #[error("Input path is not a directory: {0}")]
    NotADirectory(PathBuf),
    #[error("No .jpg/.jpeg/.png images found in {0}")]
    NoInput(PathBuf),
    #[error("Failed to list input directory: {0}")]
    Walk(#[from] walkdir::Error),
}

/// A discovered input file.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SourceImage {
    pub path: PathBuf,
    /// File name including extension, e.g. `dragon.png`.
    pub file_name: String,
    /// File name without its extension, e.g. `dragon`.
    pub base_name: String,
    /// Extension as written on disk, e.g. `png` or `JPG`.
    pub extension: String,
    /// Native format implied by the extension.
    #[serde(skip)]
    pub format: OutputFormat,
    /// Pixel dimensions, filled in by probing.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dimensions: Option<Dimensions>,
}

impl SourceImage {
    /// Build a source from a path, or `None` if it is not a supported image name.
    pub fn from_path(path: &Path) -> Option<Self> {
        let file_name = path.file_name()?.to_str()?.to_string();
        if file_name.starts_with('.') {
            return None;
        }
        let extension = path.extension()?.to_str()?.to_string();
        let lower = extension.to_ascii_lowercase();
        if !supported_input_extensions().contains(&lower.as_str()) {
            return None;
        }
        let base_name = path.file_stem()?.to_str()?.to_string();
        if base_name.is_empty() {
            return None;
        }
        Some(Self {
            path: path.to_path_buf(),
            file_name,
            base_name,
            format: OutputFormat::from_extension(&lower)?,
            extension,
            dimensions: None,
        })
    }
}

/// Enumerate the source images in `input_dir`.
pub fn scan(input_dir: &Path) -> Result<Vec<SourceImage>, ScanError> {
    if !input_dir.exists() {
        return Err(ScanError::NotFound(input_dir.to_path_buf()));
    }
    if !input_dir.is_dir() {
        return Err(ScanError::NotADirectory(input_dir.to_path_buf()));
    }

    let mut sources = Vec::new();
    for entry in WalkDir::new(input_dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        if let Some(source) = SourceImage::from_path(entry.path()) {
            sources.push(source);
        } else if has_non_utf8_image_name(entry.path()) {
            // Artifact names are built from the file name as a string.
            tracing::warn!(
                path = %entry.path().display(),
                "skipping image whose file name is not valid UTF-8"
            );
        }
    }

    if sources.is_empty() {
        return Err(ScanError::NoInput(input_dir.to_path_buf()));
    }
    Ok(sources)
}

/// An image extension on a file name that cannot be represented as UTF-8.
fn has_non_utf8_image_name(path: &Path) -> bool {
    let non_utf8 = path.file_name().is_some_and(|n| n.to_str().is_none());
    non_utf8
        && path.extension().is_some_and(|ext| {
            let ext = ext.to_string_lossy().to_ascii_lowercase();
            supported_input_extensions().contains(&ext.as_str())
        })
}
