//! Pipeline configuration.
//!
//! Handles loading, validating and defaulting `srcset-forge.toml`. Every
//! value has a default matching the constants the site's build has always
//! used, so running with no config file at all reproduces the stock build.
//!
//! ## Configuration Options
//!
//! ```toml
//! # All options are optional - defaults shown below
//!
//! input_dir = "src/assets/images"   # Flat directory of .jpg/.jpeg/.png sources
//! clear_output = true               # Wipe each output root before writing
//! write_manifest = false            # Write images.json into each output root
//!
//! [[outputs]]                       # One or more output roots
//! tag = "dist"
//! dir = "dist/assets/images"
//!
//! [images]
//! sizes = [480, 768, 1024, 1440, 1920, 3840]
//! high_density = false              # Also emit 960, 1536, 2048, 2880
//! quality = 82                      # JPEG quality (1-100)
//! webp = true                       # {name}-{width}.webp
//! native = true                     # {name}-{width}.{ext}
//!
//! [placeholder]
//! enabled = true
//! width = 20
//! naming = "width"                  # "width" → {name}-20.webp, "lowres" → {name}-lowres.webp
//! blur_sigma = 0.0                  # 0 disables the blur pass
//!
//! [original]
//! webp = true                       # {name}-original.webp
//! copy = true                       # {name}-original.{ext}
//!
//! [processing]
//! concurrency = 8                   # Max artifacts encoded at once
//! ```
//!
//! Unknown keys are rejected to catch typos early.

use crate::naming::PlaceholderNaming;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Widths added by `images.high_density` for 2×/3× displays.
pub const HIGH_DENSITY_SIZES: &[u32] = &[960, 1536, 2048, 2880];

/// Config file looked up when `--config` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "srcset-forge.toml";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("TOML serialize error: {0}")]
    TomlSer(#[from] toml::ser::Error),
    #[error("Config validation error: {0}")]
    Validation(String),
}

/// Pipeline configuration loaded from `srcset-forge.toml`.
///
/// All fields have defaults; a config file only needs the values it changes.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PipelineConfig {
    /// Directory holding the source images (not searched recursively).
    pub input_dir: PathBuf,
    /// Output roots receiving every artifact.
    pub outputs: Vec<OutputRoot>,
    /// Delete and recreate each output root before writing.
    pub clear_output: bool,
    /// Write an `images.json` listing produced artifacts into each root.
    pub write_manifest: bool,
    pub images: ImagesConfig,
    pub placeholder: PlaceholderConfig,
    pub original: OriginalConfig,
    pub processing: ProcessingConfig,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            input_dir: PathBuf::from("src/assets/images"),
            outputs: vec![OutputRoot::new("dist", "dist/assets/images")],
            clear_output: true,
            write_manifest: false,
            images: ImagesConfig::default(),
            placeholder: PlaceholderConfig::default(),
            original: OriginalConfig::default(),
            processing: ProcessingConfig::default(),
        }
    }
}

/// A named output directory.
///
/// The tag distinguishes roots in logs and in the plan (e.g. `"public"` for the
/// dev server's static folder, `"dist"` for the production bundle).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OutputRoot {
    pub tag: String,
    pub dir: PathBuf,
}

impl OutputRoot {
    pub fn new(tag: impl Into<String>, dir: impl Into<PathBuf>) -> Self {
        Self {
            tag: tag.into(),
            dir: dir.into(),
        }
    }
}

/// Responsive width settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ImagesConfig {
    /// Target pixel widths.
    pub sizes: Vec<u32>,
    /// Add the 2×/3× density widths from [`HIGH_DENSITY_SIZES`].
    pub high_density: bool,
    /// JPEG encoding quality (1 = worst, 100 = best). WebP output is lossless.
    pub quality: u32,
    /// Emit `{name}-{width}.webp` per width.
    pub webp: bool,
    /// Emit `{name}-{width}.{ext}` in the source's own format per width.
    pub native: bool,
}

impl Default for ImagesConfig {
    fn default() -> Self {
        Self {
            sizes: vec![480, 768, 1024, 1440, 1920, 3840],
            high_density: false,
            quality: 82,
            webp: true,
            native: true,
        }
    }
}

/// Low-resolution blur-up placeholder settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct PlaceholderConfig {
    pub enabled: bool,
    /// Placeholder width in pixels; must be below every responsive width.
    pub width: u32,
    pub naming: PlaceholderNaming,
    /// Gaussian blur sigma; `0.0` skips the blur pass.
    pub blur_sigma: f32,
}

impl Default for PlaceholderConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            width: 20,
            naming: PlaceholderNaming::Width,
            blur_sigma: 0.0,
        }
    }
}

/// Full-size artifact settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct OriginalConfig {
    /// Emit `{name}-original.webp` at the source's own size.
    pub webp: bool,
    /// Emit `{name}-original.{ext}`, a byte copy of the source.
    pub copy: bool,
}

impl Default for OriginalConfig {
    fn default() -> Self {
        Self {
            webp: true,
            copy: true,
        }
    }
}

/// Parallel processing settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProcessingConfig {
    /// Maximum number of artifacts produced at the same time.
    pub concurrency: usize,
}

impl Default for ProcessingConfig {
    fn default() -> Self {
        Self { concurrency: 8 }
    }
}

impl PipelineConfig {
    /// Validate config values are within acceptable ranges.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let invalid = |msg: String| Err(ConfigError::Validation(msg));

        if self.images.sizes.is_empty() {
            return invalid("images.sizes must not be empty".into());
        }
        if self.images.sizes.contains(&0) {
            return invalid("images.sizes must be positive".into());
        }
        if !(1..=100).contains(&self.images.quality) {
            return invalid("images.quality must be 1-100".into());
        }
        if self.processing.concurrency == 0 {
            return invalid("processing.concurrency must be at least 1".into());
        }
        if self.placeholder.enabled {
            let smallest = self.resolution_matrix()[0];
            if self.placeholder.width == 0 || self.placeholder.width >= smallest {
                return invalid(format!(
                    "placeholder.width must be between 1 and {} (smaller than every size)",
                    smallest - 1
                ));
            }
            if !self.placeholder.blur_sigma.is_finite() || self.placeholder.blur_sigma < 0.0 {
                return invalid("placeholder.blur_sigma must be zero or positive".into());
            }
        }
        if !(self.images.webp
            || self.images.native
            || self.placeholder.enabled
            || self.original.webp
            || self.original.copy)
        {
            return invalid("no artifact kinds enabled".into());
        }
        if self.outputs.is_empty() {
            return invalid("at least one output root is required".into());
        }
        for (i, root) in self.outputs.iter().enumerate() {
            if root.tag.is_empty() {
                return invalid("outputs.tag must not be empty".into());
            }
            if self.outputs[..i].iter().any(|r| r.tag == root.tag) {
                return invalid(format!("duplicate output tag '{}'", root.tag));
            }
            if self.outputs[..i].iter().any(|r| r.dir == root.dir) {
                return invalid(format!("duplicate output dir '{}'", root.dir.display()));
            }
            // Clearing an output that contains the sources would delete them.
            if self.input_dir.starts_with(&root.dir) {
                return invalid(format!(
                    "output '{}' contains the input directory '{}'",
                    root.dir.display(),
                    self.input_dir.display()
                ));
            }
        }
        Ok(())
    }

    /// The configured widths plus density extras, deduplicated and ascending.
    pub fn resolution_matrix(&self) -> Vec<u32> {
        let mut sizes = self.images.sizes.clone();
        if self.images.high_density {
            sizes.extend_from_slice(HIGH_DENSITY_SIZES);
        }
        sizes.sort_unstable();
        sizes.dedup();
        sizes
    }

    /// Blur sigma for the placeholder pass, `None` when disabled.
    pub fn placeholder_blur(&self) -> Option<f32> {
        (self.placeholder.blur_sigma > 0.0).then_some(self.placeholder.blur_sigma)
    }
}

// =============================================================================
// Config loading
// =============================================================================

/// Returns the stock default config as a `toml::Value::Table`.
///
/// Base layer that user overrides are merged on top of.
pub fn stock_defaults_value() -> Result<toml::Value, ConfigError> {
    Ok(toml::Value::try_from(PipelineConfig::default())?)
}

/// Recursively merge `overlay` on top of `base`.
///
/// - Tables are merged key-by-key (overlay keys override base keys).
/// - Non-table values in overlay (arrays included) replace base values entirely.
/// - Keys in base that are not in overlay are preserved.
pub fn merge_toml(base: toml::Value, overlay: toml::Value) -> toml::Value {
    match (base, overlay) {
        (toml::Value::Table(mut base_table), toml::Value::Table(overlay_table)) => {
            for (key, overlay_val) in overlay_table {
                let merged = match base_table.remove(&key) {
                    Some(base_val) => merge_toml(base_val, overlay_val),
                    None => overlay_val,
                };
                base_table.insert(key, merged);
            }
            toml::Value::Table(base_table)
        }
        (_, overlay) => overlay,
    }
}

/// Load a config file as a raw TOML value.
///
/// Returns `Ok(None)` if the file does not exist.
pub fn load_raw_config(path: &Path) -> Result<Option<toml::Value>, ConfigError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = fs::read_to_string(path)?;
    let value: toml::Value = toml::from_str(&content)?;
    Ok(Some(value))
}

/// Load config from `path`, falling back to stock defaults when it is absent.
///
/// User values are merged on top of the defaults, unknown keys are rejected,
/// and the result is validated.
pub fn load_config(path: &Path) -> Result<PipelineConfig, ConfigError> {
    let base = stock_defaults_value()?;
    let merged = match load_raw_config(path)? {
        Some(overlay) => merge_toml(base, overlay),
        None => base,
    };
    let config: PipelineConfig = merged.try_into()?;
    config.validate()?;
    Ok(config)
}

/// Returns a fully-commented stock config file.
///
/// Used by the `gen-config` CLI command.
pub fn stock_config_toml() -> &'static str {
    r##"# srcset-forge configuration
# ==========================
#
# Every key is optional. The values below are the built-in defaults.

# Flat directory of source images. Only .jpg, .jpeg and .png files
# (any letter case) are picked up; subdirectories are ignored.
input_dir = "src/assets/images"

# Delete and recreate every output root before writing, so artifacts
# of removed sources never linger.
clear_output = true

# Write an images.json manifest (file, width, height, format per
# artifact) into each output root.
write_manifest = false

# Output roots. Repeat the block to write the same artifacts to several
# trees, e.g. the dev server's public/ folder and the production dist/.
[[outputs]]
tag = "dist"
dir = "dist/assets/images"

[images]
# Target widths in pixels. Sources smaller than a width are enlarged.
sizes = [480, 768, 1024, 1440, 1920, 3840]
# Also emit 960, 1536, 2048 and 2880 for 2x/3x pixel densities.
high_density = false
# JPEG quality for native-format output (1-100). WebP is lossless.
quality = 82
# {name}-{width}.webp
webp = true
# {name}-{width}.{ext}, in the source's own format
native = true

[placeholder]
# Tiny blur-up image shown while the real one loads.
enabled = true
# Must be smaller than every entry in images.sizes.
width = 20
# "width"  -> {name}-20.webp
# "lowres" -> {name}-lowres.webp
naming = "width"
# Gaussian blur sigma applied after resizing; 0 disables it.
blur_sigma = 0.0

[original]
# {name}-original.webp at the source's own size
webp = true
# {name}-original.{ext}, a byte copy of the source
copy = true

[processing]
# Maximum number of artifacts decoded/encoded at the same time.
concurrency = 8
"##
}
