//! Artifact file naming: the contract with the front-end.
//!
//! The site's image utilities never ask the pipeline what it produced; they
//! rebuild file names from the source name alone. Every artifact name is
//! therefore derived here and nowhere else:
//!
//! ```text
//! hero.jpg  →  hero-480.webp        sized, WebP
//!              hero-480.jpg         sized, native format
//!              hero-20.webp         placeholder (width convention)
//!              hero-lowres.webp     placeholder (lowres convention)
//!              hero-original.webp   original size, WebP
//!              hero-original.jpg    verbatim copy
//! ```
//!
//! The native extension is reused exactly as written on disk (`.JPG` stays
//! `.JPG`), since consumers split the source name on its dot.

use serde::{Deserialize, Serialize};
use std::fmt;

/// How the blur-up placeholder is named.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlaceholderNaming {
    /// `{name}-{width}.webp`, e.g. `hero-20.webp`.
    #[default]
    Width,
    /// `{name}-lowres.webp`.
    Lowres,
}

/// The part of an artifact name between the base name and the extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SizeTag {
    Pixels(u32),
    Lowres,
    Original,
}

impl SizeTag {
    /// Tag for a placeholder under the given convention.
    pub fn placeholder(width: u32, naming: PlaceholderNaming) -> Self {
        match naming {
            PlaceholderNaming::Width => SizeTag::Pixels(width),
            PlaceholderNaming::Lowres => SizeTag::Lowres,
        }
    }
}

impl fmt::Display for SizeTag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SizeTag::Pixels(w) => write!(f, "{w}"),
            SizeTag::Lowres => f.write_str("lowres"),
            SizeTag::Original => f.write_str("original"),
        }
    }
}

/// Build an artifact file name: `{base}-{tag}.{ext}`.
pub fn artifact_file_name(base: &str, tag: SizeTag, ext: &str) -> String {
    format!("{base}-{tag}.{ext}")
}

/// Split an artifact file name back into `(base, tag, ext)`.
///
/// Inverse of [`artifact_file_name`]. Base names may themselves contain dashes;
/// only the last dash before the extension separates the tag.
pub fn parse_artifact_name(file_name: &str) -> Option<(&str, SizeTag, &str)> {
    let (stem, ext) = file_name.rsplit_once('.')?;
    let (base, tag) = stem.rsplit_once('-')?;
    if base.is_empty() || ext.is_empty() {
        return None;
    }
    let tag = match tag {
        "lowres" => SizeTag::Lowres,
        "original" => SizeTag::Original,
        digits => SizeTag::Pixels(digits.parse().ok().filter(|&w| w > 0)?),
    };
    Some((base, tag, ext))
}

/// Render a `srcset` attribute value the way the front-end builds it.
///
/// ```
/// # use srcset_forge::naming::srcset;
/// assert_eq!(
///     srcset("/assets/images", "hero", "webp", &[480, 768]),
///     "/assets/images/hero-480.webp 480w, /assets/images/hero-768.webp 768w"
/// );
/// ```
pub fn srcset(url_prefix: &str, base: &str, ext: &str, widths: &[u32]) -> String {
    let prefix = url_prefix.trim_end_matches('/');
    widths
        .iter()
        .map(|&w| {
            format!(
                "{prefix}/{} {w}w",
                artifact_file_name(base, SizeTag::Pixels(w), ext)
            )
        })
        .collect::<Vec<_>>()
        .join(", ")
}
