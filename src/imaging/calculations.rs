//! Pure calculation functions for artifact dimensions.
//!
//! All functions here are pure and testable without any I/O or images.

/// Largest width or height the WebP encoder accepts.
pub const CODEC_CEILING: u32 = 16383;

/// Uniform downscale factor needed to bring `dims` inside `ceiling`.
///
/// Returns `None` when both axes already fit, otherwise
/// `min(ceiling / width, ceiling / height)`.
pub fn ceiling_scale(dims: (u32, u32), ceiling: u32) -> Option<f64> {
    let (w, h) = dims;
    if w <= ceiling && h <= ceiling {
        return None;
    }
    let c = ceiling as f64;
    Some((c / w as f64).min(c / h as f64))
}

/// Scale `dims` down uniformly so neither axis exceeds `ceiling`.
///
/// The longer axis lands exactly on the ceiling; the shorter one is rounded
/// and never drops below 1px. Dimensions already inside the ceiling are
/// returned unchanged.
///
/// ```
/// # use srcset_forge::imaging::calculations::clamp_to_ceiling;
/// assert_eq!(clamp_to_ceiling((20000, 8000), 16383), (16383, 6553));
/// assert_eq!(clamp_to_ceiling((800, 600), 16383), (800, 600));
/// ```
pub fn clamp_to_ceiling(dims: (u32, u32), ceiling: u32) -> (u32, u32) {
    let (w, h) = dims;
    if ceiling_scale(dims, ceiling).is_none() {
        return dims;
    }
    if w >= h {
        let scaled_h = (h as f64 * ceiling as f64 / w as f64).round() as u32;
        (ceiling, scaled_h.clamp(1, ceiling))
    } else {
        let scaled_w = (w as f64 * ceiling as f64 / h as f64).round() as u32;
        (scaled_w.clamp(1, ceiling), ceiling)
    }
}

/// Dimensions of an artifact resized to `target_width`, preserving aspect ratio.
///
/// `source` must already be clamped to the ceiling. The requested width is
/// honoured even when it exceeds the source (upscaling), unless the resulting
/// height would break the ceiling, in which case the whole artifact is scaled
/// down again.
///
/// ```
/// # use srcset_forge::imaging::calculations::fit_width;
/// assert_eq!(fit_width((800, 600), 480, 16383), (480, 360));
/// assert_eq!(fit_width((100, 20000), 3840, 16383), (82, 16383));
/// ```
pub fn fit_width(source: (u32, u32), target_width: u32, ceiling: u32) -> (u32, u32) {
    let (w, h) = source;
    let height = (h as f64 * target_width as f64 / w as f64).round().max(1.0) as u32;
    clamp_to_ceiling((target_width, height), ceiling)
}
