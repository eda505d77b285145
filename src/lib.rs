//! # srcset-forge
//!
//! A batch generator for responsive-image derivatives. Point it at a flat
//! directory of JPEG/PNG sources and it writes, for every source, resized
//! copies at each configured width in WebP and in the source's own format, a
//! tiny WebP placeholder for blur-up loading, and full-size originals.
//!
//! # Architecture: One Pass, Four Steps
//!
//! ```text
//! 1. Scan      src/assets/images/  →  Vec<SourceImage>   (flat listing, sorted)
//! 2. Plan      sources × widths    →  Vec<OutputSpec>    (identify + fan-out)
//! 3. Execute   specs               →  files on disk      (bounded rayon pool)
//! 4. Report    outcomes            →  RunSummary         (+ optional images.json)
//! ```
//!
//! Planning is separated from execution so the full artifact list can be
//! inspected (`srcset-forge plan`) and tested without encoding a single
//! pixel. Execution isolates every artifact: a corrupt source or a failed
//! encode is reported and counted, the rest of the run carries on.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`config`] | `srcset-forge.toml` loading, defaults, validation |
//! | [`scan`] | Source discovery in the input directory |
//! | [`plan`] | Artifact list: sizes, formats, codec ceiling clamp |
//! | [`executor`] | Bounded worker pool with per-task failure isolation |
//! | [`process`] | Orchestrator: clear outputs, scan, plan, execute, summarise |
//! | [`naming`] | `{name}-{size}.{ext}` convention shared with the front end |
//! | [`imaging`] | Pure-Rust decode / resize / encode backend |
//! | [`fsutil`] | Output directory reset and byte copies |
//! | [`output`] | CLI progress and summary formatting |
//! | [`logging`] | `tracing` subscriber setup |
//!
//! # Design Decisions
//!
//! ## Filenames Are the Interface
//!
//! The front end builds `srcset` strings and placeholder URLs from the source
//! name alone, so the output names are a contract. All of them come from
//! [`naming::artifact_file_name`]; nothing else formats an artifact path.
//!
//! ## Codec Ceiling
//!
//! WebP cannot encode an image wider or taller than 16383 px. Sources beyond
//! that are scaled down uniformly before any width is applied, so every
//! artifact of a giant panorama still gets written, just smaller than
//! requested.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling and encoding all come from the `image`
//! crate. No system libraries, no ImageMagick, nothing to install.

pub mod config;
pub mod executor;
pub mod fsutil;
pub mod imaging;
pub mod logging;
pub mod naming;
pub mod output;
pub mod plan;
pub mod process;
pub mod scan;

#[cfg(test)]
pub(crate) mod test_helpers;
