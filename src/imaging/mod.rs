//! Image processing, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Identify** | `image::image_dimensions` |
//! | **Resize → WebP / JPEG / PNG** | Lanczos3 + the `image` encoders |
//! | **Placeholder** | resize + optional Gaussian blur |
//! | **Original** | byte copy |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension math (unit testable)
//! - **Parameters**: Data structures describing image operations
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
pub mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend};
pub use params::{OutputFormat, Quality, ResizeParams};
pub use rust_backend::{RustBackend, supported_input_extensions};
