//! Image processing primitives, pure Rust.
//!
//! | Operation | Crate / function |
//! |---|---|
//! | **Decode** | `image::ImageReader` (format sniffed from bytes) |
//! | **Plan** | [`plan_dimensions`], integer math only |
//! | **Rasterize** | `resize_exact` + Lanczos3 |
//! | **Encode** | `image` codecs (JPEG, PNG, WebP, AVIF, TIFF, GIF, BMP) |
//!
//! The module is split into:
//! - **Calculations**: Pure functions for dimension and size-delta math (unit testable)
//! - **Parameters**: Data structures describing what to produce
//! - **Backend**: [`ImageBackend`] trait + [`RustBackend`]

pub mod backend;
mod calculations;
mod params;
pub mod rust_backend;

pub use backend::{BackendError, Dimensions, ImageBackend, Raster};
pub use calculations::{SizeChange, percent_change, plan_dimensions};
pub use params::{CompressionSettings, OutputFormat, Quality, QualityHint, ResizeMode};
pub use rust_backend::{RustBackend, supported_input_extensions};
