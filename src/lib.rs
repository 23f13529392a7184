//! # imgsquash
//!
//! Batch image compression: pick files, choose quality, resize mode and output
//! format, and get compressed copies together with before/after statistics.
//!
//! # Architecture: Select, Run, Download
//!
//! ```text
//! 1. Select    paths     →  candidates  →  inputs    (validate type and size)
//! 2. Run       inputs    →  results                  (decode → plan → rasterize → encode)
//! 3. Download  results   →  <name>_compressed.<ext>  (plus optional JSON report)
//! ```
//!
//! A [`session::Session`] owns the inputs and results between these steps.
//! The pipeline itself is a set of free functions over an
//! [`imaging::ImageBackend`], so tests drive it with a recording mock and
//! never touch pixels.
//!
//! # Module Map
//!
//! | Module | Role |
//! |--------|------|
//! | [`imaging`] | Dimension planning, compression parameters, and the `image`-crate backend |
//! | [`pipeline`] | Per-image transcode and batch orchestration (sequential or on a rayon pool) |
//! | [`session`] | Owner of the selected inputs and their results; select, run, download, reset |
//! | [`inputs`] | Expanding command-line paths into candidates with declared media types |
//! | [`validation`] | Per-file acceptance rules: image type, size limit |
//! | [`config`] | Layered `imgsquash.toml` loading, merging, and validation |
//! | [`naming`] | Output filename derivation |
//! | [`report`] | Batch totals and the JSON report |
//! | [`output`] | CLI output formatting: progress, result cards, notices |
//! | [`types`] | `InputImage` and `CompressedResult` |
//!
//! # Design Decisions
//!
//! ## Sequential by Default
//!
//! A batch runs one image at a time unless `parallel` is enabled. The progress
//! counter then rises by exactly one per image and only one decoded raster is
//! in memory at a time. Parallel runs use a bounded rayon pool and collect
//! results by index, so the output order never depends on scheduling.
//!
//! ## Abort or Skip
//!
//! By default one failing image aborts the whole batch and nothing from that
//! run is written. With `on_error = "skip"` failures are reported and the
//! remaining images are still compressed.
//!
//! ## Integer Planning
//!
//! [`imaging::plan_dimensions`] uses integer arithmetic, so `half` and
//! `three-quarters` floor exactly and aspect-ratio math never drifts. The
//! planner accepts degenerate results (a 1px image halves to 0px); the
//! rasterizer is what rejects them.
//!
//! ## Pure-Rust Imaging
//!
//! Decoding, Lanczos3 resampling, and every encoder come from the `image`
//! crate. No system libraries, so the binary runs anywhere it builds.

pub mod config;
pub mod imaging;
pub mod inputs;
pub mod naming;
pub mod output;
pub mod pipeline;
pub mod report;
pub mod session;
pub mod types;
pub mod validation;
