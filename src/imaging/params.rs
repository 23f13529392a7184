//! Parameter types for image operations.
//!
//! These types describe *what* to do, not *how* to do it. They are the
//! interface between the [`pipeline`](crate::pipeline) (which decides what each
//! output should look like) and the [`backend`](super::backend) (which does the
//! actual pixel work). Keeping them separate lets tests swap in a mock backend
//! without touching planning logic.
//!
//! ## Types
//!
//! - [`Quality`]: lossy encoding quality (1–100, default 80). Clamped on construction.
//! - [`QualityHint`]: the normalized `[0, 1]` form handed to encoders.
//! - [`ResizeMode`]: named policy for target-dimension computation.
//! - [`OutputFormat`]: requested output media type, or "keep the input's".
//! - [`CompressionSettings`]: the snapshot captured once per batch run.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Quality setting for lossy image encoding (1-100).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Quality(u32);

impl Quality {
    pub fn new(value: u32) -> Self {
        Self(value.clamp(1, 100))
    }

    pub fn value(self) -> u32 {
        self.0
    }

    /// Normalized encoder hint: `quality / 100`.
    pub fn hint(self) -> QualityHint {
        QualityHint::new(self.0 as f32 / 100.0)
    }
}

impl Default for Quality {
    fn default() -> Self {
        Self(80)
    }
}

impl TryFrom<u32> for Quality {
    type Error = String;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        if (1..=100).contains(&value) {
            Ok(Self(value))
        } else {
            Err(format!("quality must be 1-100, got {value}"))
        }
    }
}

impl From<Quality> for u32 {
    fn from(q: Quality) -> Self {
        q.0
    }
}

/// Encoder quality hint in `[0, 1]`. Lossless encoders ignore it.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QualityHint(f32);

impl QualityHint {
    pub fn new(value: f32) -> Self {
        Self(value.clamp(0.0, 1.0))
    }

    pub fn value(self) -> f32 {
        self.0
    }

    /// Scale back to the 1–100 range most encoders expect.
    pub fn as_percent(self) -> u8 {
        (self.0 * 100.0).round().clamp(1.0, 100.0) as u8
    }
}

/// How target dimensions are derived from the source dimensions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum ResizeMode {
    #[default]
    Original,
    #[serde(alias = "50")]
    #[value(alias = "50")]
    Half,
    #[serde(alias = "75")]
    #[value(alias = "75")]
    ThreeQuarters,
    Custom,
}

impl fmt::Display for ResizeMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ResizeMode::Original => "original",
            ResizeMode::Half => "half",
            ResizeMode::ThreeQuarters => "three-quarters",
            ResizeMode::Custom => "custom",
        };
        f.write_str(s)
    }
}

/// Requested output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum OutputFormat {
    /// Keep the input's declared media type.
    #[default]
    Original,
    Jpeg,
    Png,
    Webp,
}

impl OutputFormat {
    /// Resolve to a concrete media type, falling back to the input's own.
    pub fn resolve<'a>(self, original: &'a str) -> &'a str {
        match self {
            OutputFormat::Original => original,
            OutputFormat::Jpeg => "image/jpeg",
            OutputFormat::Png => "image/png",
            OutputFormat::Webp => "image/webp",
        }
    }
}

impl fmt::Display for OutputFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            OutputFormat::Original => "original",
            OutputFormat::Jpeg => "jpeg",
            OutputFormat::Png => "png",
            OutputFormat::Webp => "webp",
        };
        f.write_str(s)
    }
}

/// Settings captured once per batch run.
///
/// `width`/`height` only matter when `resize` is [`ResizeMode::Custom`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompressionSettings {
    pub quality: Quality,
    pub resize: ResizeMode,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub width: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub height: Option<u32>,
    pub format: OutputFormat,
}
