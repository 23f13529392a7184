//! Pure Rust image processing backend built on the `image` crate.
//!
//! Everything is statically linked into the binary.
//!
//! ## Crate mapping
//!
//! | Operation | Crate / function |
//! |---|---|
//! | Decode (JPEG, PNG, TIFF, WebP, GIF, BMP) | `image::ImageReader` with format sniffing |
//! | Rasterize | `DynamicImage::resize_exact` with `Lanczos3` filter |
//! | Encode → JPEG | `image::codecs::jpeg::JpegEncoder` (quality-aware) |
//! | Encode → PNG | `image::codecs::png::PngEncoder` (lossless, ignores quality) |
//! | Encode → WebP | `image::codecs::webp::WebPEncoder` (lossless only, ignores quality) |
//! | Encode → TIFF, GIF, BMP | `DynamicImage::write_to` |

use super::backend::{BackendError, Dimensions, ImageBackend, Raster};
use super::params::QualityHint;
use image::imageops::FilterType;
use image::{ColorType, DynamicImage, ImageFormat, ImageReader};
use std::borrow::Cow;
use std::io::Cursor;
use std::sync::LazyLock;

/// Extensions whose decoders are compiled in and known to work.
///
/// AVIF is not listed: decoding it would need `"avif-native"`, a C library we
/// don't link. Every format here is also an output the encoder accepts.
const PHOTO_CANDIDATES: &[(&str, ImageFormat)] = &[
    ("jpg", ImageFormat::Jpeg),
    ("jpeg", ImageFormat::Jpeg),
    ("png", ImageFormat::Png),
    ("tif", ImageFormat::Tiff),
    ("tiff", ImageFormat::Tiff),
    ("webp", ImageFormat::WebP),
    ("gif", ImageFormat::Gif),
    ("bmp", ImageFormat::Bmp),
];

static SUPPORTED_EXTENSIONS: LazyLock<Vec<&'static str>> = LazyLock::new(|| {
    PHOTO_CANDIDATES
        .iter()
        .filter(|(_, fmt)| fmt.reading_enabled())
        .map(|(ext, _)| *ext)
        .collect()
});

/// Returns the set of image file extensions that have working decoders compiled in.
pub fn supported_input_extensions() -> &'static [&'static str] {
    &SUPPORTED_EXTENSIONS
}

/// Pure Rust backend using the `image` crate ecosystem.
///
/// See the [module docs](self) for the crate-to-operation mapping.
pub struct RustBackend;

impl RustBackend {
    pub fn new() -> Self {
        Self
    }
}

impl Default for RustBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Raster for DynamicImage {
    fn dimensions(&self) -> Dimensions {
        Dimensions {
            width: self.width(),
            height: self.height(),
        }
    }
}

/// Encoders below only take 8-bit layouts; widen everything else to RGBA8.
fn to_8bit(img: &DynamicImage) -> Cow<'_, DynamicImage> {
    match img.color() {
        ColorType::L8 | ColorType::La8 | ColorType::Rgb8 | ColorType::Rgba8 => Cow::Borrowed(img),
        _ => Cow::Owned(DynamicImage::ImageRgba8(img.to_rgba8())),
    }
}

fn encode_failed(media_type: &str) -> impl FnOnce(image::ImageError) -> BackendError + '_ {
    move |e| BackendError::Encode {
        media_type: media_type.to_string(),
        reason: e.to_string(),
    }
}

impl ImageBackend for RustBackend {
    type Decoded = DynamicImage;
    type Surface = DynamicImage;

    fn decode(&self, bytes: &[u8]) -> Result<DynamicImage, BackendError> {
        ImageReader::new(Cursor::new(bytes))
            .with_guessed_format()
            .map_err(BackendError::Io)?
            .decode()
            .map_err(|e| BackendError::Decode(e.to_string()))
    }

    fn rasterize(
        &self,
        raster: &DynamicImage,
        width: u32,
        height: u32,
    ) -> Result<DynamicImage, BackendError> {
        if width == 0 || height == 0 {
            return Err(BackendError::Rasterize {
                width,
                height,
                reason: "target has no pixels".into(),
            });
        }
        Ok(raster.resize_exact(width, height, FilterType::Lanczos3))
    }

    fn encode(
        &self,
        surface: &DynamicImage,
        media_type: &str,
        quality: QualityHint,
    ) -> Result<Vec<u8>, BackendError> {
        let mut buf = Cursor::new(Vec::new());

        match media_type {
            "image/jpeg" | "image/jpg" => {
                // JPEG has no alpha channel
                let rgb = DynamicImage::ImageRgb8(surface.to_rgb8());
                let encoder = image::codecs::jpeg::JpegEncoder::new_with_quality(
                    &mut buf,
                    quality.as_percent(),
                );
                rgb.write_with_encoder(encoder)
                    .map_err(encode_failed(media_type))?;
            }
            "image/png" => {
                let encoder = image::codecs::png::PngEncoder::new(&mut buf);
                to_8bit(surface)
                    .write_with_encoder(encoder)
                    .map_err(encode_failed(media_type))?;
            }
            "image/webp" => {
                let rgba = DynamicImage::ImageRgba8(surface.to_rgba8());
                let encoder = image::codecs::webp::WebPEncoder::new_lossless(&mut buf);
                rgba.write_with_encoder(encoder)
                    .map_err(encode_failed(media_type))?;
            }
            "image/tiff" => to_8bit(surface)
                .write_to(&mut buf, ImageFormat::Tiff)
                .map_err(encode_failed(media_type))?,
            "image/gif" => DynamicImage::ImageRgba8(surface.to_rgba8())
                .write_to(&mut buf, ImageFormat::Gif)
                .map_err(encode_failed(media_type))?,
            "image/bmp" => DynamicImage::ImageRgba8(surface.to_rgba8())
                .write_to(&mut buf, ImageFormat::Bmp)
                .map_err(encode_failed(media_type))?,
            other => return Err(BackendError::UnsupportedMediaType(other.to_string())),
        }

        Ok(buf.into_inner())
    }
}
