//! Image processing backend trait and shared types.
//!
//! The [`ImageBackend`] trait defines the three primitives the transcode
//! pipeline consumes: decode, rasterize, and encode. Each stage returns a
//! value the next stage takes by reference, so the pipeline reads as a plain
//! sequence of calls.
//!
//! The production implementation is
//! [`RustBackend`](super::rust_backend::RustBackend), which is pure Rust and
//! built on the `image` crate. Tests use the recording `MockBackend` defined
//! in this module's test section.

use super::params::QualityHint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BackendError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Decode failed: {0}")]
    Decode(String),
    #[error("Cannot rasterize to {width}x{height}: {reason}")]
    Rasterize {
        width: u32,
        height: u32,
        reason: String,
    },
    #[error("Unsupported output media type: {0}")]
    UnsupportedMediaType(String),
    #[error("Encode to {media_type} failed: {reason}")]
    Encode { media_type: String, reason: String },
}

impl BackendError {
    /// True for failures that happen before any pixels are produced.
    pub fn is_decode(&self) -> bool {
        matches!(self, BackendError::Decode(_) | BackendError::Io(_))
    }

    /// True for failures while producing the output bytes.
    pub fn is_encode(&self) -> bool {
        matches!(
            self,
            BackendError::Encode { .. } | BackendError::UnsupportedMediaType(_)
        )
    }

    /// Pipeline stage the failure belongs to, for log fields.
    pub fn stage(&self) -> &'static str {
        if self.is_decode() {
            "decode"
        } else if self.is_encode() {
            "encode"
        } else {
            "rasterize"
        }
    }
}

/// Pixel dimensions of a raster or surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub fn as_tuple(self) -> (u32, u32) {
        (self.width, self.height)
    }
}

impl From<(u32, u32)> for Dimensions {
    fn from((width, height): (u32, u32)) -> Self {
        Self { width, height }
    }
}

/// A decoded pixel grid with known intrinsic dimensions.
pub trait Raster {
    fn dimensions(&self) -> Dimensions;
}

/// Trait for image processing backends.
///
/// `Decoded` is what `decode` hands back; `Surface` is the resampled buffer
/// ready for encoding. Both stay inside one item's transcode, so they need not
/// be shared across threads; the backend itself must be `Sync` for parallel runs.
pub trait ImageBackend: Sync {
    type Decoded: Raster;
    type Surface;

    /// Decode raw file bytes into a raster.
    fn decode(&self, bytes: &[u8]) -> Result<Self::Decoded, BackendError>;

    /// Resample a raster into a surface of exactly `width` x `height`.
    fn rasterize(
        &self,
        raster: &Self::Decoded,
        width: u32,
        height: u32,
    ) -> Result<Self::Surface, BackendError>;

    /// Encode a surface as `media_type`. Lossless encoders may ignore `quality`.
    fn encode(
        &self,
        surface: &Self::Surface,
        media_type: &str,
        quality: QualityHint,
    ) -> Result<Vec<u8>, BackendError>;
}

#[cfg(test)]
pub mod tests {
    use super::*;
    use crate::imaging::Quality;
    use std::sync::Mutex;

    /// Mock backend that records operations without touching pixels.
    ///
    /// Input bytes are ASCII `"WxH"`; anything else fails to decode. Encoded
    /// output is `max(1, w * h * quality% / 100)` zero bytes, so tests can
    /// predict sizes. Uses Mutex (not RefCell) so it is Sync and works with
    /// rayon's par_iter.
    pub struct MockBackend {
        pub operations: Mutex<Vec<RecordedOp>>,
        pub supported: Vec<&'static str>,
    }

    #[derive(Debug, Clone, PartialEq)]
    pub enum RecordedOp {
        Decode(String),
        Rasterize {
            width: u32,
            height: u32,
        },
        Encode {
            media_type: String,
            width: u32,
            height: u32,
            quality: u8,
        },
    }

    #[derive(Debug, Clone, Copy)]
    pub struct MockRaster(pub Dimensions);

    impl Raster for MockRaster {
        fn dimensions(&self) -> Dimensions {
            self.0
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self {
                operations: Mutex::new(Vec::new()),
                supported: vec!["image/jpeg", "image/png", "image/webp"],
            }
        }
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn get_operations(&self) -> Vec<RecordedOp> {
            self.operations.lock().unwrap().clone()
        }

        /// Bytes the mock decodes as a `width` x `height` image.
        pub fn image_bytes(width: u32, height: u32) -> Vec<u8> {
            format!("{width}x{height}").into_bytes()
        }

        /// Size the mock produces for a surface at the given quality.
        pub fn encoded_len(width: u32, height: u32, quality: u8) -> usize {
            (width as usize * height as usize * quality as usize / 100).max(1)
        }
    }

    fn parse_dims(bytes: &[u8]) -> Option<Dimensions> {
        let text = std::str::from_utf8(bytes).ok()?;
        let (w, h) = text.trim().split_once('x')?;
        Some(Dimensions {
            width: w.parse().ok()?,
            height: h.parse().ok()?,
        })
    }

    impl ImageBackend for MockBackend {
        type Decoded = MockRaster;
        type Surface = Dimensions;

        fn decode(&self, bytes: &[u8]) -> Result<MockRaster, BackendError> {
            let text = String::from_utf8_lossy(bytes).to_string();
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Decode(text.clone()));
            parse_dims(bytes)
                .map(MockRaster)
                .ok_or_else(|| BackendError::Decode(format!("not a mock image: {text:?}")))
        }

        fn rasterize(
            &self,
            _raster: &MockRaster,
            width: u32,
            height: u32,
        ) -> Result<Dimensions, BackendError> {
            self.operations
                .lock()
                .unwrap()
                .push(RecordedOp::Rasterize { width, height });
            if width == 0 || height == 0 {
                return Err(BackendError::Rasterize {
                    width,
                    height,
                    reason: "empty surface".into(),
                });
            }
            Ok(Dimensions { width, height })
        }

        fn encode(
            &self,
            surface: &Dimensions,
            media_type: &str,
            quality: QualityHint,
        ) -> Result<Vec<u8>, BackendError> {
            let quality = quality.as_percent();
            self.operations.lock().unwrap().push(RecordedOp::Encode {
                media_type: media_type.to_string(),
                width: surface.width,
                height: surface.height,
                quality,
            });
            if !self.supported.iter().any(|t| *t == media_type) {
                return Err(BackendError::UnsupportedMediaType(media_type.to_string()));
            }
            Ok(vec![
                0;
                Self::encoded_len(surface.width, surface.height, quality)
            ])
        }
    }

    #[test]
    fn mock_decodes_dimension_text() {
        let backend = MockBackend::new();
        let raster = backend.decode(&MockBackend::image_bytes(800, 600)).unwrap();
        assert_eq!(raster.dimensions(), Dimensions { width: 800, height: 600 });

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 1);
        assert!(matches!(&ops[0], RecordedOp::Decode(t) if t == "800x600"));
    }

    #[test]
    fn mock_rejects_garbage() {
        let backend = MockBackend::new();
        let err = backend.decode(b"\x89PNG garbage").unwrap_err();
        assert!(err.is_decode());
    }

    #[test]
    fn mock_records_encode() {
        let backend = MockBackend::new();
        let surface = backend
            .rasterize(&MockRaster((100, 50).into()), 10, 10)
            .unwrap();
        let bytes = backend
            .encode(&surface, "image/jpeg", Quality::new(50).hint())
            .unwrap();
        assert_eq!(bytes.len(), 50);

        let ops = backend.get_operations();
        assert_eq!(ops.len(), 2);
        assert!(matches!(
            &ops[1],
            RecordedOp::Encode {
                width: 10,
                height: 10,
                quality: 50,
                ..
            }
        ));
    }

    #[test]
    fn mock_unsupported_media_type_is_encode_error() {
        let backend = MockBackend::new();
        let err = backend
            .encode(
                &Dimensions {
                    width: 1,
                    height: 1,
                },
                "image/gif",
                Quality::default().hint(),
            )
            .unwrap_err();
        assert!(err.is_encode());
    }

    #[test]
    fn errors_name_their_stage() {
        assert_eq!(BackendError::Decode("bad".into()).stage(), "decode");
        let io = std::io::Error::new(std::io::ErrorKind::UnexpectedEof, "short");
        assert_eq!(BackendError::from(io).stage(), "decode");
        let zero = BackendError::Rasterize {
            width: 0,
            height: 1,
            reason: "empty".into(),
        };
        assert_eq!(zero.stage(), "rasterize");
        assert_eq!(
            BackendError::UnsupportedMediaType("image/x".into()).stage(),
            "encode"
        );
    }

    #[test]
    fn mock_zero_surface_is_rasterize_error() {
        let backend = MockBackend::new();
        let err = backend
            .rasterize(&MockRaster((1, 1).into()), 0, 0)
            .unwrap_err();
        assert!(matches!(err, BackendError::Rasterize { width: 0, .. }));
    }
}
