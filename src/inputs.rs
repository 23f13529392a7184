//! Turning command-line paths into selection candidates.
//!
//! A path may name a file or a directory. Files are always candidates, so a
//! stray `notes.txt` is reported as "not an image" instead of silently
//! ignored. Directories are walked recursively and only files with a
//! decodable image extension are picked up, in file-name order.
//!
//! The declared media type comes from the extension alone, never from the
//! content, the same way a browser fills in `File.type`. Sniffing happens
//! later, in the decoder.
//!
//! Candidates carry their size up front so oversized files are rejected
//! without reading them.

use crate::imaging::supported_input_extensions;
use crate::types::InputImage;
use crate::validation::ValidationError;
use image::ImageFormat;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Where a candidate's bytes come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Content {
    File(PathBuf),
    Bytes(Vec<u8>),
}

/// A file offered for selection, not yet validated or read.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub name: String,
    pub media_type: String,
    pub size: u64,
    pub content: Content,
}

impl Candidate {
    /// An in-memory candidate.
    pub fn from_bytes(
        name: impl Into<String>,
        media_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            size: bytes.len() as u64,
            content: Content::Bytes(bytes),
        }
    }

    /// A file on disk. Only metadata is read here.
    pub fn from_path(path: &Path) -> std::io::Result<Self> {
        let size = fs::metadata(path)?.len();
        Ok(Self {
            name: display_name(path),
            media_type: media_type_for_path(path).to_string(),
            size,
            content: Content::File(path.to_path_buf()),
        })
    }

    /// Load the bytes into an [`InputImage`].
    pub fn read(self) -> Result<InputImage, ValidationError> {
        let bytes = match self.content {
            Content::Bytes(bytes) => bytes,
            Content::File(path) => fs::read(&path).map_err(|e| ValidationError::Unreadable {
                name: self.name.clone(),
                reason: e.to_string(),
            })?,
        };
        Ok(InputImage::new(self.name, self.media_type, bytes))
    }
}

/// Declared media type for a path, from its extension.
pub fn media_type_for_path(path: &Path) -> &'static str {
    if let Ok(format) = ImageFormat::from_path(path) {
        return format.to_mime_type();
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase());
    match ext.as_deref() {
        Some("txt") => "text/plain",
        Some("md") => "text/markdown",
        _ => "application/octet-stream",
    }
}

fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

fn has_supported_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| {
            supported_input_extensions()
                .iter()
                .any(|supported| supported.eq_ignore_ascii_case(e))
        })
        .unwrap_or(false)
}

/// Expand paths into candidates, in argument order.
///
/// Paths that cannot be inspected come back as [`ValidationError::Unreadable`]
/// so the caller can report them next to other rejections.
pub fn collect_candidates(paths: &[PathBuf]) -> (Vec<Candidate>, Vec<ValidationError>) {
    let mut candidates = Vec::new();
    let mut unreadable = Vec::new();

    let mut push = |path: &Path| match Candidate::from_path(path) {
        Ok(c) => candidates.push(c),
        Err(e) => unreadable.push(ValidationError::Unreadable {
            name: display_name(path),
            reason: e.to_string(),
        }),
    };

    for path in paths {
        if path.is_dir() {
            for entry in WalkDir::new(path)
                .follow_links(true)
                .sort_by_file_name()
                .into_iter()
                .filter_map(|e| e.ok())
            {
                let entry_path = entry.path();
                if entry_path.is_file() && has_supported_extension(entry_path) {
                    push(entry_path);
                }
            }
        } else {
            push(path);
        }
    }

    (candidates, unreadable)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn media_type_from_extension() {
        assert_eq!(media_type_for_path(Path::new("a.jpg")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("a.JPEG")), "image/jpeg");
        assert_eq!(media_type_for_path(Path::new("a.png")), "image/png");
        assert_eq!(media_type_for_path(Path::new("a.webp")), "image/webp");
        assert_eq!(media_type_for_path(Path::new("notes.txt")), "text/plain");
        assert_eq!(media_type_for_path(Path::new("README.md")), "text/markdown");
        assert_eq!(
            media_type_for_path(Path::new("archive.zip")),
            "application/octet-stream"
        );
        assert_eq!(media_type_for_path(Path::new("noext")), "application/octet-stream");
    }

    #[test]
    fn candidate_from_path_reads_metadata_only() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("photo.png");
        fs::write(&path, [1u8; 42]).unwrap();

        let c = Candidate::from_path(&path).unwrap();
        assert_eq!(c.name, "photo.png");
        assert_eq!(c.media_type, "image/png");
        assert_eq!(c.size, 42);
        assert_eq!(c.content, Content::File(path));
    }

    #[test]
    fn read_loads_file_bytes() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("a.gif");
        fs::write(&path, b"GIF89a").unwrap();

        let input = Candidate::from_path(&path).unwrap().read().unwrap();
        assert_eq!(input.bytes, b"GIF89a");
        assert_eq!(input.media_type, "image/gif");
    }

    #[test]
    fn read_of_vanished_file_is_unreadable() {
        let tmp = TempDir::new().unwrap();
        let path = tmp.path().join("gone.jpg");
        fs::write(&path, b"x").unwrap();
        let c = Candidate::from_path(&path).unwrap();
        fs::remove_file(&path).unwrap();

        let err = c.read().unwrap_err();
        assert!(matches!(err, ValidationError::Unreadable { ref name, .. } if name == "gone.jpg"));
    }

    #[test]
    fn directories_pick_only_image_extensions_in_name_order() {
        let tmp = TempDir::new().unwrap();
        let sub = tmp.path().join("nested");
        fs::create_dir(&sub).unwrap();
        fs::write(tmp.path().join("b.jpg"), b"b").unwrap();
        fs::write(tmp.path().join("a.png"), b"a").unwrap();
        fs::write(tmp.path().join("notes.txt"), b"n").unwrap();
        fs::write(sub.join("c.webp"), b"c").unwrap();

        let (candidates, unreadable) = collect_candidates(&[tmp.path().to_path_buf()]);
        let names: Vec<&str> = candidates.iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["a.png", "b.jpg", "c.webp"]);
        assert!(unreadable.is_empty());
    }

    #[test]
    fn explicit_files_are_always_candidates() {
        let tmp = TempDir::new().unwrap();
        let txt = tmp.path().join("notes.txt");
        fs::write(&txt, b"hello").unwrap();

        let (candidates, _) = collect_candidates(&[txt]);
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].media_type, "text/plain");
    }

    #[test]
    fn missing_path_is_reported() {
        let tmp = TempDir::new().unwrap();
        let (candidates, unreadable) = collect_candidates(&[tmp.path().join("missing.jpg")]);
        assert!(candidates.is_empty());
        assert_eq!(unreadable.len(), 1);
        assert_eq!(unreadable[0].name(), "missing.jpg");
    }
}
