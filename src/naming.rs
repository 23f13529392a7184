//! Output filename derivation.
//!
//! Every compressed file is written as `<original-stem>_compressed.<extension>`,
//! where the extension is the subtype of the *output* media type:
//!
//! - `photo.png` encoded as `image/jpeg` → `photo_compressed.jpeg`
//! - `scan.final.tiff` kept as `image/tiff` → `scan.final_compressed.tiff`
//! - `README` (no dot) encoded as `image/webp` → `README_compressed.webp`
//!
//! The stem is everything before the *last* dot. A leading dot (`.hidden`)
//! does not count as an extension separator.
//!
//! Structured-syntax suffixes are stripped on purpose: `image/svg+xml` gives
//! `.svg`, the extension every viewer expects, not `.svg+xml`.
//!
//! ## Batches
//!
//! Two inputs can map to the same name (`photo.png` and `photo.jpg` both
//! encoded as JPEG). [`batch_filenames`] keeps the first as is and numbers
//! the rest, `photo_compressed (1).jpeg`, `photo_compressed (2).jpeg`, so no
//! file in a batch overwrites another. Names are compared case-insensitively
//! so the rule also holds on case-insensitive filesystems.

use std::collections::HashSet;

/// Result of splitting a display name into stem and extension.
#[derive(Debug, Clone, PartialEq)]
pub struct ParsedName<'a> {
    /// Name without its final extension.
    pub stem: &'a str,
    /// Final extension without the dot, if any.
    pub extension: Option<&'a str>,
}

/// Split a file name on its last dot.
pub fn split_name(name: &str) -> ParsedName<'_> {
    match name.rfind('.') {
        Some(pos) if pos > 0 => ParsedName {
            stem: &name[..pos],
            extension: Some(&name[pos + 1..]),
        },
        _ => ParsedName {
            stem: name,
            extension: None,
        },
    }
}

/// File extension for a media type: its subtype, e.g. `image/jpeg` → `jpeg`.
///
/// Structured-syntax suffixes are dropped (`image/svg+xml` → `svg`). A media
/// type without a slash is returned unchanged.
pub fn extension_for_media_type(media_type: &str) -> &str {
    let subtype = media_type
        .split_once('/')
        .map(|(_, sub)| sub)
        .unwrap_or(media_type);
    subtype.split('+').next().unwrap_or(subtype)
}

/// Download filename for a compressed result.
pub fn compressed_filename(original_name: &str, media_type: &str) -> String {
    let parsed = split_name(original_name);
    format!(
        "{}_compressed.{}",
        parsed.stem,
        extension_for_media_type(media_type)
    )
}

/// `name` with ` (n)` inserted before its extension.
pub fn numbered_filename(name: &str, n: usize) -> String {
    let parsed = split_name(name);
    match parsed.extension {
        Some(ext) => format!("{} ({n}).{ext}", parsed.stem),
        None => format!("{} ({n})", parsed.stem),
    }
}

/// Download filenames for a whole batch, unique within it and in batch order.
///
/// Takes `(original_name, media_type)` pairs.
pub fn batch_filenames<'a>(items: impl IntoIterator<Item = (&'a str, &'a str)>) -> Vec<String> {
    let mut taken = HashSet::new();
    let mut names = Vec::new();
    for (original_name, media_type) in items {
        let base = compressed_filename(original_name, media_type);
        let mut name = base.clone();
        let mut n = 0;
        while !taken.insert(name.to_lowercase()) {
            n += 1;
            name = numbered_filename(&base, n);
        }
        names.push(name);
    }
    names
}
