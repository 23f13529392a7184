//! Shared types passed between selection, the pipeline, and reporting.
//!
//! Result records serialize to the JSON report without their payload bytes.

use crate::imaging::SizeChange;
use serde::Serialize;

/// One user-supplied file, held in the session's ordered batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InputImage {
    /// Display name (file name, no directories).
    pub name: String,
    /// Declared media type, e.g. `image/jpeg`. Not sniffed from content.
    pub media_type: String,
    /// Raw file content.
    pub bytes: Vec<u8>,
}

impl InputImage {
    pub fn new(name: impl Into<String>, media_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            name: name.into(),
            media_type: media_type.into(),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Output of transcoding one [`InputImage`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompressedResult {
    /// Encoded output, owned by this record.
    #[serde(skip)]
    pub data: Vec<u8>,
    pub original_name: String,
    pub original_size: u64,
    pub compressed_size: u64,
    pub original_media_type: String,
    pub media_type: String,
    pub width: u32,
    pub height: u32,
    pub original_width: u32,
    pub original_height: u32,
}

impl CompressedResult {
    /// Rounded percent saved; negative when the output grew.
    pub fn percent_change(&self) -> i64 {
        crate::imaging::percent_change(self.original_size, self.compressed_size)
    }

    pub fn size_change(&self) -> SizeChange {
        SizeChange::from_percent(self.percent_change())
    }
}
