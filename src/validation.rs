//! Pre-pipeline checks on candidate files.
//!
//! A candidate is accepted when its declared media type is `image/*` and its
//! size is at most the configured limit (10 MiB by default). Rejection is
//! per file; the rest of a selection still goes through.

use thiserror::Error;

/// Default per-file size limit: 10 MiB.
pub const MAX_INPUT_BYTES: u64 = 10 * 1024 * 1024;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    #[error("{name} is not an image file ({media_type})")]
    NotAnImage { name: String, media_type: String },
    #[error("{name} is larger than {}", crate::output::format_file_size(*limit))]
    TooLarge { name: String, size: u64, limit: u64 },
    #[error("{name} could not be read: {reason}")]
    Unreadable { name: String, reason: String },
}

impl ValidationError {
    pub fn name(&self) -> &str {
        match self {
            ValidationError::NotAnImage { name, .. }
            | ValidationError::TooLarge { name, .. }
            | ValidationError::Unreadable { name, .. } => name,
        }
    }
}

/// Check a candidate's declared type and size against `limit`.
pub fn validate_candidate(
    name: &str,
    media_type: &str,
    size: u64,
    limit: u64,
) -> Result<(), ValidationError> {
    if !media_type.starts_with("image/") {
        return Err(ValidationError::NotAnImage {
            name: name.to_string(),
            media_type: media_type.to_string(),
        });
    }
    if size > limit {
        return Err(ValidationError::TooLarge {
            name: name.to_string(),
            size,
            limit,
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_image_within_limit() {
        assert!(validate_candidate("a.jpg", "image/jpeg", 1024, MAX_INPUT_BYTES).is_ok());
    }

    #[test]
    fn rejects_text_regardless_of_size() {
        for size in [0, 1, MAX_INPUT_BYTES + 1] {
            let err = validate_candidate("notes.txt", "text/plain", size, MAX_INPUT_BYTES)
                .unwrap_err();
            assert!(matches!(err, ValidationError::NotAnImage { .. }));
        }
    }

    #[test]
    fn size_limit_is_inclusive() {
        assert!(validate_candidate("a.png", "image/png", MAX_INPUT_BYTES, MAX_INPUT_BYTES).is_ok());
        let err = validate_candidate("a.png", "image/png", MAX_INPUT_BYTES + 1, MAX_INPUT_BYTES)
            .unwrap_err();
        assert!(matches!(
            err,
            ValidationError::TooLarge { size, .. } if size == MAX_INPUT_BYTES + 1
        ));
    }

    #[test]
    fn error_messages_name_the_file() {
        let err = validate_candidate("big.jpg", "image/jpeg", MAX_INPUT_BYTES + 1, MAX_INPUT_BYTES)
            .unwrap_err();
        assert_eq!(err.to_string(), "big.jpg is larger than 10 MB");
        assert_eq!(err.name(), "big.jpg");

        let err = validate_candidate("notes.txt", "text/plain", 3, MAX_INPUT_BYTES).unwrap_err();
        assert_eq!(err.to_string(), "notes.txt is not an image file (text/plain)");
    }
}
