use base64::{engine::general_purpose::STANDARD, Engine as _};
use sha2::{Digest, Sha256};
use thiserror::Error;

use crate::core::config::Settings;
use crate::db::models::ImageRef;
use crate::services::ai_gateway::InlineImage;

const DEFAULT_MIME: &str = "image/jpeg";

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum IntakeError {
    #[error("studentId is required")]
    MissingStudentId,
    #[error("at least one image is required")]
    NoImages,
    #[error("too many images: {count} (max {max})")]
    TooManyImages { count: usize, max: usize },
    #[error("image {} is not valid base64", .index + 1)]
    InvalidEncoding { index: usize },
    #[error("image {} is too large: {size_bytes} bytes (max {max_bytes})", .index + 1)]
    ImageTooLarge { index: usize, size_bytes: usize, max_bytes: usize },
}

#[derive(Debug, Clone)]
pub(crate) struct IntakeLimits {
    pub(crate) max_image_size_bytes: usize,
    pub(crate) max_images_per_submission: usize,
}

impl IntakeLimits {
    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self {
            max_image_size_bytes: settings.intake().max_image_size_bytes,
            max_images_per_submission: settings.intake().max_images_per_submission,
        }
    }
}

/// Raw grading request fields before validation.
#[derive(Debug, Clone, Default)]
pub(crate) struct SubmissionInput {
    pub(crate) student_id: Option<String>,
    pub(crate) code: Option<String>,
    pub(crate) images: Option<Vec<String>>,
    pub(crate) image: Option<String>,
}

#[derive(Debug, Clone)]
pub(crate) struct ValidatedSubmission {
    pub(crate) student_id: String,
    pub(crate) code: Option<String>,
    pub(crate) images: Vec<InlineImage>,
    pub(crate) refs: Vec<ImageRef>,
    pub(crate) files_hash: String,
}

impl ValidatedSubmission {
    pub(crate) fn image_count(&self) -> usize {
        self.images.len()
    }
}

pub(crate) fn validate(
    input: SubmissionInput,
    limits: &IntakeLimits,
) -> Result<ValidatedSubmission, IntakeError> {
    let student_id = input
        .student_id
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .ok_or(IntakeError::MissingStudentId)?;

    let raw_images = match (input.images, input.image) {
        (Some(images), _) if !images.is_empty() => images,
        (_, Some(image)) => vec![image],
        _ => Vec::new(),
    };

    if raw_images.is_empty() {
        return Err(IntakeError::NoImages);
    }
    if raw_images.len() > limits.max_images_per_submission {
        return Err(IntakeError::TooManyImages {
            count: raw_images.len(),
            max: limits.max_images_per_submission,
        });
    }

    let mut images = Vec::with_capacity(raw_images.len());
    let mut refs = Vec::with_capacity(raw_images.len());
    let mut files_hasher = Sha256::new();

    for (index, raw) in raw_images.iter().enumerate() {
        let (declared_mime, encoded) = split_data_url(raw);
        let encoded: String = encoded.chars().filter(|c| !c.is_ascii_whitespace()).collect();
        let bytes =
            STANDARD.decode(encoded.as_bytes()).map_err(|_| IntakeError::InvalidEncoding { index })?;

        if bytes.is_empty() {
            return Err(IntakeError::InvalidEncoding { index });
        }
        if bytes.len() > limits.max_image_size_bytes {
            return Err(IntakeError::ImageTooLarge {
                index,
                size_bytes: bytes.len(),
                max_bytes: limits.max_image_size_bytes,
            });
        }

        let mime_type = declared_mime
            .map(str::to_string)
            .or_else(|| sniff_mime(&bytes).map(str::to_string))
            .unwrap_or_else(|| DEFAULT_MIME.to_string());

        files_hasher.update(&bytes);
        refs.push(ImageRef {
            index,
            mime_type: mime_type.clone(),
            size_bytes: bytes.len(),
            sha256: hex::encode(Sha256::digest(&bytes)),
        });
        images.push(InlineImage { mime_type, data: encoded });
    }

    let code = input.code.map(|value| value.trim().to_string()).filter(|value| !value.is_empty());

    Ok(ValidatedSubmission {
        student_id,
        code,
        images,
        refs,
        files_hash: hex::encode(files_hasher.finalize()),
    })
}

/// Splits `data:image/png;base64,AAAA` into (`image/png`, `AAAA`). Input without an
/// image data-URL prefix is returned untouched.
fn split_data_url(raw: &str) -> (Option<&str>, &str) {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("data:") else {
        return (None, trimmed);
    };
    let Some((mime, payload)) = rest.split_once(";base64,") else {
        return (None, trimmed);
    };
    if mime.starts_with("image/") && mime.len() > "image/".len() {
        (Some(mime), payload)
    } else {
        (None, payload)
    }
}

fn sniff_mime(bytes: &[u8]) -> Option<&'static str> {
    if bytes.starts_with(&[0xFF, 0xD8, 0xFF]) {
        Some("image/jpeg")
    } else if bytes.starts_with(&[0x89, b'P', b'N', b'G']) {
        Some("image/png")
    } else if bytes.starts_with(b"GIF8") {
        Some("image/gif")
    } else if bytes.len() >= 12 && bytes.starts_with(b"RIFF") && &bytes[8..12] == b"WEBP" {
        Some("image/webp")
    } else {
        None
    }
}
