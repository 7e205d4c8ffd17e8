//! Upload validation.
//!
//! Classifies the logical media type from the declared mime/extension and
//! checks size and allowlist membership. All violated rules are collected
//! into one [`ValidationError`] rather than failing on the first. A
//! mime/extension mismatch is a warning unless `strict_mime` is set.
//! Purely computational; no side effects.

use greenroom_core::{MediaType, UploadLimits};
use std::fmt;
use std::path::Path;

/// A single violated validation rule.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum Violation {
    #[error("file too large: {size} bytes (max: {max} bytes)")]
    FileTooLarge { size: u64, max: u64 },

    #[error("empty file")]
    EmptyFile,

    #[error("missing file extension: {filename}")]
    MissingExtension { filename: String },

    #[error("could not classify media type from mime '{mime}' and extension '{extension}'")]
    UnknownMediaType { mime: String, extension: String },

    #[error("extension '{extension}' is not supported for {media_type:?}")]
    UnsupportedExtension {
        extension: String,
        media_type: MediaType,
    },

    #[error("content type '{mime}' is not supported for {media_type:?}")]
    UnsupportedMime { mime: String, media_type: MediaType },

    #[error("content type '{mime}' does not match extension '{extension}'")]
    MimeExtensionMismatch { mime: String, extension: String },
}

/// Validation failure enumerating every violated rule.
#[derive(Debug)]
pub struct ValidationError {
    pub violations: Vec<Violation>,
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let msgs: Vec<String> = self.violations.iter().map(|v| v.to_string()).collect();
        write!(f, "{}", msgs.join("; "))
    }
}

impl std::error::Error for ValidationError {}

impl From<ValidationError> for greenroom_core::MediaError {
    fn from(err: ValidationError) -> Self {
        greenroom_core::MediaError::Validation(err.to_string())
    }
}

/// Outcome of a successful validation.
#[derive(Debug, Clone)]
pub struct ValidationReport {
    pub media_type: MediaType,
    pub extension: String,
    /// Non-fatal findings (mime/extension mismatch outside strict mode).
    pub warnings: Vec<Violation>,
}

/// Map mime/extension to a logical media class.
pub fn classify_media_type(mime: &str, extension: &str) -> Option<MediaType> {
    let mime = mime.to_lowercase();
    if mime.starts_with("image/") {
        return Some(MediaType::Image);
    }
    if mime.starts_with("video/") {
        return Some(MediaType::Video);
    }
    if mime.starts_with("audio/") {
        return Some(MediaType::Audio);
    }
    if matches!(
        mime.as_str(),
        "application/pdf" | "text/plain" | "text/csv" | "application/msword"
            | "application/vnd.openxmlformats-officedocument.wordprocessingml.document"
    ) {
        return Some(MediaType::Document);
    }
    // Fall back to the extension when the mime is unhelpful.
    for media_type in [
        MediaType::Image,
        MediaType::Video,
        MediaType::Audio,
        MediaType::Document,
    ] {
        if allowed_extensions(media_type).contains(&extension) {
            return Some(media_type);
        }
    }
    None
}

fn allowed_extensions(media_type: MediaType) -> &'static [&'static str] {
    match media_type {
        MediaType::Image => &["jpg", "jpeg", "png", "gif", "webp"],
        MediaType::Video => &["mp4", "webm", "mov", "m4v"],
        MediaType::Audio => &["mp3", "wav", "ogg", "m4a", "flac", "aac"],
        MediaType::Document => &["pdf", "txt", "csv", "doc", "docx"],
    }
}

fn allowed_mimes(media_type: MediaType) -> &'static [&'static str] {
    match media_type {
        MediaType::Image => &["image/jpeg", "image/png", "image/gif", "image/webp"],
        MediaType::Video => &["video/mp4", "video/webm", "video/quicktime", "video/x-m4v"],
        MediaType::Audio => &[
            "audio/mpeg",
            "audio/mp3",
            "audio/wav",
            "audio/wave",
            "audio/x-wav",
            "audio/ogg",
            "audio/mp4",
            "audio/x-m4a",
            "audio/flac",
            "audio/aac",
        ],
        MediaType::Document => &[
            "application/pdf",
            "text/plain",
            "text/csv",
            "application/msword",
            "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
        ],
    }
}

/// Expected mimes per extension, for spoofing detection. Unknown
/// extensions skip cross-validation; they fail the allowlist check
/// instead.
fn expected_mimes(extension: &str) -> Option<&'static [&'static str]> {
    let expected: &[&str] = match extension {
        "jpg" | "jpeg" => &["image/jpeg"],
        "png" => &["image/png"],
        "gif" => &["image/gif"],
        "webp" => &["image/webp"],
        "mp4" => &["video/mp4"],
        "webm" => &["video/webm"],
        "mov" => &["video/quicktime"],
        "m4v" => &["video/x-m4v"],
        "mp3" => &["audio/mpeg", "audio/mp3"],
        "wav" => &["audio/wav", "audio/wave", "audio/x-wav"],
        "ogg" => &["audio/ogg"],
        "m4a" => &["audio/mp4", "audio/x-m4a"],
        "flac" => &["audio/flac"],
        "aac" => &["audio/aac"],
        "pdf" => &["application/pdf"],
        "txt" => &["text/plain"],
        "csv" => &["text/csv"],
        "doc" => &["application/msword"],
        "docx" => {
            &["application/vnd.openxmlformats-officedocument.wordprocessingml.document"]
        }
        _ => return None,
    };
    Some(expected)
}

/// Media upload validator.
pub struct UploadValidator {
    limits: UploadLimits,
}

impl UploadValidator {
    pub fn new(limits: UploadLimits) -> Self {
        Self { limits }
    }

    /// Validate declared metadata and size. Collects every violation.
    pub fn validate(
        &self,
        filename: &str,
        declared_mime: &str,
        size: u64,
    ) -> Result<ValidationReport, ValidationError> {
        let mut violations = Vec::new();
        let mut warnings = Vec::new();
        let mime = declared_mime.to_lowercase();

        if size == 0 {
            violations.push(Violation::EmptyFile);
        } else if size > self.limits.max_file_size {
            violations.push(Violation::FileTooLarge {
                size,
                max: self.limits.max_file_size,
            });
        }

        let extension = Path::new(filename)
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_lowercase());
        let extension = match extension {
            Some(ext) => ext,
            None => {
                violations.push(Violation::MissingExtension {
                    filename: filename.to_string(),
                });
                String::new()
            }
        };

        let media_type = classify_media_type(&mime, &extension);
        match media_type {
            None => violations.push(Violation::UnknownMediaType {
                mime: mime.clone(),
                extension: extension.clone(),
            }),
            Some(media_type) => {
                if !extension.is_empty()
                    && !allowed_extensions(media_type).contains(&extension.as_str())
                {
                    violations.push(Violation::UnsupportedExtension {
                        extension: extension.clone(),
                        media_type,
                    });
                }
                if !allowed_mimes(media_type).contains(&mime.as_str()) {
                    violations.push(Violation::UnsupportedMime {
                        mime: mime.clone(),
                        media_type,
                    });
                }
                if let Some(expected) = expected_mimes(&extension) {
                    if !expected.contains(&mime.as_str()) {
                        let mismatch = Violation::MimeExtensionMismatch {
                            mime: mime.clone(),
                            extension: extension.clone(),
                        };
                        if self.limits.strict_mime {
                            violations.push(mismatch);
                        } else {
                            tracing::warn!(
                                mime = %mime,
                                extension = %extension,
                                "Content type does not match extension"
                            );
                            warnings.push(mismatch);
                        }
                    }
                }
            }
        }

        if !violations.is_empty() {
            return Err(ValidationError { violations });
        }

        // A missing classification was recorded as a violation above.
        let media_type = media_type.ok_or_else(|| ValidationError {
            violations: vec![Violation::UnknownMediaType {
                mime: mime.clone(),
                extension: extension.clone(),
            }],
        })?;

        Ok(ValidationReport {
            media_type,
            extension,
            warnings,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn validator() -> UploadValidator {
        UploadValidator::new(UploadLimits {
            max_file_size: 1024 * 1024,
            strict_mime: false,
        })
    }

    #[test]
    fn test_valid_image() {
        let report = validator()
            .validate("cover.jpg", "image/jpeg", 512 * 1024)
            .unwrap();
        assert_eq!(report.media_type, MediaType::Image);
        assert_eq!(report.extension, "jpg");
        assert!(report.warnings.is_empty());
    }

    #[test]
    fn test_size_over_limit_rejected() {
        let err = validator()
            .validate("cover.jpg", "image/jpeg", 2 * 1024 * 1024)
            .unwrap_err();
        assert!(matches!(
            err.violations.as_slice(),
            [Violation::FileTooLarge { .. }]
        ));
    }

    #[test]
    fn test_empty_file_rejected() {
        let err = validator().validate("cover.jpg", "image/jpeg", 0).unwrap_err();
        assert!(err.violations.contains(&Violation::EmptyFile));
    }

    #[test]
    fn test_all_violations_enumerated() {
        // Oversized AND unclassifiable: both violations must appear.
        let err = validator()
            .validate("payload.xyz", "application/octet-stream", 5 * 1024 * 1024)
            .unwrap_err();
        assert_eq!(err.violations.len(), 2);
        assert!(err
            .violations
            .iter()
            .any(|v| matches!(v, Violation::FileTooLarge { .. })));
        assert!(err
            .violations
            .iter()
            .any(|v| matches!(v, Violation::UnknownMediaType { .. })));
    }

    #[test]
    fn test_mismatch_is_warning_by_default() {
        let report = validator()
            .validate("track.mp3", "audio/wav", 1000)
            .unwrap();
        assert_eq!(report.media_type, MediaType::Audio);
        assert!(matches!(
            report.warnings.as_slice(),
            [Violation::MimeExtensionMismatch { .. }]
        ));
    }

    #[test]
    fn test_mismatch_rejected_in_strict_mode() {
        let strict = UploadValidator::new(UploadLimits {
            max_file_size: 1024 * 1024,
            strict_mime: true,
        });
        let err = strict.validate("track.mp3", "audio/wav", 1000).unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| matches!(v, Violation::MimeExtensionMismatch { .. })));
    }

    #[test]
    fn test_classify_falls_back_to_extension() {
        assert_eq!(
            classify_media_type("application/octet-stream", "flac"),
            Some(MediaType::Audio)
        );
        assert_eq!(classify_media_type("application/octet-stream", "bin"), None);
    }

    #[test]
    fn test_missing_extension() {
        let err = validator()
            .validate("noextension", "image/jpeg", 100)
            .unwrap_err();
        assert!(err
            .violations
            .iter()
            .any(|v| matches!(v, Violation::MissingExtension { .. })));
    }
}
