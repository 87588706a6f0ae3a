use std::path::Path;

use rand::Rng;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::config::Settings;

pub(crate) const DOCUMENT_CONTENT_TYPE: &str = "application/pdf";
pub(crate) const ANSWER_CONTENT_TYPES: &[&str] =
    &["image/jpeg", "image/jpg", "image/png", "application/pdf"];

const RANDOM_SUFFIX_LEN: usize = 13;
const BASE36: &[u8] = b"0123456789abcdefghijklmnopqrstuvwxyz";

/// A file received from a client, fully buffered.
#[derive(Debug, Clone)]
pub(crate) struct FileUpload {
    pub(crate) file_name: String,
    pub(crate) content_type: String,
    pub(crate) bytes: Vec<u8>,
}

impl FileUpload {
    pub(crate) fn new(
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        bytes: Vec<u8>,
    ) -> Self {
        Self { file_name: file_name.into(), content_type: content_type.into(), bytes }
    }

    pub(crate) fn mime(&self) -> String {
        normalize_content_type(&self.content_type)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub(crate) enum UploadRejection {
    #[error("Please select a PDF file to upload")]
    MissingDocument,
    #[error("{file_name} is not a PDF file")]
    NotPdf { file_name: String },
    #[error("{file_name} is not a supported file type. Please upload only images or PDFs")]
    UnsupportedAnswerType { file_name: String },
    #[error("{file_name} exceeds the {limit_mb}MB limit")]
    TooLarge { file_name: String, limit_mb: u64 },
    #[error("{file_name} is empty")]
    Empty { file_name: String },
    #[error("Please upload at least one answer file before submitting")]
    NoAnswers,
}

impl UploadRejection {
    /// Limit reported in whole megabytes, rounded up.
    pub(crate) fn too_large(file_name: impl Into<String>, max_bytes: u64) -> Self {
        Self::TooLarge { file_name: file_name.into(), limit_mb: max_bytes.div_ceil(1024 * 1024) }
    }
}

#[derive(Debug, Clone, Copy)]
pub(crate) struct UploadPolicy {
    max_file_bytes: u64,
}

impl UploadPolicy {
    pub(crate) fn new(max_file_bytes: u64) -> Self {
        Self { max_file_bytes }
    }

    pub(crate) fn from_settings(settings: &Settings) -> Self {
        Self::new(settings.storage().max_upload_bytes())
    }

    pub(crate) fn max_file_bytes(&self) -> u64 {
        self.max_file_bytes
    }

    pub(crate) fn validate_document(
        &self,
        document: Option<&FileUpload>,
    ) -> Result<(), UploadRejection> {
        let document = document.ok_or(UploadRejection::MissingDocument)?;
        if document.mime() != DOCUMENT_CONTENT_TYPE {
            return Err(UploadRejection::NotPdf { file_name: document.file_name.clone() });
        }
        self.check_size(document)
    }

    pub(crate) fn validate_answers(&self, files: &[FileUpload]) -> Result<(), UploadRejection> {
        if files.is_empty() {
            return Err(UploadRejection::NoAnswers);
        }

        for file in files {
            let mime = file.mime();
            if !ANSWER_CONTENT_TYPES.contains(&mime.as_str()) {
                return Err(UploadRejection::UnsupportedAnswerType {
                    file_name: file.file_name.clone(),
                });
            }
            self.check_size(file)?;
        }

        Ok(())
    }

    fn check_size(&self, file: &FileUpload) -> Result<(), UploadRejection> {
        if file.bytes.is_empty() {
            return Err(UploadRejection::Empty { file_name: file.file_name.clone() });
        }
        if file.bytes.len() as u64 > self.max_file_bytes {
            return Err(UploadRejection::too_large(file.file_name.as_str(), self.max_file_bytes));
        }
        Ok(())
    }
}

/// `<unix millis>_<random base36>.<ext>`, unique enough to share one bucket prefix.
pub(crate) fn generate_file_name(original_name: &str, now: OffsetDateTime) -> String {
    let millis = now.unix_timestamp_nanos() / 1_000_000;
    let mut rng = rand::thread_rng();
    let suffix: String = (0..RANDOM_SUFFIX_LEN)
        .map(|_| BASE36[rng.gen_range(0..BASE36.len())] as char)
        .collect();

    format!("{millis}_{suffix}.{}", file_extension(original_name))
}

pub(crate) fn sanitized_filename(name: &str) -> String {
    let base = Path::new(name).file_name().and_then(|value| value.to_str()).unwrap_or(name);
    let sanitized: String = base
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || *c == '.' || *c == '_' || *c == '-')
        .collect();

    if sanitized.is_empty() {
        "upload".to_string()
    } else {
        sanitized
    }
}

pub(crate) fn content_type_for_path(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| ext.to_ascii_lowercase())
        .as_deref()
    {
        Some("pdf") => "application/pdf",
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        _ => "application/octet-stream",
    }
}

fn file_extension(name: &str) -> String {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(sanitized_filename)
        .map(|ext| ext.to_ascii_lowercase())
        .unwrap_or_else(|| "bin".to_string())
}

fn normalize_content_type(value: &str) -> String {
    value.split(';').next().unwrap_or_default().trim().to_ascii_lowercase()
}
