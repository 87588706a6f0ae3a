use axum::extract::multipart::{Field, Multipart};

use crate::api::errors::ApiError;
use crate::services::uploads::{FileUpload, UploadRejection};

pub(super) async fn next_field(
    multipart: &mut Multipart,
) -> Result<Option<Field<'_>>, ApiError> {
    multipart
        .next_field()
        .await
        .map_err(|_| ApiError::BadRequest("Invalid multipart data".to_string()))
}

/// Buffers one file part, refusing it as soon as it passes `max_bytes`.
pub(super) async fn read_file(
    mut field: Field<'_>,
    max_bytes: u64,
) -> Result<FileUpload, ApiError> {
    let file_name = field.file_name().unwrap_or("upload").to_string();
    let content_type =
        field.content_type().unwrap_or("application/octet-stream").to_string();

    let mut bytes = Vec::new();
    while let Some(chunk) = field
        .chunk()
        .await
        .map_err(|_| ApiError::BadRequest("Failed to read file".to_string()))?
    {
        let next_size = bytes.len() as u64 + chunk.len() as u64;
        if next_size > max_bytes {
            let rejection = UploadRejection::too_large(file_name, max_bytes);
            return Err(ApiError::BadRequest(rejection.to_string()));
        }
        bytes.extend_from_slice(&chunk);
    }

    Ok(FileUpload::new(file_name, content_type, bytes))
}

/// Text part, `None` when blank.
pub(super) async fn read_text(field: Field<'_>, name: &str) -> Result<Option<String>, ApiError> {
    let text = field
        .text()
        .await
        .map_err(|_| ApiError::BadRequest(format!("Invalid {name} field")))?;
    let text = text.trim();
    Ok((!text.is_empty()).then(|| text.to_string()))
}
