//! Helpers shared by the upload endpoints

use axum::extract::Multipart;

use crate::api::middleware::ApiError;
use crate::services::UploadedImage;

/// Collect every file part whose field name is one of `fields`.
///
/// Parts with other names are skipped; a part without a file name gets
/// `upload-N`.
pub async fn read_image_parts(
    multipart: &mut Multipart,
    fields: &[&str],
) -> Result<Vec<UploadedImage>, ApiError> {
    let mut images = Vec::new();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::validation_error(format!("Failed to read multipart: {}", e)))?
    {
        let name = field.name().unwrap_or_default().to_string();
        if !fields.contains(&name.as_str()) {
            continue;
        }

        let filename = field
            .file_name()
            .map(|s| s.to_string())
            .unwrap_or_else(|| format!("upload-{}", images.len() + 1));
        let content_type = field.content_type().map(|s| s.to_string());
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ApiError::validation_error(format!("Failed to read file: {}", e)))?;

        images.push(UploadedImage::new(filename, content_type, bytes.to_vec()));
    }

    Ok(images)
}
