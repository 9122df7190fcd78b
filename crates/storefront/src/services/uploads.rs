//! Product image uploads.
//!
//! [`ProductForm`] reads a multipart product form. Files declared as PNG or
//! JPEG are written to the upload directory; any other file is dropped and
//! the form is handled as if no image had been sent. Only the first accepted
//! image is stored.

use std::collections::HashMap;
use std::path::Path;

use axum::extract::multipart::MultipartError;
use axum::extract::{FromRequest, Multipart, Request};
use chrono::Utc;
use rand::RngCore;
use thiserror::Error;

use crate::error::AppError;
use crate::state::AppState;

/// Content types accepted for product images.
pub const ACCEPTED_IMAGE_TYPES: [&str; 3] = ["image/png", "image/jpg", "image/jpeg"];

/// Name of the file input.
pub const IMAGE_FIELD: &str = "image";

/// Longest sanitized original name kept in the stored file name.
const MAX_NAME_LENGTH: usize = 100;

/// Errors reading or storing an upload.
#[derive(Debug, Error)]
pub enum UploadError {
    /// The multipart body is malformed or too large.
    #[error("multipart error: {0}")]
    Multipart(#[from] MultipartError),

    /// Writing the file failed.
    #[error("failed to store upload: {0}")]
    Io(#[from] std::io::Error),
}

/// A stored product image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedImage {
    /// File name inside the upload directory.
    pub file_name: String,
}

/// A submitted multipart product form.
#[derive(Debug, Default)]
pub struct ProductForm {
    fields: HashMap<String, String>,
    /// The accepted image, if one was sent.
    pub image: Option<UploadedImage>,
}

impl ProductForm {
    /// A text field, or `""` if it was not sent.
    #[must_use]
    pub fn field(&self, name: &str) -> &str {
        self.fields.get(name).map_or("", String::as_str)
    }
}

impl FromRequest<AppState> for ProductForm {
    type Rejection = AppError;

    async fn from_request(req: Request, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut multipart = Multipart::from_request(req, state)
            .await
            .map_err(|e| AppError::BadRequest(e.body_text()))?;

        read_product_form(&mut multipart, &state.config().upload_dir)
            .await
            .map_err(|e| match e {
                UploadError::Multipart(e) => AppError::BadRequest(e.body_text()),
                UploadError::Io(e) => AppError::Internal(format!("storing upload: {e}")),
            })
    }
}

async fn read_product_form(
    multipart: &mut Multipart,
    upload_dir: &Path,
) -> Result<ProductForm, UploadError> {
    let mut form = ProductForm::default();

    while let Some(field) = multipart.next_field().await? {
        let Some(name) = field.name().map(str::to_owned) else {
            continue;
        };

        if name != IMAGE_FIELD {
            let value = field.text().await?;
            form.fields.insert(name, value);
            continue;
        }

        if form.image.is_some() {
            tracing::debug!("ignoring extra image part");
            continue;
        }

        let content_type = field.content_type().map(str::to_owned);
        let original_name = field.file_name().unwrap_or_default().to_owned();
        let data = field.bytes().await?;

        if original_name.is_empty() && data.is_empty() {
            continue;
        }
        if !is_accepted_image(content_type.as_deref()) {
            tracing::debug!(content_type = ?content_type, "dropping upload with unaccepted type");
            continue;
        }

        tokio::fs::create_dir_all(upload_dir).await?;
        let file_name = stored_file_name(&original_name);
        tokio::fs::write(upload_dir.join(&file_name), &data).await?;
        tracing::info!(file = %file_name, bytes = data.len(), "stored product image");

        form.image = Some(UploadedImage { file_name });
    }

    Ok(form)
}

/// Whether a declared content type is an accepted image type.
#[must_use]
pub fn is_accepted_image(content_type: Option<&str>) -> bool {
    content_type.is_some_and(|ct| {
        let essence = ct.split(';').next().unwrap_or_default().trim();
        ACCEPTED_IMAGE_TYPES
            .iter()
            .any(|accepted| essence.eq_ignore_ascii_case(accepted))
    })
}

/// `<unix-millis>-<8 hex>-<sanitized name>`.
fn stored_file_name(original: &str) -> String {
    let mut suffix = [0u8; 4];
    rand::rng().fill_bytes(&mut suffix);
    format!(
        "{}-{}-{}",
        Utc::now().timestamp_millis(),
        hex::encode(suffix),
        sanitize_file_name(original)
    )
}

/// Keep the last path component of `name`, replacing anything outside
/// `[A-Za-z0-9._-]`.
fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = base
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .take(MAX_NAME_LENGTH)
        .collect();

    let cleaned = cleaned.trim_start_matches('.');
    if cleaned.is_empty() {
        "upload".to_owned()
    } else {
        cleaned.to_owned()
    }
}

/// Delete a stored image. Missing files are ignored and other failures are
/// logged, since the owning row is already gone.
pub async fn remove_image(upload_dir: &Path, file_name: &str) {
    if file_name.is_empty() || file_name.contains(['/', '\\']) || file_name.starts_with('.') {
        tracing::warn!(file = %file_name, "refusing to delete suspicious image path");
        return;
    }

    match tokio::fs::remove_file(upload_dir.join(file_name)).await {
        Ok(()) => tracing::debug!(file = %file_name, "deleted product image"),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!(file = %file_name, error = %e, "failed to delete product image"),
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::body::Body;
    use axum::http::header;

    use super::*;

    fn image_part(file_name: &str) -> String {
        format!(
            "--BOUNDARY\r\n\
             Content-Disposition: form-data; name=\"image\"; filename=\"{file_name}\"\r\n\
             Content-Type: image/png\r\n\r\n\
             not really a png\r\n"
        )
    }

    async fn multipart(body: String) -> Multipart {
        let request = Request::builder()
            .header(
                header::CONTENT_TYPE,
                "multipart/form-data; boundary=BOUNDARY",
            )
            .body(Body::from(body))
            .unwrap();
        Multipart::from_request(request, &()).await.unwrap()
    }

    fn stored_files(dir: &Path) -> Vec<String> {
        std::fs::read_dir(dir)
            .map(|entries| {
                entries
                    .map(|entry| entry.unwrap().file_name().to_string_lossy().into_owned())
                    .collect()
            })
            .unwrap_or_default()
    }

    #[tokio::test]
    async fn test_only_first_image_is_stored() {
        let dir = std::env::temp_dir().join(format!("emporium-uploads-{}", uuid::Uuid::new_v4()));
        let body = format!(
            "--BOUNDARY\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             Red Notebook\r\n\
             {}{}--BOUNDARY--\r\n",
            image_part("a.png"),
            image_part("b.png")
        );

        let form = read_product_form(&mut multipart(body).await, &dir)
            .await
            .unwrap();

        let image = form.image.clone().unwrap();
        assert!(image.file_name.ends_with("-a.png"));
        assert_eq!(form.field("title"), "Red Notebook");
        assert_eq!(stored_files(&dir), vec![image.file_name]);

        std::fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_accepted_types() {
        assert!(is_accepted_image(Some("image/png")));
        assert!(is_accepted_image(Some("image/jpg")));
        assert!(is_accepted_image(Some("IMAGE/JPEG")));
        assert!(!is_accepted_image(Some("image/gif")));
        assert!(!is_accepted_image(Some("text/plain")));
        assert!(!is_accepted_image(None));
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("photo.png"), "photo.png");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\Users\\me\\cat pic.jpg"), "cat_pic.jpg");
        assert_eq!(sanitize_file_name(".hidden"), "hidden");
        assert_eq!(sanitize_file_name(""), "upload");
    }

    #[test]
    fn test_stored_file_names_are_unique() {
        let a = stored_file_name("a.png");
        let b = stored_file_name("a.png");
        assert_ne!(a, b);
        assert!(a.ends_with("-a.png"));

        let parts: Vec<&str> = a.splitn(3, '-').collect();
        assert_eq!(parts.len(), 3);
        assert!(parts[0].parse::<i64>().is_ok());
        assert_eq!(parts[1].len(), 8);
    }
}
