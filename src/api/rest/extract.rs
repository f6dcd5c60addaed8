use axum::extract::multipart::{Field, MultipartRejection};
use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::{FromRequest, FromRequestParts, Multipart};

use crate::engine::proof::ImageUpload;
use crate::error::AppError;

/// `Json` whose rejections use the service's error envelope.
#[derive(FromRequest)]
#[from_request(via(axum::Json), rejection(AppError))]
pub struct ApiJson<T>(pub T);

/// `Path` whose rejections use the service's error envelope.
#[derive(FromRequestParts)]
#[from_request(via(axum::extract::Path), rejection(AppError))]
pub struct ApiPath<T>(pub T);

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<PathRejection> for AppError {
    fn from(rejection: PathRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<MultipartRejection> for AppError {
    fn from(rejection: MultipartRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

pub async fn read_image(field: Field<'_>) -> Result<ImageUpload, AppError> {
    let content_type = field
        .content_type()
        .map(str::to_string)
        .ok_or_else(|| AppError::Validation("image content type is missing".to_string()))?;
    let bytes = field
        .bytes()
        .await
        .map_err(|err| AppError::Validation(format!("failed to read upload: {err}")))?;

    Ok(ImageUpload {
        content_type,
        bytes: bytes.to_vec(),
    })
}

pub async fn read_text(field: Field<'_>) -> Result<String, AppError> {
    field
        .text()
        .await
        .map_err(|err| AppError::Validation(format!("failed to read form field: {err}")))
}

/// Reads the single image part named `image` from a proof upload.
pub async fn single_image(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<ImageUpload, AppError> {
    let mut multipart = multipart?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|err| AppError::Validation(format!("malformed multipart body: {err}")))?
    {
        if field.name() == Some("image") {
            return read_image(field).await;
        }
    }

    Err(AppError::Validation("image field is required".to_string()))
}
