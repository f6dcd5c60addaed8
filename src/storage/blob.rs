use std::path::PathBuf;

use async_trait::async_trait;
use dashmap::DashMap;
use tracing::warn;
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_IMAGE_BYTES: usize = 5 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct StoredBlob {
    pub content_type: String,
    pub bytes: Vec<u8>,
}

/// Image storage. `put` returns a stable reference path that `get` accepts.
#[async_trait]
pub trait BlobStore: Send + Sync {
    async fn put(&self, folder: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, AppError>;

    async fn get(&self, path: &str) -> Result<Option<StoredBlob>, AppError>;

    async fn remove(&self, path: &str);
}

pub fn validate_image(content_type: &str, bytes: &[u8]) -> Result<(), AppError> {
    if !content_type.starts_with("image/") {
        return Err(AppError::Validation(format!(
            "only image uploads are accepted, got {content_type}"
        )));
    }
    if bytes.is_empty() {
        return Err(AppError::Validation("uploaded image is empty".to_string()));
    }
    if bytes.len() > MAX_IMAGE_BYTES {
        return Err(AppError::Validation("uploaded image exceeds 5MB".to_string()));
    }
    Ok(())
}

fn extension_for(content_type: &str) -> &'static str {
    match content_type {
        "image/jpeg" | "image/jpg" => "jpg",
        "image/png" => "png",
        "image/webp" => "webp",
        "image/gif" => "gif",
        "image/heic" => "heic",
        _ => "img",
    }
}

fn content_type_for(path: &str) -> &'static str {
    match path.rsplit('.').next() {
        Some("jpg") => "image/jpeg",
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        Some("gif") => "image/gif",
        Some("heic") => "image/heic",
        _ => "application/octet-stream",
    }
}

fn new_path(folder: &str, content_type: &str) -> String {
    format!("{folder}/{}.{}", Uuid::new_v4(), extension_for(content_type))
}

fn is_safe_path(path: &str) -> bool {
    !path.is_empty()
        && !path.starts_with('/')
        && path
            .split('/')
            .all(|segment| !segment.is_empty() && segment != "." && segment != "..")
}

#[derive(Default)]
pub struct MemoryBlobStore {
    blobs: DashMap<String, StoredBlob>,
}

impl MemoryBlobStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlobStore for MemoryBlobStore {
    async fn put(&self, folder: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, AppError> {
        validate_image(content_type, &bytes)?;
        let path = new_path(folder, content_type);
        self.blobs.insert(
            path.clone(),
            StoredBlob {
                content_type: content_type.to_string(),
                bytes,
            },
        );
        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Option<StoredBlob>, AppError> {
        Ok(self.blobs.get(path).map(|entry| entry.value().clone()))
    }

    async fn remove(&self, path: &str) {
        self.blobs.remove(path);
    }
}

pub struct DiskBlobStore {
    root: PathBuf,
}

impl DiskBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

#[async_trait]
impl BlobStore for DiskBlobStore {
    async fn put(&self, folder: &str, content_type: &str, bytes: Vec<u8>) -> Result<String, AppError> {
        validate_image(content_type, &bytes)?;
        let path = new_path(folder, content_type);
        let full = self.root.join(&path);

        if let Some(parent) = full.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|err| AppError::Internal(format!("failed to create upload dir: {err}")))?;
        }
        tokio::fs::write(&full, bytes)
            .await
            .map_err(|err| AppError::Internal(format!("failed to write upload: {err}")))?;

        Ok(path)
    }

    async fn get(&self, path: &str) -> Result<Option<StoredBlob>, AppError> {
        if !is_safe_path(path) {
            return Ok(None);
        }

        match tokio::fs::read(self.root.join(path)).await {
            Ok(bytes) => Ok(Some(StoredBlob {
                content_type: content_type_for(path).to_string(),
                bytes,
            })),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(err) => Err(AppError::Internal(format!("failed to read upload: {err}"))),
        }
    }

    async fn remove(&self, path: &str) {
        if !is_safe_path(path) {
            return;
        }
        if let Err(err) = tokio::fs::remove_file(self.root.join(path)).await {
            warn!(error = %err, path, "failed to remove orphaned upload");
        }
    }
}
