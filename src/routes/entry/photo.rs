use std::path::{Path, PathBuf};

use axum::extract::{Multipart, multipart::Field};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::error::AppError;

pub const MAX_PHOTO_BYTES: usize = 5 * 1024 * 1024;
pub const PHOTO_FIELD: &str = "photo";
pub const PUBLIC_PREFIX: &str = "/uploads";
/// Request body limit for the upload route: the photo plus multipart framing.
pub const MAX_UPLOAD_BODY_BYTES: usize = MAX_PHOTO_BYTES + 64 * 1024;

const ALLOWED_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "gif"];

/// Lower-cased extension of `file_name` if it is an accepted image type.
pub fn image_extension(file_name: &str) -> Option<String> {
    let ext = Path::new(file_name).extension()?.to_str()?.to_ascii_lowercase();
    ALLOWED_EXTENSIONS.contains(&ext.as_str()).then_some(ext)
}

/// Reads a multipart field into memory, failing as soon as it exceeds `limit` bytes.
pub async fn read_limited(mut field: Field<'_>, limit: usize) -> Result<Vec<u8>, AppError> {
    let mut data = Vec::new();
    while let Some(chunk) = field.chunk().await? {
        if data.len() + chunk.len() > limit {
            return Err(AppError::PayloadTooLarge(format!(
                "Photo exceeds the {} MB limit",
                limit / (1024 * 1024)
            )));
        }
        data.extend_from_slice(&chunk);
    }

    if data.is_empty() {
        return Err(AppError::Validation("Uploaded photo is empty".into()));
    }
    Ok(data)
}

/// Pulls the `photo` field out of a multipart body, returning its extension
/// and bytes. Nothing is written to disk here.
pub async fn read_photo(multipart: &mut Multipart) -> Result<(String, Vec<u8>), AppError> {
    while let Some(field) = multipart.next_field().await? {
        if field.name() != Some(PHOTO_FIELD) {
            continue;
        }

        let ext = field.file_name().and_then(image_extension).ok_or_else(|| {
            AppError::Validation("Only jpg, jpeg, png and gif images are allowed".into())
        })?;
        let data = read_limited(field, MAX_PHOTO_BYTES).await?;
        return Ok((ext, data));
    }

    Err(AppError::Validation(format!(
        "Multipart field '{}' is required",
        PHOTO_FIELD
    )))
}

/// File name for a photo: the owning entry plus a content digest, so a
/// re-upload of a different image never collides with a cached one.
pub fn photo_file_name(entry_id: Uuid, data: &[u8], ext: &str) -> String {
    let digest = Sha256::digest(data);
    let hex: String = digest.iter().take(8).map(|b| format!("{:02x}", b)).collect();
    format!("{}-{}.{}", entry_id, hex, ext)
}

pub fn public_path(file_name: &str) -> String {
    format!("{}/{}", PUBLIC_PREFIX, file_name)
}

/// Maps a stored public path back onto the upload directory.
pub fn disk_path(upload_dir: &Path, public: &str) -> Option<PathBuf> {
    let name = public.strip_prefix(PUBLIC_PREFIX)?.trim_start_matches('/');
    if name.is_empty() || name.contains('/') || name.contains("..") {
        return None;
    }
    Some(upload_dir.join(name))
}

pub async fn store(upload_dir: &Path, file_name: &str, data: &[u8]) -> Result<(), AppError> {
    tokio::fs::create_dir_all(upload_dir).await?;
    tokio::fs::write(upload_dir.join(file_name), data).await?;
    Ok(())
}

/// Removes a previously stored photo. Missing files are not an error.
pub async fn remove(upload_dir: &Path, public: &str) {
    let Some(path) = disk_path(upload_dir, public) else {
        return;
    };
    match tokio::fs::remove_file(&path).await {
        Ok(()) => tracing::debug!("Removed photo {}", path.display()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => tracing::warn!("Failed to remove photo {}: {}", path.display(), e),
    }
}

/// Removes the photos of entries deleted in bulk.
pub async fn remove_all(upload_dir: &Path, photos: &[String]) {
    for public in photos {
        remove(upload_dir, public).await;
    }
}
