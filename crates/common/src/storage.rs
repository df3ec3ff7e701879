//! File storage for request attachments.
//!
//! Uploads are checked against an [`UploadPolicy`] and written through a
//! [`StorageBackend`]. The local filesystem is the only backend shipped.

use std::path::PathBuf;

use chrono::{DateTime, Utc};

use crate::config::StorageConfig;
use crate::{AppError, AppResult, IdGenerator};

/// Stored file metadata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadedFile {
    /// Generated file name (`<uuid>.<ext>`).
    pub file_name: String,
    /// Storage key relative to the upload root (`YYYYMM/<uuid>.<ext>`).
    pub file_path: String,
    /// Declared MIME type.
    pub file_type: String,
    /// File name as sent by the client.
    pub original_name: String,
    /// File size in bytes.
    pub size: u64,
    /// MD5 hash of the contents.
    pub md5: String,
}

/// Storage backend trait.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Write a file under the given key.
    async fn upload(&self, key: &str, data: &[u8]) -> AppResult<()>;

    /// Delete a file.
    async fn delete(&self, key: &str) -> AppResult<()>;

    /// Get the public URL for a key.
    fn public_url(&self, key: &str) -> String;
}

/// Local filesystem storage backend.
pub struct LocalStorage {
    base_path: PathBuf,
    base_url: String,
}

impl LocalStorage {
    /// Create a new local storage backend.
    #[must_use]
    pub const fn new(base_path: PathBuf, base_url: String) -> Self {
        Self {
            base_path,
            base_url,
        }
    }

    /// Create a local storage backend from configuration.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self::new(config.upload_dir.clone(), config.base_url.clone())
    }
}

#[async_trait::async_trait]
impl StorageBackend for LocalStorage {
    async fn upload(&self, key: &str, data: &[u8]) -> AppResult<()> {
        let path = self.base_path.join(key);

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| AppError::DependencyFailure(format!("Failed to create directory: {e}")))?;
        }

        tokio::fs::write(&path, data)
            .await
            .map_err(|e| AppError::DependencyFailure(format!("Failed to write file: {e}")))
    }

    async fn delete(&self, key: &str) -> AppResult<()> {
        let path = self.base_path.join(key);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            tokio::fs::remove_file(&path)
                .await
                .map_err(|e| AppError::DependencyFailure(format!("Failed to delete file: {e}")))?;
        }
        Ok(())
    }

    fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.base_url.trim_end_matches('/'), key)
    }
}

/// Acceptance rules for uploaded files.
#[derive(Debug, Clone)]
pub struct UploadPolicy {
    max_size: u64,
    allowed_extensions: Vec<String>,
}

impl Default for UploadPolicy {
    fn default() -> Self {
        Self::from_config(&StorageConfig::default())
    }
}

impl UploadPolicy {
    /// Create a policy from configuration.
    #[must_use]
    pub fn from_config(config: &StorageConfig) -> Self {
        Self {
            max_size: config.max_file_size,
            allowed_extensions: config
                .allowed_extensions
                .iter()
                .map(|ext| ext.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }

    /// Maximum accepted size in bytes.
    #[must_use]
    pub const fn max_size(&self) -> u64 {
        self.max_size
    }

    /// Check a file and return its normalized extension.
    pub fn check(&self, original_name: &str, size: u64) -> AppResult<String> {
        let extension = file_extension(original_name)
            .map(str::to_ascii_lowercase)
            .filter(|ext| self.allowed_extensions.iter().any(|allowed| allowed == ext))
            .ok_or_else(|| {
                AppError::UnsupportedMediaType(format!(
                    "{original_name}: only {} files are accepted",
                    self.allowed_extensions.join(", ")
                ))
            })?;

        if size == 0 {
            return Err(AppError::Validation(format!("{original_name} is empty")));
        }
        if size > self.max_size {
            return Err(AppError::PayloadTooLarge(format!(
                "{original_name} is {size} bytes, limit is {} bytes",
                self.max_size
            )));
        }

        Ok(extension)
    }
}

/// MIME type for an accepted extension.
#[must_use]
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "pdf" => "application/pdf",
        "jpg" | "jpeg" => "image/jpeg",
        "png" => "image/png",
        _ => "application/octet-stream",
    }
}

fn file_extension(name: &str) -> Option<&str> {
    name.rfind('.')
        .filter(|&pos| pos < name.len() - 1)
        .map(|pos| &name[pos + 1..])
}

/// Generate a storage key for a file: `YYYYMM/<uuid>.<ext>`.
#[must_use]
pub fn generate_storage_key(id_gen: &IdGenerator, now: DateTime<Utc>, extension: &str) -> String {
    format!("{}/{}", now.format("%Y%m"), id_gen.generate_file_name(extension))
}

/// Store an upload after checking it against the policy.
pub async fn store_upload(
    backend: &dyn StorageBackend,
    policy: &UploadPolicy,
    id_gen: &IdGenerator,
    original_name: &str,
    data: &[u8],
) -> AppResult<UploadedFile> {
    let extension = policy.check(original_name, data.len() as u64)?;
    let key = generate_storage_key(id_gen, Utc::now(), &extension);

    backend.upload(&key, data).await?;

    let md5 = format!("{:x}", md5::compute(data));
    let file_name = key
        .rsplit('/')
        .next()
        .map_or_else(|| key.clone(), str::to_string);

    tracing::debug!(key = %key, size = data.len(), md5 = %md5, "Stored upload");

    Ok(UploadedFile {
        file_name,
        file_type: mime_for_extension(&extension).to_string(),
        file_path: key,
        original_name: original_name.to_string(),
        size: data.len() as u64,
        md5,
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn test_policy_accepts_allowed_extension_case_insensitively() {
        let policy = UploadPolicy::default();
        assert_eq!(policy.check("slip.PNG", 1024).unwrap(), "png");
        assert_eq!(policy.check("transcript.final.pdf", 10).unwrap(), "pdf");
    }

    #[test]
    fn test_policy_rejects_unknown_extension() {
        let policy = UploadPolicy::default();
        let err = policy.check("slip.gif", 1024).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));

        let err = policy.check("noextension", 1024).unwrap_err();
        assert!(matches!(err, AppError::UnsupportedMediaType(_)));
    }

    #[test]
    fn test_policy_rejects_oversized_file() {
        let policy = UploadPolicy::default();
        assert!(policy.check("slip.jpg", 5 * 1024 * 1024).is_ok());
        let err = policy.check("slip.jpg", 5 * 1024 * 1024 + 1).unwrap_err();
        assert!(matches!(err, AppError::PayloadTooLarge(_)));
    }

    #[test]
    fn test_generate_storage_key_uses_month_directory() {
        let now = Utc.with_ymd_and_hms(2025, 3, 9, 10, 0, 0).unwrap();
        let key = generate_storage_key(&IdGenerator::new(), now, "pdf");
        assert!(key.starts_with("202503/"));
        assert!(key.ends_with(".pdf"));
    }

    #[tokio::test]
    async fn test_local_storage_round_trip() {
        let dir = std::env::temp_dir().join(format!("docreq-test-{}", uuid::Uuid::new_v4()));
        let storage = LocalStorage::new(dir.clone(), "/uploads/".to_string());
        let policy = UploadPolicy::default();

        let stored = store_upload(&storage, &policy, &IdGenerator::new(), "slip.jpeg", b"hello")
            .await
            .unwrap();
        let path = dir.join(&stored.file_path);

        assert_eq!(stored.file_type, "image/jpeg");
        assert_eq!(stored.original_name, "slip.jpeg");
        assert_eq!(stored.size, 5);
        assert_eq!(stored.md5, "5d41402abc4b2a76b9719d911017c592");
        assert!(stored.file_path.ends_with(&stored.file_name));
        assert!(tokio::fs::try_exists(&path).await.unwrap());
        assert_eq!(
            storage.public_url(&stored.file_path),
            format!("/uploads/{}", stored.file_path)
        );

        storage.delete(&stored.file_path).await.unwrap();
        assert!(!tokio::fs::try_exists(&path).await.unwrap());

        tokio::fs::remove_dir_all(dir).await.ok();
    }
}
