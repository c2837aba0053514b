use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use uuid::Uuid;

/// URL prefix under which stored files are served
pub const UPLOADS_URL_PREFIX: &str = "/uploads";

/// Local-disk storage for uploaded images
#[derive(Debug, Clone)]
pub struct UploadStore {
    dir: PathBuf,
}

impl UploadStore {
    pub fn new(dir: impl Into<PathBuf>) -> Result<Self> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create upload directory {}", dir.display()))?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Whether an upload looks like an image, by declared content type or file name
    pub fn is_image(file_name: Option<&str>, content_type: Option<&str>) -> bool {
        if let Some(ct) = content_type {
            if let Ok(mime) = ct.parse::<mime_guess::Mime>() {
                if mime.type_() == mime_guess::mime::IMAGE {
                    return true;
                }
            }
        }

        file_name
            .and_then(|name| mime_guess::from_path(name).first())
            .map(|mime| mime.type_() == mime_guess::mime::IMAGE)
            .unwrap_or(false)
    }

    /// Store bytes under a fresh name and return the public URL
    pub async fn save(&self, original_name: Option<&str>, bytes: &[u8]) -> Result<String> {
        let extension = original_name
            .and_then(|name| Path::new(name).extension())
            .and_then(|ext| ext.to_str())
            .filter(|ext| !ext.is_empty() && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .map(str::to_ascii_lowercase)
            .unwrap_or_else(|| "img".to_string());

        let file_name = format!("{}.{}", Uuid::new_v4(), extension);
        let path = self.dir.join(&file_name);
        tokio::fs::write(&path, bytes)
            .await
            .with_context(|| format!("Failed to write upload {}", path.display()))?;

        tracing::debug!("Stored upload {} ({} bytes)", file_name, bytes.len());
        Ok(format!("{}/{}", UPLOADS_URL_PREFIX, file_name))
    }

    /// Remove a previously stored file by its public URL
    ///
    /// URLs outside the uploads prefix, or naming nested paths, are ignored.
    pub async fn remove(&self, url: &str) {
        let Some(name) = url
            .strip_prefix(UPLOADS_URL_PREFIX)
            .and_then(|rest| rest.strip_prefix('/'))
        else {
            return;
        };
        if name.is_empty() || name.contains('/') || name.contains("..") {
            return;
        }

        if let Err(e) = tokio::fs::remove_file(self.dir.join(name)).await {
            tracing::warn!("Failed to remove upload {}: {}", name, e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_image_detection() {
        assert!(UploadStore::is_image(Some("cat.png"), None));
        assert!(UploadStore::is_image(None, Some("image/jpeg")));
        assert!(UploadStore::is_image(Some("blob"), Some("image/webp")));
        assert!(!UploadStore::is_image(Some("notes.txt"), Some("text/plain")));
        assert!(!UploadStore::is_image(None, None));
    }

    #[tokio::test]
    async fn test_save_and_remove() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();

        let url = store.save(Some("Photo.PNG"), b"fake-bytes").await.unwrap();
        assert!(url.starts_with("/uploads/"));
        assert!(url.ends_with(".png"));

        let name = url.trim_start_matches("/uploads/");
        assert!(dir.path().join(name).exists());

        store.remove(&url).await;
        assert!(!dir.path().join(name).exists());
    }

    #[tokio::test]
    async fn test_remove_ignores_foreign_paths() {
        let dir = tempfile::tempdir().unwrap();
        let store = UploadStore::new(dir.path()).unwrap();
        store.remove("/etc/passwd").await;
        store.remove("/uploads/../secret").await;
    }
}
