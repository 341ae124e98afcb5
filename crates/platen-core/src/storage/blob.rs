//! Filesystem-backed blob store.
//!
//! Blobs are content-addressed: the URL is `blob://<sha256>.<ext>` and the
//! bytes live at `<root>/<first two hash chars>/<sha256>.<ext>`. Writing
//! the same bytes twice yields the same URL and writes nothing new.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::debug;

use crate::error::{PlatenError, PlatenResult};
use crate::fingerprint::content_hash;
use crate::traits::BlobStore;

const SCHEME: &str = "blob://";

/// Content-addressed blob store over a local directory.
pub struct LocalBlobStore {
    root: PathBuf,
}

impl LocalBlobStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn extension_for(content_type: &str) -> &'static str {
        match content_type {
            "application/pdf" => "pdf",
            "image/png" => "png",
            "image/jpeg" => "jpg",
            "image/svg+xml" => "svg",
            "application/json" => "json",
            "text/markdown" => "md",
            _ => "bin",
        }
    }

    fn path_for(&self, name: &str) -> PlatenResult<PathBuf> {
        // URLs are produced by this store; reject anything that could
        // escape the root.
        if name.contains('/') || name.contains("..") {
            return Err(PlatenError::BlobStore(format!("malformed blob url: {name}")));
        }
        let shard = &name[..2.min(name.len())];
        Ok(self.root.join(shard).join(name))
    }

    fn name_from_url(url: &str) -> PlatenResult<&str> {
        url.strip_prefix(SCHEME)
            .ok_or_else(|| PlatenError::BlobStore(format!("not a blob url: {url}")))
    }
}

#[async_trait]
impl BlobStore for LocalBlobStore {
    async fn put(&self, bytes: &[u8], content_type: &str) -> PlatenResult<String> {
        let hash = content_hash(bytes);
        let name = format!("{hash}.{}", Self::extension_for(content_type));
        let path = self.path_for(&name)?;

        if !tokio::fs::try_exists(&path).await? {
            if let Some(parent) = path.parent() {
                tokio::fs::create_dir_all(parent).await?;
            }
            tokio::fs::write(&path, bytes).await?;
            debug!(blob = %name, size = bytes.len(), "stored blob");
        }
        Ok(format!("{SCHEME}{name}"))
    }

    async fn get(&self, url: &str) -> PlatenResult<Vec<u8>> {
        let name = Self::name_from_url(url)?;
        let path = self.path_for(name)?;
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(bytes),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(PlatenError::NotFound(format!("blob {url}")))
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn sign_url(&self, url: &str, _expires_secs: u64) -> PlatenResult<String> {
        // Local files need no signing; return the absolute path as a
        // file URL so callers always get something fetchable.
        let name = Self::name_from_url(url)?;
        let path = self.path_for(name)?;
        Ok(format!("file://{}", absolute(&path).display()))
    }
}

fn absolute(path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()
            .map(|cwd| cwd.join(path))
            .unwrap_or_else(|_| path.to_path_buf())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, LocalBlobStore) {
        let dir = TempDir::new().unwrap();
        let store = LocalBlobStore::new(dir.path());
        (dir, store)
    }

    #[tokio::test]
    async fn test_put_get_round_trip() {
        let (_dir, store) = store();
        let url = store.put(b"fuser assembly", "image/png").await.unwrap();
        assert!(url.starts_with("blob://"));
        assert!(url.ends_with(".png"));
        let bytes = store.get(&url).await.unwrap();
        assert_eq!(bytes, b"fuser assembly");
    }

    #[tokio::test]
    async fn test_put_is_content_addressed() {
        let (_dir, store) = store();
        let a = store.put(b"same bytes", "application/pdf").await.unwrap();
        let b = store.put(b"same bytes", "application/pdf").await.unwrap();
        assert_eq!(a, b);
        let c = store.put(b"other bytes", "application/pdf").await.unwrap();
        assert_ne!(a, c);
    }

    #[tokio::test]
    async fn test_get_missing_blob() {
        let (_dir, store) = store();
        let err = store.get("blob://deadbeef.png").await.unwrap_err();
        assert!(matches!(err, PlatenError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_rejects_path_escape() {
        let (_dir, store) = store();
        let err = store.get("blob://../etc/passwd").await.unwrap_err();
        assert!(matches!(err, PlatenError::BlobStore(_)));
    }

    #[tokio::test]
    async fn test_sign_url_points_at_file() {
        let (_dir, store) = store();
        let url = store.put(b"doc", "application/pdf").await.unwrap();
        let signed = store.sign_url(&url, 600).await.unwrap();
        assert!(signed.starts_with("file://"));
    }
}
