//! File-tree provider.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{PathKey, Provider};
use crate::uri::MountUri;
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs;

/// Mounts a plain directory tree. Resolves `<location><path><relative>`
/// through the filesystem directly; performs no verification or decryption.
pub struct FileProvider {
    root: PathBuf,
}

impl FileProvider {
    fn resolve(&self, path: &str) -> PathBuf {
        self.root.join(path.trim_start_matches('/'))
    }
}

#[async_trait]
impl Provider for FileProvider {
    fn can_mount(uri: &MountUri) -> bool {
        matches!(uri.scheme.as_str(), "file" | "data" | "host")
    }

    async fn mount(uri: &MountUri, _base: Option<&str>) -> ProviderResult<Self> {
        let mut root = PathBuf::from(&uri.location);
        root.push(&uri.path);
        Ok(Self { root })
    }

    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        let path = self.resolve(key.path);
        let meta = fs::metadata(&path)
            .await
            .map_err(|_| ProviderError::NotFound)?;
        Ok(meta.len())
    }

    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        let path = self.resolve(key.path);
        fs::read(&path).await.map_err(|_| ProviderError::NotFound)
    }

    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        use tokio::io::{AsyncReadExt, AsyncSeekExt};

        let path = self.resolve(key.path);
        let mut file = fs::File::open(&path)
            .await
            .map_err(|_| ProviderError::NotFound)?;
        file.seek(std::io::SeekFrom::Start(offset)).await?;
        let mut buf = vec![0u8; size as usize];
        file.read_exact(&mut buf).await?;
        Ok(buf)
    }

    async fn write_file(&mut self, key: PathKey<'_>, payload: &[u8]) -> ProviderResult<()> {
        let path = self.resolve(key.path);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).await?;
        }
        fs::write(&path, payload).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_back_written_file() {
        let dir = tempfile::tempdir().unwrap();
        let uri = MountUri {
            scheme: "file".into(),
            location: dir.path().to_string_lossy().into_owned(),
            path: String::new(),
            hostname: None,
            port: None,
        };
        let mut provider = FileProvider::mount(&uri, None).await.unwrap();
        let key = PathKey {
            hash: 1,
            path: "/sub/thing.txt",
        };
        provider.write_file(key, b"payload").await.unwrap();
        let size = provider.get_file_size(key).await.unwrap();
        assert_eq!(size, 7);
        let data = provider.read_file(key).await.unwrap();
        assert_eq!(data, b"payload");
        let partial = provider.read_file_partial(key, 2, 3).await.unwrap();
        assert_eq!(partial, b"ylo");
    }

    #[tokio::test]
    async fn missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let uri = MountUri {
            scheme: "file".into(),
            location: dir.path().to_string_lossy().into_owned(),
            path: String::new(),
            hostname: None,
            port: None,
        };
        let provider = FileProvider::mount(&uri, None).await.unwrap();
        let err = provider
            .get_file_size(PathKey {
                hash: 1,
                path: "/missing",
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderError::NotFound));
    }
}
