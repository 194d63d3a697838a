//! HTTP provider.

use crate::error::{ProviderError, ProviderResult};
use crate::provider::{PathKey, Provider};
use crate::uri::MountUri;
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use tracing::warn;

/// Mounts a remote resource tree served over `http`/`https`. Issues a
/// `HEAD` for size, a `GET` for full reads, and a ranged `GET` for
/// partial reads.
pub struct HttpProvider {
    client: Client,
    base_url: String,
}

impl HttpProvider {
    fn resource_url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    fn map_status(status: StatusCode) -> ProviderResult<()> {
        match status {
            StatusCode::OK | StatusCode::PARTIAL_CONTENT | StatusCode::NOT_MODIFIED => Ok(()),
            StatusCode::NOT_FOUND => Err(ProviderError::NotFound),
            other => Err(ProviderError::HttpStatus(other.as_u16())),
        }
    }
}

#[async_trait]
impl Provider for HttpProvider {
    fn can_mount(uri: &MountUri) -> bool {
        matches!(uri.scheme.as_str(), "http" | "https")
    }

    async fn mount(uri: &MountUri, _base: Option<&str>) -> ProviderResult<Self> {
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(Self {
            client,
            base_url: uri.to_uri_string(),
        })
    }

    async fn get_file_size(&self, key: PathKey<'_>) -> ProviderResult<u64> {
        let url = self.resource_url(key.path);
        let response = self
            .client
            .head(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::map_status(response.status())?;
        response
            .content_length()
            .ok_or_else(|| ProviderError::InvalidData("missing Content-Length".into()))
    }

    async fn read_file(&self, key: PathKey<'_>) -> ProviderResult<Vec<u8>> {
        let url = self.resource_url(key.path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::map_status(response.status())?;

        let announced = response.content_length();
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;

        if let Some(expected) = announced {
            if bytes.len() as u64 > expected {
                return Err(ProviderError::InvalidData(
                    "response body exceeded announced Content-Length".into(),
                ));
            }
            if bytes.len() as u64 != expected {
                warn!(url, expected, actual = bytes.len(), "content-length mismatch: response body did not match header");
            }
        }

        Ok(bytes.to_vec())
    }

    async fn read_file_partial(
        &self,
        key: PathKey<'_>,
        offset: u64,
        size: u64,
    ) -> ProviderResult<Vec<u8>> {
        let url = self.resource_url(key.path);
        let end = offset + size.saturating_sub(1);
        let response = self
            .client
            .get(&url)
            .header("Range", format!("bytes={offset}-{end}"))
            .send()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Self::map_status(response.status())?;
        let bytes = response
            .bytes()
            .await
            .map_err(|e| ProviderError::Http(e.to_string()))?;
        Ok(bytes.to_vec())
    }
}
