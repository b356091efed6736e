use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::Client;
use tracing::{debug, warn};

use super::endpoint::Endpoint;
use super::traits::{FetchError, Source};

pub struct HttpSource {
    client: Client,
    endpoint: Endpoint,
}

/// Client whose requests are cut off after `timeout`, so an endpoint that
/// accepts the connection but never answers cannot hold a fetch forever.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .build()
        .map_err(|e| anyhow!("cannot build http client: {}", e))
}

impl HttpSource {
    pub fn new(endpoint: Endpoint, timeout: Duration) -> Result<Self> {
        Ok(Self::with_client(build_client(timeout)?, endpoint))
    }

    /// Share a connection pool across sources.
    pub fn with_client(client: Client, endpoint: Endpoint) -> Self {
        Self { client, endpoint }
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }
}

#[async_trait]
impl Source for HttpSource {
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), FetchError> {
        let url = self.endpoint.join(remote_path).map_err(FetchError::NotStarted)?;

        let resp = self
            .client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| FetchError::Failed(e.into()))?;

        let status = resp.status();
        debug!("http fetch url={} status={}", url, status.as_u16());
        if !status.is_success() {
            warn!("http fetch failed url={} status={}", url, status.as_u16());
            return Err(FetchError::Failed(anyhow!(
                "GET {} failed: HTTP {}",
                url,
                status.as_u16()
            )));
        }

        let bytes = resp.bytes().await.map_err(|e| FetchError::Failed(e.into()))?;
        tokio::fs::write(local_path, &bytes)
            .await
            .map_err(|e| FetchError::Failed(e.into()))?;
        Ok(())
    }
}
