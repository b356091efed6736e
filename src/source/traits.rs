use std::path::Path;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use thiserror::Error;

use super::endpoint::Endpoint;

#[derive(Debug, Error)]
pub enum FetchError {
    /// The fetch was never started (bad path, transport unavailable).
    #[error("fetch not started: {0}")]
    NotStarted(anyhow::Error),
    /// The fetch started and failed.
    #[error("fetch failed: {0}")]
    Failed(anyhow::Error),
}

/// One remote endpoint able to copy a file to a local path.
///
/// Implementations must tolerate concurrent downloads of different remote
/// paths on the same instance.
#[async_trait]
pub trait Source: Send + Sync {
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), FetchError>;
}

/// Turns descriptors into live sources.
pub trait SourceFactory: Send + Sync {
    fn instantiate(&self, endpoint: &Endpoint) -> Result<Arc<dyn Source>>;
}
