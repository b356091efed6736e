use std::path::{Path, PathBuf};

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use super::endpoint::Endpoint;
use super::traits::{FetchError, Source};

/// Source backed by a local or mounted mirror directory (`file://` endpoints).
pub struct DirSource {
    root: PathBuf,
}

impl DirSource {
    pub fn new(root: PathBuf) -> Self {
        Self { root }
    }

    pub fn from_endpoint(endpoint: &Endpoint) -> Result<Self> {
        let root = endpoint
            .base()
            .to_file_path()
            .map_err(|_| anyhow!("endpoint {} is not a local directory", endpoint))?;
        Ok(Self::new(root))
    }
}

#[async_trait]
impl Source for DirSource {
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), FetchError> {
        let escapes = Path::new(remote_path).is_absolute()
            || remote_path.split('/').any(|part| part == "..");
        if escapes {
            return Err(FetchError::NotStarted(anyhow!(
                "remote path '{}' escapes the mirror root",
                remote_path
            )));
        }
        let from = self.root.join(remote_path);
        tokio::fs::copy(&from, local_path)
            .await
            .map(|_| ())
            .map_err(|e| FetchError::Failed(anyhow!("copy {} failed: {}", from.display(), e)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_dir_source_copies_and_reports_missing() {
        let mirror = tempfile::tempdir().unwrap();
        std::fs::write(mirror.path().join("live_version"), "12\n").unwrap();
        let out = tempfile::tempdir().unwrap();
        let local = out.path().join("artifact");

        let source = DirSource::new(mirror.path().to_path_buf());
        source.download("live_version", &local).await.unwrap();
        assert_eq!(std::fs::read_to_string(&local).unwrap(), "12\n");

        let missing = source.download("master_servers", &local).await;
        assert!(matches!(missing, Err(FetchError::Failed(_))));

        let escape = source.download("../etc/passwd", &local).await;
        assert!(matches!(escape, Err(FetchError::NotStarted(_))));

        let absolute = source.download("/etc/passwd", &local).await;
        assert!(matches!(absolute, Err(FetchError::NotStarted(_))));
    }
}
