use std::path::PathBuf;
use std::time::Duration;

use serde::Deserialize;

/// Remote list of master endpoints, one descriptor per line.
pub const MASTER_LIST_FILE: &str = "master_servers";

/// Remote list of content endpoints, one descriptor per line.
pub const CONTENT_LIST_FILE: &str = "file_servers";

/// Remote file holding the current version as a single integer.
pub const LIVE_VERSION_FILE: &str = "live_version";

/// Extension of a per-version manifest (`<version>.txt`).
pub const MANIFEST_EXTENSION: &str = "txt";

/// Top-level configuration for discovery runs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DiscoveryConfig {
    /// Last-known-good master endpoint list.
    pub master_cache_path: PathBuf,
    /// Last-known-good content endpoint list.
    pub content_cache_path: PathBuf,
    /// Directory for per-fetch temporary files.
    pub temp_dir: PathBuf,
    /// Interval between stop-condition checks.
    pub poll_interval_ms: u64,
    pub version_give_up_ms: u64,
    pub version_stall_ms: u64,
    pub manifest_give_up_ms: u64,
    pub manifest_stall_ms: u64,
    /// Upper bound on a single HTTP fetch, including the body. Fetches still
    /// running after a run returns are cut off here.
    pub fetch_timeout_ms: u64,
    /// Attempts at replacing a cache file before giving up.
    pub persist_attempts: u32,
    pub persist_retry_delay_ms: u64,
}

impl Default for DiscoveryConfig {
    fn default() -> Self {
        Self {
            master_cache_path: PathBuf::from("master_servers.txt"),
            content_cache_path: PathBuf::from("file_servers.txt"),
            temp_dir: std::env::temp_dir(),
            poll_interval_ms: 25,
            version_give_up_ms: 5_000,
            version_stall_ms: 500,
            manifest_give_up_ms: 20_000,
            manifest_stall_ms: 2_000,
            fetch_timeout_ms: 30_000,
            persist_attempts: 3,
            persist_retry_delay_ms: 100,
        }
    }
}

impl DiscoveryConfig {
    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms.max(1))
    }

    pub fn fetch_timeout(&self) -> Duration {
        Duration::from_millis(self.fetch_timeout_ms.max(1))
    }

    pub fn persist_retry_delay(&self) -> Duration {
        Duration::from_millis(self.persist_retry_delay_ms)
    }
}
