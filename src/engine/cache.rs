// Last-known-good endpoint lists on disk. Reads and writes from every run in
// the process are serialized by one lock; writes replace the file atomically.

use std::fs;
use std::io::{ErrorKind, Write};
use std::path::Path;
use std::time::Duration;

use anyhow::{anyhow, Result};
use parking_lot::{const_mutex, Mutex};
use tempfile::NamedTempFile;
use tracing::{debug, info, warn};

use crate::source::endpoint::{parse_endpoint_list, render_endpoint_list, Endpoint};

static CACHE_IO_LOCK: Mutex<()> = const_mutex(());

/// Load a cached list. A missing file is an empty list; malformed lines come
/// back as error messages.
pub async fn load_endpoint_list(path: &Path) -> Result<(Vec<Endpoint>, Vec<String>)> {
    let owned = path.to_path_buf();
    let text = tokio::task::spawn_blocking(move || read_locked(&owned))
        .await
        .map_err(|e| anyhow!("cache read task failed: {}", e))??;
    Ok(match text {
        Some(text) => parse_endpoint_list(&text),
        None => (Vec::new(), Vec::new()),
    })
}

fn read_locked(path: &Path) -> Result<Option<String>> {
    let _guard = CACHE_IO_LOCK.lock();
    match fs::read_to_string(path) {
        Ok(text) => Ok(Some(text)),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            debug!("endpoint cache {} not found", path.display());
            Ok(None)
        }
        Err(e) => Err(anyhow!("cannot read {}: {}", path.display(), e)),
    }
}

/// Replace a cached list if `endpoints` is non-empty, retrying up to
/// `attempts` times. Returns whether the file was written; failures are only
/// logged.
pub async fn persist_endpoint_list(
    path: &Path,
    endpoints: &[Endpoint],
    attempts: u32,
    retry_delay: Duration,
) -> bool {
    if endpoints.is_empty() {
        debug!("nothing discovered for {}, keeping cache", path.display());
        return false;
    }
    let content = render_endpoint_list(endpoints);
    let attempts = attempts.max(1);

    for attempt in 1..=attempts {
        let (target, text) = (path.to_path_buf(), content.clone());
        let written = tokio::task::spawn_blocking(move || write_atomic(&target, &text))
            .await
            .map_err(|e| anyhow!("cache write task failed: {}", e))
            .and_then(|r| r);
        match written {
            Ok(()) => {
                info!(
                    "endpoint cache {} updated ({} entries)",
                    path.display(),
                    endpoints.len()
                );
                return true;
            }
            Err(e) if attempt < attempts => {
                warn!(
                    "endpoint cache {} write failed (attempt {}): {}",
                    path.display(),
                    attempt,
                    e
                );
                tokio::time::sleep(retry_delay).await;
            }
            Err(e) => {
                warn!(
                    "endpoint cache {} write failed after {} attempts: {}",
                    path.display(),
                    attempts,
                    e
                );
            }
        }
    }
    false
}

fn write_atomic(path: &Path, content: &str) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let _guard = CACHE_IO_LOCK.lock();
    fs::create_dir_all(dir)?;
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| anyhow!("{}", e.error))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn endpoints(names: &[&str]) -> Vec<Endpoint> {
        names
            .iter()
            .map(|n| Endpoint::parse(&format!("http://{}.example/", n)).unwrap())
            .collect()
    }

    #[tokio::test]
    async fn test_load_missing_file_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let (list, errors) = load_endpoint_list(&dir.path().join("absent.txt"))
            .await
            .unwrap();
        assert!(list.is_empty());
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_persist_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("master_servers.txt");
        let list = endpoints(&["a", "b"]);

        assert!(persist_endpoint_list(&path, &list, 3, Duration::from_millis(1)).await);
        let (loaded, errors) = load_endpoint_list(&path).await.unwrap();
        assert_eq!(loaded, list);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_empty_list_leaves_cache_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file_servers.txt");
        let original = b"# hand edited\nhttp://keep.example/\n";
        std::fs::write(&path, original).unwrap();

        assert!(!persist_endpoint_list(&path, &[], 3, Duration::from_millis(1)).await);
        assert_eq!(std::fs::read(&path).unwrap(), original);
    }

    #[tokio::test(flavor = "current_thread")]
    async fn test_lock_wait_leaves_runtime_free() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("master_servers.txt");
        let target = path.clone();
        let list = endpoints(&["a"]);

        let guard = CACHE_IO_LOCK.lock();
        let writer = tokio::spawn(async move {
            persist_endpoint_list(&target, &list, 1, Duration::from_millis(1)).await
        });
        // The writer waits on the blocking pool; this thread keeps running tasks.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert!(!writer.is_finished());
        drop(guard);

        assert!(writer.await.unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "http://a.example/\n");
    }

    #[tokio::test]
    async fn test_persist_gives_up_quietly() {
        let dir = tempfile::tempdir().unwrap();
        // A directory cannot be replaced by a file.
        let path = dir.path().join("occupied");
        std::fs::create_dir(&path).unwrap();
        std::fs::write(path.join("inside"), "x").unwrap();

        let written =
            persist_endpoint_list(&path, &endpoints(&["a"]), 2, Duration::from_millis(1)).await;
        assert!(!written);
        assert!(path.is_dir());
    }
}
