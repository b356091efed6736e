// In-memory transport for driving discovery runs without a network.

#![allow(dead_code)]

use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use anyhow::anyhow;
use async_trait::async_trait;
use parking_lot::Mutex;

use ma_discovery_engine::source::traits::{FetchError, Source, SourceFactory};
use ma_discovery_engine::Endpoint;

/// Long enough to outlast any run in these tests.
pub const NEVER: u64 = 60_000;

struct MockFile {
    latency: Duration,
    body: Option<String>,
}

#[derive(Default)]
pub struct MockSource {
    files: Mutex<HashMap<String, MockFile>>,
    calls: Mutex<HashMap<String, usize>>,
}

impl MockSource {
    /// Serve `body` for `remote` after `latency_ms`.
    pub fn serve(&self, remote: &str, latency_ms: u64, body: &str) -> &Self {
        self.files.lock().insert(
            remote.to_string(),
            MockFile {
                latency: Duration::from_millis(latency_ms),
                body: Some(body.to_string()),
            },
        );
        self
    }

    /// Fail `remote` after `latency_ms`.
    pub fn fail(&self, remote: &str, latency_ms: u64) -> &Self {
        self.files.lock().insert(
            remote.to_string(),
            MockFile {
                latency: Duration::from_millis(latency_ms),
                body: None,
            },
        );
        self
    }

    pub fn calls(&self, remote: &str) -> usize {
        self.calls.lock().get(remote).copied().unwrap_or(0)
    }

    pub fn total_calls(&self) -> usize {
        self.calls.lock().values().sum()
    }
}

#[async_trait]
impl Source for MockSource {
    async fn download(&self, remote_path: &str, local_path: &Path) -> Result<(), FetchError> {
        *self.calls.lock().entry(remote_path.to_string()).or_insert(0) += 1;

        let planned = {
            let files = self.files.lock();
            files.get(remote_path).map(|f| (f.latency, f.body.clone()))
        };
        let Some((latency, body)) = planned else {
            return Err(FetchError::Failed(anyhow!("{} not found", remote_path)));
        };

        tokio::time::sleep(latency).await;
        match body {
            Some(body) => tokio::fs::write(local_path, body)
                .await
                .map_err(|e| FetchError::Failed(e.into())),
            None => Err(FetchError::Failed(anyhow!("{} failed", remote_path))),
        }
    }
}

/// Factory resolving endpoints to registered mock hosts; anything else fails
/// to instantiate.
#[derive(Default)]
pub struct MockNetwork {
    hosts: Mutex<HashMap<String, Arc<MockSource>>>,
    instantiated: Mutex<Vec<String>>,
}

impl MockNetwork {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn host(&self, url: &str) -> Arc<MockSource> {
        let key = endpoint(url).to_line();
        Arc::clone(self.hosts.lock().entry(key).or_default())
    }

    pub fn instantiated(&self) -> Vec<String> {
        self.instantiated.lock().clone()
    }
}

impl SourceFactory for MockNetwork {
    fn instantiate(&self, endpoint: &Endpoint) -> anyhow::Result<Arc<dyn Source>> {
        let key = endpoint.to_line();
        let source = self
            .hosts
            .lock()
            .get(&key)
            .cloned()
            .ok_or_else(|| anyhow!("no route to {}", key))?;
        self.instantiated.lock().push(key);
        Ok(source)
    }
}

pub fn endpoint(url: &str) -> Endpoint {
    Endpoint::parse(url).unwrap()
}

/// Instantiate initial sources the way the client does.
pub fn sources(network: &MockNetwork, urls: &[&str]) -> Vec<(Endpoint, Arc<dyn Source>)> {
    urls.iter()
        .map(|url| {
            let endpoint = endpoint(url);
            let source = network.instantiate(&endpoint).unwrap();
            (endpoint, source)
        })
        .collect()
}
