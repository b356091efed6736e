// Endpoint descriptors and pluggable transports behind the `Source` trait.

pub mod dir_source;
pub mod endpoint;
pub mod http_source;
pub mod traits;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use reqwest::Client;

use dir_source::DirSource;
use endpoint::Endpoint;
use http_source::{build_client, HttpSource};
use traits::{Source, SourceFactory};

/// Default factory: HTTP(S) endpoints over a shared client, `file://` mirrors
/// from disk.
pub struct TransportFactory {
    client: Client,
}

impl TransportFactory {
    /// `fetch_timeout` bounds every HTTP fetch made by sources from this factory.
    pub fn new(fetch_timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(fetch_timeout)?,
        })
    }
}

impl SourceFactory for TransportFactory {
    fn instantiate(&self, endpoint: &Endpoint) -> Result<Arc<dyn Source>> {
        match endpoint.scheme() {
            "http" | "https" => Ok(Arc::new(HttpSource::with_client(
                self.client.clone(),
                endpoint.clone(),
            ))),
            "file" => Ok(Arc::new(DirSource::from_endpoint(endpoint)?)),
            other => Err(anyhow!(
                "unsupported endpoint scheme '{}' for {}",
                other,
                endpoint
            )),
        }
    }
}
