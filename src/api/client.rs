// Facade: one discovery run per read, from the endpoint cache back to it.

use std::sync::Arc;

use tokio::runtime::Handle;
use tracing::{info, warn};

use crate::config::DiscoveryConfig;
use crate::engine::cache::{load_endpoint_list, persist_endpoint_list};
use crate::engine::orchestrator::{Orchestrator, Target};
use crate::engine::result::DiscoveryResult;
use crate::error::DiscoveryError;
use crate::source::endpoint::Endpoint;
use crate::source::traits::{Source, SourceFactory};

/// Entry point for version and manifest discovery.
///
/// Each read loads the cached master endpoints, runs one orchestrator to
/// completion on its own task, writes any newly discovered lists back to the
/// cache and hands the result to the caller.
#[derive(Clone)]
pub struct DiscoveryClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: DiscoveryConfig,
    factory: Arc<dyn SourceFactory>,
    runtime: Handle,
}

impl DiscoveryClient {
    /// Bind to the current tokio runtime.
    pub fn new(
        config: DiscoveryConfig,
        factory: Arc<dyn SourceFactory>,
    ) -> Result<Self, DiscoveryError> {
        let runtime =
            Handle::try_current().map_err(|e| DiscoveryError::NoRuntime(e.to_string()))?;
        Ok(Self::with_runtime(config, factory, runtime))
    }

    pub fn with_runtime(
        config: DiscoveryConfig,
        factory: Arc<dyn SourceFactory>,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                factory,
                runtime,
            }),
        }
    }

    pub fn config(&self) -> &DiscoveryConfig {
        &self.inner.config
    }

    /// Start reading the current version. `callback` runs exactly once, on a
    /// spawned task, never inside this call.
    pub fn begin_read_version<S, F>(&self, state: S, callback: F)
    where
        S: Send + 'static,
        F: FnOnce(&DiscoveryClient, &DiscoveryResult, S) + Send + 'static,
    {
        self.begin(Target::CurrentVersion, state, callback);
    }

    /// Start reading the manifest of `version`.
    pub fn begin_read_manifest<S, F>(&self, version: u64, state: S, callback: F)
    where
        S: Send + 'static,
        F: FnOnce(&DiscoveryClient, &DiscoveryResult, S) + Send + 'static,
    {
        self.begin(Target::Manifest(version), state, callback);
    }

    pub async fn read_version(&self) -> Arc<DiscoveryResult> {
        self.run(Target::CurrentVersion).await
    }

    pub async fn read_manifest(&self, version: u64) -> Arc<DiscoveryResult> {
        self.run(Target::Manifest(version)).await
    }

    fn begin<S, F>(&self, target: Target, state: S, callback: F)
    where
        S: Send + 'static,
        F: FnOnce(&DiscoveryClient, &DiscoveryResult, S) + Send + 'static,
    {
        let client = self.clone();
        self.inner.runtime.spawn(async move {
            let result = client.run(target).await;
            callback(&client, &result, state);
        });
    }

    async fn run(&self, target: Target) -> Arc<DiscoveryResult> {
        let result = Arc::new(match target {
            Target::CurrentVersion => DiscoveryResult::new(),
            Target::Manifest(version) => DiscoveryResult::for_version(version),
        });

        let sources = self.load_sources(&result).await;
        if sources.is_empty() {
            warn!("discovery for {} skipped: no usable sources", target.remote_file());
            return result;
        }

        let orchestrator = Orchestrator::new(
            Arc::clone(&result),
            &sources,
            Arc::clone(&self.inner.factory),
            target,
            &self.inner.config,
        );
        if let Err(e) = orchestrator.execute(None, None).await {
            result.append_error(e.to_string());
        }
        orchestrator.dispose();

        self.persist(&result).await;
        result
    }

    async fn load_sources(
        &self,
        result: &DiscoveryResult,
    ) -> Vec<(Endpoint, Arc<dyn Source>)> {
        let path = &self.inner.config.master_cache_path;
        let (endpoints, parse_errors) = match load_endpoint_list(path).await {
            Ok(loaded) => loaded,
            Err(e) => {
                warn!("endpoint cache unreadable: {}", e);
                result.append_error(e.to_string());
                (Vec::new(), Vec::new())
            }
        };
        for e in parse_errors {
            result.append_error(format!("{}: {}", path.display(), e));
        }
        if endpoints.is_empty() {
            result.append_error("no descriptors found");
            return Vec::new();
        }

        let mut sources: Vec<(Endpoint, Arc<dyn Source>)> = Vec::with_capacity(endpoints.len());
        for endpoint in endpoints {
            match self.inner.factory.instantiate(&endpoint) {
                Ok(source) => sources.push((endpoint, source)),
                Err(e) => result.append_error(format!("cannot use {}: {}", endpoint, e)),
            }
        }
        if sources.is_empty() {
            result.append_error("no usable sources");
        } else {
            info!("loaded {} master endpoints from {}", sources.len(), path.display());
        }
        sources
    }

    async fn persist(&self, result: &DiscoveryResult) {
        let config = &self.inner.config;
        persist_endpoint_list(
            &config.master_cache_path,
            &result.master_endpoints(),
            config.persist_attempts,
            config.persist_retry_delay(),
        )
        .await;
        persist_endpoint_list(
            &config.content_cache_path,
            &result.content_endpoints(),
            config.persist_attempts,
            config.persist_retry_delay(),
        )
        .await;
    }
}
