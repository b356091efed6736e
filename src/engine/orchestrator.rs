// Discovery orchestrator: queries every known source for the endpoint lists and
// the target file at once, grows the source set from master lists, and stops on
// full completion, an elapsed stall window, or the give-up deadline.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use super::result::DiscoveryResult;
use crate::config::{
    DiscoveryConfig, CONTENT_LIST_FILE, LIVE_VERSION_FILE, MANIFEST_EXTENSION, MASTER_LIST_FILE,
};
use crate::error::DiscoveryError;
use crate::source::endpoint::{parse_endpoint_list, Endpoint};
use crate::source::traits::{FetchError, Source, SourceFactory};

/// What a run is trying to learn.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Target {
    CurrentVersion,
    Manifest(u64),
}

impl Target {
    pub fn remote_file(&self) -> String {
        match self {
            Target::CurrentVersion => LIVE_VERSION_FILE.to_string(),
            Target::Manifest(version) => format!("{}.{}", version, MANIFEST_EXTENSION),
        }
    }

    /// Default (give-up, stall) timing for this target.
    pub fn default_timing(&self, config: &DiscoveryConfig) -> (Duration, Duration) {
        let (give_up, stall) = match self {
            Target::CurrentVersion => (config.version_give_up_ms, config.version_stall_ms),
            Target::Manifest(_) => (config.manifest_give_up_ms, config.manifest_stall_ms),
        };
        (Duration::from_millis(give_up), Duration::from_millis(stall))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    MasterList,
    ContentList,
    Target,
}

impl Category {
    pub const ALL: [Category; 3] = [Category::MasterList, Category::ContentList, Category::Target];

    fn index(self) -> usize {
        match self {
            Category::MasterList => 0,
            Category::ContentList => 1,
            Category::Target => 2,
        }
    }
}

/// Outcome of one fetch, delivered from the task that ran it.
#[derive(Debug)]
pub enum FetchEvent {
    Success {
        category: Category,
        endpoint: Endpoint,
        remote_file: String,
        local_file: PathBuf,
    },
    Failure {
        category: Category,
        endpoint: Endpoint,
        remote_file: String,
        error: String,
    },
}

impl FetchEvent {
    pub fn category(&self) -> Category {
        match self {
            FetchEvent::Success { category, .. } | FetchEvent::Failure { category, .. } => {
                *category
            }
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every launched fetch reported back.
    Completed,
    /// The stall window after the first answer elapsed.
    Stalled,
    /// The absolute deadline passed.
    GaveUp,
}

#[derive(Debug, Clone)]
pub struct RunSummary {
    pub reason: StopReason,
    pub elapsed: Duration,
    /// Sources known when the run stopped, discovered ones included.
    pub sources: usize,
}

struct KnownSource {
    endpoint: Endpoint,
    source: Arc<dyn Source>,
}

struct Shared {
    result: Arc<DiscoveryResult>,
    factory: Arc<dyn SourceFactory>,
    target: Target,
    target_file: String,
    temp_dir: PathBuf,
    sources: Mutex<Vec<KnownSource>>,
    in_flight: [AtomicUsize; 3],
    answered_at: Mutex<Option<Instant>>,
    dispose_token: CancellationToken,
}

pub struct Orchestrator {
    shared: Arc<Shared>,
    launched: AtomicBool,
    poll_interval: Duration,
    default_give_up: Duration,
    default_stall: Duration,
}

impl Orchestrator {
    /// The initial sources are copied; later growth never touches the caller's list.
    /// Entries identical to an earlier one are dropped.
    pub fn new(
        result: Arc<DiscoveryResult>,
        sources: &[(Endpoint, Arc<dyn Source>)],
        factory: Arc<dyn SourceFactory>,
        target: Target,
        config: &DiscoveryConfig,
    ) -> Self {
        let mut known: Vec<KnownSource> = Vec::with_capacity(sources.len());
        for (endpoint, source) in sources {
            if known.iter().any(|k| k.endpoint.is_identical_to(endpoint)) {
                warn!("duplicate initial source {} ignored", endpoint);
                continue;
            }
            known.push(KnownSource {
                endpoint: endpoint.clone(),
                source: Arc::clone(source),
            });
        }
        let (default_give_up, default_stall) = target.default_timing(config);

        Self {
            shared: Arc::new(Shared {
                result,
                factory,
                target,
                target_file: target.remote_file(),
                temp_dir: config.temp_dir.clone(),
                sources: Mutex::new(known),
                in_flight: [AtomicUsize::new(0), AtomicUsize::new(0), AtomicUsize::new(0)],
                answered_at: Mutex::new(None),
                dispose_token: CancellationToken::new(),
            }),
            launched: AtomicBool::new(false),
            poll_interval: config.poll_interval(),
            default_give_up,
            default_stall,
        }
    }

    /// Run until every fetch reports, the stall window elapses, or the give-up
    /// deadline passes. `None` picks the target's defaults.
    pub async fn execute(
        &self,
        give_up: Option<Duration>,
        stall: Option<Duration>,
    ) -> Result<RunSummary, DiscoveryError> {
        if self.shared.dispose_token.is_cancelled() {
            return Err(DiscoveryError::Disposed);
        }
        let give_up = give_up.unwrap_or(self.default_give_up);
        let stall = stall.unwrap_or(self.default_stall);
        let started = Instant::now();
        let give_up_at = started + give_up;

        if !self.launched.swap(true, Ordering::SeqCst) {
            if let Err(e) = std::fs::create_dir_all(&self.shared.temp_dir) {
                warn!("cannot create temp dir {}: {}", self.shared.temp_dir.display(), e);
            }
            let initial: Vec<(Endpoint, Arc<dyn Source>)> = self
                .shared
                .sources
                .lock()
                .iter()
                .map(|k| (k.endpoint.clone(), Arc::clone(&k.source)))
                .collect();
            info!(
                "discovery started target={} sources={} give_up_ms={} stall_ms={}",
                self.shared.target_file,
                initial.len(),
                give_up.as_millis(),
                stall.as_millis()
            );
            for (endpoint, source) in initial {
                self.shared.launch_all(endpoint, source);
            }
        }

        let reason = loop {
            if self.shared.is_idle() {
                break StopReason::Completed;
            }
            let now = Instant::now();
            let answered_at = *self.shared.answered_at.lock();
            if let Some(at) = answered_at {
                if now >= at + stall {
                    break StopReason::Stalled;
                }
            }
            if now >= give_up_at {
                break StopReason::GaveUp;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.poll_interval) => {}
                _ = self.shared.dispose_token.cancelled() => {
                    return Err(DiscoveryError::Disposed);
                }
            }
        };

        let summary = RunSummary {
            reason,
            elapsed: started.elapsed(),
            sources: self.shared.sources.lock().len(),
        };
        info!(
            "discovery finished target={} reason={:?} elapsed_ms={} sources={}",
            self.shared.target_file,
            summary.reason,
            summary.elapsed.as_millis(),
            summary.sources
        );
        Ok(summary)
    }

    /// Stop launching fetches and wake any pending `execute`. Fetches already in
    /// flight still report into the result.
    pub fn dispose(&self) {
        if !self.shared.dispose_token.is_cancelled() {
            debug!("orchestrator for {} disposed", self.shared.target_file);
            self.shared.dispose_token.cancel();
        }
    }

    pub fn target(&self) -> Target {
        self.shared.target
    }

    pub fn known_endpoints(&self) -> Vec<Endpoint> {
        self.shared
            .sources
            .lock()
            .iter()
            .map(|k| k.endpoint.clone())
            .collect()
    }

    pub fn in_flight(&self, category: Category) -> usize {
        self.shared.in_flight[category.index()].load(Ordering::SeqCst)
    }
}

impl Drop for Orchestrator {
    fn drop(&mut self) {
        self.dispose();
    }
}

impl Shared {
    fn remote_file(&self, category: Category) -> &str {
        match category {
            Category::MasterList => MASTER_LIST_FILE,
            Category::ContentList => CONTENT_LIST_FILE,
            Category::Target => &self.target_file,
        }
    }

    fn is_idle(&self) -> bool {
        self.in_flight
            .iter()
            .all(|counter| counter.load(Ordering::SeqCst) == 0)
    }

    fn launch_all(self: &Arc<Self>, endpoint: Endpoint, source: Arc<dyn Source>) {
        for category in Category::ALL {
            self.launch(endpoint.clone(), Arc::clone(&source), category);
        }
    }

    fn launch(self: &Arc<Self>, endpoint: Endpoint, source: Arc<dyn Source>, category: Category) {
        let remote_file = self.remote_file(category).to_string();
        self.in_flight[category.index()].fetch_add(1, Ordering::SeqCst);

        let artifact = match tempfile::Builder::new()
            .prefix("ma-fetch-")
            .tempfile_in(&self.temp_dir)
        {
            Ok(file) => file.into_temp_path(),
            Err(e) => {
                warn!(
                    "fetch {} from {} not started: temp file: {}",
                    remote_file, endpoint, e
                );
                self.credit(category);
                return;
            }
        };

        let shared = Arc::clone(self);
        tokio::spawn(async move {
            let local_file = artifact.to_path_buf();
            let event = match source.download(&remote_file, &local_file).await {
                Ok(()) => Some(FetchEvent::Success {
                    category,
                    endpoint,
                    remote_file,
                    local_file,
                }),
                Err(FetchError::NotStarted(e)) => {
                    debug!("fetch {} from {} not started: {}", remote_file, endpoint, e);
                    None
                }
                Err(FetchError::Failed(e)) => Some(FetchEvent::Failure {
                    category,
                    endpoint,
                    remote_file,
                    error: e.to_string(),
                }),
            };
            if let Some(event) = event {
                shared.process(event).await;
            }
            drop(artifact);
            shared.credit(category);
        });
    }

    /// Apply one outcome to the result. Sources spawned from a master list are
    /// launched before this returns, so before the launch is credited.
    async fn process(self: &Arc<Self>, event: FetchEvent) {
        match event {
            FetchEvent::Failure {
                endpoint,
                remote_file,
                error,
                ..
            } => {
                debug!("fetch {} from {} failed: {}", remote_file, endpoint, error);
            }
            FetchEvent::Success {
                category,
                endpoint,
                remote_file,
                local_file,
            } => {
                if remote_file != self.remote_file(category) {
                    error!(
                        "unexpected remote file {} for {:?} from {}, ignoring",
                        remote_file, category, endpoint
                    );
                    return;
                }
                match tokio::fs::read_to_string(&local_file).await {
                    Ok(text) => self.apply(category, &endpoint, text),
                    Err(e) => self.result.append_error(format!(
                        "cannot read {} from {}: {}",
                        remote_file, endpoint, e
                    )),
                }
            }
        }
    }

    fn apply(self: &Arc<Self>, category: Category, endpoint: &Endpoint, text: String) {
        match category {
            Category::MasterList => {
                let endpoints = self.parse_list(MASTER_LIST_FILE, endpoint, &text);
                for discovered in &endpoints {
                    self.result.add_master_endpoint(discovered.clone());
                }
                self.grow(endpoints);
            }
            Category::ContentList => {
                for discovered in self.parse_list(CONTENT_LIST_FILE, endpoint, &text) {
                    self.result.add_content_endpoint(discovered);
                }
            }
            Category::Target => match self.target {
                Target::CurrentVersion => match text.trim().parse::<u64>() {
                    Ok(version) => {
                        debug!("version {} from {}", version, endpoint);
                        self.result.add_version(version);
                        self.mark_answered();
                    }
                    Err(e) => self.result.append_error(format!(
                        "invalid version '{}' from {}: {}",
                        text.trim(),
                        endpoint,
                        e
                    )),
                },
                Target::Manifest(version) => {
                    debug!("manifest {} from {} ({} bytes)", version, endpoint, text.len());
                    self.result.add_manifest_text(text);
                    self.mark_answered();
                }
            },
        }
    }

    fn parse_list(&self, remote_file: &str, endpoint: &Endpoint, text: &str) -> Vec<Endpoint> {
        let (endpoints, errors) = parse_endpoint_list(text);
        for e in errors {
            self.result
                .append_error(format!("{} from {}: {}", remote_file, endpoint, e));
        }
        endpoints
    }

    /// Add unseen master endpoints and query them at once. Deadlines are not
    /// extended for late arrivals.
    fn grow(self: &Arc<Self>, endpoints: Vec<Endpoint>) {
        if self.dispose_token.is_cancelled() {
            return;
        }
        let mut sources = self.sources.lock();
        for endpoint in endpoints {
            if sources.iter().any(|k| k.endpoint.is_identical_to(&endpoint)) {
                continue;
            }
            match self.factory.instantiate(&endpoint) {
                Ok(source) => {
                    info!("discovered master endpoint {}", endpoint);
                    sources.push(KnownSource {
                        endpoint: endpoint.clone(),
                        source: Arc::clone(&source),
                    });
                    self.launch_all(endpoint, source);
                }
                Err(e) => self
                    .result
                    .append_error(format!("cannot use {}: {}", endpoint, e)),
            }
        }
    }

    fn mark_answered(&self) {
        let mut answered = self.answered_at.lock();
        if answered.is_none() {
            debug!("{} answered, stall window armed", self.target_file);
            *answered = Some(Instant::now());
        }
    }

    fn credit(&self, category: Category) {
        let counter = &self.in_flight[category.index()];
        if counter
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_err()
        {
            error!("{:?} completion credited with nothing in flight", category);
        }
    }
}
