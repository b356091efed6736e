// Result aggregation for one discovery run. Every mutator is safe under any
// number of concurrent callers.

use parking_lot::Mutex;

use crate::source::endpoint::Endpoint;

#[derive(Default)]
struct Inner {
    version: Option<u64>,
    manifest_text: Option<String>,
    master_endpoints: Vec<Endpoint>,
    content_endpoints: Vec<Endpoint>,
    errors: Vec<String>,
}

#[derive(Default)]
pub struct DiscoveryResult {
    inner: Mutex<Inner>,
}

impl DiscoveryResult {
    pub fn new() -> Self {
        Self::default()
    }

    /// Result pre-seeded with the version a manifest read targets.
    pub fn for_version(version: u64) -> Self {
        let result = Self::new();
        result.add_version(version);
        result
    }

    /// Last writer wins; sources are expected to agree.
    pub fn add_version(&self, version: u64) {
        self.inner.lock().version = Some(version);
    }

    pub fn add_manifest_text(&self, text: String) {
        self.inner.lock().manifest_text = Some(text);
    }

    /// Returns `false` when an identical descriptor was already recorded.
    pub fn add_master_endpoint(&self, endpoint: Endpoint) -> bool {
        push_unique(&mut self.inner.lock().master_endpoints, endpoint)
    }

    pub fn add_content_endpoint(&self, endpoint: Endpoint) -> bool {
        push_unique(&mut self.inner.lock().content_endpoints, endpoint)
    }

    pub fn append_error(&self, message: impl Into<String>) {
        self.inner.lock().errors.push(message.into());
    }

    pub fn version(&self) -> Option<u64> {
        self.inner.lock().version
    }

    pub fn manifest_text(&self) -> Option<String> {
        self.inner.lock().manifest_text.clone()
    }

    pub fn master_endpoints(&self) -> Vec<Endpoint> {
        self.inner.lock().master_endpoints.clone()
    }

    pub fn content_endpoints(&self) -> Vec<Endpoint> {
        self.inner.lock().content_endpoints.clone()
    }

    pub fn errors(&self) -> Vec<String> {
        self.inner.lock().errors.clone()
    }

    pub fn has_errors(&self) -> bool {
        !self.inner.lock().errors.is_empty()
    }
}

fn push_unique(list: &mut Vec<Endpoint>, endpoint: Endpoint) -> bool {
    if list.iter().any(|e| e.is_identical_to(&endpoint)) {
        return false;
    }
    list.push(endpoint);
    true
}
