use thiserror::Error;

#[derive(Debug, Error)]
pub enum DiscoveryError {
    #[error("orchestrator has been disposed")]
    Disposed,

    #[error("no tokio runtime available: {0}")]
    NoRuntime(String),
}
