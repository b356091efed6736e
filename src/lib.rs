pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod source;

pub use api::client::DiscoveryClient;
pub use engine::orchestrator::{Orchestrator, RunSummary, StopReason, Target};
pub use engine::result::DiscoveryResult;
pub use error::DiscoveryError;
pub use source::endpoint::Endpoint;
