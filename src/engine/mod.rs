// Engine orchestration: per-run discovery, result aggregation, and endpoint cache files.

pub mod cache;
pub mod orchestrator;
pub mod result;
