//! Comparison engine: maps sections across two structured disclosure
//! documents, diffs them numerically and textually, and runs bounded-
//! concurrency per-section analysis with iterative-search refinement.

pub mod analyzer;
pub mod config;
pub mod error;
pub mod mapper;
pub mod orchestrator;
pub mod prompts;

pub use config::{EngineConfig, SearchMode};
pub use error::EngineError;
pub use orchestrator::{Orchestrator, ProgressFn};
