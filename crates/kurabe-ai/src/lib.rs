//! Analysis and embedding backends for document comparison.
//!
//! The engine talks to two trait seams: [`ChatBackend`] for JSON-producing
//! analysis calls and [`EmbeddingBackend`] for batch text embeddings. The
//! provided implementations target OpenAI-compatible HTTP APIs.

mod chat;
mod embedding;
mod error;
pub mod similarity;

pub use chat::{ChatBackend, OpenAiChat};
pub use embedding::{EMBED_BATCH_SIZE, EmbeddingBackend, OpenAiEmbedder, embed_resilient};
pub use error::AiError;
