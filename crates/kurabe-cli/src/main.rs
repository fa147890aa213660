//! Compare two structured disclosure documents and print the result as JSON.
//!
//! Inputs are extraction outputs: one JSON file per document holding the
//! descriptor and the structured content.

use std::fs;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use kurabe_ai::{OpenAiChat, OpenAiEmbedder};
use kurabe_core::document::{DocumentDescriptor, StructuredDocument};
use kurabe_engine::{EngineConfig, Orchestrator, SearchMode};
use serde::Deserialize;

#[derive(Parser)]
#[command(name = "kurabe", version, about = "Disclosure document comparison")]
struct Cli {
    /// First document (JSON: {"descriptor": ..., "document": ...}).
    doc1: PathBuf,
    /// Second document.
    doc2: PathBuf,

    /// Iterative-search policy: off, high_only, or all.
    #[arg(long, default_value = "off")]
    search_mode: String,

    /// Concurrent section analyses.
    #[arg(long, default_value_t = 5)]
    workers: usize,

    /// Minimum cosine similarity for semantic section mapping.
    #[arg(long, default_value_t = 0.7)]
    similarity_threshold: f32,

    /// Numeric tolerance in percent.
    #[arg(long, default_value_t = 0.01)]
    tolerance: f64,

    #[arg(long, env = "OPENAI_API_KEY", hide_env_values = true)]
    api_key: String,

    #[arg(long, env = "OPENAI_BASE_URL", default_value = "https://api.openai.com/v1")]
    base_url: String,

    #[arg(long, env = "OPENAI_MODEL", default_value = "gpt-4o-mini")]
    model: String,

    #[arg(long, env = "OPENAI_EMBEDDING_MODEL", default_value = "text-embedding-3-small")]
    embedding_model: String,
}

#[derive(Deserialize)]
struct DocumentFile {
    descriptor: DocumentDescriptor,
    document: StructuredDocument,
}

fn load_document(path: &PathBuf) -> anyhow::Result<(DocumentDescriptor, StructuredDocument)> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    let file: DocumentFile =
        serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))?;
    Ok((file.descriptor, file.document))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();
    let cli = Cli::parse();

    let search_mode: SearchMode = cli
        .search_mode
        .parse()
        .map_err(|e: String| anyhow::anyhow!(e))?;
    let config = EngineConfig {
        max_workers: cli.workers,
        similarity_threshold: cli.similarity_threshold,
        tolerance_pct: cli.tolerance,
        search_mode,
        ..EngineConfig::default()
    };

    let documents = vec![load_document(&cli.doc1)?, load_document(&cli.doc2)?];

    let chat = OpenAiChat::new(cli.base_url.clone(), cli.api_key.clone(), cli.model);
    let embedder = OpenAiEmbedder::new(cli.base_url, cli.api_key, cli.embedding_model);
    let orchestrator = Orchestrator::new(chat, embedder, config);

    let progress = |section: &str, completed: usize, total: usize| {
        tracing::info!(section, completed, total, "section analysed");
    };
    let result = orchestrator.compare(&documents, Some(&progress)).await?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    Ok(())
}
