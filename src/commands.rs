use anyhow::{Context, Result};
use console::style;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use crate::RagError;
use crate::annotate::{AnnotationScope, AnnotationSettings};
use crate::config::Config;
use crate::database::{IndexState, VectorStore};
use crate::embeddings::{Embedder, OllamaClient};
use crate::ingest::{IngestReport, IngestSettings, Ingestor};
use crate::retrieval::{QueryOutcome, Retriever, answer_query};

/// Model flags shared by `ingest` and `query`
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModelOverrides {
    pub embedding_model: Option<String>,
    pub embedding_dimension: Option<usize>,
    pub llm_model: Option<String>,
}

impl ModelOverrides {
    /// Replace the configured values with every flag that was given
    #[inline]
    pub fn apply(self, config: &mut Config) -> Result<()> {
        if let Some(model) = self.embedding_model {
            config.ollama.set_embedding_model(model)?;
        }
        if let Some(dimension) = self.embedding_dimension {
            config.ollama.set_embedding_dimension(dimension)?;
        }
        if let Some(model) = self.llm_model {
            config.ollama.set_llm_model(model)?;
        }
        Ok(())
    }
}

/// Ingest flags layered over the `[chunking]` and `[ingest]` sections
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IngestOverrides {
    pub patterns: Vec<String>,
    pub chunk_size: Option<usize>,
    pub overlap_fraction: Option<f64>,
    pub append_file_path: bool,
    pub append_topics: bool,
}

impl IngestOverrides {
    #[inline]
    pub fn apply(self, config: &mut Config) {
        if !self.patterns.is_empty() {
            config.ingest.patterns = self.patterns;
        }
        if let Some(chunk_size) = self.chunk_size {
            config.chunking.chunk_size = chunk_size;
        }
        if let Some(overlap) = self.overlap_fraction {
            config.chunking.overlap_fraction = overlap;
        }

        // Toggles replace the configured pipeline rather than extend it
        if self.append_file_path || self.append_topics {
            config.ingest.annotations = AnnotationSettings::from_toggles(
                self.append_file_path,
                self.append_topics,
                AnnotationScope::default(),
            )
            .steps;
        }
    }
}

/// Ingest every matching file under `roots` into the store at `db_path`
#[inline]
pub async fn run_ingest(config: &Config, roots: Vec<PathBuf>, db_path: &Path) -> Result<IngestReport> {
    info!("Ingesting {:?} into {}", roots, db_path.display());

    let settings = IngestSettings::from_config(config, roots);
    settings.validate().context("Invalid ingest settings")?;

    let client =
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    let mut store = VectorStore::connect(db_path)
        .await
        .context("Failed to initialize LanceDB vector store")?;

    let report = Ingestor::new(&client, &client, &mut store, settings)
        .ingest()
        .await?;

    println!("{}", style("✓ Ingestion complete").green().bold());
    println!("   Files matched: {}", report.files_found);
    println!("   Files ingested: {}", report.files_ingested);
    println!("   Chunks stored: {}", report.chunks_ingested);
    match report.index {
        IndexState::Built => println!("   Vector index: rebuilt"),
        IndexState::SkippedTooFewRows(rows) => println!(
            "   Vector index: skipped ({} rows, exact search is used)",
            rows
        ),
    }

    if !report.skipped.is_empty() {
        println!(
            "{}",
            style(format!("⚠️  Skipped {} files:", report.skipped.len())).yellow()
        );
        for skipped in &report.skipped {
            println!("   {}: {}", skipped.path.display(), skipped.reason);
        }
    }

    Ok(report)
}

/// Answer `query` from the store at `db_path` and print chunks and answers
#[inline]
pub async fn run_query(
    config: &Config,
    query: &str,
    db_path: &Path,
    k: usize,
    raw: bool,
) -> Result<QueryOutcome> {
    if k == 0 {
        return Err(
            RagError::Config("Number of chunks to retrieve must be at least 1".to_string()).into(),
        );
    }

    let client =
        OllamaClient::new(&config.ollama).context("Failed to initialize Ollama client")?;
    let mut store = VectorStore::connect(db_path)
        .await
        .context("Failed to initialize LanceDB vector store")?;
    store
        .open_schema(config.ollama.embedding_dimension)
        .await
        .context("Failed to open vector store")?;

    let retriever = Retriever::new(&client, &store, config.ollama.embedding_dimension);
    let outcome = answer_query(&retriever, &client, query, k, raw).await?;

    println!(
        "{}",
        style(format!("📚 Retrieved {} chunks", outcome.chunks.len())).bold().cyan()
    );
    for chunk in &outcome.chunks {
        println!("{}", style(&chunk.document_id).dim());
        println!("{}", chunk.text);
        println!();
    }

    println!("{}", style("💬 Answer").bold().green());
    println!("{}", outcome.answer);

    if let Some(raw_answer) = &outcome.raw_answer {
        println!();
        println!("{}", style("💭 Raw answer (no retrieval)").bold().yellow());
        println!("{}", raw_answer);
    }

    Ok(outcome)
}

/// Model service state as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OllamaStatus {
    Ready,
    /// Reachable, but a configured model is not installed
    MissingModels(String),
    Unreachable(String),
    InvalidConfig(String),
}

/// Vector store state as seen by `status`
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreStatus {
    Unavailable(String),
    /// Connected, but nothing has been ingested yet
    Empty(String),
    Ready {
        dimension: Option<usize>,
        chunks: Option<usize>,
        fragments: Option<usize>,
        indexed: Option<bool>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StatusReport {
    pub ollama_url: Option<String>,
    pub embedding_model: String,
    pub llm_model: String,
    pub ollama: OllamaStatus,
    pub db_path: PathBuf,
    pub store: StoreStatus,
}

/// Gather Ollama and vector store state for the status report
#[inline]
pub async fn collect_status(config: &Config, db_path: &Path) -> StatusReport {
    let mut report = StatusReport {
        ollama_url: None,
        embedding_model: config.ollama.embedding_model.clone(),
        llm_model: config.ollama.llm_model.clone(),
        ollama: OllamaStatus::Ready,
        db_path: db_path.to_path_buf(),
        store: StoreStatus::Empty(String::new()),
    };

    let ollama = match OllamaClient::new(&config.ollama) {
        Ok(client) => {
            report.ollama_url = Some(client.base_url().to_string());
            report.embedding_model = Embedder::model(&client).to_string();
            report.llm_model = client.llm_model().to_string();

            if let Err(e) = client.ping() {
                warn!("Ollama is unreachable: {:#}", e);
                OllamaStatus::Unreachable(format!("{:#}", e))
            } else if let Err(e) = client.health_check() {
                warn!("Ollama health check failed: {:#}", e);
                OllamaStatus::MissingModels(format!("{:#}", e))
            } else {
                OllamaStatus::Ready
            }
        }
        Err(e) => OllamaStatus::InvalidConfig(format!("{:#}", e)),
    };
    report.ollama = ollama;

    let mut store = match VectorStore::connect(db_path).await {
        Ok(store) => store,
        Err(e) => {
            report.store = StoreStatus::Unavailable(e.to_string());
            return report;
        }
    };
    report.db_path = store.path().to_path_buf();

    if let Err(e) = store.open_schema(config.ollama.embedding_dimension).await {
        report.store = StoreStatus::Empty(e.to_string());
        return report;
    }

    report.store = StoreStatus::Ready {
        dimension: store.embedding_dimension(),
        chunks: store.count_chunks().await.ok(),
        fragments: store.fragment_count().await.ok(),
        indexed: store.has_vector_index().await.ok(),
    };
    report
}

/// Report Ollama reachability and the state of the vector store
#[inline]
pub async fn show_status(config: &Config, db_path: &Path) -> Result<StatusReport> {
    let report = collect_status(config, db_path).await;

    println!("📊 localrag Status Report");
    println!("{}", "=".repeat(50));
    println!();

    println!("🤖 Ollama Status:");
    let url = report.ollama_url.as_deref().unwrap_or("unknown");
    match &report.ollama {
        OllamaStatus::Ready => println!("   ✅ Ollama: Connected ({})", url),
        OllamaStatus::MissingModels(e) => println!("   ⚠️  Ollama: Unhealthy ({}) - {}", url, e),
        OllamaStatus::Unreachable(e) => println!("   ❌ Ollama: Unreachable ({}) - {}", url, e),
        OllamaStatus::InvalidConfig(e) => println!("   ❌ Ollama: Invalid configuration - {}", e),
    }
    println!("   📋 Embedding Model: {}", report.embedding_model);
    println!("   📋 LLM Model: {}", report.llm_model);

    println!();
    println!("🔍 Vector Database Status:");
    println!("   📁 Path: {}", report.db_path.display());

    match &report.store {
        StoreStatus::Unavailable(e) => println!("   ❌ LanceDB: Failed to connect - {}", e),
        StoreStatus::Empty(e) => println!("   💤 Chunk table: {}", e),
        StoreStatus::Ready {
            dimension,
            chunks,
            fragments,
            indexed,
        } => {
            println!("   ✅ LanceDB: Connected");
            if let Some(dimension) = dimension {
                println!("   📐 Vector width: {}", dimension);
            }
            match chunks {
                Some(count) => println!("   📊 Chunks: {}", count),
                None => println!("   ⚠️  Chunks: Unknown"),
            }
            if let Some(fragments) = fragments {
                println!("   🧩 Fragments: {}", fragments);
            }
            match indexed {
                Some(true) => println!("   🧭 Vector index: present"),
                Some(false) => println!("   🧭 Vector index: none (exact search)"),
                None => println!("   ⚠️  Vector index: Unknown"),
            }
        }
    }

    Ok(report)
}
