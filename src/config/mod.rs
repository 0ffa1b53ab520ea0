// Configuration management module
// TOML-backed settings plus the `config` subcommand output

pub mod settings;


use anyhow::{Context, Result};
use console::style;
use itertools::Itertools;
use std::path::Path;

pub use settings::{Config, ConfigError, IngestConfig, OllamaConfig, QueryConfig};

/// Print the effective configuration loaded from `config_dir`
#[inline]
pub fn show_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;

    eprintln!("{}", style("📋 Current Configuration").bold().cyan());
    eprintln!();
    eprintln!("{}", render_config(&config));

    let config_path = config.config_file_path();
    if config_path.exists() {
        eprintln!("Config file: {}", style(config_path.display()).dim());
    } else {
        eprintln!(
            "Config file: {} {}",
            style(config_path.display()).dim(),
            style("(not created, using defaults)").yellow()
        );
    }

    Ok(())
}

/// Write a default configuration file unless one already exists
#[inline]
pub fn init_config(config_dir: &Path) -> Result<()> {
    let config = Config::load(config_dir).context("Failed to load configuration")?;
    let config_path = config.config_file_path();

    if config_path.exists() {
        eprintln!(
            "{} {}",
            style("Configuration already exists at").yellow(),
            style(config_path.display()).cyan()
        );
        return Ok(());
    }

    config.save().context("Failed to save configuration")?;
    eprintln!("{}", style("✓ Configuration saved successfully!").green());
    eprintln!(
        "Configuration saved to: {}",
        style(config_path.display()).cyan()
    );

    Ok(())
}

/// Human-readable summary of the settings that drive ingest and query
#[inline]
pub fn render_config(config: &Config) -> String {
    let ollama_url = match config.ollama_url() {
        Ok(url) => url.to_string(),
        Err(e) => format!("invalid ({})", e),
    };

    let annotations = if config.ingest.annotations.is_empty() {
        "none".to_string()
    } else {
        config.ingest.annotations.iter().join(" → ")
    };

    [
        "Ollama Settings:".to_string(),
        format!("  URL: {}", ollama_url),
        format!("  Embedding Model: {}", config.ollama.embedding_model),
        format!(
            "  Embedding Dimension: {}",
            config.ollama.embedding_dimension
        ),
        format!("  LLM Model: {}", config.ollama.llm_model),
        format!("  Max Tokens: {}", config.ollama.max_tokens),
        format!("  Temperature: {}", config.ollama.temperature),
        String::new(),
        "Chunking:".to_string(),
        format!("  Chunk Size: {} chars", config.chunking.chunk_size),
        format!("  Overlap: {}", config.chunking.overlap_fraction),
        String::new(),
        "Ingest:".to_string(),
        format!("  Patterns: {}", config.ingest.patterns.iter().join(", ")),
        format!("  Annotations: {}", annotations),
        format!("  Annotation Scope: {}", config.ingest.annotation_scope),
        String::new(),
        "Query:".to_string(),
        format!("  Chunks: {}", config.query.chunks),
        format!("  Raw Baseline: {}", config.query.raw),
        String::new(),
        format!(
            "Vector Store: {}",
            config.vector_database_path().display()
        ),
    ]
    .join("\n")
}
