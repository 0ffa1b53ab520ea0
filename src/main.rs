use std::path::PathBuf;

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use localrag::Result;
use localrag::commands::{IngestOverrides, ModelOverrides, run_ingest, run_query, show_status};
use localrag::config::{Config, init_config, show_config};

#[derive(Parser)]
#[command(name = "localrag")]
#[command(about = "Local retrieval-augmented generation over your documents with Ollama")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and the default vector store
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Args, Debug, Default)]
struct ModelArgs {
    /// Vector store directory (defaults to <config dir>/vectors)
    #[arg(long)]
    db: Option<PathBuf>,
    /// Embedding model served by Ollama
    #[arg(long)]
    embedding_model: Option<String>,
    /// Width of the vectors the embedding model returns
    #[arg(long)]
    embedding_dim: Option<usize>,
    /// Generative model served by Ollama
    #[arg(long)]
    llm: Option<String>,
}

impl ModelArgs {
    fn overrides(&self) -> ModelOverrides {
        ModelOverrides {
            embedding_model: self.embedding_model.clone(),
            embedding_dimension: self.embedding_dim,
            llm_model: self.llm.clone(),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Chunk, embed and store documents
    Ingest {
        /// Directories to search recursively
        #[arg(required = true)]
        roots: Vec<PathBuf>,
        /// File pattern, repeatable (defaults to the configured patterns)
        #[arg(long = "glob")]
        patterns: Vec<String>,
        /// Chunk length in characters
        #[arg(long)]
        chunk_size: Option<usize>,
        /// Overlap between chunks as a fraction of the chunk size
        #[arg(long)]
        overlap: Option<f64>,
        /// Prefix each chunk with its file path
        #[arg(long)]
        append_file_path: bool,
        /// Prefix each chunk with topics extracted by the LLM
        #[arg(long)]
        append_topics: bool,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Answer a question from the ingested documents
    Query {
        query: String,
        /// Number of chunks to retrieve
        #[arg(long)]
        chunks: Option<usize>,
        /// Also ask the LLM without retrieved context
        #[arg(long, overrides_with = "no_raw")]
        raw: bool,
        /// Only produce the grounded answer
        #[arg(long, overrides_with = "raw")]
        no_raw: bool,
        #[command(flatten)]
        model: ModelArgs,
    },
    /// Show Ollama and vector store status
    Status {
        /// Vector store directory (defaults to <config dir>/vectors)
        #[arg(long)]
        db: Option<PathBuf>,
    },
    /// Show or initialize the configuration file
    Config {
        /// Show current configuration
        #[arg(long)]
        show: bool,
        /// Write the default configuration file
        #[arg(long)]
        init: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => Config::default_dir().context("Failed to locate configuration directory")?,
    };

    match cli.command {
        Commands::Config { show, init } => {
            if init {
                init_config(&config_dir)?;
            }
            if show || !init {
                show_config(&config_dir)?;
            }
        }
        Commands::Ingest {
            roots,
            patterns,
            chunk_size,
            overlap,
            append_file_path,
            append_topics,
            model,
        } => {
            let mut config = Config::load(&config_dir)?;
            model.overrides().apply(&mut config)?;
            IngestOverrides {
                patterns,
                chunk_size,
                overlap_fraction: overlap,
                append_file_path,
                append_topics,
            }
            .apply(&mut config);
            config.validate().context("Invalid ingest settings")?;

            let db_path = model
                .db
                .unwrap_or_else(|| config.vector_database_path());
            run_ingest(&config, roots, &db_path).await?;
        }
        Commands::Query {
            query,
            chunks,
            raw,
            no_raw,
            model,
        } => {
            let mut config = Config::load(&config_dir)?;
            model.overrides().apply(&mut config)?;
            config.validate().context("Invalid query settings")?;

            let k = chunks.unwrap_or(config.query.chunks);
            let raw = resolve_raw(raw, no_raw, config.query.raw);
            let db_path = model
                .db
                .unwrap_or_else(|| config.vector_database_path());
            run_query(&config, &query, &db_path, k, raw).await?;
        }
        Commands::Status { db } => {
            let config = Config::load(&config_dir)?;
            let db_path = db.unwrap_or_else(|| config.vector_database_path());
            show_status(&config, &db_path).await?;
        }
    }

    Ok(())
}

/// `--raw` / `--no-raw` win over the configured default; the last one given wins
fn resolve_raw(raw: bool, no_raw: bool, configured: bool) -> bool {
    if raw {
        true
    } else if no_raw {
        false
    } else {
        configured
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::error::ErrorKind;

    #[test]
    fn ingest_command_with_options() {
        let cli = Cli::try_parse_from([
            "localrag",
            "ingest",
            "docs",
            "notes",
            "--chunk-size",
            "10",
            "--overlap",
            "0.1",
            "--glob",
            "*.md",
            "--glob",
            "*.txt",
            "--embedding-model",
            "all-minilm:22m",
            "--embedding-dim",
            "384",
            "--append-file-path",
        ]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Ingest {
                roots,
                patterns,
                chunk_size,
                overlap,
                append_file_path,
                append_topics,
                model,
            } = parsed.command
            {
                assert_eq!(roots, vec![PathBuf::from("docs"), PathBuf::from("notes")]);
                assert_eq!(patterns, vec!["*.md".to_string(), "*.txt".to_string()]);
                assert_eq!(chunk_size, Some(10));
                assert_eq!(overlap, Some(0.1));
                assert!(append_file_path);
                assert!(!append_topics);
                assert_eq!(model.embedding_model.as_deref(), Some("all-minilm:22m"));
                assert_eq!(model.embedding_dim, Some(384));
                assert_eq!(model.db, None);
            } else {
                panic!("expected ingest command");
            }
        }
    }

    #[test]
    fn ingest_requires_a_root() {
        let cli = Cli::try_parse_from(["localrag", "ingest"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::MissingRequiredArgument);
        }
    }

    #[test]
    fn query_command_defaults() {
        let cli = Cli::try_parse_from(["localrag", "query", "what is adam's last name?"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query {
                query,
                chunks,
                raw,
                no_raw,
                ..
            } = parsed.command
            {
                assert_eq!(query, "what is adam's last name?");
                assert_eq!(chunks, None);
                assert!(resolve_raw(raw, no_raw, true));
            } else {
                panic!("expected query command");
            }
        }
    }

    #[test]
    fn last_raw_flag_wins() {
        let cli = Cli::try_parse_from(["localrag", "query", "q", "--raw", "--no-raw"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Query { raw, no_raw, .. } = parsed.command {
                assert!(!resolve_raw(raw, no_raw, true));
            }
        }

        let cli = Cli::try_parse_from(["localrag", "query", "q", "--no-raw", "--raw"]);
        if let Ok(parsed) = cli {
            if let Commands::Query { raw, no_raw, .. } = parsed.command {
                assert!(resolve_raw(raw, no_raw, false));
            }
        }
    }

    #[test]
    fn global_config_dir() {
        let cli = Cli::try_parse_from(["localrag", "status", "--config-dir", "/tmp/rag"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            assert_eq!(parsed.config_dir, Some(PathBuf::from("/tmp/rag")));
            matches!(parsed.command, Commands::Status { db: None });
        }
    }

    #[test]
    fn config_flags() {
        let cli = Cli::try_parse_from(["localrag", "config", "--show", "--init"]);
        assert!(cli.is_ok());

        if let Ok(parsed) = cli {
            if let Commands::Config { show, init } = parsed.command {
                assert!(show);
                assert!(init);
            }
        }
    }

    #[test]
    fn invalid_command() {
        let cli = Cli::try_parse_from(["localrag", "invalid"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::InvalidSubcommand);
        }
    }

    #[test]
    fn help_message() {
        let cli = Cli::try_parse_from(["localrag", "--help"]);
        assert!(cli.is_err());

        if let Err(err) = cli {
            assert_eq!(err.kind(), ErrorKind::DisplayHelp);
        }
    }
}
