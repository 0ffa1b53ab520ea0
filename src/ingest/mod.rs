// Ingest module
// Walks document roots and turns every matching file into stored, embedded chunks


use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use glob::Pattern;
use indicatif::{ProgressBar, ProgressStyle};
use itertools::Itertools;
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::RagError;
use crate::annotate::{AnnotationSettings, Annotator};
use crate::config::Config;
use crate::database::{ChunkRecord, IndexState, VectorStore};
use crate::embeddings::{ChunkingConfig, Embedder, Generator, chunk_text, ensure_dimension};

/// Everything one ingestion run needs, resolved up front
#[derive(Debug, Clone, PartialEq)]
pub struct IngestSettings {
    /// Directories searched recursively
    pub roots: Vec<PathBuf>,
    /// Glob patterns; a pattern without `/` matches file names at any depth
    pub patterns: Vec<String>,
    pub chunking: ChunkingConfig,
    pub embedding_dimension: usize,
    pub annotations: AnnotationSettings,
}

impl IngestSettings {
    /// Settings from a loaded configuration, ingesting `roots`
    #[inline]
    pub fn from_config(config: &Config, roots: Vec<PathBuf>) -> Self {
        Self {
            roots,
            patterns: config.ingest.patterns.clone(),
            chunking: config.chunking.clone(),
            embedding_dimension: config.ollama.embedding_dimension,
            annotations: AnnotationSettings {
                steps: config.ingest.annotations.clone(),
                scope: config.ingest.annotation_scope,
            },
        }
    }

    /// Check chunking, patterns and roots without touching any store
    #[inline]
    pub fn validate(&self) -> Result<(), RagError> {
        self.prepare().map(|_| ())
    }

    /// Absolute overlap and compiled patterns
    fn prepare(&self) -> Result<(usize, Vec<Pattern>), RagError> {
        let overlap = self.chunking.absolute_overlap()?;
        let patterns = compile_patterns(&self.patterns)?;
        validate_roots(&self.roots)?;
        Ok((overlap, patterns))
    }
}

/// A file that could not be read as text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: String,
}

/// Summary of an ingestion run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IngestReport {
    /// Distinct files matched by the patterns
    pub files_found: usize,
    pub files_ingested: usize,
    pub skipped: Vec<SkippedFile>,
    /// Chunks upserted, including ones that already existed
    pub chunks_ingested: usize,
    pub index: IndexState,
}

/// Batch ingestion into a [`VectorStore`].
///
/// Files are processed one at a time, in discovery order, and each file's
/// chunks are written in a single upsert. A file that is not valid UTF-8 is
/// skipped; any model-service failure aborts the run, leaving the files
/// stored so far in place.
pub struct Ingestor<'a, E, G> {
    embedder: &'a E,
    annotator: Annotator<'a, G>,
    store: &'a mut VectorStore,
    settings: IngestSettings,
}

impl<'a, E: Embedder, G: Generator> Ingestor<'a, E, G> {
    #[inline]
    pub fn new(
        embedder: &'a E,
        generator: &'a G,
        store: &'a mut VectorStore,
        settings: IngestSettings,
    ) -> Self {
        Self {
            embedder,
            annotator: Annotator::new(generator, &settings.annotations),
            store,
            settings,
        }
    }

    /// Run the ingestion and rebuild the vector index once at the end
    #[inline]
    pub async fn ingest(&mut self) -> Result<IngestReport> {
        let (overlap, patterns) = self
            .settings
            .prepare()
            .context("Invalid ingest settings")?;

        self.store
            .ensure_schema(self.settings.embedding_dimension)
            .await
            .context("Failed to prepare vector store")?;

        let files = discover_files(&self.settings.roots, &patterns);
        info!(
            "Found {} files to ingest with {} (chunk size {}, overlap {})",
            files.len(),
            self.embedder.model(),
            self.settings.chunking.chunk_size,
            overlap
        );

        let bar = if console::user_attended_stderr() {
            ProgressBar::new(files.len() as u64).with_style(
                ProgressStyle::with_template("{bar:40} [{pos}/{len}] Ingesting {msg}")
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
            )
        } else {
            ProgressBar::hidden()
        };

        let mut files_ingested = 0;
        let mut chunks_ingested = 0;
        let mut skipped = Vec::new();

        for path in &files {
            bar.set_message(path.display().to_string());

            let text = match read_text(path) {
                Ok(text) => text,
                Err(error) => {
                    warn!("Skipping {}: {}", path.display(), error);
                    skipped.push(SkippedFile {
                        path: path.clone(),
                        reason: error.to_string(),
                    });
                    bar.inc(1);
                    continue;
                }
            };

            chunks_ingested += self.ingest_document(path, &text, overlap).await?;
            files_ingested += 1;
            bar.inc(1);
        }

        bar.finish_and_clear();

        let index = self
            .store
            .rebuild_index()
            .await
            .context("Failed to rebuild vector index")?;

        info!(
            "Ingested {} chunks from {} files ({} skipped)",
            chunks_ingested,
            files_ingested,
            skipped.len()
        );

        Ok(IngestReport {
            files_found: files.len(),
            files_ingested,
            skipped,
            chunks_ingested,
            index,
        })
    }

    async fn ingest_document(&self, path: &Path, text: &str, overlap: usize) -> Result<usize> {
        let document_id = path.display().to_string();
        let chunks = chunk_text(text, self.settings.chunking.chunk_size, overlap)
            .context("Failed to chunk document")?;

        debug!("Split {} into {} chunks", document_id, chunks.len());

        let mut records = Vec::with_capacity(chunks.len());
        for chunk in &chunks {
            let annotated = self
                .annotator
                .annotate(&document_id, chunk)
                .with_context(|| format!("Failed to annotate chunk of {}", document_id))?;

            let vector = self
                .embedder
                .embed(&annotated.embed_text)
                .with_context(|| format!("Failed to embed chunk of {}", document_id))?;
            ensure_dimension(&vector, self.settings.embedding_dimension)?;

            records.push(ChunkRecord {
                document_id: document_id.clone(),
                text: annotated.stored_text,
                vector,
            });
        }

        self.store
            .upsert_batch(&records)
            .await
            .with_context(|| format!("Failed to store chunks of {}", document_id))?;

        Ok(chunks.len())
    }
}

fn validate_roots(roots: &[PathBuf]) -> Result<(), RagError> {
    if roots.is_empty() {
        return Err(RagError::Config("No document roots given".to_string()));
    }

    for root in roots {
        if !root.is_dir() {
            return Err(RagError::Config(format!(
                "Document root {} does not exist or is not a directory",
                root.display()
            )));
        }
    }
    Ok(())
}

fn compile_patterns(patterns: &[String]) -> Result<Vec<Pattern>, RagError> {
    if patterns.is_empty() {
        return Err(RagError::Config("No file patterns given".to_string()));
    }

    patterns
        .iter()
        .map(|pattern| {
            Pattern::new(pattern).map_err(|e| {
                RagError::Config(format!("Invalid file pattern '{}': {}", pattern, e))
            })
        })
        .collect()
}

/// Files under `roots` matching any pattern, each listed once.
///
/// Order is root, then pattern, then path sorted by file name at every level.
#[inline]
pub fn discover_files(roots: &[PathBuf], patterns: &[Pattern]) -> Vec<PathBuf> {
    let mut found = Vec::new();

    for root in roots {
        for pattern in patterns {
            for entry in WalkDir::new(root).sort_by_file_name() {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) => {
                        warn!("Failed to read directory entry under {}: {}", root.display(), e);
                        continue;
                    }
                };

                if !entry.file_type().is_dir() && pattern_matches(pattern, root, entry.path()) {
                    found.push(entry.into_path());
                }
            }
        }
    }

    found.into_iter().unique().collect()
}

fn pattern_matches(pattern: &Pattern, root: &Path, path: &Path) -> bool {
    if pattern.as_str().contains('/') {
        path.strip_prefix(root)
            .is_ok_and(|relative| pattern.matches_path(relative))
    } else {
        path.file_name()
            .and_then(|name| name.to_str())
            .is_some_and(|name| pattern.matches(name))
    }
}

fn read_text(path: &Path) -> Result<String, RagError> {
    let bytes = std::fs::read(path).map_err(|e| RagError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    String::from_utf8(bytes).map_err(|e| RagError::Decode {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}
