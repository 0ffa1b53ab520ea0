// Annotation module
// Ordered metadata steps spliced into chunk text before embedding and storage

pub mod topics;


use std::fmt;

use anyhow::Result;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::embeddings::Generator;

pub use topics::{TopicExtractor, Topics, parse_topics};

/// A single annotation step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Annotation {
    /// `file: <document id>`
    FilePath,
    /// `topics: [..]` from the generative model
    Topics,
}

impl fmt::Display for Annotation {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::FilePath => write!(f, "file_path"),
            Self::Topics => write!(f, "topics"),
        }
    }
}

/// Which text the annotations end up in
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AnnotationScope {
    /// The annotated text is both embedded and stored
    #[default]
    EmbedAndStore,
    /// The raw excerpt is embedded; the annotated text is stored
    StoreOnly,
}

impl fmt::Display for AnnotationScope {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmbedAndStore => write!(f, "embed_and_store"),
            Self::StoreOnly => write!(f, "store_only"),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnnotationSettings {
    pub steps: Vec<Annotation>,
    pub scope: AnnotationScope,
}

impl AnnotationSettings {
    /// Settings from the `append_*` switches; file path always precedes topics
    #[inline]
    pub fn from_toggles(append_file_path: bool, append_topics: bool, scope: AnnotationScope) -> Self {
        let mut steps = Vec::new();
        if append_file_path {
            steps.push(Annotation::FilePath);
        }
        if append_topics {
            steps.push(Annotation::Topics);
        }
        Self { steps, scope }
    }

    #[inline]
    pub fn needs_generator(&self) -> bool {
        self.steps.contains(&Annotation::Topics)
    }
}

/// Text produced for one chunk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AnnotatedChunk {
    /// Text sent to the embedding model
    pub embed_text: String,
    /// Text persisted in the store and shown at query time
    pub stored_text: String,
}

/// Applies the configured annotation steps, in order, to each chunk
pub struct Annotator<'a, G> {
    steps: Vec<Annotation>,
    scope: AnnotationScope,
    topics: TopicExtractor<'a, G>,
}

impl<'a, G: Generator> Annotator<'a, G> {
    #[inline]
    pub fn new(generator: &'a G, settings: &AnnotationSettings) -> Self {
        Self {
            steps: settings.steps.iter().copied().unique().collect(),
            scope: settings.scope,
            topics: TopicExtractor::new(generator),
        }
    }

    /// Annotate `excerpt` taken from `document_id`
    #[inline]
    pub fn annotate(&self, document_id: &str, excerpt: &str) -> Result<AnnotatedChunk> {
        let mut headers = Vec::with_capacity(self.steps.len());
        for step in &self.steps {
            let header = match step {
                Annotation::FilePath => format!("file: {}", document_id),
                Annotation::Topics => format!("topics: {}", self.topics.extract_topics(excerpt)?),
            };
            headers.push(header);
        }

        let stored_text = assemble(&headers, excerpt);
        let embed_text = match self.scope {
            AnnotationScope::EmbedAndStore => stored_text.clone(),
            AnnotationScope::StoreOnly => excerpt.to_string(),
        };

        Ok(AnnotatedChunk {
            embed_text,
            stored_text,
        })
    }
}

/// Header lines followed by `content: <excerpt>`; the bare excerpt when there are no headers
#[inline]
pub fn assemble(headers: &[String], excerpt: &str) -> String {
    if headers.is_empty() {
        return excerpt.to_string();
    }

    let mut text = headers.join("\n");
    text.push_str("\ncontent: ");
    text.push_str(excerpt);
    text
}
