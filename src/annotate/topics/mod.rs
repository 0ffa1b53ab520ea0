
use std::fmt;
use std::sync::LazyLock;

use anyhow::{Context, Result};
use fancy_regex::Regex;
use tracing::{debug, warn};

use crate::embeddings::Generator;

/// Output cap for topic generation
const TOPIC_TOKEN_LIMIT: u32 = 128;

/// First bracketed span on a single line
static BRACKETED_LIST: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\[(.*?)\]").expect("valid regex"));

/// Topics describing a chunk, kept as the bracketed text the model produced
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Topics {
    payload: String,
}

impl Topics {
    /// Topics from the text found between the brackets
    #[inline]
    pub fn new(payload: &str) -> Self {
        Self {
            payload: payload.to_string(),
        }
    }

    /// The bracketed payload exactly as the model wrote it
    #[inline]
    pub fn payload(&self) -> &str {
        &self.payload
    }

    /// Best-effort split of the payload on commas.
    ///
    /// Items are trimmed of whitespace and surrounding quotes; empty items
    /// are dropped. Quoted items containing commas are split too.
    #[inline]
    pub fn items(&self) -> Vec<&str> {
        self.payload
            .split(',')
            .map(|item| item.trim().trim_matches(|c: char| c == '"' || c == '\'').trim())
            .filter(|item| !item.is_empty())
            .collect()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.items().is_empty()
    }
}

impl fmt::Display for Topics {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.payload)
    }
}

/// Parse the topic list out of a free-text model response.
///
/// Grammar: the first `[ ... ]` span (not crossing a line break) holds the
/// list. Its contents are kept verbatim, not validated. A response without
/// such a span yields an empty list.
#[inline]
pub fn parse_topics(response: &str) -> Topics {
    match BRACKETED_LIST.captures(response) {
        Ok(Some(captures)) => Topics::new(captures.get(1).map_or("", |m| m.as_str())),
        Ok(None) => {
            debug!("No bracketed topic list in model response");
            Topics::default()
        }
        Err(e) => {
            warn!("Topic pattern failed on model response: {}", e);
            Topics::default()
        }
    }
}

/// Asks the generative model for a short topic list describing a chunk
pub struct TopicExtractor<'a, G> {
    generator: &'a G,
}

impl<'a, G: Generator> TopicExtractor<'a, G> {
    #[inline]
    pub fn new(generator: &'a G) -> Self {
        Self { generator }
    }

    /// Extract topics for `text`.
    ///
    /// A response without a parseable list becomes an empty list. A failed
    /// call to the model service is returned as an error.
    #[inline]
    pub fn extract_topics(&self, text: &str) -> Result<Topics> {
        let response = self
            .generator
            .generate_with_limit(&topic_prompt(text), TOPIC_TOKEN_LIMIT)
            .context("Failed to generate topics")?;

        let topics = parse_topics(&response);
        debug!("Extracted {} topics", topics.items().len());
        Ok(topics)
    }
}

fn topic_prompt(text: &str) -> String {
    format!(
        "Task: Create a list of topics for this content. Expected Output: A list of less than five topics. The list should be pure json. Content: {} ```json",
        text
    )
}
