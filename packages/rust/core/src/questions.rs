//! Question augmentation.
//!
//! A chunk can be indexed by the questions it answers. The chunker only sees
//! the single-method [`QuestionSource`] capability; [`QuestionGenerator`] is
//! the production source, which prompts any [`TextModel`] and keeps the
//! numbered lines of its reply.

use std::collections::HashMap;
use std::future::Future;
use std::sync::{LazyLock, Mutex};

use regex::Regex;
use sha2::{Digest, Sha256};
use tracing::{debug, instrument};

use mdchunk_shared::{Result, char_len};

/// Instruction sent with every chunk.
const SYSTEM_PROMPT: &str = "\
I will give you a passage of text. Ask several questions about it and number them. \
For example, given \"Alice is a student and she likes badminton.\" you reply:
1. What is Alice's occupation?
2. What is Alice's hobby?
Only ask questions the passage itself clearly answers, do not extrapolate. \
Reply with the questions only and nothing else.";

/// Matches a numbered list line such as `3. What is ...`.
static NUMBERED_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d+\.\s*(.*)$").expect("numbered line regex"));

// ---------------------------------------------------------------------------
// Capabilities
// ---------------------------------------------------------------------------

/// Something that returns the questions a block of text can answer.
pub trait QuestionSource: Send + Sync {
    /// Questions answerable from `text`, in the order they were produced.
    fn ask(&self, text: &str) -> impl Future<Output = Result<Vec<String>>> + Send;
}

/// A system instruction plus the user content it applies to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Prompt {
    pub system: String,
    pub content: String,
}

/// A text-to-text language model.
pub trait TextModel: Send + Sync {
    /// Identifier of the model, used for cache keying.
    fn model_id(&self) -> &str;

    /// Complete `prompt` and return the raw reply text.
    fn complete(&self, prompt: &Prompt) -> impl Future<Output = Result<String>> + Send;
}

// ---------------------------------------------------------------------------
// QuestionGenerator
// ---------------------------------------------------------------------------

/// Prompts a [`TextModel`] for numbered questions and parses the reply.
///
/// Answers are cached for the lifetime of the generator, keyed by a hash of
/// the text and model id. Failed calls are not cached.
pub struct QuestionGenerator<M> {
    model: M,
    max_prompt_chars: usize,
    cache: Mutex<HashMap<String, Vec<String>>>,
}

impl<M: TextModel> QuestionGenerator<M> {
    /// Wrap `model`, truncating chunk text beyond `max_prompt_chars`.
    pub fn new(model: M, max_prompt_chars: usize) -> Self {
        Self {
            model,
            max_prompt_chars,
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Number of distinct texts answered so far.
    pub fn cached(&self) -> usize {
        self.cache.lock().map(|c| c.len()).unwrap_or(0)
    }

    fn cache_get(&self, key: &str) -> Option<Vec<String>> {
        self.cache.lock().ok()?.get(key).cloned()
    }

    fn cache_put(&self, key: String, questions: Vec<String>) {
        if let Ok(mut cache) = self.cache.lock() {
            cache.insert(key, questions);
        }
    }
}

impl<M: TextModel> QuestionSource for QuestionGenerator<M> {
    #[instrument(skip_all, fields(model = %self.model.model_id(), len = text.len()))]
    async fn ask(&self, text: &str) -> Result<Vec<String>> {
        let key = prompt_hash(text, self.model.model_id());
        if let Some(hit) = self.cache_get(&key) {
            debug!("question cache hit");
            return Ok(hit);
        }

        let prompt = Prompt {
            system: SYSTEM_PROMPT.to_string(),
            content: truncate_content(text, self.max_prompt_chars),
        };
        let reply = self.model.complete(&prompt).await?;
        let questions = parse_numbered_questions(&reply);
        debug!(questions = questions.len(), "questions parsed");

        self.cache_put(key, questions.clone());
        Ok(questions)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Keep the numbered lines of a model reply, with their numbering stripped.
pub fn parse_numbered_questions(reply: &str) -> Vec<String> {
    reply
        .trim()
        .lines()
        .filter_map(|line| NUMBERED_RE.captures(line.trim()))
        .map(|caps| caps[1].trim().to_string())
        .filter(|question| !question.is_empty())
        .collect()
}

/// Compute a prompt hash for cache keying.
fn prompt_hash(content: &str, model_id: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(content.as_bytes());
    hasher.update([0u8]);
    hasher.update(model_id.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Truncate content to at most `max_chars` characters.
fn truncate_content(content: &str, max_chars: usize) -> String {
    if char_len(content) <= max_chars {
        return content.to_string();
    }
    let cut = content
        .char_indices()
        .nth(max_chars)
        .map_or(content.len(), |(i, _)| i);
    format!("{}\n\n[... content truncated ...]", &content[..cut])
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
