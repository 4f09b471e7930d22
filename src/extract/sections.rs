//! Section sizing and splitting.
//!
//! Extracted text is cut into token-bounded sections before embedding:
//!
//! - Sizing: an explicit `TEXT_SPLITTER_CHUNK_SIZE` wins; otherwise the budget is a quarter of
//!   the embedding model's context window, clamped to `[256, 1024]` tokens.
//! - Overlap: `TEXT_SPLITTER_CHUNK_OVERLAP` tokens from the tail of a section are repeated at the
//!   head of the next one, without exceeding the budget.
//! - Token counting: `tiktoken-rs` encodings for OpenAI and known models, whitespace counting
//!   for local models without a matching tokenizer.

use super::ExtractionError;
use crate::config::EmbeddingProvider;
use crate::qdrant::{DocumentFields, compute_content_hash};
use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::collections::HashSet;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, model::get_context_size, o200k_base, p50k_base,
    r50k_base,
};

type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

const MIN_AUTOMATIC_CHUNK_SIZE: usize = 256;
const MAX_AUTOMATIC_CHUNK_SIZE: usize = 1024;
const DEFAULT_CONTEXT_WINDOW: usize = 4096;

/// Determine the section token budget, respecting an explicit override.
pub fn determine_chunk_size(
    override_size: Option<usize>,
    provider: EmbeddingProvider,
    model: &str,
) -> usize {
    if let Some(explicit) = override_size {
        return explicit.max(1);
    }

    let window = embedding_context_window(provider, model);
    (window / 4).clamp(MIN_AUTOMATIC_CHUNK_SIZE, MAX_AUTOMATIC_CHUNK_SIZE)
}

fn embedding_context_window(provider: EmbeddingProvider, model: &str) -> usize {
    match provider {
        EmbeddingProvider::OpenAI => {
            if model.starts_with("text-embedding-3") || model.starts_with("text-embedding-ada-002")
            {
                8192
            } else {
                get_context_size(model)
            }
        }
        EmbeddingProvider::Ollama => match model.to_lowercase().as_str() {
            "nomic-embed-text" | "mxbai-embed-large" | "mxbai-embed-large-v1" => 8192,
            value if value.contains("all-minilm") => 512,
            _ => {
                tracing::trace!(model, "Using default Ollama context window estimate");
                DEFAULT_CONTEXT_WINDOW
            }
        },
        EmbeddingProvider::Hash => DEFAULT_CONTEXT_WINDOW,
    }
}

/// Splits text into token-bounded sections with optional overlap.
#[derive(Clone)]
pub struct SectionSplitter {
    chunk_size: usize,
    overlap: usize,
    counter: TokenCounter,
}

impl SectionSplitter {
    /// Build a splitter whose token counting matches the embedding model.
    pub fn new(
        chunk_size: usize,
        overlap: usize,
        provider: EmbeddingProvider,
        model: &str,
    ) -> Result<Self, ExtractionError> {
        let counter = match provider {
            EmbeddingProvider::OpenAI => tiktoken_counter(model)?,
            EmbeddingProvider::Ollama => tiktoken_counter(model).unwrap_or_else(|error| {
                tracing::warn!(
                    model,
                    error = %error,
                    "Tokenizer unavailable for Ollama model; falling back to whitespace counter"
                );
                whitespace_counter()
            }),
            EmbeddingProvider::Hash => whitespace_counter(),
        };
        Self::with_counter(chunk_size, overlap, counter)
    }

    fn with_counter(
        chunk_size: usize,
        overlap: usize,
        counter: TokenCounter,
    ) -> Result<Self, ExtractionError> {
        if chunk_size == 0 {
            return Err(ExtractionError::InvalidChunkSize);
        }
        Ok(Self {
            chunk_size,
            overlap: overlap.min(chunk_size - 1),
            counter,
        })
    }

    /// Token budget per section.
    pub fn chunk_size(&self) -> usize {
        self.chunk_size
    }

    /// Split `text` into sections; whitespace-only input yields nothing.
    pub fn split(&self, text: &str) -> Vec<String> {
        if text.trim().is_empty() {
            return Vec::new();
        }

        let counter = self.counter.clone();
        let chunker = Chunker::new(
            self.chunk_size,
            Box::new(move |segment: &str| counter.as_ref()(segment)),
        );
        let sections = chunker.chunk(text);
        if self.overlap == 0 || sections.len() < 2 {
            return sections;
        }

        let mut overlapped = Vec::with_capacity(sections.len());
        let mut previous: Option<&str> = None;
        for current in &sections {
            let section = match previous {
                Some(prev) => self.join_with_tail(prev, current),
                None => current.clone(),
            };
            overlapped.push(section);
            previous = Some(current.as_str());
        }
        overlapped
    }

    fn count(&self, text: &str) -> usize {
        self.counter.as_ref()(text)
    }

    fn join_with_tail(&self, previous: &str, current: &str) -> String {
        let tail = self.suffix_within(previous, self.overlap);
        if tail.is_empty() {
            return current.to_string();
        }
        let separator =
            if tail.ends_with(char::is_whitespace) || current.starts_with(char::is_whitespace) {
                ""
            } else {
                " "
            };
        let combined = format!("{tail}{separator}{current}");
        self.suffix_within(&combined, self.chunk_size).to_string()
    }

    /// Longest suffix of `text` starting at a word boundary that fits in `budget` tokens.
    ///
    /// Token counts shrink as the suffix shrinks, so the cut point is found by binary search
    /// over word starts.
    fn suffix_within<'a>(&self, text: &'a str, budget: usize) -> &'a str {
        let text = text.trim_start();
        if self.count(text) <= budget {
            return text;
        }
        let starts = word_starts(text);
        let first_fit = starts.partition_point(|&start| self.count(&text[start..]) > budget);
        starts.get(first_fit).map_or("", |&start| &text[start..])
    }
}

/// Byte offsets of every word start after the first.
fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut previous_is_space = false;
    for (offset, c) in text.char_indices() {
        let is_space = c.is_whitespace();
        if previous_is_space && !is_space {
            starts.push(offset);
        }
        previous_is_space = is_space;
    }
    starts
}

fn tiktoken_counter(model: &str) -> Result<TokenCounter, ExtractionError> {
    let target = match model.trim() {
        "" => "cl100k_base",
        trimmed => trimmed,
    };
    let encoding = resolve_encoding(target).map_err(|source| ExtractionError::Tokenizer {
        model: target.to_string(),
        source,
    })?;
    let encoding = Arc::new(encoding);
    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    if let Ok(encoding) = get_bpe_from_model(model) {
        return Ok(encoding);
    }
    match model {
        "o200k_base" => o200k_base(),
        "p50k_base" => p50k_base(),
        "r50k_base" | "gpt2" => r50k_base(),
        _ => {
            tracing::debug!(model, "Falling back to 'cl100k_base' encoding for token counting");
            cl100k_base()
        }
    }
}

fn whitespace_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Naming scheme for the sections of one blob.
#[derive(Debug, Clone, Copy)]
pub struct SectionSource<'a> {
    /// Blob name or URL the text came from.
    pub source_file: &'a str,
    /// Category stored with each section.
    pub category: &'static str,
}

impl SectionSource<'_> {
    /// Citation target for a page (1-based) or record of the blob.
    ///
    /// PDF pages cite a per-page file name (`guide.pdf` page 2 becomes `guide-2.pdf`); other
    /// sources cite `source#part`.
    pub fn source_page(&self, part: usize) -> String {
        let file = self.source_file;
        match file.rsplit_once('.') {
            Some((stem, ext)) if ext.eq_ignore_ascii_case("pdf") && !stem.is_empty() => {
                let stem = stem.rsplit(['/', '\\']).next().unwrap_or(stem);
                format!("{stem}-{part}.pdf")
            }
            _ => format!("{file}#{part}"),
        }
    }

    /// Index-safe key for section `ordinal` of `part`.
    ///
    /// Lossy: distinct sources may share a key. Use [`Self::section_identity`] to address points.
    pub fn section_key(&self, part: usize, ordinal: usize) -> String {
        sanitize_key(&format!("{}-{part}-{ordinal}", self.source_file))
    }

    /// Exact identity of section `ordinal` of `part`, unique per source and category.
    pub fn section_identity(&self, part: usize, ordinal: usize) -> String {
        format!(
            "{}\u{0}{}\u{0}{part}\u{0}{ordinal}",
            self.category, self.source_file
        )
    }
}

/// Replace characters outside `[A-Za-z0-9_-]` with `_` and drop leading underscores.
pub fn sanitize_key(raw: &str) -> String {
    let sanitized: String = raw
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                c
            } else {
                '_'
            }
        })
        .collect();
    sanitized.trim_start_matches('_').to_string()
}

/// Split the parts of a blob into sections, dropping repeated content.
///
/// `parts` are PDF pages or JSON records and are numbered from 1. Returns the sections plus the
/// number of duplicates skipped.
pub fn build_sections(
    source: SectionSource<'_>,
    parts: &[String],
    splitter: &SectionSplitter,
) -> (Vec<DocumentFields>, usize) {
    let mut seen = HashSet::new();
    let mut sections = Vec::new();
    let mut skipped = 0;

    for (index, part) in parts.iter().enumerate() {
        let number = index + 1;
        for (ordinal, content) in splitter.split(part).into_iter().enumerate() {
            if content.trim().is_empty() {
                continue;
            }
            if !seen.insert(compute_content_hash(&content)) {
                skipped += 1;
                continue;
            }
            sections.push(DocumentFields {
                key: source.section_key(number, ordinal),
                identity: source.section_identity(number, ordinal),
                content,
                category: source.category.to_string(),
                source_page: source.source_page(number),
                source_file: source.source_file.to_string(),
            });
        }
    }

    (sections, skipped)
}
