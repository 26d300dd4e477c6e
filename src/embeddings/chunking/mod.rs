
use anyhow::Result;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::documents::{Document, PageText};

/// A chunk of document text ready for embedding
#[derive(Debug, Clone, PartialEq)]
pub struct ContentChunk {
    /// The content text
    pub content: String,
    /// Title of the source document
    pub doc_title: String,
    /// 1-based page the chunk came from
    pub page_number: usize,
    /// The index of this chunk within the document
    pub chunk_index: usize,
    /// Estimated token count
    pub token_count: usize,
}

/// Configuration for content chunking
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChunkingConfig {
    /// Target chunk size in tokens
    pub target_chunk_size: usize,
    /// Maximum chunk size in tokens before forced splitting
    pub max_chunk_size: usize,
    /// Minimum chunk size in tokens (smaller chunks will be merged)
    pub min_chunk_size: usize,
    /// Overlap size in tokens between adjacent chunks of the same page
    pub overlap_size: usize,
}

impl Default for ChunkingConfig {
    #[inline]
    fn default() -> Self {
        Self {
            target_chunk_size: 650,
            max_chunk_size: 1000,
            min_chunk_size: 100,
            overlap_size: 50,
        }
    }
}

/// Chunk a loaded document into embedding-ready pieces, page by page.
#[inline]
pub fn chunk_document(document: &Document, config: &ChunkingConfig) -> Result<Vec<ContentChunk>> {
    let mut chunks = Vec::new();
    let mut chunk_index = 0;

    for page in &document.pages {
        let page_chunks = chunk_page(&document.title, page, config, &mut chunk_index);
        chunks.extend(page_chunks);
    }

    let processed_chunks = post_process_chunks(chunks, config);

    debug!(
        "Chunked document '{}' into {} chunks (avg {} tokens)",
        document.title,
        processed_chunks.len(),
        processed_chunks
            .iter()
            .map(|c| c.token_count)
            .sum::<usize>()
            / processed_chunks.len().max(1)
    );

    Ok(processed_chunks)
}

/// Chunk the text of a single page
fn chunk_page(
    doc_title: &str,
    page: &PageText,
    config: &ChunkingConfig,
    chunk_index: &mut usize,
) -> Vec<ContentChunk> {
    let mut chunks = Vec::new();
    let content = &page.text;

    if content.trim().is_empty() {
        return chunks;
    }

    let token_count = estimate_token_count(content);

    // Small pages stay whole
    if token_count <= config.target_chunk_size {
        chunks.push(ContentChunk {
            content: content.trim().to_string(),
            doc_title: doc_title.to_string(),
            page_number: page.page_number,
            chunk_index: *chunk_index,
            token_count,
        });
        *chunk_index += 1;
        return chunks;
    }

    for split in split_by_semantics(content, config) {
        if split.trim().is_empty() {
            continue;
        }

        let chunk_token_count = estimate_token_count(&split);
        chunks.push(ContentChunk {
            content: split,
            doc_title: doc_title.to_string(),
            page_number: page.page_number,
            chunk_index: *chunk_index,
            token_count: chunk_token_count,
        });
        *chunk_index += 1;
    }

    chunks
}

/// Split content at paragraph boundaries, falling back to sentences and
/// finally words for oversized paragraphs
fn split_by_semantics(content: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();
    let mut current_token_count = 0;

    for paragraph in content.split("\n\n") {
        if paragraph.trim().is_empty() {
            continue;
        }

        let paragraph_tokens = estimate_token_count(paragraph);

        if paragraph_tokens > config.max_chunk_size {
            for piece in split_by_sentences(paragraph, config) {
                let piece_tokens = estimate_token_count(&piece);
                if current_token_count + piece_tokens > config.target_chunk_size
                    && !current_split.trim().is_empty()
                {
                    splits.push(current_split.trim().to_string());
                    current_split.clear();
                    current_token_count = 0;
                }
                current_split.push_str(&piece);
                current_split.push_str("\n\n");
                current_token_count += piece_tokens;
            }
        } else {
            if current_token_count + paragraph_tokens > config.target_chunk_size
                && !current_split.trim().is_empty()
            {
                splits.push(current_split.trim().to_string());
                current_split.clear();
                current_token_count = 0;
            }

            current_split.push_str(paragraph);
            current_split.push_str("\n\n");
            current_token_count += paragraph_tokens;
        }
    }

    if !current_split.trim().is_empty() {
        splits.push(current_split.trim().to_string());
    }

    splits
}

/// Split text by sentences
fn split_by_sentences(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();
    let mut current_token_count = 0;

    let sentences = text
        .split(['.', '!', '?'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>();

    for (i, sentence) in sentences.iter().enumerate() {
        let sentence_with_punct = if i < sentences.len() - 1 {
            format!("{}. ", sentence)
        } else {
            (*sentence).to_string()
        };

        let sentence_tokens = estimate_token_count(&sentence_with_punct);

        // A single run-on sentence can still exceed the maximum
        if sentence_tokens > config.max_chunk_size {
            if !current_split.trim().is_empty() {
                splits.push(current_split.trim().to_string());
                current_split.clear();
                current_token_count = 0;
            }
            splits.extend(split_by_words(&sentence_with_punct, config));
            continue;
        }

        if current_token_count + sentence_tokens > config.target_chunk_size
            && !current_split.trim().is_empty()
        {
            splits.push(current_split.trim().to_string());
            current_split.clear();
            current_token_count = 0;
        }

        current_split.push_str(&sentence_with_punct);
        current_token_count += sentence_tokens;
    }

    if !current_split.trim().is_empty() {
        splits.push(current_split.trim().to_string());
    }

    splits
}

/// Split text by words as a last resort
fn split_by_words(text: &str, config: &ChunkingConfig) -> Vec<String> {
    let mut splits = Vec::new();
    let mut current_split = String::new();
    let mut current_token_count = 0;

    for word in text.split_whitespace() {
        let word_with_space = format!("{} ", word);
        let word_tokens = estimate_token_count(&word_with_space);

        if current_token_count + word_tokens > config.target_chunk_size
            && !current_split.trim().is_empty()
        {
            splits.push(current_split.trim().to_string());
            current_split.clear();
            current_token_count = 0;
        }

        current_split.push_str(&word_with_space);
        current_token_count += word_tokens;
    }

    if !current_split.trim().is_empty() {
        splits.push(current_split.trim().to_string());
    }

    splits
}

/// Merge undersized chunks into their predecessor and add overlap between
/// adjacent chunks of the same page
fn post_process_chunks(chunks: Vec<ContentChunk>, config: &ChunkingConfig) -> Vec<ContentChunk> {
    if chunks.is_empty() {
        return chunks;
    }

    let mut processed: Vec<ContentChunk> = Vec::new();

    for chunk in chunks {
        if chunk.token_count < config.min_chunk_size {
            if let Some(previous) = processed.last_mut() {
                if previous.page_number == chunk.page_number
                    && previous.token_count + chunk.token_count <= config.max_chunk_size
                {
                    previous.content.push_str("\n\n");
                    previous.content.push_str(&chunk.content);
                    previous.token_count += chunk.token_count;
                    continue;
                }
            }
        }
        processed.push(chunk);
    }

    if config.overlap_size > 0 {
        processed = add_overlap(processed, config);
    }

    // Re-index after merging
    for (i, chunk) in processed.iter_mut().enumerate() {
        chunk.chunk_index = i;
    }

    processed
}

/// Add overlap between adjacent chunks of the same page
fn add_overlap(mut chunks: Vec<ContentChunk>, config: &ChunkingConfig) -> Vec<ContentChunk> {
    let mut i = 1;
    while i < chunks.len() {
        let (left, right) = chunks.split_at_mut(i);
        let prev_chunk = &left[i - 1];
        let curr_chunk = &mut right[0];

        if prev_chunk.page_number == curr_chunk.page_number {
            let overlap_text = extract_overlap_text(&prev_chunk.content, config.overlap_size);
            if !overlap_text.is_empty() {
                curr_chunk.content = format!("{}\n\n{}", overlap_text, curr_chunk.content);
                curr_chunk.token_count += estimate_token_count(&overlap_text);
            }
        }
        i += 1;
    }

    chunks
}

/// Extract overlap text from the end of a chunk
fn extract_overlap_text(content: &str, overlap_tokens: usize) -> String {
    let words: Vec<&str> = content.split_whitespace().collect();
    let word_count = (overlap_tokens as f64 * 0.75) as usize;

    if words.len() <= word_count {
        return String::new();
    }

    words[words.len() - word_count.min(words.len())..].join(" ")
}

/// Estimate token count using a simple heuristic
/// This is a rough approximation - actual tokenization would be more accurate
#[inline]
pub fn estimate_token_count(text: &str) -> usize {
    // Rough heuristic: 1 token ≈ 0.75 words for English text
    // Add extra tokens for punctuation and special characters
    let word_count = text.split_whitespace().count();
    let punct_count = text.chars().filter(|c| c.is_ascii_punctuation()).count();

    (punct_count as f64).mul_add(0.1, word_count as f64 / 0.75) as usize
}
