//! Retriever adapter: query text in, citable sources out.
use crate::error::TurnError;
use crate::llm::GenerationBackend;
use crate::retriever::{RetrievedChunk, VectorIndex};
use crate::turn::Source;
use std::cmp::Ordering;
use std::sync::Arc;
use tracing::{debug, info};

/// How far back from a forced cut we look for a sentence boundary.
const SENTENCE_LOOKBACK_CHARS: usize = 240;
/// A partial passage shorter than this is dropped rather than kept.
const MIN_PARTIAL_CHARS: usize = 80;
/// Joiner budget between passages, matching the "\n\n" the answerer uses.
const BLOCK_SEPARATOR_CHARS: usize = 2;

pub struct RetrieverAdapter {
    backend: Arc<dyn GenerationBackend>,
    index: Arc<dyn VectorIndex>,
    min_relevance_score: f32,
}

impl RetrieverAdapter {
    pub fn new(
        backend: Arc<dyn GenerationBackend>,
        index: Arc<dyn VectorIndex>,
        min_relevance_score: f32,
    ) -> Self {
        Self { backend, index, min_relevance_score }
    }

    /// Embeds the query, searches the index, and packages hits as tagged
    /// sources. Zero surviving hits is a valid empty result, not an error.
    pub async fn retrieve(
        &self,
        query: &str,
        doc_ids: Option<&[String]>,
        k: usize,
        max_context_chars: usize,
    ) -> Result<Vec<Source>, TurnError> {
        let embedding = self
            .backend
            .embed(query)
            .await
            .map_err(TurnError::Generation)?;

        let hits = self
            .index
            .search(&embedding, k, doc_ids)
            .await
            .map_err(TurnError::Retrieval)?;

        let total_hits = hits.len();
        let mut hits: Vec<RetrievedChunk> = hits
            .into_iter()
            .filter(|hit| hit.score >= self.min_relevance_score)
            .collect();

        // Stable sort: descending score, ties keep retriever order.
        hits.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(Ordering::Equal));

        let sources = fit_to_budget(hits, max_context_chars);
        if sources.is_empty() {
            info!(
                "Retrieval produced no sources above threshold {} ({} raw hits)",
                self.min_relevance_score, total_hits
            );
        } else {
            debug!("Retrieval packaged {} sources from {} hits", sources.len(), total_hits);
        }
        Ok(sources)
    }
}

/// Enforces the context budget, trimming lowest-scoring sources first.
/// A passage that only partially fits is cut at the latest sentence
/// boundary within the lookback window; if the leftover budget is too
/// small for a useful fragment, the passage is dropped instead.
fn fit_to_budget(hits: Vec<RetrievedChunk>, max_context_chars: usize) -> Vec<Source> {
    let mut used = 0usize;
    let mut sources = Vec::new();

    for (i, hit) in hits.into_iter().enumerate() {
        let remaining = max_context_chars.saturating_sub(used);
        let passage = if hit.passage.len() + BLOCK_SEPARATOR_CHARS <= remaining {
            hit.passage
        } else {
            if remaining < MIN_PARTIAL_CHARS {
                break;
            }
            let cut = truncate_at_sentence(&hit.passage, remaining.saturating_sub(BLOCK_SEPARATOR_CHARS));
            if cut.is_empty() {
                break;
            }
            let truncated = cut.to_string();
            used += truncated.len() + BLOCK_SEPARATOR_CHARS;
            sources.push(Source {
                id: format!("S{}", i + 1),
                document_id: hit.document_id,
                passage: truncated,
                score: hit.score,
                document_name: hit.document_name,
            });
            break;
        };

        used += passage.len() + BLOCK_SEPARATOR_CHARS;
        sources.push(Source {
            id: format!("S{}", i + 1),
            document_id: hit.document_id,
            passage,
            score: hit.score,
            document_name: hit.document_name,
        });
    }

    sources
}

/// Cuts `text` to at most `limit` bytes, preferring the latest sentence
/// terminator within the lookback window over a mid-sentence cut.
fn truncate_at_sentence(text: &str, limit: usize) -> &str {
    if text.len() <= limit {
        return text;
    }

    let mut hard = limit;
    while hard > 0 && !text.is_char_boundary(hard) {
        hard -= 1;
    }
    let slice = &text[..hard];

    let window_start = hard.saturating_sub(SENTENCE_LOOKBACK_CHARS);
    let boundary = slice
        .char_indices()
        .filter(|(idx, ch)| *idx >= window_start && matches!(ch, '.' | '!' | '?'))
        .map(|(idx, ch)| idx + ch.len_utf8())
        .next_back();

    match boundary {
        Some(end) => slice[..end].trim_end(),
        None => slice.trim_end(),
    }
}
