//! Keyword, semantic, and hybrid retrieval.
//!
//! Hybrid mode runs two independent strategies against the index store —
//! embedding similarity and substring keyword matching — and merges their
//! ranked lists with Reciprocal Rank Fusion:
//! `RRF_score(r) = sum(weight_i / (k + rank_i(r)))` with the standard
//! `k = 60`. Results appearing in both lists have their scores summed, so
//! agreement between signals outranks a single strong signal.

use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{bail, Result};

use crate::config::Config;
use crate::models::{ChunkType, SearchResult, StoredChunk};
use crate::store::IndexStore;

/// Standard RRF constant (from the original RRF paper).
const RRF_K: f64 = 60.0;

/// Content prefix length used as the dedup key across strategies.
const DEDUP_PREFIX_CHARS: usize = 100;

/// Query tokens dropped regardless of length. Shorter stopwords (`is`,
/// `on`, `it`, ...) are already caught by the minimum-length filter.
const STOPWORDS: &[&str] = &[
    "the", "and", "for", "are", "but", "nor", "was", "were", "with", "from", "into", "onto",
    "over", "under", "this", "that", "these", "those", "have", "has", "had", "not", "its",
    "any", "all", "out", "about",
];

const MIN_TERM_LEN: usize = 3;

/// Which retrieval strategy (or merge of both) answers a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SearchMode {
    Hybrid,
    Semantic,
    Keyword,
}

impl SearchMode {
    pub fn requires_embeddings(&self) -> bool {
        matches!(self, SearchMode::Hybrid | SearchMode::Semantic)
    }
}

impl FromStr for SearchMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "hybrid" => Ok(SearchMode::Hybrid),
            "semantic" => Ok(SearchMode::Semantic),
            "keyword" => Ok(SearchMode::Keyword),
            other => bail!(
                "Unknown search mode: {}. Use keyword, semantic, or hybrid.",
                other
            ),
        }
    }
}

/// Answer a query with a ranked, deduplicated result list.
///
/// This is the library entry point used by the CLI and by tool callers.
/// `chunk_type` restricts results to one chunk category.
pub async fn hybrid_search(
    store: &IndexStore,
    config: &Config,
    query: &str,
    n_results: usize,
    mode: SearchMode,
    chunk_type: Option<ChunkType>,
) -> Result<Vec<SearchResult>> {
    store.ensure_indexed().await?;

    if query.trim().is_empty() {
        return Ok(Vec::new());
    }

    let preview = config.retrieval.preview_chars;

    match mode {
        SearchMode::Semantic => semantic_search(store, query, n_results, chunk_type, preview).await,
        SearchMode::Keyword => {
            keyword_search(store, config, query, n_results, chunk_type).await
        }
        SearchMode::Hybrid => {
            // Over-fetch so deduplication still leaves enough candidates.
            let fetch = n_results * 2;

            let semantic = semantic_search(store, query, fetch, chunk_type, preview).await?;

            // Keyword failure degrades to empty results; semantic is the
            // primary signal and its errors propagate.
            let keyword = match keyword_search(store, config, query, fetch, chunk_type).await {
                Ok(results) => results,
                Err(e) => {
                    eprintln!("Warning: keyword search failed, semantic only: {}", e);
                    Vec::new()
                }
            };

            Ok(fuse_rrf(
                &semantic,
                &keyword,
                config.retrieval.semantic_weight,
                config.retrieval.keyword_weight,
                n_results,
            ))
        }
    }
}

/// Embed the query and rank stored chunks by cosine similarity.
async fn semantic_search(
    store: &IndexStore,
    query: &str,
    n: usize,
    chunk_type: Option<ChunkType>,
    preview_chars: usize,
) -> Result<Vec<SearchResult>> {
    let hits = store.query_similarity(query, n, chunk_type).await?;
    Ok(hits
        .into_iter()
        .map(|(chunk, _)| to_result(chunk, preview_chars))
        .collect())
}

/// Substring keyword search: fetch candidates containing ANY term in one
/// store query, then score by the count of distinct terms each chunk
/// contains (case-insensitive, against the full chunk text).
async fn keyword_search(
    store: &IndexStore,
    config: &Config,
    query: &str,
    n: usize,
    chunk_type: Option<ChunkType>,
) -> Result<Vec<SearchResult>> {
    let terms = tokenize_query(query);
    if terms.is_empty() {
        // Never fall back to the raw query.
        return Ok(Vec::new());
    }

    let candidates = store
        .query_contains(&terms, config.retrieval.keyword_scan_cap, chunk_type)
        .await?;

    let mut scored: Vec<(StoredChunk, usize)> = candidates
        .into_iter()
        .filter_map(|chunk| {
            let haystack = chunk.text.to_lowercase();
            let hits = terms.iter().filter(|t| haystack.contains(t.as_str())).count();
            if hits > 0 {
                Some((chunk, hits))
            } else {
                None
            }
        })
        .collect();

    // Stable sort keeps store order among equal hit counts — deterministic.
    scored.sort_by(|a, b| b.1.cmp(&a.1));
    scored.truncate(n);

    Ok(scored
        .into_iter()
        .map(|(chunk, _)| to_result(chunk, config.retrieval.preview_chars))
        .collect())
}

/// Tokenize a query for keyword search: whitespace split, surrounding
/// punctuation stripped, lowercased, short tokens and stopwords dropped,
/// order-preserving dedup.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for token in query.split_whitespace() {
        let token = token
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_lowercase();

        if token.chars().count() < MIN_TERM_LEN {
            continue;
        }
        if STOPWORDS.contains(&token.as_str()) {
            continue;
        }
        if !terms.contains(&token) {
            terms.push(token);
        }
    }

    terms
}

/// Merge two independently ranked lists with Reciprocal Rank Fusion.
///
/// Dedup key is (source, first 100 chars of content), tolerating minor
/// truncation differences between strategies; scores for a shared key are
/// summed, never maxed.
pub fn fuse_rrf(
    semantic: &[SearchResult],
    keyword: &[SearchResult],
    semantic_weight: f64,
    keyword_weight: f64,
    n_results: usize,
) -> Vec<SearchResult> {
    struct Fused {
        result: SearchResult,
        score: f64,
        arrival: usize,
    }

    let mut fused: HashMap<(String, String), Fused> = HashMap::new();
    let mut arrival = 0usize;

    let mut accumulate = |list: &[SearchResult], weight: f64| {
        for (rank, result) in list.iter().enumerate() {
            let score = weight / (RRF_K + rank as f64 + 1.0);
            let key = dedup_key(result);
            let entry = fused.entry(key).or_insert_with(|| {
                arrival += 1;
                Fused {
                    result: result.clone(),
                    score: 0.0,
                    arrival,
                }
            });
            entry.score += score;
        }
    };

    accumulate(semantic, semantic_weight);
    accumulate(keyword, keyword_weight);

    let mut merged: Vec<Fused> = fused.into_values().collect();
    merged.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.arrival.cmp(&b.arrival))
    });
    merged.truncate(n_results);

    merged.into_iter().map(|f| f.result).collect()
}

fn dedup_key(result: &SearchResult) -> (String, String) {
    let prefix: String = result.content.chars().take(DEDUP_PREFIX_CHARS).collect();
    (result.source.clone(), prefix)
}

fn to_result(chunk: StoredChunk, preview_chars: usize) -> SearchResult {
    SearchResult {
        source: chunk.source,
        content: truncate_chars(&chunk.text, preview_chars),
        heading: chunk.heading,
    }
}

fn truncate_chars(text: &str, max: usize) -> String {
    if text.chars().count() <= max {
        return text.to_string();
    }
    text.chars().take(max).collect()
}

/// CLI wrapper: run a search and print human-readable results. "No
/// results." is a normal outcome, distinct from errors.
pub async fn run_search(
    config: &Config,
    query: &str,
    mode: &str,
    chunk_type: Option<String>,
    limit: Option<usize>,
) -> Result<()> {
    let mode = SearchMode::from_str(mode)?;

    if mode.requires_embeddings() && !config.embedding.is_enabled() {
        bail!(
            "Mode '{:?}' requires embeddings. Set [embedding] provider in config.",
            mode
        );
    }

    let chunk_type = chunk_type
        .map(|s| s.parse::<ChunkType>())
        .transpose()?;

    let store = IndexStore::open(config).await?;
    let n = limit.unwrap_or(config.retrieval.n_results);

    let results = hybrid_search(&store, config, query, n, mode, chunk_type).await?;

    if results.is_empty() {
        println!("No results.");
        store.close().await;
        return Ok(());
    }

    for (i, result) in results.iter().enumerate() {
        println!("{}. {} / {}", i + 1, result.source, result.heading);
        println!(
            "    excerpt: \"{}\"",
            result.content.replace('\n', " ").trim()
        );
        println!();
    }

    store.close().await;
    Ok(())
}
