//! Keyword retrieval.
//!
//! A document matches when at least one whitespace-separated query token
//! occurs, case-insensitively, anywhere in its body. Matches keep store
//! order; there is no ranking.

use crate::store::DocumentStore;
use crate::types::{Document, RetrievalResult};

/// Default cap on documents returned per query.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Keyword retriever with a fixed result cap.
#[derive(Debug, Clone, Copy)]
pub struct Retriever {
    max_results: usize,
}

impl Default for Retriever {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_RESULTS)
    }
}

impl Retriever {
    pub fn new(max_results: usize) -> Self {
        Self { max_results }
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Retrieve matching documents from a store.
    pub fn retrieve<'a>(&self, query: &str, store: &'a DocumentStore) -> RetrievalResult<'a> {
        retrieve(query, store.documents(), self.max_results)
    }
}

/// Return at most `max_results` documents whose body contains any query
/// token, in the order they appear in `documents`.
pub fn retrieve<'a>(query: &str, documents: &'a [Document], max_results: usize) -> RetrievalResult<'a> {
    let tokens: Vec<String> = query.split_whitespace().map(str::to_lowercase).collect();

    if tokens.is_empty() {
        tracing::debug!("Empty query, nothing retrieved");
        return RetrievalResult::default();
    }

    let matched: Vec<&Document> = documents
        .iter()
        .filter(|doc| {
            let body = doc.body.to_lowercase();
            tokens.iter().any(|t| body.contains(t.as_str()))
        })
        .take(max_results)
        .collect();

    tracing::debug!(
        "Retrieved {} of {} documents for query: {}",
        matched.len(),
        documents.len(),
        query
    );

    RetrievalResult { documents: matched }
}
