//! Search retriever implementation using daedra
//!
//! This module provides web search capabilities via the daedra crate,
//! which uses DuckDuckGo as the search backend.

use crate::tools::{Retriever, SearchHit, render_hits};
use crate::types::{AppError, Result};
use async_trait::async_trait;

/// Default number of hits requested per query
pub const DEFAULT_NUM_RESULTS: usize = 5;

/// Web search retriever powered by daedra
pub struct WebSearchRetriever {
    num_results: usize,
}

impl WebSearchRetriever {
    pub fn new(num_results: usize) -> Self {
        Self {
            num_results: num_results.max(1),
        }
    }
}

impl Default for WebSearchRetriever {
    fn default() -> Self {
        Self::new(DEFAULT_NUM_RESULTS)
    }
}

impl From<daedra::SearchResult> for SearchHit {
    fn from(result: daedra::SearchResult) -> Self {
        Self {
            title: result.title,
            snippet: result.description,
            url: result.url,
        }
    }
}

#[async_trait]
impl Retriever for WebSearchRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        if query.trim().is_empty() {
            return Err(AppError::InvalidInput("Missing search query".to_string()));
        }

        let search_args = daedra::SearchArgs {
            query: query.to_string(),
            options: Some(daedra::SearchOptions {
                num_results: self.num_results,
                ..Default::default()
            }),
        };

        let response = daedra::tools::search::perform_search(&search_args)
            .await
            .map_err(|e| AppError::RetrievalUnavailable(format!("Search failed: {}", e)))?;

        let hits: Vec<SearchHit> = response
            .data
            .into_iter()
            .take(self.num_results)
            .map(SearchHit::from)
            .collect();

        tracing::debug!(query, hits = hits.len(), "web search complete");
        Ok(render_hits(&hits))
    }

    fn name(&self) -> &str {
        "duckduckgo"
    }
}
