//! Exa neural search retriever
//!
//! Exa returns semantically relevant results with pre-extracted highlight
//! sentences, which gives the research stage denser context than raw
//! snippets. The API key is read from the environment variable named in
//! the search configuration.

use crate::tools::{Retriever, SearchHit, render_hits};
use crate::types::{AppError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;
use std::time::Duration;

pub const DEFAULT_EXA_API_BASE: &str = "https://api.exa.ai";

pub struct ExaRetriever {
    client: reqwest::Client,
    api_key: String,
    api_base: String,
    max_results: usize,
    num_sentences: usize,
}

#[derive(Debug, Deserialize)]
struct ExaResponse {
    #[serde(default)]
    results: Vec<ExaResult>,
}

#[derive(Debug, Deserialize)]
struct ExaResult {
    title: Option<String>,
    url: Option<String>,
    #[serde(default)]
    highlights: Vec<String>,
}

impl ExaRetriever {
    pub fn new(
        api_key: String,
        api_base: String,
        max_results: usize,
        num_sentences: usize,
        timeout: Duration,
    ) -> Result<Self> {
        if api_key.trim().is_empty() {
            return Err(AppError::Config(
                "Exa API key is required for the exa search provider".to_string(),
            ));
        }

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            api_key,
            api_base: api_base.trim_end_matches('/').to_string(),
            max_results: max_results.max(1),
            num_sentences: num_sentences.max(1),
        })
    }
}

#[async_trait]
impl Retriever for ExaRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        let body = json!({
            "query": query,
            "numResults": self.max_results,
            "useAutoprompt": true,
            "contents": {
                "highlights": { "numSentences": self.num_sentences }
            }
        });

        let response = self
            .client
            .post(format!("{}/search", self.api_base))
            .header("x-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AppError::RetrievalUnavailable(format!("Exa request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::RetrievalUnavailable(format!(
                "Exa returned HTTP {}",
                status
            )));
        }

        let parsed: ExaResponse = response.json().await.map_err(|e| {
            AppError::RetrievalUnavailable(format!("Invalid Exa response body: {}", e))
        })?;

        let hits: Vec<SearchHit> = parsed
            .results
            .into_iter()
            .take(self.max_results)
            .map(|r| SearchHit {
                title: r.title.unwrap_or_default(),
                snippet: r.highlights.join(" "),
                url: r.url.unwrap_or_default(),
            })
            .collect();

        tracing::debug!(query, hits = hits.len(), "exa search complete");
        Ok(render_hits(&hits))
    }

    fn name(&self) -> &str {
        "exa"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_requires_api_key() {
        let result = ExaRetriever::new(
            "  ".to_string(),
            DEFAULT_EXA_API_BASE.to_string(),
            5,
            3,
            Duration::from_secs(5),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }
}
