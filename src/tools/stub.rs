use crate::tools::{Retriever, SearchHit, render_hits};
use crate::types::Result;
use async_trait::async_trait;

const STUB_HITS: [(&str, &str, &str); 3] = [
    (
        "Overview of the topic",
        "This article provides a comprehensive introduction to the subject.",
        "https://example.com/overview",
    ),
    (
        "Recent advances",
        "Researchers have made significant progress in this area over the past five years.",
        "https://example.com/recent-advances",
    ),
    (
        "Key challenges",
        "Several open problems remain, including scalability and interpretability.",
        "https://example.com/challenges",
    ),
];

/// Deterministic retriever for offline runs and tests.
///
/// Returns the same three example.com hits for every query, prefixed by
/// the query itself.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubRetriever;

impl StubRetriever {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Retriever for StubRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        let hits: Vec<SearchHit> = STUB_HITS
            .iter()
            .map(|(title, snippet, url)| SearchHit {
                title: title.to_string(),
                snippet: snippet.to_string(),
                url: url.to_string(),
            })
            .collect();

        Ok(format!("Results for: {}\n\n{}", query, render_hits(&hits)))
    }

    fn name(&self) -> &str {
        "stub"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_includes_query_and_urls() {
        let text = StubRetriever.retrieve("ocean acidification").await.unwrap();
        assert!(text.starts_with("Results for: ocean acidification"));
        assert!(text.contains("URL: https://example.com/overview"));
        assert!(text.contains("URL: https://example.com/challenges"));
    }

    #[tokio::test]
    async fn test_is_deterministic() {
        let first = StubRetriever.retrieve("q").await.unwrap();
        let second = StubRetriever.retrieve("q").await.unwrap();
        assert_eq!(first, second);
    }
}
