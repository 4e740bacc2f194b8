//! Retrieval capability
//!
//! Research tasks obtain raw context through the [`Retriever`] trait: a
//! query in, plain text out. An empty string is a valid answer meaning
//! "nothing found"; transport failures surface as
//! [`AppError::RetrievalUnavailable`](crate::types::AppError::RetrievalUnavailable).
//!
//! # Module Structure
//!
//! - [`search`](crate::tools::search) - Web search via DuckDuckGo (daedra)
//! - [`exa`](crate::tools::exa) - Exa neural search over HTTP
//! - [`stub`](crate::tools::stub) - Deterministic offline results
//!
//! # Context Format
//!
//! Every retriever renders its hits the same way, which is the format the
//! research stage reads source locators from:
//!
//! ```text
//! [Title] snippet text
//! URL: https://example.com/page
//! ```

/// Exa neural search retriever.
pub mod exa;
/// Web search retriever using DuckDuckGo.
pub mod search;
/// Deterministic offline retriever.
pub mod stub;

use crate::types::Result;
use crate::utils::{ResearchConfig, SearchProviderKind};
use async_trait::async_trait;
use std::sync::Arc;

pub use exa::ExaRetriever;
pub use search::WebSearchRetriever;
pub use stub::StubRetriever;

/// A retrieval backend consumed by the research stage.
#[async_trait]
pub trait Retriever: Send + Sync {
    /// Run `query` and return the rendered context block
    async fn retrieve(&self, query: &str) -> Result<String>;

    /// Short backend name for logs
    fn name(&self) -> &str;
}

/// Build the retriever selected by `config`.
///
/// Offline mode always yields the [`StubRetriever`].
pub fn create_retriever(config: &ResearchConfig) -> Result<Arc<dyn Retriever>> {
    match config.search_provider() {
        SearchProviderKind::DuckDuckGo => Ok(Arc::new(WebSearchRetriever::new(
            config.search.max_results,
        ))),
        SearchProviderKind::Exa => Ok(Arc::new(ExaRetriever::new(
            config.exa_api_key()?,
            config.search.api_base.clone(),
            config.search.max_results,
            config.search.num_sentences,
            config.search.timeout(),
        )?)),
        SearchProviderKind::Stub => Ok(Arc::new(StubRetriever::new())),
    }
}

/// A single normalized search result.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchHit {
    pub title: String,
    pub snippet: String,
    pub url: String,
}

/// Render hits into the plain-text context block. No hits renders as "".
pub fn render_hits(hits: &[SearchHit]) -> String {
    hits.iter()
        .filter(|hit| !hit.url.trim().is_empty())
        .map(|hit| {
            let title = if hit.title.trim().is_empty() {
                "No title"
            } else {
                hit.title.trim()
            };
            format!("[{}] {}\nURL: {}", title, hit.snippet.trim(), hit.url.trim())
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}
