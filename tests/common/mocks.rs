//! Mock implementations for testing.
//!
//! Scripted completion and retrieval doubles shared by the integration
//! tests. Both record every call so tests can assert on retry bounds.

use ares_research::llm::{
    CompletionConstraints, CompletionPurpose, LLMClient, StubLLMClient,
};
use ares_research::tools::Retriever;
use ares_research::types::{AppError, Result};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;

/// Completion client with per-stage scripted responses.
///
/// For each call the client answers, in order of preference, with the next
/// queued response for that stage, the stage's fixed response, or the
/// deterministic stub's answer.
///
/// ```ignore
/// let llm = ScriptedLLMClient::new()
///     .always(CompletionPurpose::Planning, r#"["A?", "B?"]"#)
///     .then(CompletionPurpose::Synthesis, Err(AppError::CompletionUnavailable("down".into())));
/// ```
#[derive(Default)]
pub struct ScriptedLLMClient {
    fixed: HashMap<CompletionPurpose, String>,
    queued: Mutex<HashMap<CompletionPurpose, VecDeque<Result<String>>>>,
    calls: Mutex<Vec<(CompletionPurpose, String)>>,
    panics_on: Vec<(CompletionPurpose, String)>,
}

impl ScriptedLLMClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Answer every call for `purpose` with `response`.
    pub fn always(mut self, purpose: CompletionPurpose, response: &str) -> Self {
        self.fixed.insert(purpose, response.to_string());
        self
    }

    /// Queue a one-off response for the next call for `purpose`.
    pub fn then(self, purpose: CompletionPurpose, response: Result<String>) -> Self {
        self.queued
            .lock()
            .entry(purpose)
            .or_default()
            .push_back(response);
        self
    }

    /// Panic on calls for `purpose` whose prompt contains `needle`.
    pub fn panic_on(mut self, purpose: CompletionPurpose, needle: &str) -> Self {
        self.panics_on.push((purpose, needle.to_string()));
        self
    }

    /// Number of calls made for `purpose`.
    pub fn calls(&self, purpose: CompletionPurpose) -> usize {
        self.calls.lock().iter().filter(|(p, _)| *p == purpose).count()
    }

    /// Prompts sent for `purpose`, in call order.
    pub fn prompts(&self, purpose: CompletionPurpose) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter(|(p, _)| *p == purpose)
            .map(|(_, prompt)| prompt.clone())
            .collect()
    }
}

#[async_trait]
impl LLMClient for ScriptedLLMClient {
    async fn complete(&self, prompt: &str, constraints: &CompletionConstraints) -> Result<String> {
        let purpose = constraints.purpose;
        self.calls.lock().push((purpose, prompt.to_string()));

        if self
            .panics_on
            .iter()
            .any(|(p, needle)| *p == purpose && prompt.contains(needle.as_str()))
        {
            panic!("scripted crash for {:?} prompt", purpose);
        }

        let queued = self
            .queued
            .lock()
            .get_mut(&purpose)
            .and_then(|queue| queue.pop_front());
        if let Some(response) = queued {
            return response;
        }

        if let Some(response) = self.fixed.get(&purpose) {
            return Ok(response.clone());
        }

        StubLLMClient::new().complete(prompt, constraints).await
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}

/// Retriever returning fixed context, with per-query empty or failing rules.
pub struct ScriptedRetriever {
    context: String,
    empty_for: Vec<String>,
    failing_for: Vec<String>,
    delay: Option<Duration>,
    queries: Mutex<Vec<String>>,
}

impl ScriptedRetriever {
    pub fn new(context: &str) -> Self {
        Self {
            context: context.to_string(),
            empty_for: Vec::new(),
            failing_for: Vec::new(),
            delay: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Return an empty result for queries containing `needle`.
    pub fn empty_for(mut self, needle: &str) -> Self {
        self.empty_for.push(needle.to_lowercase());
        self
    }

    /// Fail with a transport error for queries containing `needle`.
    pub fn failing_for(mut self, needle: &str) -> Self {
        self.failing_for.push(needle.to_lowercase());
        self
    }

    /// Sleep for `delay` before answering each query.
    pub fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Number of queries received that contain `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        let needle = needle.to_lowercase();
        self.queries
            .lock()
            .iter()
            .filter(|q| q.to_lowercase().contains(&needle))
            .count()
    }

    pub fn total_calls(&self) -> usize {
        self.queries.lock().len()
    }
}

#[async_trait]
impl Retriever for ScriptedRetriever {
    async fn retrieve(&self, query: &str) -> Result<String> {
        self.queries.lock().push(query.to_string());
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let lowered = query.to_lowercase();

        if self.failing_for.iter().any(|n| lowered.contains(n)) {
            return Err(AppError::RetrievalUnavailable(format!(
                "scripted outage for '{}'",
                query
            )));
        }
        if self.empty_for.iter().any(|n| lowered.contains(n)) {
            return Ok(String::new());
        }
        Ok(self.context.clone())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
