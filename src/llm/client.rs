//! Completion capability and provider selection
//!
//! Every stage of the pipeline talks to the language model through the
//! [`LLMClient`] trait: a prompt plus [`CompletionConstraints`] in, text out.
//! Transport and authentication problems surface as
//! [`AppError::CompletionUnavailable`]; whether the returned text is usable
//! is decided by the calling stage.

use crate::types::{AppError, Result};
use async_trait::async_trait;
use std::sync::Arc;

/// Generic completion client for provider abstraction
///
/// All providers implement this trait, including the deterministic
/// [`StubLLMClient`](super::stub::StubLLMClient) used in offline mode.
#[async_trait]
pub trait LLMClient: Send + Sync {
    /// Complete `prompt` under the given constraints
    async fn complete(&self, prompt: &str, constraints: &CompletionConstraints) -> Result<String>;

    /// Get the model name/identifier
    fn model_name(&self) -> &str;
}

/// Which pipeline stage a completion request belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CompletionPurpose {
    Planning,
    Research,
    Synthesis,
}

/// Structured options accompanying a completion request.
#[derive(Debug, Clone, PartialEq)]
pub struct CompletionConstraints {
    pub purpose: CompletionPurpose,
    /// System prompt describing the role and output format
    pub system: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl CompletionConstraints {
    pub fn new(purpose: CompletionPurpose) -> Self {
        Self {
            purpose,
            system: None,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }
}

/// Provider enum for runtime selection
///
/// | Provider | Feature | Notes |
/// |----------|---------|-------|
/// | OpenAI | `openai` | Any OpenAI-compatible endpoint |
/// | Ollama | `ollama` | Local inference |
/// | Stub | always | Deterministic, offline |
#[derive(Debug, Clone)]
pub enum Provider {
    /// OpenAI API provider (including compatible APIs)
    ///
    /// # Example
    /// ```rust,ignore
    /// let provider = Provider::OpenAI {
    ///     api_key: "sk-...".to_string(),
    ///     api_base: "https://api.openai.com/v1".to_string(),
    ///     model: "gpt-4o-mini".to_string(),
    /// };
    /// ```
    OpenAI {
        api_key: String,
        api_base: String,
        model: String,
    },

    /// Ollama local LLM provider
    Ollama { base_url: String, model: String },

    /// Deterministic offline provider
    Stub,
}

impl Provider {
    /// Create a client instance for this provider
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Config`] when the crate was built without the
    /// feature the provider needs.
    pub async fn create_client(&self) -> Result<Arc<dyn LLMClient>> {
        match self {
            #[cfg(feature = "openai")]
            Provider::OpenAI {
                api_key,
                api_base,
                model,
            } => Ok(Arc::new(super::openai::OpenAIClient::new(
                api_key.clone(),
                api_base.clone(),
                model.clone(),
            ))),

            #[cfg(feature = "ollama")]
            Provider::Ollama { base_url, model } => Ok(Arc::new(
                super::ollama::OllamaClient::new(base_url.clone(), model.clone()).await?,
            )),

            Provider::Stub => Ok(Arc::new(super::stub::StubLLMClient::new())),

            #[allow(unreachable_patterns)]
            other => Err(AppError::Config(format!(
                "{} provider is not available in this build; enable the '{}' feature",
                other.name(),
                other.name().to_lowercase()
            ))),
        }
    }

    /// Get a human-readable name for this provider
    pub fn name(&self) -> &'static str {
        match self {
            Provider::OpenAI { .. } => "OpenAI",
            Provider::Ollama { .. } => "Ollama",
            Provider::Stub => "Stub",
        }
    }
}
