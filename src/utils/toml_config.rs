//! TOML-based configuration for ares-research
//!
//! This module provides declarative configuration for the completion
//! provider, the retrieval provider, and the pipeline's retry and
//! concurrency bounds via a TOML file (`research.toml`).
//!
//! Secrets never live in the file. Provider sections name the environment
//! variable holding the key (`api_key_env`), resolved when the clients are
//! built.

use crate::llm::Provider;
use crate::types::AppError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Smallest number of sub-questions a plan may contain.
pub const MIN_SUB_QUESTIONS: usize = 3;

/// Root configuration structure loaded from research.toml
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResearchConfig {
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Swap both capabilities for deterministic stubs
    #[serde(default)]
    pub offline: bool,

    #[serde(default)]
    pub llm: LlmConfig,

    #[serde(default)]
    pub search: SearchConfig,

    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for ResearchConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            offline: false,
            llm: LlmConfig::default(),
            search: SearchConfig::default(),
            pipeline: PipelineConfig::default(),
        }
    }
}

// ============= LLM Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProviderKind {
    OpenAI,
    Ollama,
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_llm_provider")]
    pub provider: LlmProviderKind,

    #[serde(default = "default_model")]
    pub model: String,

    /// Environment variable containing the API key
    #[serde(default = "default_openai_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_openai_base")]
    pub api_base: String,

    /// Ollama server URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    #[serde(default = "default_temperature")]
    pub temperature: f32,

    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
}

fn default_llm_provider() -> LlmProviderKind {
    LlmProviderKind::OpenAI
}

fn default_model() -> String {
    "gpt-4o-mini".to_string()
}

fn default_openai_key_env() -> String {
    "OPENAI_API_KEY".to_string()
}

fn default_openai_base() -> String {
    "https://api.openai.com/v1".to_string()
}

fn default_ollama_url() -> String {
    "http://localhost:11434".to_string()
}

fn default_temperature() -> f32 {
    0.2
}

fn default_max_tokens() -> u32 {
    1024
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            model: default_model(),
            api_key_env: default_openai_key_env(),
            api_base: default_openai_base(),
            base_url: default_ollama_url(),
            temperature: default_temperature(),
            max_tokens: default_max_tokens(),
        }
    }
}

// ============= Search Configuration =============

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SearchProviderKind {
    DuckDuckGo,
    Exa,
    Stub,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    #[serde(default = "default_search_provider")]
    pub provider: SearchProviderKind,

    /// Environment variable containing the Exa API key
    #[serde(default = "default_exa_key_env")]
    pub api_key_env: String,

    #[serde(default = "default_exa_base")]
    pub api_base: String,

    #[serde(default = "default_max_results")]
    pub max_results: usize,

    /// Sentences per Exa highlight excerpt
    #[serde(default = "default_num_sentences")]
    pub num_sentences: usize,

    #[serde(default = "default_search_timeout")]
    pub timeout_secs: u64,
}

fn default_search_provider() -> SearchProviderKind {
    SearchProviderKind::DuckDuckGo
}

fn default_exa_key_env() -> String {
    "EXA_API_KEY".to_string()
}

fn default_exa_base() -> String {
    crate::tools::exa::DEFAULT_EXA_API_BASE.to_string()
}

fn default_max_results() -> usize {
    5
}

fn default_num_sentences() -> usize {
    3
}

fn default_search_timeout() -> u64 {
    30
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            provider: default_search_provider(),
            api_key_env: default_exa_key_env(),
            api_base: default_exa_base(),
            max_results: default_max_results(),
            num_sentences: default_num_sentences(),
            timeout_secs: default_search_timeout(),
        }
    }
}

impl SearchConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============= Pipeline Configuration =============

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Upper bound `k` on the number of sub-questions (at least 3)
    #[serde(default = "default_max_sub_questions")]
    pub max_sub_questions: usize,

    /// Extra planning attempts after the first
    #[serde(default = "default_stage_retries")]
    pub planning_retries: u32,

    /// Re-dispatches allowed per sub-question
    #[serde(default = "default_stage_retries")]
    pub research_retries: u32,

    /// Transport/parse retries inside a single research attempt
    #[serde(default = "default_local_retries")]
    pub local_retries: u32,

    /// Extra synthesis attempts after the first
    #[serde(default = "default_stage_retries")]
    pub synthesis_retries: u32,

    /// Global ceiling on dispatch/evaluate cycles
    #[serde(default = "default_max_cycles")]
    pub max_cycles: u32,

    /// Dispatch width: 1 runs research tasks sequentially
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,

    /// Wall-clock budget in seconds; 0 disables it
    #[serde(default)]
    pub wall_clock_secs: u64,

    /// Drop research sources that do not occur in the retrieved context
    #[serde(default)]
    pub strict_grounding: bool,
}

fn default_max_sub_questions() -> usize {
    6
}

fn default_stage_retries() -> u32 {
    2
}

fn default_local_retries() -> u32 {
    1
}

fn default_max_cycles() -> u32 {
    4
}

fn default_concurrency() -> usize {
    4
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            max_sub_questions: default_max_sub_questions(),
            planning_retries: default_stage_retries(),
            research_retries: default_stage_retries(),
            local_retries: default_local_retries(),
            synthesis_retries: default_stage_retries(),
            max_cycles: default_max_cycles(),
            concurrency: default_concurrency(),
            wall_clock_secs: 0,
            strict_grounding: false,
        }
    }
}

impl PipelineConfig {
    pub fn wall_clock(&self) -> Option<Duration> {
        (self.wall_clock_secs > 0).then(|| Duration::from_secs(self.wall_clock_secs))
    }
}

// ============= Configuration Loading & Validation =============

/// Errors that can occur during configuration loading
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Environment variable '{0}' referenced in config is not set")]
    MissingEnvVar(String),
}

impl From<ConfigError> for AppError {
    fn from(err: ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl ResearchConfig {
    /// Load configuration from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();

        if !path.exists() {
            return Err(ConfigError::FileNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path)?;
        Self::from_toml_str(&content)
    }

    /// Load from `path` if it exists, otherwise fall back to defaults
    pub fn load_or_default<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        match Self::load(path) {
            Err(ConfigError::FileNotFound(_)) => Ok(Self::default()),
            other => other,
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: ResearchConfig = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let pipeline = &self.pipeline;

        if pipeline.max_sub_questions < MIN_SUB_QUESTIONS {
            return Err(ConfigError::ValidationError(format!(
                "pipeline.max_sub_questions must be at least {}, got {}",
                MIN_SUB_QUESTIONS, pipeline.max_sub_questions
            )));
        }

        if pipeline.concurrency == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.concurrency must be at least 1".to_string(),
            ));
        }

        if pipeline.max_cycles == 0 {
            return Err(ConfigError::ValidationError(
                "pipeline.max_cycles must be at least 1".to_string(),
            ));
        }

        if !(0.0..=2.0).contains(&self.llm.temperature) {
            return Err(ConfigError::ValidationError(format!(
                "llm.temperature must be within 0.0..=2.0, got {}",
                self.llm.temperature
            )));
        }

        if self.llm.model.trim().is_empty() && self.llm.provider != LlmProviderKind::Stub {
            return Err(ConfigError::ValidationError(
                "llm.model must not be empty".to_string(),
            ));
        }

        Ok(())
    }

    /// Get a resolved value from an env var reference
    pub fn resolve_env(&self, env_name: &str) -> Option<String> {
        std::env::var(env_name).ok().filter(|v| !v.trim().is_empty())
    }

    /// Completion provider selected by this configuration
    pub fn llm_provider(&self) -> Result<Provider, ConfigError> {
        if self.offline {
            return Ok(Provider::Stub);
        }

        match self.llm.provider {
            LlmProviderKind::OpenAI => {
                let api_key = self
                    .resolve_env(&self.llm.api_key_env)
                    .ok_or_else(|| ConfigError::MissingEnvVar(self.llm.api_key_env.clone()))?;
                Ok(Provider::OpenAI {
                    api_key,
                    api_base: self.llm.api_base.clone(),
                    model: self.llm.model.clone(),
                })
            }
            LlmProviderKind::Ollama => Ok(Provider::Ollama {
                base_url: self.llm.base_url.clone(),
                model: self.llm.model.clone(),
            }),
            LlmProviderKind::Stub => Ok(Provider::Stub),
        }
    }

    /// Retrieval provider selected by this configuration
    pub fn search_provider(&self) -> SearchProviderKind {
        if self.offline {
            SearchProviderKind::Stub
        } else {
            self.search.provider
        }
    }

    /// Exa API key, required only when Exa is the active provider
    pub fn exa_api_key(&self) -> Result<String, ConfigError> {
        self.resolve_env(&self.search.api_key_env)
            .ok_or_else(|| ConfigError::MissingEnvVar(self.search.api_key_env.clone()))
    }
}
