/// TOML configuration loading and validation.
pub mod toml_config;

pub use toml_config::{
    ConfigError, LlmConfig, LlmProviderKind, PipelineConfig, ResearchConfig, SearchConfig,
    SearchProviderKind, MIN_SUB_QUESTIONS,
};
