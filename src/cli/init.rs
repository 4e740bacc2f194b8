//! Init command implementation
//!
//! Writes a commented default `research.toml`.

use super::output::Output;
use super::DEFAULT_CONFIG_FILE;
use std::fs;
use std::path::PathBuf;

/// Result of the init operation
#[derive(Debug, PartialEq, Eq)]
pub enum InitResult {
    /// Configuration written
    Success,
    /// research.toml already exists and --force was not given
    AlreadyExists,
    /// An error occurred during initialization
    Error(String),
}

/// Configuration for the init command
pub struct InitConfig {
    /// Directory to write research.toml into
    pub path: PathBuf,
    /// Overwrite an existing file
    pub force: bool,
}

/// Run the init command
pub fn run(config: InitConfig, output: &Output) -> InitResult {
    let config_path = config.path.join(DEFAULT_CONFIG_FILE);
    let display = config_path.display().to_string();

    if config_path.exists() && !config.force {
        output.warning(&format!("{} already exists!", display));
        output.hint("Use --force to overwrite it");
        return InitResult::AlreadyExists;
    }

    if let Err(e) = fs::create_dir_all(&config.path) {
        output.error(&format!("Failed to create {}: {}", config.path.display(), e));
        return InitResult::Error(e.to_string());
    }

    if let Err(e) = fs::write(&config_path, DEFAULT_CONFIG_TEMPLATE) {
        output.error(&format!("Failed to write {}: {}", display, e));
        return InitResult::Error(e.to_string());
    }

    output.created("config", &display);
    output.hint("Set OPENAI_API_KEY, or try it without keys:");
    output.command("ares-research run --offline \"Causes of ocean acidification\"");
    InitResult::Success
}

const DEFAULT_CONFIG_TEMPLATE: &str = r#"# ares-research configuration
#
# API keys never live in this file: each provider names the environment
# variable that holds its key. A .env file in the working directory is
# loaded automatically.

log_level = "info"

# Swap completion and search for deterministic stubs (no network, no keys)
offline = false

[llm]
# "openai" | "ollama" | "stub"
provider = "openai"
model = "gpt-4o-mini"
api_key_env = "OPENAI_API_KEY"
api_base = "https://api.openai.com/v1"
# Ollama server, used when provider = "ollama"
base_url = "http://localhost:11434"
temperature = 0.2
max_tokens = 1024

[search]
# "duckduckgo" | "exa" | "stub"
provider = "duckduckgo"
api_key_env = "EXA_API_KEY"
api_base = "https://api.exa.ai"
max_results = 5
num_sentences = 3
timeout_secs = 30

[pipeline]
# Upper bound on sub-questions per run (at least 3)
max_sub_questions = 6
planning_retries = 2
# Re-dispatches per unresolved sub-question
research_retries = 2
# Retries inside one research attempt (transport or unparseable output)
local_retries = 1
synthesis_retries = 2
# Ceiling on dispatch/evaluate cycles
max_cycles = 4
# Research tasks run at once; 1 runs them sequentially
concurrency = 4
# Wall-clock budget in seconds, 0 = none
wall_clock_secs = 0
# Drop research sources that do not appear in the retrieved context
strict_grounding = false
"#;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::ResearchConfig;

    #[test]
    fn test_template_parses_to_defaults() {
        let config = ResearchConfig::from_toml_str(DEFAULT_CONFIG_TEMPLATE).unwrap();
        let defaults = ResearchConfig::default();

        assert_eq!(config.llm.model, defaults.llm.model);
        assert_eq!(config.search.provider, defaults.search.provider);
        assert_eq!(
            config.pipeline.max_sub_questions,
            defaults.pipeline.max_sub_questions
        );
        assert_eq!(config.pipeline.concurrency, defaults.pipeline.concurrency);
    }

    #[test]
    fn test_init_refuses_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let output = Output::no_color();

        let first = run(
            InitConfig {
                path: dir.path().to_path_buf(),
                force: false,
            },
            &output,
        );
        assert_eq!(first, InitResult::Success);
        assert!(dir.path().join(DEFAULT_CONFIG_FILE).exists());

        let second = run(
            InitConfig {
                path: dir.path().to_path_buf(),
                force: false,
            },
            &output,
        );
        assert_eq!(second, InitResult::AlreadyExists);

        let forced = run(
            InitConfig {
                path: dir.path().to_path_buf(),
                force: true,
            },
            &output,
        );
        assert_eq!(forced, InitResult::Success);
    }
}
