//! Configuration loading from files on disk.

use ares_research::utils::{ConfigError, LlmProviderKind, ResearchConfig, SearchProviderKind};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_load_from_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.toml");
    fs::write(
        &path,
        r#"
offline = true

[llm]
provider = "stub"

[search]
provider = "stub"

[pipeline]
max_sub_questions = 4
concurrency = 1
strict_grounding = true
"#,
    )
    .unwrap();

    let config = ResearchConfig::load(&path).unwrap();
    assert!(config.offline);
    assert_eq!(config.llm.provider, LlmProviderKind::Stub);
    assert_eq!(config.search_provider(), SearchProviderKind::Stub);
    assert_eq!(config.pipeline.max_sub_questions, 4);
    assert_eq!(config.pipeline.concurrency, 1);
    assert!(config.pipeline.strict_grounding);
}

#[test]
fn test_missing_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("absent.toml");

    assert!(matches!(
        ResearchConfig::load(&path),
        Err(ConfigError::FileNotFound(_))
    ));

    let config = ResearchConfig::load_or_default(&path).unwrap();
    assert_eq!(config.pipeline.max_sub_questions, 6);
}

#[test]
fn test_invalid_file_is_rejected() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("research.toml");
    fs::write(&path, "[pipeline]\nmax_cycles = 0\n").unwrap();

    assert!(matches!(
        ResearchConfig::load(&path),
        Err(ConfigError::ValidationError(_))
    ));
}

#[tokio::test]
async fn test_offline_config_builds_a_working_coordinator() {
    let config = ResearchConfig::from_toml_str("offline = true\n").unwrap();
    let coordinator = ares_research::ResearchCoordinator::from_config(&config)
        .await
        .unwrap();

    let report = coordinator.run("History of the transistor").await.unwrap();
    assert_eq!(report.coverage.len(), 4);
    assert!(report.cites("https://example.com/overview"));
}
