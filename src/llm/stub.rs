//! Deterministic offline completion client
//!
//! The stub reads the structured lines the pipeline stages put into their
//! prompts and answers in the format each stage expects. Identical prompts
//! always produce identical text, which makes offline runs reproducible.

use crate::llm::client::{CompletionConstraints, CompletionPurpose, LLMClient};
use crate::types::Result;
use async_trait::async_trait;

/// Offline stand-in for a live completion provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct StubLLMClient;

impl StubLLMClient {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl LLMClient for StubLLMClient {
    async fn complete(&self, prompt: &str, constraints: &CompletionConstraints) -> Result<String> {
        let text = match constraints.purpose {
            CompletionPurpose::Planning => plan(prompt),
            CompletionPurpose::Research => research(prompt),
            CompletionPurpose::Synthesis => synthesize(prompt),
        };
        Ok(text)
    }

    fn model_name(&self) -> &str {
        "stub"
    }
}

fn field<'a>(prompt: &'a str, label: &str) -> Option<&'a str> {
    prompt
        .lines()
        .find_map(|line| line.trim().strip_prefix(label))
        .map(str::trim)
        .filter(|value| !value.is_empty())
}

fn plan(prompt: &str) -> String {
    let question = field(prompt, "Research question:").unwrap_or("the topic");
    let topic = question.trim_end_matches('?').trim();

    let questions = [
        format!("What is the background of {}?", topic),
        format!("What are the main drivers behind {}?", topic),
        format!("What recent developments relate to {}?", topic),
        format!("What open challenges remain for {}?", topic),
    ];

    serde_json::to_string(&questions).unwrap_or_default()
}

fn research(prompt: &str) -> String {
    let sub_question = field(prompt, "Sub-question:").unwrap_or("the sub-question");

    let snippet = prompt.lines().find_map(|line| {
        let line = line.trim();
        line.strip_prefix('[')
            .and_then(|rest| rest.split_once("] "))
            .map(|(_, snippet)| snippet.trim())
            .filter(|snippet| !snippet.is_empty())
    });

    let urls: Vec<&str> = prompt
        .lines()
        .filter_map(|line| line.trim().strip_prefix("URL:"))
        .map(str::trim)
        .filter(|url| !url.is_empty())
        .collect();

    let summary = match snippet {
        Some(snippet) => format!("{} (regarding: {})", snippet, sub_question),
        None => format!("Context was retrieved for: {}", sub_question),
    };

    let sources = if urls.is_empty() {
        "none".to_string()
    } else {
        urls.iter()
            .map(|url| format!("- {}", url))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!("SUMMARY: {}\nSOURCES:\n{}", summary, sources)
}

fn synthesize(prompt: &str) -> String {
    let question = field(prompt, "Research question:").unwrap_or("Research report");

    let mut sections = Vec::new();
    let mut sources: Vec<&str> = Vec::new();
    let mut heading: Option<&str> = None;
    let mut unresolved = false;

    for line in prompt.lines().map(str::trim) {
        if let Some(rest) = line.strip_prefix("Sub-question ") {
            heading = rest.split_once(": ").map(|(_, text)| text.trim());
            unresolved = false;
        } else if let Some(status) = line.strip_prefix("Status:") {
            unresolved = status.trim() == "UNRESOLVED";
        } else if let Some(summary) = line.strip_prefix("Summary:") {
            let title = heading.unwrap_or("Sub-question");
            let text = if unresolved {
                format!("This sub-question remains unresolved: {}", summary.trim())
            } else {
                summary.trim().to_string()
            };
            sections.push(format!("### {}\n\n{}", title, text));
        } else if let Some(list) = line.strip_prefix("Sources:") {
            for source in list.split(", ").map(str::trim) {
                if !source.is_empty() && source != "none" && !sources.contains(&source) {
                    sources.push(source);
                }
            }
        }
    }

    let source_lines = if sources.is_empty() {
        "none".to_string()
    } else {
        sources
            .iter()
            .map(|s| format!("- {}", s))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "REPORT:\n# {}\n\n{}\nSOURCES:\n{}",
        question,
        sections.join("\n\n"),
        source_lines
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_plan_is_json_array_of_four() {
        let client = StubLLMClient::new();
        let text = client
            .complete(
                "Research question: Causes of ocean acidification\nMaximum sub-questions: 6",
                &CompletionConstraints::new(CompletionPurpose::Planning),
            )
            .await
            .unwrap();

        let questions: Vec<String> = serde_json::from_str(&text).unwrap();
        assert_eq!(questions.len(), 4);
        assert!(questions[0].contains("Causes of ocean acidification"));
    }

    #[tokio::test]
    async fn test_research_cites_context_urls() {
        let prompt = "Sub-question: Why does pH drop?\n\nContext:\n\
                      [Ocean chemistry] CO2 dissolves into seawater.\nURL: ipcc.org/ref1";
        let text = StubLLMClient
            .complete(prompt, &CompletionConstraints::new(CompletionPurpose::Research))
            .await
            .unwrap();

        assert!(text.starts_with("SUMMARY: CO2 dissolves into seawater."));
        assert!(text.ends_with("SOURCES:\n- ipcc.org/ref1"));
    }

    #[tokio::test]
    async fn test_synthesis_lists_sources_once() {
        let prompt = "Research question: Q\n\nFindings:\n\
                      Sub-question 1: A?\nStatus: resolved\nSummary: a\nSources: x.org, y.org\n\n\
                      Sub-question 2: B?\nStatus: UNRESOLVED\nSummary: No information retrieved\nSources: none\n\n\
                      Sub-question 3: C?\nStatus: resolved\nSummary: c\nSources: x.org";
        let text = StubLLMClient
            .complete(prompt, &CompletionConstraints::new(CompletionPurpose::Synthesis))
            .await
            .unwrap();

        assert!(text.contains("### B?\n\nThis sub-question remains unresolved"));
        assert!(text.ends_with("SOURCES:\n- x.org\n- y.org"));
    }
}
