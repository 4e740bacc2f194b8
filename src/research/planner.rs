use crate::llm::{CompletionConstraints, CompletionPurpose, LLMClient};
use crate::research::parsing::{collapse_whitespace, strip_code_fences, strip_list_marker};
use crate::research::Stage;
use crate::types::{AppError, Result, SubQuestion};
use crate::utils::MIN_SUB_QUESTIONS;
use async_trait::async_trait;
use std::collections::HashSet;
use std::sync::Arc;

const PLANNER_SYSTEM_PROMPT: &str = "You are a research planner. Break the research question \
into focused, non-overlapping sub-questions that together answer it. Respond with a JSON array \
of strings and nothing else.";

/// Decomposes one research question into an ordered list of sub-questions.
pub struct Planner {
    llm: Arc<dyn LLMClient>,
    max_sub_questions: usize,
    temperature: Option<f32>,
}

impl Planner {
    /// `max_sub_questions` is raised to the minimum of 3 if configured lower.
    pub fn new(llm: Arc<dyn LLMClient>, max_sub_questions: usize) -> Self {
        Self {
            llm,
            max_sub_questions: max_sub_questions.max(MIN_SUB_QUESTIONS),
            temperature: None,
        }
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_sub_questions(&self) -> usize {
        self.max_sub_questions
    }

    fn prompt(&self, question: &str) -> String {
        format!(
            "Research question: {}\nMaximum sub-questions: {}\n\n\
             Return between {} and {} distinct sub-questions as a JSON array of strings.",
            question, self.max_sub_questions, MIN_SUB_QUESTIONS, self.max_sub_questions
        )
    }
}

#[async_trait]
impl Stage for Planner {
    type Input = String;
    type Output = Vec<SubQuestion>;

    fn name(&self) -> &'static str {
        "planner"
    }

    async fn execute(&self, question: String) -> Result<Vec<SubQuestion>> {
        let mut constraints = CompletionConstraints::new(CompletionPurpose::Planning)
            .with_system(PLANNER_SYSTEM_PROMPT);
        if let Some(temperature) = self.temperature {
            constraints = constraints.with_temperature(temperature);
        }

        let raw = self.llm.complete(&self.prompt(&question), &constraints).await?;
        tracing::debug!(chars = raw.len(), "planner completion received");

        parse_plan(&raw, self.max_sub_questions)
    }
}

/// Parse a planner completion into validated sub-questions.
///
/// A JSON string array is preferred; otherwise each non-empty line is an
/// entry. Duplicates (case and whitespace insensitive) are dropped and fewer
/// than 3 distinct entries is an [`AppError::Planning`].
///
/// A plan longer than `max` is not an error: the first `max` distinct
/// entries are kept, in the model's order, and the rest are dropped with a
/// warning.
pub fn parse_plan(raw: &str, max: usize) -> Result<Vec<SubQuestion>> {
    let body = strip_code_fences(raw);

    let entries: Vec<String> = match serde_json::from_str::<Vec<String>>(body) {
        Ok(entries) => entries,
        Err(_) => body
            .lines()
            .map(strip_list_marker)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect(),
    };

    let mut seen = HashSet::new();
    let mut distinct = Vec::new();
    for entry in entries {
        let text = collapse_whitespace(&entry);
        if text.is_empty() {
            continue;
        }
        if seen.insert(text.to_lowercase()) {
            distinct.push(text);
        }
    }

    if distinct.len() < MIN_SUB_QUESTIONS {
        return Err(AppError::Planning(format!(
            "expected at least {} distinct sub-questions, got {}",
            MIN_SUB_QUESTIONS,
            distinct.len()
        )));
    }

    if distinct.len() > max {
        tracing::warn!(
            produced = distinct.len(),
            max,
            "plan exceeds maximum, truncating"
        );
        distinct.truncate(max);
    }

    Ok(distinct
        .into_iter()
        .enumerate()
        .map(|(idx, text)| SubQuestion::new(idx + 1, text))
        .collect())
}
