use crate::llm::{CompletionConstraints, CompletionPurpose, LLMClient};
use crate::research::parsing::{
    collapse_whitespace, labeled_value, mentions, parse_source_items, strip_code_fences,
};
use crate::research::{RetryBudget, Stage};
use crate::tools::Retriever;
use crate::types::{AppError, Finding, Result, SourceRef, SubQuestion};
use async_trait::async_trait;
use std::sync::Arc;

/// Longest query handed to the retriever, in words.
pub const MAX_QUERY_WORDS: usize = 10;

const RESEARCHER_SYSTEM_PROMPT: &str = "You are a research assistant. Answer the sub-question \
using only the supplied context. Never cite a source that does not appear in the context.";

/// One research task's input: the sub-question and which dispatch this is.
#[derive(Debug, Clone)]
pub struct ResearchInput {
    pub sub_question: SubQuestion,
    /// 1-based dispatch attempt
    pub attempt: u32,
}

/// Summary and raw source identifiers parsed from a research completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedFinding {
    pub summary: String,
    pub sources: Vec<String>,
}

/// Researches a single sub-question: retrieve, complete, parse, ground.
///
/// Retrieval and completion problems never escape as errors. Once the local
/// retry budget is spent they become a failed [`Finding`], so the gap is
/// recorded instead of dropped.
pub struct Researcher {
    llm: Arc<dyn LLMClient>,
    retriever: Arc<dyn Retriever>,
    local_retries: u32,
    strict_grounding: bool,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl Researcher {
    pub fn new(llm: Arc<dyn LLMClient>, retriever: Arc<dyn Retriever>, local_retries: u32) -> Self {
        Self {
            llm,
            retriever,
            local_retries,
            strict_grounding: false,
            temperature: None,
            max_tokens: None,
        }
    }

    pub fn with_strict_grounding(mut self, strict: bool) -> Self {
        self.strict_grounding = strict;
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

    fn constraints(&self) -> CompletionConstraints {
        let mut constraints = CompletionConstraints::new(CompletionPurpose::Research)
            .with_system(RESEARCHER_SYSTEM_PROMPT);
        if let Some(temperature) = self.temperature {
            constraints = constraints.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            constraints = constraints.with_max_tokens(max_tokens);
        }
        constraints
    }

    async fn retrieve(&self, query: &str) -> Result<String> {
        let mut budget = RetryBudget::new(self.local_retries);
        loop {
            match self.retriever.retrieve(query).await {
                Ok(context) => return Ok(context),
                Err(e) if e.is_transport() && budget.try_consume() => {
                    tracing::warn!(
                        retriever = self.retriever.name(),
                        retry = budget.used(),
                        "retrieval failed, retrying: {}",
                        e
                    );
                }
                Err(e) => return Err(e),
            }
        }
    }

    /// Attach locators from the context and apply the grounding policy.
    fn ground(&self, cited: Vec<String>, context: &str) -> Vec<SourceRef> {
        let index = context_sources(context);
        let mut sources: Vec<SourceRef> = Vec::new();

        for identifier in cited {
            let source = match index.iter().find(|s| s.identifier == identifier) {
                Some(known) => known.clone(),
                None if mentions(context, &identifier) => SourceRef::new(identifier),
                None if self.strict_grounding => {
                    tracing::warn!(source = %identifier, "dropping source absent from context");
                    continue;
                }
                None => {
                    tracing::warn!(source = %identifier, "source not found in retrieved context");
                    SourceRef::new(identifier)
                }
            };
            if !sources.iter().any(|s| s.identifier == source.identifier) {
                sources.push(source);
            }
        }

        sources
    }
}

#[async_trait]
impl Stage for Researcher {
    type Input = ResearchInput;
    type Output = Finding;

    fn name(&self) -> &'static str {
        "researcher"
    }

    async fn execute(&self, input: ResearchInput) -> Result<Finding> {
        let ResearchInput {
            sub_question,
            attempt,
        } = input;

        let query = derive_query(&sub_question.text);
        if query.is_empty() {
            return Err(AppError::InvalidInput(format!(
                "sub-question {} has no text",
                sub_question.id
            )));
        }

        let context = match self.retrieve(&query).await {
            Ok(context) => context,
            Err(e) => {
                tracing::warn!(id = sub_question.id, attempt, "retrieval failed: {}", e);
                return Ok(Finding::from_error(&sub_question, &e, attempt));
            }
        };

        if context.trim().is_empty() {
            tracing::warn!(id = sub_question.id, attempt, "retrieval returned no context");
            return Ok(Finding::failed(&sub_question, "empty retrieval", attempt));
        }

        let prompt = research_prompt(&sub_question.text, &context);
        let constraints = self.constraints();
        let mut budget = RetryBudget::new(self.local_retries);

        loop {
            let parsed = match self.llm.complete(&prompt, &constraints).await {
                Ok(raw) => parse_finding(&raw),
                Err(e) => Err(e),
            };

            match parsed {
                Ok(parsed) => {
                    let sources = self.ground(parsed.sources, &context);
                    return Ok(Finding::ok(&sub_question, parsed.summary, sources, attempt));
                }
                Err(e) if budget.try_consume() => {
                    tracing::warn!(
                        id = sub_question.id,
                        retry = budget.used(),
                        "research completion unusable, retrying: {}",
                        e
                    );
                }
                Err(e) => {
                    tracing::warn!(id = sub_question.id, attempt, "research failed: {}", e);
                    return Ok(Finding::from_error(&sub_question, &e, attempt));
                }
            }
        }
    }
}

/// Turn a sub-question into a concise search query: whitespace collapsed,
/// trailing question marks removed, at most [`MAX_QUERY_WORDS`] words.
pub fn derive_query(text: &str) -> String {
    let collapsed = collapse_whitespace(text);
    collapsed
        .trim_end_matches('?')
        .split_whitespace()
        .take(MAX_QUERY_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

fn research_prompt(sub_question: &str, context: &str) -> String {
    format!(
        "Sub-question: {}\n\nContext:\n{}\n\n\
         Answer using only the context above. Respond exactly in this format:\n\
         SUMMARY: <two to four sentences>\n\
         SOURCES:\n\
         - <URL or document id taken from the context>\n\
         Write \"none\" under SOURCES if the context names no usable source.",
        sub_question, context
    )
}

/// Parse a `SUMMARY: ... SOURCES: ...` completion.
///
/// Fails with [`AppError::Research`] when either section is missing or the
/// summary is empty.
pub fn parse_finding(raw: &str) -> Result<ParsedFinding> {
    let body = strip_code_fences(raw);
    let lines: Vec<&str> = body.lines().collect();

    let summary_at = lines
        .iter()
        .position(|line| labeled_value(line, "SUMMARY:").is_some())
        .ok_or_else(|| AppError::Research("completion has no SUMMARY section".to_string()))?;
    let sources_at = lines
        .iter()
        .rposition(|line| labeled_value(line, "SOURCES:").is_some())
        .filter(|&idx| idx > summary_at)
        .ok_or_else(|| AppError::Research("completion has no SOURCES section".to_string()))?;

    let mut summary_parts: Vec<&str> = Vec::new();
    if let Some(first) = labeled_value(lines[summary_at], "SUMMARY:") {
        summary_parts.push(first);
    }
    summary_parts.extend(lines[summary_at + 1..sources_at].iter().map(|l| l.trim()));
    let summary = collapse_whitespace(&summary_parts.join(" "));

    if summary.is_empty() {
        return Err(AppError::Research("SUMMARY section is empty".to_string()));
    }

    let mut source_block = String::new();
    if let Some(inline) = labeled_value(lines[sources_at], "SOURCES:") {
        source_block.push_str(inline);
    }
    for line in &lines[sources_at + 1..] {
        source_block.push('\n');
        source_block.push_str(line);
    }

    Ok(ParsedFinding {
        summary,
        sources: parse_source_items(&source_block),
    })
}

/// Sources named in a rendered context block, each with the `[title] snippet`
/// line that precedes its `URL:` line as locator.
pub fn context_sources(context: &str) -> Vec<SourceRef> {
    let mut sources = Vec::new();
    let mut previous: Option<&str> = None;

    for line in context.lines().map(str::trim) {
        if let Some(url) = line.strip_prefix("URL:") {
            let url = url.trim();
            if !url.is_empty() {
                let source = match previous.filter(|p| p.starts_with('[')) {
                    Some(locator) => SourceRef::new(url).with_locator(locator),
                    None => SourceRef::new(url),
                };
                sources.push(source);
            }
        }
        if !line.is_empty() {
            previous = Some(line);
        }
    }

    sources
}
