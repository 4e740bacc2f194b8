//! Report synthesis
//!
//! The synthesizer hands every finding, failed ones included, to the
//! completion capability and turns the answer into a [`Report`]. Whatever
//! the completion claims, a report only ever cites sources that occur
//! verbatim in at least one finding: invented citations are dropped from
//! the citation set and unknown URLs are scrubbed from the prose.
//!
//! The coverage and reference sections are rendered here, not by the
//! model, so every sub-question is named in the report even when the
//! prose skips it.

use crate::llm::{CompletionConstraints, CompletionPurpose, LLMClient};
use crate::memory::format_findings_for_prompt;
use crate::research::parsing::{
    labeled_value, mentions, parse_source_items, strip_code_fences, trim_url_token,
};
use crate::research::Stage;
use crate::types::{
    AppError, Coverage, Finding, FindingStatus, Report, Result, SourceRef, SubQuestion,
};
use async_trait::async_trait;
use std::collections::BTreeSet;
use std::sync::Arc;

/// Replacement text for URLs in the prose that no finding recorded.
pub const REMOVED_CITATION: &str = "[citation removed]";

const SYNTHESIZER_SYSTEM_PROMPT: &str = "You are a research writer. Combine the findings into \
one coherent report. Address every sub-question and state plainly which ones could not be \
resolved. Cite only sources listed in the findings.";

const CITATION_LABELS: [&str; 3] = ["SOURCES:", "CITATIONS:", "REFERENCES:"];

#[derive(Debug, Clone)]
pub struct SynthesisInput {
    pub question: String,
    pub sub_questions: Vec<SubQuestion>,
    pub findings: Vec<Finding>,
}

/// Prose and raw citations parsed from a synthesis completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParsedReport {
    pub body: String,
    pub citations: Vec<String>,
}

pub struct Synthesizer {
    llm: Arc<dyn LLMClient>,
    temperature: Option<f32>,
    max_tokens: Option<u32>,
}

impl Synthesizer {
    pub fn new(llm: Arc<dyn LLMClient>) -> Self {
        Self {
            llm,
            temperature: None,
            max_tokens: None,
        }
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
        let mut constraints = CompletionConstraints::new(CompletionPurpose::Synthesis)
            .with_system(SYNTHESIZER_SYSTEM_PROMPT);
        if let Some(temperature) = self.temperature {
            constraints = constraints.with_temperature(temperature);
        }
        if let Some(max_tokens) = self.max_tokens {
            constraints = constraints.with_max_tokens(max_tokens);
        }
        constraints
    }
}

#[async_trait]
impl Stage for Synthesizer {
    type Input = SynthesisInput;
    type Output = Report;

    fn name(&self) -> &'static str {
        "synthesizer"
    }

    async fn execute(&self, input: SynthesisInput) -> Result<Report> {
        let findings = complete_findings(&input.sub_questions, &input.findings);
        let prompt = format!(
            "Research question: {}\n\nFindings:\n{}\n\n\
             Respond exactly in this format:\n\
             REPORT:\n<the report in Markdown>\n\
             SOURCES:\n- <source taken from the findings>",
            input.question,
            format_findings_for_prompt(&findings)
        );

        let raw = self.llm.complete(&prompt, &self.constraints()).await?;
        tracing::debug!(chars = raw.len(), "synthesis completion received");

        let parsed = parse_report(&raw)?;
        let known = known_sources(&findings);

        let invented: Vec<&String> = parsed
            .citations
            .iter()
            .filter(|c| !known.iter().any(|s| &s.identifier == *c))
            .collect();
        if !invented.is_empty() {
            tracing::warn!(
                count = invented.len(),
                "stripping citations absent from the findings: {:?}",
                invented
            );
        }

        let (prose, scrubbed) = scrub_unknown_urls(&parsed.body, &known);
        if scrubbed > 0 {
            tracing::warn!(count = scrubbed, "removed unknown URLs from report body");
        }

        let cited: BTreeSet<SourceRef> = known
            .into_iter()
            .filter(|s| {
                parsed.citations.iter().any(|c| c == &s.identifier)
                    || mentions(&prose, &s.identifier)
            })
            .collect();

        Ok(assemble_report(input.question, &prose, &findings, cited))
    }
}

/// Parse a `REPORT: ... SOURCES: ...` completion.
///
/// The last `SOURCES:` (or `CITATIONS:` / `REFERENCES:`) line splits prose
/// from citations. A missing marker or empty prose is an
/// [`AppError::Synthesis`].
pub fn parse_report(raw: &str) -> Result<ParsedReport> {
    let body = strip_code_fences(raw);
    let lines: Vec<&str> = body.lines().collect();

    let marker = lines
        .iter()
        .rposition(|line| citation_value(line).is_some())
        .ok_or_else(|| AppError::Synthesis("completion has no SOURCES section".to_string()))?;

    let mut prose_lines: Vec<&str> = lines[..marker].to_vec();
    if let Some(first) = prose_lines.iter().position(|l| !l.trim().is_empty()) {
        let label = labeled_value(prose_lines[first], "REPORT:")
            .or_else(|| labeled_value(prose_lines[first], "SUMMARY:"));
        if let Some(rest) = label {
            prose_lines[first] = rest;
        }
    }
    let prose = prose_lines.join("\n").trim().to_string();

    if prose.is_empty() {
        return Err(AppError::Synthesis("report body is empty".to_string()));
    }

    let mut citation_block = citation_value(lines[marker]).unwrap_or_default().to_string();
    for line in &lines[marker + 1..] {
        citation_block.push('\n');
        citation_block.push_str(line);
    }

    Ok(ParsedReport {
        body: prose,
        citations: parse_source_items(&citation_block),
    })
}

fn citation_value(line: &str) -> Option<&str> {
    CITATION_LABELS
        .iter()
        .find_map(|label| labeled_value(line, label))
}

/// Replace every http(s) URL in `text` that is not a known source.
///
/// Returns the rewritten text and the number of replacements.
pub fn scrub_unknown_urls(text: &str, known: &[SourceRef]) -> (String, usize) {
    let mut out = String::with_capacity(text.len());
    let mut removed = 0;

    for piece in text.split_inclusive(char::is_whitespace) {
        let start = ["https://", "http://"]
            .iter()
            .filter_map(|scheme| piece.find(scheme))
            .min();
        let Some(start) = start else {
            out.push_str(piece);
            continue;
        };

        let token_end = piece[start..]
            .find(char::is_whitespace)
            .map_or(piece.len(), |offset| start + offset);
        let token = &piece[start..token_end];
        if is_known_url(token, known) {
            out.push_str(piece);
            continue;
        }

        let url = trim_url_token(token);
        if is_known_url(url, known) {
            out.push_str(piece);
        } else {
            out.push_str(&piece[..start]);
            out.push_str(REMOVED_CITATION);
            out.push_str(&piece[start + url.len()..]);
            removed += 1;
        }
    }

    (out, removed)
}

fn is_known_url(url: &str, known: &[SourceRef]) -> bool {
    known.iter().any(|s| {
        s.identifier == url || s.identifier.trim_end_matches('/') == url.trim_end_matches('/')
    })
}

/// Deterministic report built straight from the findings, used when
/// synthesis fails. Cites exactly the sources of the successful findings.
pub fn fallback_report(input: &SynthesisInput) -> Report {
    let findings = complete_findings(&input.sub_questions, &input.findings);

    let mut prose = format!(
        "# {}\n\nSynthesis did not complete. The recorded findings follow.",
        input.question
    );
    for finding in &findings {
        prose.push_str(&format!(
            "\n\n### {}. {}\n\n{}",
            finding.sub_question_id, finding.sub_question, finding.summary
        ));
    }

    let cited = known_sources(&findings).into_iter().collect();
    assemble_report(input.question.clone(), &prose, &findings, cited)
}

/// One finding per sub-question, in id order. A sub-question without a
/// recorded finding gets a failed placeholder so it is never omitted.
fn complete_findings(sub_questions: &[SubQuestion], findings: &[Finding]) -> Vec<Finding> {
    let mut complete: Vec<Finding> = sub_questions
        .iter()
        .map(|sq| {
            findings
                .iter()
                .find(|f| f.sub_question_id == sq.id)
                .cloned()
                .unwrap_or_else(|| Finding::incomplete(sq, "not attempted", 0))
        })
        .collect();

    // Findings for ids outside the plan are still reported
    for finding in findings {
        if !complete
            .iter()
            .any(|f| f.sub_question_id == finding.sub_question_id)
        {
            complete.push(finding.clone());
        }
    }

    complete.sort_by_key(|f| f.sub_question_id);
    complete
}

/// Union of the findings' sources, first occurrence wins per identifier.
fn known_sources(findings: &[Finding]) -> Vec<SourceRef> {
    let mut known: Vec<SourceRef> = Vec::new();
    for source in findings.iter().flat_map(|f| f.sources.iter()) {
        if !known.iter().any(|k| k.identifier == source.identifier) {
            known.push(source.clone());
        }
    }
    known
}

fn assemble_report(
    question: String,
    prose: &str,
    findings: &[Finding],
    cited: BTreeSet<SourceRef>,
) -> Report {
    let coverage: Vec<Coverage> = findings
        .iter()
        .map(|f| Coverage {
            id: f.sub_question_id,
            question: f.sub_question.clone(),
            status: f.status,
            attempts: f.attempt,
        })
        .collect();

    let mut body = prose.trim_end().to_string();

    body.push_str("\n\n## Coverage\n");
    for entry in &coverage {
        let status = match entry.status {
            FindingStatus::Ok => "resolved",
            FindingStatus::Failed => "UNRESOLVED",
        };
        body.push_str(&format!(
            "\n- [{}] {}. {} (attempts: {})",
            status, entry.id, entry.question, entry.attempts
        ));
    }

    body.push_str("\n\n## References\n");
    if cited.is_empty() {
        body.push_str("\nNo sources cited.");
    }
    for (idx, source) in cited.iter().enumerate() {
        body.push_str(&format!("\n{}. {}", idx + 1, source.identifier));
    }
    body.push('\n');

    Report {
        question,
        body,
        cited_sources: cited,
        coverage,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn sq(id: usize, text: &str) -> SubQuestion {
        SubQuestion::new(id, text)
    }

    fn input() -> SynthesisInput {
        let sub_questions = vec![sq(1, "What is it?"), sq(2, "Why?"), sq(3, "What next?")];
        let findings = vec![
            Finding::ok(
                &sub_questions[0],
                "It is a thing.",
                vec![SourceRef::new("https://a.org/1").with_locator("[A] a")],
                1,
            ),
            Finding::failed(&sub_questions[1], "empty retrieval", 3),
            Finding::ok(
                &sub_questions[2],
                "More to come.",
                vec![SourceRef::new("ipcc.org/ref1")],
                2,
            ),
        ];
        SynthesisInput {
            question: "Topic".to_string(),
            sub_questions,
            findings,
        }
    }

    #[test]
    fn test_parse_report() {
        let parsed =
            parse_report("REPORT:\n# Title\n\nBody text.\nSOURCES:\n- https://a.org/1\n- x.org")
                .unwrap();
        assert_eq!(parsed.body, "# Title\n\nBody text.");
        assert_eq!(parsed.citations, vec!["https://a.org/1", "x.org"]);
    }

    #[rstest]
    #[case("No marker at all")]
    #[case("REPORT:\nSOURCES:\n- a.org")]
    fn test_parse_report_rejects(#[case] raw: &str) {
        assert!(matches!(parse_report(raw), Err(AppError::Synthesis(_))));
    }

    #[test]
    fn test_scrub_unknown_urls() {
        let known = vec![SourceRef::new("https://a.org/1")];
        let (text, removed) = scrub_unknown_urls(
            "See https://a.org/1, and [x](https://evil.example/y). Done.",
            &known,
        );
        assert_eq!(
            text,
            "See https://a.org/1, and [x]([citation removed]). Done."
        );
        assert_eq!(removed, 1);
    }

    #[test]
    fn test_scrub_keeps_parenthesised_known_url() {
        let known = vec![SourceRef::new("https://en.wikipedia.org/wiki/Acid_(chemistry)")];

        let prose = "See https://en.wikipedia.org/wiki/Acid_(chemistry) now.";
        assert_eq!(scrub_unknown_urls(prose, &known), (prose.to_string(), 0));

        let wrapped = "Acids donate protons (https://en.wikipedia.org/wiki/Acid_(chemistry)).";
        assert_eq!(scrub_unknown_urls(wrapped, &known), (wrapped.to_string(), 0));

        let (text, removed) =
            scrub_unknown_urls("See https://en.wikipedia.org/wiki/Base_(chemistry) too.", &known);
        assert_eq!(text, "See [citation removed] too.");
        assert_eq!(removed, 1);
    }

    #[tokio::test]
    async fn test_synthesis_with_stub_cites_only_known_sources() {
        let synthesizer = Synthesizer::new(Arc::new(crate::llm::StubLLMClient::new()));
        let report = synthesizer.execute(input()).await.unwrap();

        let ids: Vec<_> = report
            .cited_sources
            .iter()
            .map(|s| s.identifier.as_str())
            .collect();
        assert_eq!(ids, vec!["https://a.org/1", "ipcc.org/ref1"]);
        assert!(report.body.contains("- [UNRESOLVED] 2. Why? (attempts: 3)"));
        assert_eq!(report.unresolved().count(), 1);
        assert_eq!(report.coverage.len(), 3);
    }

    #[test]
    fn test_fallback_report() {
        let report = fallback_report(&input());
        assert!(report.body.contains("Synthesis did not complete"));
        assert!(report.body.contains("### 2. Why?"));
        assert_eq!(report.cited_sources.len(), 2);
        assert!(report.cites("ipcc.org/ref1"));
    }

    #[test]
    fn test_missing_finding_is_reported_as_gap() {
        let mut input = input();
        input.findings.remove(2);
        let findings = complete_findings(&input.sub_questions, &input.findings);
        assert_eq!(findings.len(), 3);
        assert_eq!(findings[2].status, FindingStatus::Failed);
        assert_eq!(findings[2].attempt, 0);
    }
}
