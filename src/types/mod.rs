use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

// ============= Research Types =============

/// Ordinal identifier of a sub-question, unique and stable within one run.
pub type SubQuestionId = usize;

/// Summary marker for a sub-question whose retrieval produced nothing usable.
pub const NO_INFORMATION: &str = "No information retrieved";

/// Summary marker for a retrieval that worked but whose completion never parsed.
pub const OUTPUT_UNUSABLE: &str = "Research output unusable";

/// Summary marker for a completion provider that stayed unreachable.
pub const COMPLETION_UNAVAILABLE: &str = "Completion unavailable";

/// Summary marker for a task that never recorded a result of its own.
pub const NOT_COMPLETED: &str = "Research did not complete";

/// One focused decomposition unit of the research question.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubQuestion {
    pub id: SubQuestionId,
    pub text: String,
}

impl SubQuestion {
    pub fn new(id: SubQuestionId, text: impl Into<String>) -> Self {
        Self {
            id,
            text: text.into(),
        }
    }
}

/// A cited source: a URL or document id plus an optional snippet/locator.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceRef {
    pub identifier: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub locator: Option<String>,
}

impl SourceRef {
    pub fn new(identifier: impl Into<String>) -> Self {
        Self {
            identifier: identifier.into(),
            locator: None,
        }
    }

    pub fn with_locator(mut self, locator: impl Into<String>) -> Self {
        self.locator = Some(locator.into());
        self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FindingStatus {
    Ok,
    Failed,
}

/// The recorded result of researching one sub-question.
///
/// Findings are immutable once written; a retry produces a new `Finding`
/// that replaces the previous one in the memory store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    pub sub_question_id: SubQuestionId,
    pub sub_question: String,
    pub summary: String,
    pub sources: Vec<SourceRef>,
    pub status: FindingStatus,
    /// 1-based dispatch attempt that produced this finding
    pub attempt: u32,
}

impl Finding {
    pub fn ok(
        sub_question: &SubQuestion,
        summary: impl Into<String>,
        sources: Vec<SourceRef>,
        attempt: u32,
    ) -> Self {
        Self {
            sub_question_id: sub_question.id,
            sub_question: sub_question.text.clone(),
            summary: summary.into(),
            sources,
            status: FindingStatus::Ok,
            attempt,
        }
    }

    /// Retrieval came back empty. A failed finding never carries sources.
    pub fn failed(sub_question: &SubQuestion, reason: impl fmt::Display, attempt: u32) -> Self {
        Self::failed_with(NO_INFORMATION, sub_question, reason, attempt)
    }

    /// Failed finding whose summary marker names the cause of `error`.
    pub fn from_error(sub_question: &SubQuestion, error: &AppError, attempt: u32) -> Self {
        let marker = match error {
            AppError::RetrievalUnavailable(_) => NO_INFORMATION,
            AppError::Research(_) => OUTPUT_UNUSABLE,
            AppError::CompletionUnavailable(_) => COMPLETION_UNAVAILABLE,
            _ => NOT_COMPLETED,
        };
        Self::failed_with(marker, sub_question, error, attempt)
    }

    /// The task ended without recording, or was never run.
    pub fn incomplete(sub_question: &SubQuestion, reason: impl fmt::Display, attempt: u32) -> Self {
        Self::failed_with(NOT_COMPLETED, sub_question, reason, attempt)
    }

    fn failed_with(
        marker: &str,
        sub_question: &SubQuestion,
        reason: impl fmt::Display,
        attempt: u32,
    ) -> Self {
        Self {
            sub_question_id: sub_question.id,
            sub_question: sub_question.text.clone(),
            summary: format!("{} ({})", marker, reason),
            sources: Vec::new(),
            status: FindingStatus::Failed,
            attempt,
        }
    }
}

/// Per sub-question entry of the final report.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coverage {
    pub id: SubQuestionId,
    pub question: String,
    pub status: FindingStatus,
    pub attempts: u32,
}

/// Final output of a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Report {
    pub question: String,
    pub body: String,
    pub cited_sources: BTreeSet<SourceRef>,
    pub coverage: Vec<Coverage>,
}

impl Report {
    /// Sub-questions that reached synthesis without a successful finding.
    pub fn unresolved(&self) -> impl Iterator<Item = &Coverage> {
        self.coverage
            .iter()
            .filter(|c| c.status == FindingStatus::Failed)
    }

    pub fn cites(&self, identifier: &str) -> bool {
        self.cited_sources
            .iter()
            .any(|s| s.identifier == identifier)
    }
}

// ============= Run State Types =============

/// Phases of the orchestrator state machine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Planning,
    Dispatching,
    Evaluating,
    Retrying,
    Synthesizing,
    Done,
    Failed,
}

impl fmt::Display for RunPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            RunPhase::Planning => "planning",
            RunPhase::Dispatching => "dispatching",
            RunPhase::Evaluating => "evaluating",
            RunPhase::Retrying => "retrying",
            RunPhase::Synthesizing => "synthesizing",
            RunPhase::Done => "done",
            RunPhase::Failed => "failed",
        };
        f.write_str(name)
    }
}

// ============= Error Types =============

#[derive(Debug, Clone, thiserror::Error)]
pub enum AppError {
    #[error("Planning error: {0}")]
    Planning(String),

    #[error("Retrieval unavailable: {0}")]
    RetrievalUnavailable(String),

    #[error("Completion unavailable: {0}")]
    CompletionUnavailable(String),

    #[error("Research error: {0}")]
    Research(String),

    #[error("Synthesis error: {0}")]
    Synthesis(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Transport-level capability failures, as opposed to malformed output.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            AppError::RetrievalUnavailable(_) | AppError::CompletionUnavailable(_)
        )
    }
}

/// Terminal failure of a run, carrying a partial report when one could be built.
#[derive(Debug, Clone, thiserror::Error)]
#[error("research run failed during {phase}: {error}")]
pub struct RunFailure {
    pub phase: RunPhase,
    #[source]
    pub error: AppError,
    pub partial: Option<Report>,
}

impl RunFailure {
    pub fn new(phase: RunPhase, error: AppError) -> Self {
        Self {
            phase,
            error,
            partial: None,
        }
    }

    pub fn with_partial(mut self, report: Report) -> Self {
        self.partial = Some(report);
        self
    }
}

pub type Result<T> = std::result::Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_finding_carries_marker_and_no_sources() {
        let sq = SubQuestion::new(2, "What are the effects?");
        let finding = Finding::failed(&sq, "empty retrieval", 3);

        assert_eq!(finding.status, FindingStatus::Failed);
        assert!(finding.summary.starts_with(NO_INFORMATION));
        assert!(finding.summary.contains("empty retrieval"));
        assert!(finding.sources.is_empty());
        assert_eq!(finding.attempt, 3);
    }

    #[test]
    fn test_failure_marker_follows_cause() {
        let sq = SubQuestion::new(1, "Why?");

        let unparsed = Finding::from_error(&sq, &AppError::Research("no SUMMARY".into()), 2);
        assert!(unparsed.summary.starts_with(OUTPUT_UNUSABLE));
        assert!(unparsed.summary.contains("no SUMMARY"));
        assert_eq!(unparsed.status, FindingStatus::Failed);

        let outage = Finding::from_error(&sq, &AppError::RetrievalUnavailable("timeout".into()), 1);
        assert!(outage.summary.starts_with(NO_INFORMATION));

        let offline =
            Finding::from_error(&sq, &AppError::CompletionUnavailable("refused".into()), 1);
        assert!(offline.summary.starts_with(COMPLETION_UNAVAILABLE));

        let lost = Finding::incomplete(&sq, "task aborted", 3);
        assert!(lost.summary.starts_with(NOT_COMPLETED));
        assert!(lost.sources.is_empty());
    }

    #[test]
    fn test_transport_classification() {
        assert!(AppError::RetrievalUnavailable("timeout".into()).is_transport());
        assert!(AppError::CompletionUnavailable("401".into()).is_transport());
        assert!(!AppError::Research("no SUMMARY".into()).is_transport());
        assert!(!AppError::Planning("2 entries".into()).is_transport());
    }

    #[test]
    fn test_run_failure_display() {
        let failure = RunFailure::new(RunPhase::Planning, AppError::Planning("too few".into()));
        let message = failure.to_string();
        assert!(message.contains("planning"));
        assert!(message.contains("too few"));
        assert!(failure.partial.is_none());
    }

    #[test]
    fn test_report_unresolved_and_cites() {
        let report = Report {
            question: "q".to_string(),
            body: String::new(),
            cited_sources: [SourceRef::new("ipcc.org/ref1")].into_iter().collect(),
            coverage: vec![
                Coverage {
                    id: 1,
                    question: "a".to_string(),
                    status: FindingStatus::Ok,
                    attempts: 1,
                },
                Coverage {
                    id: 2,
                    question: "b".to_string(),
                    status: FindingStatus::Failed,
                    attempts: 3,
                },
            ],
        };

        let unresolved: Vec<_> = report.unresolved().map(|c| c.id).collect();
        assert_eq!(unresolved, vec![2]);
        assert!(report.cites("ipcc.org/ref1"));
        assert!(!report.cites("example.com"));
    }
}
