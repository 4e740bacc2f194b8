//! Short-term memory for a single research run.
//!
//! The [`MemoryStore`] maps each sub-question id to its most recent
//! [`Finding`]. It is the only surface shared between the coordinator and
//! the research tasks it dispatches, and it is partitioned by key: every
//! task receives a [`Slot`] bound to its own sub-question and can commit
//! exactly one finding through it.
//!
//! The store lives for one run. Nothing is persisted across runs.

use crate::types::{AppError, Finding, FindingStatus, Result, SubQuestionId};
use parking_lot::RwLock;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Maximum characters of a single finding summary included in a prompt.
pub const MAX_SUMMARY_CHARS_IN_PROMPT: usize = 2_000;

/// In-process store of findings keyed by sub-question id.
///
/// `put` is last-write-wins per key. Snapshots are always ordered by id,
/// regardless of the order findings were written in.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<SubQuestionId, Finding>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `finding` under `id`, replacing any previous record.
    ///
    /// Returns the replaced finding, if there was one.
    pub fn put(&self, id: SubQuestionId, finding: Finding) -> Option<Finding> {
        self.records.write().insert(id, finding)
    }

    pub fn get(&self, id: SubQuestionId) -> Option<Finding> {
        self.records.read().get(&id).cloned()
    }

    /// Snapshot of every recorded finding, ordered by sub-question id.
    pub fn all_findings(&self) -> Vec<Finding> {
        self.records.read().values().cloned().collect()
    }

    /// Empty the store. Only meaningful between independent runs.
    pub fn clear(&self) {
        self.records.write().clear();
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    /// Hand out a write-once handle for one sub-question's record.
    pub fn slot(self: &Arc<Self>, id: SubQuestionId) -> Slot {
        Slot {
            store: Arc::clone(self),
            id,
        }
    }
}

/// Write-once access to a single key of a [`MemoryStore`].
///
/// `commit` consumes the slot, so a task can record at most one finding
/// per dispatch and can never touch another sub-question's record.
#[derive(Debug)]
pub struct Slot {
    store: Arc<MemoryStore>,
    id: SubQuestionId,
}

impl Slot {
    pub fn commit(self, finding: Finding) -> Result<FindingStatus> {
        if finding.sub_question_id != self.id {
            return Err(AppError::Internal(format!(
                "finding for sub-question {} committed to slot {}",
                finding.sub_question_id, self.id
            )));
        }
        let status = finding.status;
        self.store.put(self.id, finding);
        Ok(status)
    }
}

/// Formats findings into the block handed to the synthesis prompt.
///
/// Failed findings are included and flagged so the report can name them
/// as gaps instead of dropping them.
pub fn format_findings_for_prompt(findings: &[Finding]) -> String {
    findings
        .iter()
        .map(|f| {
            let status = match f.status {
                FindingStatus::Ok => "resolved",
                FindingStatus::Failed => "UNRESOLVED",
            };
            let sources = if f.sources.is_empty() {
                "none".to_string()
            } else {
                f.sources
                    .iter()
                    .map(|s| s.identifier.as_str())
                    .collect::<Vec<_>>()
                    .join(", ")
            };
            format!(
                "Sub-question {}: {}\nStatus: {}\nSummary: {}\nSources: {}",
                f.sub_question_id,
                f.sub_question,
                status,
                truncate_chars(&f.summary, MAX_SUMMARY_CHARS_IN_PROMPT),
                sources
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn truncate_chars(text: &str, max: usize) -> &str {
    match text.char_indices().nth(max) {
        Some((idx, _)) => &text[..idx],
        None => text,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{SourceRef, SubQuestion};

    fn ok_finding(id: SubQuestionId, summary: &str) -> Finding {
        Finding::ok(
            &SubQuestion::new(id, format!("Question {}", id)),
            summary,
            vec![SourceRef::new("https://example.com/overview")],
            1,
        )
    }

    #[test]
    fn test_put_and_get() {
        let store = MemoryStore::new();
        assert!(store.get(1).is_none());

        store.put(1, ok_finding(1, "first"));
        assert_eq!(store.get(1).map(|f| f.summary), Some("first".to_string()));
        assert!(store.get(2).is_none());
    }

    #[test]
    fn test_put_is_last_write_wins() {
        let store = MemoryStore::new();
        let sq = SubQuestion::new(1, "Question 1");
        store.put(1, Finding::failed(&sq, "empty retrieval", 1));

        let replaced = store.put(1, ok_finding(1, "second attempt"));
        assert_eq!(replaced.map(|f| f.status), Some(FindingStatus::Failed));
        assert_eq!(store.len(), 1);
        assert!(store.get(1).is_some_and(|f| f.status == FindingStatus::Ok));
    }

    #[test]
    fn test_all_findings_ordered_by_id() {
        let store = MemoryStore::new();
        store.put(3, ok_finding(3, "c"));
        store.put(1, ok_finding(1, "a"));
        store.put(2, ok_finding(2, "b"));

        let ids: Vec<_> = store.all_findings().iter().map(|f| f.sub_question_id).collect();
        assert_eq!(ids, vec![1, 2, 3]);
    }

    #[test]
    fn test_clear() {
        let store = MemoryStore::new();
        store.put(1, ok_finding(1, "a"));
        store.clear();
        assert!(store.is_empty());
    }

    #[test]
    fn test_slot_commits_to_own_key() {
        let store = Arc::new(MemoryStore::new());
        let slot = store.slot(2);

        let status = slot.commit(ok_finding(2, "b")).unwrap();
        assert_eq!(status, FindingStatus::Ok);
        assert!(store.get(2).is_some());
    }

    #[test]
    fn test_slot_rejects_foreign_finding() {
        let store = Arc::new(MemoryStore::new());
        let result = store.slot(2).commit(ok_finding(3, "c"));
        assert!(result.is_err());
        assert!(store.is_empty());
    }

    #[test]
    fn test_format_findings_flags_unresolved() {
        let sq = SubQuestion::new(2, "What are the effects?");
        let findings = vec![ok_finding(1, "CO2 lowers pH"), Finding::failed(&sq, "empty", 3)];

        let text = format_findings_for_prompt(&findings);
        assert!(text.contains("Sub-question 1: Question 1"));
        assert!(text.contains("Status: resolved"));
        assert!(text.contains("Sub-question 2: What are the effects?"));
        assert!(text.contains("Status: UNRESOLVED"));
        assert!(text.contains("Sources: none"));
        assert!(text.contains("https://example.com/overview"));
    }
}
