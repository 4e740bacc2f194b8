//! Dispatch strategies for research tasks
//!
//! A [`Dispatcher`] runs one cycle's batch of [`ResearchTask`]s to
//! completion and reports an outcome per task. It returns only after every
//! task in the batch has finished, which is the barrier the coordinator's
//! evaluation step relies on.
//!
//! Tasks write their finding through their own [`Slot`]; the outcome they
//! return is the only thing the coordinator reads to update run state.

use crate::memory::Slot;
use crate::research::{ResearchInput, Researcher, Stage};
use crate::types::{Finding, FindingStatus, SubQuestionId};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// One dispatch of one sub-question.
#[derive(Debug)]
pub struct ResearchTask {
    pub input: ResearchInput,
    slot: Slot,
}

impl ResearchTask {
    pub fn new(input: ResearchInput, slot: Slot) -> Self {
        Self { input, slot }
    }

    pub fn id(&self) -> SubQuestionId {
        self.input.sub_question.id
    }

    pub fn attempt(&self) -> u32 {
        self.input.attempt
    }

    /// Research the sub-question and commit the finding to this task's slot.
    pub async fn run(self, researcher: &Researcher) -> TaskOutcome {
        let id = self.id();
        let attempt = self.attempt();
        let sub_question = self.input.sub_question.clone();

        let finding = match researcher.execute(self.input).await {
            Ok(finding) => finding,
            Err(e) => {
                tracing::warn!(
                    stage = researcher.name(),
                    id,
                    attempt,
                    "research task failed: {}",
                    e
                );
                Finding::from_error(&sub_question, &e, attempt)
            }
        };

        match self.slot.commit(finding) {
            Ok(status) => TaskOutcome {
                id,
                attempt,
                status,
                recorded: true,
            },
            Err(e) => {
                tracing::error!(id, attempt, "could not record finding: {}", e);
                TaskOutcome::lost(id, attempt)
            }
        }
    }
}

/// Completion signal a research task hands back to the coordinator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TaskOutcome {
    pub id: SubQuestionId,
    pub attempt: u32,
    pub status: FindingStatus,
    /// False when the task ended without writing its finding
    pub recorded: bool,
}

impl TaskOutcome {
    pub fn lost(id: SubQuestionId, attempt: u32) -> Self {
        Self {
            id,
            attempt,
            status: FindingStatus::Failed,
            recorded: false,
        }
    }
}

/// Strategy for running a batch of research tasks.
#[async_trait]
pub trait Dispatcher: Send + Sync {
    /// Run every task and return one outcome per task, ordered by id.
    async fn dispatch(
        &self,
        researcher: Arc<Researcher>,
        tasks: Vec<ResearchTask>,
    ) -> Vec<TaskOutcome>;

    fn name(&self) -> &'static str;
}

/// Runs tasks one at a time in id order.
#[derive(Debug, Default, Clone, Copy)]
pub struct SequentialDispatcher;

#[async_trait]
impl Dispatcher for SequentialDispatcher {
    async fn dispatch(
        &self,
        researcher: Arc<Researcher>,
        mut tasks: Vec<ResearchTask>,
    ) -> Vec<TaskOutcome> {
        tasks.sort_by_key(|t| t.id());

        let mut outcomes = Vec::with_capacity(tasks.len());
        for task in tasks {
            outcomes.push(task.run(&researcher).await);
        }
        outcomes
    }

    fn name(&self) -> &'static str {
        "sequential"
    }
}

/// Runs tasks on a worker pool of at most `width` concurrent tasks.
#[derive(Debug, Clone, Copy)]
pub struct PooledDispatcher {
    width: usize,
}

impl PooledDispatcher {
    pub fn new(width: usize) -> Self {
        Self {
            width: width.max(1),
        }
    }
}

#[async_trait]
impl Dispatcher for PooledDispatcher {
    async fn dispatch(
        &self,
        researcher: Arc<Researcher>,
        tasks: Vec<ResearchTask>,
    ) -> Vec<TaskOutcome> {
        let semaphore = Arc::new(Semaphore::new(self.width));
        let mut set = JoinSet::new();
        let mut pending: BTreeMap<SubQuestionId, u32> = BTreeMap::new();

        for task in tasks {
            pending.insert(task.id(), task.attempt());
            let researcher = Arc::clone(&researcher);
            let semaphore = Arc::clone(&semaphore);

            set.spawn(async move {
                let _permit = semaphore.acquire_owned().await;
                task.run(&researcher).await
            });
        }

        let mut outcomes = Vec::with_capacity(pending.len());
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(outcome) => {
                    pending.remove(&outcome.id);
                    outcomes.push(outcome);
                }
                Err(err) => tracing::error!("research task aborted: {}", err),
            }
        }

        // Tasks that panicked or were cancelled never reported back
        for (id, attempt) in pending {
            outcomes.push(TaskOutcome::lost(id, attempt));
        }

        outcomes.sort_by_key(|o| o.id);
        outcomes
    }

    fn name(&self) -> &'static str {
        "pooled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::{CompletionConstraints, LLMClient, StubLLMClient};
    use crate::memory::MemoryStore;
    use crate::tools::StubRetriever;
    use crate::types::{Result, SubQuestion};

    /// Stub completion that panics on one sub-question's research prompt.
    struct PanicsOn(&'static str);

    #[async_trait]
    impl LLMClient for PanicsOn {
        async fn complete(
            &self,
            prompt: &str,
            constraints: &CompletionConstraints,
        ) -> Result<String> {
            if prompt.contains(self.0) {
                panic!("completion backend crashed");
            }
            StubLLMClient.complete(prompt, constraints).await
        }

        fn model_name(&self) -> &str {
            "panics-on"
        }
    }

    fn tasks(store: &Arc<MemoryStore>, count: usize) -> Vec<ResearchTask> {
        (1..=count)
            .rev()
            .map(|id| {
                ResearchTask::new(
                    ResearchInput {
                        sub_question: SubQuestion::new(id, format!("Question number {}?", id)),
                        attempt: 1,
                    },
                    store.slot(id),
                )
            })
            .collect()
    }

    fn researcher() -> Arc<Researcher> {
        Arc::new(Researcher::new(
            Arc::new(StubLLMClient::new()),
            Arc::new(StubRetriever::new()),
            1,
        ))
    }

    #[tokio::test]
    async fn test_sequential_records_every_task() {
        let store = Arc::new(MemoryStore::new());
        let outcomes = SequentialDispatcher
            .dispatch(researcher(), tasks(&store, 4))
            .await;

        let ids: Vec<_> = outcomes.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 4]);
        assert!(outcomes.iter().all(|o| o.recorded && o.status == FindingStatus::Ok));
        assert_eq!(store.len(), 4);
    }

    #[tokio::test]
    async fn test_pooled_matches_sequential() {
        let sequential_store = Arc::new(MemoryStore::new());
        let pooled_store = Arc::new(MemoryStore::new());

        let sequential = SequentialDispatcher
            .dispatch(researcher(), tasks(&sequential_store, 5))
            .await;
        let pooled = PooledDispatcher::new(2)
            .dispatch(researcher(), tasks(&pooled_store, 5))
            .await;

        assert_eq!(sequential, pooled);
        assert_eq!(sequential_store.all_findings(), pooled_store.all_findings());
    }

    #[tokio::test]
    async fn test_zero_width_pool_still_runs_every_task() {
        let store = Arc::new(MemoryStore::new());
        let outcomes = PooledDispatcher::new(0)
            .dispatch(researcher(), tasks(&store, 3))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert!(outcomes.iter().all(|o| o.recorded));
    }

    #[tokio::test]
    async fn test_panicked_task_is_reported_lost() {
        let store = Arc::new(MemoryStore::new());
        let researcher = Arc::new(Researcher::new(
            Arc::new(PanicsOn("Question number 2?")),
            Arc::new(StubRetriever::new()),
            1,
        ));

        let outcomes = PooledDispatcher::new(2)
            .dispatch(researcher, tasks(&store, 3))
            .await;

        assert_eq!(outcomes.len(), 3);
        assert_eq!(outcomes[1], TaskOutcome::lost(2, 1));
        assert!(outcomes[0].recorded && outcomes[2].recorded);
        assert!(store.get(2).is_none());
    }
}
