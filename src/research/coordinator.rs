use crate::llm::LLMClient;
use crate::memory::MemoryStore;
use crate::research::synthesizer::fallback_report;
use crate::research::{
    Dispatcher, Planner, PooledDispatcher, ResearchInput, ResearchTask, Researcher, RetryBudget,
    SequentialDispatcher, Stage, SynthesisInput, Synthesizer, TaskOutcome,
};
use crate::tools::{self, Retriever};
use crate::types::{
    AppError, Finding, FindingStatus, Report, RunFailure, RunPhase, SubQuestion, SubQuestionId,
};
use crate::utils::{PipelineConfig, ResearchConfig};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use std::time::Instant;
use tracing::Instrument;
use uuid::Uuid;

/// Drives one research run from question to report.
///
/// Each call to [`run`](Self::run) gets a fresh memory store and run state;
/// nothing carries over between runs.
pub struct ResearchCoordinator {
    planner: Planner,
    researcher: Arc<Researcher>,
    synthesizer: Synthesizer,
    dispatcher: Box<dyn Dispatcher>,
    pipeline: PipelineConfig,
}

impl ResearchCoordinator {
    /// Build a coordinator from explicit capabilities.
    ///
    /// A concurrency of 1 selects the [`SequentialDispatcher`], anything
    /// larger a [`PooledDispatcher`] of that width.
    pub fn new(
        llm: Arc<dyn LLMClient>,
        retriever: Arc<dyn Retriever>,
        pipeline: &PipelineConfig,
    ) -> Self {
        let dispatcher: Box<dyn Dispatcher> = if pipeline.concurrency <= 1 {
            Box::new(SequentialDispatcher)
        } else {
            Box::new(PooledDispatcher::new(pipeline.concurrency))
        };

        Self {
            planner: Planner::new(Arc::clone(&llm), pipeline.max_sub_questions),
            researcher: Arc::new(
                Researcher::new(Arc::clone(&llm), retriever, pipeline.local_retries)
                    .with_strict_grounding(pipeline.strict_grounding),
            ),
            synthesizer: Synthesizer::new(llm),
            dispatcher,
            pipeline: pipeline.clone(),
        }
    }

    /// Build the completion client and retriever named by `config`.
    pub async fn from_config(config: &ResearchConfig) -> crate::types::Result<Self> {
        let llm = config.llm_provider()?.create_client().await?;
        let retriever = tools::create_retriever(config)?;
        let pipeline = &config.pipeline;
        let tuning = &config.llm;

        tracing::debug!(
            model = llm.model_name(),
            retriever = retriever.name(),
            "capabilities ready"
        );

        let mut coordinator = Self::new(Arc::clone(&llm), Arc::clone(&retriever), pipeline);
        coordinator.planner = Planner::new(Arc::clone(&llm), pipeline.max_sub_questions)
            .with_temperature(tuning.temperature);
        coordinator.researcher = Arc::new(
            Researcher::new(Arc::clone(&llm), retriever, pipeline.local_retries)
                .with_strict_grounding(pipeline.strict_grounding)
                .with_temperature(tuning.temperature)
                .with_max_tokens(tuning.max_tokens),
        );
        coordinator.synthesizer = Synthesizer::new(llm)
            .with_temperature(tuning.temperature)
            .with_max_tokens(tuning.max_tokens);

        Ok(coordinator)
    }

    /// Replace the dispatch strategy.
    pub fn with_dispatcher(mut self, dispatcher: Box<dyn Dispatcher>) -> Self {
        self.dispatcher = dispatcher;
        self
    }

    pub fn dispatcher_name(&self) -> &'static str {
        self.dispatcher.name()
    }

    /// Execute one full run for `question`.
    pub async fn run(&self, question: &str) -> Result<Report, RunFailure> {
        let run_id = Uuid::new_v4();
        let span = tracing::info_span!("research_run", %run_id);
        self.execute(question.trim()).instrument(span).await
    }

    async fn execute(&self, question: &str) -> Result<Report, RunFailure> {
        if question.is_empty() {
            return Err(RunFailure::new(
                RunPhase::Planning,
                AppError::InvalidInput("research question is empty".to_string()),
            ));
        }

        let started = Instant::now();
        tracing::info!(question, dispatcher = self.dispatcher.name(), "research run started");

        let plan = self.plan(question).await?;
        let store = Arc::new(MemoryStore::new());
        let mut state = RunState::new(plan);

        let mut pending = state.sub_questions.clone();
        loop {
            state.cycles += 1;
            let phase = if state.cycles == 1 {
                RunPhase::Dispatching
            } else {
                RunPhase::Retrying
            };
            tracing::info!(%phase, cycle = state.cycles, tasks = pending.len(), "dispatching");

            let tasks: Vec<ResearchTask> = pending
                .iter()
                .map(|sq| {
                    ResearchTask::new(
                        ResearchInput {
                            sub_question: sq.clone(),
                            attempt: state.attempts(sq.id),
                        },
                        store.slot(sq.id),
                    )
                })
                .collect();

            let outcomes = self
                .dispatcher
                .dispatch(Arc::clone(&self.researcher), tasks)
                .await;

            tracing::info!(phase = %RunPhase::Evaluating, cycle = state.cycles, "evaluating");
            state.evaluate(&pending, &outcomes, &store);

            pending = state.unresolved(self.pipeline.research_retries);
            if pending.is_empty() {
                break;
            }
            if state.cycles >= self.pipeline.max_cycles {
                tracing::warn!(
                    cycles = state.cycles,
                    unresolved = pending.len(),
                    "cycle ceiling reached, synthesizing with current findings"
                );
                break;
            }
            if let Some(budget) = self.pipeline.wall_clock() {
                if started.elapsed() >= budget {
                    tracing::warn!(
                        elapsed_secs = started.elapsed().as_secs(),
                        unresolved = pending.len(),
                        "wall-clock budget exhausted, synthesizing with current findings"
                    );
                    break;
                }
            }
            for sq in &pending {
                state.mark_retry(sq.id);
            }
        }

        tracing::info!(
            phase = %RunPhase::Synthesizing,
            resolved = state.completed.len(),
            unresolved = state.failed.len(),
            findings = store.len(),
            "halting criterion met"
        );

        let input = SynthesisInput {
            question: question.to_string(),
            sub_questions: state.sub_questions.clone(),
            findings: store.all_findings(),
        };
        let report = self.synthesize(input).await?;

        tracing::info!(
            phase = %RunPhase::Done,
            cited = report.cited_sources.len(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "research run finished"
        );
        Ok(report)
    }

    async fn plan(&self, question: &str) -> Result<Vec<SubQuestion>, RunFailure> {
        let mut budget = RetryBudget::new(self.pipeline.planning_retries);
        loop {
            match self.planner.execute(question.to_string()).await {
                Ok(plan) => {
                    tracing::info!(
                        phase = %RunPhase::Planning,
                        sub_questions = plan.len(),
                        max = self.planner.max_sub_questions(),
                        "plan accepted"
                    );
                    return Ok(plan);
                }
                Err(e) if budget.try_consume() => {
                    tracing::warn!(
                        stage = self.planner.name(),
                        retry = budget.used(),
                        "planning failed, retrying: {}",
                        e
                    );
                }
                Err(e) => {
                    tracing::error!(
                        phase = %RunPhase::Failed,
                        stage = self.planner.name(),
                        "planning failed: {}",
                        e
                    );
                    return Err(RunFailure::new(RunPhase::Planning, e));
                }
            }
        }
    }

    async fn synthesize(&self, input: SynthesisInput) -> Result<Report, RunFailure> {
        let mut budget = RetryBudget::new(self.pipeline.synthesis_retries);
        loop {
            match self.synthesizer.execute(input.clone()).await {
                Ok(report) => return Ok(report),
                Err(e) if budget.try_consume() => {
                    tracing::warn!(
                        stage = self.synthesizer.name(),
                        retry = budget.used(),
                        "synthesis failed, retrying: {}",
                        e
                    );
                }
                Err(e) => {
                    tracing::error!(
                        phase = %RunPhase::Failed,
                        stage = self.synthesizer.name(),
                        "synthesis failed: {}",
                        e
                    );
                    return Err(RunFailure::new(RunPhase::Synthesizing, e)
                        .with_partial(fallback_report(&input)));
                }
            }
        }
    }
}

/// Coordinator-private bookkeeping for one run.
#[derive(Debug)]
struct RunState {
    sub_questions: Vec<SubQuestion>,
    completed: BTreeSet<SubQuestionId>,
    failed: BTreeSet<SubQuestionId>,
    retry_counts: BTreeMap<SubQuestionId, u32>,
    cycles: u32,
}

impl RunState {
    fn new(sub_questions: Vec<SubQuestion>) -> Self {
        let retry_counts = sub_questions.iter().map(|sq| (sq.id, 0)).collect();
        Self {
            sub_questions,
            completed: BTreeSet::new(),
            failed: BTreeSet::new(),
            retry_counts,
            cycles: 0,
        }
    }

    /// 1-based attempt number of the next dispatch of `id`.
    fn attempts(&self, id: SubQuestionId) -> u32 {
        self.retry_counts.get(&id).copied().unwrap_or(0) + 1
    }

    fn mark_retry(&mut self, id: SubQuestionId) {
        *self.retry_counts.entry(id).or_insert(0) += 1;
    }

    /// Fold one cycle's outcomes into the state. A dispatched task that
    /// returned no outcome, or ended without recording, gets a failed
    /// finding written on its behalf.
    fn evaluate(
        &mut self,
        dispatched: &[SubQuestion],
        outcomes: &[TaskOutcome],
        store: &MemoryStore,
    ) {
        for sq in dispatched {
            let status = match outcomes.iter().find(|o| o.id == sq.id) {
                Some(outcome) if outcome.recorded => outcome.status,
                _ => {
                    let attempt = self.attempts(sq.id);
                    tracing::warn!(id = sq.id, attempt, "task left no finding, recording failure");
                    store.put(
                        sq.id,
                        Finding::incomplete(sq, "task left no finding", attempt),
                    );
                    FindingStatus::Failed
                }
            };

            match status {
                FindingStatus::Ok => {
                    self.failed.remove(&sq.id);
                    self.completed.insert(sq.id);
                }
                FindingStatus::Failed => {
                    self.completed.remove(&sq.id);
                    self.failed.insert(sq.id);
                }
            }
        }
    }

    /// Failed sub-questions that still have re-dispatches left.
    fn unresolved(&self, research_retries: u32) -> Vec<SubQuestion> {
        self.sub_questions
            .iter()
            .filter(|sq| self.failed.contains(&sq.id))
            .filter(|sq| self.retry_counts.get(&sq.id).copied().unwrap_or(0) < research_retries)
            .cloned()
            .collect()
    }
}
