//! Research Pipeline Coordination
//!
//! This module turns one broad research question into a cited report by
//! sequencing three stages under a single coordinator:
//!
//! - [`Planner`] - decomposes the question into 3..=k sub-questions
//! - [`Researcher`] - retrieves context for one sub-question and records a finding
//! - [`Synthesizer`] - writes the report, citing only recorded sources
//!
//! [`ResearchCoordinator`] owns the per-run memory store and run state, and
//! drives the state machine
//! `Planning -> Dispatching -> Evaluating -> (Retrying | Synthesizing) -> Done | Failed`.
//! Research tasks are handed to an interchangeable [`Dispatcher`]: the
//! [`SequentialDispatcher`] runs them one after another, the
//! [`PooledDispatcher`] runs them on a bounded worker pool.
//!
//! # Usage
//!
//! ```ignore
//! use ares_research::research::ResearchCoordinator;
//! use ares_research::utils::ResearchConfig;
//!
//! let config = ResearchConfig::load_or_default("research.toml")?;
//! let coordinator = ResearchCoordinator::from_config(&config).await?;
//!
//! match coordinator.run("Causes of ocean acidification").await {
//!     Ok(report) => println!("{}", report.body),
//!     Err(failure) => eprintln!("{}", failure),
//! }
//! ```

/// Run state machine and halting policy.
pub mod coordinator;
/// Sequential and pooled dispatch strategies.
pub mod dispatch;
/// Text helpers shared by the stage parsers.
pub mod parsing;
/// Question decomposition.
pub mod planner;
/// Per sub-question research.
pub mod researcher;
/// Report synthesis and citation filtering.
pub mod synthesizer;

use crate::types::Result;
use async_trait::async_trait;

pub use coordinator::ResearchCoordinator;
pub use dispatch::{
    Dispatcher, PooledDispatcher, ResearchTask, SequentialDispatcher, TaskOutcome,
};
pub use planner::Planner;
pub use researcher::{ResearchInput, Researcher};
pub use synthesizer::{SynthesisInput, Synthesizer};

/// A pipeline stage: one typed input, one typed output, fallible.
#[async_trait]
pub trait Stage: Send + Sync {
    type Input: Send + 'static;
    type Output: Send + 'static;

    /// Stage name used in logs
    fn name(&self) -> &'static str;

    async fn execute(&self, input: Self::Input) -> Result<Self::Output>;
}

/// A strictly decreasing allowance of extra attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryBudget {
    limit: u32,
    used: u32,
}

impl RetryBudget {
    pub fn new(limit: u32) -> Self {
        Self { limit, used: 0 }
    }

    /// Take one retry from the budget. Returns `false` once it is spent.
    pub fn try_consume(&mut self) -> bool {
        if self.used < self.limit {
            self.used += 1;
            true
        } else {
            false
        }
    }

    pub fn used(&self) -> u32 {
        self.used
    }
}
