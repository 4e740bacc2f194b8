//! # ares-research
//!
//! Turns one broad research question into a cited report. A planner breaks
//! the question into focused sub-questions, research tasks retrieve context
//! for each of them, and a synthesizer writes a report that cites only
//! sources the research actually retrieved.
//!
//! ## Quick Start (Library Usage)
//!
//! ```rust,ignore
//! use ares_research::{LLMClient, Provider, ResearchCoordinator, StubRetriever};
//! use ares_research::utils::PipelineConfig;
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let llm = Provider::Stub.create_client().await?;
//!     let coordinator = ResearchCoordinator::new(
//!         llm,
//!         Arc::new(StubRetriever::new()),
//!         &PipelineConfig::default(),
//!     );
//!
//!     let report = coordinator.run("Causes of ocean acidification").await?;
//!     println!("{}", report.body);
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Description |
//! |---------|-------------|
//! | `openai` | OpenAI API and compatible endpoints (default) |
//! | `ollama` | Ollama local inference (default) |
//!
//! ## Modules
//!
//! - [`research`] - Planner, Researcher, Synthesizer and the coordinator
//! - [`memory`] - Per-run store of findings
//! - [`llm`] - Completion clients
//! - [`tools`] - Retrieval backends
//! - [`types`] - Domain types and error handling
//! - [`utils`] - TOML configuration

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(rustdoc::missing_crate_level_docs)]

/// Command-line parsing and terminal output.
pub mod cli;
/// Completion capability and providers.
pub mod llm;
/// Short-term memory for a single run.
pub mod memory;
/// Research pipeline stages and coordination.
pub mod research;
/// Retrieval capability and backends.
pub mod tools;
/// Core types and error handling.
pub mod types;
/// Configuration loading.
pub mod utils;

pub use llm::{CompletionConstraints, CompletionPurpose, LLMClient, Provider, StubLLMClient};
pub use memory::MemoryStore;
pub use research::{Dispatcher, PooledDispatcher, ResearchCoordinator, SequentialDispatcher};
pub use tools::{Retriever, StubRetriever};
pub use types::{
    AppError, Finding, FindingStatus, Report, Result, RunFailure, RunPhase, SourceRef,
    SubQuestion,
};
pub use utils::ResearchConfig;
