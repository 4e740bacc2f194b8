//! Completion Provider Clients and Abstractions
//!
//! This module provides a unified interface for the language-completion
//! capability consumed by the research pipeline. Provider-specific
//! implementations sit behind the [`LLMClient`] trait, so planning, research
//! and synthesis work with any supported backend.
//!
//! # Supported Providers
//!
//! Enable providers via Cargo features:
//! - `openai` - OpenAI API and compatible endpoints
//! - `ollama` - Local Ollama server
//!
//! The deterministic [`StubLLMClient`] is always compiled in and backs
//! offline runs.
//!
//! # Example
//!
//! ```ignore
//! use ares_research::llm::{CompletionConstraints, CompletionPurpose, Provider};
//!
//! let client = Provider::Stub.create_client().await?;
//! let text = client
//!     .complete("Research question: ...", &CompletionConstraints::new(CompletionPurpose::Planning))
//!     .await?;
//! ```

/// Core completion trait, constraints and provider factory.
pub mod client;
/// Deterministic offline client.
pub mod stub;

#[cfg(feature = "ollama")]
pub mod ollama;

#[cfg(feature = "openai")]
pub mod openai;

pub use client::{CompletionConstraints, CompletionPurpose, LLMClient, Provider};
pub use stub::StubLLMClient;
