//! CLI module for ares-research
//!
//! Provides command-line interface parsing for the ares-research binary.
//! Uses clap for argument parsing and owo-colors for colored terminal output.

pub mod init;
pub mod output;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

/// Default configuration file looked up in the working directory.
pub const DEFAULT_CONFIG_FILE: &str = "research.toml";

/// ares-research - question decomposition and cited research reports
#[derive(Parser, Debug)]
#[command(
    name = "ares-research",
    author = "Dirmacs <build@dirmacs.com>",
    version,
    about = "Decompose a research question, research each part, and synthesize a cited report",
    long_about = "Plans focused sub-questions for a broad research question, researches each one\n\
                  against a search provider, and synthesizes a report that cites only the sources\n\
                  the research actually retrieved.",
    after_help = "EXAMPLES:\n    \
                  ares-research run \"Causes of ocean acidification\"\n    \
                  ares-research run --offline \"History of the transistor\"\n    \
                  ares-research run --json --concurrency 1 \"Battery recycling methods\"\n    \
                  ares-research init                # Write a default research.toml"
)]
pub struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Disable colored output
    #[arg(long, global = true)]
    pub no_color: bool,

    /// Log line format written to stderr
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    Text,
    Json,
}

/// Available CLI subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Research a question and print the report
    Run(RunArgs),

    /// Write a default research.toml
    Init {
        /// Directory to write research.toml into
        #[arg(default_value = ".")]
        path: PathBuf,

        /// Overwrite an existing research.toml
        #[arg(short, long)]
        force: bool,
    },
}

#[derive(clap::Args, Debug, Clone)]
pub struct RunArgs {
    /// The research question
    pub question: String,

    /// Path to the configuration file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Use deterministic stub providers (no network, no API keys)
    #[arg(long)]
    pub offline: bool,

    /// Completion model to use
    #[arg(short, long)]
    pub model: Option<String>,

    /// Maximum number of sub-questions (at least 3)
    #[arg(long)]
    pub max_sub_questions: Option<usize>,

    /// Number of research tasks run at once (1 = sequential)
    #[arg(long)]
    pub concurrency: Option<usize>,

    /// Print the report as JSON instead of formatted text
    #[arg(long)]
    pub json: bool,
}

impl Cli {
    /// Parse CLI arguments
    pub fn parse_args() -> Self {
        Self::parse()
    }
}

impl RunArgs {
    /// Config file to load and whether it was named explicitly.
    pub fn config_path(&self) -> (PathBuf, bool) {
        match &self.config {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        }
    }

    /// Apply command-line overrides on top of a loaded configuration.
    pub fn apply_to(&self, config: &mut crate::utils::ResearchConfig) {
        if self.offline {
            config.offline = true;
        }
        if let Some(model) = &self.model {
            config.llm.model = model.clone();
        }
        if let Some(k) = self.max_sub_questions {
            config.pipeline.max_sub_questions = k;
        }
        if let Some(width) = self.concurrency {
            config.pipeline.concurrency = width;
        }
    }
}
