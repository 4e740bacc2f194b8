//! Colored output helpers for CLI
//!
//! Status messages go to stderr so stdout carries only the report.

use crate::types::{Report, RunFailure};
use owo_colors::OwoColorize;

/// Output style configuration
pub struct Output {
    /// Whether to use colored output
    pub colored: bool,
}

impl Default for Output {
    fn default() -> Self {
        Self::new()
    }
}

impl Output {
    /// Create a new output helper with colors enabled
    pub fn new() -> Self {
        Self { colored: true }
    }

    /// Create a new output helper with colors disabled
    pub fn no_color() -> Self {
        Self { colored: false }
    }

    /// Print a success message with a checkmark
    pub fn success(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✓".green().bold(), message.green());
        } else {
            eprintln!("  [OK] {}", message);
        }
    }

    /// Print an info message
    pub fn info(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "•".blue(), message);
        } else {
            eprintln!("  [INFO] {}", message);
        }
    }

    /// Print a warning message
    pub fn warning(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "⚠".yellow().bold(), message.yellow());
        } else {
            eprintln!("  [WARN] {}", message);
        }
    }

    /// Print an error message
    pub fn error(&self, message: &str) {
        if self.colored {
            eprintln!("  {} {}", "✗".red().bold(), message.red());
        } else {
            eprintln!("  [ERROR] {}", message);
        }
    }

    /// Print a file creation message
    pub fn created(&self, file_type: &str, path: &str) {
        if self.colored {
            eprintln!(
                "  {} {} {}",
                "✓".green().bold(),
                file_type.dimmed(),
                path.bright_white()
            );
        } else {
            eprintln!("  [CREATED] {} {}", file_type, path);
        }
    }

    /// Print a hint/tip message
    pub fn hint(&self, message: &str) {
        if self.colored {
            eprintln!("\n  {} {}", "💡".dimmed(), message.dimmed().italic());
        } else {
            eprintln!("\n  [TIP] {}", message);
        }
    }

    /// Print a command suggestion
    pub fn command(&self, cmd: &str) {
        if self.colored {
            eprintln!("     {}", format!("$ {}", cmd).bright_cyan());
        } else {
            eprintln!("     $ {}", cmd);
        }
    }

    /// Print the report body to stdout
    pub fn report(&self, report: &Report) {
        for line in report.body.lines() {
            println!("{}", self.style_line(line));
        }
    }

    /// Print a failed run, followed by its partial report when there is one
    pub fn failure(&self, failure: &RunFailure) {
        self.error(&failure.to_string());
        match &failure.partial {
            Some(partial) => {
                self.warning("Partial report assembled from the recorded findings:");
                self.report(partial);
            }
            None => self.hint("Re-run with --verbose for stage-level logs"),
        }
    }

    fn style_line(&self, line: &str) -> String {
        if !self.colored {
            return line.to_string();
        }

        if line.starts_with('#') {
            line.bright_white().bold().to_string()
        } else if line.starts_with("- [UNRESOLVED]") {
            line.red().to_string()
        } else if line.starts_with("- [resolved]") {
            line.green().to_string()
        } else {
            line.to_string()
        }
    }
}
