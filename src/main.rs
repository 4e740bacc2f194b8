use anyhow::Context;
use ares_research::cli::init::{self, InitConfig, InitResult};
use ares_research::cli::output::Output;
use ares_research::cli::{Cli, Commands, LogFormat, RunArgs};
use ares_research::research::ResearchCoordinator;
use ares_research::types::AppError;
use ares_research::utils::{ConfigError, ResearchConfig};
use serde_json::json;
use std::process::ExitCode;

const EXIT_RUN_FAILED: u8 = 1;
const EXIT_CONFIG: u8 = 2;

#[tokio::main]
async fn main() -> anyhow::Result<ExitCode> {
    dotenvy::dotenv().ok();

    let cli = Cli::parse_args();
    let output = if cli.no_color {
        Output::no_color()
    } else {
        Output::new()
    };

    match cli.command {
        Commands::Init { ref path, force } => {
            init_tracing(cli.verbose, "info", cli.log_format);
            let result = init::run(
                InitConfig {
                    path: path.clone(),
                    force,
                },
                &output,
            );
            Ok(match result {
                InitResult::Success => ExitCode::SUCCESS,
                InitResult::AlreadyExists | InitResult::Error(_) => {
                    ExitCode::from(EXIT_RUN_FAILED)
                }
            })
        }
        Commands::Run(ref args) => run(&cli, args, &output).await,
    }
}

async fn run(cli: &Cli, args: &RunArgs, output: &Output) -> anyhow::Result<ExitCode> {
    let config = match load_config(args) {
        Ok(config) => config,
        Err(e) => {
            output.error(&e.to_string());
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    init_tracing(cli.verbose, &config.log_level, cli.log_format);

    let coordinator = match ResearchCoordinator::from_config(&config).await {
        Ok(coordinator) => coordinator,
        Err(e) => {
            output.error(&e.to_string());
            if matches!(e, AppError::Config(_)) && !config.offline {
                output.hint("Set the API key in the environment or .env, or run without network access:");
                output.command(&format!("ares-research run --offline \"{}\"", args.question));
            }
            return Ok(ExitCode::from(EXIT_CONFIG));
        }
    };

    if !args.json {
        if config.offline {
            output.info("Offline mode: using stub completion and search");
        }
        output.info(&format!("Dispatching research tasks: {}", coordinator.dispatcher_name()));
    }

    match coordinator.run(&args.question).await {
        Ok(report) => {
            if args.json {
                let text = serde_json::to_string_pretty(&report)
                    .context("failed to serialize report")?;
                println!("{}", text);
            } else {
                output.report(&report);
                let unresolved = report.unresolved().count();
                if unresolved > 0 {
                    output.warning(&format!(
                        "{} sub-question(s) could not be resolved",
                        unresolved
                    ));
                } else {
                    output.success("All sub-questions resolved");
                }
            }
            Ok(ExitCode::SUCCESS)
        }
        Err(failure) => {
            if args.json {
                let value = json!({
                    "error": failure.error.to_string(),
                    "phase": failure.phase,
                    "partial": failure.partial,
                });
                let text = serde_json::to_string_pretty(&value)
                    .context("failed to serialize run failure")?;
                println!("{}", text);
            } else {
                output.failure(&failure);
            }
            Ok(ExitCode::from(EXIT_RUN_FAILED))
        }
    }
}

/// An explicitly named config file must exist; the default one may not.
fn load_config(args: &RunArgs) -> Result<ResearchConfig, ConfigError> {
    let (path, explicit) = args.config_path();
    let mut config = if explicit {
        ResearchConfig::load(&path)?
    } else {
        ResearchConfig::load_or_default(&path)?
    };

    args.apply_to(&mut config);
    config.validate()?;
    Ok(config)
}

/// RUST_LOG wins, then --verbose, then the configured level.
fn init_tracing(verbose: bool, log_level: &str, format: LogFormat) {
    let fallback = if verbose { "debug" } else { log_level };
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(fallback))
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr);

    let _ = match format {
        LogFormat::Text => builder.try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
}
