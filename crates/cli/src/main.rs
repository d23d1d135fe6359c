//! Stepwise CLI: the main entry point.
//!
//! Commands:
//! - `run`: Drive a goal through the plan-execute-reflect loop
//! - `config`: Show, locate or validate configuration

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "stepwise",
    about = "Stepwise: plan, execute, reflect, replan",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a goal through the orchestrator
    Run {
        /// The goal to achieve
        goal: String,

        /// Maximum execution passes (overrides config)
        #[arg(long, env = "STEPWISE_MAX_ATTEMPTS")]
        max_attempts: Option<u32>,

        /// Reflection score that accepts a result, 0.0–1.0 (overrides config)
        #[arg(long)]
        threshold: Option<f64>,

        /// Model to use (overrides config)
        #[arg(short, long)]
        model: Option<String>,

        /// Print the recorded trace as JSON after the result
        #[arg(long)]
        trace_json: bool,
    },

    /// Configuration management
    Config {
        #[command(subcommand)]
        action: Option<ConfigAction>,
    },
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Print the default configuration
    Default,
    /// Print the effective configuration
    Show,
    /// Print the config file path
    Path,
    /// Validate the config file
    Validate,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run {
            goal,
            max_attempts,
            threshold,
            model,
            trace_json,
        } => {
            commands::run::run(commands::run::RunArgs {
                goal,
                max_attempts,
                threshold,
                model,
                trace_json,
            })
            .await?
        }
        Commands::Config { action } => match action.unwrap_or(ConfigAction::Default) {
            ConfigAction::Default => commands::config_cmd::default(),
            ConfigAction::Show => commands::config_cmd::show()?,
            ConfigAction::Path => commands::config_cmd::path(),
            ConfigAction::Validate => commands::config_cmd::validate()?,
        },
    }

    Ok(())
}
