mod cli;
mod commands;
mod observability;
mod output;

use anyhow::Result;
use clap::Parser;
use velora_config::{Policy, load_config};

use cli::{Cli, Commands};
use commands::EXIT_CONFIG;
use output::print_error;

#[tokio::main]
async fn main() {
    match run().await {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            print_error(&format!("{e:#}"));
            std::process::exit(commands::EXIT_FAILED);
        }
    }
}

async fn run() -> Result<i32> {
    let cli = Cli::parse();

    let policy = match load(&cli) {
        Ok(policy) => policy,
        Err(e) => {
            print_error(&e.to_string());
            return Ok(EXIT_CONFIG);
        }
    };

    match &cli.command {
        Commands::Validate => Ok(commands::validate::validate(&policy)),
        Commands::Reconcile(args) => commands::reconcile::reconcile(policy, args).await,
    }
}

/// Logging comes up between reading the document and validating it so
/// validation problems are logged with the configured subscriber.
fn load(cli: &Cli) -> velora_config::Result<Policy> {
    let raw = load_config(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&raw.logging.level);
    observability::init_tracing(level, raw.logging.format);
    Policy::from_config(raw)
}
