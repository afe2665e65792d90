use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "velora")]
#[command(about = "Velora - hub-and-spoke network policy enforcement")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,

    /// Policy file, JSON or TOML (falls back to VELORA_CONFIG, then ./velora.json or ./velora.toml)
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Log level (overrides logging.level; RUST_LOG wins over both)
    #[arg(long, global = true)]
    pub log_level: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Table,
    Json,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Load and validate the policy
    Validate,
    /// Reconcile an offline topology snapshot against the policy
    Reconcile(ReconcileArgs),
}

#[derive(clap::Args)]
pub struct ReconcileArgs {
    /// Topology snapshot (JSON) to reconcile
    #[arg(short, long)]
    pub topology: PathBuf,

    /// Write the resulting topology to this file
    #[arg(long)]
    pub write_topology: Option<PathBuf>,

    /// Plan actions without applying them
    #[arg(long)]
    pub dry_run: bool,

    /// Scopes reconciled in parallel
    #[arg(long)]
    pub max_concurrency: Option<usize>,

    /// Whole-run deadline in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// Only reconcile these scopes (repeatable)
    #[arg(long = "scope")]
    pub scopes: Vec<String>,

    /// Report format
    #[arg(short, long, default_value = "table")]
    pub format: OutputFormat,
}
