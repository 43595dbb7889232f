mod cli;

use anyhow::Result;
use clap::{Parser, Subcommand};
use cli::handlers;
use std::path::PathBuf;
use triage_core::models::TriageConfig;
use triage_core::services::logging::init_logging;

#[derive(Parser)]
#[command(name = "triage")]
#[command(version)]
#[command(about = "Incident triage workflow over semantic runbook retrieval")]
struct Cli {
    /// Path to the TOML configuration file (defaults to the XDG location)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the runbook retrieval index from a directory of text files
    ///
    /// Every .md/.txt file under the source directory becomes one indexed
    /// chunk. Unreadable files are skipped; an empty corpus is a no-op.
    BuildIndex {
        /// Directory of runbook files
        #[arg(short, long)]
        source: PathBuf,

        /// Artifact output directory (defaults to the configured one)
        #[arg(long)]
        artifacts: Option<PathBuf>,
    },

    /// Run an incident through the triage workflow
    ///
    /// Prints one JSON state snapshot per executed step. By default the
    /// human gate synthesizes an immediate approval; with --wait-approval
    /// the thread parks at the gate and `triage resume` completes it.
    Run {
        /// Path to the incident JSON file
        #[arg(short, long)]
        incident: PathBuf,

        /// Workflow thread id (defaults to the incident id)
        #[arg(long)]
        thread: Option<String>,

        /// Park at the human gate instead of synthesizing an approval
        #[arg(long)]
        wait_approval: bool,
    },

    /// Resume a parked thread with a human decision
    Resume {
        /// Workflow thread id
        #[arg(long)]
        thread: String,

        /// Deny the remediation instead of approving it
        #[arg(long)]
        deny: bool,

        /// Approver identity recorded with the decision
        #[arg(long, default_value = "cli-operator")]
        approver: String,

        /// Free-text comment from the approver
        #[arg(long)]
        comment: Option<String>,
    },

    /// Show the persisted state and transition history of a thread
    Status {
        /// Workflow thread id
        #[arg(long)]
        thread: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => TriageConfig::default_config_path()
            .map_err(|e| anyhow::anyhow!("failed to resolve config path: {}", e))?,
    };
    let config = TriageConfig::load_from_file(&config_path)
        .map_err(|e| anyhow::anyhow!("failed to load config {}: {}", config_path.display(), e))?;
    if let Err(errors) = config.validate() {
        anyhow::bail!("invalid configuration: {}", errors.join("; "));
    }

    let _ = init_logging(config.log_level.clone());

    match cli.command {
        Commands::BuildIndex { source, artifacts } => {
            handlers::handle_build_index(&config, &source, artifacts.as_deref())
        }
        Commands::Run {
            incident,
            thread,
            wait_approval,
        } => handlers::handle_run(&config, &incident, thread, wait_approval).await,
        Commands::Resume {
            thread,
            deny,
            approver,
            comment,
        } => handlers::handle_resume(&config, &thread, !deny, approver, comment).await,
        Commands::Status { thread } => handlers::handle_status(&config, &thread),
    }
}
