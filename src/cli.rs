use clap::{Args, Parser, Subcommand};
use clap_complete::Shell;
use std::path::PathBuf;

#[derive(Parser)]
#[command(name = "pulse8")]
#[command(version)]
#[command(about = "Manage local pulse8 development environments", long_about = None)]
#[command(propagate_version = true)]
pub struct Cli {
    /// Verbosity level
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Suppress non-essential output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Manage k3d environments and what is deployed into them
    #[command(subcommand)]
    Env(EnvCommand),

    /// Check required tools, credentials and certificates
    Doctor,

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

// ============================================================================
// Environment Commands
// ============================================================================

#[derive(Subcommand)]
pub enum EnvCommand {
    /// Create a new environment and deploy a selection into it
    Create(CreateArgs),

    /// Change what is deployed into the current environment
    Update(SelectArgs),

    /// Delete an environment and its snapshot
    Delete {
        /// Environment identifier
        id: String,
    },

    /// List environments
    List,

    /// Stop all environments and start another one
    Switch {
        /// Environment identifier
        id: String,
    },

    /// Show what is deployed into an environment
    Show {
        /// Environment identifier (defaults to the current one)
        id: Option<String>,
    },
}

#[derive(Args)]
pub struct CreateArgs {
    /// Environment identifier (also the k3d cluster name)
    pub id: String,

    /// Start from the selection of another environment
    #[arg(long, conflicts_with = "from_file")]
    pub from_env: Option<String>,

    /// Start from a snapshot file
    #[arg(long)]
    pub from_file: Option<PathBuf>,

    #[command(flatten)]
    pub select: SelectArgs,
}

#[derive(Args, Default)]
pub struct SelectArgs {
    /// Infrastructure to deploy (comma-separated), skips the prompt
    #[arg(long, value_delimiter = ',')]
    pub infra: Option<Vec<String>>,

    /// Services to deploy (comma-separated), skips the prompt
    #[arg(long, value_delimiter = ',')]
    pub services: Option<Vec<String>>,

    /// Accept the preselection without prompting
    #[arg(short, long)]
    pub yes: bool,

    /// Show the plan without changing anything
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

impl SelectArgs {
    /// Whether the selection comes from flags instead of a prompt
    pub fn is_non_interactive(&self) -> bool {
        self.yes || self.infra.is_some() || self.services.is_some()
    }
}
