//! Main CLI application structure

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{dep_cmd, project_cmd, query, task_cmd};
use crate::storage::Workspace;

#[derive(Parser)]
#[command(name = "trellis")]
#[command(author, version, about = "Collaborative task backend with dependency ordering")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format
    #[arg(long, short = 'f', global = true, default_value = "text")]
    pub format: OutputFormat,

    /// Enable verbose output for debugging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Initialize a new trellis workspace
    Init {
        /// Path to initialize (defaults to current directory)
        #[arg(default_value = ".")]
        path: String,
    },

    /// Manage projects
    #[command(subcommand)]
    Project(project_cmd::ProjectCommands),

    /// Manage tasks
    #[command(subcommand)]
    Task(task_cmd::TaskCommands),

    /// Manage dependency edges between tasks
    #[command(subcommand)]
    Dep(dep_cmd::DepCommands),

    /// Show tasks with no unfinished predecessors
    Ready {
        /// Project ID
        project: String,
    },

    /// Show tasks held back by unfinished predecessors
    Blocked {
        /// Project ID
        project: String,
    },

    /// Audit the stored dependency graph for cycles
    Check,
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    let output = Output::new(cli.format, cli.verbose);

    match cli.command {
        Commands::Init { path } => {
            output.verbose_ctx("init", &format!("Initializing workspace at: {}", path));
            let workspace = Workspace::init(&path)?;
            output.success(&format!(
                "Initialized trellis workspace at {}",
                workspace.root().display()
            ));
            Ok(())
        }

        Commands::Project(cmd) => project_cmd::run(cmd, &output),
        Commands::Task(cmd) => task_cmd::run(cmd, &output),
        Commands::Dep(cmd) => dep_cmd::run(cmd, &output),

        Commands::Ready { project } => query::ready(&output, &project),
        Commands::Blocked { project } => query::blocked(&output, &project),
        Commands::Check => query::check(&output),
    }
}
