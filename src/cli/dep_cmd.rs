//! Dependency edge CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::{DependencyType, TaskRef};
use crate::service::Direction;

/// Listing direction argument
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum DirectionArg {
    /// Edges pointing at the task (what it waits for)
    Preds,
    /// Edges leaving the task (what waits for it)
    Succs,
    /// Every edge touching the task
    #[default]
    All,
}

impl From<DirectionArg> for Direction {
    fn from(arg: DirectionArg) -> Self {
        match arg {
            DirectionArg::Preds => Direction::Predecessors,
            DirectionArg::Succs => Direction::Successors,
            DirectionArg::All => Direction::Either,
        }
    }
}

#[derive(Subcommand)]
pub enum DepCommands {
    /// Declare that one task must finish before another
    Add {
        /// Predecessor task key (must finish first)
        pred: String,

        /// Successor task key (blocked until then)
        succ: String,

        /// Dependency tag (defaults to the workspace default, usually "blocks")
        #[arg(long = "type", short = 't')]
        dep_type: Option<String>,
    },

    /// Remove a dependency edge
    Rm {
        /// Predecessor task key
        pred: String,

        /// Successor task key
        succ: String,
    },

    /// List edges around a task
    List {
        /// Task key
        key: String,

        /// Which edges to list
        #[arg(long, short, value_enum, default_value = "all")]
        direction: DirectionArg,

        /// Sort field (created, type, number); unknown fields use creation order
        #[arg(long)]
        sort: Option<String>,

        /// Sort in descending order
        #[arg(long)]
        desc: bool,

        /// Only show edges with this tag
        #[arg(long = "type", short = 't')]
        dep_type: Option<String>,
    },
}

pub fn run(cmd: DepCommands, output: &Output) -> Result<()> {
    match cmd {
        DepCommands::Add {
            pred,
            succ,
            dep_type,
        } => add_dependency(output, &pred, &succ, dep_type.as_deref()),
        DepCommands::Rm { pred, succ } => remove_dependency(output, &pred, &succ),
        DepCommands::List {
            key,
            direction,
            sort,
            desc,
            dep_type,
        } => list_dependencies(
            output,
            &key,
            direction,
            sort.as_deref(),
            desc,
            dep_type.as_deref(),
        ),
    }
}

fn add_dependency(
    output: &Output,
    pred_str: &str,
    succ_str: &str,
    dep_type_str: Option<&str>,
) -> Result<()> {
    let pred: TaskRef = pred_str.parse()?;
    let succ: TaskRef = succ_str.parse()?;

    let workspace = super::open_workspace()?;
    let dep_type = match dep_type_str {
        Some(tag) => tag.parse::<DependencyType>()?,
        None => DependencyType::new(&workspace.config().defaults.dependency_type)?,
    };

    let mut service = super::service_for(&workspace)?;
    let edge = service.add_dependency(&pred, &succ, &dep_type)?;

    if output.is_json() {
        output.data(&edge);
    } else {
        output.success(&format!(
            "{} now depends on {} ({})",
            edge.successor, edge.predecessor, edge.dep_type
        ));
    }

    Ok(())
}

fn remove_dependency(output: &Output, pred_str: &str, succ_str: &str) -> Result<()> {
    let pred: TaskRef = pred_str.parse()?;
    let succ: TaskRef = succ_str.parse()?;

    let mut service = super::open_service()?;

    if service.remove_dependency(&pred, &succ)? {
        output.success(&format!("Removed dependency {} -> {}", pred, succ));
    } else {
        output.success(&format!("No dependency {} -> {}", pred, succ));
    }

    Ok(())
}

fn list_dependencies(
    output: &Output,
    key: &str,
    direction: DirectionArg,
    sort: Option<&str>,
    desc: bool,
    dep_type_str: Option<&str>,
) -> Result<()> {
    let task: TaskRef = key.parse()?;
    let filter = dep_type_str
        .map(|tag| tag.parse::<DependencyType>())
        .transpose()?;

    let service = super::open_service()?;
    let edges = service.list_dependencies(&task, direction.into(), sort, desc, filter.as_ref())?;

    if output.is_json() {
        output.data(&edges);
    } else if edges.is_empty() {
        println!("No dependencies.");
    } else {
        println!("{:<16} {:<16} TYPE", "PRED", "SUCC");
        for edge in edges {
            println!(
                "{:<16} {:<16} {}",
                edge.predecessor.to_string(),
                edge.successor.to_string(),
                edge.dep_type
            );
        }
    }

    Ok(())
}
