//! Project CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;

#[derive(Subcommand)]
pub enum ProjectCommands {
    /// Register a new project
    Add {
        /// Project name
        name: String,
    },

    /// List registered projects
    List,
}

pub fn run(cmd: ProjectCommands, output: &Output) -> Result<()> {
    match cmd {
        ProjectCommands::Add { name } => add_project(output, &name),
        ProjectCommands::List => list_projects(output),
    }
}

fn add_project(output: &Output, name: &str) -> Result<()> {
    let mut service = super::open_service()?;
    let project = service.create_project(name)?;

    if output.is_json() {
        output.data(&project);
    } else {
        output.success(&format!("Registered project {} ({})", project.id, project.name));
    }

    Ok(())
}

fn list_projects(output: &Output) -> Result<()> {
    let service = super::open_service()?;
    let projects = service.list_projects()?;

    if output.is_json() {
        output.data(&projects);
    } else if projects.is_empty() {
        println!("No projects registered.");
    } else {
        println!("{:<12} NAME", "ID");
        for project in projects {
            println!("{:<12} {}", project.id, project.name);
        }
    }

    Ok(())
}
