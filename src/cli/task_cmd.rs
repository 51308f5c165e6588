//! Task CLI commands

use anyhow::Result;
use clap::Subcommand;

use super::output::Output;
use crate::domain::{NewTask, ProjectId, Task, TaskRef, TaskStatus};

#[derive(Subcommand)]
pub enum TaskCommands {
    /// Create a task in a project
    Add {
        /// Project ID
        project: String,

        /// Task title
        title: String,

        /// Optional description
        #[arg(long, short)]
        description: Option<String>,
    },

    /// Show task details
    Show {
        /// Task key ({project}.{number})
        key: String,
    },

    /// List a project's tasks
    List {
        /// Project ID
        project: String,
    },

    /// Mark a task as done
    Done {
        /// Task key
        key: String,
    },

    /// Soft-archive a task (its key and edges survive until deletion)
    Archive {
        /// Task key
        key: String,
    },

    /// Delete a task, cascading to every edge that references it
    Delete {
        /// Task key
        key: String,
    },
}

pub fn run(cmd: TaskCommands, output: &Output) -> Result<()> {
    match cmd {
        TaskCommands::Add {
            project,
            title,
            description,
        } => add_task(output, &project, &title, description),
        TaskCommands::Show { key } => show_task(output, &key),
        TaskCommands::List { project } => list_tasks(output, &project),
        TaskCommands::Done { key } => set_status(output, &key, TaskStatus::Done),
        TaskCommands::Archive { key } => set_status(output, &key, TaskStatus::Archived),
        TaskCommands::Delete { key } => delete_task(output, &key),
    }
}

fn add_task(
    output: &Output,
    project_str: &str,
    title: &str,
    description: Option<String>,
) -> Result<()> {
    let project: ProjectId = project_str.parse()?;
    let mut new_task = NewTask::new(title);
    new_task.description = description;

    let mut service = super::open_service()?;
    let task = service.create_task(&project, &new_task)?;

    if output.is_json() {
        output.data(&task);
    } else {
        output.success(&format!("Created task {}: {}", task.key, task.title));
    }

    Ok(())
}

fn show_task(output: &Output, key: &str) -> Result<()> {
    let task_ref: TaskRef = key.parse()?;
    let service = super::open_service()?;
    let task = service.get_task(&task_ref)?;

    if output.is_json() {
        output.data(&task);
    } else {
        println!("{} [{}] {}", task.key, task.status, task.title);
        if let Some(description) = &task.description {
            output.blank();
            println!("{}", description);
        }
    }

    Ok(())
}

fn list_tasks(output: &Output, project_str: &str) -> Result<()> {
    let project: ProjectId = project_str.parse()?;
    let service = super::open_service()?;
    let tasks = service.list_tasks(&project)?;

    print_task_table(output, &tasks);
    Ok(())
}

fn set_status(output: &Output, key: &str, status: TaskStatus) -> Result<()> {
    let task_ref: TaskRef = key.parse()?;
    let mut service = super::open_service()?;
    service.set_task_status(&task_ref, status)?;

    output.success(&format!("Task {} is now {}", task_ref, status));
    Ok(())
}

fn delete_task(output: &Output, key: &str) -> Result<()> {
    let task_ref: TaskRef = key.parse()?;
    let mut service = super::open_service()?;

    if service.delete_task(&task_ref)? {
        output.success(&format!("Deleted task {} and its edges", task_ref));
    } else {
        output.success(&format!("Task {} does not exist", task_ref));
    }

    Ok(())
}

pub(super) fn print_task_table(output: &Output, tasks: &[Task]) {
    if output.is_json() {
        output.data(&tasks);
    } else if tasks.is_empty() {
        println!("No tasks.");
    } else {
        println!("{:<16} {:<12} TITLE", "KEY", "STATUS");
        for task in tasks {
            println!(
                "{:<16} {:<12} {}",
                task.key.to_string(),
                task.status.as_str(),
                task.title
            );
        }
    }
}
