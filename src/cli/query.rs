//! Query commands (ready, blocked, check)

use anyhow::Result;

use super::output::Output;
use super::task_cmd::print_task_table;
use crate::domain::ProjectId;

/// Show tasks with no unfinished predecessors
pub fn ready(output: &Output, project_str: &str) -> Result<()> {
    let project: ProjectId = project_str.parse()?;
    let service = super::open_service()?;

    let tasks = service.ready_tasks(&project)?;
    output.verbose_ctx("ready", &format!("Found {} ready tasks", tasks.len()));

    print_task_table(output, &tasks);
    Ok(())
}

/// Show tasks held back by unfinished predecessors
pub fn blocked(output: &Output, project_str: &str) -> Result<()> {
    let project: ProjectId = project_str.parse()?;
    let service = super::open_service()?;

    let tasks = service.blocked_tasks(&project)?;
    output.verbose_ctx("blocked", &format!("Found {} blocked tasks", tasks.len()));

    print_task_table(output, &tasks);
    Ok(())
}

/// Audit the stored graph for cycles
pub fn check(output: &Output) -> Result<()> {
    let service = super::open_service()?;
    let audit = service.check_integrity()?;

    if output.is_json() {
        output.data(&audit);
    } else if let Some(cycle) = &audit.cycle {
        let path: Vec<String> = cycle.iter().map(ToString::to_string).collect();
        println!("CYCLE FOUND: {}", path.join(" -> "));
        println!("{} tasks, {} edges", audit.tasks, audit.edges);
    } else {
        println!(
            "Graph is acyclic: {} tasks, {} edges",
            audit.tasks, audit.edges
        );
    }

    Ok(())
}
