use super::{phase, validate::resolve_tasks};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Subcommand;
use specflow_core::task::{self, Task};
use specflow_core::types::TaskStatus;
use std::path::Path;

#[derive(Subcommand)]
pub enum TaskSubcommand {
    /// List the tasks of a task list
    List {
        /// Tasks artifact (default: latest completed)
        #[arg(long)]
        tasks: Option<String>,
    },
    /// Mark a task in progress
    Start {
        task_id: String,
        #[arg(long)]
        tasks: Option<String>,
    },
    /// Mark a task done
    Done {
        task_id: String,
        #[arg(long)]
        tasks: Option<String>,
    },
    /// Mark a task blocked
    Block {
        task_id: String,
        /// Why the task cannot proceed
        #[arg(required = true)]
        reason: Vec<String>,
        #[arg(long)]
        tasks: Option<String>,
    },
    /// Show the next task whose dependencies are all done
    Next {
        #[arg(long)]
        tasks: Option<String>,
    },
}

pub fn run(root: &Path, subcmd: TaskSubcommand, json: bool) -> anyhow::Result<()> {
    let engine = phase::open(root)?;
    match subcmd {
        TaskSubcommand::List { tasks } => {
            let id = resolve_tasks(&engine, tasks.as_deref())?;
            let artifact = engine.store().load(&id)?;
            let list = &artifact.sections.tasks;
            if json {
                return print_json(&serde_json::json!({
                    "tasks_id": id,
                    "summary": task::summarize(list),
                    "tasks": list,
                }));
            }
            let rows = list
                .iter()
                .map(|t| {
                    vec![
                        t.id.clone(),
                        t.status.to_string(),
                        t.requirement_refs.iter().cloned().collect::<Vec<_>>().join(","),
                        t.title.clone(),
                    ]
                })
                .collect();
            print_table(&["ID", "STATUS", "REQUIREMENTS", "TITLE"], rows);
            println!();
            println!("{id}: {}", task::summarize(list));
            Ok(())
        }
        TaskSubcommand::Start { task_id, tasks } => {
            let id = resolve_tasks(&engine, tasks.as_deref())?;
            let t = engine
                .set_task_status(&id, &task_id, TaskStatus::InProgress)
                .with_context(|| format!("failed to start {task_id} in {id}"))?;
            print_task(&t, "Started", json)
        }
        TaskSubcommand::Done { task_id, tasks } => {
            let id = resolve_tasks(&engine, tasks.as_deref())?;
            let t = engine
                .set_task_status(&id, &task_id, TaskStatus::Done)
                .with_context(|| format!("failed to complete {task_id} in {id}"))?;
            print_task(&t, "Completed", json)
        }
        TaskSubcommand::Block {
            task_id,
            reason,
            tasks,
        } => {
            let id = resolve_tasks(&engine, tasks.as_deref())?;
            let t = engine
                .block_task(&id, &task_id, &reason.join(" "))
                .with_context(|| format!("failed to block {task_id} in {id}"))?;
            print_task(&t, "Blocked", json)
        }
        TaskSubcommand::Next { tasks } => {
            let id = resolve_tasks(&engine, tasks.as_deref())?;
            match engine.next_task(&id)? {
                Some(t) => print_task(&t, "Next", json),
                None if json => print_json(&serde_json::Value::Null),
                None => {
                    println!("No actionable task in {id}.");
                    Ok(())
                }
            }
        }
    }
}

fn print_task(t: &Task, verb: &str, json: bool) -> anyhow::Result<()> {
    if json {
        return print_json(t);
    }
    println!("{verb} [{}]: {}", t.id, t.title);
    if let Some(blocker) = &t.blocker {
        println!("  blocker: {blocker}");
    }
    Ok(())
}
