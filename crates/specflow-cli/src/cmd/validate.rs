use super::phase;
use crate::output::print_json;
use anyhow::Context;
use specflow_core::transition::TransitionEngine;
use specflow_core::types::{ArtifactId, ArtifactKind};
use specflow_core::SpecflowError;
use std::path::Path;

pub fn run(root: &Path, tasks: Option<&str>, json: bool) -> anyhow::Result<()> {
    let engine = phase::open(root)?;
    let tasks_id = resolve_tasks(&engine, tasks)?;
    let report = engine
        .validate(&tasks_id)
        .with_context(|| format!("failed to validate {tasks_id}"))?;

    if json {
        print_json(&report)?;
    } else {
        print!("{}", report.to_markdown());
    }

    if !report.passed() {
        return Err(SpecflowError::Validation {
            subject: tasks_id.to_string(),
            violations: vec![format!(
                "report status is {} at {:.1}% coverage",
                report.status,
                report.coverage.ratio * 100.0
            )],
        }
        .into());
    }
    Ok(())
}

/// `--tasks`, else the newest completed Tasks artifact.
pub fn resolve_tasks(engine: &TransitionEngine, explicit: Option<&str>) -> anyhow::Result<ArtifactId> {
    if let Some(raw) = explicit {
        return phase::parse_id(raw);
    }
    let latest = engine
        .store()
        .latest_completed(ArtifactKind::Tasks)
        .context("failed to scan task lists")?;
    match latest {
        Some(a) => Ok(a.id),
        None => Err(SpecflowError::Link {
            subject: ArtifactKind::Tasks.to_string(),
            violations: vec!["no completed task list exists yet; run 'specflow tasks' first".to_string()],
        }
        .into()),
    }
}
