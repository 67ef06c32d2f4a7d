use crate::error::{Result, SpecflowError};
use crate::types::TaskStatus;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub story_ref: Option<String>,
    #[serde(default)]
    pub requirement_refs: BTreeSet<String>,
    #[serde(default)]
    pub file_paths: Vec<String>,
    #[serde(default, skip_serializing_if = "BTreeSet::is_empty")]
    pub depends_on: BTreeSet<String>,
    #[serde(default = "default_status")]
    pub status: TaskStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub blocker: Option<String>,
}

fn default_status() -> TaskStatus {
    TaskStatus::Todo
}

impl Task {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            story_ref: None,
            requirement_refs: BTreeSet::new(),
            file_paths: Vec::new(),
            depends_on: BTreeSet::new(),
            status: TaskStatus::Todo,
            blocker: None,
        }
    }
}

// ---------------------------------------------------------------------------
// Task list operations (status is the only mutable field of a task)
// ---------------------------------------------------------------------------

pub fn set_status(tasks: &mut [Task], id: &str, status: TaskStatus) -> Result<()> {
    let task = find_mut(tasks, id)?;
    task.status = status;
    if status != TaskStatus::Blocked {
        task.blocker = None;
    }
    Ok(())
}

pub fn block_task(tasks: &mut [Task], id: &str, reason: impl Into<String>) -> Result<()> {
    let task = find_mut(tasks, id)?;
    task.status = TaskStatus::Blocked;
    task.blocker = Some(reason.into());
    Ok(())
}

/// Return the next todo or in-progress task that has no unfinished dependencies.
pub fn next_task(tasks: &[Task]) -> Option<&Task> {
    let done: HashSet<&str> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .map(|t| t.id.as_str())
        .collect();

    tasks.iter().find(|t| {
        matches!(t.status, TaskStatus::Todo | TaskStatus::InProgress)
            && t.depends_on.iter().all(|dep| done.contains(dep.as_str()))
    })
}

/// Human-readable summary: "3/5 done, 1 in progress, 1 blocked"
pub fn summarize(tasks: &[Task]) -> String {
    let total = tasks.len();
    let count = |s: TaskStatus| tasks.iter().filter(|t| t.status == s).count();
    format!(
        "{}/{total} done, {} in progress, {} blocked",
        count(TaskStatus::Done),
        count(TaskStatus::InProgress),
        count(TaskStatus::Blocked)
    )
}

/// Structural problems in a task list: duplicate ids, dangling or cyclic dependencies.
pub fn structural_violations(tasks: &[Task]) -> Vec<String> {
    let mut violations = Vec::new();
    let mut seen = HashSet::new();
    for t in tasks {
        if !seen.insert(t.id.as_str()) {
            violations.push(format!("duplicate task id '{}'", t.id));
        }
    }
    for t in tasks {
        for dep in &t.depends_on {
            if !seen.contains(dep.as_str()) {
                violations.push(format!("task '{}' depends on unknown task '{dep}'", t.id));
            }
        }
    }
    if let Some(cycle) = dependency_cycle(tasks) {
        violations.push(format!("task dependency cycle: {}", cycle.join(" -> ")));
    }
    violations
}

fn dependency_cycle(tasks: &[Task]) -> Option<Vec<String>> {
    #[derive(Clone, Copy, PartialEq)]
    enum Mark {
        Visiting,
        Done,
    }

    fn visit<'a>(
        id: &'a str,
        deps: &HashMap<&'a str, &'a BTreeSet<String>>,
        marks: &mut HashMap<&'a str, Mark>,
        stack: &mut Vec<&'a str>,
    ) -> Option<Vec<String>> {
        match marks.get(id) {
            Some(Mark::Done) => return None,
            Some(Mark::Visiting) => {
                let start = stack.iter().position(|s| *s == id).unwrap_or(0);
                let mut cycle: Vec<String> = stack[start..].iter().map(|s| s.to_string()).collect();
                cycle.push(id.to_string());
                return Some(cycle);
            }
            None => {}
        }
        marks.insert(id, Mark::Visiting);
        stack.push(id);
        if let Some(&next) = deps.get(id) {
            for dep in next {
                if deps.contains_key(dep.as_str()) {
                    if let Some(c) = visit(dep.as_str(), deps, marks, stack) {
                        return Some(c);
                    }
                }
            }
        }
        stack.pop();
        marks.insert(id, Mark::Done);
        None
    }

    let deps: HashMap<&str, &BTreeSet<String>> =
        tasks.iter().map(|t| (t.id.as_str(), &t.depends_on)).collect();
    let mut marks = HashMap::new();
    for t in tasks {
        let mut stack = Vec::new();
        if let Some(c) = visit(t.id.as_str(), &deps, &mut marks, &mut stack) {
            return Some(c);
        }
    }
    None
}

fn find_mut<'a>(tasks: &'a mut [Task], id: &str) -> Result<&'a mut Task> {
    tasks
        .iter_mut()
        .find(|t| t.id == id)
        .ok_or_else(|| SpecflowError::TaskNotFound(id.to_string()))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    fn task(id: &str, deps: &[&str]) -> Task {
        let mut t = Task::new(id, format!("task {id}"));
        t.depends_on = deps.iter().map(|d| d.to_string()).collect();
        t
    }

    #[test]
    fn status_updates() {
        let mut tasks = vec![task("T001", &[])];
        set_status(&mut tasks, "T001", TaskStatus::InProgress).unwrap();
        assert_eq!(tasks[0].status, TaskStatus::InProgress);

        block_task(&mut tasks, "T001", "waiting for infra").unwrap();
        assert_eq!(tasks[0].blocker.as_deref(), Some("waiting for infra"));

        set_status(&mut tasks, "T001", TaskStatus::Done).unwrap();
        assert!(tasks[0].blocker.is_none());
    }

    #[test]
    fn task_not_found() {
        let mut tasks: Vec<Task> = Vec::new();
        assert!(matches!(
            set_status(&mut tasks, "T099", TaskStatus::Done),
            Err(SpecflowError::TaskNotFound(_))
        ));
    }

    #[test]
    fn next_task_respects_deps() {
        let mut tasks = vec![task("T001", &[]), task("T002", &["T001"])];
        tasks[0].status = TaskStatus::Blocked;
        assert!(next_task(&tasks).is_none());

        tasks[0].status = TaskStatus::Done;
        assert_eq!(next_task(&tasks).unwrap().id, "T002");
    }

    #[test]
    fn summary_counts() {
        let mut tasks = vec![task("T001", &[]), task("T002", &[]), task("T003", &[])];
        tasks[0].status = TaskStatus::Done;
        tasks[1].status = TaskStatus::Blocked;
        assert_eq!(summarize(&tasks), "1/3 done, 0 in progress, 1 blocked");
    }

    #[test]
    fn detects_dangling_and_duplicate() {
        let tasks = vec![task("T001", &["T009"]), task("T001", &[])];
        let v = structural_violations(&tasks);
        assert!(v.iter().any(|m| m.contains("duplicate task id 'T001'")));
        assert!(v.iter().any(|m| m.contains("unknown task 'T009'")));
    }

    #[test]
    fn detects_cycle() {
        let tasks = vec![task("T001", &["T003"]), task("T002", &["T001"]), task("T003", &["T002"])];
        let v = structural_violations(&tasks);
        assert_eq!(v.len(), 1);
        assert!(v[0].starts_with("task dependency cycle"));
    }

    #[test]
    fn acyclic_list_is_clean() {
        let tasks = vec![task("T001", &[]), task("T002", &["T001"]), task("T003", &["T001", "T002"])];
        assert!(structural_violations(&tasks).is_empty());
    }
}
