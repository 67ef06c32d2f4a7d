use crate::artifact::{Artifact, ArtifactDraft};
use crate::config::Config;
use crate::document;
use crate::error::{Result, SpecflowError};
use crate::gate::{self, GateEngine};
use crate::numbering::NumberingService;
use crate::paths;
use crate::report::{self, ReportInput, ValidationReport};
use crate::store::ArtifactStore;
use crate::structure;
use crate::task::{self, Task};
use crate::trace::TraceabilityGraph;
use crate::types::{ArtifactId, ArtifactKind, ArtifactStatus, Phase, TaskStatus};
use chrono::Utc;
use std::path::Path;
use std::sync::{PoisonError, RwLock, RwLockReadGuard};

/// The phase state machine over persisted artifacts.
///
/// Every precondition (structure, linkage, gates) is checked before an id is
/// allocated, so a rejected draft burns no sequence number and leaves nothing
/// on disk.
#[derive(Debug)]
pub struct TransitionEngine {
    store: ArtifactStore,
    numbering: NumberingService,
    gates: GateEngine,
    config: Config,
    graph: RwLock<TraceabilityGraph>,
}

impl TransitionEngine {
    pub fn open(root: &Path) -> Result<Self> {
        let config = Config::load(root)?;
        Self::with_config(root, config)
    }

    pub fn with_config(root: &Path, config: Config) -> Result<Self> {
        let store = ArtifactStore::new(root).with_leases(config.numbering.clone());
        let graph = TraceabilityGraph::from_artifacts(&store.list_all()?);
        Ok(Self {
            numbering: NumberingService::new(store.clone(), config.numbering.clone()),
            gates: GateEngine::with_defaults(config.gates.clone()),
            store,
            config,
            graph: RwLock::new(graph),
        })
    }

    pub fn store(&self) -> &ArtifactStore {
        &self.store
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn gates(&self) -> &GateEngine {
        &self.gates
    }

    pub fn graph(&self) -> RwLockReadGuard<'_, TraceabilityGraph> {
        self.graph.read().unwrap_or_else(PoisonError::into_inner)
    }

    // -----------------------------------------------------------------------
    // Promotion
    // -----------------------------------------------------------------------

    /// Validate, gate, number and persist `draft` as a completed artifact.
    pub fn promote(&self, draft: ArtifactDraft) -> Result<Artifact> {
        let artifact = self.promote_inner(draft, None)?;
        tracing::info!(id = %artifact.id, title = %artifact.title, "promoted");
        Ok(artifact)
    }

    fn promote_inner(&self, mut draft: ArtifactDraft, replacing: Option<ArtifactId>) -> Result<Artifact> {
        self.check_structure(&draft)?;
        // Held until the child is on disk so two writers cannot both pass the
        // one-completed-child check.
        let _parent_lease = match draft.parent {
            Some(p) if draft.kind.parent_kind().is_some() && !draft.kind.is_sub_artifact() => {
                Some(self.store.lock(&p)?)
            }
            _ => None,
        };
        let parent = self.check_parent(&draft, replacing)?;
        if draft.kind == ArtifactKind::Tasks {
            if let Some(parent) = &parent {
                self.check_task_links(&draft, parent)?;
            }
        }
        if draft.kind == ArtifactKind::Design {
            let results = self.gates.evaluate(&draft.sections);
            let failing = gate::unjustified(&results);
            if !failing.is_empty() {
                return Err(SpecflowError::GateFailure {
                    subject: subject(&draft),
                    gates: failing,
                });
            }
            draft.sections.gate_results = results;
        }
        self.check_encoding(&draft)?;

        let id = self.numbering.next_id(draft.kind)?;
        let artifact = self.persist(id, draft, ArtifactStatus::Completed)?;
        self.record(&artifact)?;
        Ok(artifact)
    }

    /// The Discovery no-go exit: persist the draft as `rejected`.
    pub fn reject(&self, draft: ArtifactDraft) -> Result<Artifact> {
        if draft.kind != ArtifactKind::Discovery {
            return Err(SpecflowError::Transition {
                from: draft.kind.phase().to_string(),
                to: Phase::Rejected.to_string(),
                reason: "only a discovery can be rejected".to_string(),
            });
        }
        self.check_structure(&draft)?;
        self.check_parent(&draft, None)?;
        self.check_encoding(&draft)?;
        let id = self.numbering.next_id(draft.kind)?;
        let artifact = self.persist(id, draft, ArtifactStatus::Rejected)?;
        tracing::info!(id = %artifact.id, "discovery rejected");
        Ok(artifact)
    }

    /// Promote `draft` as the replacement of `old`, then mark `old` superseded.
    ///
    /// `old` stays leased from the status check to the flip, so a second
    /// supersede of the same artifact waits and then sees it superseded.
    pub fn supersede(&self, old: &ArtifactId, mut draft: ArtifactDraft) -> Result<Artifact> {
        let _lease = self.store.lock(old)?;
        let previous = self.store.load(old)?;
        if !previous.is_completed() {
            return Err(SpecflowError::Transition {
                from: format!("{old} ({})", previous.status),
                to: ArtifactStatus::Superseded.to_string(),
                reason: "only a completed artifact can be superseded".to_string(),
            });
        }
        if draft.kind != previous.kind() {
            return Err(SpecflowError::Transition {
                from: old.to_string(),
                to: draft.kind.to_string(),
                reason: "a replacement must have the same kind".to_string(),
            });
        }
        if draft.parent.is_none() {
            draft.parent = previous.parent;
        }
        if !draft.sections.references.contains(old) {
            draft.sections.references.push(*old);
        }

        let replacement = self.promote_inner(draft, Some(*old))?;
        self.store.set_status_held(old, ArtifactStatus::Superseded)?;
        self.rebuild_graph()?;
        tracing::info!(old = %old, new = %replacement.id, "superseded");
        Ok(replacement)
    }

    fn persist(&self, id: ArtifactId, draft: ArtifactDraft, status: ArtifactStatus) -> Result<Artifact> {
        self.store.create(&assemble(id, draft, status))
    }

    fn record(&self, artifact: &Artifact) -> Result<()> {
        let spec = match artifact.kind() {
            ArtifactKind::Tasks => self.chain_spec(artifact)?.map(|s| s.id),
            _ => None,
        };
        let mut graph = self.graph.write().unwrap_or_else(PoisonError::into_inner);
        graph.record_links(artifact);
        graph.record_entities(artifact, spec);
        Ok(())
    }

    fn rebuild_graph(&self) -> Result<()> {
        let fresh = TraceabilityGraph::from_artifacts(&self.store.list_all()?);
        *self.graph.write().unwrap_or_else(PoisonError::into_inner) = fresh;
        Ok(())
    }

    // -----------------------------------------------------------------------
    // Preconditions
    // -----------------------------------------------------------------------

    fn check_structure(&self, draft: &ArtifactDraft) -> Result<()> {
        paths::validate_slug(&draft.slug())?;
        let violations = structure::violations(draft);
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SpecflowError::Validation {
                subject: subject(draft),
                violations,
            })
        }
    }

    /// Render the draft under a placeholder id and make sure it reads back
    /// unchanged, before a real id is spent on it.
    fn check_encoding(&self, draft: &ArtifactDraft) -> Result<()> {
        let provisional = assemble(ArtifactId::new(draft.kind, 1), draft.clone(), ArtifactStatus::Completed);
        document::encode(&provisional).map(|_| ()).map_err(|reason| SpecflowError::Validation {
            subject: subject(draft),
            violations: vec![reason],
        })
    }

    /// Resolve and vet the draft's parent. `replacing` is excluded from the
    /// one-completed-child-per-parent rule.
    fn check_parent(&self, draft: &ArtifactDraft, replacing: Option<ArtifactId>) -> Result<Option<Artifact>> {
        let kind = draft.kind;
        let transition = |reason: String| SpecflowError::Transition {
            from: draft
                .parent
                .map(|p| p.kind.phase().to_string())
                .unwrap_or_else(|| "none".to_string()),
            to: kind.phase().to_string(),
            reason,
        };
        let link = |violation: String| SpecflowError::Link {
            subject: subject(draft),
            violations: vec![violation],
        };

        let Some(expected) = kind.parent_kind() else {
            return match draft.parent {
                Some(p) => Err(transition(format!("a discovery starts a chain and cannot name parent {p}"))),
                None => Ok(None),
            };
        };
        let parent_id = draft
            .parent
            .ok_or_else(|| link(format!("a {kind} requires a parent {expected}")))?;

        if parent_id.kind == ArtifactKind::Tasks {
            return Err(transition(format!(
                "{parent_id} is a task list; a chain continues only into validation"
            )));
        }
        if parent_id.kind != expected {
            return Err(transition(format!(
                "a {kind} must follow a {expected}, not a {}",
                parent_id.kind
            )));
        }

        let parent = self
            .store
            .find(&parent_id)?
            .ok_or_else(|| link(format!("parent {parent_id} does not exist")))?;
        match parent.status {
            ArtifactStatus::Completed => {}
            ArtifactStatus::Rejected => {
                return Err(transition(format!("{parent_id} was rejected; the chain is closed")));
            }
            status => return Err(link(format!("parent {parent_id} is {status}, not completed"))),
        }

        if !kind.is_sub_artifact() {
            let existing = self.store.children(&parent_id)?.into_iter().find(|c| {
                c.kind() == kind && c.is_completed() && Some(c.id) != replacing
            });
            if let Some(existing) = existing {
                return Err(transition(format!(
                    "{parent_id} already has {}; use supersede to replace it",
                    existing.id
                )));
            }
        }
        Ok(Some(parent))
    }

    fn check_task_links(&self, draft: &ArtifactDraft, plan: &Artifact) -> Result<()> {
        let Some(spec) = self.chain_spec(plan)? else {
            return Err(SpecflowError::Link {
                subject: subject(draft),
                violations: vec![format!("{} does not lead back to a spec", plan.id)],
            });
        };
        let mut violations = Vec::new();
        for t in &draft.sections.tasks {
            for r in &t.requirement_refs {
                if spec.sections.requirement(r).is_none() {
                    violations.push(format!("task '{}' references unknown requirement {}/{r}", t.id, spec.id));
                }
            }
            if let Some(story) = &t.story_ref {
                if spec.sections.story(story).is_none() {
                    violations.push(format!("task '{}' references unknown story {}/{story}", t.id, spec.id));
                }
            }
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(SpecflowError::Link {
                subject: subject(draft),
                violations,
            })
        }
    }

    /// The Spec heading `artifact`'s chain, loaded from disk.
    fn chain_spec(&self, artifact: &Artifact) -> Result<Option<Artifact>> {
        let mut current = artifact.clone();
        loop {
            if current.kind() == ArtifactKind::Spec {
                return Ok(Some(current));
            }
            let Some(parent) = current.parent else {
                return Ok(None);
            };
            match self.store.find(&parent)? {
                Some(p) => current = p,
                None => return Ok(None),
            }
        }
    }

    // -----------------------------------------------------------------------
    // Validation
    // -----------------------------------------------------------------------

    /// Tasks → Validated: build the report for a completed Tasks artifact and persist it.
    pub fn validate(&self, tasks_id: &ArtifactId) -> Result<ValidationReport> {
        let tasks = self.store.load(tasks_id)?;
        if tasks.kind() != ArtifactKind::Tasks || !tasks.is_completed() {
            return Err(SpecflowError::Transition {
                from: format!("{tasks_id} ({})", tasks.status),
                to: Phase::Validated.to_string(),
                reason: "only a completed Tasks artifact can be validated".to_string(),
            });
        }
        let plan = self.load_parent(&tasks)?;
        let design = self.load_parent(&plan)?;
        let spec = self.load_parent(&design)?;
        let stale: Vec<String> = [&plan, &design, &spec]
            .into_iter()
            .filter(|a| !a.is_completed())
            .map(|a| format!("ancestor {} is {}, not completed", a.id, a.status))
            .collect();
        if !stale.is_empty() {
            return Err(SpecflowError::Link {
                subject: tasks_id.to_string(),
                violations: stale,
            });
        }
        let adrs: Vec<Artifact> = self
            .store
            .children(&design.id)?
            .into_iter()
            .filter(|a| a.kind() == ArtifactKind::Adr && a.is_completed())
            .collect();

        let report = {
            let graph = self.graph();
            let input = ReportInput {
                spec: &spec,
                design: &design,
                adrs: &adrs,
                plan: &plan,
                tasks: &tasks,
                graph: &graph,
            };
            report::generate(&input, &self.config.validation)
        };
        let path = self.store.save_report(&report)?;
        tracing::info!(
            tasks = %tasks_id,
            status = %report.status,
            coverage = report.coverage.ratio,
            path = %path.display(),
            "validation report written"
        );
        Ok(report)
    }

    fn load_parent(&self, artifact: &Artifact) -> Result<Artifact> {
        let parent = artifact.parent.ok_or_else(|| SpecflowError::Link {
            subject: artifact.id.to_string(),
            violations: vec!["no parent recorded".to_string()],
        })?;
        self.store.find(&parent)?.ok_or_else(|| SpecflowError::Link {
            subject: artifact.id.to_string(),
            violations: vec![format!("parent {parent} does not exist")],
        })
    }

    /// Where in the chain `id` stands.
    pub fn phase_of(&self, id: &ArtifactId) -> Result<Phase> {
        let artifact = self.store.load(id)?;
        Ok(match artifact.kind() {
            ArtifactKind::Discovery if artifact.status == ArtifactStatus::Rejected => Phase::Rejected,
            ArtifactKind::Tasks
                if self
                    .store
                    .load_report(id)?
                    .map(|r| r.passed())
                    .unwrap_or(false) =>
            {
                Phase::Validated
            }
            kind => kind.phase(),
        })
    }

    // -----------------------------------------------------------------------
    // Task status
    // -----------------------------------------------------------------------

    pub fn set_task_status(&self, tasks_id: &ArtifactId, task_id: &str, status: TaskStatus) -> Result<Task> {
        let updated = self
            .store
            .update_tasks(tasks_id, |tasks| task::set_status(tasks, task_id, status))?;
        tracing::info!(tasks = %tasks_id, task = task_id, status = %status, "task updated");
        find_task(updated, task_id)
    }

    pub fn block_task(&self, tasks_id: &ArtifactId, task_id: &str, reason: &str) -> Result<Task> {
        let updated = self
            .store
            .update_tasks(tasks_id, |tasks| task::block_task(tasks, task_id, reason))?;
        tracing::info!(tasks = %tasks_id, task = task_id, reason, "task blocked");
        find_task(updated, task_id)
    }

    pub fn next_task(&self, tasks_id: &ArtifactId) -> Result<Option<Task>> {
        let artifact = self.store.load(tasks_id)?;
        Ok(task::next_task(&artifact.sections.tasks).cloned())
    }
}

fn find_task(artifact: Artifact, task_id: &str) -> Result<Task> {
    artifact
        .sections
        .tasks
        .into_iter()
        .find(|t| t.id == task_id)
        .ok_or_else(|| SpecflowError::TaskNotFound(task_id.to_string()))
}

fn assemble(id: ArtifactId, draft: ArtifactDraft, status: ArtifactStatus) -> Artifact {
    let now = Utc::now();
    Artifact {
        id,
        status,
        parent: draft.parent,
        slug: draft.slug(),
        title: draft.title.trim().to_string(),
        created: now.date_naive(),
        updated_at: now,
        sections: draft.sections,
    }
}

fn subject(draft: &ArtifactDraft) -> String {
    format!("{} '{}'", draft.kind, draft.title.trim())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
