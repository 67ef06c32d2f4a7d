use crate::artifact::Artifact;
use crate::config::NumberingConfig;
use crate::document;
use crate::error::{Result, SpecflowError};
use crate::io::{acquire_lease, atomic_write, Lease};
use crate::paths;
use crate::report::ValidationReport;
use crate::task::Task;
use crate::types::{ArtifactId, ArtifactKind, ArtifactStatus};
use chrono::{DateTime, Utc};
use std::path::{Path, PathBuf};

/// Markdown-on-disk persistence for artifacts and validation reports.
///
/// Every write goes through [`atomic_write`], so readers see either the
/// previous file or the new one. Updates to an existing artifact run under
/// its `.specflow/locks/{id}.lock` lease.
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
    leases: NumberingConfig,
}

impl ArtifactStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            leases: NumberingConfig::default(),
        }
    }

    /// Lease timings; the numbering section of the config drives both.
    pub fn with_leases(mut self, leases: NumberingConfig) -> Self {
        self.leases = leases;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    // -----------------------------------------------------------------------
    // Writes
    // -----------------------------------------------------------------------

    /// Persist a new artifact. Fails if a file for its id already exists.
    pub fn create(&self, artifact: &Artifact) -> Result<Artifact> {
        paths::validate_slug(&artifact.slug)?;
        if let Some(existing) = self.path_of(&artifact.id)? {
            return Err(std::io::Error::new(
                std::io::ErrorKind::AlreadyExists,
                format!("{} already exists at {}", artifact.id, existing.display()),
            )
            .into());
        }
        let path = paths::artifact_path(&self.root, &artifact.id, &artifact.slug);
        self.write(&path, artifact)
    }

    /// Exclusive update rights on `id` until the lease drops.
    pub fn lock(&self, id: &ArtifactId) -> Result<Lease> {
        let path = paths::artifact_lock(&self.root, id);
        acquire_lease(&path, self.leases.lock_timeout(), self.leases.stale_after())?.ok_or_else(
            || SpecflowError::ArtifactBusy {
                id: id.to_string(),
                waited_ms: self.leases.lock_timeout_ms,
            },
        )
    }

    /// Move an artifact to `status`, enforcing the acyclic status machine.
    pub fn set_status(&self, id: &ArtifactId, status: ArtifactStatus) -> Result<Artifact> {
        let _lease = self.lock(id)?;
        self.set_status_held(id, status)
    }

    /// [`set_status`](Self::set_status) for a caller already holding the lease on `id`.
    pub(crate) fn set_status_held(&self, id: &ArtifactId, status: ArtifactStatus) -> Result<Artifact> {
        let (path, mut artifact) = self.load_with_path(id)?;
        if !artifact.status.can_become(status) {
            return Err(SpecflowError::Transition {
                from: format!("{id} ({})", artifact.status),
                to: status.to_string(),
                reason: "artifact status moves only draft → completed | rejected and completed → superseded"
                    .to_string(),
            });
        }
        artifact.status = status;
        self.write(&path, &artifact)
    }

    /// Apply `update` to the task list of a completed Tasks artifact.
    /// Task status is the only field callers are expected to touch.
    pub fn update_tasks<F>(&self, id: &ArtifactId, update: F) -> Result<Artifact>
    where
        F: FnOnce(&mut [Task]) -> Result<()>,
    {
        if id.kind != ArtifactKind::Tasks {
            return Err(SpecflowError::Transition {
                from: id.to_string(),
                to: "task update".to_string(),
                reason: "only Tasks artifacts carry a task list".to_string(),
            });
        }
        let _lease = self.lock(id)?;
        let (path, mut artifact) = self.load_with_path(id)?;
        if !artifact.is_completed() {
            return Err(SpecflowError::Transition {
                from: format!("{id} ({})", artifact.status),
                to: "task update".to_string(),
                reason: "tasks can only be updated on a completed artifact".to_string(),
            });
        }
        update(&mut artifact.sections.tasks)?;
        self.write(&path, &artifact)
    }

    /// Encode, prove the encoding decodes back to `artifact`, then write.
    fn write(&self, path: &Path, artifact: &Artifact) -> Result<Artifact> {
        let text = document::encode(artifact).map_err(|reason| SpecflowError::MalformedArtifact {
            path: path.display().to_string(),
            reason,
        })?;
        atomic_write(path, text.as_bytes())?;
        load_path(path)
    }

    // -----------------------------------------------------------------------
    // Reads
    // -----------------------------------------------------------------------

    pub fn path_of(&self, id: &ArtifactId) -> Result<Option<PathBuf>> {
        let dir = paths::kind_dir(&self.root, id.kind);
        if !dir.is_dir() {
            return Ok(None);
        }
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            if let Some((found, _)) = paths::parse_artifact_filename(&name.to_string_lossy()) {
                if found == *id {
                    return Ok(Some(entry.path()));
                }
            }
        }
        Ok(None)
    }

    pub fn find(&self, id: &ArtifactId) -> Result<Option<Artifact>> {
        match self.path_of(id)? {
            Some(path) => load_path(&path).map(Some),
            None => Ok(None),
        }
    }

    pub fn load(&self, id: &ArtifactId) -> Result<Artifact> {
        self.load_with_path(id).map(|(_, a)| a)
    }

    fn load_with_path(&self, id: &ArtifactId) -> Result<(PathBuf, Artifact)> {
        let path = self
            .path_of(id)?
            .ok_or_else(|| SpecflowError::ArtifactNotFound(id.to_string()))?;
        let artifact = load_path(&path)?;
        Ok((path, artifact))
    }

    /// All artifacts of `kind`, ordered by id.
    pub fn list(&self, kind: ArtifactKind) -> Result<Vec<Artifact>> {
        let dir = paths::kind_dir(&self.root, kind);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }
        let mut out = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let entry = entry?;
            let name = entry.file_name();
            match paths::parse_artifact_filename(&name.to_string_lossy()) {
                Some((id, _)) if id.kind == kind => out.push(load_path(&entry.path())?),
                _ => {}
            }
        }
        out.sort_by_key(|a| a.id);
        Ok(out)
    }

    pub fn list_all(&self) -> Result<Vec<Artifact>> {
        let mut out = Vec::new();
        for kind in ArtifactKind::all() {
            out.extend(self.list(*kind)?);
        }
        Ok(out)
    }

    /// Highest sequence number on disk for `kind`, 0 when there is none.
    /// Reads file names only.
    pub fn max_sequence(&self, kind: ArtifactKind) -> Result<u32> {
        let dir = paths::kind_dir(&self.root, kind);
        if !dir.is_dir() {
            return Ok(0);
        }
        let mut max = 0;
        for entry in std::fs::read_dir(&dir)? {
            let name = entry?.file_name();
            if let Some((id, _)) = paths::parse_artifact_filename(&name.to_string_lossy()) {
                if id.kind == kind {
                    max = max.max(id.seq);
                }
            }
        }
        Ok(max)
    }

    /// Artifacts whose parent is `id`, ordered by id.
    pub fn children(&self, id: &ArtifactId) -> Result<Vec<Artifact>> {
        let mut out = Vec::new();
        for kind in ArtifactKind::all() {
            if kind.parent_kind() != Some(id.kind) {
                continue;
            }
            out.extend(
                self.list(*kind)?
                    .into_iter()
                    .filter(|a| a.parent == Some(*id)),
            );
        }
        out.sort_by_key(|a| a.id);
        Ok(out)
    }

    /// The most recent completed artifact of `kind`.
    pub fn latest_completed(&self, kind: ArtifactKind) -> Result<Option<Artifact>> {
        Ok(self
            .list(kind)?
            .into_iter()
            .filter(|a| a.is_completed())
            .max_by_key(|a| a.id))
    }

    // -----------------------------------------------------------------------
    // Validation reports
    // -----------------------------------------------------------------------

    pub fn save_report(&self, report: &ValidationReport) -> Result<PathBuf> {
        let path = paths::report_path(&self.root, &report.tasks);
        let data = serde_yaml::to_string(report)?;
        atomic_write(&path, data.as_bytes())?;
        Ok(path)
    }

    pub fn load_report(&self, tasks: &ArtifactId) -> Result<Option<ValidationReport>> {
        let path = paths::report_path(&self.root, tasks);
        if !path.exists() {
            return Ok(None);
        }
        let data = std::fs::read_to_string(&path)?;
        Ok(Some(serde_yaml::from_str(&data)?))
    }
}

fn load_path(path: &Path) -> Result<Artifact> {
    let malformed = |reason: String| SpecflowError::MalformedArtifact {
        path: path.display().to_string(),
        reason,
    };
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let (file_id, slug) = paths::parse_artifact_filename(&name)
        .ok_or_else(|| malformed("file name is not {ID}-{slug}.md".to_string()))?;

    let content = std::fs::read_to_string(path)?;
    let updated_at: DateTime<Utc> = std::fs::metadata(path)?.modified()?.into();
    let artifact = document::parse(&content, &slug, updated_at).map_err(malformed)?;
    if artifact.id != file_id {
        return Err(malformed(format!(
            "frontmatter id {} does not match file name id {file_id}",
            artifact.id
        )));
    }
    Ok(artifact)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::artifact::Sections;
    use crate::types::TaskStatus;
    use chrono::NaiveDate;
    use tempfile::TempDir;

    fn artifact(id: &str, parent: Option<&str>, status: ArtifactStatus) -> Artifact {
        let mut sections = Sections::default();
        sections.push_prose("Problem", "Checkout is slow.");
        Artifact {
            id: id.parse().unwrap(),
            status,
            parent: parent.map(|p| p.parse().unwrap()),
            slug: "checkout".to_string(),
            title: "Checkout".to_string(),
            created: NaiveDate::from_ymd_opt(2026, 10, 14).unwrap(),
            updated_at: Utc::now(),
            sections,
        }
    }

    #[test]
    fn create_and_load() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let a = artifact("DISC-001", None, ArtifactStatus::Completed);
        store.create(&a).unwrap();

        assert!(dir.path().join("docs/discovery/DISC-001-checkout.md").exists());
        let loaded = store.load(&a.id).unwrap();
        assert_eq!(loaded.sections, a.sections);
        assert_eq!(loaded.title, "Checkout");
    }

    #[test]
    fn frontmatter_survives_byte_for_byte() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let a = artifact("SPEC-002", Some("DISC-001"), ArtifactStatus::Completed);
        store.create(&a).unwrap();
        let path = store.path_of(&a.id).unwrap().unwrap();
        let first = std::fs::read_to_string(&path).unwrap();

        let loaded = store.load(&a.id).unwrap();
        let rendered = document::render(&loaded).unwrap();
        assert_eq!(
            document::frontmatter_of(&rendered),
            document::frontmatter_of(&first)
        );
        assert_eq!(loaded.sections, a.sections);
    }

    #[test]
    fn create_refuses_duplicate_id() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let a = artifact("DISC-001", None, ArtifactStatus::Completed);
        store.create(&a).unwrap();
        let mut b = a.clone();
        b.slug = "other".to_string();
        assert!(store.create(&b).is_err());
    }

    #[test]
    fn missing_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let id: ArtifactId = "DISC-999".parse().unwrap();
        assert!(matches!(store.load(&id), Err(SpecflowError::ArtifactNotFound(_))));
        assert!(store.find(&id).unwrap().is_none());
    }

    #[test]
    fn status_moves_checked() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let a = artifact("DISC-001", None, ArtifactStatus::Completed);
        store.create(&a).unwrap();

        let err = store.set_status(&a.id, ArtifactStatus::Rejected).unwrap_err();
        assert!(matches!(err, SpecflowError::Transition { .. }));

        let flipped = store.set_status(&a.id, ArtifactStatus::Superseded).unwrap();
        assert_eq!(flipped.status, ArtifactStatus::Superseded);
        assert_eq!(store.load(&a.id).unwrap().status, ArtifactStatus::Superseded);
    }

    #[test]
    fn max_sequence_and_listing() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        assert_eq!(store.max_sequence(ArtifactKind::Adr).unwrap(), 0);
        for id in ["ADR-0003", "ADR-0007", "ADR-0001"] {
            store
                .create(&artifact(id, Some("DESIGN-001"), ArtifactStatus::Completed))
                .unwrap();
        }
        assert_eq!(store.max_sequence(ArtifactKind::Adr).unwrap(), 7);
        let ids: Vec<String> = store
            .list(ArtifactKind::Adr)
            .unwrap()
            .iter()
            .map(|a| a.id.to_string())
            .collect();
        assert_eq!(ids, vec!["ADR-0001", "ADR-0003", "ADR-0007"]);

        let design: ArtifactId = "DESIGN-001".parse().unwrap();
        assert_eq!(store.children(&design).unwrap().len(), 3);
    }

    #[test]
    fn malformed_file_reported_with_path() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let path = dir.path().join("docs/specs/SPEC-001-broken.md");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "no frontmatter here\n").unwrap();
        let err = store.list(ArtifactKind::Spec).unwrap_err();
        match err {
            SpecflowError::MalformedArtifact { path, .. } => assert!(path.ends_with("SPEC-001-broken.md")),
            other => panic!("unexpected {other}"),
        }
    }

    #[test]
    fn update_tasks_requires_completed_tasks_artifact() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut a = artifact("TASKS-001", Some("PLAN-001"), ArtifactStatus::Completed);
        a.sections.tasks.push(Task::new("T001", "write tests"));
        store.create(&a).unwrap();

        let updated = store
            .update_tasks(&a.id, |tasks| {
                crate::task::set_status(tasks, "T001", TaskStatus::Done)
            })
            .unwrap();
        assert_eq!(updated.sections.tasks[0].status, TaskStatus::Done);

        let disc: ArtifactId = "DISC-001".parse().unwrap();
        assert!(store.update_tasks(&disc, |_| Ok(())).is_err());
    }

    #[test]
    fn held_lease_makes_updates_busy() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path()).with_leases(NumberingConfig {
            lock_timeout_ms: 30,
            stale_lock_secs: 30,
        });
        let a = artifact("DISC-001", None, ArtifactStatus::Completed);
        store.create(&a).unwrap();

        let lease = store.lock(&a.id).unwrap();
        match store.set_status(&a.id, ArtifactStatus::Superseded) {
            Err(SpecflowError::ArtifactBusy { id, waited_ms }) => {
                assert_eq!(id, "DISC-001");
                assert_eq!(waited_ms, 30);
            }
            other => panic!("expected ArtifactBusy, got {other:?}"),
        }
        assert_eq!(store.load(&a.id).unwrap().status, ArtifactStatus::Completed);

        drop(lease);
        store.set_status(&a.id, ArtifactStatus::Superseded).unwrap();
    }

    #[test]
    fn write_refuses_prose_that_swallows_sections() {
        let dir = TempDir::new().unwrap();
        let store = ArtifactStore::new(dir.path());
        let mut a = artifact("SPEC-001", Some("DISC-001"), ArtifactStatus::Completed);
        a.sections.push_prose("Notes", "```\nleft open");
        a.sections.requirements.push(crate::artifact::Requirement {
            id: "FR-001".to_string(),
            kind: crate::types::RequirementKind::Functional,
            text: "pay with a saved card".to_string(),
        });

        assert!(matches!(
            store.create(&a),
            Err(SpecflowError::MalformedArtifact { .. })
        ));
        assert!(!dir.path().join("docs/specs/SPEC-001-checkout.md").exists());
    }
}
