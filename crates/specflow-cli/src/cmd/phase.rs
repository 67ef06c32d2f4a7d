use crate::collab::{CommandResearcher, DraftFile};
use crate::output::{print_json, print_table};
use anyhow::Context;
use clap::Args;
use specflow_core::artifact::Artifact;
use specflow_core::collab::PhaseRunner;
use specflow_core::paths;
use specflow_core::transition::TransitionEngine;
use specflow_core::types::{ArtifactId, ArtifactKind};
use std::path::{Path, PathBuf};

/// Flags shared by every phase-entry command.
#[derive(Args, Debug, Default)]
pub struct PhaseArgs {
    /// Draft file (default: .specflow/drafts/<kind>.yaml)
    #[arg(long)]
    pub draft: Option<PathBuf>,

    /// Parent artifact id (default: latest completed artifact of the parent kind)
    #[arg(long)]
    pub parent: Option<String>,

    /// Idea text handed to the collaborators as prompt context
    #[arg(long)]
    pub idea: Option<String>,
}

impl PhaseArgs {
    pub fn draft_path(&self, root: &Path, kind: ArtifactKind) -> PathBuf {
        match &self.draft {
            Some(p) if p.is_absolute() => p.clone(),
            Some(p) => root.join(p),
            None => paths::draft_path(root, kind),
        }
    }
}

pub fn run(root: &Path, kind: ArtifactKind, args: PhaseArgs, json: bool) -> anyhow::Result<()> {
    let engine = open(root)?;
    let parent = resolve_parent(&engine, kind, args.parent.as_deref())?;
    let generator = DraftFile::new(args.draft_path(root, kind));
    let researcher = engine.config().research.as_ref().map(CommandResearcher::from_config);

    let mut runner = PhaseRunner::new(&engine, &generator);
    if let Some(r) = &researcher {
        runner = runner.with_researcher(r);
    }
    let artifact = runner
        .run(kind, parent, args.idea)
        .with_context(|| format!("{kind} was not promoted"))?;

    print_promoted(root, &artifact, "Promoted", json)
}

pub fn open(root: &Path) -> anyhow::Result<TransitionEngine> {
    TransitionEngine::open(root)
        .with_context(|| format!("failed to open specflow project at {}", root.display()))
}

pub fn parse_id(raw: &str) -> anyhow::Result<ArtifactId> {
    Ok(raw.parse::<ArtifactId>()?)
}

/// An explicit `--parent`, else the newest completed artifact of the kind
/// `kind` builds on. A missing parent is left for the engine to reject.
fn resolve_parent(
    engine: &TransitionEngine,
    kind: ArtifactKind,
    explicit: Option<&str>,
) -> anyhow::Result<Option<ArtifactId>> {
    if let Some(raw) = explicit {
        return parse_id(raw).map(Some);
    }
    let Some(parent_kind) = kind.parent_kind() else {
        return Ok(None);
    };
    let latest = engine
        .store()
        .latest_completed(parent_kind)
        .context("failed to scan artifacts")?;
    Ok(latest.map(|a| a.id))
}

pub fn print_promoted(root: &Path, artifact: &Artifact, verb: &str, json: bool) -> anyhow::Result<()> {
    let path = paths::artifact_path(root, &artifact.id, &artifact.slug);
    if json {
        return print_json(&serde_json::json!({
            "id": artifact.id,
            "kind": artifact.kind().as_str(),
            "title": artifact.title,
            "status": artifact.status,
            "parent": artifact.parent,
            "path": path,
            "gate_results": artifact.sections.gate_results,
        }));
    }

    println!("{verb} {}: {}", artifact.id, artifact.title);
    println!("  path: {}", path.display());
    if !artifact.sections.gate_results.is_empty() {
        let rows = artifact
            .sections
            .gate_results
            .iter()
            .map(|g| {
                vec![
                    g.gate_id.to_string(),
                    g.name.clone(),
                    if g.passed() { "pass" } else { "fail" }.to_string(),
                    g.justification.clone().unwrap_or_default(),
                ]
            })
            .collect();
        println!();
        print_table(&["GATE", "NAME", "RESULT", "JUSTIFICATION"], rows);
    }
    Ok(())
}
