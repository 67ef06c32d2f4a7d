use super::phase::{self, PhaseArgs};
use crate::collab::DraftFile;
use anyhow::Context;
use specflow_core::collab::PhaseRunner;
use specflow_core::types::ArtifactKind;
use std::path::Path;

// ---------------------------------------------------------------------------
// reject
// ---------------------------------------------------------------------------

pub fn reject(root: &Path, args: PhaseArgs, json: bool) -> anyhow::Result<()> {
    let engine = phase::open(root)?;
    let kind = ArtifactKind::Discovery;
    let generator = DraftFile::new(args.draft_path(root, kind));
    let draft = PhaseRunner::new(&engine, &generator)
        .draft(kind, None, args.idea)
        .context("failed to read discovery draft")?;
    let artifact = engine.reject(draft).context("discovery was not rejected")?;
    phase::print_promoted(root, &artifact, "Rejected", json)
}

// ---------------------------------------------------------------------------
// supersede
// ---------------------------------------------------------------------------

pub fn supersede(root: &Path, id: &str, args: PhaseArgs, json: bool) -> anyhow::Result<()> {
    let engine = phase::open(root)?;
    let old = phase::parse_id(id)?;
    let previous = engine
        .store()
        .load(&old)
        .with_context(|| format!("cannot supersede {old}"))?;

    let parent = match args.parent.as_deref() {
        Some(raw) => Some(phase::parse_id(raw)?),
        None => previous.parent,
    };
    let generator = DraftFile::new(args.draft_path(root, old.kind));
    let draft = PhaseRunner::new(&engine, &generator)
        .draft(old.kind, parent, args.idea)
        .with_context(|| format!("failed to read replacement draft for {old}"))?;
    let artifact = engine
        .supersede(&old, draft)
        .with_context(|| format!("{old} was not superseded"))?;

    if !json {
        println!("{old} is now superseded");
    }
    phase::print_promoted(root, &artifact, "Promoted", json)
}
