use super::phase;
use crate::output::{print_json, print_table};
use anyhow::Context;
use specflow_core::types::ArtifactKind;
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let engine = phase::open(root)?;
    let artifacts = engine.store().list_all().context("failed to list artifacts")?;

    let mut rows = Vec::with_capacity(artifacts.len());
    for a in &artifacts {
        let phase = engine.phase_of(&a.id)?;
        rows.push((a, phase));
    }

    let (coverage, cycles) = {
        let graph = engine.graph();
        (graph.coverage_percent(), graph.cycles().len())
    };

    if json {
        let items: Vec<_> = rows
            .iter()
            .map(|(a, phase)| {
                serde_json::json!({
                    "id": a.id,
                    "title": a.title,
                    "status": a.status,
                    "phase": phase.as_str(),
                    "parent": a.parent,
                })
            })
            .collect();
        return print_json(&serde_json::json!({
            "artifacts": items,
            "coverage": coverage,
            "cycles": cycles,
        }));
    }

    if rows.is_empty() {
        println!("No artifacts yet. Next: specflow discover");
        return Ok(());
    }
    let table = rows
        .iter()
        .map(|(a, phase)| {
            vec![
                a.id.to_string(),
                a.status.to_string(),
                phase.as_str().to_string(),
                a.parent.map(|p| p.to_string()).unwrap_or_else(|| "-".to_string()),
                a.title.clone(),
            ]
        })
        .collect();
    print_table(&["ID", "STATUS", "PHASE", "PARENT", "TITLE"], table);

    let specs = artifacts.iter().filter(|a| a.kind() == ArtifactKind::Spec).count();
    println!();
    println!("Coverage: {:.1}% of requirements across {specs} spec(s)", coverage * 100.0);
    if cycles > 0 {
        println!("Reference cycles: {cycles}");
    }
    Ok(())
}
