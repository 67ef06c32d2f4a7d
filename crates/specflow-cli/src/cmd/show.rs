use super::phase;
use crate::output::print_json;
use anyhow::Context;
use std::path::Path;

pub fn run(root: &Path, id: &str, json: bool) -> anyhow::Result<()> {
    let engine = phase::open(root)?;
    let id = phase::parse_id(id)?;
    let artifact = engine.store().load(&id)?;

    if json {
        return print_json(&artifact);
    }
    let path = engine
        .store()
        .path_of(&id)?
        .with_context(|| format!("{id} has no file on disk"))?;
    let content = std::fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    print!("{content}");
    Ok(())
}
