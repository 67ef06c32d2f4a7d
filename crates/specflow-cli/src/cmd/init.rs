use anyhow::Context;
use specflow_core::config::Config;
use specflow_core::types::ArtifactKind;
use specflow_core::{io, paths};
use std::path::Path;

const GITIGNORE_ENTRIES: &[&str] = &[
    ".specflow/sequences/*.lock",
    ".specflow/locks/",
    ".specflow/drafts/",
];

const DISCOVERY_DRAFT_EXAMPLE: &str = "\
# Draft read by `specflow discover`. Fill in, then run the command.
title: \"\"
sections:
  prose:
    - heading: Problem
      body: \"\"
";

pub fn run(root: &Path) -> anyhow::Result<()> {
    println!("Initializing specflow in: {}", root.display());

    for dir in [paths::SEQUENCES_DIR, paths::DRAFTS_DIR, paths::VALIDATION_DIR] {
        io::ensure_dir(&root.join(dir)).with_context(|| format!("failed to create {dir}"))?;
    }
    for kind in ArtifactKind::all() {
        let dir = paths::kind_dir(root, *kind);
        io::ensure_dir(&dir).with_context(|| format!("failed to create {}", dir.display()))?;
    }

    let config_path = paths::config_path(root);
    if config_path.exists() {
        println!("  exists:  {}", paths::CONFIG_FILE);
    } else {
        let name = root
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "project".to_string());
        Config::new(name)
            .save(root)
            .context("failed to write config.yaml")?;
        println!("  created: {}", paths::CONFIG_FILE);
    }

    let example = paths::draft_path(root, ArtifactKind::Discovery).with_extension("example.yaml");
    if io::write_if_missing(&example, DISCOVERY_DRAFT_EXAMPLE.as_bytes())? {
        println!("  created: {}", example.strip_prefix(root).unwrap_or(&example).display());
    }

    for entry in GITIGNORE_ENTRIES {
        io::ensure_gitignore_entry(root, entry).context("failed to update .gitignore")?;
    }

    println!("\nspecflow initialized.");
    println!("Next: write {}/discovery.yaml and run: specflow discover", paths::DRAFTS_DIR);
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn init_is_idempotent() {
        let dir = TempDir::new().unwrap();
        run(dir.path()).unwrap();
        run(dir.path()).unwrap();

        assert!(Config::load(dir.path()).is_ok());
        assert!(paths::kind_dir(dir.path(), ArtifactKind::Adr).is_dir());
        let gitignore = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert_eq!(gitignore.matches(".specflow/sequences/*.lock").count(), 1);
        assert_eq!(gitignore.matches(".specflow/locks/").count(), 1);
    }
}
