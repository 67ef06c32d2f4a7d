use specflow_core::paths::SPECFLOW_DIR;
use std::path::{Path, PathBuf};

/// Resolve the project root.
///
/// `--root` / `SPECFLOW_ROOT` wins; otherwise walk upward from the working
/// directory for `.specflow/`, then for `.git/`, and fall back to the cwd.
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    find_upward(&cwd, SPECFLOW_DIR)
        .or_else(|| find_upward(&cwd, ".git"))
        .unwrap_or(cwd)
}

fn find_upward(start: &Path, marker: &str) -> Option<PathBuf> {
    start
        .ancestors()
        .find(|dir| dir.join(marker).is_dir())
        .map(Path::to_path_buf)
}
