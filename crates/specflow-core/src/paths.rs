use crate::error::{Result, SpecflowError};
use crate::types::{ArtifactId, ArtifactKind};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const DOCS_DIR: &str = "docs";
pub const VALIDATION_DIR: &str = "docs/validation";

pub const SPECFLOW_DIR: &str = ".specflow";
pub const SEQUENCES_DIR: &str = ".specflow/sequences";
pub const DRAFTS_DIR: &str = ".specflow/drafts";
pub const LOCKS_DIR: &str = ".specflow/locks";
pub const CONFIG_FILE: &str = ".specflow/config.yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn kind_dir(root: &Path, kind: ArtifactKind) -> PathBuf {
    root.join(DOCS_DIR).join(kind.dir_name())
}

pub fn artifact_path(root: &Path, id: &ArtifactId, slug: &str) -> PathBuf {
    kind_dir(root, id.kind).join(format!("{id}-{slug}.md"))
}

pub fn report_path(root: &Path, tasks: &ArtifactId) -> PathBuf {
    root.join(VALIDATION_DIR).join(format!("{tasks}.yaml"))
}

pub fn sequence_file(root: &Path, kind: ArtifactKind) -> PathBuf {
    root.join(SEQUENCES_DIR).join(format!("{}.seq", kind.as_str()))
}

pub fn sequence_lock(root: &Path, kind: ArtifactKind) -> PathBuf {
    root.join(SEQUENCES_DIR).join(format!("{}.lock", kind.as_str()))
}

/// Lease guarding status and task updates of one artifact.
pub fn artifact_lock(root: &Path, id: &ArtifactId) -> PathBuf {
    root.join(LOCKS_DIR).join(format!("{id}.lock"))
}

pub fn draft_path(root: &Path, kind: ArtifactKind) -> PathBuf {
    root.join(DRAFTS_DIR).join(format!("{}.yaml", kind.as_str()))
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn specflow_dir(root: &Path) -> PathBuf {
    root.join(SPECFLOW_DIR)
}

/// Split `SPEC-002-user-auth.md` into its id and slug.
pub fn parse_artifact_filename(name: &str) -> Option<(ArtifactId, String)> {
    let stem = name.strip_suffix(".md")?;
    let (prefix, rest) = stem.split_once('-')?;
    let (digits, slug) = rest.split_once('-')?;
    let id: ArtifactId = format!("{prefix}-{digits}").parse().ok()?;
    Some((id, slug.to_string()))
}

// ---------------------------------------------------------------------------
// Slug validation
// ---------------------------------------------------------------------------

static SLUG_RE: OnceLock<Regex> = OnceLock::new();

fn slug_re() -> &'static Regex {
    SLUG_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_slug(slug: &str) -> Result<()> {
    if slug.is_empty() || slug.len() > 64 || !slug_re().is_match(slug) {
        return Err(SpecflowError::InvalidSlug(slug.to_string()));
    }
    Ok(())
}

/// Derive a slug from a free-form title: "User Auth (v2)" → "user-auth-v2".
pub fn slugify(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for c in title.chars() {
        if c.is_ascii_alphanumeric() {
            let dash = pending_dash && !slug.is_empty();
            if slug.len() + usize::from(dash) + 1 > 64 {
                break;
            }
            if dash {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(c.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }
    if slug.is_empty() {
        "untitled".to_string()
    } else {
        slug
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
