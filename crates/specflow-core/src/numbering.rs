use crate::config::NumberingConfig;
use crate::error::{Result, SpecflowError};
use crate::io::{acquire_lease, atomic_write};
use crate::paths;
use crate::store::ArtifactStore;
use crate::types::{ArtifactId, ArtifactKind};
use std::path::Path;

/// Allocates per-kind sequence numbers that stay unique across threads and
/// independent processes working on the same project.
///
/// Each allocation holds the `{kind}.lock` lease while it reads the persisted
/// counter, re-scans `docs/` for the highest id, and writes the counter back.
#[derive(Debug, Clone)]
pub struct NumberingService {
    store: ArtifactStore,
    config: NumberingConfig,
}

impl NumberingService {
    pub fn new(store: ArtifactStore, config: NumberingConfig) -> Self {
        Self { store, config }
    }

    pub fn next_id(&self, kind: ArtifactKind) -> Result<ArtifactId> {
        match self.try_allocate(kind)? {
            Some(id) => Ok(id),
            None => {
                tracing::warn!(kind = %kind, "sequence lease timed out, retrying once");
                self.try_allocate(kind)?
                    .ok_or_else(|| SpecflowError::NumberingConflict {
                        kind: kind.to_string(),
                        waited_ms: self.config.lock_timeout_ms * 2,
                    })
            }
        }
    }

    fn try_allocate(&self, kind: ArtifactKind) -> Result<Option<ArtifactId>> {
        let root = self.store.root();
        let lock = paths::sequence_lock(root, kind);
        let Some(_lease) =
            acquire_lease(&lock, self.config.lock_timeout(), self.config.stale_after())?
        else {
            return Ok(None);
        };
        tracing::debug!(kind = %kind, "sequence lease acquired");

        let counter = read_counter(&paths::sequence_file(root, kind))?;
        let on_disk = self.store.max_sequence(kind)?;
        let seq = counter.max(on_disk) + 1;
        atomic_write(&paths::sequence_file(root, kind), format!("{seq}\n").as_bytes())?;
        Ok(Some(ArtifactId::new(kind, seq)))
    }
}

fn read_counter(path: &Path) -> Result<u32> {
    if !path.exists() {
        return Ok(0);
    }
    let text = std::fs::read_to_string(path)?;
    text.trim()
        .parse()
        .map_err(|_| SpecflowError::MalformedArtifact {
            path: path.display().to_string(),
            reason: format!("sequence counter is not a number: '{}'", text.trim()),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
