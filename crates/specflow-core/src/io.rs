use crate::error::Result;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant, SystemTime};
use tempfile::NamedTempFile;

const LEASE_POLL: Duration = Duration::from_millis(25);

/// Atomically write `data` to `path` using a tempfile in the same directory.
/// Readers observe either the previous content or the new content, never a mix.
pub fn atomic_write(path: &Path, data: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let dir = path.parent().unwrap_or(Path::new("."));
    let mut tmp = NamedTempFile::new_in(dir)?;
    tmp.write_all(data)?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Create a directory and all parents, idempotent.
pub fn ensure_dir(path: &Path) -> Result<()> {
    std::fs::create_dir_all(path)?;
    Ok(())
}

/// Write a file only if it does not already exist. Returns true if written.
pub fn write_if_missing(path: &Path, data: &[u8]) -> Result<bool> {
    if path.exists() {
        return Ok(false);
    }
    atomic_write(path, data)?;
    Ok(true)
}

/// Add `entry` to `root/.gitignore` if it isn't already present (exact line match).
pub fn ensure_gitignore_entry(root: &Path, entry: &str) -> Result<()> {
    let gitignore = root.join(".gitignore");
    let existing = if gitignore.exists() {
        std::fs::read_to_string(&gitignore)?
    } else {
        String::new()
    };
    if existing.lines().any(|l| l == entry) {
        return Ok(());
    }
    let sep = if existing.is_empty() || existing.ends_with('\n') {
        ""
    } else {
        "\n"
    };
    let mut f = std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(&gitignore)?;
    writeln!(f, "{sep}{entry}")?;
    Ok(())
}

// ---------------------------------------------------------------------------
// Exclusive lease
// ---------------------------------------------------------------------------

/// An exclusive lock file held for the lifetime of the value.
#[derive(Debug)]
pub struct Lease {
    path: PathBuf,
}

impl Lease {
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        if let Err(e) = std::fs::remove_file(&self.path) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to release lease");
        }
    }
}

/// Acquire `lock_path` with create-new semantics, polling until `timeout`.
///
/// Returns `Ok(None)` on timeout. A lock file older than `stale_after` is
/// treated as left behind by a dead process and removed.
pub fn acquire_lease(
    lock_path: &Path,
    timeout: Duration,
    stale_after: Duration,
) -> Result<Option<Lease>> {
    let started = Instant::now();
    if let Some(parent) = lock_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    loop {
        match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(lock_path)
        {
            Ok(mut f) => {
                writeln!(f, "{}", std::process::id())?;
                return Ok(Some(Lease {
                    path: lock_path.to_path_buf(),
                }));
            }
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                if is_stale(lock_path, stale_after) && break_stale(lock_path, stale_after)? {
                    continue;
                }
                if started.elapsed() >= timeout {
                    return Ok(None);
                }
                std::thread::sleep(LEASE_POLL);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

/// Move a stale lock aside under a unique name, then judge the file that was
/// actually moved. Another writer may have replaced the stale lock between the
/// check and the rename; a live lock taken that way is linked back in place.
/// Returns true when a stale lock was removed.
fn break_stale(lock_path: &Path, stale_after: Duration) -> Result<bool> {
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .map(|d| d.as_nanos())
        .unwrap_or_default();
    let aside = lock_path.with_extension(format!("stale.{}.{nanos}", std::process::id()));
    match std::fs::rename(lock_path, &aside) {
        Ok(()) => {}
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(true),
        Err(e) => return Err(e.into()),
    }

    if is_stale(&aside, stale_after) {
        tracing::warn!(path = %lock_path.display(), "removed stale lease");
        std::fs::remove_file(&aside)?;
        return Ok(true);
    }
    // hard_link fails if a newer lock already exists, so it never clobbers one.
    if let Err(e) = std::fs::hard_link(&aside, lock_path) {
        tracing::warn!(path = %lock_path.display(), error = %e, "could not restore live lease");
    }
    std::fs::remove_file(&aside)?;
    Ok(false)
}

fn is_stale(lock_path: &Path, stale_after: Duration) -> bool {
    std::fs::metadata(lock_path)
        .and_then(|m| m.modified())
        .ok()
        .and_then(|modified| SystemTime::now().duration_since(modified).ok())
        .map(|age| age > stale_after)
        .unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn atomic_write_creates_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("test.yaml");
        atomic_write(&path, b"hello: world").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "hello: world");
    }

    #[test]
    fn atomic_write_creates_parents() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("a/b/c/test.md");
        atomic_write(&path, b"data").unwrap();
        assert!(path.exists());
    }

    #[test]
    fn atomic_write_leaves_no_temp_files() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out.md");
        atomic_write(&path, b"one").unwrap();
        atomic_write(&path, b"two").unwrap();
        let names: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["out.md".to_string()]);
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "two");
    }

    #[test]
    fn write_if_missing_skips_existing() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("existing.txt");
        std::fs::write(&path, b"original").unwrap();
        assert!(!write_if_missing(&path, b"new").unwrap());
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "original");
    }

    #[test]
    fn ensure_gitignore_entry_idempotent() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join(".gitignore"), "target").unwrap();
        ensure_gitignore_entry(dir.path(), ".specflow/sequences/*.lock").unwrap();
        ensure_gitignore_entry(dir.path(), ".specflow/sequences/*.lock").unwrap();
        let content = std::fs::read_to_string(dir.path().join(".gitignore")).unwrap();
        assert!(content.starts_with("target\n"));
        assert_eq!(content.matches(".specflow/sequences/*.lock").count(), 1);
    }

    #[test]
    fn lease_is_exclusive_and_released_on_drop() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("locks/adr.lock");
        let stale = Duration::from_secs(60);

        let held = acquire_lease(&lock, Duration::from_millis(10), stale)
            .unwrap()
            .expect("first lease");
        assert!(lock.exists());

        let second = acquire_lease(&lock, Duration::from_millis(60), stale).unwrap();
        assert!(second.is_none(), "lease must be exclusive");

        drop(held);
        assert!(!lock.exists());
        assert!(acquire_lease(&lock, Duration::from_millis(10), stale)
            .unwrap()
            .is_some());
    }

    #[test]
    fn stale_lease_is_broken() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("spec.lock");
        std::fs::write(&lock, "99999\n").unwrap();
        std::thread::sleep(Duration::from_millis(30));
        let lease = acquire_lease(&lock, Duration::from_millis(10), Duration::from_millis(5))
            .unwrap();
        assert!(lease.is_some());
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1, "only the new lease remains");
    }

    #[test]
    fn live_lease_survives_a_late_steal() {
        let dir = TempDir::new().unwrap();
        let lock = dir.path().join("tasks.lock");
        let held = acquire_lease(&lock, Duration::from_millis(10), Duration::from_secs(60))
            .unwrap()
            .unwrap();

        // A writer that judged an older lock stale arrives after `held` replaced it.
        assert!(!break_stale(&lock, Duration::from_secs(60)).unwrap());
        assert!(lock.exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
        assert!(acquire_lease(&lock, Duration::from_millis(30), Duration::from_secs(60))
            .unwrap()
            .is_none());

        drop(held);
        assert!(!lock.exists());
    }
}
