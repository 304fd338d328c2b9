// [libs/core/persistence/src/exclusion_lock.rs]
//! File-level exclusion lock: two processes pointed at the same
//! database are unsupported and must be prevented at startup.
//!
//! A plain advisory lock file next to the database, stamped with the
//! holder's PID. libSQL's local backend doesn't expose the database
//! file handle for an OS-level flock, so the lock is an ordinary
//! exclusive-create file instead — sufficient given SPECTRA's
//! single-operator deployment model (no orchestration across hosts).

use crate::errors::PersistenceError;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

pub struct ExclusionLock {
    path: PathBuf,
}

impl ExclusionLock {
    /// Acquires the lock for `db_path`, or fails if another live
    /// process already holds it (stale locks from a dead PID are
    /// reclaimed).
    pub fn acquire(db_path: &Path) -> Result<Self, PersistenceError> {
        let lock_path = lock_path_for(db_path);

        if let Some(existing_pid) = read_stale_check(&lock_path) {
            if process_is_alive(existing_pid) {
                return Err(PersistenceError::StorageUnavailable(format!(
                    "database at {} is already locked by pid {existing_pid}",
                    db_path.display()
                )));
            }
        }

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&lock_path)
            .map_err(|e| PersistenceError::StorageUnavailable(format!("cannot open exclusion lock: {e}")))?;
        write!(file, "{}", std::process::id())
            .map_err(|e| PersistenceError::StorageUnavailable(format!("cannot write exclusion lock: {e}")))?;

        Ok(ExclusionLock { path: lock_path })
    }
}

impl Drop for ExclusionLock {
    fn drop(&mut self) {
        let _ = fs::remove_file(&self.path);
    }
}

fn lock_path_for(db_path: &Path) -> PathBuf {
    let mut name = db_path.file_name().map(|n| n.to_os_string()).unwrap_or_default();
    name.push(".lock");
    db_path.with_file_name(name)
}

fn read_stale_check(lock_path: &Path) -> Option<u32> {
    fs::read_to_string(lock_path).ok()?.trim().parse().ok()
}

#[cfg(unix)]
fn process_is_alive(pid: u32) -> bool {
    // Signal 0 performs no-op delivery: success means the process exists
    // and is reachable (not a zombie we've already lost permission to).
    unsafe { libc::kill(pid as i32, 0) == 0 }
}

#[cfg(not(unix))]
fn process_is_alive(_pid: u32) -> bool {
    // Conservative: assume alive on non-unix targets rather than risk
    // a double-open of the database.
    true
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn acquires_and_releases() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("spectra.db");
        {
            let _lock = ExclusionLock::acquire(&db_path).unwrap();
            assert!(lock_path_for(&db_path).exists());
        }
        assert!(!lock_path_for(&db_path).exists());
    }

    #[test]
    fn second_acquire_fails_while_first_is_held() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join("spectra.db");
        let _first = ExclusionLock::acquire(&db_path).unwrap();
        assert!(ExclusionLock::acquire(&db_path).is_err());
    }
}
