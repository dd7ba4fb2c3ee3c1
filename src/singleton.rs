// Copyright 2026 Daniel Pelikan
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Single-instance lock.
//!
//! Advisory and host-local: a file holding the owner's PID. A lock whose
//! owner is no longer running is stale and gets replaced.

use anyhow::{Context, Result};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Lock file guard. Released on drop.
pub struct SingletonGuard {
    path: PathBuf,
    held: bool,
}

impl SingletonGuard {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            held: false,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_held(&self) -> bool {
        self.held
    }

    /// Try to become the only running instance.
    ///
    /// Returns `Ok(false)` if a live process already owns the lock. Errors
    /// only when the lock file cannot be written.
    pub fn acquire(&mut self) -> Result<bool> {
        let own_pid = std::process::id();

        if let Some(owner) = read_owner(&self.path) {
            if owner != own_pid && is_alive(owner) {
                info!("Another instance is already running (PID: {})", owner);
                return Ok(false);
            }
            warn!("Removing stale lock {} (PID {})", self.path.display(), owner);
        }

        if self.path.exists() {
            std::fs::remove_file(&self.path)
                .with_context(|| format!("failed to remove stale lock {}", self.path.display()))?;
        }

        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&self.path, format!("{}\n", own_pid))
            .with_context(|| format!("failed to write lock {}", self.path.display()))?;

        self.held = true;
        debug!("Acquired lock {} (PID {})", self.path.display(), own_pid);
        Ok(true)
    }

    /// Remove the lock file. Safe to call whether or not it was acquired.
    pub fn release(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => debug!("Released lock {}", self.path.display()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!("Failed to remove lock {}: {}", self.path.display(), e),
        }
        self.held = false;
    }
}

impl Drop for SingletonGuard {
    fn drop(&mut self) {
        if self.held {
            self.release();
        }
    }
}

/// PID recorded in the lock file, if the file exists and is readable.
fn read_owner(path: &Path) -> Option<u32> {
    let content = std::fs::read_to_string(path).ok()?;
    match content.trim().parse() {
        Ok(pid) => Some(pid),
        Err(_) => {
            warn!("Lock {} holds no valid PID", path.display());
            None
        }
    }
}

/// Whether a process with this PID exists.
pub fn is_alive(pid: u32) -> bool {
    pid != 0 && Path::new("/proc").join(pid.to_string()).exists()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// A PID above the kernel's pid_max, so never alive.
    const DEAD_PID: u32 = 4_194_305;

    #[test]
    fn test_acquire_fresh() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keeper.lock");
        let mut guard = SingletonGuard::new(&path);

        assert!(guard.acquire().unwrap());
        assert!(guard.is_held());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_live_owner_blocks() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keeper.lock");

        // PID 1 is always running
        std::fs::write(&path, "1\n").unwrap();
        let mut guard = SingletonGuard::new(&path);
        assert!(!guard.acquire().unwrap());
        assert!(!guard.is_held());
        assert_eq!(std::fs::read_to_string(&path).unwrap().trim(), "1");

        drop(guard);
        // a guard that never acquired leaves the other owner's file alone
        assert!(path.exists());
    }

    #[test]
    fn test_stale_owner_replaced() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keeper.lock");
        std::fs::write(&path, format!("{}\n", DEAD_PID)).unwrap();

        let mut guard = SingletonGuard::new(&path);
        assert!(guard.acquire().unwrap());
        let content = std::fs::read_to_string(&path).unwrap();
        assert_eq!(content.trim(), std::process::id().to_string());
    }

    #[test]
    fn test_garbage_lock_is_stale() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keeper.lock");
        std::fs::write(&path, "not a pid").unwrap();

        let mut guard = SingletonGuard::new(&path);
        assert!(guard.acquire().unwrap());
    }

    #[test]
    fn test_release_and_drop() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("keeper.lock");

        let mut guard = SingletonGuard::new(&path);
        guard.acquire().unwrap();
        guard.release();
        assert!(!path.exists());
        // second release is harmless
        guard.release();

        let mut guard = SingletonGuard::new(&path);
        guard.acquire().unwrap();
        drop(guard);
        assert!(!path.exists());
    }

    #[test]
    fn test_is_alive() {
        assert!(is_alive(std::process::id()));
        assert!(!is_alive(DEAD_PID));
        assert!(!is_alive(0));
    }
}
