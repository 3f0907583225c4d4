//! Process-wide registry of staged native-library files and the one-shot
//! shutdown hook that deletes them.
//!
//! Several loaders can be staging native libraries concurrently, and no
//! single loader's `Drop` is positioned to clean up another's files, so the
//! bookkeeping lives in one process-wide table instead of per loader. The
//! shutdown hook is installed through `libc::atexit` (the crate's one unsafe
//! FFI surface) because `Drop` never runs for values a shutdown leaves
//! allocated on the heap of a process that is about to exit — an explicit
//! exit hook is the only way to guarantee the staged files get cleaned up.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Once;

use once_cell::sync::Lazy;
use parking_lot::Mutex;

static REGISTRY: Lazy<Mutex<HashSet<PathBuf>>> = Lazy::new(|| {
    install_shutdown_hook();
    Mutex::new(HashSet::new())
});

static HOOK_INSTALLED: Once = Once::new();

fn install_shutdown_hook() {
    HOOK_INSTALLED.call_once(|| unsafe {
        libc::atexit(run_shutdown_hook);
    });
}

extern "C" fn run_shutdown_hook() {
    NativeLibRegistry::drain_and_delete();
}

/// A process-wide set of staged native-library files, guarded by its own
/// internal synchronization.
pub struct NativeLibRegistry;

impl NativeLibRegistry {
    /// Records that `path` has been staged. Idempotent.
    pub fn register(path: PathBuf) {
        REGISTRY.lock().insert(path);
    }

    /// Deletes a previously staged file and removes it from the registry.
    /// Also removes the containing directory if deleting the file leaves it
    /// empty. Missing files are not an error — the delete may race a prior
    /// shutdown-hook run or a caller-initiated cleanup.
    pub fn delete(path: &Path) -> std::io::Result<()> {
        REGISTRY.lock().remove(path);
        Self::delete_file_and_prune_dir(path)
    }

    fn delete_file_and_prune_dir(path: &Path) -> std::io::Result<()> {
        match std::fs::remove_file(path) {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        }

        if let Some(parent) = path.parent() {
            let is_empty = std::fs::read_dir(parent)
                .map(|mut entries| entries.next().is_none())
                .unwrap_or(false);
            if is_empty {
                let _ = std::fs::remove_dir(parent);
            }
        }

        Ok(())
    }

    /// Drains every staged file from the registry, deleting each one (and
    /// any directory that becomes empty). Called once by the shutdown hook;
    /// also usable directly by embedders that manage their own process exit.
    pub fn drain_and_delete() {
        let staged: Vec<PathBuf> = {
            let mut registry = REGISTRY.lock();
            registry.drain().collect()
        };
        for path in staged {
            let _ = Self::delete_file_and_prune_dir(&path);
        }
    }

    #[cfg(test)]
    pub fn contains(path: &Path) -> bool {
        REGISTRY.lock().contains(path)
    }
}
