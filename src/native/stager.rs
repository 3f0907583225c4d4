//! `NativeStager` resolves a requested native library name against a
//! search path, copies the found file into the loader's current temp
//! directory, and registers it with [`super::registry::NativeLibRegistry`].
//!
//! This is the shadow-copy-before-load idea familiar from JVM native-library
//! reloading: a library bound into a running process can't be overwritten
//! or removed out from under it, so each logical name is staged once per
//! loader instance into a scratch directory and re-staged only when that
//! directory is replaced.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::{Error, Result};
use super::registry::NativeLibRegistry;

const NATIVE_SEARCH_PATH_VAR: &str = "CLASSLOADER_NATIVE_LIBRARY_PATH";

/// Per-loader staging state: the search path (read once at construction),
/// the logical-name → staged-copy-path table, and the current temp
/// directory. Lookups are serialized by `mapped`'s mutex, since the host
/// runtime may call in from multiple threads and the staged-file identity
/// must stay stable across them.
pub struct NativeStager {
    search_path: Vec<PathBuf>,
    mapped: Mutex<HashMap<String, PathBuf>>,
    temp_dir: Mutex<Option<PathBuf>>,
}

impl NativeStager {
    pub fn new() -> Self {
        NativeStager {
            search_path: Self::read_search_path(),
            mapped: Mutex::new(HashMap::new()),
            temp_dir: Mutex::new(None),
        }
    }

    fn read_search_path() -> Vec<PathBuf> {
        match std::env::var_os(NATIVE_SEARCH_PATH_VAR) {
            Some(value) => std::env::split_paths(&value)
                .filter(|p| p.is_dir())
                .collect(),
            None => Vec::new(),
        }
    }

    /// Maps a logical name to its cached copy path, staging it on first
    /// request. Returns `Ok(None)` if no entry on the search path has a
    /// matching file.
    pub fn find_library(&self, name: &str) -> Result<Option<PathBuf>> {
        let mut mapped = self.mapped.lock();
        if let Some(path) = mapped.get(name) {
            return Ok(Some(path.clone()));
        }

        let temp_dir = match self.temp_dir.lock().clone() {
            Some(dir) => dir,
            None => return Ok(None),
        };

        let platform_name = platform_library_name(name);
        let source = self
            .search_path
            .iter()
            .map(|dir| dir.join(&platform_name))
            .find(|candidate| candidate.is_file());

        let source = match source {
            Some(s) => s,
            None => return Ok(None),
        };

        let dest = temp_dir.join(&platform_name);
        std::fs::copy(&source, &dest).map_err(|e| Error::StagingFailure {
            name: name.to_string(),
            source_path: source.clone(),
            source: e,
        })?;

        NativeLibRegistry::register(dest.clone());
        mapped.insert(name.to_string(), dest.clone());
        Ok(Some(dest))
    }

    /// Deletes every file this stager has staged, clears the table, then
    /// installs `dir` as the new current temp directory. Subsequent
    /// `find_library` calls re-stage against it.
    pub fn set_temp_dir(&self, dir: Option<PathBuf>) {
        let mut mapped = self.mapped.lock();
        for (_, path) in mapped.drain() {
            let _ = NativeLibRegistry::delete(&path);
        }
        *self.temp_dir.lock() = dir;
    }

    /// Loader-close teardown: reset to no temp directory (an unreachable
    /// sentinel), which deletes every staged file.
    pub fn teardown(&self) {
        self.set_temp_dir(None);
    }

    #[cfg(test)]
    fn staged_count(&self) -> usize {
        self.mapped.lock().len()
    }
}

impl Default for NativeStager {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "windows")]
fn platform_library_name(name: &str) -> String {
    format!("{name}.dll")
}

#[cfg(target_os = "macos")]
fn platform_library_name(name: &str) -> String {
    format!("lib{name}.dylib")
}

#[cfg(any(
    target_os = "linux",
    target_os = "freebsd",
    target_os = "dragonfly",
    target_os = "netbsd",
    target_os = "openbsd"
))]
fn platform_library_name(name: &str) -> String {
    format!("lib{name}.so")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex as StdMutex;

    // The search path is read from a process-wide environment variable, so
    // tests that set it must not run concurrently with each other.
    static ENV_GUARD: StdMutex<()> = StdMutex::new(());

    fn stager_with_search_path(dirs: &[&Path]) -> NativeStager {
        let joined = std::env::join_paths(dirs).unwrap();
        // SAFETY: serialized by ENV_GUARD; no other thread reads/writes env vars here.
        unsafe { std::env::set_var(NATIVE_SEARCH_PATH_VAR, joined) };
        NativeStager::new()
    }

    // SAFETY: serialized by ENV_GUARD; no other thread reads/writes env vars here.
    fn clear_search_path_var() {
        unsafe { std::env::remove_var(NATIVE_SEARCH_PATH_VAR) };
    }

    #[test]
    fn stages_first_match_and_caches_it() {
        let _guard = ENV_GUARD.lock().unwrap();
        let a = tempfile::tempdir().unwrap();
        let b = tempfile::tempdir().unwrap();
        let t = tempfile::tempdir().unwrap();

        std::fs::write(a.path().join(platform_library_name("foo")), b"not-this-one").unwrap();
        std::fs::write(b.path().join(platform_library_name("foo")), b"staged").unwrap();

        // a does not have the file, b does: search order should skip a.
        std::fs::remove_file(a.path().join(platform_library_name("foo"))).unwrap();

        let stager = stager_with_search_path(&[a.path(), b.path()]);
        stager.set_temp_dir(Some(t.path().to_path_buf()));

        let staged = stager.find_library("foo").unwrap().unwrap();
        assert_eq!(staged, t.path().join(platform_library_name("foo")));
        assert_eq!(std::fs::read(&staged).unwrap(), b"staged");

        let staged_again = stager.find_library("foo").unwrap().unwrap();
        assert_eq!(staged_again, staged);
        assert_eq!(stager.staged_count(), 1);

        clear_search_path_var();
    }

    #[test]
    fn missing_library_returns_none() {
        let _guard = ENV_GUARD.lock().unwrap();
        let t = tempfile::tempdir().unwrap();
        let stager = stager_with_search_path(&[]);
        stager.set_temp_dir(Some(t.path().to_path_buf()));
        assert!(stager.find_library("nope").unwrap().is_none());
        clear_search_path_var();
    }

    #[test]
    fn set_temp_dir_deletes_previously_staged_files() {
        let _guard = ENV_GUARD.lock().unwrap();
        let search = tempfile::tempdir().unwrap();
        let t1 = tempfile::tempdir().unwrap();
        let t2 = tempfile::tempdir().unwrap();
        std::fs::write(search.path().join(platform_library_name("foo")), b"x").unwrap();

        let stager = stager_with_search_path(&[search.path()]);
        stager.set_temp_dir(Some(t1.path().to_path_buf()));
        let staged = stager.find_library("foo").unwrap().unwrap();
        assert!(staged.exists());

        stager.set_temp_dir(Some(t2.path().to_path_buf()));
        assert!(!staged.exists());
        assert_eq!(stager.staged_count(), 0);

        clear_search_path_var();
    }

    #[test]
    fn no_temp_dir_means_find_library_returns_none() {
        let _guard = ENV_GUARD.lock().unwrap();
        let search = tempfile::tempdir().unwrap();
        std::fs::write(search.path().join(platform_library_name("foo")), b"x").unwrap();
        let stager = stager_with_search_path(&[search.path()]);
        assert!(stager.find_library("foo").unwrap().is_none());
        clear_search_path_var();
    }
}
