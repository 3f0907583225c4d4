//! Artifact paths and classpath-relative name resolution.
//!
//! Classpath *discovery* — figuring out which artifact paths a task needs —
//! happens elsewhere; this module only resolves an already-assembled,
//! ordered list of directory entries against a dotted class name or a
//! resource name, first entry wins, since the order in which dependencies
//! are listed can change which copy of a given class gets picked up.

use std::path::{Path, PathBuf};

use crate::error::{Error, Result};

/// An ordered, order-significant sequence of artifact paths.
#[derive(Debug, Clone, Default)]
pub struct Classpath {
    entries: Vec<PathBuf>,
}

impl Classpath {
    pub fn new(entries: Vec<PathBuf>) -> Self {
        Classpath { entries }
    }

    pub fn entries(&self) -> &[PathBuf] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// `a.b.Foo` -> `a/b/Foo.class`, consistent with the binary module
    /// naming convention the host runtime this crate's classes are loaded
    /// into already expects.
    fn class_file_name(name: &str) -> PathBuf {
        let mut rel = PathBuf::new();
        let mut parts = name.split('.').peekable();
        while let Some(part) = parts.next() {
            if parts.peek().is_none() {
                rel.push(format!("{part}.class"));
            } else {
                rel.push(part);
            }
        }
        rel
    }

    /// Locates and reads the bytes for `name`, walking entries in order.
    /// Returns `Error::NotFound` if no entry has a matching file; callers
    /// that can recover by falling through to another layer match on that
    /// error kind rather than treating it as fatal.
    pub fn find_class_bytes(&self, name: &str) -> Result<Vec<u8>> {
        let rel = Self::class_file_name(name);
        for entry in &self.entries {
            let candidate = entry.join(&rel);
            match std::fs::read(&candidate) {
                Ok(bytes) => return Ok(bytes),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
                Err(e) => return Err(Error::Io(e)),
            }
        }
        Err(Error::not_found(name))
    }

    /// Locates a resource by a `/`-separated path relative to each entry,
    /// first entry wins. Returns `None` rather than an error — resources are
    /// optional by nature in the host runtime's resource-lookup contract.
    pub fn find_resource(&self, name: &str) -> Option<PathBuf> {
        for entry in &self.entries {
            let candidate = entry.join(name);
            if candidate.is_file() {
                return Some(candidate);
            }
        }
        None
    }

    /// True if every entry this classpath was built from still exists on
    /// disk. Used by the zombie fallback's missing-file diagnostic.
    pub fn missing_entries(&self) -> Vec<&Path> {
        self.entries
            .iter()
            .filter(|p| !p.exists())
            .map(PathBuf::as_path)
            .collect()
    }
}
