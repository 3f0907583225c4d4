//! `ZombieFallback` keeps serving class/resource lookups after a managed
//! loader has been closed, instead of handing the host runtime a null
//! reference when a dangling background thread from a finished task calls
//! back in.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::class_source::{ClassSource, LoadedClass};
use crate::classpath::Classpath;
use crate::error::Result;
use crate::log_sink::LogSink;

/// Constructed lazily on the first post-close lookup and retained for the
/// lifetime of the closed loader.
pub struct ZombieFallback {
    classpath: Classpath,
    parent: Arc<dyn ClassSource>,
}

impl ZombieFallback {
    pub fn new(classpath: Classpath, parent: Arc<dyn ClassSource>) -> Self {
        ZombieFallback { classpath, parent }
    }

    /// The closed loader still answers `find_loaded_class` for classes it
    /// defined before closing; only a genuine miss falls through to
    /// re-reading the classpath from disk.
    pub fn find_class(&self, name: &str) -> Result<Arc<LoadedClass>> {
        if let Some(class) = self.parent.find_loaded_class(name) {
            return Ok(class);
        }

        match self.classpath.find_class_bytes(name) {
            Ok(bytes) => Ok(LoadedClass::new(name, bytes)),
            Err(e) => {
                self.report_missing_entries(name);
                Err(e)
            }
        }
    }

    pub fn find_resource(&self, name: &str) -> Option<PathBuf> {
        self.classpath.find_resource(name)
    }

    /// Before re-raising `NotFound`, scan the configured classpath entries
    /// for ones whose backing file no longer exists and report them
    /// directly to stderr — logging may have already been shut down by the
    /// time a zombie lookup arrives.
    fn report_missing_entries(&self, requested: &str) {
        let missing = self.classpath.missing_entries();
        if missing.is_empty() {
            return;
        }
        eprintln!(
            "[layered-classloader] zombie lookup for '{requested}' failed; the following \
             classpath entries no longer exist on disk (they may have been removed by a \
             shutdown hook):"
        );
        for path in missing {
            eprintln!("  - {}", path.display());
        }
    }
}

/// Tracks whether the owning loader has emitted its one-shot zombie warning
/// yet — exactly one warning is emitted no matter how many post-close
/// lookups occur.
pub struct ZombieWarning {
    allow_zombies: bool,
    warned: AtomicBool,
}

impl ZombieWarning {
    pub fn new(allow_zombies: bool) -> Self {
        ZombieWarning {
            allow_zombies,
            warned: AtomicBool::new(false),
        }
    }

    /// Emits the warning through `log_sink` exactly once across the life of
    /// the loader, naming the current thread and the class being looked up.
    pub fn emit_once(&self, log_sink: &dyn LogSink, class_name: &str) {
        if cfg!(feature = "no-zombie-warnings") || self.allow_zombies {
            return;
        }
        if self
            .warned
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
        {
            let thread = std::thread::current();
            let thread_name = thread.name().unwrap_or("<unnamed>");
            log_sink.warn(&format!(
                "class load for '{class_name}' on thread '{thread_name}' arrived after this \
                 loader was closed; falling back to a zombie classloader"
            ));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_source::NoopParent;
    use std::sync::Mutex;

    fn classpath_with(name: &str, bytes: &[u8]) -> (tempfile::TempDir, Classpath) {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join(name), bytes).unwrap();
        let cp = Classpath::new(vec![dir.path().to_path_buf()]);
        (dir, cp)
    }

    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<String>>,
    }
    impl LogSink for RecordingSink {
        fn warn(&self, message: &str) {
            self.messages.lock().unwrap().push(message.to_string());
        }
    }

    #[test]
    fn serves_lookup_from_classpath_after_close() {
        let (_dir, cp) = classpath_with("Foo.class", b"bytes");
        let fallback = ZombieFallback::new(cp, Arc::new(NoopParent));
        let class = fallback.find_class("Foo").unwrap();
        assert_eq!(&*class.bytes, b"bytes".as_slice());
    }

    #[test]
    fn warning_fires_exactly_once() {
        let sink = RecordingSink::default();
        let warning = ZombieWarning::new(false);
        warning.emit_once(&sink, "dep.Foo");
        warning.emit_once(&sink, "dep.Bar");
        warning.emit_once(&sink, "dep.Baz");
        assert_eq!(sink.messages.lock().unwrap().len(), 1);
        assert!(sink.messages.lock().unwrap()[0].contains("dep.Foo"));
    }

    #[test]
    fn allow_zombies_suppresses_warning() {
        let sink = RecordingSink::default();
        let warning = ZombieWarning::new(true);
        warning.emit_once(&sink, "dep.Foo");
        assert!(sink.messages.lock().unwrap().is_empty());
    }
}
