//! `ManagedLoader` is the base capability both `DependencyLoader` and
//! `TaskLoader` are built on — a classpath-backed loader with a native
//! stager and zombie fallback attached, and a `closed` flag that redirects
//! `find_class`/`find_resource` once set.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

use crate::class_source::{ClassSource, LoadedClass};
use crate::classpath::Classpath;
use crate::error::Result;
use crate::lock_table::ClassLoadingLock;
use crate::log_sink::LogSink;
use crate::native::NativeStager;
use crate::zombie::{ZombieFallback, ZombieWarning};

pub struct ManagedLoader {
    classpath: Classpath,
    loaded: RwLock<HashMap<String, Arc<LoadedClass>>>,
    lock: ClassLoadingLock,
    closed: AtomicBool,
    zombie: Mutex<Option<Arc<ZombieFallback>>>,
    zombie_warning: ZombieWarning,
    log_sink: Arc<dyn LogSink>,
    stager: NativeStager,
}

impl ManagedLoader {
    pub fn new(classpath: Classpath, allow_zombies: bool, log_sink: Arc<dyn LogSink>) -> Self {
        ManagedLoader {
            classpath,
            loaded: RwLock::new(HashMap::new()),
            lock: ClassLoadingLock::new(),
            closed: AtomicBool::new(false),
            zombie: Mutex::new(None),
            zombie_warning: ZombieWarning::new(allow_zombies),
            log_sink,
            stager: NativeStager::new(),
        }
    }

    pub fn classpath(&self) -> &Classpath {
        &self.classpath
    }

    pub fn lock_table(&self) -> &ClassLoadingLock {
        &self.lock
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    pub fn find_loaded_class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.loaded.read().get(name).cloned()
    }

    /// The actual own-classpath resolution, without acquiring the per-name
    /// lock. A caller that is already running inside that lock (the
    /// dependency layer's own `load_class` delegation chain, which holds it
    /// for the whole lookup) calls this directly through
    /// `find_class_while_locked`; every other caller goes through
    /// `find_class_local`, which takes the lock itself.
    fn resolve_local(&self, name: &str) -> Result<Arc<LoadedClass>> {
        if let Some(class) = self.find_loaded_class(name) {
            return Ok(class);
        }
        let bytes = self.classpath.find_class_bytes(name)?;
        let class = LoadedClass::new(name, bytes);
        self.loaded.write().insert(name.to_string(), class.clone());
        Ok(class)
    }

    /// Resolves `name` against this loader's own classpath, double-checked
    /// under the per-name lock so two threads racing to load the same name
    /// observe a single defined class.
    pub fn find_class_local(&self, name: &str) -> Result<Arc<LoadedClass>> {
        if let Some(class) = self.find_loaded_class(name) {
            return Ok(class);
        }
        self.lock.with_lock(name, || self.resolve_local(name))
    }

    pub fn find_resource_local(&self, name: &str) -> Option<PathBuf> {
        self.classpath.find_resource(name)
    }

    pub fn find_library(&self, name: &str) -> Result<Option<PathBuf>> {
        self.stager.find_library(name)
    }

    pub fn set_temp_dir(&self, dir: Option<PathBuf>) {
        self.stager.set_temp_dir(dir);
    }

    /// `find_class` as seen by the host runtime: once closed, every lookup
    /// is routed to the zombie fallback, constructing it lazily on first use
    /// and emitting the one-shot warning.
    pub fn find_class(&self, self_as_source: &Arc<dyn ClassSource>, name: &str) -> Result<Arc<LoadedClass>> {
        if !self.is_closed() {
            return self.find_class_local(name);
        }
        self.zombie_warning.emit_once(self.log_sink.as_ref(), name);
        self.zombie_fallback(self_as_source).find_class(name)
    }

    /// Same decision as `find_class`, for a caller that is already running
    /// inside this loader's per-name lock and must not acquire it again.
    pub fn find_class_while_locked(
        &self,
        self_as_source: &Arc<dyn ClassSource>,
        name: &str,
    ) -> Result<Arc<LoadedClass>> {
        if !self.is_closed() {
            return self.resolve_local(name);
        }
        self.zombie_warning.emit_once(self.log_sink.as_ref(), name);
        self.zombie_fallback(self_as_source).find_class(name)
    }

    pub fn find_resource(
        &self,
        self_as_source: &Arc<dyn ClassSource>,
        name: &str,
    ) -> Option<PathBuf> {
        if !self.is_closed() {
            return self.find_resource_local(name);
        }
        self.zombie_fallback(self_as_source).find_resource(name)
    }

    fn zombie_fallback(&self, self_as_source: &Arc<dyn ClassSource>) -> Arc<ZombieFallback> {
        let mut zombie = self.zombie.lock();
        if let Some(existing) = zombie.as_ref() {
            return existing.clone();
        }
        let fallback = Arc::new(ZombieFallback::new(self.classpath.clone(), self_as_source.clone()));
        *zombie = Some(fallback.clone());
        fallback
    }

    /// Sets `closed`, drops any retained zombie fallback reference (the
    /// fallback itself, if constructed later, is independent of this slot —
    /// see `zombie_fallback`), and tears down native staging.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        self.stager.teardown();
    }
}
