//! `TaskLoader` is the per-task bottom layer. Holds the dynamic classpath;
//! delegates upward to its parent `DependencyLoader` before falling back to
//! its own classpath; returns the parent to the pool on close.

use std::sync::Arc;

use crate::class_source::{ClassSource, LoadedClass};
use crate::classpath::Classpath;
use crate::dependency::DependencyLoader;
use crate::error::Result;
use crate::log_sink::LogSink;
use crate::managed::ManagedLoader;
use crate::pool::LoaderPool;

struct TaskLoaderInner {
    core: ManagedLoader,
    parent: DependencyLoader,
    pool: Arc<LoaderPool>,
}

/// Cheaply cloneable handle onto the per-task loader; every clone shares the
/// same underlying state. A given `DependencyLoader` is never shared
/// between two live `TaskLoader`s at once — that invariant is about the
/// parent, not about this handle needing to be unique.
#[derive(Clone)]
pub struct TaskLoader {
    inner: Arc<TaskLoaderInner>,
}

impl TaskLoader {
    /// Constructs a new task loader over `dynamic_cp` with `parent` as its
    /// parent `DependencyLoader`, and registers itself as that parent's
    /// reverse-edge descendant.
    pub(crate) fn new(
        dynamic_cp: Classpath,
        temp_dir: std::path::PathBuf,
        parent: DependencyLoader,
        pool: Arc<LoaderPool>,
        allow_zombies: bool,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        let core = ManagedLoader::new(dynamic_cp, allow_zombies, log_sink);
        core.set_temp_dir(Some(temp_dir));
        let loader = TaskLoader {
            inner: Arc::new(TaskLoaderInner { core, parent, pool }),
        };
        loader.inner.parent.set_descendant(loader.clone());
        loader
    }

    fn self_as_source(&self) -> Arc<dyn ClassSource> {
        Arc::new(self.clone())
    }

    /// Standard `loadClass(name, resolve)`: already-loaded check, then
    /// upward delegation to the parent with `reverseLookup=false` (so the
    /// parent never calls back down into this loader while it is still in
    /// the middle of its own bottom-up walk), then this loader's own
    /// `findClass`.
    pub fn load_class(&self, name: &str, resolve: bool) -> Result<Arc<LoadedClass>> {
        if let Some(class) = self.inner.core.find_loaded_class(name) {
            let _ = resolve;
            return Ok(class);
        }

        match self.inner.parent.load_class_ext(name, false, false) {
            Ok(class) => Ok(class),
            Err(e) if e.is_not_found() => self.find_class(name),
            Err(e) => Err(e),
        }
    }

    /// Public entry the parent's reverse edge invokes: resolves `name`
    /// directly against this loader's own dynamic classpath, bypassing the
    /// upward delegation step entirely.
    pub fn lookup_class(&self, name: &str) -> Result<Arc<LoadedClass>> {
        self.find_class(name)
    }

    pub fn find_class(&self, name: &str) -> Result<Arc<LoadedClass>> {
        self.inner.core.find_class(&self.self_as_source(), name)
    }

    /// Delegates first to the parent `DependencyLoader`'s per-checkout
    /// resource sub-loader, which was built from this task's full classpath
    /// and so already spans both layers; falls back to this loader's own
    /// classpath only if the parent has nothing (e.g. not yet set up).
    pub fn find_resource(&self, name: &str) -> Option<std::path::PathBuf> {
        if let Some(resource) = self.inner.parent.find_resource(name) {
            return Some(resource);
        }
        self.inner.core.find_resource(&self.self_as_source(), name)
    }

    /// Native library staging through this loader's own `NativeStager`. The
    /// dependency layer has a separate one, staged from its own temp
    /// directory via `DependencyLoader::setup`.
    pub fn find_library(&self, name: &str) -> Result<Option<std::path::PathBuf>> {
        self.inner.core.find_library(name)
    }

    /// Checks the parent back into the pool first, then closes this loader.
    /// The ordering matters: the parent is still live at this point, and
    /// it's the pool's checkin that decides its fate.
    pub fn close(&self) {
        self.inner.pool.checkin(self.inner.parent.clone());
        self.inner.core.close();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.core.is_closed()
    }

    #[cfg(test)]
    pub(crate) fn parent(&self) -> &DependencyLoader {
        &self.inner.parent
    }
}

impl ClassSource for TaskLoader {
    fn find_loaded_class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.inner.core.find_loaded_class(name)
    }

    fn load_class(&self, name: &str, resolve: bool) -> Result<Arc<LoadedClass>> {
        TaskLoader::load_class(self, name, resolve)
    }
}
