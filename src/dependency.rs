//! `DependencyLoader` is the cacheable middle layer. Holds the dependency
//! classpath, delegates upward to the real parent loader, and — only when
//! asked with `reverse_lookup = true` — falls through to a registered
//! descendant `TaskLoader` on a miss, marking itself dirty the first time
//! that reverse edge actually resolves something.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::class_source::{ClassSource, LoadedClass};
use crate::classpath::Classpath;
use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use crate::managed::ManagedLoader;
use crate::task::TaskLoader;

struct DependencyLoaderInner {
    core: ManagedLoader,
    parent: Arc<dyn ClassSource>,
    descendant: Mutex<Option<TaskLoader>>,
    dirty: AtomicBool,
    // A separate single-slot resource sub-loader built from the task's full
    // classpath at `setup` time; `find_resource` delegates to it, or returns
    // `None` if `setup` has not run yet for this checkout.
    resource_sub_loader: Mutex<Option<Classpath>>,
}

/// Cheaply cloneable handle; clones share the same pooled state. The pool
/// hands out and reclaims these by value as the single idle occupant of its
/// pool slot.
#[derive(Clone)]
pub struct DependencyLoader {
    inner: Arc<DependencyLoaderInner>,
}

impl DependencyLoader {
    pub(crate) fn new(
        dependency_cp: Classpath,
        parent: Arc<dyn ClassSource>,
        allow_zombies: bool,
        log_sink: Arc<dyn LogSink>,
    ) -> Self {
        DependencyLoader {
            inner: Arc::new(DependencyLoaderInner {
                core: ManagedLoader::new(dependency_cp, allow_zombies, log_sink),
                parent,
                descendant: Mutex::new(None),
                dirty: AtomicBool::new(false),
                resource_sub_loader: Mutex::new(None),
            }),
        }
    }

    fn self_as_source(&self) -> Arc<dyn ClassSource> {
        Arc::new(self.clone())
    }

    pub fn is_dirty(&self) -> bool {
        self.inner.dirty.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.core.is_closed()
    }

    /// Called once per checkout: installs the resource sub-loader built
    /// from the task's full classpath and the native stager's temp
    /// directory for this checkout.
    pub fn setup(&self, temp_dir: PathBuf, full_cp: Classpath) {
        *self.inner.resource_sub_loader.lock() = Some(full_cp);
        self.inner.core.set_temp_dir(Some(temp_dir));
    }

    /// Registers `descendant` as the reverse-edge child, overwriting
    /// whatever was set on the previous checkout. A `TaskLoader`'s
    /// constructor is the only caller, and the previous occupant is always
    /// already closed by the time a new one is installed.
    pub(crate) fn set_descendant(&self, descendant: TaskLoader) {
        *self.inner.descendant.lock() = Some(descendant);
    }

    /// Standard `loadClass(name, resolve)`, treated as `reverse_lookup =
    /// true`.
    pub fn load_class(&self, name: &str, resolve: bool) -> Result<Arc<LoadedClass>> {
        self.load_class_ext(name, resolve, true)
    }

    /// The extended three-argument form. The child `TaskLoader` calls this
    /// with `reverse_lookup = false` during its own bottom-up walk so the
    /// parent never calls back down into the child mid-walk.
    ///
    /// The whole delegate-then-find-then-reverse-lookup sequence runs under
    /// this loader's per-name lock, the same way `java.lang.ClassLoader`'s
    /// own `loadClass` holds its class-loading lock for the entire body —
    /// otherwise two threads racing to load the same name could both
    /// delegate to the parent and both race into the reverse lookup at
    /// once. The own-classpath fallback therefore calls straight into
    /// `ManagedLoader::find_class_while_locked`, which assumes the lock is
    /// already held, instead of the self-locking `find_class`.
    pub fn load_class_ext(
        &self,
        name: &str,
        resolve: bool,
        reverse_lookup: bool,
    ) -> Result<Arc<LoadedClass>> {
        let _ = resolve;
        if let Some(class) = self.inner.core.find_loaded_class(name) {
            return Ok(class);
        }

        self.inner.core.lock_table().with_lock(name, || {
            let normal_lookup = self.inner.parent.load_class(name, false).or_else(|e| {
                if e.is_not_found() {
                    self.inner
                        .core
                        .find_class_while_locked(&self.self_as_source(), name)
                } else {
                    Err(e)
                }
            });

            match normal_lookup {
                Ok(class) => Ok(class),
                Err(e) if e.is_not_found() && reverse_lookup => self.reverse_lookup(name),
                Err(e) => Err(e),
            }
        })
    }

    /// On a miss from the normal delegation path, consult the registered
    /// descendant. Success dirties this loader permanently — the class it
    /// just captured has an identity tied to a transient `TaskLoader`, so
    /// this `DependencyLoader` must never be cached again. Called while
    /// already holding this loader's per-name lock for `name`.
    fn reverse_lookup(&self, name: &str) -> Result<Arc<LoadedClass>> {
        let descendant = self.inner.descendant.lock().clone();
        match descendant {
            Some(child) => {
                let class = child.lookup_class(name)?;
                self.inner.dirty.store(true, Ordering::Release);
                Ok(class)
            }
            None => Err(Error::not_found(name)),
        }
    }

    pub fn find_class(&self, name: &str) -> Result<Arc<LoadedClass>> {
        self.inner.core.find_class(&self.self_as_source(), name)
    }

    /// Resources are resolved against the per-checkout resource sub-loader,
    /// not the stable dependency classpath, since a checkout's dynamic
    /// classpath may contain resources that shadow the dependency layer's.
    pub fn find_resource(&self, name: &str) -> Option<PathBuf> {
        if self.is_closed() {
            return self.inner.core.find_resource(&self.self_as_source(), name);
        }
        self.inner
            .resource_sub_loader
            .lock()
            .as_ref()
            .and_then(|cp| cp.find_resource(name))
    }

    pub fn find_library(&self, name: &str) -> Result<Option<PathBuf>> {
        self.inner.core.find_library(name)
    }

    pub fn close(&self) {
        self.inner.core.close();
    }
}

impl ClassSource for DependencyLoader {
    fn find_loaded_class(&self, name: &str) -> Option<Arc<LoadedClass>> {
        self.inner.core.find_loaded_class(name)
    }

    fn load_class(&self, name: &str, resolve: bool) -> Result<Arc<LoadedClass>> {
        DependencyLoader::load_class(self, name, resolve)
    }
}
