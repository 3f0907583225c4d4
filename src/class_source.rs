//! The loaded-class identity model and the `ClassSource` seam.
//!
//! A real host runtime hands back an opaque, runtime-defined class object
//! from `defineClass`; this crate models that as an `Arc<LoadedClass>` so
//! that identity comparisons (`Arc::ptr_eq`) mean the same thing "same
//! runtime class identity" means to the JVM: a class is defined at most
//! once per loader instance, and every later lookup for the same name on
//! that instance returns the same `Arc`.

use std::sync::Arc;

use crate::error::Result;

/// A class resolved to its backing bytes and the name it was resolved under.
#[derive(Debug)]
pub struct LoadedClass {
    pub name: String,
    pub bytes: Arc<[u8]>,
}

impl LoadedClass {
    pub fn new(name: impl Into<String>, bytes: Vec<u8>) -> Arc<Self> {
        Arc::new(LoadedClass {
            name: name.into(),
            bytes: bytes.into(),
        })
    }
}

/// Anything capable of answering `loadClass`/`findLoadedClass` the way a
/// standard delegating classloader does. The dependency layer's parent
/// loader reference is one of these; a closed loader handing its
/// already-defined classes to its [`crate::zombie::ZombieFallback`] is
/// another.
pub trait ClassSource: Send + Sync {
    /// Returns a class already defined by this source, without attempting
    /// to load it. Used by the zombie fallback to keep serving identity for
    /// classes a now-closed loader defined before it was closed.
    fn find_loaded_class(&self, name: &str) -> Option<Arc<LoadedClass>>;

    /// Standard delegating lookup: already-loaded check, then whatever this
    /// source's own resolution strategy is.
    fn load_class(&self, name: &str, resolve: bool) -> Result<Arc<LoadedClass>>;
}

/// Stand-in for "no parent above the dependency layer" — every lookup raises
/// `NotFound` immediately, pushing resolution down to the dependency
/// classpath. Production callers should supply the host runtime's actual
/// system/application loader instead.
#[derive(Debug, Default)]
pub struct NoopParent;

impl ClassSource for NoopParent {
    fn find_loaded_class(&self, _name: &str) -> Option<Arc<LoadedClass>> {
        None
    }

    fn load_class(&self, name: &str, _resolve: bool) -> Result<Arc<LoadedClass>> {
        Err(crate::error::Error::not_found(name))
    }
}
