//! `LoaderPool` is a single-slot cache of idle `DependencyLoader` instances.
//! Checkout reuses the slot's occupant or creates a fresh `DependencyLoader`;
//! checkin caches a clean one, closes a dirty one, and closes whatever
//! occupant it displaces ("last returned wins") when the slot was already
//! full.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;

use crate::class_source::ClassSource;
use crate::classpath::Classpath;
use crate::dependency::DependencyLoader;
use crate::error::{Error, Result};
use crate::log_sink::LogSink;
use crate::task::TaskLoader;

pub struct LoaderPool {
    dependency_cp: Classpath,
    parent: Arc<dyn ClassSource>,
    allow_zombies: bool,
    log_sink: Arc<dyn LogSink>,
    slot: Mutex<Option<DependencyLoader>>,
    closed: AtomicBool,
}

impl LoaderPool {
    /// Constructed over a fixed dependency classpath and parent loader
    /// reference; returned wrapped in `Arc` because every `TaskLoader` it
    /// hands out needs a stable handle back to it for `close`-time checkin.
    pub fn new(
        dependency_cp: Classpath,
        parent: Arc<dyn ClassSource>,
        allow_zombies: bool,
        log_sink: Arc<dyn LogSink>,
    ) -> Arc<Self> {
        Arc::new(LoaderPool {
            dependency_cp,
            parent,
            allow_zombies,
            log_sink,
            slot: Mutex::new(None),
            closed: AtomicBool::new(false),
        })
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Reuses the idle `DependencyLoader` if one is in the slot, otherwise
    /// creates a fresh one, stages it for this checkout, and wraps it in a
    /// new `TaskLoader`.
    pub fn checkout(
        self: &Arc<Self>,
        full_cp: Classpath,
        temp_dir: PathBuf,
    ) -> Result<TaskLoader> {
        if self.is_closed() {
            return Err(Error::PoolClosed);
        }

        let dependency = {
            let mut slot = self.slot.lock();
            slot.take().unwrap_or_else(|| {
                DependencyLoader::new(
                    self.dependency_cp.clone(),
                    self.parent.clone(),
                    self.allow_zombies,
                    self.log_sink.clone(),
                )
            })
        };

        dependency.setup(temp_dir.clone(), full_cp.clone());

        Ok(TaskLoader::new(
            full_cp,
            temp_dir,
            dependency,
            self.clone(),
            self.allow_zombies,
            self.log_sink.clone(),
        ))
    }

    /// Called by a `TaskLoader`'s `close`. A dirty loader, or any loader
    /// returned after the pool itself was closed, is closed rather than
    /// cached. Otherwise it is installed into the slot, closing whatever
    /// occupant it displaces, and the closed flag is re-checked after
    /// install to close a racing concurrent `close()`.
    pub fn checkin(&self, dependency: DependencyLoader) {
        if dependency.is_dirty() {
            dependency.close();
            return;
        }
        if self.is_closed() {
            dependency.close();
            return;
        }

        {
            let mut slot = self.slot.lock();
            if let Some(previous) = slot.replace(dependency) {
                previous.close();
            }
        }

        if self.is_closed() {
            if let Some(leaked) = self.slot.lock().take() {
                leaked.close();
            }
        }
    }

    /// Closes the pool: no further checkouts succeed, and any checkout still
    /// in flight will have its checkin close the returned loader instead of
    /// caching it.
    pub fn close(&self) {
        self.closed.store(true, Ordering::Release);
        if let Some(dependency) = self.slot.lock().take() {
            dependency.close();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::class_source::NoopParent;
    use crate::log_sink::default_log_sink;

    fn new_pool(dep_dir: &std::path::Path) -> Arc<LoaderPool> {
        LoaderPool::new(
            Classpath::new(vec![dep_dir.to_path_buf()]),
            Arc::new(NoopParent),
            false,
            default_log_sink(),
        )
    }

    #[test]
    fn reuses_dependency_loader_across_checkouts_s1() {
        let dep_dir = tempfile::tempdir().unwrap();
        std::fs::write(dep_dir.path().join("Foo.class"), b"dep-foo").unwrap();
        let app1 = tempfile::tempdir().unwrap();
        let app2 = tempfile::tempdir().unwrap();
        let t1 = tempfile::tempdir().unwrap();
        let t2 = tempfile::tempdir().unwrap();

        let pool = new_pool(dep_dir.path());

        let task1 = pool
            .checkout(
                Classpath::new(vec![dep_dir.path().to_path_buf(), app1.path().to_path_buf()]),
                t1.path().to_path_buf(),
            )
            .unwrap();
        let first = task1.load_class("Foo", false).unwrap();
        task1.close();

        let task2 = pool
            .checkout(
                Classpath::new(vec![dep_dir.path().to_path_buf(), app2.path().to_path_buf()]),
                t2.path().to_path_buf(),
            )
            .unwrap();
        let second = task2.load_class("Foo", false).unwrap();

        assert!(Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn dirty_dependency_loader_is_not_cached_s2() {
        let dep_dir = tempfile::tempdir().unwrap();
        let app1 = tempfile::tempdir().unwrap();
        std::fs::write(app1.path().join("Plugin.class"), b"plugin").unwrap();
        let t1 = tempfile::tempdir().unwrap();

        let pool = new_pool(dep_dir.path());

        let task1 = pool
            .checkout(
                Classpath::new(vec![dep_dir.path().to_path_buf(), app1.path().to_path_buf()]),
                t1.path().to_path_buf(),
            )
            .unwrap();

        // Simulate `dep.UsesReflection` reflectively loading `app.Plugin`:
        // code whose defining loader is the dependency layer calls back
        // into its own `loadClass`, which only the dynamic classpath (via
        // the reverse edge) can satisfy.
        let plugin = task1.parent().load_class("Plugin", false).unwrap();
        assert_eq!(&*plugin.bytes, b"plugin".as_slice());
        assert!(task1.parent().is_dirty());

        task1.close();
        // Dirty, so it must have been closed rather than cached.
        assert!(pool.slot.lock().is_none());

        let app2 = tempfile::tempdir().unwrap();
        let t2 = tempfile::tempdir().unwrap();
        let task2 = pool
            .checkout(
                Classpath::new(vec![dep_dir.path().to_path_buf(), app2.path().to_path_buf()]),
                t2.path().to_path_buf(),
            )
            .unwrap();
        // The second checkout got a brand new, clean DependencyLoader.
        assert!(!task2.parent().is_dirty());
    }

    #[test]
    fn checkout_after_close_is_pool_closed_s5() {
        let dep_dir = tempfile::tempdir().unwrap();
        let pool = new_pool(dep_dir.path());
        pool.close();
        let err = pool
            .checkout(Classpath::new(vec![]), tempfile::tempdir().unwrap().path().to_path_buf())
            .unwrap_err();
        assert!(matches!(err, Error::PoolClosed));
    }

    #[test]
    fn checkin_after_close_closes_argument_and_leaves_slot_empty() {
        let dep_dir = tempfile::tempdir().unwrap();
        let pool = new_pool(dep_dir.path());
        let t1 = tempfile::tempdir().unwrap();
        let task = pool
            .checkout(Classpath::new(vec![dep_dir.path().to_path_buf()]), t1.path().to_path_buf())
            .unwrap();

        pool.close();
        task.close();

        assert!(pool.slot.lock().is_none());
    }

    #[test]
    fn displacing_slot_occupant_closes_the_previous_one_keep_last() {
        let dep_dir = tempfile::tempdir().unwrap();
        let pool = new_pool(dep_dir.path());

        let t1 = tempfile::tempdir().unwrap();
        let task1 = pool
            .checkout(Classpath::new(vec![dep_dir.path().to_path_buf()]), t1.path().to_path_buf())
            .unwrap();
        task1.close();

        let t2 = tempfile::tempdir().unwrap();
        let task2 = pool
            .checkout(Classpath::new(vec![dep_dir.path().to_path_buf()]), t2.path().to_path_buf())
            .unwrap();
        task2.close();

        // Only one occupant remains idle in the slot.
        assert!(pool.slot.lock().is_some());
    }

    #[test]
    fn task_loader_find_resource_falls_through_to_dependency_resource_sub_loader() {
        let dep_dir = tempfile::tempdir().unwrap();
        std::fs::write(dep_dir.path().join("banner.txt"), b"hello").unwrap();
        let app_dir = tempfile::tempdir().unwrap();
        let t1 = tempfile::tempdir().unwrap();

        let pool = new_pool(dep_dir.path());
        let task = pool
            .checkout(
                Classpath::new(vec![dep_dir.path().to_path_buf(), app_dir.path().to_path_buf()]),
                t1.path().to_path_buf(),
            )
            .unwrap();

        let resolved = task.find_resource("banner.txt").unwrap();
        assert_eq!(std::fs::read(&resolved).unwrap(), b"hello");

        // Exercise DependencyLoader::find_resource directly too, through the
        // same resource sub-loader `setup()` installed for this checkout --
        // this is the path TaskLoader::find_resource falls through to.
        assert_eq!(task.parent().find_resource("banner.txt"), Some(resolved));
    }

    #[test]
    fn pool_close_racing_task_close_leaves_no_occupant_s4() {
        let dep_dir = tempfile::tempdir().unwrap();
        let pool = new_pool(dep_dir.path());
        let t1 = tempfile::tempdir().unwrap();
        let task = pool
            .checkout(Classpath::new(vec![dep_dir.path().to_path_buf()]), t1.path().to_path_buf())
            .unwrap();

        let pool_for_close = pool.clone();
        let closer = std::thread::spawn(move || pool_for_close.close());
        let task_closer = std::thread::spawn(move || task.close());

        closer.join().unwrap();
        task_closer.join().unwrap();

        assert!(pool.slot.lock().is_none());
        assert!(pool.is_closed());
    }
}
