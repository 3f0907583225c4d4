//! Name-striped mutex used to serialize concurrent `loadClass(name)` calls
//! for the same name through a given loader, without serializing distinct
//! names.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

/// A mapping from class name to a per-name mutex. The table itself is only
/// ever held for the short critical section that inserts or removes an
/// entry; `with_lock`'s closure runs while holding only the per-name lock,
/// so concurrent loads of *different* names proceed in parallel.
#[derive(Default)]
pub struct ClassLoadingLock {
    table: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl ClassLoadingLock {
    pub fn new() -> Self {
        ClassLoadingLock {
            table: Mutex::new(HashMap::new()),
        }
    }

    /// Acquires the mutex for `name`, runs `f`, releases it, and removes the
    /// table entry once no other caller is still holding a clone of it, so
    /// the table never accumulates beyond in-flight loads.
    ///
    /// Removing the entry unconditionally would admit a race: a thread that
    /// joins the table lookup in the instant between the lock being released
    /// and the entry being removed gets a freshly allocated mutex rather than
    /// the one the first thread just held, so two callers for the same name
    /// would run `f` concurrently — exactly the "two loaders mint two
    /// different `Arc<LoadedClass>` for the same name" failure the lock
    /// exists to prevent. Guard against it by only removing the entry when
    /// this call's clone and the table's clone are the only two outstanding
    /// (`Arc::strong_count == 2`, checked under the table lock so the count
    /// can't change underneath the check); otherwise another caller already
    /// joined on the same mutex and must be the one to remove it.
    pub fn with_lock<T>(&self, name: &str, f: impl FnOnce() -> T) -> T {
        let entry = {
            let mut table = self.table.lock();
            table
                .entry(name.to_string())
                .or_insert_with(|| Arc::new(Mutex::new(())))
                .clone()
        };

        let result = {
            let _guard = entry.lock();
            f()
        };

        {
            let mut table = self.table.lock();
            let still_sole_owner = table
                .get(name)
                .is_some_and(|current| Arc::ptr_eq(current, &entry) && Arc::strong_count(current) == 2);
            if still_sole_owner {
                table.remove(name);
            }
        }

        result
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.table.lock().len()
    }
}
