//! layered-classloader is a layered classloading engine for running user
//! code (tests and application runs) inside a build process.
//!
//! It keeps the long-lived dependency classpath loaded and cached between
//! task invocations, reloads only the frequently changing project classes,
//! supports reflective lookups that cross the layer boundary, and stages
//! native libraries referenced from loaded code into a per-task temp
//! directory.
//!
//! A typical scenario looks like this:
//!
//! ```ignore
//! 1. The build tool starts a LoaderPool over the project's dependency
//!    classpath, once per build.
//! 2. For each task (a test run, an application run), the build tool
//!    checks out a TaskLoader with that task's full classpath and a
//!    scratch temp directory for native libraries.
//! 3. The task runs user code through the TaskLoader. Class lookups that
//!    miss locally delegate up to a shared, cached DependencyLoader; class
//!    lookups the dependency layer can only satisfy by reflectively asking
//!    back down into the task's own classes use the reverse edge.
//! 4. The build tool closes the TaskLoader at task end. Its dependency
//!    layer returns to the pool — reused as-is if it came through the task
//!    clean, or discarded if a reverse lookup captured a class tied to this
//!    task's identity.
//! ```
//!
//! This crate does not parse or execute bytecode itself — class and
//! resource *content* resolution against a classpath is implemented here,
//! but defining, linking, and running the resulting bytes is the host
//! runtime's job, reached through the [`ClassSource`] seam.

mod class_source;
mod classpath;
mod dependency;
mod error;
mod lock_table;
mod log_sink;
mod managed;
mod native;
mod pool;
mod task;
mod zombie;

pub use class_source::{ClassSource, LoadedClass, NoopParent};
pub use classpath::Classpath;
pub use dependency::DependencyLoader;
pub use error::{Error, Result};
pub use log_sink::{default_log_sink, DefaultLogSink, LogSink};
pub use native::{NativeLibRegistry, NativeStager};
pub use pool::LoaderPool;
pub use task::TaskLoader;
