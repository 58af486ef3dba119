//! Hybrid task/thread concurrency bridge used by generated code.
//!
//! Scheduling model is parallel OS threads with atomic coordination — there
//! is no cooperative scheduler. `bridge_init`/`bridge_cleanup` bracket the
//! bridge's lifetime; callers are responsible for not racing those two
//! calls against anything else per spec §5.

pub mod callback_queue;
pub mod task;
pub mod thread_registry;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::atomics::CallOnce;
use crate::error::{Error, Result};
use crate::stats::StatisticsRegistry;

pub use callback_queue::{Callback, CallbackQueue};
pub use task::{TaskHandle, TaskOutcome, TaskRegistry, TaskState};
pub use thread_registry::ThreadRegistry;

/// Options controlling how `create_thread` spawns its worker.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreadCreateOptions {
    /// Prefer the platform's native thread creation (`std::thread::spawn`)
    /// over a raw POSIX `pthread_create`. On non-Unix targets this is
    /// always effectively true.
    pub prefer_native: bool,
}

/// The concurrency bridge: task registry, callback queue, and thread
/// registry, plus an optional link into the shared statistics registry.
pub struct ConcurrencyBridge {
    init_guard: CallOnce,
    initialized: AtomicBool,
    max_tasks: usize,
    max_callbacks: usize,
    pub tasks: TaskRegistry,
    pub callbacks: CallbackQueue,
    pub threads: ThreadRegistry,
    stats: Option<Arc<StatisticsRegistry>>,
}

impl ConcurrencyBridge {
    pub fn new() -> Self {
        Self {
            init_guard: CallOnce::new(),
            initialized: AtomicBool::new(false),
            max_tasks: 0,
            max_callbacks: 0,
            tasks: TaskRegistry::new(),
            callbacks: CallbackQueue::new(),
            threads: ThreadRegistry::new(),
            stats: None,
        }
    }

    pub fn with_statistics(mut self, stats: Arc<StatisticsRegistry>) -> Self {
        self.stats = Some(stats);
        self
    }

    /// Once-only initialization. A second call after a successful first call
    /// is a no-op, matching spec §4.3.
    pub fn bridge_init(&mut self, max_tasks: usize, max_callbacks: usize) -> Result<()> {
        if self.initialized.load(Ordering::Acquire) {
            return Ok(());
        }
        self.max_tasks = max_tasks;
        self.max_callbacks = max_callbacks;
        self.init_guard.call_once(|| {
            self.initialized.store(true, Ordering::Release);
        });
        log::debug!(
            "concurrency bridge initialized (max_tasks={max_tasks}, max_callbacks={max_callbacks})"
        );
        Ok(())
    }

    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Broadcasts shutdown, drains the task registry, clears the thread
    /// registry, and clears the initialized flag.
    pub fn bridge_cleanup(&mut self) {
        self.callbacks.shutdown();
        self.tasks.clear();
        self.threads.clear();
        self.initialized.store(false, Ordering::Release);
        log::debug!("concurrency bridge cleaned up");
    }

    /// Spawns a worker thread running `func`. Hybrid: native `std::thread`
    /// when `options.prefer_native` is set or the platform has no POSIX
    /// thread API; a raw `pthread_create` otherwise.
    pub fn create_thread(
        &self,
        func: impl FnOnce() + Send + 'static,
        options: ThreadCreateOptions,
    ) -> Result<()> {
        if let Some(stats) = &self.stats {
            stats.record_thread_created();
        }
        #[cfg(unix)]
        {
            if options.prefer_native {
                self.spawn_native(func)
            } else {
                self.spawn_posix(func)
            }
        }
        #[cfg(not(unix))]
        {
            self.spawn_native(func)
        }
    }

    fn spawn_native(&self, func: impl FnOnce() + Send + 'static) -> Result<()> {
        std::thread::Builder::new()
            .spawn(func)
            .map(|_| ())
            .map_err(|e| Error::Resource(format!("native thread spawn failed: {e}")))
    }

    #[cfg(unix)]
    fn spawn_posix(&self, func: impl FnOnce() + Send + 'static) -> Result<()> {
        // A raw pthread so that, in principle, generated code can opt out of
        // the std runtime's thread bookkeeping. The trampoline recovers the
        // boxed closure and runs it; the thread is detached immediately
        // since results flow back through `TaskHandle`, not `pthread_join`.
        extern "C" fn trampoline(arg: *mut libc::c_void) -> *mut libc::c_void {
            // SAFETY: `arg` was produced by `Box::into_raw` below and is
            // passed through pthread's opaque argument exactly once.
            let closure: Box<Box<dyn FnOnce() + Send>> = unsafe { Box::from_raw(arg as *mut _) };
            closure();
            std::ptr::null_mut()
        }

        let boxed: Box<Box<dyn FnOnce() + Send>> = Box::new(Box::new(func));
        let raw = Box::into_raw(boxed) as *mut libc::c_void;

        // SAFETY: `attr` is a valid, initialized `pthread_attr_t`; `thread`
        // is a valid out-pointer; `trampoline` matches the required
        // `pthread_create` signature and takes ownership of `raw`.
        unsafe {
            let mut thread: libc::pthread_t = std::mem::zeroed();
            let mut attr: libc::pthread_attr_t = std::mem::zeroed();
            libc::pthread_attr_init(&mut attr);
            let rc = libc::pthread_create(&mut thread, &attr, trampoline, raw);
            libc::pthread_attr_destroy(&mut attr);
            if rc != 0 {
                // Reclaim the box we failed to hand off.
                drop(Box::from_raw(raw as *mut Box<dyn FnOnce() + Send>));
                return Err(Error::Resource(format!("pthread_create failed: errno {rc}")));
            }
            libc::pthread_detach(thread);
        }
        Ok(())
    }

    pub fn register_thread(&self) {
        self.threads.register(std::thread::current().id());
    }

    pub fn unregister_thread(&self) {
        self.threads.unregister(std::thread::current().id());
        if let Some(stats) = &self.stats {
            stats.record_thread_destroyed();
        }
    }

    pub fn callback_enqueue(&self, cb: Callback) {
        self.callbacks.enqueue(cb);
        if let Some(stats) = &self.stats {
            stats.record_callback_enqueued();
        }
    }

    pub fn callback_process(&self) -> usize {
        let n = self.callbacks.process();
        if let Some(stats) = &self.stats {
            for _ in 0..n {
                stats.record_callback_processed();
            }
        }
        n
    }

    pub fn dump_state(&self, sink: &mut dyn std::fmt::Write) -> std::fmt::Result {
        writeln!(sink, "=== Concurrency Bridge State ===")?;
        writeln!(sink, "initialized     = {}", self.is_initialized())?;
        writeln!(sink, "tasks           = {}", self.tasks.len())?;
        writeln!(sink, "callbacks       = {}", self.callbacks.len())?;
        writeln!(sink, "threads         = {}", self.threads.count())?;
        Ok(())
    }
}

impl Default for ConcurrencyBridge {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn bridge_init_is_idempotent() {
        let mut bridge = ConcurrencyBridge::new();
        bridge.bridge_init(10, 10).unwrap();
        bridge.bridge_init(99, 99).unwrap();
        assert!(bridge.is_initialized());
        assert_eq!(bridge.max_tasks, 10);
    }

    #[test]
    fn cleanup_clears_registries() {
        let mut bridge = ConcurrencyBridge::new();
        bridge.bridge_init(10, 10).unwrap();
        bridge.tasks.spawn(None);
        bridge.bridge_cleanup();
        assert!(!bridge.is_initialized());
        assert_eq!(bridge.tasks.len(), 0);
    }

    #[test]
    fn create_thread_runs_closure() {
        let bridge = ConcurrencyBridge::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        bridge
            .create_thread(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
                ThreadCreateOptions { prefer_native: true },
            )
            .unwrap();
        // Give the detached/spawned thread time to run.
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[cfg(unix)]
    #[test]
    fn create_thread_posix_path_runs_closure() {
        let bridge = ConcurrencyBridge::new();
        let counter = Arc::new(AtomicUsize::new(0));
        let c = Arc::clone(&counter);
        bridge
            .create_thread(
                move || {
                    c.fetch_add(1, Ordering::SeqCst);
                },
                ThreadCreateOptions { prefer_native: false },
            )
            .unwrap();
        std::thread::sleep(std::time::Duration::from_millis(100));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }
}
