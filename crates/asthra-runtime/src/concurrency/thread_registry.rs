//! Registry of native threads participating in the runtime bridge, each
//! carrying its own GC-root set.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::thread::ThreadId;

/// Per-thread data tracked by the registry: its identity and the array of
/// GC roots it owns. Roots are opaque addresses (`usize`) — this bridge does
/// not interpret them, it just gives generated code a place to register and
/// scan them from.
pub struct ThreadRecord {
    pub thread_id: ThreadId,
    pub gc_roots: Mutex<Vec<usize>>,
}

impl ThreadRecord {
    fn new(thread_id: ThreadId) -> Self {
        Self {
            thread_id,
            gc_roots: Mutex::new(Vec::new()),
        }
    }

    pub fn push_root(&self, addr: usize) {
        self.gc_roots.lock().expect("gc root mutex poisoned").push(addr);
    }

    pub fn remove_root(&self, addr: usize) -> bool {
        let mut roots = self.gc_roots.lock().expect("gc root mutex poisoned");
        if let Some(pos) = roots.iter().position(|&r| r == addr) {
            roots.remove(pos);
            true
        } else {
            false
        }
    }

    pub fn root_count(&self) -> usize {
        self.gc_roots.lock().expect("gc root mutex poisoned").len()
    }
}

/// Intrusive-in-spirit (flat-in-practice) registry of every registered
/// thread. Lifetime: created empty, populated by `register`, torn down by
/// `clear` at bridge shutdown.
#[derive(Default)]
pub struct ThreadRegistry {
    threads: Mutex<Vec<ThreadRecord>>,
    count: AtomicUsize,
}

impl ThreadRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&self, thread_id: ThreadId) {
        let mut threads = self.threads.lock().expect("thread registry mutex poisoned");
        if threads.iter().any(|t| t.thread_id == thread_id) {
            return;
        }
        threads.push(ThreadRecord::new(thread_id));
        self.count.fetch_add(1, Ordering::AcqRel);
    }

    pub fn unregister(&self, thread_id: ThreadId) -> bool {
        let mut threads = self.threads.lock().expect("thread registry mutex poisoned");
        if let Some(pos) = threads.iter().position(|t| t.thread_id == thread_id) {
            threads.remove(pos);
            self.count.fetch_sub(1, Ordering::AcqRel);
            true
        } else {
            false
        }
    }

    pub fn count(&self) -> usize {
        self.count.load(Ordering::Acquire)
    }

    pub fn with_record<R>(&self, thread_id: ThreadId, f: impl FnOnce(&ThreadRecord) -> R) -> Option<R> {
        let threads = self.threads.lock().expect("thread registry mutex poisoned");
        threads.iter().find(|t| t.thread_id == thread_id).map(f)
    }

    pub fn clear(&self) {
        self.threads.lock().expect("thread registry mutex poisoned").clear();
        self.count.store(0, Ordering::Release);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn register_then_unregister_restores_count() {
        let registry = ThreadRegistry::new();
        let id = std::thread::current().id();
        registry.register(id);
        assert_eq!(registry.count(), 1);
        assert!(registry.unregister(id));
        assert_eq!(registry.count(), 0);
    }

    #[test]
    fn double_register_is_idempotent() {
        let registry = ThreadRegistry::new();
        let id = std::thread::current().id();
        registry.register(id);
        registry.register(id);
        assert_eq!(registry.count(), 1);
    }

    #[test]
    fn gc_roots_push_and_remove() {
        let registry = ThreadRegistry::new();
        let id = std::thread::current().id();
        registry.register(id);
        registry.with_record(id, |r| r.push_root(0x1000)).unwrap();
        registry.with_record(id, |r| r.push_root(0x2000)).unwrap();
        assert_eq!(registry.with_record(id, |r| r.root_count()).unwrap(), 2);
        assert!(registry.with_record(id, |r| r.remove_root(0x1000)).unwrap());
        assert_eq!(registry.with_record(id, |r| r.root_count()).unwrap(), 1);
    }
}
