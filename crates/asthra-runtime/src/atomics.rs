//! Monotonic-clock timestamps, memory-order-explicit atomic counters, a
//! fragile-primitive-safe call-once gate, and a lock-free stack.
//!
//! Everything here is a thin, explicit wrapper over `std::sync::atomic` —
//! the point is to make the memory ordering a first-class, named argument at
//! every call site instead of letting it default to whatever `Ordering`
//! happens to typecheck.

use std::ptr;
use std::sync::atomic::{AtomicBool, AtomicPtr, AtomicU64, AtomicUsize, Ordering};
use std::sync::Once;

/// Explicit memory ordering, named the way the spec names them rather than
/// importing `std::sync::atomic::Ordering` everywhere a counter is touched.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemOrder {
    Relaxed,
    Acquire,
    Release,
    AcqRel,
}

impl From<MemOrder> for Ordering {
    fn from(o: MemOrder) -> Ordering {
        match o {
            MemOrder::Relaxed => Ordering::Relaxed,
            MemOrder::Acquire => Ordering::Acquire,
            MemOrder::Release => Ordering::Release,
            MemOrder::AcqRel => Ordering::AcqRel,
        }
    }
}

/// A 64-bit unsigned atomic counter parameterized by memory ordering at each
/// call site.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicU64);

impl AtomicCounter {
    pub const fn new(initial: u64) -> Self {
        Self(AtomicU64::new(initial))
    }

    pub fn load(&self, order: MemOrder) -> u64 {
        self.0.load(order.into())
    }

    pub fn store(&self, value: u64, order: MemOrder) {
        self.0.store(value, order.into())
    }

    pub fn fetch_add(&self, value: u64, order: MemOrder) -> u64 {
        self.0.fetch_add(value, order.into())
    }

    pub fn fetch_sub(&self, value: u64, order: MemOrder) -> u64 {
        self.0.fetch_sub(value, order.into())
    }

    /// Compare-and-swap loop that applies `f` to the current value until it
    /// wins. Used for peak/min/max updates that a plain fetch-add can't
    /// express. Returns the value that was finally stored.
    pub fn fetch_update_max(&self, candidate: u64, order: MemOrder) -> u64 {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if candidate <= current {
                return current;
            }
            match self.0.compare_exchange_weak(
                current,
                candidate,
                order.into(),
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }

    /// Same as [`Self::fetch_update_max`] but keeps the smaller value.
    pub fn fetch_update_min(&self, candidate: u64, order: MemOrder) -> u64 {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            if candidate >= current {
                return current;
            }
            match self.0.compare_exchange_weak(
                current,
                candidate,
                order.into(),
                Ordering::Acquire,
            ) {
                Ok(_) => return candidate,
                Err(observed) => current = observed,
            }
        }
    }
}

/// Sentinel used to initialize "minimum observed" counters, per spec §3.
pub const MIN_SENTINEL: u64 = u64::MAX;
/// Sentinel used to initialize "maximum observed" counters, per spec §3.
pub const MAX_SENTINEL: u64 = 0;

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Nanoseconds since an arbitrary monotonic epoch. Guaranteed non-decreasing
/// across the whole process, even across the rare platforms whose
/// `clock_gettime(CLOCK_MONOTONIC)` can stutter under virtualization — the
/// CAS loop below clamps against the last observed value the way
/// `install_stack_canary` clamps against a fragile once-init primitive.
pub fn monotonic_now_ns() -> u64 {
    let raw = raw_monotonic_ns();
    let mut last = LAST_TIMESTAMP.load(Ordering::Acquire);
    loop {
        if raw <= last {
            return last;
        }
        match LAST_TIMESTAMP.compare_exchange_weak(
            last,
            raw,
            Ordering::Release,
            Ordering::Acquire,
        ) {
            Ok(_) => return raw,
            Err(observed) => last = observed,
        }
    }
}

#[cfg(unix)]
fn raw_monotonic_ns() -> u64 {
    // SAFETY: `ts` is a plain POD struct fully initialized before
    // `clock_gettime` writes into it; CLOCK_MONOTONIC is available on every
    // Unix target this crate builds for.
    unsafe {
        let mut ts: libc::timespec = std::mem::zeroed();
        libc::clock_gettime(libc::CLOCK_MONOTONIC, &mut ts);
        ts.tv_sec as u64 * 1_000_000_000 + ts.tv_nsec as u64
    }
}

#[cfg(not(unix))]
fn raw_monotonic_ns() -> u64 {
    use std::sync::OnceLock;
    use std::time::Instant;
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    let epoch = EPOCH.get_or_init(Instant::now);
    epoch.elapsed().as_nanos() as u64
}

/// Runs an initializer exactly once across concurrent callers.
///
/// Layers an extra [`AtomicBool`] gate in front of `std::sync::Once` —
/// `Once` itself is sound, but the spec calls for tolerating platforms whose
/// native once-init primitive is fragile under process fork or shared-memory
/// reuse, so every completion is also recorded in a flag we control.
pub struct CallOnce {
    once: Once,
    completed: AtomicBool,
}

impl CallOnce {
    pub const fn new() -> Self {
        Self {
            once: Once::new(),
            completed: AtomicBool::new(false),
        }
    }

    pub fn call_once(&self, f: impl FnOnce()) {
        if self.completed.load(Ordering::Acquire) {
            return;
        }
        self.once.call_once(|| {
            f();
            self.completed.store(true, Ordering::Release);
        });
    }

    pub fn is_completed(&self) -> bool {
        self.completed.load(Ordering::Acquire)
    }
}

impl Default for CallOnce {
    fn default() -> Self {
        Self::new()
    }
}

/// Intrusive Treiber stack node. The next-link lives in the node itself,
/// which is the safe-Rust equivalent of the spec's "reserve the first word
/// of each item" contract.
struct Node<T> {
    value: T,
    next: *mut Node<T>,
}

/// A lock-free LIFO stack built on a single atomic top pointer.
///
/// ABA is *not* mitigated, matching spec §4.1 and §9: safe use requires
/// monotonic node identity (each `push` allocates a fresh node; nodes are
/// never reused across a `pop`/`push` pair on the same address). Callers
/// that need ABA safety should add hazard pointers or tag the pointer
/// themselves — out of scope here.
pub struct LockFreeStack<T> {
    top: AtomicPtr<Node<T>>,
    size: AtomicUsize,
    push_count: AtomicU64,
    pop_count: AtomicU64,
}

impl<T> LockFreeStack<T> {
    pub fn new() -> Self {
        Self {
            top: AtomicPtr::new(ptr::null_mut()),
            size: AtomicUsize::new(0),
            push_count: AtomicU64::new(0),
            pop_count: AtomicU64::new(0),
        }
    }

    pub fn push(&self, value: T) {
        let node = Box::into_raw(Box::new(Node {
            value,
            next: ptr::null_mut(),
        }));
        let mut current_top = self.top.load(Ordering::Acquire);
        loop {
            // SAFETY: `node` was just allocated by us and is not yet
            // published; writing its `next` field before the CAS that
            // publishes it is race-free.
            unsafe {
                (*node).next = current_top;
            }
            match self.top.compare_exchange_weak(
                current_top,
                node,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(_) => break,
                Err(observed) => current_top = observed,
            }
        }
        self.size.fetch_add(1, Ordering::AcqRel);
        self.push_count.fetch_add(1, Ordering::Relaxed);
    }

    pub fn pop(&self) -> Option<T> {
        let mut current_top = self.top.load(Ordering::Acquire);
        loop {
            if current_top.is_null() {
                return None;
            }
            // SAFETY: `current_top` was published by a previous successful
            // `push` and, because nodes are only ever freed after a
            // successful CAS below, it is still a live allocation.
            let next = unsafe { (*current_top).next };
            match self.top.compare_exchange_weak(
                current_top,
                next,
                Ordering::Release,
                Ordering::Acquire,
            ) {
                Ok(popped) => {
                    self.size.fetch_sub(1, Ordering::AcqRel);
                    self.pop_count.fetch_add(1, Ordering::Relaxed);
                    // SAFETY: `popped` was just unlinked from the stack by
                    // the winning CAS; no other thread holds a reference.
                    let boxed = unsafe { Box::from_raw(popped) };
                    return Some(boxed.value);
                }
                Err(observed) => current_top = observed,
            }
        }
    }

    pub fn len(&self) -> usize {
        self.size.load(Ordering::Acquire)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn push_count(&self) -> u64 {
        self.push_count.load(Ordering::Relaxed)
    }

    pub fn pop_count(&self) -> u64 {
        self.pop_count.load(Ordering::Relaxed)
    }
}

impl<T> Default for LockFreeStack<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for LockFreeStack<T> {
    fn drop(&mut self) {
        while self.pop().is_some() {}
    }
}

// SAFETY: `Node<T>` pointers are only ever shared between threads via the
// atomic `top` pointer and are always uniquely owned after a winning CAS, so
// the stack is Send/Sync whenever `T` is Send.
unsafe impl<T: Send> Send for LockFreeStack<T> {}
unsafe impl<T: Send> Sync for LockFreeStack<T> {}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn counter_fetch_add_sums_contributions() {
        let counter = Arc::new(AtomicCounter::new(0));
        let mut handles = Vec::new();
        for _ in 0..8 {
            let counter = Arc::clone(&counter);
            handles.push(thread::spawn(move || {
                for _ in 0..1000 {
                    counter.fetch_add(1, MemOrder::Relaxed);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(counter.load(MemOrder::Relaxed), 8000);
    }

    #[test]
    fn fetch_update_max_is_monotonic() {
        let counter = AtomicCounter::new(0);
        counter.fetch_update_max(5, MemOrder::AcqRel);
        counter.fetch_update_max(3, MemOrder::AcqRel);
        assert_eq!(counter.load(MemOrder::Acquire), 5);
        counter.fetch_update_max(9, MemOrder::AcqRel);
        assert_eq!(counter.load(MemOrder::Acquire), 9);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let mut last = monotonic_now_ns();
        for _ in 0..1000 {
            let now = monotonic_now_ns();
            assert!(now >= last);
            last = now;
        }
    }

    #[test]
    fn call_once_runs_exactly_once() {
        let count = Arc::new(AtomicU64::new(0));
        let once = Arc::new(CallOnce::new());
        let mut handles = Vec::new();
        for _ in 0..16 {
            let count = Arc::clone(&count);
            let once = Arc::clone(&once);
            handles.push(thread::spawn(move || {
                once.call_once(|| {
                    count.fetch_add(1, Ordering::SeqCst);
                });
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn stack_pushes_and_pops_in_lifo_order() {
        let stack = LockFreeStack::new();
        for i in 0..10 {
            stack.push(i);
        }
        let mut popped = Vec::new();
        while let Some(v) = stack.pop() {
            popped.push(v);
        }
        assert_eq!(popped, (0..10).rev().collect::<Vec<_>>());
        assert!(stack.is_empty());
    }

    #[test]
    fn stack_size_never_negative_under_concurrency() {
        let stack = Arc::new(LockFreeStack::new());
        let mut handles = Vec::new();
        for _ in 0..4 {
            let stack = Arc::clone(&stack);
            handles.push(thread::spawn(move || {
                for i in 0..500 {
                    stack.push(i);
                }
            }));
        }
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(stack.len(), 2000);
        let mut popped = Vec::new();
        while let Some(v) = stack.pop() {
            popped.push(v);
        }
        assert_eq!(popped.len(), 2000);
        assert_eq!(stack.len(), 0);
    }
}
