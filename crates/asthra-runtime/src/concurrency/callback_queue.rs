//! FIFO queue of deferred work items shared between task producers and a
//! single consumer loop.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Condvar, Mutex};

/// A deferred unit of work. Generated code enqueues these from task
/// completions; the runtime's consumer loop drains them in order.
pub type Callback = Box<dyn FnOnce() + Send>;

/// Single-consumer FIFO with a condition variable wakeup and a shutdown
/// flag that unblocks any waiter.
pub struct CallbackQueue {
    queue: Mutex<VecDeque<Callback>>,
    process_cond: Condvar,
    shutdown: AtomicBool,
    enqueued_count: AtomicU64,
    processed_count: AtomicU64,
}

impl Default for CallbackQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl CallbackQueue {
    pub fn new() -> Self {
        Self {
            queue: Mutex::new(VecDeque::new()),
            process_cond: Condvar::new(),
            shutdown: AtomicBool::new(false),
            enqueued_count: AtomicU64::new(0),
            processed_count: AtomicU64::new(0),
        }
    }

    /// Producer-safe enqueue. Broadcasts to wake any consumer waiting on an
    /// empty queue.
    pub fn enqueue(&self, cb: Callback) {
        let mut queue = self.queue.lock().expect("callback queue mutex poisoned");
        queue.push_back(cb);
        self.enqueued_count.fetch_add(1, Ordering::Relaxed);
        self.process_cond.notify_all();
    }

    /// Blocks until a callback is available or `shutdown` is signaled, then
    /// drains and runs everything currently queued, in FIFO order. Returns
    /// the number of callbacks processed, or `0` if woken by shutdown with
    /// an empty queue.
    pub fn process(&self) -> usize {
        let mut queue = self.queue.lock().expect("callback queue mutex poisoned");
        while queue.is_empty() && !self.shutdown.load(Ordering::Acquire) {
            queue = self
                .process_cond
                .wait(queue)
                .expect("callback queue mutex poisoned");
        }
        let drained: Vec<Callback> = queue.drain(..).collect();
        drop(queue);
        let count = drained.len();
        for cb in drained {
            cb();
        }
        self.processed_count.fetch_add(count as u64, Ordering::Relaxed);
        count
    }

    /// Forces any blocked `process()` call to return, draining the queue
    /// without waiting further.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Release);
        self.process_cond.notify_all();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::Acquire)
    }

    pub fn len(&self) -> usize {
        self.queue.lock().expect("callback queue mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn enqueued_count(&self) -> u64 {
        self.enqueued_count.load(Ordering::Relaxed)
    }

    pub fn processed_count(&self) -> u64 {
        self.processed_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Arc;
    use std::thread;
    use std::time::Duration;

    #[test]
    fn enqueue_then_process_runs_in_fifo_order() {
        let queue = CallbackQueue::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let order = Arc::clone(&order);
            queue.enqueue(Box::new(move || order.lock().unwrap().push(i)));
        }
        queue.shutdown();
        queue.process();
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
    }

    #[test]
    fn shutdown_unblocks_waiting_consumer() {
        let queue = Arc::new(CallbackQueue::new());
        let consumer_queue = Arc::clone(&queue);
        let handle = thread::spawn(move || consumer_queue.process());
        thread::sleep(Duration::from_millis(50));
        queue.shutdown();
        let processed = handle.join().unwrap();
        assert_eq!(processed, 0);
    }

    #[test]
    fn concurrent_producers_all_get_processed() {
        let queue = Arc::new(CallbackQueue::new());
        let ran = Arc::new(AtomicUsize::new(0));
        let mut producers = Vec::new();
        for _ in 0..4 {
            let queue = Arc::clone(&queue);
            let ran = Arc::clone(&ran);
            producers.push(thread::spawn(move || {
                for _ in 0..25 {
                    let ran = Arc::clone(&ran);
                    queue.enqueue(Box::new(move || {
                        ran.fetch_add(1, Ordering::Relaxed);
                    }));
                }
            }));
        }
        for p in producers {
            p.join().unwrap();
        }
        queue.shutdown();
        while !queue.is_empty() {
            queue.process();
        }
        assert_eq!(ran.load(Ordering::Relaxed), 100);
    }
}
