//! Task handles and the task registry.
//!
//! Modeled as an arena of records plus integer handles per the design notes:
//! the registry owns every [`TaskHandle`] behind a `Mutex<Vec<_>>` rather
//! than an intrusive C-style linked list, since nothing outside this module
//! needs to walk the list itself.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::thread::ThreadId;

use crate::atomics::monotonic_now_ns;

/// Lifecycle state of a spawned task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Spawned,
    Started,
    Suspended,
    Resumed,
    Completed,
    Failed,
    Cancelled,
    TimedOut,
}

/// Outcome of a completed task. The payload is an opaque byte buffer —
/// generated code is responsible for encoding/decoding it; this bridge only
/// moves bytes around.
#[derive(Debug, Clone)]
pub enum TaskOutcome {
    Ok(Vec<u8>),
    Err(Vec<u8>),
}

static NEXT_TASK_ID: AtomicU64 = AtomicU64::new(1);

/// Opaque task identifier, handed out in program order.
pub struct TaskHandle {
    id: u64,
    state: Mutex<TaskState>,
    result: Mutex<Option<TaskOutcome>>,
    owning_thread: Option<ThreadId>,
    created_at_ns: u64,
    deadline_ns: Option<u64>,
    cancel_requested: AtomicBool,
}

impl TaskHandle {
    fn new(deadline_ns: Option<u64>) -> Arc<Self> {
        Arc::new(Self {
            id: NEXT_TASK_ID.fetch_add(1, Ordering::Relaxed),
            state: Mutex::new(TaskState::Spawned),
            result: Mutex::new(None),
            owning_thread: std::thread::current().id().into(),
            created_at_ns: monotonic_now_ns(),
            deadline_ns,
            cancel_requested: AtomicBool::new(false),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn state(&self) -> TaskState {
        *self.state.lock().expect("task state mutex poisoned")
    }

    pub fn owning_thread(&self) -> Option<ThreadId> {
        self.owning_thread
    }

    pub fn created_at_ns(&self) -> u64 {
        self.created_at_ns
    }

    /// Cooperative cancellation: user code must poll this.
    pub fn request_cancel(&self) {
        self.cancel_requested.store(true, Ordering::Release);
    }

    pub fn is_cancel_requested(&self) -> bool {
        self.cancel_requested.load(Ordering::Acquire)
    }

    /// Checks the deadline (if any) against the current time and, on
    /// expiry, transitions the task to `TimedOut`. Returns the resulting
    /// state.
    pub fn check_deadline(&self) -> TaskState {
        let mut state = self.state.lock().expect("task state mutex poisoned");
        if matches!(
            *state,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled | TaskState::TimedOut
        ) {
            return *state;
        }
        if let Some(deadline) = self.deadline_ns {
            if monotonic_now_ns() >= deadline {
                *state = TaskState::TimedOut;
            }
        }
        *state
    }

    fn set_state(&self, next: TaskState) {
        *self.state.lock().expect("task state mutex poisoned") = next;
    }

    pub fn mark_started(&self) {
        self.set_state(TaskState::Started);
    }

    pub fn mark_suspended(&self) {
        self.set_state(TaskState::Suspended);
    }

    pub fn mark_resumed(&self) {
        self.set_state(TaskState::Resumed);
    }

    pub fn complete(&self, outcome: TaskOutcome) {
        let next = match &outcome {
            TaskOutcome::Ok(_) => TaskState::Completed,
            TaskOutcome::Err(_) => TaskState::Failed,
        };
        *self.result.lock().expect("task result mutex poisoned") = Some(outcome);
        self.set_state(next);
    }

    /// Cancels the task if it hasn't already reached a terminal state.
    pub fn cancel(&self) {
        let mut state = self.state.lock().expect("task state mutex poisoned");
        if !matches!(
            *state,
            TaskState::Completed | TaskState::Failed | TaskState::Cancelled | TaskState::TimedOut
        ) {
            *state = TaskState::Cancelled;
        }
    }

    /// Takes the result, leaving `None` behind. Returns `None` if the task
    /// hasn't completed yet.
    pub fn take_result(&self) -> Option<TaskOutcome> {
        self.result.lock().expect("task result mutex poisoned").take()
    }
}

/// Flat, mutex-guarded registry of every live task handle.
#[derive(Default)]
pub struct TaskRegistry {
    tasks: Mutex<Vec<Arc<TaskHandle>>>,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, deadline_ns: Option<u64>) -> Arc<TaskHandle> {
        let handle = TaskHandle::new(deadline_ns);
        self.tasks
            .lock()
            .expect("task registry mutex poisoned")
            .push(Arc::clone(&handle));
        handle
    }

    pub fn find(&self, id: u64) -> Option<Arc<TaskHandle>> {
        self.tasks
            .lock()
            .expect("task registry mutex poisoned")
            .iter()
            .find(|t| t.id() == id)
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.tasks.lock().expect("task registry mutex poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes every task in a terminal state, freeing its handle. Called
    /// during `bridge_cleanup` and is safe to call periodically as a reaper.
    pub fn drain_terminal(&self) -> usize {
        let mut tasks = self.tasks.lock().expect("task registry mutex poisoned");
        let before = tasks.len();
        tasks.retain(|t| {
            !matches!(
                t.state(),
                TaskState::Completed | TaskState::Failed | TaskState::Cancelled | TaskState::TimedOut
            )
        });
        before - tasks.len()
    }

    /// Drops every task handle regardless of state. Used by `bridge_cleanup`.
    pub fn clear(&self) {
        self.tasks.lock().expect("task registry mutex poisoned").clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn spawn_assigns_monotonically_increasing_ids() {
        let registry = TaskRegistry::new();
        let a = registry.spawn(None);
        let b = registry.spawn(None);
        assert!(b.id() > a.id());
    }

    #[test]
    fn complete_transitions_to_failed_on_err_outcome() {
        let registry = TaskRegistry::new();
        let task = registry.spawn(None);
        task.mark_started();
        task.complete(TaskOutcome::Err(b"boom".to_vec()));
        assert_eq!(task.state(), TaskState::Failed);
    }

    #[test]
    fn deadline_expiry_times_out_pending_task() {
        let registry = TaskRegistry::new();
        let task = registry.spawn(Some(0));
        task.mark_started();
        assert_eq!(task.check_deadline(), TaskState::TimedOut);
    }

    #[test]
    fn drain_terminal_only_removes_finished_tasks() {
        let registry = TaskRegistry::new();
        let running = registry.spawn(None);
        running.mark_started();
        let done = registry.spawn(None);
        done.complete(TaskOutcome::Ok(vec![]));
        assert_eq!(registry.drain_terminal(), 1);
        assert_eq!(registry.len(), 1);
    }
}
