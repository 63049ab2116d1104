//! Thread-safe task queue between producer threads and the execution context.
//!
//! Multiple producer threads call [`TaskQueue::submit`] and [`TaskQueue::wait`]
//! concurrently; exactly one consumer (the execution context, via the
//! scheduler) calls [`TaskQueue::drain_next`] / [`TaskQueue::drain_batch`].
//! One mutex over the whole internal state plus one condvar, signaled on every
//! submit and every result publish, covers the contract without busy-polling.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::{Condvar, Mutex};
use serde_json::Value;
use tracing::debug;

use crate::bridge::error::{BridgeError, BridgeResult, ErrorDetail};
use crate::bridge::task::{Task, TaskId, TaskResult, TaskStatus};

/// Default backpressure threshold.
pub const DEFAULT_QUEUE_DEPTH: usize = 64;

/// State behind the single queue mutex.
struct Inner {
    /// Submission-ordered pending tasks.
    pending: VecDeque<Arc<Task>>,
    /// Every task the queue ever issued an id for.
    tasks: HashMap<TaskId, Arc<Task>>,
    /// Result cache. An entry is terminal; repeated waits re-read it.
    results: HashMap<TaskId, TaskResult>,
    /// Next id to allocate.
    next_id: u64,
    /// Set by `close`; rejects further submissions.
    closed: bool,
}

/// Bounded FIFO hand-off structure with per-task result delivery.
pub struct TaskQueue {
    inner: Mutex<Inner>,
    /// Signaled on submit and on result publish.
    resolved: Condvar,
    /// Backpressure threshold for pending tasks.
    capacity: usize,
}

impl std::fmt::Debug for TaskQueue {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("TaskQueue")
            .field("pending", &inner.pending.len())
            .field("resolved", &inner.results.len())
            .field("capacity", &self.capacity)
            .field("closed", &inner.closed)
            .finish()
    }
}

impl TaskQueue {
    /// Create a queue with the given backpressure threshold.
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                pending: VecDeque::new(),
                tasks: HashMap::new(),
                results: HashMap::new(),
                next_id: 0,
                closed: false,
            }),
            resolved: Condvar::new(),
            capacity,
        }
    }

    /// Enqueue a task and return its id immediately.
    ///
    /// Fails with [`BridgeError::QueueFull`] at capacity (no blocking
    /// enqueue) and [`BridgeError::Shutdown`] after close.
    pub fn submit(
        &self,
        operation_name: impl Into<String>,
        parameters: Value,
        timeout: Duration,
    ) -> BridgeResult<TaskId> {
        let mut inner = self.inner.lock();

        if inner.closed {
            return Err(BridgeError::Shutdown);
        }
        if inner.pending.len() >= self.capacity {
            return Err(BridgeError::QueueFull {
                depth: inner.pending.len(),
            });
        }

        let id = TaskId(inner.next_id);
        inner.next_id += 1;

        let task = Arc::new(Task::new(id, operation_name, parameters, timeout));
        debug!("submitted {} ({})", id, task.operation_name());

        inner.pending.push_back(task.clone());
        inner.tasks.insert(id, task);
        drop(inner);

        self.resolved.notify_all();
        Ok(id)
    }

    /// Block until a result exists for `task_id` or `timeout` elapses.
    ///
    /// Elapsing releases only the caller; a pending task stays queued and a
    /// running task keeps running. Its eventual result remains cached for a
    /// later wait.
    pub fn wait(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> BridgeResult<TaskResult> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.inner.lock();

        if !inner.tasks.contains_key(&task_id) {
            return Err(BridgeError::TaskNotFound { task_id });
        }

        loop {
            if let Some(result) = inner.results.get(&task_id) {
                return Ok(result.clone());
            }
            if Instant::now() >= deadline {
                // Caller-observed marker only; execution is unaffected.
                if let Some(task) = inner.tasks.get(&task_id) {
                    if !task.is_resolved() {
                        task.set_status(TaskStatus::TimedOut);
                    }
                }
                return Err(BridgeError::TaskTimeout {
                    task_id,
                    waited: timeout,
                });
            }
            let _ = self.resolved.wait_until(&mut inner, deadline);
        }
    }

    /// Block without bound until a result exists for `task_id`.
    ///
    /// Used for late interest in a task an earlier wait abandoned.
    pub fn wait_unbounded(
        &self,
        task_id: TaskId,
    ) -> BridgeResult<TaskResult> {
        let mut inner = self.inner.lock();

        if !inner.tasks.contains_key(&task_id) {
            return Err(BridgeError::TaskNotFound { task_id });
        }

        loop {
            if let Some(result) = inner.results.get(&task_id) {
                return Ok(result.clone());
            }
            self.resolved.wait(&mut inner);
        }
    }

    /// Pop the oldest pending task and mark it Running.
    ///
    /// Single-consumer: called only from the execution context's tick.
    pub fn drain_next(&self) -> Option<Arc<Task>> {
        let mut inner = self.inner.lock();
        let task = inner.pending.pop_front()?;
        task.set_status(TaskStatus::Running);
        Some(task)
    }

    /// Pop up to `max` pending tasks in submission order. `max == 0` drains
    /// everything currently pending.
    ///
    /// Batch size only determines how many tasks one tick picks up; the
    /// caller executes them strictly one at a time, so each task stays
    /// Pending until the executor reaches it.
    pub fn drain_batch(
        &self,
        max: usize,
    ) -> Vec<Arc<Task>> {
        let mut inner = self.inner.lock();
        let limit = if max == 0 { inner.pending.len() } else { max };

        let mut batch = Vec::with_capacity(limit.min(inner.pending.len()));
        while batch.len() < limit {
            match inner.pending.pop_front() {
                Some(task) => batch.push(task),
                None => break,
            }
        }
        batch
    }

    /// Record the terminal result for a task and wake all waiters.
    ///
    /// Exactly one result is ever published per task id; the status
    /// transition is skipped for tasks already cancelled by `close`.
    pub fn publish(
        &self,
        task_id: TaskId,
        result: TaskResult,
    ) {
        let mut inner = self.inner.lock();

        if let Some(task) = inner.tasks.get(&task_id) {
            if !task.is_resolved() {
                task.set_status(if result.success {
                    TaskStatus::Completed
                } else {
                    TaskStatus::Failed
                });
            }
        }
        inner.results.entry(task_id).or_insert(result);
        drop(inner);

        self.resolved.notify_all();
    }

    /// Stop accepting submissions and resolve every still-pending task with
    /// a shutdown error. Idempotent.
    pub fn close(&self) {
        let mut inner = self.inner.lock();
        if inner.closed {
            return;
        }
        inner.closed = true;

        let mut cancelled = 0usize;
        while let Some(task) = inner.pending.pop_front() {
            task.set_status(TaskStatus::Cancelled);
            let result = TaskResult::fail(task.id(), ErrorDetail::from(&BridgeError::Shutdown));
            inner.results.insert(task.id(), result);
            cancelled += 1;
        }
        drop(inner);

        if cancelled > 0 {
            debug!("queue closed, {} pending tasks cancelled", cancelled);
        }
        self.resolved.notify_all();
    }

    /// Number of tasks not yet drained.
    pub fn pending_count(&self) -> usize {
        self.inner.lock().pending.len()
    }

    /// Whether `close` has been called.
    pub fn is_closed(&self) -> bool {
        self.inner.lock().closed
    }

    /// Look up a task by id.
    pub fn task(
        &self,
        task_id: TaskId,
    ) -> Option<Arc<Task>> {
        self.inner.lock().tasks.get(&task_id).cloned()
    }
}

impl Default for TaskQueue {
    fn default() -> Self {
        Self::new(DEFAULT_QUEUE_DEPTH)
    }
}
