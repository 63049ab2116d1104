//! Task and result definitions for the bridge.
//!
//! A [`Task`] is a queued request to run one named operation with given
//! parameters; a [`TaskResult`] is its single terminal outcome.

use std::sync::atomic::{AtomicU8, Ordering};
use std::time::{Duration, Instant};

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::error::ErrorDetail;

/// Unique task identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TaskId(pub u64);

impl TaskId {
    /// Get the inner value.
    #[inline]
    pub fn inner(&self) -> u64 {
        self.0
    }
}

impl From<u64> for TaskId {
    fn from(val: u64) -> Self {
        Self(val)
    }
}

impl From<TaskId> for u64 {
    fn from(val: TaskId) -> Self {
        val.0
    }
}

impl std::fmt::Display for TaskId {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        write!(f, "task-{}", self.0)
    }
}

/// Task status.
///
/// Pending -> Running -> {Completed | Failed} happens exactly once.
/// TimedOut and Cancelled are caller-observed markers: a waiter giving up
/// records TimedOut, queue close records Cancelled. Neither stops a task
/// that is already Running.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskStatus {
    /// Submitted, not yet drained by the scheduler.
    Pending,
    /// Currently executing inside the execution context.
    Running,
    /// Handler returned a payload.
    Completed,
    /// Handler raised a fault.
    Failed,
    /// A waiter gave up before the task resolved.
    TimedOut,
    /// Still pending when the queue closed.
    Cancelled,
}

impl TaskStatus {
    /// Convert from u8 (for atomic storage).
    #[inline]
    pub fn from_u8(val: u8) -> Self {
        match val {
            0 => TaskStatus::Pending,
            1 => TaskStatus::Running,
            2 => TaskStatus::Completed,
            3 => TaskStatus::Failed,
            4 => TaskStatus::TimedOut,
            5 => TaskStatus::Cancelled,
            _ => TaskStatus::Pending,
        }
    }

    /// Convert to u8 (for atomic storage).
    #[inline]
    pub fn as_u8(&self) -> u8 {
        match self {
            TaskStatus::Pending => 0,
            TaskStatus::Running => 1,
            TaskStatus::Completed => 2,
            TaskStatus::Failed => 3,
            TaskStatus::TimedOut => 4,
            TaskStatus::Cancelled => 5,
        }
    }
}

/// A queued request to run one named operation on the execution context.
///
/// Immutable except for `status`; the attached result lives in the queue's
/// result cache.
pub struct Task {
    /// Unique task ID.
    id: TaskId,
    /// Name of the registered operation handler to invoke.
    operation_name: String,
    /// Opaque payload handed to the handler.
    parameters: Value,
    /// When the task was accepted by the queue.
    submitted_at: Instant,
    /// Caller-chosen wait bound. Advisory only; nothing preempts a handler.
    timeout: Duration,
    /// Current status (atomic for cross-thread observation).
    status: AtomicU8,
}

impl std::fmt::Debug for Task {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Task")
            .field("id", &self.id)
            .field("operation_name", &self.operation_name)
            .field("status", &self.status())
            .field("timeout", &self.timeout)
            .finish()
    }
}

impl Task {
    /// Create a new pending task.
    pub fn new(
        id: TaskId,
        operation_name: impl Into<String>,
        parameters: Value,
        timeout: Duration,
    ) -> Self {
        Self {
            id,
            operation_name: operation_name.into(),
            parameters,
            submitted_at: Instant::now(),
            timeout,
            status: AtomicU8::new(TaskStatus::Pending.as_u8()),
        }
    }

    /// Get the task ID.
    #[inline]
    pub fn id(&self) -> TaskId {
        self.id
    }

    /// Get the operation name.
    #[inline]
    pub fn operation_name(&self) -> &str {
        &self.operation_name
    }

    /// Get the handler parameters.
    #[inline]
    pub fn parameters(&self) -> &Value {
        &self.parameters
    }

    /// Get the submission instant.
    #[inline]
    pub fn submitted_at(&self) -> Instant {
        self.submitted_at
    }

    /// Get the caller-chosen timeout.
    #[inline]
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Get the current status.
    #[inline]
    pub fn status(&self) -> TaskStatus {
        TaskStatus::from_u8(self.status.load(Ordering::SeqCst))
    }

    /// Set the task status.
    #[inline]
    pub fn set_status(
        &self,
        status: TaskStatus,
    ) {
        self.status.store(status.as_u8(), Ordering::SeqCst);
    }

    /// Check if the task has not been drained yet.
    #[inline]
    pub fn is_pending(&self) -> bool {
        self.status() == TaskStatus::Pending
    }

    /// Check if the task is currently executing.
    #[inline]
    pub fn is_running(&self) -> bool {
        self.status() == TaskStatus::Running
    }

    /// Check if the task reached a terminal execution state.
    #[inline]
    pub fn is_resolved(&self) -> bool {
        matches!(
            self.status(),
            TaskStatus::Completed | TaskStatus::Failed | TaskStatus::Cancelled
        )
    }
}

/// The single terminal outcome produced for a task.
///
/// Produced exactly once by the execution context (or by queue close) and
/// cached so that repeated waits observe the same result.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    /// Id of the task this result resolves.
    pub task_id: TaskId,
    /// Whether the handler returned a payload.
    pub success: bool,
    /// Handler return value, present on success.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Structured fault, present on failure.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
}

impl TaskResult {
    /// Build a success result.
    pub fn ok(
        task_id: TaskId,
        payload: Value,
    ) -> Self {
        Self {
            task_id,
            success: true,
            payload: Some(payload),
            error: None,
        }
    }

    /// Build a failure result.
    pub fn fail(
        task_id: TaskId,
        error: ErrorDetail,
    ) -> Self {
        Self {
            task_id,
            success: false,
            payload: None,
            error: Some(error),
        }
    }
}
