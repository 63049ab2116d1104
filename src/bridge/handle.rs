//! Producer-facing submit/wait surface.
//!
//! A [`BridgeHandle`] is what the transport dispatcher holds: cheap to
//! clone, safe to use from any thread, and the only blocking surface the
//! bridge exposes (always timeout-bounded unless the caller explicitly
//! opts out for late-interest fetches).

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::bridge::error::BridgeResult;
use crate::bridge::queue::TaskQueue;
use crate::bridge::task::{TaskId, TaskResult};

/// Cloneable client handle over the task queue.
#[derive(Debug, Clone)]
pub struct BridgeHandle {
    queue: Arc<TaskQueue>,
    default_timeout: Duration,
}

impl BridgeHandle {
    /// Create a handle over a shared queue.
    pub(crate) fn new(
        queue: Arc<TaskQueue>,
        default_timeout: Duration,
    ) -> Self {
        Self {
            queue,
            default_timeout,
        }
    }

    /// Submit an operation with the configured default timeout.
    pub fn submit(
        &self,
        operation_name: &str,
        parameters: Value,
    ) -> BridgeResult<TaskId> {
        self.queue
            .submit(operation_name, parameters, self.default_timeout)
    }

    /// Submit an operation with a caller-chosen timeout.
    pub fn submit_with_timeout(
        &self,
        operation_name: &str,
        parameters: Value,
        timeout: Duration,
    ) -> BridgeResult<TaskId> {
        self.queue.submit(operation_name, parameters, timeout)
    }

    /// Wait for a result with the configured default timeout.
    pub fn wait(
        &self,
        task_id: TaskId,
    ) -> BridgeResult<TaskResult> {
        self.queue.wait(task_id, self.default_timeout)
    }

    /// Wait for a result with a caller-chosen timeout.
    pub fn wait_with_timeout(
        &self,
        task_id: TaskId,
        timeout: Duration,
    ) -> BridgeResult<TaskResult> {
        self.queue.wait(task_id, timeout)
    }

    /// Wait without bound, for late interest in an abandoned task.
    pub fn wait_unbounded(
        &self,
        task_id: TaskId,
    ) -> BridgeResult<TaskResult> {
        self.queue.wait_unbounded(task_id)
    }

    /// Submit and wait in one call.
    pub fn execute(
        &self,
        operation_name: &str,
        parameters: Value,
    ) -> BridgeResult<TaskResult> {
        let task_id = self.submit(operation_name, parameters)?;
        self.wait(task_id)
    }

    /// Number of tasks not yet drained.
    pub fn pending_count(&self) -> usize {
        self.queue.pending_count()
    }

    /// The default wait bound this handle applies.
    #[inline]
    pub fn default_timeout(&self) -> Duration {
        self.default_timeout
    }
}
