//! Bridge errors
//!
//! Every error carries enough context for the caller to self-correct
//! without reading server-side logs.

use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::bridge::registry::EntityKind;
use crate::bridge::task::TaskId;

/// Bridge result
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Bridge errors
#[derive(Debug, Error)]
pub enum BridgeError {
    /// Backpressure at submit time. The queue is at its configured capacity.
    #[error("Task queue is full ({depth} tasks pending)")]
    QueueFull {
        /// Pending depth observed at submit time
        depth: usize,
    },

    /// The caller gave up waiting. The task itself may still complete.
    #[error("{task_id} timed out after {waited:?}")]
    TaskTimeout {
        /// Task the caller was waiting on
        task_id: TaskId,
        /// How long the caller waited
        waited: Duration,
    },

    /// Submitted after close, or still pending at close.
    #[error("Bridge is shut down")]
    Shutdown,

    /// The queue never issued this task id.
    #[error("Unknown task: {task_id}")]
    TaskNotFound {
        /// The unrecognized id
        task_id: TaskId,
    },

    /// Registry resolve failure. Carries the live ids of the same kind.
    #[error("{kind} '{entity_id}' does not exist")]
    EntityNotFound {
        /// Kind the caller asked for
        kind: EntityKind,
        /// The id that failed to resolve
        entity_id: String,
        /// Currently-live ids of the same kind, for caller diagnostics
        available: Vec<String>,
    },

    /// Liveness probe failed on a stored handle (e.g. after an undo the
    /// registry was not notified about). Raised from operation handlers
    /// that probe a handle mid-operation; registry lookups report a purged
    /// record as [`BridgeError::EntityNotFound`] instead.
    #[error("Handle for '{entity_id}' is stale")]
    StaleHandle {
        /// Id whose handle went dead
        entity_id: String,
    },

    /// An operation handler raised a fault. Wraps the underlying cause.
    #[error("Operation '{operation}' failed: {message}")]
    Execution {
        /// Operation name of the failed task
        operation: String,
        /// Rendered cause chain
        message: String,
    },
}

impl BridgeError {
    /// Stable machine-readable kind string, used on the wire.
    pub fn kind(&self) -> &'static str {
        match self {
            BridgeError::QueueFull { .. } => "queue_full",
            BridgeError::TaskTimeout { .. } => "timeout",
            BridgeError::Shutdown => "shutdown",
            BridgeError::TaskNotFound { .. } => "task_not_found",
            BridgeError::EntityNotFound { .. } => "entity_not_found",
            BridgeError::StaleHandle { .. } => "stale_handle",
            BridgeError::Execution { .. } => "execution_error",
        }
    }
}

/// Structured error surface attached to failed task results.
///
/// Serialized as-is into wire responses by the dispatcher.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorDetail {
    /// Machine-readable error kind
    pub kind: String,
    /// Human-readable message
    pub message: String,
    /// Live same-kind entity ids, present for resolve failures
    #[serde(skip_serializing_if = "Option::is_none")]
    pub available: Option<Vec<String>>,
}

impl ErrorDetail {
    /// Create a detail with no candidate list.
    pub fn new(
        kind: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self {
            kind: kind.into(),
            message: message.into(),
            available: None,
        }
    }
}

impl From<&BridgeError> for ErrorDetail {
    fn from(err: &BridgeError) -> Self {
        let available = match err {
            BridgeError::EntityNotFound { available, .. } => Some(available.clone()),
            _ => None,
        };
        Self {
            kind: err.kind().to_string(),
            message: err.to_string(),
            available,
        }
    }
}

impl From<BridgeError> for ErrorDetail {
    fn from(err: BridgeError) -> Self {
        ErrorDetail::from(&err)
    }
}
