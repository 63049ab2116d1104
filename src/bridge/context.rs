//! The single logical thread of control that owns the live document.
//!
//! An [`ExecutionContext`] is actor-local state: the document and the
//! entity registry are reachable only through tasks drained from the queue,
//! so neither needs locking. The host's privileged callback drives
//! [`ExecutionContext::tick`]; nothing else may touch the document.

use std::collections::HashMap;
use std::panic::{self, AssertUnwindSafe};
use std::time::Instant;

use serde_json::Value;
use tracing::{debug, error};

use crate::bridge::error::{BridgeError, ErrorDetail};
use crate::bridge::queue::TaskQueue;
use crate::bridge::registry::{EntityHandle, EntityRegistry};
use crate::bridge::task::{Task, TaskResult, TaskStatus};

/// The live design document the execution context owns.
///
/// The associated handle type is the opaque reference operation handlers
/// store in the registry.
pub trait Document {
    /// Handle type for objects inside this document.
    type Handle: EntityHandle;
}

/// An operation handler: the actual CAD logic supplied by the embedder.
///
/// Handlers run synchronously inside the execution context with exclusive
/// access to the document and registry, and return a JSON payload or raise
/// a fault.
pub type Handler<D> = Box<
    dyn FnMut(
            &mut D,
            &mut EntityRegistry<<D as Document>::Handle>,
            &Value,
        ) -> anyhow::Result<Value>
        + Send,
>;

/// Owner of the live document, the registry, and the handler table.
pub struct ExecutionContext<D: Document> {
    /// The live document; exclusively owned, never shared.
    document: D,
    /// Stable-id registry; same confinement as the document.
    registry: EntityRegistry<D::Handle>,
    /// Operation name -> handler.
    handlers: HashMap<String, Handler<D>>,
}

impl<D: Document> std::fmt::Debug for ExecutionContext<D> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("ExecutionContext")
            .field("handlers", &self.handlers.len())
            .field("registry_len", &self.registry.len())
            .finish()
    }
}

impl<D: Document> ExecutionContext<D> {
    /// Create a context owning the given document.
    pub fn new(document: D) -> Self {
        Self {
            document,
            registry: EntityRegistry::new(),
            handlers: HashMap::new(),
        }
    }

    /// Register a handler for an operation name, replacing any previous one.
    pub fn register_handler<F>(
        &mut self,
        operation_name: impl Into<String>,
        handler: F,
    ) where
        F: FnMut(&mut D, &mut EntityRegistry<D::Handle>, &Value) -> anyhow::Result<Value>
            + Send
            + 'static,
    {
        self.handlers
            .insert(operation_name.into(), Box::new(handler));
    }

    /// Unregister a handler. Returns whether one was present.
    pub fn unregister_handler(
        &mut self,
        operation_name: &str,
    ) -> bool {
        self.handlers.remove(operation_name).is_some()
    }

    /// Whether a handler is registered for the operation name.
    pub fn has_handler(
        &self,
        operation_name: &str,
    ) -> bool {
        self.handlers.contains_key(operation_name)
    }

    /// Get the document.
    #[inline]
    pub fn document(&self) -> &D {
        &self.document
    }

    /// Get the document mutably.
    #[inline]
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    /// Get the registry.
    #[inline]
    pub fn registry(&self) -> &EntityRegistry<D::Handle> {
        &self.registry
    }

    /// Get the registry mutably.
    #[inline]
    pub fn registry_mut(&mut self) -> &mut EntityRegistry<D::Handle> {
        &mut self.registry
    }

    /// Run one task to its terminal result.
    ///
    /// Every fault path lands here: unknown operation names, handler errors
    /// and handler panics all become a failed result. Nothing an individual
    /// task does may escape and stop the scheduling loop.
    pub fn run_task(
        &mut self,
        task: &Task,
    ) -> TaskResult {
        let started = Instant::now();
        // Running is entered here, one task at a time; batch draining hands
        // tasks over still Pending.
        task.set_status(TaskStatus::Running);
        debug!("running {} ({})", task.id(), task.operation_name());

        let Self {
            document,
            registry,
            handlers,
        } = self;

        let Some(handler) = handlers.get_mut(task.operation_name()) else {
            return TaskResult::fail(
                task.id(),
                ErrorDetail::new(
                    "unknown_operation",
                    format!("Unknown operation: {}", task.operation_name()),
                ),
            );
        };

        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            handler(document, registry, task.parameters())
        }));

        let result = match outcome {
            Ok(Ok(payload)) => TaskResult::ok(task.id(), payload),
            Ok(Err(fault)) => {
                error!("{} ({}) failed: {:#}", task.id(), task.operation_name(), fault);
                // Bridge errors raised inside handlers keep their structure
                // (kind, candidate ids) instead of collapsing into a string.
                let detail = match fault.downcast::<BridgeError>() {
                    Ok(bridge_fault) => ErrorDetail::from(&bridge_fault),
                    Err(other) => ErrorDetail::from(&BridgeError::Execution {
                        operation: task.operation_name().to_owned(),
                        message: format!("{:#}", other),
                    }),
                };
                TaskResult::fail(task.id(), detail)
            }
            Err(payload) => {
                let message = panic_message(payload.as_ref());
                error!(
                    "{} ({}) panicked: {}",
                    task.id(),
                    task.operation_name(),
                    message
                );
                TaskResult::fail(
                    task.id(),
                    ErrorDetail::from(&BridgeError::Execution {
                        operation: task.operation_name().to_owned(),
                        message: format!("panicked: {}", message),
                    }),
                )
            }
        };

        debug!(
            "{} resolved in {:?} (success: {})",
            task.id(),
            started.elapsed(),
            result.success
        );
        result
    }

    /// Drain a bounded batch from the queue and run each task in order.
    ///
    /// Called from inside the host's privileged callback. Tasks run strictly
    /// one at a time even when a batch is drained together; `max == 0` means
    /// drain everything currently pending. Returns the number of tasks run.
    pub fn tick(
        &mut self,
        queue: &TaskQueue,
        max: usize,
    ) -> usize {
        let batch = queue.drain_batch(max);
        let drained = batch.len();

        for task in batch {
            let result = self.run_task(&task);
            queue.publish(task.id(), result);
        }

        drained
    }
}

/// Render a panic payload for the failed result.
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "opaque panic payload".to_owned()
    }
}
