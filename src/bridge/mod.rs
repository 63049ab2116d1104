//! Synchronization bridge between concurrent callers and the design kernel.
//!
//! The kernel (the live CAD document) is single-threaded and only reachable
//! from a callback the host schedules cooperatively. The bridge hands tasks
//! from arbitrary producer threads to that privileged context and delivers
//! exactly one result per task back to the blocked caller:
//!
//! ```text
//! dispatcher -> TaskQueue::submit -> EventManager tick
//!     -> ExecutionContext::run_task -> EntityRegistry read/write
//!     -> TaskQueue::publish -> dispatcher's wait unblocks
//! ```

pub mod config;
pub mod context;
pub mod error;
pub mod handle;
pub mod queue;
pub mod registry;
pub mod scheduler;
pub mod task;

#[cfg(test)]
mod tests;

pub use config::{load_config, BridgeConfig};
pub use context::{Document, ExecutionContext, Handler};
pub use error::{BridgeError, BridgeResult, ErrorDetail};
pub use handle::BridgeHandle;
pub use queue::{TaskQueue, DEFAULT_QUEUE_DEPTH};
pub use registry::{EntityHandle, EntityKind, EntityRecord, EntityRegistry};
pub use scheduler::{EventManager, TickDriver};
pub use task::{Task, TaskId, TaskResult, TaskStatus};

use std::sync::Arc;

use tracing::info;

/// The assembled bridge: queue, execution context and event manager,
/// wired from one [`BridgeConfig`].
///
/// The host side owns the `Bridge` and calls [`Bridge::tick`] from its
/// privileged callback; producer threads hold cloned [`BridgeHandle`]s.
pub struct Bridge<D: Document> {
    config: BridgeConfig,
    queue: Arc<TaskQueue>,
    context: ExecutionContext<D>,
    events: EventManager,
}

impl<D: Document> std::fmt::Debug for Bridge<D> {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("queue", &self.queue)
            .field("events", &self.events)
            .finish()
    }
}

impl<D: Document> Bridge<D> {
    /// Build a bridge around a live document.
    pub fn new(
        config: BridgeConfig,
        document: D,
    ) -> Self {
        let queue = Arc::new(TaskQueue::new(config.max_queue_depth));
        let events = EventManager::new(config.scheduler_tick_interval());

        Self {
            config,
            queue,
            context: ExecutionContext::new(document),
            events,
        }
    }

    /// Create a producer handle. Cheap; clone freely across threads.
    pub fn handle(&self) -> BridgeHandle {
        BridgeHandle::new(self.queue.clone(), self.config.default_task_timeout())
    }

    /// Get the shared queue.
    pub fn queue(&self) -> &Arc<TaskQueue> {
        &self.queue
    }

    /// Get the execution context.
    pub fn context(&self) -> &ExecutionContext<D> {
        &self.context
    }

    /// Get the execution context mutably (handler registration, document
    /// access from the privileged thread).
    pub fn context_mut(&mut self) -> &mut ExecutionContext<D> {
        &mut self.context
    }

    /// Register an operation handler.
    pub fn register_handler<F>(
        &mut self,
        operation_name: impl Into<String>,
        handler: F,
    ) where
        F: FnMut(
                &mut D,
                &mut EntityRegistry<D::Handle>,
                &serde_json::Value,
            ) -> anyhow::Result<serde_json::Value>
            + Send
            + 'static,
    {
        self.context.register_handler(operation_name, handler);
    }

    /// The host-side callback body: drain one bounded batch and run it.
    /// Must only be called from the host's privileged thread.
    pub fn tick(&mut self) -> usize {
        self.context
            .tick(&self.queue, self.config.max_tasks_per_tick)
    }

    /// Start the background poller with a host-specific tick driver.
    pub fn start(
        &mut self,
        driver: impl TickDriver,
    ) -> bool {
        self.events.start(driver)
    }

    /// Stop the poller, close the queue (resolving pending tasks with a
    /// shutdown error) and clear the registry. Idempotent.
    pub fn shutdown(&mut self) {
        if self.queue.is_closed() {
            return;
        }
        self.events.stop();
        self.queue.close();
        self.context.registry_mut().clear();
        info!("bridge shut down");
    }

    /// Get the configuration.
    pub fn config(&self) -> &BridgeConfig {
        &self.config
    }
}

impl<D: Document> Drop for Bridge<D> {
    fn drop(&mut self) {
        self.shutdown();
    }
}
