//! Cooperative scheduling against the host's event loop.
//!
//! Kernel-touching code may only run inside a callback the host invokes on
//! its one privileged thread. The [`EventManager`] gets that callback invoked
//! regularly: a background poller asks the injected [`TickDriver`] for a tick
//! every interval. The driver hides how the specific host schedules a
//! callback; the poller itself never touches the document.

use std::thread;
use std::time::Duration;

use crossbeam::channel::{self, RecvTimeoutError, Sender};
use tracing::{debug, warn};

/// Host-specific adapter that asks the host to schedule a tick.
///
/// Called from the poller thread. Returning `false` signals the host is
/// gone (shutting down, callback unregistered) and stops the poller.
pub trait TickDriver: Send + 'static {
    /// Request one scheduling tick from the host.
    fn request_tick(&mut self) -> bool;
}

impl<F> TickDriver for F
where
    F: FnMut() -> bool + Send + 'static,
{
    fn request_tick(&mut self) -> bool {
        self()
    }
}

/// Background poller that periodically requests scheduling ticks.
///
/// Owns no document-touching work; the actual draining happens inside the
/// host callback via [`ExecutionContext::tick`].
///
/// [`ExecutionContext::tick`]: crate::bridge::context::ExecutionContext::tick
pub struct EventManager {
    /// Poller period.
    interval: Duration,
    /// Dropping or sending on this stops the poller.
    stop_tx: Option<Sender<()>>,
    /// The poller thread.
    poller: Option<thread::JoinHandle<()>>,
}

impl std::fmt::Debug for EventManager {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.debug_struct("EventManager")
            .field("interval", &self.interval)
            .field("running", &self.is_running())
            .finish()
    }
}

impl EventManager {
    /// Create an event manager with the given tick interval.
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            stop_tx: None,
            poller: None,
        }
    }

    /// Start the poller thread. Returns false if already running.
    pub fn start(
        &mut self,
        mut driver: impl TickDriver,
    ) -> bool {
        if self.poller.is_some() {
            warn!("event manager already running");
            return false;
        }

        let (stop_tx, stop_rx) = channel::bounded::<()>(1);
        let interval = self.interval;

        let poller = thread::Builder::new()
            .name("bridge-poller".to_string())
            .spawn(move || loop {
                match stop_rx.recv_timeout(interval) {
                    Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
                    Err(RecvTimeoutError::Timeout) => {
                        if !driver.request_tick() {
                            // Host is gone; nothing left to poll for.
                            debug!("tick driver refused, poller exiting");
                            break;
                        }
                    }
                }
            })
            .expect("Failed to spawn poller thread");

        self.stop_tx = Some(stop_tx);
        self.poller = Some(poller);
        debug!("event manager started (interval {:?})", self.interval);
        true
    }

    /// Stop the poller and join it. Idempotent.
    pub fn stop(&mut self) {
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
        if let Some(poller) = self.poller.take() {
            let _ = poller.join();
            debug!("event manager stopped");
        }
    }

    /// Whether the poller thread is active.
    pub fn is_running(&self) -> bool {
        self.poller.is_some()
    }

    /// Get the poller period.
    #[inline]
    pub fn interval(&self) -> Duration {
        self.interval
    }
}

impl Drop for EventManager {
    fn drop(&mut self) {
        self.stop();
    }
}
