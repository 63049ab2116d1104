//! Bridge unit tests


use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::bridge::context::Document;
use crate::bridge::registry::EntityHandle;

/// Handle whose liveness is driven by a shared flag.
#[derive(Debug)]
pub(crate) struct ProbeHandle {
    alive: Arc<AtomicBool>,
}

impl ProbeHandle {
    /// A handle that stays alive.
    pub(crate) fn live() -> Self {
        Self {
            alive: Arc::new(AtomicBool::new(true)),
        }
    }

    /// A handle plus the flag that controls its liveness.
    pub(crate) fn flagged() -> (Self, Arc<AtomicBool>) {
        let alive = Arc::new(AtomicBool::new(true));
        (
            Self {
                alive: alive.clone(),
            },
            alive,
        )
    }
}

impl EntityHandle for ProbeHandle {
    fn is_alive(&self) -> bool {
        self.alive.load(Ordering::SeqCst)
    }
}

/// Minimal stand-in for a live design document.
#[derive(Default)]
pub(crate) struct MockDesign {
    pub(crate) features_created: usize,
}

impl Document for MockDesign {
    type Handle = ProbeHandle;
}
