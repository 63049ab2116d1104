//! cadbridge
//!
//! A synchronization bridge that exposes a stateful, single-threaded CAD
//! design kernel to many concurrent callers. Arbitrary producer threads
//! submit operations and block (timeout-bounded) for results; a cooperative
//! scheduler drains the queue inside the host's privileged callback, where
//! operation handlers run one at a time against the live document and its
//! entity registry.
//!
//! # Example
//!
//! ```rust
//! use cadbridge::{Bridge, BridgeConfig, Document, EntityHandle};
//! use serde_json::json;
//!
//! struct Probe;
//! impl EntityHandle for Probe {
//!     fn is_alive(&self) -> bool {
//!         true
//!     }
//! }
//!
//! struct Design;
//! impl Document for Design {
//!     type Handle = Probe;
//! }
//!
//! let mut bridge = Bridge::new(BridgeConfig::default(), Design);
//! bridge.register_handler("ping", |_doc, _registry, _params| Ok(json!("pong")));
//!
//! let handle = bridge.handle();
//! let task_id = handle.submit("ping", json!({})).unwrap();
//!
//! // Normally the host invokes this from its privileged callback.
//! bridge.tick();
//!
//! let result = handle.wait(task_id).unwrap();
//! assert!(result.success);
//! ```

#![doc(html_root_url = "https://docs.rs/cadbridge")]
#![warn(rust_2018_idioms)]

// Public modules
pub mod bridge;

// Utility modules
pub mod util;

// Re-exports
pub use anyhow::{Context, Result};
pub use thiserror::Error;

pub use bridge::{
    Bridge, BridgeConfig, BridgeError, BridgeHandle, BridgeResult, Document, EntityHandle,
    EntityKind, EntityRecord, EntityRegistry, ErrorDetail, EventManager, ExecutionContext,
    Task, TaskId, TaskQueue, TaskResult, TaskStatus, TickDriver,
};

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = "cadbridge";
