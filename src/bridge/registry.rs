//! Stable external identities for volatile kernel object handles.
//!
//! Kernel handles can go stale without notification (an undo performed
//! outside this system, for example), so every lookup re-probes liveness
//! before returning. The registry is private state of the execution context
//! and is only ever touched from handler invocations; that confinement is
//! what lets it carry no locking of its own.

use std::collections::{HashMap, HashSet};
use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::bridge::error::{BridgeError, BridgeResult};

/// Liveness probe over an opaque reference into the live document.
///
/// Implementations must answer from the current document state; the registry
/// never caches "is valid" across calls.
pub trait EntityHandle {
    /// Whether the underlying kernel object still exists.
    fn is_alive(&self) -> bool;
}

/// Kind of kernel object a record refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Body,
    Sketch,
    Feature,
    Face,
    Edge,
    Component,
    Occurrence,
    Joint,
    Plane,
    Parameter,
}

impl EntityKind {
    /// Lowercase prefix used for generated ids.
    pub fn prefix(&self) -> &'static str {
        match self {
            EntityKind::Body => "body",
            EntityKind::Sketch => "sketch",
            EntityKind::Feature => "feature",
            EntityKind::Face => "face",
            EntityKind::Edge => "edge",
            EntityKind::Component => "component",
            EntityKind::Occurrence => "occurrence",
            EntityKind::Joint => "joint",
            EntityKind::Plane => "plane",
            EntityKind::Parameter => "parameter",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(
        &self,
        f: &mut std::fmt::Formatter<'_>,
    ) -> std::fmt::Result {
        f.write_str(self.prefix())
    }
}

/// One registered kernel object.
#[derive(Debug)]
pub struct EntityRecord<H> {
    /// Externally visible id; immutable, never reused.
    stable_id: String,
    /// Kind of the underlying object.
    kind: EntityKind,
    /// Opaque reference into the live document.
    handle: H,
    /// Registration time.
    created_at: SystemTime,
    /// User-facing name, mutable via rename.
    display_name: Option<String>,
}

impl<H> EntityRecord<H> {
    /// Get the stable id.
    #[inline]
    pub fn stable_id(&self) -> &str {
        &self.stable_id
    }

    /// Get the entity kind.
    #[inline]
    pub fn kind(&self) -> EntityKind {
        self.kind
    }

    /// Get the stored handle.
    #[inline]
    pub fn handle(&self) -> &H {
        &self.handle
    }

    /// Get the registration time.
    #[inline]
    pub fn created_at(&self) -> SystemTime {
        self.created_at
    }

    /// Get the display name, if one was set.
    #[inline]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

/// Registration-ordered mapping from stable id to live kernel handle.
///
/// Ids are allocated from monotonic per-kind counters, with `_N` suffixing
/// for user-supplied names that collide. An id once issued is never
/// reassigned, even after the record is deleted.
#[derive(Debug)]
pub struct EntityRegistry<H> {
    /// Live records, in registration order.
    records: IndexMap<String, EntityRecord<H>>,
    /// Per-kind counters for generated ids. Never decremented.
    counters: HashMap<EntityKind, u64>,
    /// Every id ever issued, including deleted ones.
    issued: HashSet<String>,
}

impl<H: EntityHandle> EntityRegistry<H> {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            records: IndexMap::new(),
            counters: HashMap::new(),
            issued: HashSet::new(),
        }
    }

    /// Register a newly created kernel object and return its stable id.
    ///
    /// A supplied `preferred_name` that collides with any id ever issued
    /// (of any kind) gets the smallest free `_N` suffix, N >= 1. Unnamed
    /// objects get `{kind}_{counter}` from the per-kind counter.
    pub fn register(
        &mut self,
        kind: EntityKind,
        handle: H,
        preferred_name: Option<&str>,
    ) -> String {
        let stable_id = match preferred_name {
            Some(name) if !name.is_empty() => self.uniquify(name),
            _ => self.next_generated(kind),
        };

        self.issued.insert(stable_id.clone());
        let display_name = preferred_name
            .filter(|name| !name.is_empty())
            .map(str::to_owned);
        self.records.insert(
            stable_id.clone(),
            EntityRecord {
                stable_id: stable_id.clone(),
                kind,
                handle,
                created_at: SystemTime::now(),
                display_name,
            },
        );

        debug!("registered {} '{}'", kind, stable_id);
        stable_id
    }

    /// Resolve a stable id, probing the stored handle first.
    ///
    /// A failed probe purges the record; both that case and an unknown id
    /// return [`BridgeError::EntityNotFound`] carrying the currently-live
    /// ids of the requested kind.
    pub fn resolve(
        &mut self,
        kind: EntityKind,
        stable_id: &str,
    ) -> BridgeResult<&EntityRecord<H>> {
        let stale = matches!(
            self.records.get(stable_id),
            Some(record) if record.kind == kind && !record.handle.is_alive()
        );
        if stale {
            warn!("purging stale {} '{}'", kind, stable_id);
            self.records.shift_remove(stable_id);
        }

        match self.records.get(stable_id) {
            Some(record) if record.kind == kind => Ok(record),
            _ => Err(BridgeError::EntityNotFound {
                kind,
                entity_id: stable_id.to_owned(),
                available: live_ids(&self.records, kind),
            }),
        }
    }

    /// Remove a record. Idempotent; returns whether anything was removed.
    ///
    /// The id stays burned: a later registration can never receive it again.
    pub fn invalidate(
        &mut self,
        stable_id: &str,
    ) -> bool {
        self.records.shift_remove(stable_id).is_some()
    }

    /// Set the display name of a live record. Returns false if the id does
    /// not resolve to a live record.
    pub fn rename(
        &mut self,
        stable_id: &str,
        display_name: impl Into<String>,
    ) -> bool {
        match self.records.get_mut(stable_id) {
            Some(record) if record.handle.is_alive() => {
                record.display_name = Some(display_name.into());
                true
            }
            _ => false,
        }
    }

    /// All live records of one kind, in registration order.
    ///
    /// Records whose probe fails are purged on the way.
    pub fn list_by_kind(
        &mut self,
        kind: EntityKind,
    ) -> Vec<&EntityRecord<H>> {
        self.records
            .retain(|_, record| record.kind != kind || record.handle.is_alive());
        self.records
            .values()
            .filter(|record| record.kind == kind)
            .collect()
    }

    /// Drop every record and reset the id space.
    ///
    /// Only used at teardown or when the whole document is replaced; within
    /// one document lifetime ids are never recycled.
    pub fn clear(&mut self) {
        self.records.clear();
        self.counters.clear();
        self.issued.clear();
    }

    /// Number of live records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether the registry holds no live records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Find the smallest `_N` suffix making a preferred name unique across
    /// every id ever issued.
    fn uniquify(
        &self,
        name: &str,
    ) -> String {
        if !self.issued.contains(name) {
            return name.to_owned();
        }
        let mut n = 1u64;
        loop {
            let candidate = format!("{}_{}", name, n);
            if !self.issued.contains(&candidate) {
                return candidate;
            }
            n += 1;
        }
    }

    /// Next `{kind}_{counter}` id, skipping counters a preferred name
    /// already claimed.
    fn next_generated(
        &mut self,
        kind: EntityKind,
    ) -> String {
        loop {
            let counter = self.counters.entry(kind).or_insert(0);
            let candidate = format!("{}_{}", kind.prefix(), *counter);
            *counter += 1;
            if !self.issued.contains(&candidate) {
                return candidate;
            }
        }
    }
}

impl<H: EntityHandle> Default for EntityRegistry<H> {
    fn default() -> Self {
        Self::new()
    }
}

/// Live ids of one kind, probed but not purged (callable while a record
/// borrow is held).
fn live_ids<H: EntityHandle>(
    records: &IndexMap<String, EntityRecord<H>>,
    kind: EntityKind,
) -> Vec<String> {
    records
        .values()
        .filter(|record| record.kind == kind && record.handle.is_alive())
        .map(|record| record.stable_id.clone())
        .collect()
}
