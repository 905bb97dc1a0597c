//! Session registry: execution context → session handle.
//!
//! Each execution context (a test thread, or a cucumber scenario running
//! as a future) owns at most one live handle. Contexts only ever touch their
//! own entry; the map lock just makes inserts and removals by distinct keys
//! safe.

use crate::session::SessionHandle;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use uuid::Uuid;

/// Identifier of one execution context
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ContextId(String);

impl ContextId {
    /// Context bound to the calling OS thread
    #[must_use]
    pub fn current_thread() -> Self {
        let thread = std::thread::current();
        let id = format!("{:?}", thread.id());
        match thread.name() {
            Some(name) => Self(format!("{name}/{id}")),
            None => Self(id),
        }
    }

    /// Fresh unique context (one per scenario when scenarios share threads)
    #[must_use]
    pub fn unique() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// String form
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ContextId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ContextId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ContextId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Context-indexed handle storage
#[derive(Debug, Default)]
pub struct SessionRegistry {
    handles: Mutex<HashMap<ContextId, Arc<SessionHandle>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn handles(&self) -> MutexGuard<'_, HashMap<ContextId, Arc<SessionHandle>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Store a handle, returning the one it displaced
    pub fn insert(&self, context: ContextId, handle: Arc<SessionHandle>) -> Option<Arc<SessionHandle>> {
        self.handles().insert(context, handle)
    }

    /// Handle for a context
    #[must_use]
    pub fn get(&self, context: &ContextId) -> Option<Arc<SessionHandle>> {
        self.handles().get(context).cloned()
    }

    /// Remove and return a context's handle
    pub fn remove(&self, context: &ContextId) -> Option<Arc<SessionHandle>> {
        self.handles().remove(context)
    }

    /// Whether a context has a handle
    #[must_use]
    pub fn contains(&self, context: &ContextId) -> bool {
        self.handles().contains_key(context)
    }

    /// Number of live handles
    #[must_use]
    pub fn len(&self) -> usize {
        self.handles().len()
    }

    /// Whether no handles are stored
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handles().is_empty()
    }
}
