//! Path-addressed observation handles.
//!
//! The source runtime intercepted reads and writes with ambient proxies;
//! here interception is explicit: an [`ObservedNode`] remembers its key
//! path from the root and routes `get`/`set`/`delete` through the owning
//! store, so every mutation flows through the same watcher/update
//! machinery. Handles are addresses, not owners — wrapping the same path
//! twice yields equivalent handles, and wrapping is trivially idempotent.

use reflet_carton::{KeyPath, Value};

use crate::errors::StoreError;
use crate::store::Store;

#[derive(Clone)]
pub struct ObservedNode {
    store: Store,
    path: KeyPath,
}

impl ObservedNode {
    pub(crate) fn new(store: Store, path: KeyPath) -> Self {
        Self { store, path }
    }

    pub fn path(&self) -> &KeyPath {
        &self.path
    }

    /// A handle one level deeper. The child need not exist yet; the
    /// address is valid as soon as something is written there.
    pub fn child(&self, key: impl Into<compact_str::CompactString>) -> ObservedNode {
        ObservedNode {
            store: self.store.clone(),
            path: self.path.child(key),
        }
    }

    /// Snapshot of the value under `key` (or of this node itself for the
    /// container's own value via an empty read path).
    pub fn get(&self, key: &str) -> Value {
        self.store.get(&self.path.child(key).join())
    }

    pub fn value(&self) -> Value {
        if self.path.is_root() {
            self.store.data()
        } else {
            self.store.get(&self.path.join())
        }
    }

    pub fn set(&self, key: &str, value: impl Into<Value>) -> Result<(), StoreError> {
        self.store.set(&self.path.child(key).join(), value)
    }

    pub fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.store.delete(&self.path.child(key).join())
    }
}
