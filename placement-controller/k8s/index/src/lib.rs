//! Placement Namespace Index
//!
//! The admission controller needs each pod's namespace in order to resolve the namespace's
//! placement policy. Rather than fetching the namespace from the API server on every admission
//! request, we maintain an in-memory index of all namespaces that is updated by a single
//! background task processing a `Namespace` watch:
//!
//! - The initial list (and every relist) resets the index to the listed namespaces.
//! - Each applied event replaces the namespace's entry.
//! - Each deleted event removes the namespace's entry.
//!
//! Entries are stored as `Arc<Namespace>` so that a lookup returns a point-in-time snapshot
//! without holding the lock, and readers never observe a partially-applied update.
//!
//! The index is only authoritative for namespaces it has observed through its watch. Callers are
//! expected to fall back to the API server when a namespace is not (yet) indexed, and must not
//! insert the fallback result into the index.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod metrics;
pub mod policy;


pub use self::policy::{resolve_selector, resolve_tolerations, PolicyError};
use ahash::AHashMap as HashMap;
use parking_lot::RwLock;
use placement_controller_k8s_api::{Namespace, ResourceExt};
use std::sync::Arc;

pub type SharedIndex = Arc<RwLock<Index>>;

/// Provides point-in-time lookups of namespaces by name.
pub trait NamespaceCache: Send + Sync {
    fn get(&self, name: &str) -> Option<Arc<Namespace>>;
}

/// Holds all namespaces observed by the watch, keyed by name.
#[derive(Debug, Default)]
pub struct Index {
    namespaces: HashMap<String, Arc<Namespace>>,
}

// === impl Index ===

impl Index {
    pub fn shared() -> SharedIndex {
        Arc::new(RwLock::new(Self::default()))
    }

    pub fn get(&self, name: &str) -> Option<Arc<Namespace>> {
        self.namespaces.get(name).cloned()
    }

    pub fn len(&self) -> usize {
        self.namespaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.namespaces.is_empty()
    }
}

impl kubert::index::IndexClusterResource<Namespace> for Index {
    fn apply(&mut self, ns: Namespace) {
        let name = ns.name_unchecked();
        tracing::trace!(%name, "Indexing namespace");
        self.namespaces.insert(name, Arc::new(ns));
    }

    fn delete(&mut self, name: String) {
        tracing::trace!(%name, "Removing namespace");
        self.namespaces.remove(&name);
    }

    // Each namespace is indexed independently, so resets need no special handling beyond
    // applying the listed namespaces and deleting those that were removed.
}

impl NamespaceCache for RwLock<Index> {
    fn get(&self, name: &str) -> Option<Arc<Namespace>> {
        self.read().get(name)
    }
}
