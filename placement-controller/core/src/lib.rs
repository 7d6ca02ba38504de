//! Placement constraint model.
//!
//! A namespace may restrict where its pods run with two kinds of policy:
//!
//! - A [`Selector`] is a set of node-label key/value constraints. Selectors from the cluster
//!   default, the namespace, and the pod are merged, but a pod may not override a value that its
//!   namespace has already pinned.
//! - A list of [`Toleration`]s grants exceptions to node taints. Tolerations are purely additive;
//!   multiple tolerations for the same key are legal and the lists are concatenated, dropping
//!   only exact duplicates.
//!
//! This crate has no knowledge of Kubernetes object types so that the merge semantics can be
//! tested in isolation.

#![deny(warnings, rust_2018_idioms)]
#![forbid(unsafe_code)]

pub mod selector;
pub mod toleration;

pub use self::{
    selector::Selector,
    toleration::{merge_tolerations, Effect, Operator, Toleration},
};

/// Indicates that a selector string or a toleration list could not be decoded.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("invalid selector term {0:?}: expected key=value")]
    MissingSeparator(String),

    #[error("invalid selector term {0:?}: key must not be empty")]
    EmptyKey(String),

    #[error("invalid tolerations: {0}")]
    Tolerations(#[from] serde_json::Error),
}
