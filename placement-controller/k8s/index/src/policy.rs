//! Resolves a namespace's effective placement policy from its annotations.

use placement_controller_core::{ParseError, Selector, Toleration};
use placement_controller_k8s_api::{annotations, Namespace, ResourceExt};

#[derive(Debug, thiserror::Error)]
pub enum PolicyError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("{namespace} annotations' node label selectors conflict")]
    Conflict { namespace: String },
}

/// Returns the node selector that applies to pods in the namespace.
///
/// When the namespace sets any node selector annotation, the annotations are merged (and must
/// not conflict with one another) and the result fully replaces the cluster default. Otherwise
/// the cluster default applies unchanged.
pub fn resolve_selector(
    ns: &Namespace,
    cluster_default: &Selector,
) -> Result<Selector, PolicyError> {
    let selectors = annotations::namespace_selectors(ns)?;
    if selectors.is_empty() {
        return Ok(cluster_default.clone());
    }

    let mut resolved = Selector::default();
    for (_, selector) in selectors {
        if resolved.conflicts(&selector) {
            return Err(PolicyError::Conflict {
                namespace: ns.name_any(),
            });
        }
        resolved = resolved.merge(&selector);
    }
    Ok(resolved)
}

/// Returns the tolerations that the namespace grants to its pods.
///
/// The namespace's toleration annotation, when set, replaces the cluster default.
pub fn resolve_tolerations(
    ns: &Namespace,
    cluster_default: &[Toleration],
) -> Result<Vec<Toleration>, PolicyError> {
    match annotations::namespace_tolerations(ns)? {
        Some(tolerations) => Ok(tolerations),
        None => Ok(cluster_default.to_vec()),
    }
}
