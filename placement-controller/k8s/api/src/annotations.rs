//! Annotations that carry placement policy on namespaces and pods.

use crate::{Namespace, ObjectMeta, Pod};
use placement_controller_core::{ParseError, Selector, Toleration};
use std::collections::BTreeMap;

/// Node selector applied to every pod in an annotated namespace.
pub const NODE_SELECTOR: &str = "scheduler.alpha.kubernetes.io/node-selector";

/// The original node selector annotation. It is still honored, and must agree with
/// [`NODE_SELECTOR`] when both are set.
pub const LEGACY_NODE_SELECTOR: &str = "kubernetes.io/node-selector";

/// A JSON-encoded list of tolerations. On a namespace, these tolerations are added to every pod
/// in the namespace; on a pod, they are the pod's own tolerations.
pub const TOLERATIONS: &str = "scheduler.alpha.kubernetes.io/tolerations";

/// Selector annotations in the order in which they are merged.
pub const NODE_SELECTORS: [&str; 2] = [NODE_SELECTOR, LEGACY_NODE_SELECTOR];

fn get<'m>(meta: &'m ObjectMeta, key: &str) -> Option<&'m str> {
    meta.annotations.as_ref()?.get(key).map(String::as_str)
}

/// Parses each selector annotation set on the namespace, in [`NODE_SELECTORS`] order.
///
/// Returns an empty list when the namespace carries no selector annotation.
pub fn namespace_selectors(ns: &Namespace) -> Result<Vec<(&'static str, Selector)>, ParseError> {
    NODE_SELECTORS
        .iter()
        .filter_map(|key| get(&ns.metadata, key).map(|v| (*key, v)))
        .map(|(key, v)| v.parse::<Selector>().map(|selector| (key, selector)))
        .collect()
}

/// Parses the namespace's toleration annotation, if set.
pub fn namespace_tolerations(ns: &Namespace) -> Result<Option<Vec<Toleration>>, ParseError> {
    get(&ns.metadata, TOLERATIONS)
        .map(Toleration::parse_list)
        .transpose()
}

/// Parses the pod's own tolerations from its annotation. An unannotated pod has none.
pub fn pod_tolerations(pod: &Pod) -> Result<Vec<Toleration>, ParseError> {
    Ok(get(&pod.metadata, TOLERATIONS)
        .map(Toleration::parse_list)
        .transpose()?
        .unwrap_or_default())
}

/// Replaces the pod's toleration annotation with the given list.
pub fn set_pod_tolerations(pod: &mut Pod, tolerations: &[Toleration]) {
    pod.metadata
        .annotations
        .get_or_insert_with(BTreeMap::new)
        .insert(TOLERATIONS.to_string(), Toleration::encode_list(tolerations));
}
