use crate::ParseError;
use serde::{Deserialize, Serialize};

/// An exception that allows a pod to be scheduled onto a node with a matching taint.
///
/// All fields are optional. An empty key with the `Exists` operator matches every taint.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Toleration {
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub key: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub operator: Option<Operator>,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub effect: Option<Effect>,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Operator {
    Equal,
    Exists,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Effect {
    NoSchedule,
    PreferNoSchedule,
    NoExecute,
}

// === impl Toleration ===

impl Toleration {
    /// Decodes a JSON-encoded list of tolerations, as stored in an annotation.
    ///
    /// An empty or all-whitespace string decodes to an empty list.
    pub fn parse_list(s: &str) -> Result<Vec<Self>, ParseError> {
        if s.trim().is_empty() {
            return Ok(Vec::new());
        }
        let tolerations = serde_json::from_str(s)?;
        Ok(tolerations)
    }

    /// Encodes a list of tolerations as a JSON string suitable for an annotation.
    pub fn encode_list(tolerations: &[Self]) -> String {
        serde_json::to_string(tolerations).expect("tolerations must serialize")
    }
}

/// Concatenates the cluster default, namespace, and pod tolerations, in that order.
///
/// Tolerations are never conflict-checked: two tolerations for the same key express independent
/// exceptions, so the merge can never fail. A toleration that is structurally equal to one
/// already merged is dropped, so merging a pod's previously merged tolerations adds nothing.
pub fn merge_tolerations(
    cluster_default: &[Toleration],
    namespace: &[Toleration],
    pod: &[Toleration],
) -> Vec<Toleration> {
    let mut merged = Vec::with_capacity(cluster_default.len() + namespace.len() + pod.len());
    for t in cluster_default.iter().chain(namespace).chain(pod) {
        if !merged.contains(t) {
            merged.push(t.clone());
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toleration(key: &str, value: &str) -> Toleration {
        Toleration {
            key: key.to_string(),
            operator: Some(Operator::Equal),
            value: value.to_string(),
            effect: Some(Effect::NoSchedule),
        }
    }

    #[test]
    fn parse_list() {
        let tolerations = Toleration::parse_list(
            r#"[{"key":"k","operator":"Equal","value":"v","effect":"NoSchedule"},{"operator":"Exists"}]"#,
        )
        .expect("tolerations must parse");
        assert_eq!(
            tolerations,
            vec![
                toleration("k", "v"),
                Toleration {
                    operator: Some(Operator::Exists),
                    ..Default::default()
                },
            ]
        );

        assert!(Toleration::parse_list("").unwrap().is_empty());
        assert!(Toleration::parse_list(" ").unwrap().is_empty());
        assert!(Toleration::parse_list("[]").unwrap().is_empty());
    }

    #[test]
    fn parse_list_rejects_malformed_input() {
        assert!(Toleration::parse_list("{").is_err());
        assert!(Toleration::parse_list(r#"{"key":"k"}"#).is_err());
        assert!(Toleration::parse_list(r#"[{"key":"k","operator":"GreaterThan"}]"#).is_err());
        assert!(Toleration::parse_list(r#"[{"key":"k","effect":"Sometimes"}]"#).is_err());
    }

    #[test]
    fn encode_omits_unset_fields() {
        let encoded = Toleration::encode_list(&[
            toleration("k", "v"),
            Toleration {
                operator: Some(Operator::Exists),
                ..Default::default()
            },
        ]);
        assert_eq!(
            encoded,
            r#"[{"key":"k","operator":"Equal","value":"v","effect":"NoSchedule"},{"operator":"Exists"}]"#
        );
        assert_eq!(Toleration::parse_list(&encoded).unwrap().len(), 2);
    }

    #[test]
    fn merge_concatenates_in_order() {
        let d = vec![toleration("default", "1")];
        let n = vec![toleration("ns", "1"), toleration("ns", "2")];
        let p = vec![toleration("pod", "1")];

        let merged = merge_tolerations(&d, &n, &p);
        assert_eq!(merged.len(), d.len() + n.len() + p.len());
        assert_eq!(
            merged,
            vec![
                toleration("default", "1"),
                toleration("ns", "1"),
                toleration("ns", "2"),
                toleration("pod", "1"),
            ]
        );
    }

    #[test]
    fn merge_drops_equal_tolerations() {
        let d = vec![toleration("default", "1")];
        let n = vec![toleration("ns", "1")];

        // The pod already carries the merged list, e.g. when it is admitted again.
        let p = merge_tolerations(&d, &n, &[toleration("pod", "1")]);
        assert_eq!(merge_tolerations(&d, &n, &p), p);

        // Same key with a different value is an independent exception.
        let p = vec![toleration("default", "2"), toleration("default", "1")];
        assert_eq!(
            merge_tolerations(&d, &[], &p),
            vec![toleration("default", "1"), toleration("default", "2")]
        );
    }

    #[test]
    fn merge_with_only_namespace_tolerations() {
        let n = vec![toleration("k", "v")];
        assert_eq!(merge_tolerations(&[], &n, &[]), n);
        assert!(merge_tolerations(&[], &[], &[]).is_empty());
    }
}
